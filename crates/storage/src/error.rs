use budgnudg_core::CategorizationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Invalid learning backup: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Missing required header(s): {0}")]
    MissingHeaders(String),
    #[error("Transaction {0} does not exist")]
    UnknownTransaction(i64),
    #[error("Corrupt learned data: {0}")]
    CorruptLearningData(String),
}

impl StorageError {
    /// The code to store on a transaction when this failure hits it.
    pub fn categorization_error(&self) -> CategorizationError {
        match self {
            StorageError::Database(_) => CategorizationError::DatabaseError,
            StorageError::Json(_) | StorageError::CorruptLearningData(_) => {
                CategorizationError::LearnedDataCorrupt
            }
            StorageError::Csv(_) | StorageError::MissingHeaders(_) => {
                CategorizationError::ProfileMappingError
            }
            StorageError::UnknownTransaction(_) => CategorizationError::DataCorruption,
        }
    }
}
