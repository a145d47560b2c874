pub mod backup;
pub mod db;
pub mod error;
pub mod learning;
pub mod reference;
pub mod transactions;

pub use backup::{
    export_learning, import_learning, ImportMode, ImportSummary, LearnedPayoreeEntry,
    LearnedSubcatEntry, LearningBackup, BACKUP_VERSION,
};
pub use db::{
    check_reference_data, create_db, delete_keyword_rule, find_category, find_payoree,
    get_all_categories, get_all_payorees, get_keyword_rules, get_or_create_category,
    get_or_create_payoree, load_entity_index, save_keyword_rule, DbPool,
};
pub use error::StorageError;
pub use learning::{
    clear_learning, load_learning_store, record_confirmation, top_learned_patterns,
    LearnedPattern,
};
pub use reference::{import_categories_csv, import_payorees_csv, ReferenceImportCounts};
pub use transactions::{
    categorization_error_breakdown, confirm_transaction, get_transaction, insert_transaction,
    ConfirmOutcome, Confirmation, NewTransaction, StoredTransaction,
};
