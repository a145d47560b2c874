pub mod entity;
pub mod error;
pub mod keyword;
pub mod learned;
pub mod money;

pub use entity::{
    normalize_name, Category, CategoryId, EntityIndex, EntityResolver, Payoree, PayoreeId,
    ResolverError,
};
pub use error::{CategorizationError, LookupTarget, UnknownErrorCode};
pub use keyword::KeywordRule;
pub use learned::{
    rank_associations, LearnedAssociation, LearningKind, LearningStore, LearningTarget,
    MemoryLearningStore,
};
pub use money::{Money, ParseMoneyError};
