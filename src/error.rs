//! Error type shared by the storage adapter, the feature state engine and batch jobs

use crate::version::VersionError;
use sea_orm::DbErr;
use validator::ValidationErrors;

#[derive(Debug)]
pub enum FeatureError {
    /// Storage failure, including unique constraint violations
    Db(DbErr),
    /// Rejected input, one entry per offending field
    Validation(ValidationErrors),
    /// Referenced row does not exist
    NotFound { entity: &'static str, id: i32 },
    /// A stored version could not be compared
    Version(VersionError),
}

impl FeatureError {
    pub fn not_found(entity: &'static str, id: i32) -> Self {
        FeatureError::NotFound { entity, id }
    }
}

impl std::fmt::Display for FeatureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureError::Db(e) => write!(f, "Database error: {}", e),
            FeatureError::Validation(e) => write!(f, "Validation failed: {}", e),
            FeatureError::NotFound { entity, id } => write!(f, "{} {} not found", entity, id),
            FeatureError::Version(e) => write!(f, "Version error: {}", e),
        }
    }
}

impl std::error::Error for FeatureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FeatureError::Db(e) => Some(e),
            FeatureError::Validation(e) => Some(e),
            FeatureError::NotFound { .. } => None,
            FeatureError::Version(e) => Some(e),
        }
    }
}

impl From<DbErr> for FeatureError {
    fn from(e: DbErr) -> Self {
        FeatureError::Db(e)
    }
}

impl From<ValidationErrors> for FeatureError {
    fn from(e: ValidationErrors) -> Self {
        FeatureError::Validation(e)
    }
}

impl From<VersionError> for FeatureError {
    fn from(e: VersionError) -> Self {
        FeatureError::Version(e)
    }
}
