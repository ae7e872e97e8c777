use checklist_core::CoreError;
use checklist_storage::StorageError;
use thiserror::Error;

use crate::remote::RemoteError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("field not found: {0}")]
    FieldNotFound(String),

    #[error("field {name} is not a {expected} field")]
    FieldKindMismatch { name: String, expected: &'static str },

    #[error("field {field} has no option {value}")]
    OptionNotFound { field: String, value: String },

    #[error("parameter index {index} out of range ({count} parameters)")]
    ParameterOutOfRange { index: usize, count: usize },

    #[error("zone index {index} out of range ({count} zones)")]
    ZoneOutOfRange { index: usize, count: usize },

    #[error("checklist unavailable: {0}")]
    ChecklistUnavailable(String),
}
