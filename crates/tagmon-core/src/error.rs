//! Tag registry and store errors.

#![allow(missing_docs)]

use smol_str::SmolStr;
use thiserror::Error;

use crate::backend::NodeError;
use crate::registry::TagId;

/// Errors for tag lifecycle and store operations.
///
/// Every failing operation leaves internal state exactly as it was
/// before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    /// Tag names must not be empty.
    #[error("tag name cannot be empty")]
    EmptyName,

    /// An active tag with the same name already exists.
    #[error("tag '{0}' already exists")]
    DuplicateName(SmolStr),

    /// No registry record with the given id.
    #[error("tag id {0} not found")]
    UnknownId(TagId),

    /// The registry record was already soft-deleted.
    #[error("tag id {0} is already deleted")]
    AlreadyDeleted(TagId),

    /// The registry record exists but is no longer active.
    #[error("tag id {0} is inactive")]
    Inactive(TagId),

    /// No store record matches the given name or external id.
    #[error("tag '{0}' not found")]
    NotFound(SmolStr),

    /// The tag is not in override state.
    #[error("tag '{0}' is not overridden")]
    NotOverridden(SmolStr),

    /// A value range has non-finite or inverted bounds.
    #[error("tag '{0}' has an invalid value range")]
    InvalidRange(SmolStr),

    /// External resource call failed; the cause is opaque.
    #[error("external resource error: {0}")]
    External(#[from] NodeError),

    /// Configuration error.
    #[error("invalid config '{0}'")]
    InvalidConfig(SmolStr),

    /// Thread spawn error.
    #[error("thread spawn error '{0}'")]
    ThreadSpawn(SmolStr),
}
