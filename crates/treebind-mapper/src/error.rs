use thiserror::Error;
use treebind_model::IdentityKey;

use crate::mapper::{MapperId, MapperState};

pub type Result<T> = std::result::Result<T, MappingError>;

/// Protocol violations raised by mapper transitions and the registry.
///
/// None of these are recoverable locally; they indicate caller misuse. A
/// failed attach rolls back every completed step before returning one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("{mapper} is {actual}, expected {expected}")]
    InvalidState {
        mapper: MapperId,
        expected: MapperState,
        actual: MapperState,
    },

    #[error("{mapper} belongs to a role and cannot be attached or detached as a root")]
    NotRoot { mapper: MapperId },

    #[error("{mapper} already belongs to a role")]
    AlreadyOwned { mapper: MapperId },

    #[error("adding {mapper} would make it its own ancestor")]
    Cycle { mapper: MapperId },

    #[error("source {key} is already mapped by {existing}, cannot register {incoming}")]
    DuplicateSource {
        key: IdentityKey,
        existing: MapperId,
        incoming: MapperId,
    },

    #[error("{mapper} is not registered for source {key}")]
    NotRegistered { key: IdentityKey, mapper: MapperId },
}

impl MappingError {
    #[must_use]
    pub(crate) fn invalid_state(
        mapper: MapperId,
        expected: MapperState,
        actual: MapperState,
    ) -> Self {
        Self::InvalidState {
            mapper,
            expected,
            actual,
        }
    }
}
