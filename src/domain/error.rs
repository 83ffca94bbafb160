use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("slot name must not be empty")]
    EmptySlotName,
    #[error("slot name `{name}` may only contain lowercase letters, digits, `-` and `_`")]
    InvalidSlotName { name: String },
    #[error("slot `{slot}` is defined more than once")]
    DuplicateSlot { slot: String },
    #[error("slot `{slot}` is not configured")]
    UnknownSlot { slot: String },
}

impl DomainError {
    pub fn unknown_slot(slot: impl Into<String>) -> Self {
        Self::UnknownSlot { slot: slot.into() }
    }
}
