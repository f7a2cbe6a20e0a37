use thiserror::Error;

/// Reasons an NDEF structure could not be decoded completely.
///
/// These never abort a whole message: the decoder keeps every record read
/// before the failure and attaches the error as a partial-decode cause.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NdefError {
    #[error("Truncated {field} at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        field: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// The bytes ran out on a record boundary before a record with ME set.
    #[error("Message ends at offset {offset} without a message-end record")]
    MissingMessageEnd { offset: usize },

    #[error("NDEF TLV at offset {offset} declares {length} bytes, only {available} available")]
    TlvOverrun {
        offset: usize,
        length: usize,
        available: usize,
    },
}

impl NdefError {
    pub(crate) fn truncated(
        field: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    ) -> Self {
        Self::Truncated {
            field,
            offset,
            needed,
            available,
        }
    }
}

pub type Result<T> = std::result::Result<T, NdefError>;
