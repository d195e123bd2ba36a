use thiserror::Error;

use crate::session::DrillId;

/// Everything that can go wrong while loading lists or running a drill.
///
/// None of these are fatal: each one is local to a single user action and the
/// action can simply be retried.
#[derive(Debug, Error)]
pub enum DrillError {
    /// The word-list source could not be fetched or is not a usable table.
    #[error("word list {location} is unavailable: {reason}")]
    DataUnavailable { location: String, reason: String },

    /// A row carries an unusable SID or headword.
    #[error("malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    /// The speech endpoint failed for one piece of text.
    #[error("speech synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("unknown word list {0:?}")]
    UnknownWordlist(String),

    #[error("unknown drill {0:?}")]
    UnknownDrill(String),

    /// An answer or clip was addressed to an item outside the current generation.
    #[error("drill {drill} has no item with SID {sid}")]
    UnknownItem { drill: DrillId, sid: u32 },
}

impl DrillError {
    pub(crate) fn unavailable(location: &str, reason: impl ToString) -> Self {
        DrillError::DataUnavailable {
            location: location.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DrillError>;
