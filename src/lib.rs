//! CEFR vocabulary drills.
//!
//! Word lists are loaded from delimited text files, narrowed to a SID range,
//! turned into spoken prompts, and checked against what the learner types.

pub mod catalog;
pub mod check;
pub mod cloze;
pub mod data;
pub mod error;
pub mod loader;
pub mod range;
pub mod session;
pub mod speech;
pub mod store;
#[cfg(feature = "web")]
pub mod web;

pub use catalog::{Catalog, DrillSpec, WordlistSource};
pub use check::{CheckReport, CheckedItem, check};
pub use data::{SourceFormat, WordEntry, WordList, parse_wordlist};
pub use error::{DrillError, Result};
pub use loader::{HttpSource, TextSource, WordlistCache};
pub use range::{RangeSelection, filter};
pub use session::{
    DrillId, DrillKind, DrillPhase, Generation, GenerationReport, ItemKey, PracticeItem,
    PracticeSession, sample_quiz,
};
pub use speech::{AudioClip, SpeechConfig, Synthesizer, TranslateTts, narrate};
pub use store::{SessionStore, SharedSession};
