use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, info, warn};

use crate::check::CheckReport;
use crate::cloze;
use crate::data::WordEntry;
use crate::error::{DrillError, Result};
use crate::speech::{AudioClip, Synthesizer};

pub const QUIZ_DEFAULT_COUNT: usize = 10;
pub const QUIZ_MAX_COUNT: usize = 20;

/// Identifies one independently configured drill, e.g. the Level C tab of
/// the listen-and-spell page.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrillId(String);

impl DrillId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DrillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DrillId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Storage key for everything the session keeps per item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemKey {
    pub drill: DrillId,
    pub sid: u32,
}

impl ItemKey {
    pub fn new(drill: &DrillId, sid: u32) -> Self {
        Self {
            drill: drill.clone(),
            sid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrillKind {
    /// Hear the headword, type its spelling.
    Spelling,
    /// Hear the example sentence, type the blanked-out word.
    Cloze,
    /// Hear the example sentence with the headword shown.
    Listening,
}

impl DrillKind {
    /// Text handed to the synthesizer; `None` when the entry has no context
    /// for a context drill.
    pub fn spoken_text<'a>(&self, entry: &'a WordEntry) -> Option<&'a str> {
        match self {
            DrillKind::Spelling => Some(entry.word.as_str()),
            DrillKind::Cloze | DrillKind::Listening => entry.context.as_deref(),
        }
    }

    pub fn prompt(&self, entry: &WordEntry) -> Option<String> {
        match self {
            DrillKind::Spelling | DrillKind::Listening => Some(entry.word.clone()),
            DrillKind::Cloze => {
                let context = entry.context.as_deref()?;
                let (masked, count) = cloze::mask_count(context, &entry.word);
                if count == 0 {
                    debug!(sid = entry.sid, word = %entry.word, "headword not found in context");
                }
                Some(masked)
            }
        }
    }

    pub fn needs_context(&self) -> bool {
        !matches!(self, DrillKind::Spelling)
    }

    /// Listening drills show the headword, so there is nothing to answer.
    pub fn accepts_answers(&self) -> bool {
        !matches!(self, DrillKind::Listening)
    }

    pub fn label(&self) -> &'static str {
        match self {
            DrillKind::Spelling => "Listen & Spell",
            DrillKind::Cloze => "Words in Context",
            DrillKind::Listening => "Listening",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PracticeItem {
    pub sid: u32,
    pub prompt: String,
    pub expected: String,
    pub audio: Option<AudioClip>,
    pub audio_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub sid: u32,
    pub reason: String,
}

/// What one generation produced, item by item.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub drill: DrillId,
    pub kind: DrillKind,
    pub generated: Vec<u32>,
    pub failures: Vec<ItemFailure>,
    /// Entries left out because a context drill found no sentence for them.
    pub skipped: Vec<u32>,
}

impl GenerationReport {
    pub fn total(&self) -> usize {
        self.generated.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }
}

/// A batch of freshly synthesized items that is not yet visible in any
/// session.
#[derive(Debug)]
pub struct Generation {
    items: Vec<PracticeItem>,
    report: GenerationReport,
}

impl Generation {
    /// Synthesizes every entry in order. Each synthesis stands alone: a
    /// failure leaves that item without audio and the batch carries on.
    pub async fn build(
        drill: DrillId,
        kind: DrillKind,
        entries: &[&WordEntry],
        synth: &dyn Synthesizer,
    ) -> Self {
        let mut items = Vec::with_capacity(entries.len());
        let mut report = GenerationReport {
            drill,
            kind,
            generated: Vec::with_capacity(entries.len()),
            failures: Vec::new(),
            skipped: Vec::new(),
        };
        for entry in entries {
            let (Some(spoken), Some(prompt)) = (kind.spoken_text(entry), kind.prompt(entry))
            else {
                warn!(drill = %report.drill, sid = entry.sid, "entry has no context sentence");
                report.skipped.push(entry.sid);
                continue;
            };
            let (audio, audio_error) = match synth.synthesize(spoken).await {
                Ok(clip) => (Some(clip), None),
                Err(err) => {
                    warn!(drill = %report.drill, sid = entry.sid, error = %err, "audio generation failed");
                    report.failures.push(ItemFailure {
                        sid: entry.sid,
                        reason: err.to_string(),
                    });
                    (None, Some(err.to_string()))
                }
            };
            report.generated.push(entry.sid);
            items.push(PracticeItem {
                sid: entry.sid,
                prompt,
                expected: entry.word.clone(),
                audio,
                audio_error,
            });
        }
        Self { items, report }
    }

    pub fn report(&self) -> &GenerationReport {
        &self.report
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DrillPhase {
    Idle,
    Generated,
    Answered,
    Checked,
}

/// Everything one learner has going on across drills.
#[derive(Debug, Default)]
pub struct PracticeSession {
    learner: Option<String>,
    items: BTreeMap<ItemKey, PracticeItem>,
    answers: HashMap<ItemKey, String>,
    phases: HashMap<DrillId, DrillPhase>,
    checked: HashMap<DrillId, CheckReport>,
}

impl PracticeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_learner(&mut self, name: &str) {
        let name = name.trim();
        self.learner = (!name.is_empty()).then(|| name.to_string());
    }

    pub fn learner(&self) -> Option<&str> {
        self.learner.as_deref()
    }

    /// Builds a generation and installs it. Callers sharing the session
    /// behind a lock should call [`Generation::build`] without the lock and
    /// then [`PracticeSession::install`].
    pub async fn generate(
        &mut self,
        drill: &DrillId,
        kind: DrillKind,
        entries: &[&WordEntry],
        synth: &dyn Synthesizer,
    ) -> GenerationReport {
        let generation = Generation::build(drill.clone(), kind, entries, synth).await;
        self.install(generation)
    }

    /// Replaces everything the drill held with `generation` in one step.
    pub fn install(&mut self, generation: Generation) -> GenerationReport {
        let Generation { items, report } = generation;
        let drill = report.drill.clone();
        self.clear(&drill);
        for item in items {
            let key = ItemKey::new(&drill, item.sid);
            self.answers.insert(key.clone(), String::new());
            self.items.insert(key, item);
        }
        self.phases.insert(drill.clone(), DrillPhase::Generated);
        info!(
            %drill,
            items = report.total(),
            failures = report.failures.len(),
            skipped = report.skipped.len(),
            "drill generated"
        );
        report
    }

    /// Drops the drill's items, answers and last check result.
    pub fn clear(&mut self, drill: &DrillId) {
        let keys: Vec<ItemKey> = self.items_range(drill).map(|(key, _)| key.clone()).collect();
        for key in keys {
            self.items.remove(&key);
            self.answers.remove(&key);
        }
        self.checked.remove(drill);
        self.phases.remove(drill);
    }

    /// Stores the learner's current text for one item.
    pub fn record_answer(&mut self, drill: &DrillId, sid: u32, text: &str) -> Result<()> {
        let key = ItemKey::new(drill, sid);
        if !self.items.contains_key(&key) {
            return Err(DrillError::UnknownItem {
                drill: drill.clone(),
                sid,
            });
        }
        self.answers.insert(key, text.to_string());
        self.phases.insert(drill.clone(), DrillPhase::Answered);
        Ok(())
    }

    pub fn answer(&self, drill: &DrillId, sid: u32) -> Option<&str> {
        self.answers
            .get(&ItemKey::new(drill, sid))
            .map(String::as_str)
    }

    pub fn item(&self, drill: &DrillId, sid: u32) -> Option<&PracticeItem> {
        self.items.get(&ItemKey::new(drill, sid))
    }

    /// The drill's items in SID order.
    pub fn items(&self, drill: &DrillId) -> impl Iterator<Item = &PracticeItem> + '_ {
        self.items_range(drill).map(|(_, item)| item)
    }

    pub fn audio(&self, drill: &DrillId, sid: u32) -> Result<&AudioClip> {
        self.item(drill, sid)
            .and_then(|item| item.audio.as_ref())
            .ok_or_else(|| DrillError::UnknownItem {
                drill: drill.clone(),
                sid,
            })
    }

    pub fn phase(&self, drill: &DrillId) -> DrillPhase {
        self.phases.get(drill).copied().unwrap_or(DrillPhase::Idle)
    }

    /// Keeps a check result for display until the drill changes again.
    pub fn record_check(&mut self, report: CheckReport) {
        if self.phase(&report.drill) == DrillPhase::Idle {
            return;
        }
        self.phases.insert(report.drill.clone(), DrillPhase::Checked);
        self.checked.insert(report.drill.clone(), report);
    }

    pub fn last_check(&self, drill: &DrillId) -> Option<&CheckReport> {
        match self.phase(drill) {
            DrillPhase::Checked => self.checked.get(drill),
            _ => None,
        }
    }

    fn items_range<'a>(
        &'a self,
        drill: &DrillId,
    ) -> impl Iterator<Item = (&'a ItemKey, &'a PracticeItem)> + 'a {
        let low = ItemKey::new(drill, u32::MIN);
        let high = ItemKey::new(drill, u32::MAX);
        self.items.range(low..=high)
    }
}

/// Picks up to `count` distinct entries at random for a quiz, in SID order.
pub fn sample_quiz<'a, R: Rng + ?Sized>(
    entries: &[&'a WordEntry],
    count: usize,
    rng: &mut R,
) -> Vec<&'a WordEntry> {
    let count = count.clamp(1, QUIZ_MAX_COUNT).min(entries.len());
    let mut picked: Vec<&'a WordEntry> = entries.choose_multiple(rng, count).copied().collect();
    picked.sort_by_key(|entry| entry.sid);
    picked
}
