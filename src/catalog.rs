use serde::Serialize;

use crate::error::{DrillError, Result};
use crate::session::{DrillId, DrillKind};

pub const DEFAULT_DATA_BASE: &str = "https://raw.githubusercontent.com/MK316/CEFR/refs/heads/main/data";

/// A named word-list file under the data base location.
#[derive(Debug, Clone, Serialize)]
pub struct WordlistSource {
    pub id: &'static str,
    pub label: &'static str,
    pub location: String,
}

/// One drill tab: which list it draws from and how it is played.
#[derive(Debug, Clone, Serialize)]
pub struct DrillSpec {
    pub id: DrillId,
    /// Drills sharing a family are shown as tabs of one page.
    pub family: &'static str,
    pub level: &'static str,
    pub kind: DrillKind,
    pub wordlist: &'static str,
    /// Draw a random sample from the range instead of using all of it.
    pub quiz: bool,
}

impl DrillSpec {
    pub fn title(&self) -> String {
        if self.quiz {
            format!("{} Quiz: {}", self.kind.label(), self.level)
        } else {
            format!("{}: {}", self.kind.label(), self.level)
        }
    }
}

const WORDLIST_FILES: &[(&str, &str, &str)] = &[
    ("b2", "Wordlist B2", "CEFR_B_250505.csv"),
    ("c1", "Wordlist C1", "CEFR_C_250505.csv"),
    ("b2-words", "Level B words", "B2.txt"),
    ("c1-words", "Level C words", "C1f.txt"),
    ("b2-context", "Level B words in context", "B2WICf.csv"),
    ("c1-context", "Level C words in context", "C1WICff.csv"),
];

const DRILLS: &[(&str, &str, &str, DrillKind, &str, bool)] = &[
    ("spell-b", "spell", "Level B", DrillKind::Spelling, "b2-words", false),
    ("spell-c", "spell", "Level C", DrillKind::Spelling, "c1-words", false),
    ("wic-b", "wic", "Level B", DrillKind::Cloze, "b2-context", false),
    ("wic-c", "wic", "Level C", DrillKind::Cloze, "c1-context", false),
    ("quiz-b", "quiz", "Level B", DrillKind::Cloze, "b2-context", true),
    ("quiz-c", "quiz", "Level C", DrillKind::Cloze, "c1-context", true),
    ("listen-b", "listen", "Level B", DrillKind::Listening, "b2-context", false),
    ("listen-c", "listen", "Level C", DrillKind::Listening, "c1-context", false),
];

/// The word lists and drills the application offers.
#[derive(Debug, Clone)]
pub struct Catalog {
    wordlists: Vec<WordlistSource>,
    drills: Vec<DrillSpec>,
}

impl Catalog {
    /// Builds the catalog with every list file resolved under `base`, which
    /// may be a URL or a local directory.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        let wordlists = WORDLIST_FILES
            .iter()
            .map(|&(id, label, file)| WordlistSource {
                id,
                label,
                location: format!("{base}/{file}"),
            })
            .collect();
        let drills = DRILLS
            .iter()
            .map(|&(id, family, level, kind, wordlist, quiz)| DrillSpec {
                id: DrillId::from(id),
                family,
                level,
                kind,
                wordlist,
                quiz,
            })
            .collect();
        Self { wordlists, drills }
    }

    pub fn wordlists(&self) -> &[WordlistSource] {
        &self.wordlists
    }

    pub fn drills(&self) -> &[DrillSpec] {
        &self.drills
    }

    pub fn wordlist(&self, id: &str) -> Result<&WordlistSource> {
        self.wordlists
            .iter()
            .find(|source| source.id == id)
            .ok_or_else(|| DrillError::UnknownWordlist(id.to_string()))
    }

    pub fn drill(&self, id: &str) -> Result<&DrillSpec> {
        self.drills
            .iter()
            .find(|drill| drill.id.as_str() == id)
            .ok_or_else(|| DrillError::UnknownDrill(id.to_string()))
    }

    /// Location of the list a drill draws from.
    pub fn drill_source(&self, drill: &DrillSpec) -> Result<&WordlistSource> {
        self.wordlist(drill.wordlist)
    }

    /// The drill and its sibling tabs, in catalog order.
    pub fn family<'a>(&'a self, drill: &'a DrillSpec) -> impl Iterator<Item = &'a DrillSpec> + 'a {
        self.drills
            .iter()
            .filter(move |other| other.family == drill.family)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::with_base(DEFAULT_DATA_BASE)
    }
}
