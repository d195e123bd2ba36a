use csv::{ReaderBuilder, StringRecord, Trim};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

use crate::error::{DrillError, Result};

static SID_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid SID pattern"));

const SID_COLUMN: &str = "SID";
const WORD_COLUMN: &str = "WORD";
const POS_COLUMN: &str = "POS";
const CONTEXT_COLUMN: &str = "Context";

/// One vocabulary row. `sid` is the only lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordEntry {
    pub sid: u32,
    pub word: String,
    pub pos: Option<String>,
    pub context: Option<String>,
}

/// An ordered, immutable word list as loaded from one source.
#[derive(Debug, Clone, Serialize)]
pub struct WordList {
    source: String,
    entries: Vec<WordEntry>,
}

impl WordList {
    pub fn new(source: impl Into<String>, entries: Vec<WordEntry>) -> Self {
        Self {
            source: source.into(),
            entries,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn entries(&self) -> &[WordEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Smallest and largest SID present, if the list has any rows.
    pub fn bounds(&self) -> Option<(u32, u32)> {
        let min = self.entries.iter().map(|entry| entry.sid).min()?;
        let max = self.entries.iter().map(|entry| entry.sid).max()?;
        Some((min, max))
    }

    pub fn get(&self, sid: u32) -> Option<&WordEntry> {
        self.entries.iter().find(|entry| entry.sid == sid)
    }

    pub fn has_context(&self) -> bool {
        self.entries.iter().any(|entry| entry.context.is_some())
    }
}

/// Delimiter family of a word-list source, inferred from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Tsv,
    Csv,
}

impl SourceFormat {
    pub fn infer(location: &str) -> Self {
        let path = location
            .split(['?', '#'])
            .next()
            .unwrap_or(location)
            .to_ascii_lowercase();
        if path.ends_with(".csv") {
            SourceFormat::Csv
        } else {
            SourceFormat::Tsv
        }
    }

    fn delimiter(self) -> u8 {
        match self {
            SourceFormat::Tsv => b'\t',
            SourceFormat::Csv => b',',
        }
    }
}

struct Columns {
    sid: usize,
    word: usize,
    pos: Option<usize>,
    context: Option<usize>,
}

impl Columns {
    fn locate(headers: &StringRecord, location: &str) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim().eq_ignore_ascii_case(name))
        };
        let sid = find(SID_COLUMN).ok_or_else(|| {
            DrillError::unavailable(location, format!("missing {SID_COLUMN} column"))
        })?;
        let word = find(WORD_COLUMN).ok_or_else(|| {
            DrillError::unavailable(location, format!("missing {WORD_COLUMN} column"))
        })?;
        Ok(Self {
            sid,
            word,
            pos: find(POS_COLUMN),
            context: find(CONTEXT_COLUMN),
        })
    }
}

/// Parses the raw text of a word list. `location` picks the delimiter and is
/// kept on the resulting list.
pub fn parse_wordlist(location: &str, text: &str) -> Result<WordList> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let format = SourceFormat::infer(location);
    let mut reader = ReaderBuilder::new()
        .delimiter(format.delimiter())
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|err| DrillError::unavailable(location, err))?
        .clone();
    let columns = Columns::locate(&headers, location)?;

    let mut entries = Vec::new();
    let mut seen = HashSet::new();
    for record in reader.records() {
        let record = record.map_err(|err| DrillError::MalformedRow {
            line: err.position().map(|pos| pos.line()).unwrap_or(0),
            reason: err.to_string(),
        })?;
        let line = record.position().map(|pos| pos.line()).unwrap_or(0);
        let sid_cell = record.get(columns.sid).unwrap_or("");
        let Some(sid) = extract_sid(sid_cell, line)? else {
            debug!(line, cell = sid_cell, "skipping row without a SID");
            continue;
        };
        let word = clean_headword(record.get(columns.word).unwrap_or("")).ok_or_else(|| {
            DrillError::MalformedRow {
                line,
                reason: format!("SID {sid} has an empty {WORD_COLUMN}"),
            }
        })?;
        if !seen.insert(sid) {
            return Err(DrillError::MalformedRow {
                line,
                reason: format!("SID {sid} appears more than once"),
            });
        }
        entries.push(WordEntry {
            sid,
            word,
            pos: optional_cell(&record, columns.pos),
            context: optional_cell(&record, columns.context),
        });
    }
    Ok(WordList::new(location, entries))
}

/// First run of digits in the SID cell. `Ok(None)` means the row has no id.
fn extract_sid(cell: &str, line: u64) -> Result<Option<u32>> {
    let Some(digits) = SID_DIGITS.find(cell) else {
        return Ok(None);
    };
    digits
        .as_str()
        .parse::<u32>()
        .map(Some)
        .map_err(|_| DrillError::MalformedRow {
            line,
            reason: format!("SID {:?} does not fit a 32-bit id", digits.as_str()),
        })
}

/// Reduces an annotated WORD cell such as `"acid n."` to its headword.
pub fn clean_headword(cell: &str) -> Option<String> {
    cell.split_whitespace().next().map(str::to_string)
}

fn optional_cell(record: &StringRecord, index: Option<usize>) -> Option<String> {
    index
        .and_then(|idx| record.get(idx))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
