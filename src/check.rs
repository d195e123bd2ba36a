use serde::Serialize;
use std::collections::BTreeMap;

use crate::session::{DrillId, PracticeSession};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckedItem {
    pub sid: u32,
    pub prompt: String,
    pub expected: String,
    /// The learner's answer, trimmed.
    pub answer: String,
    pub correct: bool,
}

/// Scored result of checking every item of one drill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub drill: DrillId,
    pub learner: Option<String>,
    pub results: BTreeMap<u32, bool>,
    pub items: Vec<CheckedItem>,
    pub correct_count: usize,
    pub total: usize,
}

impl CheckReport {
    pub fn summary(&self) -> String {
        match &self.learner {
            Some(name) => format!("{name}: {}/{} correct.", self.correct_count, self.total),
            None => format!("{}/{} correct.", self.correct_count, self.total),
        }
    }

    pub fn incorrect(&self) -> impl Iterator<Item = &CheckedItem> {
        self.items.iter().filter(|item| !item.correct)
    }
}

/// Answers match when they agree after trimming the answer and lower-casing
/// both sides.
pub fn is_correct(answer: &str, expected: &str) -> bool {
    answer.trim().to_lowercase() == expected.to_lowercase()
}

/// Scores the drill's current answers. A missing answer counts as wrong.
pub fn check(session: &PracticeSession, drill: &DrillId) -> CheckReport {
    let mut results = BTreeMap::new();
    let mut items = Vec::new();
    for item in session.items(drill) {
        let answer = session.answer(drill, item.sid).unwrap_or("").trim();
        let correct = is_correct(answer, &item.expected);
        results.insert(item.sid, correct);
        items.push(CheckedItem {
            sid: item.sid,
            prompt: item.prompt.clone(),
            expected: item.expected.clone(),
            answer: answer.to_string(),
            correct,
        });
    }
    let correct_count = items.iter().filter(|item| item.correct).count();
    CheckReport {
        drill: drill.clone(),
        learner: session.learner().map(str::to_string),
        total: items.len(),
        results,
        items,
        correct_count,
    }
}

impl PracticeSession {
    pub fn check(&self, drill: &DrillId) -> CheckReport {
        check(self, drill)
    }
}
