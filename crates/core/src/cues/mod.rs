use std::{path::Path, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{LipsyncError, Result};

/// Key under which Rhubarb-style timing documents store their cue list.
pub const CUES_KEY: &str = "mouthCues";

/// A single labelled time interval. Both bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub start: f64,
    pub end: f64,
    #[serde(rename = "value", alias = "label")]
    pub label: String,
}

impl Cue {
    pub fn new(start: f64, end: f64, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
        }
    }

    /// Returns true when `time` lies within `[start, end]`. Always false for NaN.
    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time <= self.end
    }
}

/// Returns the first cue in sequence order whose interval contains `time`.
///
/// Overlapping cues are resolved by position, not by closeness: the earliest
/// entry that matches wins.
pub fn resolve(time: f64, cues: &[Cue]) -> Option<&Cue> {
    cues.iter().find(|cue| cue.contains(time))
}

/// Immutable, cheaply clonable sequence of cues for one utterance.
///
/// Cue order is preserved exactly as received. Replacing the active set means
/// swapping the whole value, never editing it.
#[derive(Debug, Clone)]
pub struct CueSet {
    cues: Arc<[Cue]>,
    /// `prefix_max_end[i]` is the greatest `end` among `cues[..i]`.
    prefix_max_end: Arc<[f64]>,
}

impl CueSet {
    pub fn new(cues: Vec<Cue>) -> Self {
        let mut prefix_max_end = Vec::with_capacity(cues.len());
        let mut running = f64::NEG_INFINITY;
        for cue in &cues {
            prefix_max_end.push(running);
            running = running.max(cue.end);
        }

        Self {
            cues: cues.into(),
            prefix_max_end: prefix_max_end.into(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a cue set from a parsed timing document.
    ///
    /// Never fails: a missing or mistyped cue list yields an empty set and
    /// malformed entries are skipped. Each problem is logged.
    pub fn from_document(document: &Value) -> Self {
        let Some(entries) = document.get(CUES_KEY) else {
            tracing::warn!("timing data has no `{CUES_KEY}` entry; treating as silence");
            return Self::empty();
        };
        let Some(entries) = entries.as_array() else {
            tracing::warn!("timing data `{CUES_KEY}` is not a list; treating as silence");
            return Self::empty();
        };

        let cues = entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match Cue::deserialize(entry) {
                Ok(cue) => Some(cue),
                Err(err) => {
                    tracing::warn!(index, %err, "skipping malformed cue");
                    None
                }
            })
            .collect();

        Self::new(cues)
    }

    /// Parses a timing document from JSON text. Only syntax errors are reported.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(text)?;
        Ok(Self::from_document(&document))
    }

    /// Reads and parses a timing document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Latest end time across all cues, or zero for an empty set.
    pub fn duration(&self) -> f64 {
        self.cues
            .iter()
            .map(|cue| cue.end)
            .filter(|end| end.is_finite())
            .fold(0.0, f64::max)
    }

    pub fn resolve(&self, time: f64) -> Option<&Cue> {
        resolve(time, &self.cues)
    }

    /// Strict check used by tooling. The engine itself never requires it.
    pub fn validate(&self) -> Result<()> {
        let mut previous_start = f64::NEG_INFINITY;
        for (index, cue) in self.cues.iter().enumerate() {
            let reason = if !cue.start.is_finite() || !cue.end.is_finite() {
                Some("bounds must be finite".to_string())
            } else if cue.start < 0.0 {
                Some(format!("start {} is negative", cue.start))
            } else if cue.end < cue.start {
                Some(format!("end {} precedes start {}", cue.end, cue.start))
            } else if cue.start < previous_start {
                Some(format!(
                    "start {} is earlier than the previous cue's start {previous_start}",
                    cue.start
                ))
            } else {
                None
            };

            if let Some(reason) = reason {
                return Err(LipsyncError::InvalidCue { index, reason });
            }
            previous_start = cue.start;
        }
        Ok(())
    }

    /// Returns true when both handles point at the same published set.
    pub fn same_set(&self, other: &CueSet) -> bool {
        Arc::ptr_eq(&self.cues, &other.cues)
    }
}

impl Default for CueSet {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl PartialEq for CueSet {
    fn eq(&self, other: &Self) -> bool {
        self.cues == other.cues
    }
}

impl From<Vec<Cue>> for CueSet {
    fn from(cues: Vec<Cue>) -> Self {
        Self::new(cues)
    }
}

/// Resolution helper that remembers the last matching index.
///
/// Returns exactly what [`resolve`] returns for any sequence of timestamps,
/// including backwards seeks: a remembered hit is only trusted when no earlier
/// cue ends at or after `time`.
#[derive(Debug, Clone, Default)]
pub struct CueCursor {
    hint: Option<usize>,
}

impl CueCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.hint = None;
    }

    pub fn resolve<'a>(&mut self, time: f64, set: &'a CueSet) -> Option<&'a Cue> {
        if let Some(hint) = self.hint {
            for index in [hint, hint + 1] {
                if Self::is_first_match(set, index, time) {
                    self.hint = Some(index);
                    return set.cues.get(index);
                }
            }
        }

        let found = set.cues.iter().position(|cue| cue.contains(time));
        if found.is_some() {
            self.hint = found;
        }
        found.map(|index| &set.cues[index])
    }

    fn is_first_match(set: &CueSet, index: usize, time: f64) -> bool {
        match (set.cues.get(index), set.prefix_max_end.get(index)) {
            (Some(cue), Some(&earlier_end)) => cue.contains(time) && earlier_end < time,
            _ => false,
        }
    }
}
