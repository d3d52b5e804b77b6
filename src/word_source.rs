use itertools::Itertools;
use std::collections::HashSet;

use crate::detection::DetectedObject;

/// Supplies the words eligible as the next target.
///
/// An empty result is a normal state, not a failure.
pub trait WordSource {
    fn next_candidates(&self) -> Vec<String>;
}

/// Fixed vocabulary, optionally re-offered once every entry is answered
#[derive(Debug, Clone)]
pub struct ListSource {
    vocabulary: Vec<String>,
    cycle: bool,
}

impl ListSource {
    pub fn new(vocabulary: Vec<String>, cycle: bool) -> Self {
        Self {
            vocabulary: vocabulary.into_iter().unique().collect(),
            cycle,
        }
    }

    pub fn is_cyclic(&self) -> bool {
        self.cycle
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn is_empty(&self) -> bool {
        self.vocabulary.is_empty()
    }
}

impl WordSource for ListSource {
    fn next_candidates(&self) -> Vec<String> {
        self.vocabulary.clone()
    }
}

/// Candidates derived from the latest filtered detection pass
#[derive(Debug, Clone, Default)]
pub struct DetectionSource {
    /// Labels allowed as targets; `None` accepts any label
    allowed: Option<HashSet<String>>,
    visible: Vec<String>,
}

impl DetectionSource {
    pub fn new(allowed: Option<HashSet<String>>) -> Self {
        Self {
            allowed,
            visible: Vec::new(),
        }
    }

    /// Replaces the previous pass wholesale
    pub fn feed(&mut self, detections: &[DetectedObject]) {
        self.visible = detections
            .iter()
            .map(|d| d.label.clone())
            .unique()
            .collect();
    }

    pub fn clear(&mut self) {
        self.visible.clear();
    }

    /// Every label in the latest pass, eligible or not
    pub fn visible_labels(&self) -> &[String] {
        &self.visible
    }
}

impl WordSource for DetectionSource {
    fn next_candidates(&self) -> Vec<String> {
        self.visible
            .iter()
            .filter(|label| {
                self.allowed
                    .as_ref()
                    .map_or(true, |allowed| allowed.contains(*label))
            })
            .cloned()
            .collect()
    }
}
