//! Committed-image history with undo.

use crate::image::Image;

pub const ORIGINAL_LABEL: &str = "original image";

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub label: String,
    pub image: Image,
}

/// Stack of committed images. The bottom entry is the loaded image and is
/// never removed by [`History::undo`].
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new(original: Image) -> Self {
        History {
            entries: vec![HistoryEntry {
                label: ORIGINAL_LABEL.to_string(),
                image: original,
            }],
        }
    }

    pub fn push(&mut self, label: impl Into<String>, image: Image) {
        self.entries.push(HistoryEntry {
            label: label.into(),
            image,
        });
    }

    /// Drop the latest commit. Returns `false` if only the original is left.
    pub fn undo(&mut self) -> bool {
        if self.entries.len() > 1 {
            self.entries.pop();
            true
        } else {
            false
        }
    }

    pub fn current(&self) -> &HistoryEntry {
        // `entries` is never empty
        &self.entries[self.entries.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.label.as_str()).collect()
    }

    /// Start over from a newly loaded image.
    pub fn reset(&mut self, original: Image) {
        *self = History::new(original);
    }
}
