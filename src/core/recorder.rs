use crate::core::cue::Cue;
use crate::core::error::{EngineError, EngineResult};
use crate::core::marker::{Marker, TagType, VocabEntry};

/// Result of a single capture
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Created { id: String },
    Merged { id: String, press_count: u32 },
}

impl CaptureOutcome {
    pub fn marker_id(&self) -> &str {
        match self {
            CaptureOutcome::Created { id } | CaptureOutcome::Merged { id, .. } => id,
        }
    }
}

/// Owns the marker collection in insertion order
#[derive(Debug, Default)]
pub struct MarkerRecorder {
    markers: Vec<Marker>,
    video_id: Option<String>,
}

impl MarkerRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a previously persisted collection. Oldest first, so the most
    /// recent capture ends up last.
    pub fn with_markers(mut markers: Vec<Marker>) -> Self {
        markers.sort_by_key(|marker| marker.created_at);
        Self {
            markers,
            video_id: None,
        }
    }

    pub fn set_video_id(&mut self, video_id: Option<String>) {
        self.video_id = video_id;
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn get(&self, id: &str) -> Option<&Marker> {
        self.markers.iter().find(|marker| marker.id == id)
    }

    /// Record a capture at `t`, snapped to `matched` when there is one.
    ///
    /// Only the last marker is a merge candidate: pressing again on the same
    /// sentence counts another attempt, moving away and back starts a new marker.
    pub fn capture(&mut self, matched: Option<&Cue>, t: f64) -> CaptureOutcome {
        let (start, end) = match matched {
            Some(cue) => (cue.start, cue.end),
            None => Marker::fallback_window(t),
        };

        if let Some(last) = self.markers.last_mut() {
            if last.same_interval(start, end) {
                last.press_count = last.effective_press_count() + 1;
                log::debug!("Capture at {:.2}s merged into {} (press {})", t, last.id, last.press_count);
                return CaptureOutcome::Merged {
                    id: last.id.clone(),
                    press_count: last.press_count,
                };
            }
        }

        let mut marker = match matched {
            Some(cue) => Marker::snapped(start, end, cue.text.clone()),
            None => Marker::unsnapped(start, end),
        };
        marker.video_id = self.video_id.clone();
        let id = marker.id.clone();
        log::info!("New marker {} at {}", id, marker.label());
        self.markers.push(marker);
        CaptureOutcome::Created { id }
    }

    pub fn delete(&mut self, id: &str) -> EngineResult<Marker> {
        let position = self
            .markers
            .iter()
            .position(|marker| marker.id == id)
            .ok_or_else(|| EngineError::MarkerNotFound(id.to_string()))?;
        Ok(self.markers.remove(position))
    }

    /// Returns whether the tag is set afterwards
    pub fn toggle_tag(&mut self, id: &str, tag: TagType) -> EngineResult<bool> {
        let marker = self.marker_mut(id)?;
        if marker.tags.remove(&tag) {
            Ok(false)
        } else {
            marker.tags.insert(tag);
            Ok(true)
        }
    }

    /// Returns whether the word is marked as misunderstood afterwards
    pub fn toggle_misunderstood(&mut self, id: &str, word_index: usize) -> EngineResult<bool> {
        let marker = self.marker_mut(id)?;
        check_word_index(marker, word_index)?;
        if marker.misunderstood_indices.remove(&word_index) {
            Ok(false)
        } else {
            marker.misunderstood_indices.insert(word_index);
            Ok(true)
        }
    }

    /// `None` clears the entry
    pub fn set_vocab(&mut self, id: &str, word_index: usize, entry: Option<VocabEntry>) -> EngineResult<()> {
        let marker = self.marker_mut(id)?;
        check_word_index(marker, word_index)?;
        match entry {
            Some(entry) => {
                marker.vocab_data.insert(word_index, entry);
            }
            None => {
                marker.vocab_data.remove(&word_index);
            }
        }
        Ok(())
    }

    pub fn set_note(&mut self, id: &str, note: Option<String>) -> EngineResult<()> {
        let marker = self.marker_mut(id)?;
        marker.note = note.filter(|n| !n.trim().is_empty());
        Ok(())
    }

    fn marker_mut(&mut self, id: &str) -> EngineResult<&mut Marker> {
        self.markers
            .iter_mut()
            .find(|marker| marker.id == id)
            .ok_or_else(|| EngineError::MarkerNotFound(id.to_string()))
    }
}

fn check_word_index(marker: &Marker, index: usize) -> EngineResult<()> {
    let word_count = marker.words().len();
    if index < word_count {
        Ok(())
    } else {
        Err(EngineError::WordIndexOutOfRange { index, word_count })
    }
}
