use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single time-coded subtitle entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub id: u32,
    pub start: f64, // seconds
    pub end: f64,   // seconds
    pub text: String,
}

impl Cue {
    pub fn new(id: u32, start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            id,
            start,
            end,
            text: text.into(),
        }
    }

    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }

    /// Distance from `t` to the nearest edge of the cue
    pub fn edge_distance(&self, t: f64) -> f64 {
        (t - self.start).abs().min((t - self.end).abs())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubtitleError {
    #[error("failed to read subtitle file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse subtitle file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One entry of a transcript file. The transcript service emits `start` + `duration`,
/// hand-made cue lists use `start` + `end`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCue {
    Bounded { start: f64, end: f64, text: String },
    Timed { start: f64, duration: f64, text: String },
}

impl RawCue {
    fn into_parts(self) -> (f64, f64, String) {
        match self {
            RawCue::Bounded { start, end, text } => (start, end, text),
            RawCue::Timed { start, duration, text } => (start, start + duration, text),
        }
    }
}

/// Ordered list of cues. Lookups assume the list is sorted by start and
/// non-overlapping; when it is not, scan order decides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubtitleIndex {
    cues: Vec<Cue>,
}

impl SubtitleIndex {
    pub fn new(cues: Vec<Cue>) -> Self {
        Self { cues }
    }

    pub fn empty() -> Self {
        Self::default()
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

    pub fn load(path: &Path) -> Result<Self, SubtitleError> {
        let content = std::fs::read_to_string(path).map_err(|source| SubtitleError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let index = Self::from_json(&content).map_err(|source| SubtitleError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        log::info!("Loaded {} cues from {}", index.len(), path.display());
        Ok(index)
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let raw: Vec<RawCue> = serde_json::from_str(content)?;
        let mut parts: Vec<(f64, f64, String)> = raw.into_iter().map(RawCue::into_parts).collect();

        parts.retain(|(start, end, text)| {
            if end > start {
                true
            } else {
                log::warn!("Skipping cue {:?} with empty interval [{:.2}, {:.2}]", text, start, end);
                false
            }
        });
        // Stable, so cues sharing a start keep their file order
        parts.sort_by(|a, b| a.0.total_cmp(&b.0));

        let cues = parts
            .into_iter()
            .enumerate()
            .map(|(i, (start, end, text))| Cue::new(i as u32, start, end, text))
            .collect();
        Ok(Self::new(cues))
    }
}
