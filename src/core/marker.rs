use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Merge window for comparing marker boundaries (seconds)
pub const MERGE_EPSILON: f64 = 0.1;

/// Half-width of the window used when no cue matches (seconds)
pub const FALLBACK_HALF_WINDOW: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagType {
    Vocabulary,
    Grammar,
    Speed,
    Pronunciation,
    Accent,
    Idiom,
}

impl TagType {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "vocabulary" | "vocab" => Some(TagType::Vocabulary),
            "grammar" => Some(TagType::Grammar),
            "speed" => Some(TagType::Speed),
            "pronunciation" => Some(TagType::Pronunciation),
            "accent" => Some(TagType::Accent),
            "idiom" => Some(TagType::Idiom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TagType::Vocabulary => "vocabulary",
            TagType::Grammar => "grammar",
            TagType::Speed => "speed",
            TagType::Pronunciation => "pronunciation",
            TagType::Accent => "accent",
            TagType::Idiom => "idiom",
        }
    }
}

impl std::fmt::Display for TagType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VocabEntry {
    pub definition: String,
    #[serde(default)]
    pub notes: String,
}

/// A point of confusion captured during playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    pub start: f64, // seconds
    pub end: f64,   // seconds
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle_text: Option<String>,
    #[serde(default = "default_press_count")]
    pub press_count: u32,
    #[serde(default)]
    pub tags: BTreeSet<TagType>,
    #[serde(default)]
    pub misunderstood_indices: BTreeSet<usize>,
    #[serde(default)]
    pub vocab_data: BTreeMap<usize, VocabEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

fn default_press_count() -> u32 {
    1
}

impl Marker {
    /// Marker snapped to a subtitle interval
    pub fn snapped(start: f64, end: f64, text: impl Into<String>) -> Self {
        let mut marker = Self::unsnapped(start, end);
        marker.subtitle_text = Some(text.into());
        marker
    }

    pub fn unsnapped(start: f64, end: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            video_id: None,
            start,
            end,
            created_at: Utc::now(),
            subtitle_text: None,
            press_count: 1,
            tags: BTreeSet::new(),
            misunderstood_indices: BTreeSet::new(),
            vocab_data: BTreeMap::new(),
            note: None,
        }
    }

    /// Fixed window around `t` for captures with no matching cue
    pub fn fallback_window(t: f64) -> (f64, f64) {
        ((t - FALLBACK_HALF_WINDOW).max(0.0), t + FALLBACK_HALF_WINDOW)
    }

    /// Stored press counts of 0 come from older records and count as one press
    pub fn effective_press_count(&self) -> u32 {
        self.press_count.max(1)
    }

    pub fn same_interval(&self, start: f64, end: f64) -> bool {
        (self.start - start).abs() < MERGE_EPSILON && (self.end - end).abs() < MERGE_EPSILON
    }

    pub fn words(&self) -> Vec<&str> {
        self.subtitle_text
            .as_deref()
            .map(|text| text.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn label(&self) -> String {
        let range = format!("[{:.2} - {:.2}]", self.start, self.end);
        match &self.subtitle_text {
            Some(text) => format!("{} {}", range, text),
            None => range,
        }
    }
}
