use crate::core::error::StoreError;
use crate::core::marker::{Marker, VocabEntry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Partial update of a stored marker. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vocab_data: Option<BTreeMap<usize, VocabEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub press_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub misunderstood_indices: Option<BTreeSet<usize>>,
}

impl MarkerPatch {
    pub fn is_empty(&self) -> bool {
        self.vocab_data.is_none()
            && self.note.is_none()
            && self.press_count.is_none()
            && self.misunderstood_indices.is_none()
    }

    fn apply(&self, marker: &mut Marker) {
        if let Some(vocab_data) = &self.vocab_data {
            marker.vocab_data = vocab_data.clone();
        }
        if let Some(note) = &self.note {
            marker.note = Some(note.clone());
        }
        if let Some(press_count) = self.press_count {
            marker.press_count = press_count;
        }
        if let Some(indices) = &self.misunderstood_indices {
            marker.misunderstood_indices = indices.clone();
        }
    }
}

/// External home of the marker collection. The engine itself keeps markers
/// in memory only and hands them over on demand.
pub trait MarkerStore {
    /// Newest first
    fn load_all(&self) -> Result<Vec<Marker>, StoreError>;
    /// Insert or replace by id
    fn save(&mut self, marker: &Marker) -> Result<(), StoreError>;
    /// Returns false when nothing changed (unknown id or empty patch)
    fn update(&mut self, id: &str, patch: &MarkerPatch) -> Result<bool, StoreError>;
    /// Returns false when the id was not stored
    fn delete(&mut self, id: &str) -> Result<bool, StoreError>;
}

/// Keeps the whole collection in a single JSON file
pub struct JsonFileStore {
    path: PathBuf,
    markers: BTreeMap<String, Marker>,
}

impl JsonFileStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let markers = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                let list: Vec<Marker> = serde_json::from_str(&content)?;
                list.into_iter().map(|marker| (marker.id.clone(), marker)).collect()
            }
        } else {
            BTreeMap::new()
        };

        log::info!("Opened marker store {} ({} markers)", path.display(), markers.len());
        Ok(Self {
            path: path.to_path_buf(),
            markers,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    fn flush(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let list: Vec<&Marker> = self.markers.values().collect();
        let content = serde_json::to_string_pretty(&list)?;

        // Previous file stays intact if the write fails
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &self.path)?;
        log::debug!("Flushed {} markers to {}", list.len(), self.path.display());
        Ok(())
    }
}

impl MarkerStore for JsonFileStore {
    fn load_all(&self) -> Result<Vec<Marker>, StoreError> {
        let mut markers: Vec<Marker> = self.markers.values().cloned().collect();
        markers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(markers)
    }

    fn save(&mut self, marker: &Marker) -> Result<(), StoreError> {
        self.markers.insert(marker.id.clone(), marker.clone());
        self.flush()
    }

    fn update(&mut self, id: &str, patch: &MarkerPatch) -> Result<bool, StoreError> {
        if patch.is_empty() {
            return Ok(false);
        }
        match self.markers.get_mut(id) {
            Some(marker) => {
                patch.apply(marker);
                self.flush()?;
                Ok(true)
            }
            None => {
                log::warn!("Update for unknown marker {}", id);
                Ok(false)
            }
        }
    }

    fn delete(&mut self, id: &str) -> Result<bool, StoreError> {
        if self.markers.remove(id).is_some() {
            self.flush()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
