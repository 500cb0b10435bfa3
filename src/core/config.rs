use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Loop correction poll period
    pub correction_interval_ms: u64,
    /// Position display poll period
    pub display_interval_ms: u64,
    pub playback_speeds: Vec<f64>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            correction_interval_ms: 100,
            display_interval_ms: 200,
            playback_speeds: vec![0.5, 0.75, 1.0, 1.25, 1.5],
        }
    }
}

impl PlaybackConfig {
    pub fn correction_interval(&self) -> Duration {
        Duration::from_millis(self.correction_interval_ms.max(1))
    }

    pub fn display_interval(&self) -> Duration {
        Duration::from_millis(self.display_interval_ms.max(1))
    }

    pub fn supports_speed(&self, rate: f64) -> bool {
        self.playback_speeds.iter().any(|speed| (speed - rate).abs() < 1e-6)
    }

    /// Next configured speed after `current`, wrapping around
    pub fn next_speed(&self, current: f64) -> Option<f64> {
        let position = self
            .playback_speeds
            .iter()
            .position(|speed| (speed - current).abs() < 1e-6);
        match position {
            Some(i) => self.playback_speeds.get((i + 1) % self.playback_speeds.len()).copied(),
            None => self.playback_speeds.first().copied(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedPlayerConfig {
    pub duration_seconds: f64,
    /// Artificial delay on every position read
    pub read_latency_ms: u64,
}

impl Default for SimulatedPlayerConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 600.0,
            read_latency_ms: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub subtitle_path: Option<PathBuf>,
    #[serde(default = "default_watch_subtitles")]
    pub watch_subtitles: bool,
    #[serde(default = "default_marker_store_path")]
    pub marker_store_path: PathBuf,
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub simulated_player: SimulatedPlayerConfig,
}

fn default_watch_subtitles() -> bool {
    true
}

fn default_marker_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("loop-helper")
        .join("markers.json")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            subtitle_path: None,
            watch_subtitles: default_watch_subtitles(),
            marker_store_path: default_marker_store_path(),
            video_id: None,
            playback: PlaybackConfig::default(),
            simulated_player: SimulatedPlayerConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| anyhow::anyhow!("Failed to read config file at {}: {}", config_path.display(), e))?;

            match serde_json::from_str::<Self>(&content) {
                Ok(config) => {
                    log::info!("Loaded existing config from {}", config_path.display());
                    Ok(config)
                }
                Err(e) => {
                    log::warn!("Config file exists but has issues ({}), creating new one with defaults", e);
                    let new_config = Self::default();
                    new_config.save()
                        .map_err(|save_err| anyhow::anyhow!("Failed to save new config: {}", save_err))?;
                    log::info!("Created new config file at {}", config_path.display());
                    Ok(new_config)
                }
            }
        } else {
            log::info!("No config file found, creating default config");
            let config = Self::default();
            config.save()
                .map_err(|e| anyhow::anyhow!("Failed to save default config: {}", e))?;
            log::info!("Created new config file at {}", config_path.display());
            Ok(config)
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("loop-helper")
            .join("config.json")
    }

    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.marker_store_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::error!("Failed to create marker store directory {}: {}", parent.display(), e);
                return Err(anyhow::anyhow!("Failed to create marker store directory {}: {}", parent.display(), e));
            }
            log::debug!("Marker store directory ensured: {}", parent.display());
        }
        Ok(())
    }
}
