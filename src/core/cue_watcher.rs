use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use tokio::sync::broadcast;

use crate::core::cue::SubtitleIndex;

/// Reloaded subtitle track
#[derive(Debug, Clone)]
pub struct SubtitleReload {
    pub path: PathBuf,
    pub index: SubtitleIndex,
}

/// Watches a transcript file and broadcasts a fresh index whenever it changes
pub struct CueWatcher {
    _watcher: RecommendedWatcher,
}

impl CueWatcher {
    pub fn new(subtitle_path: &Path) -> anyhow::Result<(Self, broadcast::Receiver<SubtitleReload>)> {
        let (tx, rx) = mpsc::channel();
        let (event_sender, event_receiver) = broadcast::channel(8);

        // Editors often replace the file, so watch the parent directory
        let directory = subtitle_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let mut watcher = notify::recommended_watcher(tx)?;
        watcher.watch(&directory, RecursiveMode::NonRecursive)?;

        let target = subtitle_path.to_path_buf();
        thread::spawn(move || {
            while let Ok(event) = rx.recv() {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        log::warn!("Subtitle watcher error: {}", e);
                        continue;
                    }
                };
                if !Self::is_relevant(&event, &target) {
                    continue;
                }

                match SubtitleIndex::load(&target) {
                    Ok(index) => {
                        let reload = SubtitleReload {
                            path: target.clone(),
                            index,
                        };
                        if event_sender.send(reload).is_err() {
                            log::debug!("No subscribers for subtitle reload of {}", target.display());
                        }
                    }
                    // Half-written files fail to parse; the next write event retries
                    Err(e) => log::warn!("Ignoring subtitle change: {}", e),
                }
            }
        });

        Ok((
            CueWatcher { _watcher: watcher },
            event_receiver,
        ))
    }

    fn is_relevant(event: &Event, target: &Path) -> bool {
        let kind_matches = matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_));
        kind_matches
            && event
                .paths
                .iter()
                .any(|path| path.file_name().is_some() && path.file_name() == target.file_name())
    }
}
