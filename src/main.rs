mod core;
mod host;
mod hotkeys;
mod playback;

use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use crate::core::{AppConfig, CueWatcher, JsonFileStore, MarkerStore, SubtitleIndex, SubtitleReload};
use crate::host::{Flow, Host};
use crate::hotkeys::HostCommand;
use crate::playback::{PracticeSession, SimulatedPlayer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut config = AppConfig::load()?;
    config.ensure_directories()?;
    if let Some(path) = std::env::args().nth(1) {
        config.subtitle_path = Some(PathBuf::from(path));
    }

    let subtitles = match &config.subtitle_path {
        Some(path) => SubtitleIndex::load(path).unwrap_or_else(|e| {
            log::warn!("{}; continuing without subtitles", e);
            SubtitleIndex::empty()
        }),
        None => {
            log::info!("No subtitle file configured");
            SubtitleIndex::empty()
        }
    };
    if subtitles.is_empty() {
        log::warn!("No subtitle cues; captures use a fixed window around the playhead");
    } else {
        log::info!("Loaded {} cues", subtitles.len());
    }

    let player = Arc::new(SimulatedPlayer::new(&config.simulated_player));
    let session = PracticeSession::new(player.clone(), subtitles, config.playback.clone());
    player.mark_ready();

    let store = JsonFileStore::open(&config.marker_store_path)?;
    session.restore_markers(store.load_all()?, config.video_id.clone());

    // Keep the watcher alive for the whole run
    let mut watcher = None;
    let mut reloads = None;
    if config.watch_subtitles {
        if let Some(path) = &config.subtitle_path {
            match CueWatcher::new(path) {
                Ok((cue_watcher, receiver)) => {
                    watcher = Some(cue_watcher);
                    reloads = Some(receiver);
                }
                Err(e) => log::warn!("Subtitle watching disabled: {}", e),
            }
        }
    }

    let mut host = Host::new(session, player, store);
    println!("{}", HostCommand::help_text());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match host.handle_line(&line).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Quit) => break,
                    Err(e) => log::error!("{}", e),
                }
            }
            Some(reload) = next_reload(&mut reloads) => {
                println!("Reloaded {} ({} cues)", reload.path.display(), reload.index.len());
                host.session().replace_subtitles(reload.index);
            }
        }
    }

    host.shutdown()?;
    drop(watcher);
    Ok(())
}

async fn next_reload(reloads: &mut Option<broadcast::Receiver<SubtitleReload>>) -> Option<SubtitleReload> {
    let Some(receiver) = reloads else {
        return std::future::pending().await;
    };
    loop {
        match receiver.recv().await {
            Ok(reload) => return Some(reload),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("Skipped {} subtitle reloads", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => {
                *reloads = None;
                return None;
            }
        }
    }
}
