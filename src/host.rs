use std::sync::Arc;
use tokio::sync::watch;

use crate::core::{CaptureOutcome, EngineResult, JsonFileStore, MarkerPatch, MarkerStore};
use crate::hotkeys::{CaptureTrigger, HoldToPeek, HostCommand};
use crate::playback::{format_clock, PlaybackTarget, PositionSnapshot, PracticeSession, SimulatedPlayer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Text front end: turns host commands into session operations and keeps the
/// marker store in step with every change.
pub struct Host {
    session: PracticeSession,
    player: Arc<SimulatedPlayer>,
    store: JsonFileStore,
    capture_key: CaptureTrigger,
    peek_key: HoldToPeek,
    position: watch::Receiver<PositionSnapshot>,
}

impl Host {
    pub fn new(session: PracticeSession, player: Arc<SimulatedPlayer>, store: JsonFileStore) -> Self {
        let position = session.subscribe_position();
        Self {
            position,
            session,
            player,
            store,
            capture_key: CaptureTrigger::new(),
            peek_key: HoldToPeek::new(),
        }
    }

    pub fn session(&self) -> &PracticeSession {
        &self.session
    }

    pub async fn handle_line(&mut self, line: &str) -> anyhow::Result<Flow> {
        if line.trim().is_empty() {
            return Ok(Flow::Continue);
        }
        match HostCommand::parse(line) {
            Ok(command) => self.execute(command).await,
            Err(e) => {
                println!("{} (type 'help' for commands)", e);
                Ok(Flow::Continue)
            }
        }
    }

    pub async fn execute(&mut self, command: HostCommand) -> anyhow::Result<Flow> {
        log::debug!("Host command: {:?}", command);
        match command {
            HostCommand::Capture => self.capture().await?,
            HostCommand::CaptureKey(edge) => {
                if self.capture_key.on_key(edge) {
                    self.capture().await?;
                }
            }
            HostCommand::PeekKey(edge) => {
                if let Some(true) = self.peek_key.on_key(edge) {
                    let t = self.player.position();
                    match self.session.cue_at(t) {
                        Some(cue) => println!("[{}] {}", format_clock(t), cue.text),
                        None => println!("[{}] (no subtitle)", format_clock(t)),
                    }
                }
            }
            HostCommand::TogglePlay => self.session.toggle_play(),
            HostCommand::Loop(n) => {
                let id = self.marker_id(n)?;
                report(self.session.start_loop(&id));
            }
            HostCommand::Preview(n) => {
                let id = self.marker_id(n)?;
                report(self.session.preview_marker(&id));
            }
            HostCommand::Segment { start, end } => {
                report(self.session.start_one_shot(start, end));
            }
            HostCommand::Stop => {
                if !self.session.stop_loop() {
                    println!("Nothing to stop");
                }
            }
            HostCommand::Speed(Some(rate)) => {
                report(self.session.set_speed(rate));
            }
            HostCommand::Speed(None) => match self.session.cycle_speed() {
                Some(rate) => println!("Speed {}x", rate),
                None => println!("No playback speeds configured"),
            },
            HostCommand::Delete(n) => {
                let id = self.marker_id(n)?;
                if let Some(marker) = report(self.session.delete_marker(&id)) {
                    self.store.delete(&marker.id)?;
                    println!("Deleted {}", marker.label());
                }
            }
            HostCommand::Tag(n, tag) => {
                let id = self.marker_id(n)?;
                if let Some(enabled) = report(self.session.toggle_tag(&id, tag)) {
                    println!("{} {}", if enabled { "Tagged" } else { "Untagged" }, tag);
                    self.save_marker(&id)?;
                }
            }
            HostCommand::Word(n, word_index) => {
                let id = self.marker_id(n)?;
                if report(self.session.toggle_misunderstood(&id, word_index)).is_some() {
                    if let Some(marker) = self.session.marker(&id) {
                        let patch = MarkerPatch {
                            misunderstood_indices: Some(marker.misunderstood_indices.clone()),
                            ..MarkerPatch::default()
                        };
                        if !self.store.update(&id, &patch)? {
                            self.store.save(&marker)?;
                        }
                    }
                }
            }
            HostCommand::Note(n, text) => {
                let id = self.marker_id(n)?;
                if report(self.session.set_note(&id, Some(text))).is_some() {
                    self.save_marker(&id)?;
                }
            }
            HostCommand::List => self.print_markers(),
            HostCommand::Status => println!("{}", self.status_line()),
            HostCommand::Save => {
                let count = self.session.persist(&mut self.store)?;
                println!("Saved {} markers to {}", count, self.store.path().display());
            }
            HostCommand::Help => println!("{}", HostCommand::help_text()),
            HostCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Flush everything before exit
    pub fn shutdown(&mut self) -> anyhow::Result<()> {
        self.session.stop_loop();
        let count = self.session.persist(&mut self.store)?;
        log::info!(
            "Shutdown: {} markers saved, {} in {}",
            count,
            self.store.len(),
            self.store.path().display()
        );
        Ok(())
    }

    async fn capture(&mut self) -> anyhow::Result<()> {
        let Some(outcome) = self.session.capture().await else {
            println!("Player not ready");
            return Ok(());
        };
        match &outcome {
            CaptureOutcome::Created { id } => {
                if let Some(marker) = self.session.marker(id) {
                    self.store.save(&marker)?;
                    println!("Marked {}", marker.label());
                }
            }
            CaptureOutcome::Merged { id, press_count } => {
                let patch = MarkerPatch {
                    press_count: Some(*press_count),
                    ..MarkerPatch::default()
                };
                if !self.store.update(id, &patch)? {
                    self.save_marker(id)?;
                }
                println!("Marked again (x{})", press_count);
            }
        }
        Ok(())
    }

    fn save_marker(&mut self, id: &str) -> anyhow::Result<()> {
        if let Some(marker) = self.session.marker(id) {
            self.store.save(&marker)?;
        }
        Ok(())
    }

    /// 1-based list position to marker id
    fn marker_id(&self, n: usize) -> anyhow::Result<String> {
        let markers = self.session.markers();
        n.checked_sub(1)
            .and_then(|index| markers.get(index))
            .map(|marker| marker.id.clone())
            .ok_or_else(|| anyhow::anyhow!("No marker #{} ({} markers)", n, markers.len()))
    }

    fn print_markers(&self) {
        let markers = self.session.markers();
        if markers.is_empty() {
            println!("No markers yet");
            return;
        }
        let looped = match self.session.target() {
            PlaybackTarget::Loop { marker_id, .. } => Some(marker_id),
            _ => None,
        };
        for (index, marker) in markers.iter().enumerate() {
            let flag = if looped.as_deref() == Some(marker.id.as_str()) { '*' } else { ' ' };
            let tags: Vec<String> = marker.tags.iter().map(ToString::to_string).collect();
            println!(
                "{}{:>3}. {} x{}{}",
                flag,
                index + 1,
                marker.label(),
                marker.effective_press_count(),
                if tags.is_empty() { String::new() } else { format!(" [{}]", tags.join(", ")) }
            );
        }
    }

    /// Position comes from the display poller, so it only moves while playing
    fn status_line(&self) -> String {
        let snapshot = *self.position.borrow();
        format!(
            "{} ({:.0}%) | {} | {}x | {}",
            snapshot.display_text(),
            snapshot.progress() * 100.0,
            if self.session.is_playing() { "playing" } else { "paused" },
            self.session.speed(),
            self.session.target().display_text()
        )
    }
}

/// Engine errors are printed and the host carries on. Store errors propagate.
fn report<T>(result: EngineResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            println!("{}", e);
            None
        }
    }
}
