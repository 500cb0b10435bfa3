// =============================================================================
// LOOP CONTROLLER - PLAYBACK TARGET STATE MACHINE
// =============================================================================
//
//   Idle ──start_loop──▶ Loop ──(t ≥ end or t < start - 1)──▶ seek start, stay Loop
//   Idle ──start_one_shot──▶ OneShot ──(t ≥ end)──▶ pause, Idle (no re-arm)
//   Loop / OneShot ──stop──▶ Idle
//
// Only one target exists at a time; starting either replaces the other.
// Every target change bumps the generation so samples read for an older
// target are discarded.
//
// =============================================================================

use crate::core::error::{EngineError, EngineResult};
use crate::core::marker::Marker;
use crate::playback::player::PlayerCommand;

/// Tolerance below the loop start before playback is pulled back (seconds)
pub const DRIFT_GUARD: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PlaybackTarget {
    #[default]
    Idle,
    Loop {
        marker_id: String,
        start: f64,
        end: f64,
    },
    OneShot {
        start: f64,
        end: f64,
    },
}

impl PlaybackTarget {
    pub fn is_active(&self) -> bool {
        !matches!(self, PlaybackTarget::Idle)
    }

    pub fn display_text(&self) -> String {
        match self {
            PlaybackTarget::Idle => "Idle".to_string(),
            PlaybackTarget::Loop { start, end, .. } => format!("Looping {:.2}s - {:.2}s", start, end),
            PlaybackTarget::OneShot { start, end } => format!("Previewing {:.2}s - {:.2}s", start, end),
        }
    }
}

/// What a single position sample asks for
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// Playback is where it should be
    Hold,
    Seek(f64),
    /// One-shot reached its end: pause, target is now idle
    Finish,
    /// Sample belongs to a target that is no longer current
    Stale,
}

impl Correction {
    pub fn command(&self) -> Option<PlayerCommand> {
        match self {
            Correction::Seek(seconds) => Some(PlayerCommand::seek(*seconds)),
            Correction::Finish => Some(PlayerCommand::Pause),
            Correction::Hold | Correction::Stale => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct LoopController {
    target: PlaybackTarget,
    generation: u64,
}

impl LoopController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> &PlaybackTarget {
        &self.target
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_active(&self) -> bool {
        self.target.is_active()
    }

    pub fn looped_marker(&self) -> Option<&str> {
        match &self.target {
            PlaybackTarget::Loop { marker_id, .. } => Some(marker_id),
            _ => None,
        }
    }

    /// Loop the marker's interval. Returns the commands that start playback.
    pub fn start_loop(&mut self, marker: &Marker) -> [PlayerCommand; 2] {
        log::info!("Loop start {} [{:.2}, {:.2}]", marker.id, marker.start, marker.end);
        self.set_target(PlaybackTarget::Loop {
            marker_id: marker.id.clone(),
            start: marker.start,
            end: marker.end,
        });
        [PlayerCommand::seek(marker.start), PlayerCommand::Play]
    }

    /// Play `[start, end]` once. Replaces any running loop.
    pub fn start_one_shot(&mut self, start: f64, end: f64) -> EngineResult<[PlayerCommand; 2]> {
        if !(start >= 0.0 && end > start) {
            return Err(EngineError::InvalidSegment { start, end });
        }
        if let PlaybackTarget::Loop { marker_id, .. } = &self.target {
            log::debug!("One-shot replaces loop on {}", marker_id);
        }
        log::info!("One-shot [{:.2}, {:.2}]", start, end);
        self.set_target(PlaybackTarget::OneShot { start, end });
        Ok([PlayerCommand::seek(start), PlayerCommand::Play])
    }

    /// Returns whether a target was active
    pub fn stop(&mut self) -> bool {
        if !self.target.is_active() {
            return false;
        }
        log::info!("Stopped: {}", self.target.display_text());
        self.set_target(PlaybackTarget::Idle);
        true
    }

    /// Clear the loop if it plays `marker_id`
    pub fn release_marker(&mut self, marker_id: &str) -> bool {
        if self.looped_marker() == Some(marker_id) {
            self.stop()
        } else {
            false
        }
    }

    /// Decide on one position sample read under `generation`
    pub fn observe(&mut self, t: f64, generation: u64) -> Correction {
        if generation != self.generation {
            log::debug!("Discarding sample {:.2}s from generation {} (now {})", t, generation, self.generation);
            return Correction::Stale;
        }

        match self.target {
            PlaybackTarget::Idle => Correction::Stale,
            PlaybackTarget::Loop { start, end, .. } => {
                if t >= end || t < start - DRIFT_GUARD {
                    log::debug!("Loop correction: {:.2}s outside [{:.2}, {:.2}], seeking", t, start, end);
                    Correction::Seek(start)
                } else {
                    Correction::Hold
                }
            }
            PlaybackTarget::OneShot { end, .. } => {
                if t >= end {
                    log::info!("One-shot finished at {:.2}s", t);
                    self.set_target(PlaybackTarget::Idle);
                    Correction::Finish
                } else {
                    Correction::Hold
                }
            }
        }
    }

    fn set_target(&mut self, target: PlaybackTarget) {
        self.target = target;
        self.generation += 1;
    }
}
