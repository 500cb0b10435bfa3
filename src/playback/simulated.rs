use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::core::config::SimulatedPlayerConfig;
use crate::playback::player::{PlayerError, PlayerEvent, PlayerHandle, PlayerState};

struct Clock {
    /// Position at `anchor`
    position: f64,
    /// Set while playing
    anchor: Option<Instant>,
    rate: f64,
    duration: f64,
}

impl Clock {
    fn now(&self) -> f64 {
        let position = match self.anchor {
            Some(anchor) => self.position + anchor.elapsed().as_secs_f64() * self.rate,
            None => self.position,
        };
        position.clamp(0.0, self.duration)
    }

    fn rebase(&mut self) {
        self.position = self.now();
        if self.anchor.is_some() {
            self.anchor = Some(Instant::now());
        }
    }
}

/// Player driven by the tokio clock. Stands in for a real embedded player in
/// the command-line host and in tests.
pub struct SimulatedPlayer {
    clock: Mutex<Clock>,
    ready: AtomicBool,
    read_latency: Duration,
    events: broadcast::Sender<PlayerEvent>,
}

impl SimulatedPlayer {
    pub fn new(config: &SimulatedPlayerConfig) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            clock: Mutex::new(Clock {
                position: 0.0,
                anchor: None,
                rate: 1.0,
                duration: config.duration_seconds.max(0.0),
            }),
            ready: AtomicBool::new(false),
            read_latency: Duration::from_millis(config.read_latency_ms),
            events,
        }
    }

    /// Signal that the player finished loading
    pub fn mark_ready(&self) {
        if !self.ready.swap(true, Ordering::SeqCst) {
            log::info!("Simulated player ready");
            self.emit(PlayerEvent::Ready);
            self.emit(PlayerEvent::StateChanged(PlayerState::Unstarted));
        }
    }

    pub fn is_playing(&self) -> bool {
        self.clock().anchor.is_some()
    }

    pub fn position(&self) -> f64 {
        self.clock().now()
    }

    fn clock(&self) -> std::sync::MutexGuard<'_, Clock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: PlayerEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl PlayerHandle for SimulatedPlayer {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn current_time(&self) -> Result<f64, PlayerError> {
        if !self.is_ready() {
            return Err(PlayerError::NotReady);
        }
        if !self.read_latency.is_zero() {
            tokio::time::sleep(self.read_latency).await;
        }
        Ok(self.position())
    }

    async fn duration(&self) -> Result<f64, PlayerError> {
        if !self.is_ready() {
            return Err(PlayerError::NotReady);
        }
        Ok(self.clock().duration)
    }

    fn seek_to(&self, seconds: f64, _allow_seek_ahead: bool) {
        let mut clock = self.clock();
        clock.position = seconds.clamp(0.0, clock.duration);
        if clock.anchor.is_some() {
            clock.anchor = Some(Instant::now());
        }
        log::debug!("Simulated player seek to {:.2}s", clock.position);
    }

    fn play(&self) {
        let started = {
            let mut clock = self.clock();
            if clock.anchor.is_none() {
                clock.anchor = Some(Instant::now());
                true
            } else {
                false
            }
        };
        if started {
            self.emit(PlayerEvent::StateChanged(PlayerState::Playing));
        }
    }

    fn pause(&self) {
        let stopped = {
            let mut clock = self.clock();
            if clock.anchor.is_some() {
                clock.rebase();
                clock.anchor = None;
                true
            } else {
                false
            }
        };
        if stopped {
            self.emit(PlayerEvent::StateChanged(PlayerState::Paused));
        }
    }

    fn set_playback_rate(&self, rate: f64) {
        let mut clock = self.clock();
        clock.rebase();
        clock.rate = rate;
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }
}
