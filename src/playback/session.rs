// =============================================================================
// PRACTICE SESSION - SINGLE OWNER OF MARKERS, TARGET AND TIMERS
// =============================================================================
//
// Callers interact only through the public operations (capture, start_loop,
// stop_loop, start_one_shot, ...). The session decides when the correction
// and display timers run:
//
// - correction timer: player playing AND a target is active, restarted on
//   every target change so it always polls for the current target
// - display timer: player playing
//
// State sits behind a std Mutex that is never held across an await.
//
// =============================================================================

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::core::config::PlaybackConfig;
use crate::core::cue::{Cue, SubtitleIndex};
use crate::core::error::{EngineError, EngineResult};
use crate::core::marker::{Marker, TagType, VocabEntry};
use crate::core::matcher::match_cue;
use crate::core::recorder::{CaptureOutcome, MarkerRecorder};
use crate::core::store::MarkerStore;
use crate::playback::display::{spawn_display_poller, PositionSnapshot};
use crate::playback::loop_controller::{Correction, LoopController, PlaybackTarget};
use crate::playback::player::{dispatch, PlayerCommand, PlayerEvent, PlayerHandle};
use crate::playback::timer::{ScopedTimer, TickFlow};

struct SessionState {
    subtitles: SubtitleIndex,
    recorder: MarkerRecorder,
    controller: LoopController,
    is_playing: bool,
    rate: f64,
    /// Generation the timer was started for
    correction_timer: Option<(u64, ScopedTimer)>,
    display_timer: Option<ScopedTimer>,
}

struct Shared {
    player: Arc<dyn PlayerHandle>,
    config: PlaybackConfig,
    position: Arc<watch::Sender<PositionSnapshot>>,
    state: Mutex<SessionState>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start or tear down timers so they match the current state
    fn reconcile_timers(self: &Arc<Self>, state: &mut SessionState) {
        let generation = state.controller.generation();
        let wants_correction = state.is_playing && state.controller.is_active();

        if wants_correction {
            let up_to_date = matches!(
                &state.correction_timer,
                Some((timer_generation, timer)) if *timer_generation == generation && timer.is_running()
            );
            if !up_to_date {
                let weak = Arc::downgrade(self);
                let timer = ScopedTimer::spawn("loop correction", self.config.correction_interval(), move || {
                    correction_tick(weak.clone(), generation)
                });
                state.correction_timer = Some((generation, timer));
            }
        } else {
            state.correction_timer = None;
        }

        if state.is_playing {
            let running = state.display_timer.as_ref().is_some_and(ScopedTimer::is_running);
            if !running {
                state.display_timer = Some(spawn_display_poller(
                    self.player.clone(),
                    self.position.clone(),
                    self.config.display_interval(),
                ));
            }
        } else {
            state.display_timer = None;
        }
    }
}

async fn correction_tick(weak: Weak<Shared>, generation: u64) -> TickFlow {
    let Some(shared) = weak.upgrade() else {
        return TickFlow::Stop;
    };
    if !shared.player.is_ready() {
        return TickFlow::Continue;
    }

    let t = match shared.player.current_time().await {
        Ok(t) => t,
        Err(e) => {
            log::warn!("Loop correction read failed: {}", e);
            return TickFlow::Continue;
        }
    };

    let correction = {
        let mut state = shared.lock_state();
        let correction = state.controller.observe(t, generation);
        if correction == Correction::Finish {
            shared.reconcile_timers(&mut state);
        }
        correction
    };

    if let Some(command) = correction.command() {
        dispatch(shared.player.as_ref(), command);
    }

    match correction {
        Correction::Hold | Correction::Seek(_) => TickFlow::Continue,
        Correction::Finish | Correction::Stale => TickFlow::Stop,
    }
}

pub struct PracticeSession {
    shared: Arc<Shared>,
    event_pump: JoinHandle<()>,
}

impl PracticeSession {
    /// Must be called from within a tokio runtime
    pub fn new(player: Arc<dyn PlayerHandle>, subtitles: SubtitleIndex, config: PlaybackConfig) -> Self {
        let (position, _) = watch::channel(PositionSnapshot::default());
        let shared = Arc::new(Shared {
            player: player.clone(),
            config,
            position: Arc::new(position),
            state: Mutex::new(SessionState {
                subtitles,
                recorder: MarkerRecorder::new(),
                controller: LoopController::new(),
                is_playing: false,
                rate: 1.0,
                correction_timer: None,
                display_timer: None,
            }),
        });

        let event_pump = tokio::spawn(pump_player_events(Arc::downgrade(&shared), player.subscribe()));

        Self { shared, event_pump }
    }

    /// Replace the in-memory collection with previously stored markers
    pub fn restore_markers(&self, markers: Vec<Marker>, video_id: Option<String>) {
        let mut state = self.shared.lock_state();
        state.controller.stop();
        state.recorder = MarkerRecorder::with_markers(markers);
        state.recorder.set_video_id(video_id);
        self.shared.reconcile_timers(&mut state);
    }

    pub fn replace_subtitles(&self, subtitles: SubtitleIndex) {
        log::info!("Subtitle index replaced ({} cues)", subtitles.len());
        self.shared.lock_state().subtitles = subtitles;
    }

    /// Mark the current playback position. `None` when the player is
    /// unavailable or the position read fails.
    pub async fn capture(&self) -> Option<CaptureOutcome> {
        if !self.shared.player.is_ready() {
            log::debug!("Capture ignored, player not ready");
            return None;
        }
        match self.shared.player.current_time().await {
            Ok(t) => Some(self.capture_at(t)),
            Err(e) => {
                log::warn!("Capture abandoned: {}", e);
                None
            }
        }
    }

    /// Mark a known timestamp
    pub fn capture_at(&self, t: f64) -> CaptureOutcome {
        let mut guard = self.shared.lock_state();
        let state = &mut *guard;
        let matched = match_cue(state.subtitles.cues(), t);
        state.recorder.capture(matched, t)
    }

    pub fn start_loop(&self, marker_id: &str) -> EngineResult<()> {
        let commands = {
            let mut state = self.shared.lock_state();
            let marker = state
                .recorder
                .get(marker_id)
                .cloned()
                .ok_or_else(|| EngineError::MarkerNotFound(marker_id.to_string()))?;
            state.controller.start_loop(&marker)
        };
        self.activate(&commands);
        Ok(())
    }

    /// Returns whether anything was playing a target
    pub fn stop_loop(&self) -> bool {
        let mut state = self.shared.lock_state();
        let stopped = state.controller.stop();
        self.shared.reconcile_timers(&mut state);
        stopped
    }

    pub fn start_one_shot(&self, start: f64, end: f64) -> EngineResult<()> {
        let commands = self.shared.lock_state().controller.start_one_shot(start, end)?;
        self.activate(&commands);
        Ok(())
    }

    /// Preview a stored marker once
    pub fn preview_marker(&self, marker_id: &str) -> EngineResult<()> {
        let (start, end) = {
            let state = self.shared.lock_state();
            let marker = state
                .recorder
                .get(marker_id)
                .ok_or_else(|| EngineError::MarkerNotFound(marker_id.to_string()))?;
            (marker.start, marker.end)
        };
        self.start_one_shot(start, end)
    }

    /// Deleting the looped marker also stops the loop
    pub fn delete_marker(&self, marker_id: &str) -> EngineResult<Marker> {
        let mut state = self.shared.lock_state();
        let marker = state.recorder.delete(marker_id)?;
        if state.controller.release_marker(marker_id) {
            self.shared.reconcile_timers(&mut state);
        }
        Ok(marker)
    }

    pub fn toggle_play(&self) {
        let command = if self.is_playing() {
            PlayerCommand::Pause
        } else {
            PlayerCommand::Play
        };
        dispatch(self.shared.player.as_ref(), command);
    }

    pub fn set_speed(&self, rate: f64) -> EngineResult<()> {
        if !self.shared.config.supports_speed(rate) {
            return Err(EngineError::UnsupportedRate(rate));
        }
        self.shared.lock_state().rate = rate;
        dispatch(self.shared.player.as_ref(), PlayerCommand::SetRate(rate));
        log::info!("Playback speed {}x", rate);
        Ok(())
    }

    /// Step to the next configured speed
    pub fn cycle_speed(&self) -> Option<f64> {
        let current = self.speed();
        let next = self.shared.config.next_speed(current)?;
        self.set_speed(next).ok()?;
        Some(next)
    }

    pub fn toggle_tag(&self, marker_id: &str, tag: TagType) -> EngineResult<bool> {
        self.shared.lock_state().recorder.toggle_tag(marker_id, tag)
    }

    pub fn toggle_misunderstood(&self, marker_id: &str, word_index: usize) -> EngineResult<bool> {
        self.shared.lock_state().recorder.toggle_misunderstood(marker_id, word_index)
    }

    pub fn set_vocab(&self, marker_id: &str, word_index: usize, entry: Option<VocabEntry>) -> EngineResult<()> {
        self.shared.lock_state().recorder.set_vocab(marker_id, word_index, entry)
    }

    pub fn set_note(&self, marker_id: &str, note: Option<String>) -> EngineResult<()> {
        self.shared.lock_state().recorder.set_note(marker_id, note)
    }

    /// Hand the whole collection to the store
    pub fn persist(&self, store: &mut dyn MarkerStore) -> EngineResult<usize> {
        let markers = self.markers();
        for marker in &markers {
            store.save(marker)?;
        }
        log::info!("Persisted {} markers", markers.len());
        Ok(markers.len())
    }

    /// Subtitle line under (or snapped to) `t`
    pub fn cue_at(&self, t: f64) -> Option<Cue> {
        let state = self.shared.lock_state();
        match_cue(state.subtitles.cues(), t).cloned()
    }

    pub fn markers(&self) -> Vec<Marker> {
        self.shared.lock_state().recorder.markers().to_vec()
    }

    pub fn marker(&self, marker_id: &str) -> Option<Marker> {
        self.shared.lock_state().recorder.get(marker_id).cloned()
    }

    pub fn target(&self) -> PlaybackTarget {
        self.shared.lock_state().controller.target().clone()
    }

    pub fn is_playing(&self) -> bool {
        self.shared.lock_state().is_playing
    }

    pub fn speed(&self) -> f64 {
        self.shared.lock_state().rate
    }

    pub fn subscribe_position(&self) -> watch::Receiver<PositionSnapshot> {
        self.shared.position.subscribe()
    }

    /// Apply a notification from the player
    pub fn handle_player_event(&self, event: PlayerEvent) {
        apply_player_event(&self.shared, event);
    }

    /// Issue the seek and play for a new target, then arm its correction
    /// timer. The first correction tick comes one period later.
    fn activate(&self, commands: &[PlayerCommand]) {
        for command in commands {
            dispatch(self.shared.player.as_ref(), *command);
        }
        let mut state = self.shared.lock_state();
        self.shared.reconcile_timers(&mut state);
    }
}

impl Drop for PracticeSession {
    fn drop(&mut self) {
        log::debug!("PracticeSession dropping");
        self.event_pump.abort();
        let mut state = self.shared.lock_state();
        state.controller.stop();
        state.correction_timer = None;
        state.display_timer = None;
    }
}

fn apply_player_event(shared: &Arc<Shared>, event: PlayerEvent) {
    match event {
        PlayerEvent::Ready => log::info!("Player ready"),
        PlayerEvent::StateChanged(player_state) => {
            let mut state = shared.lock_state();
            let playing = player_state.is_playing();
            if state.is_playing != playing {
                log::debug!("Player state {:?}", player_state);
                state.is_playing = playing;
                shared.reconcile_timers(&mut state);
            }
        }
        PlayerEvent::Error(message) => log::error!("Player error: {}", message),
    }
}

async fn pump_player_events(weak: Weak<Shared>, mut events: broadcast::Receiver<PlayerEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                apply_player_event(&shared, event);
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("Player event pump lagged, skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
