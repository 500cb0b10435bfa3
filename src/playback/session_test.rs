#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::broadcast;

    use crate::core::{Cue, EngineError, JsonFileStore, MarkerStore, PlaybackConfig, SubtitleIndex};
    use crate::playback::{
        PlaybackTarget, PlayerCommand, PlayerError, PlayerEvent, PlayerHandle, PlayerState, PracticeSession,
    };

    /// Player whose position is set by the test and which records every command.
    /// Seeks only move the position when `seek_lag` is set, and then only after
    /// that delay.
    struct ScriptedPlayer {
        ready: AtomicBool,
        fail_reads: AtomicBool,
        position: Arc<Mutex<f64>>,
        latency: Duration,
        seek_lag: Option<Duration>,
        commands: Mutex<Vec<PlayerCommand>>,
        events: broadcast::Sender<PlayerEvent>,
    }

    impl ScriptedPlayer {
        fn new(latency: Duration) -> Arc<Self> {
            Self::build(latency, None)
        }

        fn with_seek_lag(seek_lag: Duration) -> Arc<Self> {
            Self::build(Duration::ZERO, Some(seek_lag))
        }

        fn build(latency: Duration, seek_lag: Option<Duration>) -> Arc<Self> {
            let (events, _) = broadcast::channel(8);
            Arc::new(Self {
                ready: AtomicBool::new(true),
                fail_reads: AtomicBool::new(false),
                position: Arc::new(Mutex::new(0.0)),
                latency,
                seek_lag,
                commands: Mutex::new(Vec::new()),
                events,
            })
        }

        fn set_position(&self, t: f64) {
            *self.position.lock().unwrap() = t;
        }

        fn commands(&self) -> Vec<PlayerCommand> {
            self.commands.lock().unwrap().clone()
        }

        fn pauses(&self) -> usize {
            self.commands().iter().filter(|c| **c == PlayerCommand::Pause).count()
        }

        fn seeks(&self) -> Vec<f64> {
            self.commands()
                .iter()
                .filter_map(|c| match c {
                    PlayerCommand::Seek { seconds, .. } => Some(*seconds),
                    _ => None,
                })
                .collect()
        }

        fn record(&self, command: PlayerCommand) {
            self.commands.lock().unwrap().push(command);
        }
    }

    #[async_trait]
    impl PlayerHandle for ScriptedPlayer {
        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        async fn current_time(&self) -> Result<f64, PlayerError> {
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(PlayerError::NotReady);
            }
            Ok(*self.position.lock().unwrap())
        }

        async fn duration(&self) -> Result<f64, PlayerError> {
            Ok(120.0)
        }

        fn seek_to(&self, seconds: f64, allow_seek_ahead: bool) {
            self.record(PlayerCommand::Seek { seconds, allow_seek_ahead });
            if let Some(lag) = self.seek_lag {
                let position = self.position.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(lag).await;
                    *position.lock().unwrap() = seconds;
                });
            }
        }

        fn play(&self) {
            self.record(PlayerCommand::Play);
        }

        fn pause(&self) {
            self.record(PlayerCommand::Pause);
        }

        fn set_playback_rate(&self, rate: f64) {
            self.record(PlayerCommand::SetRate(rate));
        }

        fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
            self.events.subscribe()
        }
    }

    fn sample_index() -> SubtitleIndex {
        SubtitleIndex::new(vec![
            Cue::new(0, 0.0, 2.0, "Hello"),
            Cue::new(1, 2.0, 4.0, "world"),
            Cue::new(2, 5.0, 7.0, "today"),
        ])
    }

    fn session_with(player: &Arc<ScriptedPlayer>) -> PracticeSession {
        PracticeSession::new(player.clone(), sample_index(), PlaybackConfig::default())
    }

    fn set_playing(session: &PracticeSession, playing: bool) {
        let state = if playing { PlayerState::Playing } else { PlayerState::Paused };
        session.handle_player_event(PlayerEvent::StateChanged(state));
    }

    /// Set the position, then let one correction tick (100ms period) observe it
    async fn sample(player: &ScriptedPlayer, t: f64) {
        player.set_position(t);
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_end_to_end() {
        let player = ScriptedPlayer::new(Duration::ZERO);
        let session = session_with(&player);

        for t in [1.0, 1.3, 4.6] {
            player.set_position(t);
            assert!(session.capture().await.is_some());
        }

        let markers = session.markers();
        assert_eq!(markers.len(), 2);
        assert_eq!((markers[0].start, markers[0].end, markers[0].press_count), (0.0, 2.0, 2));
        assert_eq!((markers[1].start, markers[1].end, markers[1].press_count), (5.0, 7.0, 1));
        // Capturing never touches playback
        assert!(player.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_without_ready_player_is_noop() {
        let player = ScriptedPlayer::new(Duration::ZERO);
        player.ready.store(false, Ordering::SeqCst);
        let session = session_with(&player);

        assert!(session.capture().await.is_none());
        assert!(session.markers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_terminates_with_single_pause() {
        let player = ScriptedPlayer::new(Duration::ZERO);
        let session = session_with(&player);
        player.set_position(5.0);

        session.start_one_shot(5.0, 8.0).unwrap();
        set_playing(&session, true);
        settle().await;

        for t in [6.0, 7.0, 8.1] {
            sample(&player, t).await;
        }
        // Keeps playing past the end; nothing else may be issued
        sample(&player, 9.0).await;
        sample(&player, 10.0).await;

        assert_eq!(player.pauses(), 1);
        assert_eq!(player.seeks(), vec![5.0]);
        assert_eq!(session.target(), PlaybackTarget::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_drift_correction() {
        let player = ScriptedPlayer::new(Duration::ZERO);
        let session = session_with(&player);
        let id = session.capture_at(6.0).marker_id().to_string();
        player.set_position(5.0);

        session.start_loop(&id).unwrap();
        set_playing(&session, true);
        settle().await;
        assert_eq!(player.commands(), vec![PlayerCommand::seek(5.0), PlayerCommand::Play]);

        sample(&player, 4.5).await;
        assert_eq!(player.seeks(), vec![5.0]);

        sample(&player, 3.5).await;
        assert_eq!(player.seeks(), vec![5.0, 5.0]);

        sample(&player, 6.0).await;
        sample(&player, 6.9).await;
        assert_eq!(player.seeks().len(), 2);
        assert_eq!(player.pauses(), 0);
        assert!(session.target().is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_wraps_at_end() {
        let player = ScriptedPlayer::new(Duration::ZERO);
        let session = session_with(&player);
        let id = session.capture_at(1.0).marker_id().to_string();

        session.start_loop(&id).unwrap();
        set_playing(&session, true);
        player.set_position(2.05);
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(player.seeks(), vec![0.0, 0.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_corrections_while_paused() {
        let player = ScriptedPlayer::new(Duration::ZERO);
        let session = session_with(&player);
        let id = session.capture_at(6.0).marker_id().to_string();

        session.start_loop(&id).unwrap();
        player.set_position(50.0);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(player.seeks(), vec![5.0]);

        set_playing(&session, true);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(player.seeks(), vec![5.0, 5.0]);

        set_playing(&session, false);
        player.set_position(60.0);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(player.seeks().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_loop_cancels_corrections() {
        let player = ScriptedPlayer::new(Duration::ZERO);
        let session = session_with(&player);
        let id = session.capture_at(6.0).marker_id().to_string();
        player.set_position(5.5);

        session.start_loop(&id).unwrap();
        set_playing(&session, true);
        settle().await;

        assert!(session.stop_loop());
        player.set_position(90.0);
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(player.seeks(), vec![5.0]);
        assert_eq!(session.target(), PlaybackTarget::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_replaces_loop() {
        let player = ScriptedPlayer::new(Duration::ZERO);
        let session = session_with(&player);
        let id = session.capture_at(6.0).marker_id().to_string();

        session.start_loop(&id).unwrap();
        session.start_one_shot(0.0, 2.0).unwrap();
        assert_eq!(session.target(), PlaybackTarget::OneShot { start: 0.0, end: 2.0 });

        // Only the one-shot is corrected; 1.0 is far outside the old loop
        set_playing(&session, true);
        sample(&player, 1.0).await;
        settle().await;
        assert_eq!(player.seeks(), vec![5.0, 0.0]);
        assert_eq!(session.target(), PlaybackTarget::OneShot { start: 0.0, end: 2.0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_read_for_old_target_is_discarded() {
        let player = ScriptedPlayer::new(Duration::from_millis(60));
        let session = session_with(&player);
        let first = session.capture_at(6.0).marker_id().to_string();
        let second = session.capture_at(30.0).marker_id().to_string();
        player.set_position(50.0);

        session.start_loop(&first).unwrap();
        set_playing(&session, true);
        // First read starts at 100ms and would answer at 160ms
        tokio::time::sleep(Duration::from_millis(120)).await;
        session.start_loop(&second).unwrap();
        // New timer reads at 220ms, answered at 280ms
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Seeks from the two start_loop calls, then one correction for the second loop
        assert_eq!(player.seeks(), vec![5.0, 28.0, 28.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deleting_looped_marker_stops_loop() {
        let player = ScriptedPlayer::new(Duration::ZERO);
        let session = session_with(&player);
        let looped = session.capture_at(6.0).marker_id().to_string();
        let other = session.capture_at(1.0).marker_id().to_string();

        session.start_loop(&looped).unwrap();
        session.delete_marker(&other).unwrap();
        assert!(session.target().is_active());

        session.delete_marker(&looped).unwrap();
        assert_eq!(session.target(), PlaybackTarget::Idle);
        assert!(matches!(session.start_loop(&looped), Err(EngineError::MarkerNotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_one_shot_is_rejected() {
        let player = ScriptedPlayer::new(Duration::ZERO);
        let session = session_with(&player);

        assert!(matches!(
            session.start_one_shot(4.0, 3.0),
            Err(EngineError::InvalidSegment { .. })
        ));
        assert!(player.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_speed_selection() {
        let player = ScriptedPlayer::new(Duration::ZERO);
        let session = session_with(&player);

        assert!(matches!(session.set_speed(3.0), Err(EngineError::UnsupportedRate(_))));
        session.set_speed(0.75).unwrap();
        assert_eq!(session.speed(), 0.75);
        assert_eq!(session.cycle_speed(), Some(1.0));
        assert_eq!(
            player.commands(),
            vec![PlayerCommand::SetRate(0.75), PlayerCommand::SetRate(1.0)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_play_follows_player_state() {
        let player = ScriptedPlayer::new(Duration::ZERO);
        let session = session_with(&player);

        session.toggle_play();
        set_playing(&session, true);
        session.toggle_play();

        assert_eq!(player.commands(), vec![PlayerCommand::Play, PlayerCommand::Pause]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_display_poller_publishes_while_playing() {
        let player = ScriptedPlayer::new(Duration::ZERO);
        let session = session_with(&player);
        let position = session.subscribe_position();

        player.set_position(12.0);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(position.borrow().current_time, 0.0);

        set_playing(&session, true);
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(position.borrow().current_time, 12.0);
        assert_eq!(position.borrow().duration, 120.0);

        // Display polling never issues commands
        assert!(player.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_player_events_drive_timers() {
        let player = ScriptedPlayer::new(Duration::ZERO);
        let session = session_with(&player);
        let id = session.capture_at(6.0).marker_id().to_string();
        session.start_loop(&id).unwrap();
        player.set_position(40.0);

        player.events.send(PlayerEvent::StateChanged(PlayerState::Playing)).unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(session.is_playing());
        assert_eq!(player.seeks(), vec![5.0, 5.0]);

        player.events.send(PlayerEvent::Error("stream unavailable".to_string())).unwrap();
        settle().await;
        assert!(session.is_playing());
        assert!(session.target().is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_persist_to_store() {
        let player = ScriptedPlayer::new(Duration::ZERO);
        let session = session_with(&player);
        session.capture_at(1.0);
        session.capture_at(6.0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markers.json");
        let mut store = JsonFileStore::open(&path).unwrap();
        assert_eq!(session.persist(&mut store).unwrap(), 2);

        let restored = PracticeSession::new(player.clone(), sample_index(), PlaybackConfig::default());
        restored.restore_markers(store.load_all().unwrap(), None);
        let mut texts: Vec<String> = restored.markers().into_iter().filter_map(|m| m.subtitle_text).collect();
        texts.sort();
        assert_eq!(texts, vec!["Hello".to_string(), "today".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cue_at_follows_replaced_subtitles() {
        let player = ScriptedPlayer::new(Duration::ZERO);
        let session = session_with(&player);
        assert_eq!(session.cue_at(4.6).map(|cue| cue.text), Some("today".to_string()));

        session.replace_subtitles(SubtitleIndex::new(vec![Cue::new(0, 4.0, 6.0, "replaced")]));
        assert_eq!(session.cue_at(4.6).map(|cue| cue.text), Some("replaced".to_string()));
        assert!(session.cue_at(9.0).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_preview_during_playback_waits_for_seek() {
        let player = ScriptedPlayer::with_seek_lag(Duration::from_millis(30));
        let session = session_with(&player);
        player.set_position(30.0);
        set_playing(&session, true);

        session.start_one_shot(5.0, 8.0).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(player.commands(), vec![PlayerCommand::seek(5.0), PlayerCommand::Play]);
        assert_eq!(session.target(), PlaybackTarget::OneShot { start: 5.0, end: 8.0 });

        // Seek has landed by the first correction tick
        tokio::time::sleep(Duration::from_millis(140)).await;
        assert_eq!(player.pauses(), 0);
        assert!(session.target().is_active());

        sample(&player, 8.2).await;
        assert_eq!(player.pauses(), 1);
        assert_eq!(session.target(), PlaybackTarget::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_player_skips_ticks() {
        let player = ScriptedPlayer::new(Duration::ZERO);
        let session = session_with(&player);
        let id = session.capture_at(6.0).marker_id().to_string();

        session.start_loop(&id).unwrap();
        set_playing(&session, true);
        player.ready.store(false, Ordering::SeqCst);
        player.set_position(50.0);
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(player.seeks(), vec![5.0]);
        assert_eq!(player.pauses(), 0);
        assert!(session.target().is_active());

        player.ready.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(player.seeks(), vec![5.0, 5.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_read_abandons_tick() {
        let player = ScriptedPlayer::new(Duration::ZERO);
        let session = session_with(&player);
        let id = session.capture_at(6.0).marker_id().to_string();

        session.start_loop(&id).unwrap();
        set_playing(&session, true);
        player.fail_reads.store(true, Ordering::SeqCst);
        player.set_position(50.0);
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(player.seeks(), vec![5.0]);
        assert_eq!(player.pauses(), 0);
        assert!(session.target().is_active());

        player.fail_reads.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(player.seeks(), vec![5.0, 5.0]);
    }
}
