// =============================================================================
// PLAYER HANDLE - BOUNDARY TO THE EXTERNAL VIDEO PLAYER
// =============================================================================
//
// Reads are asynchronous and may take a while to answer. Commands are
// fire-and-forget: nothing is queued and nothing is acknowledged.
//
// =============================================================================

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlayerError {
    #[error("player is not ready")]
    NotReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Unstarted,
    Playing,
    Paused,
    Buffering,
    Ended,
}

impl PlayerState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlayerState::Playing)
    }
}

/// Notifications from the player
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Ready,
    StateChanged(PlayerState),
    Error(String),
}

/// Commands the engine issues to the player
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerCommand {
    Seek { seconds: f64, allow_seek_ahead: bool },
    Play,
    Pause,
    SetRate(f64),
}

impl PlayerCommand {
    pub fn seek(seconds: f64) -> Self {
        PlayerCommand::Seek {
            seconds,
            allow_seek_ahead: true,
        }
    }
}

#[async_trait]
pub trait PlayerHandle: Send + Sync {
    /// False until the player has signalled ready
    fn is_ready(&self) -> bool;

    async fn current_time(&self) -> Result<f64, PlayerError>;

    async fn duration(&self) -> Result<f64, PlayerError>;

    fn seek_to(&self, seconds: f64, allow_seek_ahead: bool);

    fn play(&self);

    fn pause(&self);

    fn set_playback_rate(&self, rate: f64);

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent>;
}

/// Send a command to the player. Silently dropped when the player is not ready.
pub fn dispatch(player: &dyn PlayerHandle, command: PlayerCommand) {
    if !player.is_ready() {
        log::debug!("Player not ready, dropping {:?}", command);
        return;
    }

    match command {
        PlayerCommand::Seek { seconds, allow_seek_ahead } => player.seek_to(seconds, allow_seek_ahead),
        PlayerCommand::Play => player.play(),
        PlayerCommand::Pause => player.pause(),
        PlayerCommand::SetRate(rate) => player.set_playback_rate(rate),
    }
}
