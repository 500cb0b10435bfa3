use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::playback::player::PlayerHandle;
use crate::playback::timer::{ScopedTimer, TickFlow};

/// Latest position for progress bars and elapsed-time labels
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionSnapshot {
    pub current_time: f64,
    pub duration: f64,
}

impl PositionSnapshot {
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn display_text(&self) -> String {
        format!("{} / {}", format_clock(self.current_time), format_clock(self.duration))
    }
}

pub fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Display-only poller. Republishes the player position, never corrects it.
pub fn spawn_display_poller(
    player: Arc<dyn PlayerHandle>,
    sender: Arc<watch::Sender<PositionSnapshot>>,
    period: Duration,
) -> ScopedTimer {
    ScopedTimer::spawn("position display", period, move || {
        let player = player.clone();
        let sender = sender.clone();
        async move {
            publish_position(player.as_ref(), &sender).await;
            TickFlow::Continue
        }
    })
}

async fn publish_position(player: &dyn PlayerHandle, sender: &watch::Sender<PositionSnapshot>) {
    if !player.is_ready() {
        return;
    }

    let current_time = match player.current_time().await {
        Ok(t) => t,
        Err(e) => {
            log::debug!("Display poll skipped: {}", e);
            return;
        }
    };
    let duration = match player.duration().await {
        Ok(d) => d,
        Err(_) => sender.borrow().duration,
    };

    sender.send_replace(PositionSnapshot { current_time, duration });
}
