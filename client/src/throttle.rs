//! Rate limiting for outbound position reports

use shared::Position;

/// Minimum time between reports, in milliseconds (~30 per second)
pub const UPDATE_INTERVAL_MS: u64 = 33;
/// Manhattan distance that triggers a report regardless of elapsed time
pub const MIN_MOVEMENT: f32 = 0.5;

/// Decides once per frame whether the local position should be sent
///
/// A report goes out when either the interval has elapsed since the last
/// one or the player has moved at least [`MIN_MOVEMENT`] since it,
/// whichever comes first. The very first call always sends. The throttle has
/// no timer of its own; it only runs when the frame loop calls it.
#[derive(Debug, Clone)]
pub struct UpdateThrottle {
    interval_ms: u64,
    min_movement: f32,
    last_sent: Option<(Position, u64)>,
}

impl UpdateThrottle {
    pub fn new() -> Self {
        Self::with_limits(UPDATE_INTERVAL_MS, MIN_MOVEMENT)
    }

    pub fn with_limits(interval_ms: u64, min_movement: f32) -> Self {
        Self {
            interval_ms,
            min_movement,
            last_sent: None,
        }
    }

    /// Returns true if `position` should be sent now, and records it as sent
    pub fn should_send(&mut self, position: Position, now_ms: u64) -> bool {
        let send = match self.last_sent {
            None => true,
            Some((last_position, last_time)) => {
                now_ms.saturating_sub(last_time) >= self.interval_ms
                    || position.manhattan_distance(&last_position) >= self.min_movement
            }
        };

        if send {
            self.last_sent = Some((position, now_ms));
        }
        send
    }

    /// Forgets the last report so the next call sends immediately
    pub fn reset(&mut self) {
        self.last_sent = None;
    }

    pub fn last_sent(&self) -> Option<Position> {
        self.last_sent.map(|(position, _)| position)
    }
}

impl Default for UpdateThrottle {
    fn default() -> Self {
        Self::new()
    }
}
