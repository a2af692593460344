//! Timer collaborator
//!
//! The engine arms one-shot timers through [`TimerService`]; the timer glue
//! posts expiries back with `SdpEngine::timer_expired`.

use crate::l2cap::ChannelId;

/// Which timer of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerKind {
    /// Connection did not reach the connected state in time
    ConnectTimeout,
    /// Client connection had nothing to do
    Idle,
}

/// A timer, named by kind and channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerId {
    /// Which timer
    pub kind: TimerKind,
    /// Connection the timer belongs to
    pub channel: ChannelId,
}

impl TimerId {
    /// Create a timer ID
    #[must_use]
    pub const fn new(kind: TimerKind, channel: ChannelId) -> Self {
        Self { kind, channel }
    }
}

/// One-shot timers
pub trait TimerService {
    /// Start (or restart) `id` to fire after `duration_ms`
    fn start(&mut self, id: TimerId, duration_ms: u32);

    /// Cancel `id`; cancelling a timer that is not running does nothing
    fn cancel(&mut self, id: TimerId);
}
