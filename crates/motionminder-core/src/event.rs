//! Host event feed
//!
//! Provides:
//! - Event types pushed by the host environment (positions, G-code, print lifecycle)
//! - Event dispatcher for publishing events to the tracker
//!
//! The host pushes events instead of the tracker wrapping host internals.

use crate::data::{AxisSet, Position};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events supplied by the host environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MotionEvent {
    /// Live carriage position snapshot
    PositionSample {
        /// Toolhead position in mm.
        position: Position,
    },
    /// A line of the active G-code stream
    GcodeLine {
        /// Raw line text.
        line: String,
    },
    /// A print job started
    PrintStarted,
    /// A print job finished
    PrintFinished {
        /// Toolhead position at the end of the job, if known.
        #[serde(default)]
        toolhead: Option<Position>,
    },
    /// A print job was cancelled
    PrintCancelled {
        /// Toolhead position at cancellation, if known.
        #[serde(default)]
        toolhead: Option<Position>,
    },
    /// A homing move began
    HomingStarted,
    /// A homing move ended
    HomingFinished,
    /// The set of homed axes changed
    HomedAxesChanged {
        /// Axes currently homed.
        axes: AxisSet,
    },
}

impl MotionEvent {
    /// Decode one JSON event, e.g. `{"event":"print_started"}`
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// True for events that switch tracking mode
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            MotionEvent::PrintStarted
                | MotionEvent::PrintFinished { .. }
                | MotionEvent::PrintCancelled { .. }
        )
    }
}

impl std::fmt::Display for MotionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MotionEvent::PositionSample { position } => write!(
                f,
                "Position X{:.3} Y{:.3} Z{:.3}",
                position.x, position.y, position.z
            ),
            MotionEvent::GcodeLine { line } => write!(f, "G-code: {}", line.trim()),
            MotionEvent::PrintStarted => write!(f, "Print started"),
            MotionEvent::PrintFinished { .. } => write!(f, "Print finished"),
            MotionEvent::PrintCancelled { .. } => write!(f, "Print cancelled"),
            MotionEvent::HomingStarted => write!(f, "Homing started"),
            MotionEvent::HomingFinished => write!(f, "Homing finished"),
            MotionEvent::HomedAxesChanged { axes } => write!(f, "Homed axes: {}", axes),
        }
    }
}

/// Event dispatcher for publishing host events to subscribers
#[derive(Clone)]
pub struct EventDispatcher {
    /// Broadcast sender channel for motion events.
    tx: broadcast::Sender<MotionEvent>,
}

impl EventDispatcher {
    /// Create a new event dispatcher
    ///
    /// # Arguments
    /// * `buffer_size` - Size of the broadcast buffer (default 1024)
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size);
        Self { tx }
    }

    /// Create a new event dispatcher with default buffer size
    pub fn default_with_buffer() -> Self {
        Self::new(1024)
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<MotionEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn publish(
        &self,
        event: MotionEvent,
    ) -> Result<usize, broadcast::error::SendError<MotionEvent>> {
        self.tx.send(event)
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::default_with_buffer()
    }
}
