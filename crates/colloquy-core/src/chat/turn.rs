//! Per-request state machine of a chat turn.

use std::fmt;

use tracing::{debug, error};
use uuid::Uuid;

/// Lifecycle of one chat turn.
///
/// `Received → UserPersisted → ContextAssembled → Invoking → Streaming →
/// Finalizing → Completed`, with `Failed` reachable from any non-terminal
/// state. The non-streaming path goes straight from `Invoking` to
/// `Finalizing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Received,
    UserPersisted,
    ContextAssembled,
    Invoking,
    Streaming,
    Finalizing,
    Completed,
    Failed,
}

impl TurnState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TurnState::Completed | TurnState::Failed)
    }

    pub fn can_advance_to(self, next: TurnState) -> bool {
        use TurnState::*;

        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Received, UserPersisted)
                | (UserPersisted, ContextAssembled)
                | (ContextAssembled, Invoking)
                | (Invoking, Streaming)
                | (Invoking, Finalizing)
                | (Streaming, Finalizing)
                | (Finalizing, Completed)
        )
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TurnState::Received => "received",
            TurnState::UserPersisted => "user_persisted",
            TurnState::ContextAssembled => "context_assembled",
            TurnState::Invoking => "invoking",
            TurnState::Streaming => "streaming",
            TurnState::Finalizing => "finalizing",
            TurnState::Completed => "completed",
            TurnState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Tracks the state of one turn and logs every transition.
#[derive(Debug)]
pub struct TurnTracker {
    canvas_id: Uuid,
    state: TurnState,
}

impl TurnTracker {
    pub fn new(canvas_id: Uuid) -> Self {
        Self {
            canvas_id,
            state: TurnState::Received,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Move to `next`. An illegal transition is a bug in the caller: it is
    /// logged and ignored in release builds and panics in debug builds.
    pub fn advance(&mut self, next: TurnState) {
        if !self.state.can_advance_to(next) {
            error!(
                canvas_id = %self.canvas_id,
                from = %self.state,
                to = %next,
                "illegal turn transition"
            );
            debug_assert!(false, "illegal turn transition {} -> {}", self.state, next);
            return;
        }
        debug!(canvas_id = %self.canvas_id, from = %self.state, to = %next, "turn transition");
        self.state = next;
    }

    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.advance(TurnState::Failed);
        }
    }
}
