//! Turns policy actions into `paddle` commands.

use pong_core::{Action, ClientMessage, Side};

/// Issues a `paddle` command for every action except a repeated stop.
///
/// Up and down are resent every tick so a lost frame never leaves the paddle
/// stuck; only a `Stop` right after a sent `Stop` is suppressed.
#[derive(Clone, Debug)]
pub struct PaddleCommander {
    side: Side,
    last_sent: Action,
}

impl PaddleCommander {
    /// Commander for `side`. Nothing has been sent yet, which counts as `Stop`.
    pub fn new(side: Side) -> Self {
        Self {
            side,
            last_sent: Action::Stop,
        }
    }

    /// Paddle being steered.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Switch to the side assigned by the server.
    pub fn set_side(&mut self, side: Side) {
        self.side = side;
    }

    /// Last action actually sent.
    pub fn last_sent(&self) -> Action {
        self.last_sent
    }

    /// Command to send for `action`, if any.
    pub fn command(&mut self, action: Action) -> Option<ClientMessage> {
        if action == Action::Stop && self.last_sent == Action::Stop {
            return None;
        }
        self.last_sent = action;
        Some(ClientMessage::Paddle {
            paddle: self.side,
            direction: action,
        })
    }
}
