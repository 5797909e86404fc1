//! Signals emitted by a modem

use mm_protocol::{ModemState, StateChangeReason};

/// Side-channel notifications a modem emits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModemSignal {
    /// `State` was written
    StateChanged {
        old: ModemState,
        new: ModemState,
        reason: StateChangeReason,
    },
    /// A message was delivered through the testing surface
    MessageReceived { sender: String, content: String },
}

impl ModemSignal {
    /// New state if this is a state change
    pub fn new_state(&self) -> Option<ModemState> {
        match self {
            ModemSignal::StateChanged { new, .. } => Some(*new),
            ModemSignal::MessageReceived { .. } => None,
        }
    }
}
