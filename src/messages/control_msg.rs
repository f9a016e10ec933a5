use async_broadcast::{Receiver as BroadcastReceiver, TryRecvError};
use crossterm::event::{KeyCode, KeyModifiers};

use crate::dataset::GestureClass;

/// Operator commands shared on the control bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlMsg {
    /// Store the current frame as a sample of the class.
    Save(GestureClass),
    /// Stop every actor.
    Quit,
}

impl ControlMsg {
    /// `1`..`3` pick a class, `q`, `Esc` and `Ctrl-C` quit. Other keys map to
    /// nothing.
    pub fn from_key(code: KeyCode, modifiers: KeyModifiers) -> Option<Self> {
        match code {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(ControlMsg::Quit),
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(ControlMsg::Quit),
            KeyCode::Char(c @ '1'..='3') => {
                let index = c as usize - '1' as usize;
                GestureClass::from_index(index).map(ControlMsg::Save)
            }
            _ => None,
        }
    }
}

/// Drains `rx` without waiting. True if `Quit` was pending or the bus is gone;
/// other messages are discarded.
pub fn quit_pending(rx: &mut BroadcastReceiver<ControlMsg>) -> bool {
    loop {
        match rx.try_recv() {
            Ok(ControlMsg::Quit) | Err(TryRecvError::Closed) => return true,
            Ok(_) | Err(TryRecvError::Overflowed(_)) => continue,
            Err(TryRecvError::Empty) => return false,
        }
    }
}
