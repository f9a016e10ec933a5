use std::time::Duration;

use async_broadcast::{Receiver as BroadcastReceiver, Sender as BroadcastSender};
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use log::{debug, error, info, trace, warn};

use crate::framework::actor::Actor;
use crate::framework::streams::BroadcastStream;
use crate::messages::control_msg::{quit_pending, ControlMsg};

/// Turns single key presses on the terminal into control messages.
pub struct KeyboardActor {
    control_tx: BroadcastSender<ControlMsg>,
    control_rx: BroadcastReceiver<ControlMsg>,
    poll_interval: Duration,
}

/// Keeps the terminal in raw mode while alive.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> std::io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            warn!("Could not restore terminal mode: {}", e);
        }
    }
}

impl KeyboardActor {
    pub(crate) fn new(control: BroadcastStream<ControlMsg>, poll_interval: Duration) -> Self {
        Self {
            control_tx: control.broadcast_sender(),
            control_rx: control.broadcast_receiver(),
            poll_interval,
        }
    }

    #[cfg(test)]
    pub(crate) fn quit_received(&mut self) -> bool {
        quit_pending(&mut self.control_rx)
    }

    fn next_key(&self) -> std::io::Result<Option<ControlMsg>> {
        if !event::poll(self.poll_interval)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                let msg = ControlMsg::from_key(key.code, key.modifiers);
                if msg.is_none() {
                    trace!("Ignoring key {:?}", key.code);
                }
                Ok(msg)
            }
            _ => Ok(None),
        }
    }
}

impl Actor for KeyboardActor {
    const NAME: &'static str = "keyboard";

    async fn on_started(mut self) {
        debug!("Keyboard actor started");

        let _raw = match RawModeGuard::enable() {
            Ok(guard) => guard,
            Err(e) => {
                error!("Terminal does not support key input: {}", e);
                let _ = self.control_tx.broadcast(ControlMsg::Quit).await;
                return;
            }
        };

        while !quit_pending(&mut self.control_rx) {
            match self.next_key() {
                Ok(Some(msg)) => {
                    if msg == ControlMsg::Quit {
                        info!("Quitting...");
                    }
                    if self.control_tx.broadcast(msg).await.is_err() {
                        debug!("Nobody listening, keyboard actor stopping");
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Reading the terminal failed: {}", e);
                    let _ = self.control_tx.broadcast(ControlMsg::Quit).await;
                    return;
                }
            }
        }
        debug!("Keyboard actor stopped");
    }
}
