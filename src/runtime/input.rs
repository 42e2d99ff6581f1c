// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Keyboard input forwarding
//!
//! `KeyboardHub` is the window-level event source. Subscribing returns a
//! `ListenerHandle`; the same handle is what removes the listener again, so
//! teardown never depends on comparing closures.
//!
//! `InputForwarder` turns key events into guest calls using one of two
//! protocols:
//! * single-character: `keyboard(code, down)`, keys longer than one
//!   character are dropped;
//! * multi-character: the key's character codes are written into the
//!   guest's 32-byte key buffer, then `register_keypress(len, down)`.

use crate::config::consts::KEY_BUFFER_LEN;
use crate::errors::{HostError, HostResult};
use crate::host::module_handle::SharedModule;
use crate::observability::messages::runtime::{KeyDropped, KeyForwardFailed};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum KeyPhase {
    Down,
    Up,
}

/// A key press or release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// Textual key, e.g. `"a"` or `"ArrowLeft"`
    pub key: String,
    /// Legacy numeric key code
    pub code: u32,
    pub phase: KeyPhase,
}

impl KeyEvent {
    pub fn new<S: Into<String>>(key: S, phase: KeyPhase) -> Self {
        let key = key.into();
        let code = key_code(&key);
        Self { key, code, phase }
    }

    pub fn down<S: Into<String>>(key: S) -> Self {
        Self::new(key, KeyPhase::Down)
    }

    pub fn up<S: Into<String>>(key: S) -> Self {
        Self::new(key, KeyPhase::Up)
    }

    pub fn is_down(&self) -> bool {
        self.phase == KeyPhase::Down
    }

    /// Length of the key text in UTF-16 code units.
    pub fn text_len(&self) -> usize {
        self.key.encode_utf16().count()
    }
}

fn key_code(key: &str) -> u32 {
    let mut chars = key.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return c.to_ascii_uppercase() as u32;
    }
    match key {
        "Backspace" => 8,
        "Tab" => 9,
        "Enter" => 13,
        "Shift" => 16,
        "Control" => 17,
        "Alt" => 18,
        "Escape" => 27,
        "ArrowLeft" => 37,
        "ArrowUp" => 38,
        "ArrowRight" => 39,
        "ArrowDown" => 40,
        _ => 0,
    }
}

pub type KeyListener = Arc<dyn Fn(&KeyEvent) + Send + Sync>;

/// Token returned by `add_listener`; pass it back to remove the listener.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    id: u64,
    phase: KeyPhase,
}

/// Window-level keyboard event source.
#[derive(Default)]
pub struct KeyboardHub {
    listeners: Mutex<Vec<(ListenerHandle, KeyListener)>>,
    next_id: AtomicU64,
}

impl KeyboardHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, phase: KeyPhase, listener: KeyListener) -> ListenerHandle {
        let handle = ListenerHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            phase,
        };
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push((handle, listener));
        }
        handle
    }

    /// Remove the listener registered under `handle`.
    pub fn remove_listener(&self, handle: ListenerHandle) -> bool {
        let Ok(mut listeners) = self.listeners.lock() else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != handle);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    /// Deliver `event` to every listener of its phase; returns how many ran.
    ///
    /// Listeners run outside the registry lock, so they may subscribe or
    /// unsubscribe while handling an event.
    pub fn dispatch(&self, event: &KeyEvent) -> usize {
        let targets: Vec<KeyListener> = match self.listeners.lock() {
            Ok(listeners) => listeners
                .iter()
                .filter(|(handle, _)| handle.phase == event.phase)
                .map(|(_, listener)| listener.clone())
                .collect(),
            Err(_) => return 0,
        };

        for listener in &targets {
            listener(event);
        }
        targets.len()
    }
}

/// The matched pair of listeners an `InputForwarder` registered.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct KeySubscription {
    pub down: ListenerHandle,
    pub up: ListenerHandle,
}

impl KeySubscription {
    /// Remove both listeners; true if both were still registered.
    pub fn detach(self, hub: &KeyboardHub) -> bool {
        let down = hub.remove_listener(self.down);
        let up = hub.remove_listener(self.up);
        down && up
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyProtocol {
    SingleChar,
    MultiChar,
}

/// Outcome of forwarding one event.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Forwarded {
    Sent,
    Dropped,
}

pub struct InputForwarder {
    module: SharedModule,
    protocol: KeyProtocol,
    key_buffer: Mutex<Option<u64>>,
}

impl InputForwarder {
    pub fn new(module: SharedModule, protocol: KeyProtocol) -> Arc<Self> {
        Arc::new(Self {
            module,
            protocol,
            key_buffer: Mutex::new(None),
        })
    }

    /// Forward one event to the guest.
    pub fn forward(&self, event: &KeyEvent) -> HostResult<Forwarded> {
        match self.protocol {
            KeyProtocol::SingleChar => {
                if event.text_len() != 1 {
                    return Ok(Forwarded::Dropped);
                }
                self.module.lock()?.keyboard(event.code, event.is_down())?;
            }
            KeyProtocol::MultiChar => {
                let codes: Vec<u8> = event.key.encode_utf16().map(|unit| unit as u8).collect();
                if codes.len() > KEY_BUFFER_LEN {
                    return Err(HostError::KeyBufferOverflow {
                        key: event.key.clone(),
                        len: codes.len(),
                        capacity: KEY_BUFFER_LEN,
                    });
                }

                let mut module = self.module.lock()?;
                let offset = {
                    let mut cached = self.key_buffer.lock()?;
                    match *cached {
                        Some(offset) => offset,
                        None => {
                            let offset = module.keyboard_offset()?;
                            *cached = Some(offset);
                            offset
                        }
                    }
                };
                module.write_memory(offset, &codes)?;
                module.register_keypress(codes.len(), event.is_down())?;
            }
        }
        Ok(Forwarded::Sent)
    }

    /// Subscribe to key-down and key-up with one shared listener.
    pub fn attach(self: &Arc<Self>, hub: &KeyboardHub) -> KeySubscription {
        let forwarder = Arc::clone(self);
        let listener: KeyListener = Arc::new(move |event: &KeyEvent| {
            match forwarder.forward(event) {
                Ok(Forwarded::Sent) => {}
                Ok(Forwarded::Dropped) => tracing::debug!("{}", KeyDropped { key: &event.key }),
                Err(error) => tracing::warn!(
                    "{}",
                    KeyForwardFailed {
                        key: &event.key,
                        error: &error,
                    }
                ),
            }
        });

        KeySubscription {
            down: hub.add_listener(KeyPhase::Down, listener.clone()),
            up: hub.add_listener(KeyPhase::Up, listener),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_key_codes() {
        assert_eq!(KeyEvent::down("a").code, 65);
        assert_eq!(KeyEvent::down("7").code, 55);
        assert_eq!(KeyEvent::down(" ").code, 32);
        assert_eq!(KeyEvent::up("ArrowLeft").code, 37);
        assert_eq!(KeyEvent::up("F13").code, 0);
    }

    #[test]
    fn test_dispatch_respects_phase() {
        let hub = KeyboardHub::new();
        let downs = Arc::new(AtomicUsize::new(0));
        let counter = downs.clone();
        hub.add_listener(
            KeyPhase::Down,
            Arc::new(move |_: &KeyEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(hub.dispatch(&KeyEvent::down("a")), 1);
        assert_eq!(hub.dispatch(&KeyEvent::up("a")), 0);
        assert_eq!(downs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_by_handle() {
        let hub = KeyboardHub::new();
        let listener: KeyListener = Arc::new(|_: &KeyEvent| {});
        let down = hub.add_listener(KeyPhase::Down, listener.clone());
        let up = hub.add_listener(KeyPhase::Up, listener);
        assert_eq!(hub.listener_count(), 2);

        let subscription = KeySubscription { down, up };
        assert!(subscription.detach(&hub));
        assert_eq!(hub.listener_count(), 0);
        assert!(!hub.remove_listener(down));
    }

    #[test]
    fn test_listener_may_unsubscribe_during_dispatch() {
        let hub = Arc::new(KeyboardHub::new());
        let slot: Arc<Mutex<Option<ListenerHandle>>> = Arc::new(Mutex::new(None));

        let listener: KeyListener = {
            let hub = hub.clone();
            let slot = slot.clone();
            Arc::new(move |_: &KeyEvent| {
                if let Some(handle) = slot.lock().unwrap().take() {
                    hub.remove_listener(handle);
                }
            })
        };
        *slot.lock().unwrap() = Some(hub.add_listener(KeyPhase::Down, listener));

        assert_eq!(hub.dispatch(&KeyEvent::down("x")), 1);
        assert_eq!(hub.dispatch(&KeyEvent::down("x")), 0);
    }
}
