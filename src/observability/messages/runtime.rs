// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the per-page runtime.
//!
//! This module contains message types for logging events related to:
//! * the frame loop driving `update`
//! * keyboard events forwarded to the guest
//! * polling and one-shot presenters
//! * page session lifecycle

use std::fmt::{Display, Formatter};

/// Frame loop started.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use wasm_canvas_host::observability::messages::runtime::FrameLoopStarted;
///
/// let msg = FrameLoopStarted { period_ms: 16 };
///
/// tracing::info!("{}", msg);
/// ```
pub struct FrameLoopStarted {
    pub period_ms: u64,
}

impl Display for FrameLoopStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Frame loop started (period {}ms)", self.period_ms)
    }
}

/// Frame loop cancelled and joined.
///
/// # Log Level
/// `info!` - Important operational event
pub struct FrameLoopStopped {
    pub frames: u64,
}

impl Display for FrameLoopStopped {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Frame loop stopped after {} frame(s)", self.frames)
    }
}

/// `update` failed and the loop stopped.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use wasm_canvas_host::observability::messages::runtime::FrameFaulted;
///
/// let error = std::io::Error::new(std::io::ErrorKind::Other, "unreachable");
/// let msg = FrameFaulted {
///     frame: 42,
///     error: &error,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct FrameFaulted<'a> {
    pub frame: u64,
    pub error: &'a dyn std::error::Error,
}

impl Display for FrameFaulted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Frame {} failed, stopping loop: {}", self.frame, self.error)
    }
}

/// Key event the active protocol cannot express.
///
/// # Log Level
/// `debug!` - Expected and frequent
pub struct KeyDropped<'a> {
    pub key: &'a str,
}

impl Display for KeyDropped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Dropped key '{}'", self.key)
    }
}

/// Forwarding a key event to the guest failed.
///
/// # Log Level
/// `warn!` - The page keeps running
///
/// # Example
/// ```
/// use wasm_canvas_host::observability::messages::runtime::KeyForwardFailed;
///
/// let error = std::io::Error::new(std::io::ErrorKind::Other, "buffer full");
/// let msg = KeyForwardFailed {
///     key: "ArrowLeft",
///     error: &error,
/// };
///
/// tracing::warn!("{}", msg);
/// ```
pub struct KeyForwardFailed<'a> {
    pub key: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for KeyForwardFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Failed to forward key '{}': {}", self.key, self.error)
    }
}

/// Polling presenter repainted.
///
/// # Log Level
/// `debug!` - Once per interval
pub struct PresenterTick {
    pub tick: u64,
    pub bytes: u64,
}

impl Display for PresenterTick {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Presenter tick {}: painted {} bytes", self.tick, self.bytes)
    }
}

/// Polling presenter could not repaint and stopped.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct PresenterFailed<'a> {
    pub tick: u64,
    pub error: &'a dyn std::error::Error,
}

impl Display for PresenterFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Presenter tick {} failed, clearing interval: {}",
            self.tick, self.error
        )
    }
}

pub struct PresenterStopped {
    pub ticks: u64,
}

impl Display for PresenterStopped {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Presenter stopped after {} tick(s)", self.ticks)
    }
}

/// Page mounted.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use wasm_canvas_host::observability::messages::runtime::SessionMounted;
///
/// tracing::info!("{}", SessionMounted { page: "perlin" });
/// ```
pub struct SessionMounted<'a> {
    pub page: &'a str,
}

impl Display for SessionMounted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Mounted page '{}'", self.page)
    }
}

/// Page entered the failed state.
///
/// # Log Level
/// `error!` - Failure shown to the user
pub struct SessionFailed<'a> {
    pub page: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for SessionFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Page '{}' failed: {}", self.page, self.error)
    }
}

pub struct SessionUnmounted<'a> {
    pub page: &'a str,
}

impl Display for SessionUnmounted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Unmounted page '{}'", self.page)
    }
}

/// Result of calling `add` and reading the shared buffer.
///
/// # Log Level
/// `info!` - Demo output
///
/// # Example
/// ```
/// use wasm_canvas_host::observability::messages::runtime::ProbeCompleted;
///
/// let msg = ProbeCompleted {
///     sum: 3,
///     offset: 1024,
///     bytes: &[1, 2, 3, 4],
/// };
///
/// assert_eq!(msg.to_string(), "add(...) = 3; buffer @1024: [1, 2, 3, 4]");
/// ```
pub struct ProbeCompleted<'a> {
    pub sum: i32,
    pub offset: u64,
    pub bytes: &'a [u8],
}

impl Display for ProbeCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "add(...) = {}; buffer @{}: {:?}",
            self.sum, self.offset, self.bytes
        )
    }
}
