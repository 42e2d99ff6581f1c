// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for guest module loading and host callbacks.
//!
//! This module contains message types for logging events related to:
//! * fetching guest binaries
//! * instantiating modules against the `env` environment
//! * loads deferred until a render surface exists
//! * values the guest logs through `print`

use crate::render::surface::ContextKind;
use std::fmt::{Display, Formatter};

/// Guest binary fetched.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use wasm_canvas_host::observability::messages::host::ModuleFetched;
///
/// let msg = ModuleFetched {
///     location: "demos/add.wat",
///     size_bytes: 512,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ModuleFetched<'a> {
    pub location: &'a str,
    pub size_bytes: usize,
}

impl Display for ModuleFetched<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Fetched guest module: {} ({} bytes)",
            self.location, self.size_bytes
        )
    }
}

/// Guest module loading failed.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use wasm_canvas_host::observability::messages::host::ModuleLoadFailed;
///
/// let error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
/// let msg = ModuleLoadFailed {
///     location: "demos/missing.wasm",
///     error: &error,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct ModuleLoadFailed<'a> {
    pub location: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ModuleLoadFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Failed to load guest module '{}': {}",
            self.location, self.error
        )
    }
}

/// Module instantiated and ready to call.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use wasm_canvas_host::observability::messages::host::ModuleInstantiated;
///
/// let exports = vec!["add".to_string(), "getBufferPointer".to_string()];
/// let msg = ModuleInstantiated {
///     location: "demos/add.wat",
///     pages: 2,
///     exports: &exports,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ModuleInstantiated<'a> {
    pub location: &'a str,
    pub pages: u32,
    pub exports: &'a [String],
}

impl Display for ModuleInstantiated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Instantiated '{}' with {} memory page(s); exports: [{}]",
            self.location,
            self.pages,
            self.exports.join(", ")
        )
    }
}

/// Load postponed because a dependency is not ready yet.
///
/// # Log Level
/// `info!` - Expected transient state
///
/// # Example
/// ```
/// use wasm_canvas_host::observability::messages::host::LoadDeferred;
///
/// let msg = LoadDeferred {
///     location: "demos/game.wat",
///     reason: "render surface not bound",
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct LoadDeferred<'a> {
    pub location: &'a str,
    pub reason: &'a str,
}

impl Display for LoadDeferred<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Deferring load of '{}': {}", self.location, self.reason)
    }
}

/// Value logged by the guest through `print`.
///
/// # Log Level
/// `info!` - Guest output
pub struct GuestLog {
    pub value: f64,
}

impl Display for GuestLog {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Number: {}", self.value)
    }
}

/// Render surface acquired from a canvas.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use wasm_canvas_host::observability::messages::host::SurfaceBound;
/// use wasm_canvas_host::render::ContextKind;
///
/// let msg = SurfaceBound {
///     surface: "surface-1",
///     context: ContextKind::WebGl,
///     width: 500,
///     height: 500,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct SurfaceBound<'a> {
    pub surface: &'a str,
    pub context: ContextKind,
    pub width: u32,
    pub height: u32,
}

impl Display for SurfaceBound<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Bound {} context as {} ({}x{})",
            self.context, self.surface, self.width, self.height
        )
    }
}
