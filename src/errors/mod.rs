// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error types for the canvas host.
//!
//! `HostError` covers every failure a page session can surface to its view:
//! loading and instantiating a guest, memory layout mismatches, bounded
//! buffer access, canvas context acquisition, guest ABI problems and
//! configuration. All variants implement `std::error::Error` via `thiserror`.

use thiserror::Error;

/// Error message for component-model binaries handed to the core-module host.
pub const COMPONENT_NOT_SUPPORTED: &str = "Component Model binaries are not supported; \
the canvas host instantiates core WebAssembly modules only.";

#[derive(Error, Debug)]
pub enum HostError {
    /// The guest binary could not be fetched.
    #[error("Failed to fetch module '{location}': {reason}")]
    FetchFailed { location: String, reason: String },

    /// Invalid or malformed WASM binary.
    #[error("Invalid WASM binary: {0}")]
    InvalidBinary(String),

    /// Compilation or instantiation rejected the module.
    #[error("Failed to instantiate module: {0}")]
    InstantiationFailed(String),

    /// The module requires a memory the host does not provide.
    #[error(
        "Memory mismatch: module requires {required_min} page(s) (max {required_max:?}) but the host provides {provided}"
    )]
    MemoryMismatch {
        required_min: u64,
        required_max: Option<u64>,
        provided: u32,
    },

    /// The module imports an `env` item the demo does not supply.
    #[error("Unresolved import '{module}::{name}'")]
    UnresolvedImport { module: String, name: String },

    /// Read or write outside the shared buffer.
    #[error("Buffer over-read: offset {offset} + length {len} exceeds {capacity} bytes")]
    BufferOverread {
        offset: u64,
        len: u64,
        capacity: u64,
    },

    /// The canvas does not support the requested rendering context.
    #[error("Rendering context '{0}' is not available on this canvas")]
    ContextUnavailable(String),

    /// A blit region does not fit the bound surface.
    #[error("Region {width}x{height} does not fit surface {surface_width}x{surface_height}")]
    RegionTooLarge {
        width: u32,
        height: u32,
        surface_width: u32,
        surface_height: u32,
    },

    /// The page's module has not finished loading.
    #[error("Module is not loaded yet")]
    NotReady,

    /// An operation needed a bound surface but none exists.
    #[error("No render surface is bound")]
    SurfaceMissing,

    /// A required export is missing from the module.
    #[error("Module does not export '{0}'")]
    MissingExport(String),

    /// The export exists but its numeric signature cannot be driven.
    #[error("ABI mismatch calling '{export}': {reason}")]
    AbiMismatch { export: String, reason: String },

    /// The guest trapped while running an export.
    #[error("Guest trapped in '{export}': {reason}")]
    Trap { export: String, reason: String },

    /// A key does not fit into the shared key buffer.
    #[error("Key '{key}' needs {len} bytes but the key buffer holds {capacity}")]
    KeyBufferOverflow {
        key: String,
        len: usize,
        capacity: usize,
    },

    /// Shared state was poisoned by a panicking holder.
    #[error("Shared state poisoned: {0}")]
    Poisoned(String),

    /// Configuration could not be parsed or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Wasmtime engine or store error.
    #[error("WASM runtime error: {0}")]
    Runtime(#[from] wasmtime::Error),

    /// Snapshot encoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// WASM binary parsing error from wasmparser.
    #[error("WASM parser error: {0}")]
    Parser(#[from] wasmparser::BinaryReaderError),
}

impl HostError {
    /// Whether the error belongs to the load phase (fetch through instantiation).
    ///
    /// Load errors leave the page in a failed state that `retry` can clear.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            HostError::FetchFailed { .. }
                | HostError::InvalidBinary(_)
                | HostError::InstantiationFailed(_)
                | HostError::MemoryMismatch { .. }
                | HostError::UnresolvedImport { .. }
                | HostError::Io(_)
                | HostError::Parser(_)
        )
    }
}

impl<T> From<std::sync::PoisonError<T>> for HostError {
    fn from(error: std::sync::PoisonError<T>) -> Self {
        HostError::Poisoned(error.to_string())
    }
}

/// Result type alias for host operations.
pub type HostResult<T> = Result<T, HostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_mismatch_message() {
        let err = HostError::MemoryMismatch {
            required_min: 14,
            required_max: None,
            provided: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("14 page(s)"));
        assert!(msg.contains("provides 2"));
        assert!(err.is_load_error());
    }

    #[test]
    fn test_runtime_errors_are_not_load_errors() {
        let err = HostError::Trap {
            export: "update".to_string(),
            reason: "unreachable".to_string(),
        };
        assert!(!err.is_load_error());
        assert!(!HostError::SurfaceMissing.is_load_error());
    }
}
