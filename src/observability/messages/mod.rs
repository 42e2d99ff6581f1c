// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! * `host` - module fetch, validation, instantiation and guest callbacks
//! * `runtime` - frame driver, key forwarding, presenters and sessions
//!
//! # Usage Pattern
//!
//! ```rust
//! use wasm_canvas_host::observability::messages::runtime::FrameLoopStarted;
//!
//! let msg = FrameLoopStarted { period_ms: 16 };
//!
//! tracing::info!("{}", msg);
//! ```

pub mod host;
pub mod runtime;
