// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging.
//!
//! Every diagnostic line the host emits is a small struct with a `Display`
//! implementation, logged through `tracing`. Message text lives here and
//! nowhere else.
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::host` - fetching, instantiating and linking guest modules
//! * `messages::runtime` - frame loop, input, presenters and page sessions
//!
//! # Usage
//!
//! ```rust
//! use wasm_canvas_host::observability::messages::runtime::SessionFailed;
//!
//! let error = std::io::Error::new(std::io::ErrorKind::Other, "test error");
//! let msg = SessionFailed {
//!     page: "game",
//!     error: &error,
//! };
//!
//! tracing::error!("{}", msg);
//! ```

pub mod messages;
