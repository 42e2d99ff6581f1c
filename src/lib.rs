// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod config;     // page configuration + constants
pub mod errors;     // error handling
pub mod host;       // guest loading, memory and env imports
pub mod observability;
pub mod render;     // canvases, surfaces and presenters
pub mod runtime;    // frame loop, input and page sessions
