// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-page runtime: the frame loop, keyboard forwarding and the session
//! that owns them.

pub mod frame_driver;
pub mod input;
pub mod session;


pub use frame_driver::{FrameDriver, FrameFault, FrameToken};
pub use input::{
    Forwarded, InputForwarder, KeyEvent, KeyListener, KeyPhase, KeyProtocol, KeySubscription,
    KeyboardHub, ListenerHandle,
};
pub use session::{PageSession, ProbeReport};
