// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! WebAssembly host: loading guests and talking to them.

pub mod abi;
pub mod detector;
pub mod environment;
pub mod loader;
pub mod memory;
pub mod module_handle;
pub mod source;

pub use environment::{Environment, HostCallback, HostState};
pub use loader::{LoadRequest, LoadState, ModuleLoader, ModuleSlot};
pub use memory::{MemoryPages, MemoryRegion};
pub use module_handle::{ModuleHandle, SharedModule};
pub use source::{BytesSource, FileSource, ModuleSource};
