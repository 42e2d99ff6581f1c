// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Guest binary kind detection
//!
//! The canvas host drives core WebAssembly modules with a numeric ABI. Text
//! format sources are accepted as-is (wasmtime compiles them); binaries are
//! parsed with `wasmparser` so component-model binaries are rejected with a
//! clear message instead of a generic compile error.

use crate::errors::{HostError, COMPONENT_NOT_SUPPORTED};
use wasmparser::{Encoding, Parser, Payload};

const WASM_MAGIC: &[u8; 4] = b"\0asm";

/// Kind of guest input handed to the loader.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinaryKind {
    /// Core module in binary encoding
    CoreModule,
    /// WebAssembly text format, compiled by wasmtime
    Text,
}

/// Checks that `bytes` is something the host can instantiate.
///
/// # Errors
/// Returns an error if the input is empty, a truncated or invalid binary, or
/// a component-model binary.
pub fn ensure_core_module(bytes: &[u8]) -> Result<BinaryKind, HostError> {
    if bytes.is_empty() {
        return Err(HostError::InvalidBinary("empty module".to_string()));
    }

    if !bytes.starts_with(WASM_MAGIC) {
        let looks_like_text = std::str::from_utf8(bytes)
            .map(|text| {
                let text = text.trim_start();
                text.starts_with('(') || text.starts_with(";;")
            })
            .unwrap_or(false);
        return if looks_like_text {
            Ok(BinaryKind::Text)
        } else {
            Err(HostError::InvalidBinary("missing WASM magic header".to_string()))
        };
    }

    let mut encoding = None;
    for payload in Parser::new(0).parse_all(bytes) {
        if let Payload::Version { encoding: enc, .. } = payload? {
            encoding = Some(enc);
            break;
        }
    }

    match encoding {
        Some(Encoding::Module) => Ok(BinaryKind::CoreModule),
        Some(Encoding::Component) => Err(HostError::InvalidBinary(
            COMPONENT_NOT_SUPPORTED.to_string(),
        )),
        None => Err(HostError::InvalidBinary("Invalid WASM binary".to_string())),
    }
}
