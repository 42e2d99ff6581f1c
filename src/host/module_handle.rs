// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Module handle: the live exports of an instantiated guest.
//!
//! A handle owns its wasmtime `Store`, so every call goes through `&mut self`.
//! Pages share a handle as `SharedModule`; the mutex is what keeps guest
//! calls strictly sequential between the frame loop, the presenters and the
//! keyboard listeners.

use crate::config::consts::{exports, CALL_FUEL};
use crate::errors::{HostError, HostResult};
use crate::host::abi;
use crate::host::environment::HostState;
use crate::host::memory::{read_region, write_region, MemoryRegion};
use crate::render::surface::SharedSurface;
use std::sync::{Arc, Mutex};
use wasmtime::{Instance, Memory, Store, Val, ValType};

pub type SharedModule = Arc<Mutex<ModuleHandle>>;

pub struct ModuleHandle {
    store: Store<HostState>,
    instance: Instance,
    memory: Memory,
    exports: Vec<String>,
}

impl ModuleHandle {
    pub(crate) fn new(
        store: Store<HostState>,
        instance: Instance,
        memory: Memory,
        exports: Vec<String>,
    ) -> Self {
        Self {
            store,
            instance,
            memory,
            exports,
        }
    }

    pub fn into_shared(self) -> SharedModule {
        Arc::new(Mutex::new(self))
    }

    pub fn has_export(&self, name: &str) -> bool {
        self.exports.iter().any(|export| export == name)
    }

    /// Call export `name` with numeric arguments.
    ///
    /// Arguments are converted to the declared parameter types. The single
    /// result, if any, comes back as `f64`.
    pub fn call(&mut self, name: &str, args: &[f64]) -> HostResult<Option<f64>> {
        let func = self
            .instance
            .get_func(&mut self.store, name)
            .ok_or_else(|| HostError::MissingExport(name.to_string()))?;
        let ty = func.ty(&self.store);

        let params: Vec<ValType> = ty.params().collect();
        if params.len() != args.len() {
            return Err(HostError::AbiMismatch {
                export: name.to_string(),
                reason: format!("expects {} argument(s), got {}", params.len(), args.len()),
            });
        }
        let params = params
            .iter()
            .zip(args)
            .map(|(ty, value)| abi::coerce_arg(name, ty, *value))
            .collect::<HostResult<Vec<Val>>>()?;

        let result_types: Vec<ValType> = ty.results().collect();
        if result_types.len() > 1 {
            return Err(HostError::AbiMismatch {
                export: name.to_string(),
                reason: format!("returns {} values", result_types.len()),
            });
        }
        let mut results = result_types
            .iter()
            .map(|ty| abi::zero_value(name, ty))
            .collect::<HostResult<Vec<Val>>>()?;

        self.store.set_fuel(CALL_FUEL)?;
        func.call(&mut self.store, &params, &mut results)
            .map_err(|e| HostError::Trap {
                export: name.to_string(),
                reason: format!("{:#}", e),
            })?;

        match results.first() {
            None => Ok(None),
            Some(value) => abi::val_to_f64(value).map(Some).ok_or_else(|| {
                HostError::AbiMismatch {
                    export: name.to_string(),
                    reason: "result is not numeric".to_string(),
                }
            }),
        }
    }

    fn call_for_value(&mut self, name: &str, args: &[f64]) -> HostResult<f64> {
        self.call(name, args)?.ok_or_else(|| HostError::AbiMismatch {
            export: name.to_string(),
            reason: "returned no value".to_string(),
        })
    }

    pub fn add(&mut self, a: i32, b: i32) -> HostResult<i32> {
        let sum = self.call_for_value(exports::ADD, &[f64::from(a), f64::from(b)])?;
        Ok(abi::to_int32(sum))
    }

    /// Offset of the guest's output buffer in the shared memory.
    pub fn buffer_pointer(&mut self) -> HostResult<u64> {
        let offset = self.call_for_value(exports::GET_BUFFER_POINTER, &[])?;
        Ok(u64::from(abi::to_uint32(offset)))
    }

    pub fn compute_buffer(&mut self) -> HostResult<()> {
        self.call(exports::COMPUTE_BUFFER, &[]).map(|_| ())
    }

    pub fn compute_perlin(&mut self) -> HostResult<()> {
        self.call(exports::COMPUTE_PERLIN, &[]).map(|_| ())
    }

    pub fn set_seed(&mut self, seed: f64) -> HostResult<()> {
        self.call(exports::SET_SEED, &[seed]).map(|_| ())
    }

    pub fn init(&mut self) -> HostResult<()> {
        self.call(exports::INIT, &[]).map(|_| ())
    }

    /// Per-frame update with a timestamp in milliseconds.
    pub fn update(&mut self, timestamp_ms: f64) -> HostResult<()> {
        self.call(exports::UPDATE, &[timestamp_ms]).map(|_| ())
    }

    pub fn keyboard(&mut self, code: u32, down: bool) -> HostResult<()> {
        self.call(exports::KEYBOARD, &[f64::from(code), bool_arg(down)])
            .map(|_| ())
    }

    pub fn register_keypress(&mut self, len: usize, down: bool) -> HostResult<()> {
        self.call(exports::REGISTER_KEYPRESS, &[len as f64, bool_arg(down)])
            .map(|_| ())
    }

    /// Offset of the guest's key buffer in the shared memory.
    pub fn keyboard_offset(&mut self) -> HostResult<u64> {
        let offset = self.call_for_value(exports::KEYBOARD_OFFSET, &[])?;
        Ok(u64::from(abi::to_uint32(offset)))
    }

    /// Size of the linear memory in bytes.
    pub fn memory_size(&self) -> u64 {
        self.memory.data_size(&self.store) as u64
    }

    /// Run `f` over the linear memory.
    pub fn with_memory<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(self.memory.data(&self.store))
    }

    /// Copy `region` out of the linear memory.
    pub fn read_memory(&self, region: MemoryRegion) -> HostResult<Vec<u8>> {
        self.with_memory(|data| read_region(data, region).map(<[u8]>::to_vec))
    }

    pub fn write_memory(&mut self, offset: u64, bytes: &[u8]) -> HostResult<()> {
        write_region(self.memory.data_mut(&mut self.store), offset, bytes)
    }

    /// Values the guest logged through `print`.
    pub fn guest_log(&self) -> &[f64] {
        self.store.data().log()
    }

    pub fn surface(&self) -> Option<SharedSurface> {
        self.store.data().surface()
    }
}

fn bool_arg(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}
