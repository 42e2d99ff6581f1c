// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Shared memory buffer
//!
//! The host allocates one fixed-size linear memory per page and hands it to
//! the guest as `env.memory`. Offsets returned by guest exports are opaque
//! addresses into it; every host read is bounded by a length the host derives
//! itself, never by a length the guest reports.

use crate::config::consts::{ADD_DEMO_PAGES, GAME_DEMO_PAGES, PERLIN_DEMO_PAGES, WASM_PAGE_SIZE};
use crate::errors::{HostError, HostResult};
use wasmtime::{AsContextMut, Memory, MemoryType};

/// Page count of a shared memory; initial and maximum are always equal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MemoryPages(pub u32);

impl MemoryPages {
    pub const ADD_DEMO: MemoryPages = MemoryPages(ADD_DEMO_PAGES);
    pub const PERLIN_DEMO: MemoryPages = MemoryPages(PERLIN_DEMO_PAGES);
    pub const GAME_DEMO: MemoryPages = MemoryPages(GAME_DEMO_PAGES);

    #[inline]
    pub fn bytes(self) -> u64 {
        u64::from(self.0) * WASM_PAGE_SIZE
    }

    /// Allocate the memory in `store`.
    pub fn allocate(self, store: impl AsContextMut) -> HostResult<Memory> {
        let ty = MemoryType::new(self.0, Some(self.0));
        Ok(Memory::new(store, ty)?)
    }
}

/// A byte range inside the shared memory.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub offset: u64,
    pub len: u64,
}

impl MemoryRegion {
    pub fn new(offset: u64, len: u64) -> Self {
        Self { offset, len }
    }

    /// End of the region, or an over-read error if it leaves `capacity`.
    pub fn checked_end(&self, capacity: u64) -> HostResult<u64> {
        self.offset
            .checked_add(self.len)
            .filter(|end| *end <= capacity)
            .ok_or(HostError::BufferOverread {
                offset: self.offset,
                len: self.len,
                capacity,
            })
    }
}

/// Borrow `region` out of `data`.
pub fn read_region(data: &[u8], region: MemoryRegion) -> HostResult<&[u8]> {
    let end = region.checked_end(data.len() as u64)?;
    Ok(&data[region.offset as usize..end as usize])
}

/// Copy `bytes` into `data` at `offset`.
pub fn write_region(data: &mut [u8], offset: u64, bytes: &[u8]) -> HostResult<()> {
    let region = MemoryRegion::new(offset, bytes.len() as u64);
    let end = region.checked_end(data.len() as u64)?;
    data[offset as usize..end as usize].copy_from_slice(bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmtime::{Engine, Store};

    #[test]
    fn test_demo_page_sizes() {
        assert_eq!(MemoryPages::ADD_DEMO.bytes(), 2 * 65_536);
        assert_eq!(MemoryPages::PERLIN_DEMO.bytes(), 14 * 65_536);
        assert_eq!(MemoryPages::GAME_DEMO.bytes(), 18 * 65_536);
    }

    #[test]
    fn test_allocate_fixed_size() {
        let engine = Engine::default();
        let mut store = Store::new(&engine, ());
        let memory = MemoryPages::ADD_DEMO.allocate(&mut store).unwrap();

        assert_eq!(memory.data_size(&store) as u64, MemoryPages::ADD_DEMO.bytes());
        assert_eq!(memory.ty(&store).maximum(), Some(2));
        assert!(memory.grow(&mut store, 1).is_err());
    }

    #[test]
    fn test_read_within_bounds() {
        let data: Vec<u8> = (0..32).collect();
        let slice = read_region(&data, MemoryRegion::new(4, 16)).unwrap();
        assert_eq!(slice, &data[4..20]);
    }

    #[test]
    fn test_read_to_exact_end() {
        let data = vec![7u8; 16];
        assert_eq!(read_region(&data, MemoryRegion::new(0, 16)).unwrap().len(), 16);
    }

    #[test]
    fn test_overread_rejected() {
        let data = vec![0u8; 16];
        match read_region(&data, MemoryRegion::new(8, 9)) {
            Err(HostError::BufferOverread {
                offset,
                len,
                capacity,
            }) => {
                assert_eq!((offset, len, capacity), (8, 9, 16));
            }
            other => panic!("Expected BufferOverread, got {:?}", other),
        }
    }

    #[test]
    fn test_overflowing_offset_rejected() {
        let data = vec![0u8; 16];
        assert!(read_region(&data, MemoryRegion::new(u64::MAX, 2)).is_err());
    }

    #[test]
    fn test_write_region() {
        let mut data = vec![0u8; 8];
        write_region(&mut data, 2, &[1, 2, 3]).unwrap();
        assert_eq!(data, vec![0, 0, 1, 2, 3, 0, 0, 0]);
        assert!(write_region(&mut data, 6, &[1, 2, 3]).is_err());
    }
}
