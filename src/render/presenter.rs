// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Buffer presenter
//!
//! Paints regions of the shared memory into a render surface. A blit always
//! runs to completion synchronously: samples are read row-major, top to
//! bottom, left to right, one pixel per sample group. Read lengths come from
//! the region's dimensions and format, never from the guest.
//!
//! Two drivers sit on top of `blit`:
//! * `present_once` computes and paints a single frame (the Perlin page).
//! * `PollingPresenter` recomputes and repaints on a fixed interval until it
//!   is stopped (the basic buffer page).

use crate::config::consts::exports;
use crate::errors::{HostError, HostResult};
use crate::host::memory::{read_region, MemoryRegion};
use crate::host::module_handle::SharedModule;
use crate::observability::messages::runtime::{PresenterFailed, PresenterStopped, PresenterTick};
use crate::render::surface::{RenderSurface, SharedSurface};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Sample layout of a buffer region.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Three bytes per pixel
    Rgb,
    /// One byte per pixel, used for all three channels
    Gray,
    /// Four bytes per pixel
    Rgba,
}

impl PixelFormat {
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb => 3,
            PixelFormat::Gray => 1,
            PixelFormat::Rgba => 4,
        }
    }
}

/// A `width` x `height` image stored at `offset` in the shared memory.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlitRegion {
    pub offset: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl BlitRegion {
    pub fn new(offset: u64, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            offset,
            width,
            height,
            format,
        }
    }

    pub fn rgba(offset: u64, width: u32, height: u32) -> Self {
        Self::new(offset, width, height, PixelFormat::Rgba)
    }

    /// Number of bytes the region covers.
    pub fn len(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * self.format.bytes_per_pixel() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn memory_region(&self) -> MemoryRegion {
        MemoryRegion::new(self.offset, self.len())
    }
}

/// Compose a 24-bit `0xRRGGBB` colour.
#[inline]
pub fn compose_rgb(r: u8, g: u8, b: u8) -> u32 {
    (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

/// Paint `region` of `data` into the top-left corner of `surface`.
///
/// # Errors
/// `RegionTooLarge` if the region exceeds the surface, `BufferOverread` if it
/// exceeds `data`.
pub fn blit(data: &[u8], region: BlitRegion, surface: &mut RenderSurface) -> HostResult<()> {
    if region.width > surface.width() || region.height > surface.height() {
        return Err(HostError::RegionTooLarge {
            width: region.width,
            height: region.height,
            surface_width: surface.width(),
            surface_height: surface.height(),
        });
    }

    let samples = read_region(data, region.memory_region())?;
    let stride = region.format.bytes_per_pixel();
    let width = region.width as usize;

    for (index, sample) in samples.chunks_exact(stride).enumerate() {
        let x = (index % width) as u32;
        let y = (index / width) as u32;
        match region.format {
            PixelFormat::Rgb => surface.put_rgb(x, y, compose_rgb(sample[0], sample[1], sample[2])),
            PixelFormat::Gray => surface.put_rgb(x, y, compose_rgb(sample[0], sample[0], sample[0])),
            PixelFormat::Rgba => {
                surface.put_rgba(x, y, [sample[0], sample[1], sample[2], sample[3]])
            }
        }
    }
    Ok(())
}

/// How a presenter finds and refreshes its region.
#[derive(Debug, Clone)]
pub struct PresentSpec {
    pub format: PixelFormat,
    /// Export called before each read, e.g. `computePerlin`.
    pub recompute_export: Option<String>,
    /// Seed the guest with the wall clock first (one-shot only).
    pub seed_from_clock: bool,
}

fn wall_clock_millis() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as f64)
        .unwrap_or(0.0)
}

/// Recompute, locate the buffer and paint it, all under one module lock.
fn refresh(module: &SharedModule, surface: &SharedSurface, spec: &PresentSpec) -> HostResult<u64> {
    let mut module = module.lock()?;
    if let Some(export) = &spec.recompute_export {
        module.call(export, &[])?;
    }
    let offset = module.buffer_pointer()?;

    let mut surface = surface.lock()?;
    let region = BlitRegion::new(offset, surface.width(), surface.height(), spec.format);
    module.with_memory(|data| blit(data, region, &mut surface))?;
    Ok(region.len())
}

/// Compute and paint a single frame.
///
/// The surface is painted white first, then the guest is optionally seeded
/// with the current wall-clock milliseconds.
pub fn present_once(
    module: &SharedModule,
    surface: &SharedSurface,
    spec: &PresentSpec,
) -> HostResult<u64> {
    surface.lock()?.fill_white();
    if spec.seed_from_clock {
        module.lock()?.call(exports::SET_SEED, &[wall_clock_millis()])?;
    }
    refresh(module, surface, spec)
}

/// The tick that stopped a polling presenter.
#[derive(Debug, Clone)]
pub struct PresentFault {
    pub tick: u64,
    pub error: Arc<HostError>,
}

/// Periodic recompute-and-repaint task.
pub struct PollingPresenter {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    ticks: Arc<AtomicU64>,
    fault: Arc<Mutex<Option<PresentFault>>>,
}

impl PollingPresenter {
    /// Start polling. The first tick fires one full `period` after start.
    pub fn start(
        module: SharedModule,
        surface: SharedSurface,
        spec: PresentSpec,
        period: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let ticks = Arc::new(AtomicU64::new(0));
        let fault = Arc::new(Mutex::new(None));

        let task = tokio::spawn({
            let cancel = cancel.clone();
            let ticks = ticks.clone();
            let fault = fault.clone();
            async move {
                let mut interval = interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = interval.tick() => {}
                    }

                    let tick = ticks.fetch_add(1, Ordering::SeqCst) + 1;
                    match refresh(&module, &surface, &spec) {
                        Ok(bytes) => tracing::debug!("{}", PresenterTick { tick, bytes }),
                        Err(error) => {
                            tracing::error!("{}", PresenterFailed { tick, error: &error });
                            if let Ok(mut slot) = fault.lock() {
                                *slot = Some(PresentFault {
                                    tick,
                                    error: Arc::new(error),
                                });
                            }
                            break;
                        }
                    }
                }

                tracing::info!(
                    "{}",
                    PresenterStopped {
                        ticks: ticks.load(Ordering::SeqCst)
                    }
                );
            }
        });

        Self {
            cancel,
            task: Some(task),
            ticks,
            fault,
        }
    }

    /// Number of ticks that have run.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// The failure that cleared the interval, if any.
    pub fn fault(&self) -> Option<PresentFault> {
        self.fault.lock().ok().and_then(|fault| fault.clone())
    }

    /// Clear the interval; no tick runs after this returns.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollingPresenter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
