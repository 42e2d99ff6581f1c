// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Render surface adapter
//!
//! A `Canvas` stands in for the page's canvas element. Binding a context to it
//! yields a `RenderSurface`: a fixed-size RGBA framebuffer backed by
//! `image::RgbaImage`, plus the GL clear colour the guest can set through its
//! callbacks. Surfaces are shared between the loader's host callbacks and the
//! presenters, so they travel as `SharedSurface`.

use crate::errors::{HostError, HostResult};
use crate::observability::messages::host::SurfaceBound;
use image::{Rgba, RgbaImage};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

/// Rendering context kinds a canvas can hand out.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    TwoD,
    WebGl,
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextKind::TwoD => write!(f, "2d"),
            ContextKind::WebGl => write!(f, "webgl"),
        }
    }
}

/// Identity of a bound surface. A rebind always produces a new id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceId(u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

/// A canvas element.
#[derive(Debug, Clone)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    supported: Vec<ContextKind>,
}

impl Canvas {
    /// A canvas that supports both 2D and WebGL contexts.
    pub fn new() -> Self {
        Self::with_contexts(vec![ContextKind::TwoD, ContextKind::WebGl])
    }

    pub fn with_contexts(supported: Vec<ContextKind>) -> Self {
        Self {
            width: 0,
            height: 0,
            supported,
        }
    }

    pub fn supports(&self, kind: ContextKind) -> bool {
        self.supported.contains(&kind)
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedSurface = Arc<Mutex<RenderSurface>>;

/// Framebuffer of a bound rendering context.
#[derive(Debug)]
pub struct RenderSurface {
    id: SurfaceId,
    pixels: RgbaImage,
    clear_color: [f32; 4],
}

impl RenderSurface {
    fn new(width: u32, height: u32) -> Self {
        let id = SurfaceId(NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed));
        let mut surface = Self {
            id,
            pixels: RgbaImage::new(width, height),
            clear_color: [0.0, 0.0, 0.0, 0.0],
        };
        surface.fill_white();
        surface
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels.get_pixel(x, y).0
    }

    pub fn fill_white(&mut self) {
        self.fill([255, 255, 255, 255]);
    }

    fn fill(&mut self, rgba: [u8; 4]) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = Rgba(rgba);
        }
    }

    /// Paint one opaque pixel from a 24-bit `0xRRGGBB` colour.
    pub fn put_rgb(&mut self, x: u32, y: u32, rgb: u32) {
        let [_, r, g, b] = rgb.to_be_bytes();
        self.pixels.put_pixel(x, y, Rgba([r, g, b, 255]));
    }

    pub fn put_rgba(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        self.pixels.put_pixel(x, y, Rgba(rgba));
    }

    /// `glClearColor`; components are clamped to `0.0..=1.0`.
    pub fn set_clear_color(&mut self, r: f64, g: f64, b: f64, a: f64) {
        self.clear_color = [r, g, b, a].map(|c| c.clamp(0.0, 1.0) as f32);
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    /// `glClear`: fill the framebuffer with the clear colour.
    pub fn clear(&mut self) {
        let rgba = self.clear_color.map(|c| (c * 255.0).round() as u8);
        self.fill(rgba);
    }

    /// Write the framebuffer as an image; the format follows the extension.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> HostResult<()> {
        self.pixels.save(path)?;
        Ok(())
    }
}

/// Binds rendering contexts to canvas elements.
pub struct SurfaceAdapter;

impl SurfaceAdapter {
    /// Bind a `kind` context to `canvas` and fix its pixel size.
    ///
    /// Returns `Ok(None)` while the canvas does not exist yet; nothing is
    /// published before the element is there.
    pub fn bind(
        canvas: Option<&mut Canvas>,
        kind: ContextKind,
        width: u32,
        height: u32,
    ) -> HostResult<Option<SharedSurface>> {
        let Some(canvas) = canvas else {
            return Ok(None);
        };

        if !canvas.supports(kind) {
            return Err(HostError::ContextUnavailable(kind.to_string()));
        }

        canvas.width = width;
        canvas.height = height;

        let surface = RenderSurface::new(width, height);
        tracing::info!(
            "{}",
            SurfaceBound {
                surface: &surface.id().to_string(),
                context: kind,
                width,
                height,
            }
        );
        Ok(Some(Arc::new(Mutex::new(surface))))
    }
}
