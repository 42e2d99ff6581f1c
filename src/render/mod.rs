// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod presenter;
pub mod surface;

pub use presenter::{
    blit, compose_rgb, present_once, BlitRegion, PixelFormat, PollingPresenter, PresentFault,
    PresentSpec,
};
pub use surface::{Canvas, ContextKind, RenderSurface, SharedSurface, SurfaceAdapter, SurfaceId};
