// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Page session
//!
//! A `PageSession` owns everything one demo page holds for its lifetime: the
//! bound surface, the module slot, the keyboard hub, the frame driver, the
//! key subscription and the polling presenter. Nothing is shared across
//! sessions. `unmount` releases all of it explicitly: the pending frame is
//! cancelled, the interval cleared and the key listeners removed.
//!
//! Errors never escape a session as panics or unhandled results; they show up
//! in `status()` as `LoadState::Failed`. That includes a polling presenter
//! that stopped on a failed tick.

use crate::config::{HostConfig, PresenterMode};
use crate::errors::{HostError, HostResult};
use crate::host::loader::{LoadRequest, LoadState, ModuleLoader, ModuleSlot};
use crate::host::memory::{MemoryPages, MemoryRegion};
use crate::host::module_handle::SharedModule;
use crate::host::{Environment, FileSource, ModuleSource};
use crate::observability::messages::runtime::{
    ProbeCompleted, SessionFailed, SessionMounted, SessionUnmounted,
};
use crate::render::presenter::{
    present_once, PixelFormat, PollingPresenter, PresentFault, PresentSpec,
};
use crate::render::surface::{Canvas, SharedSurface, SurfaceAdapter};
use crate::runtime::frame_driver::{FrameDriver, FrameFault};
use crate::runtime::input::{InputForwarder, KeySubscription, KeyboardHub};
use std::sync::Arc;

/// Result of the add demo's probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub sum: i32,
    pub offset: u64,
    pub bytes: Vec<u8>,
}

pub struct PageSession {
    config: HostConfig,
    loader: ModuleLoader,
    source: Arc<dyn ModuleSource>,
    canvas: Option<Canvas>,
    surface: Option<SharedSurface>,
    fault: Option<Arc<HostError>>,
    slot: ModuleSlot,
    wired: Option<SharedModule>,
    hub: Arc<KeyboardHub>,
    driver: Option<FrameDriver>,
    subscription: Option<KeySubscription>,
    poller: Option<PollingPresenter>,
    probe: Option<ProbeReport>,
}

impl PageSession {
    /// Mount a page for `config`, reading the guest from `config.module`.
    pub fn mount(config: HostConfig, canvas: Option<Canvas>) -> HostResult<Self> {
        let source = Arc::new(FileSource::new(config.module.clone()));
        Self::mount_with_source(config, canvas, source)
    }

    /// Mount a page whose guest comes from `source`.
    pub fn mount_with_source(
        config: HostConfig,
        canvas: Option<Canvas>,
        source: Arc<dyn ModuleSource>,
    ) -> HostResult<Self> {
        config.validate()?;
        tracing::info!("{}", SessionMounted { page: &config.name });

        let mut session = Self {
            loader: ModuleLoader::new()?,
            source,
            canvas,
            surface: None,
            fault: None,
            slot: ModuleSlot::new(),
            wired: None,
            hub: Arc::new(KeyboardHub::new()),
            driver: None,
            subscription: None,
            poller: None,
            probe: None,
            config,
        };
        session.bind_surface();
        Ok(session)
    }

    fn bind_surface(&mut self) {
        self.surface = None;
        let Some(canvas_config) = self.config.canvas.clone() else {
            return;
        };

        match SurfaceAdapter::bind(
            self.canvas.as_mut(),
            canvas_config.context,
            canvas_config.width,
            canvas_config.height,
        ) {
            Ok(surface) => self.surface = surface,
            Err(error) => self.fail(error),
        }
    }

    fn report(&self, error: HostError) -> Arc<HostError> {
        tracing::error!(
            "{}",
            SessionFailed {
                page: &self.config.name,
                error: &error,
            }
        );
        Arc::new(error)
    }

    fn fail(&mut self, error: HostError) {
        self.fault = Some(self.report(error));
    }

    /// Replace the canvas. The surface gets a new identity, so the next
    /// `load` reloads the guest against it.
    pub async fn attach_canvas(&mut self, canvas: Canvas) {
        self.unwire().await;
        self.fault = None;
        self.canvas = Some(canvas);
        self.bind_surface();
    }

    fn request(&self) -> HostResult<LoadRequest> {
        let mut environment = Environment::new(MemoryPages(self.config.memory_pages))
            .with_callbacks(&self.config.callbacks)
            .requiring_surface(self.config.canvas.is_some());
        if let Some(surface) = &self.surface {
            environment = environment.with_surface(surface.clone())?;
        }
        Ok(LoadRequest::new(self.source.clone(), environment))
    }

    /// Load the guest if its dependencies are ready, then wire it up.
    pub async fn load(&mut self) -> LoadState {
        if self.fault.is_some() {
            return self.status();
        }

        let request = match self.request() {
            Ok(request) => request,
            Err(error) => {
                self.fail(error);
                return self.status();
            }
        };
        self.slot.ensure(&self.loader, &request).await;

        let current = self.slot.module();
        let unchanged = match (&current, &self.wired) {
            (Some(current), Some(wired)) => Arc::ptr_eq(current, wired),
            (None, None) => true,
            _ => false,
        };
        if !unchanged {
            self.unwire().await;
            if let Some(module) = current {
                if let Err(error) = self.wire(module) {
                    // The instance may already have run guest code; drop it.
                    self.unwire().await;
                    let error = self.report(error);
                    self.slot.fail(error);
                }
            }
        }

        self.status()
    }

    /// Clear a failed load and try again.
    pub async fn retry(&mut self) -> LoadState {
        if let Some(fault) = self.present_fault() {
            self.unwire().await;
            self.slot.fail(fault.error);
        }
        self.fault = None;
        self.slot.retry();
        if self.config.canvas.is_some() && self.surface.is_none() {
            self.bind_surface();
        }
        self.load().await
    }

    fn wire(&mut self, module: SharedModule) -> HostResult<()> {
        self.wired = Some(module.clone());

        if let Some(probe) = &self.config.probe {
            let mut handle = module.lock()?;
            let sum = handle.add(probe.add_operands[0], probe.add_operands[1])?;
            let offset = handle.buffer_pointer()?;
            let bytes = handle.read_memory(MemoryRegion::new(offset, probe.read_len))?;
            tracing::info!(
                "{}",
                ProbeCompleted {
                    sum,
                    offset,
                    bytes: &bytes,
                }
            );
            self.probe = Some(ProbeReport { sum, offset, bytes });
        }

        if let (Some(presenter), Some(surface)) = (&self.config.presenter, &self.surface) {
            let spec = PresentSpec {
                format: presenter.format,
                recompute_export: presenter.recompute_export.clone(),
                seed_from_clock: presenter.seed_from_clock,
            };
            match presenter.mode {
                PresenterMode::OneShot => {
                    present_once(&module, surface, &spec)?;
                }
                PresenterMode::Polling => {
                    self.poller = Some(PollingPresenter::start(
                        module.clone(),
                        surface.clone(),
                        spec,
                        presenter.interval(),
                    ));
                }
                PresenterMode::Callback => {}
            }
        }

        if let Some(input) = &self.config.input {
            let forwarder = InputForwarder::new(module.clone(), input.protocol);
            self.subscription = Some(forwarder.attach(&self.hub));
        }

        if let Some(frame_config) = &self.config.frame_driver {
            let mut driver = FrameDriver::new(frame_config.period());
            driver.attach(module)?;
            self.driver = Some(driver);
        }

        Ok(())
    }

    async fn unwire(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            driver.teardown().await;
        }
        if let Some(mut poller) = self.poller.take() {
            poller.stop().await;
        }
        if let Some(subscription) = self.subscription.take() {
            subscription.detach(&self.hub);
        }
        self.wired = None;
    }

    /// Load state as the view should show it.
    pub fn status(&self) -> LoadState {
        if let Some(error) = &self.fault {
            return LoadState::Failed(error.clone());
        }
        if let Some(fault) = self.present_fault() {
            return LoadState::Failed(fault.error);
        }
        self.slot.state().clone()
    }

    pub fn module(&self) -> Option<SharedModule> {
        self.slot.module()
    }

    pub fn surface(&self) -> Option<SharedSurface> {
        self.surface.clone()
    }

    /// Window-level keyboard events for this page.
    pub fn hub(&self) -> Arc<KeyboardHub> {
        self.hub.clone()
    }

    pub fn probe(&self) -> Option<&ProbeReport> {
        self.probe.as_ref()
    }

    pub fn frames(&self) -> u64 {
        self.driver.as_ref().map_or(0, FrameDriver::frames)
    }

    pub fn frame_fault(&self) -> Option<FrameFault> {
        self.driver.as_ref().and_then(FrameDriver::fault)
    }

    pub fn poll_ticks(&self) -> u64 {
        self.poller.as_ref().map_or(0, PollingPresenter::ticks)
    }

    /// The tick that stopped the polling presenter, if one failed.
    pub fn present_fault(&self) -> Option<PresentFault> {
        self.poller.as_ref().and_then(PollingPresenter::fault)
    }

    /// Recompute and repaint once, outside any polling schedule.
    pub fn present_now(&self) -> HostResult<u64> {
        let module = self.module().ok_or(HostError::NotReady)?;
        let surface = self.surface().ok_or(HostError::SurfaceMissing)?;
        let presenter = self.config.presenter.as_ref();
        let spec = PresentSpec {
            format: presenter.map_or(PixelFormat::Rgb, |p| p.format),
            recompute_export: presenter.and_then(|p| p.recompute_export.clone()),
            seed_from_clock: false,
        };
        present_once(&module, &surface, &spec)
    }

    /// Tear the page down.
    pub async fn unmount(mut self) {
        self.unwire().await;
        tracing::info!("{}", SessionUnmounted { page: &self.config.name });
    }
}
