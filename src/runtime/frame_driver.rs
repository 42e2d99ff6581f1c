// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Frame driver
//!
//! Calls the guest's `update` export once per frame with a high-resolution
//! timestamp (milliseconds since the loop started), forever, until teardown.
//!
//! The driver has two states. `Idle` holds no module. The first `attach`
//! moves it to `Running`: `init` is called once (when the guest exports it),
//! then a single task schedules one frame at a time. Teardown cancels the
//! outstanding frame and joins the task, so once `teardown` returns no
//! further `update` can happen.

use crate::config::consts::exports;
use crate::errors::{HostError, HostResult};
use crate::host::module_handle::SharedModule;
use crate::observability::messages::runtime::{FrameFaulted, FrameLoopStarted, FrameLoopStopped};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Handle of the one scheduled frame, used only for cancellation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameToken(pub u64);

/// An `update` call that failed and stopped the loop.
#[derive(Debug, Clone)]
pub struct FrameFault {
    pub frame: u64,
    pub message: String,
}

enum DriverState {
    Idle,
    Running {
        cancel: CancellationToken,
        task: JoinHandle<()>,
    },
}

pub struct FrameDriver {
    period: Duration,
    state: DriverState,
    frames: Arc<AtomicU64>,
    token: Arc<AtomicU64>,
    fault: Arc<Mutex<Option<FrameFault>>>,
}

impl FrameDriver {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            state: DriverState::Idle,
            frames: Arc::new(AtomicU64::new(0)),
            token: Arc::new(AtomicU64::new(0)),
            fault: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, DriverState::Running { .. })
    }

    /// Number of completed `update` calls.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }

    /// The currently scheduled frame, if the loop is running.
    pub fn pending_frame(&self) -> Option<FrameToken> {
        self.is_running()
            .then(|| FrameToken(self.token.load(Ordering::SeqCst)))
    }

    /// The fault that stopped the loop, if any.
    pub fn fault(&self) -> Option<FrameFault> {
        self.fault.lock().ok().and_then(|fault| fault.clone())
    }

    /// Start driving `module`. Only the first call has an effect.
    ///
    /// # Errors
    /// `MissingExport` if the guest has no `update`; any error from `init`.
    pub fn attach(&mut self, module: SharedModule) -> HostResult<()> {
        if self.is_running() {
            return Ok(());
        }

        {
            let mut handle = module.lock()?;
            if !handle.has_export(exports::UPDATE) {
                return Err(HostError::MissingExport(exports::UPDATE.to_string()));
            }
            if handle.has_export(exports::INIT) {
                handle.init()?;
            }
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_frames(
            module,
            self.period,
            cancel.clone(),
            self.frames.clone(),
            self.token.clone(),
            self.fault.clone(),
        ));

        tracing::info!(
            "{}",
            FrameLoopStarted {
                period_ms: self.period.as_millis() as u64
            }
        );
        self.state = DriverState::Running { cancel, task };
        Ok(())
    }

    /// Cancel the scheduled frame and wait for the loop to exit.
    pub async fn teardown(&mut self) {
        if let DriverState::Running { cancel, task } =
            std::mem::replace(&mut self.state, DriverState::Idle)
        {
            cancel.cancel();
            let _ = task.await;
            tracing::info!("{}", FrameLoopStopped { frames: self.frames() });
        }
    }
}

impl Drop for FrameDriver {
    fn drop(&mut self) {
        if let DriverState::Running { cancel, .. } = &self.state {
            cancel.cancel();
        }
    }
}

async fn run_frames(
    module: SharedModule,
    period: Duration,
    cancel: CancellationToken,
    frames: Arc<AtomicU64>,
    token: Arc<AtomicU64>,
    fault: Arc<Mutex<Option<FrameFault>>>,
) {
    let origin = Instant::now();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        token.fetch_add(1, Ordering::SeqCst);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let timestamp_ms = origin.elapsed().as_secs_f64() * 1_000.0;
        let result = module
            .lock()
            .map_err(HostError::from)
            .and_then(|mut handle| handle.update(timestamp_ms));

        match result {
            Ok(()) => {
                frames.fetch_add(1, Ordering::SeqCst);
            }
            Err(error) => {
                let frame = frames.load(Ordering::SeqCst) + 1;
                tracing::error!("{}", FrameFaulted { frame, error: &error });
                if let Ok(mut slot) = fault.lock() {
                    *slot = Some(FrameFault {
                        frame,
                        message: error.to_string(),
                    });
                }
                break;
            }
        }
    }
}
