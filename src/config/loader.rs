// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{
    exports, ADD_DEMO_PAGES, ADD_REGION_LEN, DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH,
    DEFAULT_FRAME_PERIOD_MS, DEFAULT_POLL_INTERVAL_MS, GAME_DEMO_PAGES, PERLIN_DEMO_PAGES,
    WASM_PAGE_SIZE,
};
use crate::errors::{HostError, HostResult};
use crate::host::environment::HostCallback;
use crate::render::presenter::PixelFormat;
use crate::render::surface::ContextKind;
use crate::runtime::input::KeyProtocol;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration of one demo page.
///
/// A page instantiates one guest module against a fixed-size shared memory,
/// optionally binds a canvas, and wires the guest's exports to a frame loop,
/// keyboard input and buffer presentation.
///
/// # Example
/// ```yaml
/// name: game
/// module: demos/game.wat
/// memory_pages: 18
/// canvas:
///   context: web_gl
/// callbacks: [print, gl_clear_color, gl_clear, draw_buffer]
/// frame_driver:
///   period_ms: 16
/// input:
///   protocol: multi_char
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    pub name: String,
    pub module: PathBuf,
    pub memory_pages: u32,
    #[serde(default)]
    pub canvas: Option<CanvasConfig>,
    #[serde(default)]
    pub callbacks: Vec<HostCallback>,
    #[serde(default)]
    pub frame_driver: Option<FrameDriverConfig>,
    #[serde(default)]
    pub input: Option<InputConfig>,
    #[serde(default)]
    pub presenter: Option<PresenterConfig>,
    #[serde(default)]
    pub probe: Option<ProbeConfig>,
}

/// Canvas element bound by the page.
#[derive(Debug, Clone, Deserialize)]
pub struct CanvasConfig {
    pub context: ContextKind,
    #[serde(default = "default_canvas_width")]
    pub width: u32,
    #[serde(default = "default_canvas_height")]
    pub height: u32,
}

fn default_canvas_width() -> u32 {
    DEFAULT_CANVAS_WIDTH
}

fn default_canvas_height() -> u32 {
    DEFAULT_CANVAS_HEIGHT
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrameDriverConfig {
    #[serde(default = "default_frame_period_ms")]
    pub period_ms: u64,
}

fn default_frame_period_ms() -> u64 {
    DEFAULT_FRAME_PERIOD_MS
}

impl FrameDriverConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms.max(1))
    }
}

impl Default for FrameDriverConfig {
    fn default() -> Self {
        Self {
            period_ms: DEFAULT_FRAME_PERIOD_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    pub protocol: KeyProtocol,
}

/// How the page makes the guest's buffer visible.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PresenterMode {
    /// Compute and paint once after the module is ready.
    OneShot,
    /// Recompute and repaint on a fixed interval.
    Polling,
    /// The guest paints through host callbacks; the host never reads.
    Callback,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresenterConfig {
    pub mode: PresenterMode,
    #[serde(default = "default_pixel_format")]
    pub format: PixelFormat,
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
    /// Export called before every read.
    #[serde(default)]
    pub recompute_export: Option<String>,
    /// Seed the guest with the wall clock before the first compute.
    #[serde(default)]
    pub seed_from_clock: bool,
}

fn default_pixel_format() -> PixelFormat {
    PixelFormat::Rgb
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl PresenterConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

/// One-shot call of `add` plus a bounded read at `getBufferPointer`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_add_operands")]
    pub add_operands: [i32; 2],
    #[serde(default = "default_read_len")]
    pub read_len: u64,
}

fn default_add_operands() -> [i32; 2] {
    [1, 2]
}

fn default_read_len() -> u64 {
    ADD_REGION_LEN
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            add_operands: default_add_operands(),
            read_len: default_read_len(),
        }
    }
}

impl HostConfig {
    /// The add demo: 2 pages, a numeric logger and a 16-byte probe.
    pub fn add_demo<P: Into<PathBuf>>(module: P) -> Self {
        Self {
            name: "add".to_string(),
            module: module.into(),
            memory_pages: ADD_DEMO_PAGES,
            canvas: None,
            callbacks: vec![HostCallback::Print],
            frame_driver: None,
            input: None,
            presenter: None,
            probe: Some(ProbeConfig::default()),
        }
    }

    /// The basic buffer demo: recompute and repaint grayscale every second.
    pub fn buffer_demo<P: Into<PathBuf>>(module: P) -> Self {
        Self {
            name: "buffer".to_string(),
            module: module.into(),
            memory_pages: PERLIN_DEMO_PAGES,
            canvas: Some(CanvasConfig {
                context: ContextKind::TwoD,
                width: DEFAULT_CANVAS_WIDTH,
                height: DEFAULT_CANVAS_HEIGHT,
            }),
            callbacks: vec![HostCallback::Print],
            frame_driver: None,
            input: None,
            presenter: Some(PresenterConfig {
                mode: PresenterMode::Polling,
                format: PixelFormat::Gray,
                interval_ms: DEFAULT_POLL_INTERVAL_MS,
                recompute_export: Some(exports::COMPUTE_BUFFER.to_string()),
                seed_from_clock: false,
            }),
            probe: None,
        }
    }

    /// The Perlin demo: seed, compute once and paint RGB.
    pub fn perlin_demo<P: Into<PathBuf>>(module: P) -> Self {
        Self {
            name: "perlin".to_string(),
            module: module.into(),
            memory_pages: PERLIN_DEMO_PAGES,
            canvas: Some(CanvasConfig {
                context: ContextKind::TwoD,
                width: DEFAULT_CANVAS_WIDTH,
                height: DEFAULT_CANVAS_HEIGHT,
            }),
            callbacks: vec![HostCallback::Print],
            frame_driver: None,
            input: None,
            presenter: Some(PresenterConfig {
                mode: PresenterMode::OneShot,
                format: PixelFormat::Rgb,
                interval_ms: DEFAULT_POLL_INTERVAL_MS,
                recompute_export: Some(exports::COMPUTE_PERLIN.to_string()),
                seed_from_clock: true,
            }),
            probe: None,
        }
    }

    /// The game demo: GL callbacks, a frame loop and multi-character input.
    pub fn game_demo<P: Into<PathBuf>>(module: P) -> Self {
        Self {
            name: "game".to_string(),
            module: module.into(),
            memory_pages: GAME_DEMO_PAGES,
            canvas: Some(CanvasConfig {
                context: ContextKind::WebGl,
                width: DEFAULT_CANVAS_WIDTH,
                height: DEFAULT_CANVAS_HEIGHT,
            }),
            callbacks: vec![
                HostCallback::Print,
                HostCallback::GlClearColor,
                HostCallback::GlClear,
                HostCallback::DrawBuffer,
            ],
            frame_driver: Some(FrameDriverConfig::default()),
            input: Some(InputConfig {
                protocol: KeyProtocol::MultiChar,
            }),
            presenter: Some(PresenterConfig {
                mode: PresenterMode::Callback,
                format: PixelFormat::Rgba,
                interval_ms: DEFAULT_POLL_INTERVAL_MS,
                recompute_export: None,
                seed_from_clock: false,
            }),
            probe: None,
        }
    }

    /// Total capacity of the shared memory in bytes.
    pub fn memory_bytes(&self) -> u64 {
        u64::from(self.memory_pages) * WASM_PAGE_SIZE
    }

    /// Check the configuration for internal consistency.
    ///
    /// All problems are collected and reported together.
    pub fn validate(&self) -> HostResult<()> {
        let mut problems = Vec::new();

        if self.memory_pages == 0 || self.memory_pages > 65_536 {
            problems.push(format!(
                "memory_pages must be between 1 and 65536, got {}",
                self.memory_pages
            ));
        }

        if let Some(canvas) = &self.canvas {
            if canvas.width == 0 || canvas.height == 0 {
                problems.push(format!(
                    "canvas must have a non-zero size, got {}x{}",
                    canvas.width, canvas.height
                ));
            }
        }

        let needs_surface: Vec<_> = self
            .callbacks
            .iter()
            .filter(|callback| callback.needs_surface())
            .collect();
        if self.canvas.is_none() && !needs_surface.is_empty() {
            problems.push(format!(
                "callbacks {:?} draw to a canvas but no canvas is configured",
                needs_surface
            ));
        }

        if let Some(presenter) = &self.presenter {
            match (&self.canvas, presenter.mode) {
                (None, _) => problems.push("presenter configured without a canvas".to_string()),
                (Some(canvas), PresenterMode::OneShot | PresenterMode::Polling) => {
                    let len = u64::from(canvas.width)
                        * u64::from(canvas.height)
                        * presenter.format.bytes_per_pixel() as u64;
                    if len > self.memory_bytes() {
                        problems.push(format!(
                            "presenter region of {} bytes exceeds shared memory of {} bytes",
                            len,
                            self.memory_bytes()
                        ));
                    }
                }
                (Some(_), PresenterMode::Callback) => {
                    if !self.callbacks.contains(&HostCallback::DrawBuffer)
                        && !self.callbacks.contains(&HostCallback::GlClear)
                    {
                        problems.push(
                            "callback presenter requires draw_buffer or gl_clear".to_string(),
                        );
                    }
                }
            }
        }

        if let Some(probe) = &self.probe {
            if probe.read_len > self.memory_bytes() {
                problems.push(format!(
                    "probe read of {} bytes exceeds shared memory",
                    probe.read_len
                ));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(HostError::Config(format!(
                "Configuration validation failed:\n{}",
                problems.join("\n")
            )))
        }
    }
}

/// Load a config from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> HostResult<HostConfig> {
    let content = fs::read_to_string(path)?;
    serde_yaml::from_str(&content).map_err(|e| HostError::Config(e.to_string()))
}

/// Load and validate a config from a YAML file
///
/// A relative `module` path is resolved against the directory of the config
/// file, so demo configs can sit next to their guest binaries.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> HostResult<HostConfig> {
    let path = path.as_ref();
    let mut cfg = load_config(path)?;

    if cfg.module.is_relative() {
        if let Some(parent) = path.parent() {
            cfg.module = parent.join(&cfg.module);
        }
    }

    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn parse_game_config() {
        let yaml = r#"
name: game
module: game.wat
memory_pages: 18
canvas:
  context: web_gl
callbacks: [print, gl_clear_color, gl_clear, draw_buffer]
frame_driver:
  period_ms: 20
input:
  protocol: multi_char
presenter:
  mode: callback
  format: rgba
"#;

        let cfg: HostConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.memory_pages, 18);
        let canvas = cfg.canvas.as_ref().unwrap();
        assert_eq!(canvas.context, ContextKind::WebGl);
        assert_eq!((canvas.width, canvas.height), (500, 500));
        assert_eq!(cfg.callbacks.len(), 4);
        assert_eq!(cfg.frame_driver.as_ref().unwrap().period_ms, 20);
        assert_eq!(cfg.input.as_ref().unwrap().protocol, KeyProtocol::MultiChar);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(HostConfig::add_demo("add.wasm").validate().is_ok());
        assert!(HostConfig::buffer_demo("buffer.wasm").validate().is_ok());
        assert!(HostConfig::perlin_demo("perlin.wasm").validate().is_ok());
        assert!(HostConfig::game_demo("game.wasm").validate().is_ok());
    }

    #[test]
    fn test_region_larger_than_memory_is_rejected() {
        let mut cfg = HostConfig::perlin_demo("perlin.wasm");
        cfg.memory_pages = 2;

        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("exceeds shared memory"));
    }

    #[test]
    fn test_drawing_callbacks_without_canvas_are_rejected() {
        let mut cfg = HostConfig::game_demo("game.wasm");
        cfg.canvas = None;

        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("no canvas is configured"));
        assert!(err.contains("presenter configured without a canvas"));
    }

    #[test]
    fn test_zero_pages_rejected() {
        let mut cfg = HostConfig::add_demo("add.wasm");
        cfg.memory_pages = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_resolves_module_relative_to_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "name: add\nmodule: add.wasm\nmemory_pages: 2\ncallbacks: [print]\nprobe: {{}}\n"
        )
        .unwrap();

        let cfg = load_and_validate_config(file.path()).unwrap();
        assert_eq!(cfg.module, file.path().parent().unwrap().join("add.wasm"));
        assert_eq!(cfg.probe.unwrap().add_operands, [1, 2]);
    }

    #[test]
    fn test_load_invalid_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "name: [unterminated").unwrap();

        match load_config(file.path()) {
            Err(HostError::Config(_)) => {}
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_demo_configs_load() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/configs");
        for (file, pages) in [
            ("add.yaml", ADD_DEMO_PAGES),
            ("buffer.yaml", PERLIN_DEMO_PAGES),
            ("perlin.yaml", PERLIN_DEMO_PAGES),
            ("game.yaml", GAME_DEMO_PAGES),
        ] {
            let cfg = load_and_validate_config(dir.join(file))
                .unwrap_or_else(|e| panic!("{}: {}", file, e));
            assert_eq!(cfg.memory_pages, pages, "{}", file);
            assert!(cfg.module.exists(), "{} points at {:?}", file, cfg.module);
        }
    }
}
