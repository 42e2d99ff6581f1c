// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Module loading and instantiation
//!
//! `ModuleLoader` turns a `ModuleSource` plus an `Environment` into a
//! `ModuleHandle`:
//! fetch → size check → binary kind check → compile → memory requirements →
//! import resolution → instantiate.
//!
//! `ModuleSlot` is the page-level view of that process. It only starts a load
//! once the environment's dependencies exist, reloads when the bound surface
//! changes identity, and keeps a failed load in a visible `Failed` state until
//! `retry` is called.

use crate::config::consts::{CALL_FUEL, ENV_MEMORY, ENV_MODULE};
use crate::errors::{HostError, HostResult};
use crate::host::detector::ensure_core_module;
use crate::host::environment::Environment;
use crate::host::memory::MemoryPages;
use crate::host::module_handle::{ModuleHandle, SharedModule};
use crate::host::source::ModuleSource;
use crate::observability::messages::host::{LoadDeferred, ModuleInstantiated, ModuleLoadFailed};
use crate::render::surface::SurfaceId;
use std::fmt;
use std::sync::Arc;
use wasmtime::{Config, Engine, ExternType, Module};

/// What to load and what to load it against.
#[derive(Clone)]
pub struct LoadRequest {
    pub source: Arc<dyn ModuleSource>,
    pub environment: Environment,
}

impl LoadRequest {
    pub fn new(source: Arc<dyn ModuleSource>, environment: Environment) -> Self {
        Self {
            source,
            environment,
        }
    }
}

pub struct ModuleLoader {
    engine: Engine,
}

impl ModuleLoader {
    pub fn new() -> HostResult<Self> {
        Ok(Self {
            engine: Self::create_engine()?,
        })
    }

    /// Create a wasmtime engine for single-threaded numeric guests
    fn create_engine() -> HostResult<Engine> {
        let mut config = Config::new();

        config.wasm_threads(false);
        config.wasm_simd(false);
        config.wasm_relaxed_simd(false);
        config.wasm_multi_memory(false);
        config.wasm_memory64(false);

        // Every guest call gets a fixed fuel budget so a runaway export traps
        // instead of stalling the page.
        config.consume_fuel(true);
        config.epoch_interruption(false);

        Ok(Engine::new(&config)?)
    }

    /// Load and instantiate the requested module.
    pub async fn load(&self, request: &LoadRequest) -> HostResult<ModuleHandle> {
        let location = request.source.location();
        self.try_load(&location, request).await.map_err(|error| {
            tracing::error!(
                "{}",
                ModuleLoadFailed {
                    location: &location,
                    error: &error,
                }
            );
            error
        })
    }

    async fn try_load(&self, location: &str, request: &LoadRequest) -> HostResult<ModuleHandle> {
        let bytes = request.source.fetch().await?;
        ensure_core_module(&bytes)?;

        let module = Module::new(&self.engine, &bytes)
            .map_err(|e| HostError::InstantiationFailed(format!("{:#}", e)))?;

        let pages = request.environment.pages();
        let imports_memory = check_memory_requirements(&module, pages)?;

        let mut store = request.environment.create_store(&self.engine);
        let (linker, shared_memory) = request.environment.link(&module, &mut store)?;

        store.set_fuel(CALL_FUEL)?;
        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| HostError::InstantiationFailed(format!("{:#}", e)))?;

        let memory = if imports_memory {
            shared_memory
        } else {
            instance
                .get_memory(&mut store, ENV_MEMORY)
                .unwrap_or(shared_memory)
        };

        let exports: Vec<String> = module
            .exports()
            .filter(|export| matches!(export.ty(), ExternType::Func(_)))
            .map(|export| export.name().to_string())
            .collect();

        tracing::info!(
            "{}",
            ModuleInstantiated {
                location,
                pages: pages.0,
                exports: &exports,
            }
        );

        Ok(ModuleHandle::new(store, instance, memory, exports))
    }
}

/// Compare the module's memory import against the host's page count.
///
/// Returns whether the module imports the shared memory at all.
fn check_memory_requirements(module: &Module, pages: MemoryPages) -> HostResult<bool> {
    let provided = u64::from(pages.0);
    let mut imports_memory = false;

    for import in module.imports() {
        if let ExternType::Memory(ty) = import.ty() {
            if import.module() != ENV_MODULE || import.name() != ENV_MEMORY {
                continue;
            }
            imports_memory = true;

            let fits = ty.minimum() <= provided
                && ty.maximum().map_or(true, |max| max >= provided)
                && !ty.is_shared()
                && !ty.is_64();
            if !fits {
                return Err(HostError::MemoryMismatch {
                    required_min: ty.minimum(),
                    required_max: ty.maximum(),
                    provided: pages.0,
                });
            }
        }
    }

    Ok(imports_memory)
}

/// Load state of a page's module.
#[derive(Debug, Clone)]
pub enum LoadState {
    /// Nothing requested yet
    NotReady,
    /// Waiting for the render surface the callbacks close over
    AwaitingDependencies,
    /// The module handle is available
    Ready,
    /// The last load failed; `retry` clears it
    Failed(Arc<HostError>),
}

impl LoadState {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready)
    }

    pub fn error(&self) -> Option<&HostError> {
        match self {
            LoadState::Failed(error) => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::NotReady => write!(f, "Loading..."),
            LoadState::AwaitingDependencies => write!(f, "Waiting for canvas..."),
            LoadState::Ready => write!(f, "Ready"),
            LoadState::Failed(error) => write!(f, "Failed: {}", error),
        }
    }
}

/// The module of one page, keyed by the dependencies it was loaded against.
pub struct ModuleSlot {
    state: LoadState,
    module: Option<SharedModule>,
    loaded_for: Option<Option<SurfaceId>>,
}

impl ModuleSlot {
    pub fn new() -> Self {
        Self {
            state: LoadState::NotReady,
            module: None,
            loaded_for: None,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn module(&self) -> Option<SharedModule> {
        self.module.clone()
    }

    /// Bring the slot in line with `request`.
    ///
    /// Loads at most once per dependency set: a ready or failed slot whose
    /// surface has not changed is left alone.
    pub async fn ensure(&mut self, loader: &ModuleLoader, request: &LoadRequest) -> &LoadState {
        if request.environment.missing_dependencies() {
            tracing::info!(
                "{}",
                LoadDeferred {
                    location: &request.source.location(),
                    reason: "render surface not bound",
                }
            );
            self.module = None;
            self.loaded_for = None;
            self.state = LoadState::AwaitingDependencies;
            return &self.state;
        }

        let dependencies = request.environment.surface_id();
        let settled = matches!(self.state, LoadState::Ready | LoadState::Failed(_));
        if settled && self.loaded_for == Some(dependencies) {
            return &self.state;
        }

        self.loaded_for = Some(dependencies);
        self.module = None;
        self.state = LoadState::NotReady;

        match loader.load(request).await {
            Ok(handle) => {
                self.module = Some(handle.into_shared());
                self.state = LoadState::Ready;
            }
            Err(error) => {
                self.state = LoadState::Failed(Arc::new(error));
            }
        }
        &self.state
    }

    /// Mark the loaded module unusable. The handle is dropped, so callers
    /// holding the old `SharedModule` keep a detached instance and the next
    /// successful `ensure` after `retry` instantiates a fresh one.
    pub fn fail(&mut self, error: Arc<HostError>) {
        self.module = None;
        self.state = LoadState::Failed(error);
    }

    /// Forget a failed load so the next `ensure` tries again.
    pub fn retry(&mut self) {
        if matches!(self.state, LoadState::Failed(_)) {
            self.loaded_for = None;
            self.state = LoadState::NotReady;
        }
    }
}

impl Default for ModuleSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::environment::HostCallback;
    use crate::host::memory::MemoryRegion;
    use crate::host::source::{BytesSource, FileSource};
    use crate::render::surface::{Canvas, ContextKind, SurfaceAdapter};

    const ADD_GUEST: &str = r#"
        (module
            (import "env" "memory" (memory 2 2))
            (import "env" "print" (func $print (param i32)))
            (data (i32.const 1024) "\01\02\03\04\05\06\07\08\09\0a\0b\0c\0d\0e\0f\10")
            (func (export "add") (param i32 i32) (result i32)
                (call $print (i32.add (local.get 0) (local.get 1)))
                (i32.add (local.get 0) (local.get 1)))
            (func (export "getBufferPointer") (result i32)
                (i32.const 1024)))
    "#;

    fn guest(pages: u32) -> String {
        format!(r#"(module (import "env" "memory" (memory {pages} {pages})))"#)
    }

    fn request(text: &str, env: Environment) -> LoadRequest {
        LoadRequest::new(
            Arc::new(BytesSource::new("test.wat", text.as_bytes().to_vec())),
            env,
        )
    }

    #[test]
    fn test_engine_creation() {
        assert!(ModuleLoader::create_engine().is_ok());
    }

    #[tokio::test]
    async fn test_add_scenario() {
        let loader = ModuleLoader::new().unwrap();
        let env = Environment::new(MemoryPages::ADD_DEMO).with_callbacks(&[HostCallback::Print]);
        let mut handle = loader.load(&request(ADD_GUEST, env)).await.unwrap();

        assert_eq!(handle.add(1, 2).unwrap(), 3);
        assert_eq!(handle.guest_log(), &[3.0]);

        let offset = handle.buffer_pointer().unwrap();
        let bytes = handle.read_memory(MemoryRegion::new(offset, 16)).unwrap();
        assert_eq!(bytes, (1..=16).collect::<Vec<u8>>());
        assert_eq!(handle.memory_size(), MemoryPages::ADD_DEMO.bytes());
    }

    #[tokio::test]
    async fn test_exact_page_counts_instantiate() {
        let loader = ModuleLoader::new().unwrap();
        for pages in [MemoryPages::ADD_DEMO, MemoryPages::PERLIN_DEMO, MemoryPages::GAME_DEMO] {
            let text = guest(pages.0);
            let result = loader.load(&request(&text, Environment::new(pages))).await;
            assert!(result.is_ok(), "{} pages should instantiate", pages.0);
        }
    }

    #[tokio::test]
    async fn test_fewer_pages_is_fatal() {
        let loader = ModuleLoader::new().unwrap();
        for pages in [MemoryPages::PERLIN_DEMO, MemoryPages::GAME_DEMO] {
            let text = guest(pages.0);
            let env = Environment::new(MemoryPages(pages.0 - 1));
            match loader.load(&request(&text, env)).await {
                Err(HostError::MemoryMismatch {
                    required_min,
                    provided,
                    ..
                }) => {
                    assert_eq!(required_min, u64::from(pages.0));
                    assert_eq!(provided, pages.0 - 1);
                }
                Err(other) => panic!("Expected MemoryMismatch, got {:?}", other),
                Ok(_) => panic!("Expected MemoryMismatch, got a module"),
            }
        }
    }

    #[tokio::test]
    async fn test_more_pages_than_declared_maximum_is_fatal() {
        let loader = ModuleLoader::new().unwrap();
        let result = loader
            .load(&request(&guest(2), Environment::new(MemoryPages::GAME_DEMO)))
            .await;
        assert!(matches!(result, Err(HostError::MemoryMismatch { .. })));
    }

    #[tokio::test]
    async fn test_missing_file_fails_load() {
        let loader = ModuleLoader::new().unwrap();
        let request = LoadRequest::new(
            Arc::new(FileSource::new("/nonexistent/add.wasm")),
            Environment::new(MemoryPages::ADD_DEMO),
        );
        let error = loader.load(&request).await.err().unwrap();
        assert!(error.is_load_error());
    }

    #[tokio::test]
    async fn test_call_errors() {
        let loader = ModuleLoader::new().unwrap();
        let env = Environment::new(MemoryPages::ADD_DEMO).with_callbacks(&[HostCallback::Print]);
        let mut handle = loader.load(&request(ADD_GUEST, env)).await.unwrap();

        assert!(matches!(
            handle.call("update", &[0.0]),
            Err(HostError::MissingExport(_))
        ));
        assert!(matches!(
            handle.call("add", &[1.0]),
            Err(HostError::AbiMismatch { .. })
        ));
        assert!(handle.has_export("add"));
        assert!(!handle.has_export("memory"));
    }

    #[tokio::test]
    async fn test_trap_is_reported() {
        let loader = ModuleLoader::new().unwrap();
        let text = r#"(module
            (import "env" "memory" (memory 2 2))
            (func (export "update") (param f64) unreachable))"#;
        let mut handle = loader
            .load(&request(text, Environment::new(MemoryPages::ADD_DEMO)))
            .await
            .unwrap();

        match handle.update(1.0) {
            Err(HostError::Trap { export, .. }) => assert_eq!(export, "update"),
            other => panic!("Expected Trap, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slot_waits_for_surface() {
        let loader = ModuleLoader::new().unwrap();
        let text = r#"(module
            (import "env" "memory" (memory 18 18))
            (import "env" "glClear" (func)))"#;
        let env = Environment::new(MemoryPages::GAME_DEMO).with_callbacks(&[HostCallback::GlClear]);
        let mut slot = ModuleSlot::new();

        let state = slot.ensure(&loader, &request(text, env.clone())).await;
        assert!(matches!(state, LoadState::AwaitingDependencies));
        assert!(slot.module().is_none());

        let mut canvas = Canvas::new();
        let surface = SurfaceAdapter::bind(Some(&mut canvas), ContextKind::WebGl, 8, 8)
            .unwrap()
            .unwrap();
        let env = env.with_surface(surface).unwrap();
        assert!(slot.ensure(&loader, &request(text, env)).await.is_ready());
        assert!(slot.module().is_some());
    }

    #[tokio::test]
    async fn test_slot_reloads_on_new_surface_only() {
        let loader = ModuleLoader::new().unwrap();
        let text = r#"(module (import "env" "memory" (memory 18 18)))"#;
        let mut canvas = Canvas::new();
        let bind = |canvas: &mut Canvas| {
            SurfaceAdapter::bind(Some(canvas), ContextKind::WebGl, 8, 8)
                .unwrap()
                .unwrap()
        };

        let env = Environment::new(MemoryPages::GAME_DEMO)
            .with_surface(bind(&mut canvas))
            .unwrap();
        let mut slot = ModuleSlot::new();
        slot.ensure(&loader, &request(text, env.clone())).await;
        let first = slot.module().unwrap();

        slot.ensure(&loader, &request(text, env.clone())).await;
        assert!(Arc::ptr_eq(&first, &slot.module().unwrap()));

        let env = env.with_surface(bind(&mut canvas)).unwrap();
        slot.ensure(&loader, &request(text, env)).await;
        assert!(!Arc::ptr_eq(&first, &slot.module().unwrap()));
    }

    #[tokio::test]
    async fn test_failed_slot_retries_only_when_asked() {
        let loader = ModuleLoader::new().unwrap();
        let env = Environment::new(MemoryPages::ADD_DEMO);
        let broken = request("(module (import \"env\" \"memory\" (memory 14 14)))", env);
        let mut slot = ModuleSlot::new();

        let state = slot.ensure(&loader, &broken).await;
        assert!(matches!(
            state.error(),
            Some(HostError::MemoryMismatch { .. })
        ));
        assert!(state.to_string().starts_with("Failed"));

        // Same dependencies: the failure stays visible.
        assert!(slot.ensure(&loader, &broken).await.error().is_some());

        slot.retry();
        assert!(matches!(slot.state(), LoadState::NotReady));
        assert!(slot.ensure(&loader, &broken).await.error().is_some());
    }

    #[tokio::test]
    async fn test_failed_module_is_dropped_and_reinstantiated() {
        let loader = ModuleLoader::new().unwrap();
        let env = Environment::new(MemoryPages::ADD_DEMO);
        let add = request(ADD_GUEST, env);
        let mut slot = ModuleSlot::new();
        slot.ensure(&loader, &add).await;
        let first = slot.module().unwrap();

        slot.fail(Arc::new(HostError::Trap {
            export: "init".to_string(),
            reason: "unreachable".to_string(),
        }));
        assert!(slot.module().is_none());
        assert!(matches!(slot.state().error(), Some(HostError::Trap { .. })));

        // Same dependencies: still failed until retried.
        assert!(slot.ensure(&loader, &add).await.error().is_some());
        assert!(slot.module().is_none());

        slot.retry();
        assert!(slot.ensure(&loader, &add).await.is_ready());
        assert!(!Arc::ptr_eq(&first, &slot.module().unwrap()));
    }
}
