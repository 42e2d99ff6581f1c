// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Host environment handed to the guest as its `env` imports.
//!
//! The environment always provides the shared memory. On top of that a demo
//! opts into a set of callbacks. Callbacks are defined with the signature the
//! guest declares for them, so a guest may take its logger argument as `i32`
//! or `f64` and still link; arguments reach the host as `f64`.

use crate::config::consts::{ENV_MEMORY, ENV_MODULE};
use crate::errors::{HostError, HostResult};
use crate::host::abi;
use crate::host::memory::MemoryPages;
use crate::observability::messages::host::GuestLog;
use crate::render::presenter::{blit, BlitRegion};
use crate::render::surface::{SharedSurface, SurfaceId};
use serde::Deserialize;
use wasmtime::{Caller, Engine, ExternType, Linker, Memory, Module, Store, Val, ValType};

/// Callbacks a demo can expose to its guest.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostCallback {
    /// `print(n)`: numeric logger
    Print,
    /// `glClearColor(r, g, b, a)`
    GlClearColor,
    /// `glClear()`
    GlClear,
    /// `drawBuffer(offset)`: blit a surface-sized RGBA image from memory
    DrawBuffer,
}

impl HostCallback {
    pub fn import_name(self) -> &'static str {
        match self {
            HostCallback::Print => "print",
            HostCallback::GlClearColor => "glClearColor",
            HostCallback::GlClear => "glClear",
            HostCallback::DrawBuffer => "drawBuffer",
        }
    }

    pub fn from_import_name(name: &str) -> Option<Self> {
        [
            HostCallback::Print,
            HostCallback::GlClearColor,
            HostCallback::GlClear,
            HostCallback::DrawBuffer,
        ]
        .into_iter()
        .find(|callback| callback.import_name() == name)
    }

    /// Whether the callback closes over the bound render surface.
    pub fn needs_surface(self) -> bool {
        !matches!(self, HostCallback::Print)
    }
}

/// Store data of a guest instance.
pub struct HostState {
    memory: Option<Memory>,
    surface: Option<SharedSurface>,
    log: Vec<f64>,
}

impl HostState {
    fn new(surface: Option<SharedSurface>) -> Self {
        Self {
            memory: None,
            surface,
            log: Vec::new(),
        }
    }

    pub fn memory(&self) -> Option<Memory> {
        self.memory
    }

    pub fn surface(&self) -> Option<SharedSurface> {
        self.surface.clone()
    }

    /// Values the guest passed to `print`, oldest first.
    pub fn log(&self) -> &[f64] {
        &self.log
    }
}

/// Everything a guest is instantiated against.
#[derive(Clone)]
pub struct Environment {
    pages: MemoryPages,
    callbacks: Vec<HostCallback>,
    surface: Option<(SurfaceId, SharedSurface)>,
    requires_surface: bool,
}

impl Environment {
    pub fn new(pages: MemoryPages) -> Self {
        Self {
            pages,
            callbacks: Vec::new(),
            surface: None,
            requires_surface: false,
        }
    }

    /// Hold the load back until a surface is bound, even if no callback
    /// needs one (pages that present into a canvas themselves).
    pub fn requiring_surface(mut self, required: bool) -> Self {
        self.requires_surface = required;
        self
    }

    pub fn with_callbacks(mut self, callbacks: &[HostCallback]) -> Self {
        self.callbacks = callbacks.to_vec();
        self
    }

    pub fn with_surface(mut self, surface: SharedSurface) -> HostResult<Self> {
        let id = surface.lock()?.id();
        self.surface = Some((id, surface));
        Ok(self)
    }

    pub fn pages(&self) -> MemoryPages {
        self.pages
    }

    pub fn callbacks(&self) -> &[HostCallback] {
        &self.callbacks
    }

    pub fn surface_id(&self) -> Option<SurfaceId> {
        self.surface.as_ref().map(|(id, _)| *id)
    }

    /// True while a callback needs a surface that is not bound yet.
    pub fn missing_dependencies(&self) -> bool {
        self.surface.is_none()
            && (self.requires_surface || self.callbacks.iter().any(|c| c.needs_surface()))
    }

    pub(crate) fn create_store(&self, engine: &Engine) -> Store<HostState> {
        let surface = self.surface.as_ref().map(|(_, surface)| surface.clone());
        Store::new(engine, HostState::new(surface))
    }

    /// Allocate the shared memory in `store` and define every `env` import
    /// `module` asks for.
    ///
    /// # Errors
    /// `UnresolvedImport` if the module imports anything this environment
    /// does not provide.
    pub(crate) fn link(
        &self,
        module: &Module,
        store: &mut Store<HostState>,
    ) -> HostResult<(Linker<HostState>, Memory)> {
        let memory = self.pages.allocate(&mut *store)?;
        store.data_mut().memory = Some(memory);

        let mut linker = Linker::new(store.engine());
        linker.define(&*store, ENV_MODULE, ENV_MEMORY, memory)?;

        for import in module.imports() {
            let unresolved = || HostError::UnresolvedImport {
                module: import.module().to_string(),
                name: import.name().to_string(),
            };

            if import.module() != ENV_MODULE {
                return Err(unresolved());
            }

            match import.ty() {
                ExternType::Memory(_) if import.name() == ENV_MEMORY => {}
                ExternType::Func(ty) => {
                    let callback = HostCallback::from_import_name(import.name())
                        .filter(|callback| self.callbacks.contains(callback))
                        .ok_or_else(unresolved)?;
                    let results: Vec<ValType> = ty.results().collect();
                    let name = import.name().to_string();

                    linker.func_new(
                        ENV_MODULE,
                        import.name(),
                        ty.clone(),
                        move |caller, params, out| {
                            invoke(callback, caller, params)?;
                            for (slot, ty) in out.iter_mut().zip(&results) {
                                *slot = abi::zero_value(&name, ty)?;
                            }
                            Ok(())
                        },
                    )?;
                }
                _ => return Err(unresolved()),
            }
        }

        Ok((linker, memory))
    }
}

fn arg(params: &[Val], index: usize) -> f64 {
    params
        .get(index)
        .and_then(abi::val_to_f64)
        .unwrap_or(f64::NAN)
}

fn invoke(
    callback: HostCallback,
    mut caller: Caller<'_, HostState>,
    params: &[Val],
) -> HostResult<()> {
    match callback {
        HostCallback::Print => {
            let value = arg(params, 0);
            tracing::info!("{}", GuestLog { value });
            caller.data_mut().log.push(value);
        }
        HostCallback::GlClearColor => {
            let surface = caller.data().surface().ok_or(HostError::SurfaceMissing)?;
            surface.lock()?.set_clear_color(
                arg(params, 0),
                arg(params, 1),
                arg(params, 2),
                arg(params, 3),
            );
        }
        HostCallback::GlClear => {
            let surface = caller.data().surface().ok_or(HostError::SurfaceMissing)?;
            surface.lock()?.clear();
        }
        HostCallback::DrawBuffer => {
            let surface = caller.data().surface().ok_or(HostError::SurfaceMissing)?;
            let memory = caller.data().memory().ok_or(HostError::MissingExport(
                ENV_MEMORY.to_string(),
            ))?;
            let offset = u64::from(abi::to_uint32(arg(params, 0)));

            let mut surface = surface.lock()?;
            let region = BlitRegion::rgba(offset, surface.width(), surface.height());
            blit(memory.data(&caller), region, &mut surface)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::surface::{Canvas, ContextKind, SurfaceAdapter};

    #[test]
    fn test_import_names_round_trip() {
        for callback in [
            HostCallback::Print,
            HostCallback::GlClearColor,
            HostCallback::GlClear,
            HostCallback::DrawBuffer,
        ] {
            assert_eq!(
                HostCallback::from_import_name(callback.import_name()),
                Some(callback)
            );
        }
        assert_eq!(HostCallback::from_import_name("fd_write"), None);
    }

    #[test]
    fn test_missing_dependencies() {
        let env = Environment::new(MemoryPages::GAME_DEMO)
            .with_callbacks(&[HostCallback::Print, HostCallback::GlClear]);
        assert!(env.missing_dependencies());

        let mut canvas = Canvas::new();
        let surface = SurfaceAdapter::bind(Some(&mut canvas), ContextKind::WebGl, 4, 4)
            .unwrap()
            .unwrap();
        let env = env.with_surface(surface).unwrap();
        assert!(!env.missing_dependencies());
        assert!(env.surface_id().is_some());

        let logger_only =
            Environment::new(MemoryPages::ADD_DEMO).with_callbacks(&[HostCallback::Print]);
        assert!(!logger_only.missing_dependencies());
    }

    #[test]
    fn test_unprovided_callback_is_unresolved() {
        let engine = Engine::default();
        let module = Module::new(
            &engine,
            r#"(module
                (import "env" "memory" (memory 2 2))
                (import "env" "glClear" (func)))"#,
        )
        .unwrap();

        let env = Environment::new(MemoryPages::ADD_DEMO).with_callbacks(&[HostCallback::Print]);
        let mut store = env.create_store(&engine);
        match env.link(&module, &mut store) {
            Err(HostError::UnresolvedImport { module, name }) => {
                assert_eq!(module, "env");
                assert_eq!(name, "glClear");
            }
            Err(other) => panic!("Expected UnresolvedImport, got {:?}", other),
            Ok(_) => panic!("Expected UnresolvedImport, got a linker"),
        }
    }

    #[test]
    fn test_foreign_import_module_is_unresolved() {
        let engine = Engine::default();
        let module = Module::new(
            &engine,
            r#"(module (import "wasi_snapshot_preview1" "proc_exit" (func (param i32))))"#,
        )
        .unwrap();

        let env = Environment::new(MemoryPages::ADD_DEMO);
        let mut store = env.create_store(&engine);
        assert!(matches!(
            env.link(&module, &mut store),
            Err(HostError::UnresolvedImport { .. })
        ));
    }
}
