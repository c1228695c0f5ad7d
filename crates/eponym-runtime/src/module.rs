//! Guest lifecycle: one-time compilation and instantiation of the embedded
//! module, plus the lock that serializes every call against it.

use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use wasmtime::{Engine, Instance, Linker, Memory, Module, Store, TypedFunc, WasmParams, WasmResults};
use wasmtime_wasi::WasiCtxBuilder;
use wasmtime_wasi::preview1::{self, WasiP1Ctx};

use crate::error::RuntimeError;

/// WebAssembly text for the embedded guest. Compiled by wasmtime on first
/// use; the word lists, the PRNG, and the allocator all live inside it.
const GUEST_WAT: &[u8] = include_bytes!("guest.wat");

/// Everything needed to drive one call into the guest.
///
/// Every wasmtime call requires `&mut Store`, so handing out a
/// `ModuleState` guard is what grants exclusive rights to the instance:
/// the `Mutex` in [`NameModule`] is the call-serialization lock, held
/// across the full allocate → write → call → read → free sequence. The
/// guest's allocator bookkeeping is not safe under interleaved calls.
pub(crate) struct ModuleState {
    pub(crate) store: Store<WasiP1Ctx>,
    pub(crate) memory: Memory,
    alloc: TypedFunc<u32, u32>,
    dealloc: TypedFunc<(u32, u32), ()>,
    generate: TypedFunc<(u32, u32, u32, u32, u32, u32), u32>,
    version_len: TypedFunc<(), u32>,
    version_ptr: TypedFunc<(), u32>,
    /// Instrumentation for the leak-freedom tests: every non-sentinel
    /// allocate and every free performed through the bridge.
    pub(crate) allocs: u64,
    pub(crate) frees: u64,
}

/// A live instance of the name-generator guest.
///
/// Instantiation is expensive; library callers normally go through
/// [`NameModule::shared`]. Constructing independent instances stays
/// supported so tests can isolate guest state.
pub struct NameModule {
    state: Mutex<ModuleState>,
}

static SHARED: OnceLock<Result<NameModule, RuntimeError>> = OnceLock::new();

impl NameModule {
    /// Compile and instantiate the embedded guest module.
    ///
    /// Both compile and instantiation failures surface as
    /// [`RuntimeError::Init`]; a module that got this far is fully usable.
    pub fn new() -> Result<Self, RuntimeError> {
        let engine = Engine::default();

        let mut linker: Linker<WasiP1Ctx> = Linker::new(&engine);
        // The guest imports wasi random_get to seed its PRNG.
        preview1::add_to_linker_sync(&mut linker, |ctx| ctx)
            .map_err(|e| RuntimeError::Init(format!("wasi shim: {e}")))?;

        let module = Module::new(&engine, GUEST_WAT)
            .map_err(|e| RuntimeError::Init(format!("compile: {e}")))?;

        let wasi = WasiCtxBuilder::new().build_p1();
        let mut store = Store::new(&engine, wasi);

        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| RuntimeError::Init(format!("instantiate: {e}")))?;

        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| RuntimeError::Init("guest exports no memory".into()))?;

        let alloc = typed_export(&instance, &mut store, "allocate")?;
        let dealloc = typed_export(&instance, &mut store, "free")?;
        let generate = typed_export(&instance, &mut store, "generate_with_options")?;
        let version_len = typed_export(&instance, &mut store, "version_len")?;
        let version_ptr = typed_export(&instance, &mut store, "version")?;

        tracing::debug!(
            memory_bytes = memory.data_size(&store),
            "Guest module instantiated"
        );

        Ok(Self {
            state: Mutex::new(ModuleState {
                store,
                memory,
                alloc,
                dealloc,
                generate,
                version_len,
                version_ptr,
                allocs: 0,
                frees: 0,
            }),
        })
    }

    /// Process-wide instance, created lazily on first use.
    ///
    /// The one-time initialization runs under `OnceLock`'s own lock, never
    /// the call lock, so concurrent first callers cannot double-instantiate.
    /// A failed initialization is cached and replayed to every later
    /// caller; it is never retried.
    pub fn shared() -> Result<&'static NameModule, RuntimeError> {
        match SHARED.get_or_init(NameModule::new) {
            Ok(module) => Ok(module),
            Err(e) => Err(e.clone()),
        }
    }

    /// Acquire exclusive access to the instance for one call.
    ///
    /// A panicked holder can only have abandoned per-call scratch state, so
    /// a poisoned lock is recovered rather than propagated.
    pub(crate) fn lock(&self) -> MutexGuard<'_, ModuleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// (allocates, frees) performed through the bridge so far. Equal
    /// counts mean no guest memory has leaked.
    pub fn allocation_stats(&self) -> (u64, u64) {
        let state = self.lock();
        (state.allocs, state.frees)
    }
}

impl ModuleState {
    pub(crate) fn call_alloc(&mut self, size: u32) -> Result<u32, RuntimeError> {
        self.alloc
            .call(&mut self.store, size)
            .map_err(|e| RuntimeError::ExportCall(format!("allocate: {e}")))
    }

    pub(crate) fn call_free(&mut self, ptr: u32, size: u32) -> Result<(), RuntimeError> {
        self.dealloc
            .call(&mut self.store, (ptr, size))
            .map_err(|e| RuntimeError::ExportCall(format!("free: {e}")))
    }

    pub(crate) fn call_generate(
        &mut self,
        components: u8,
        max_element_length: u32,
        sep_ptr: u32,
        sep_len: u32,
        out_ptr: u32,
        out_cap: u32,
    ) -> Result<u32, RuntimeError> {
        self.generate
            .call(
                &mut self.store,
                (
                    u32::from(components),
                    max_element_length,
                    sep_ptr,
                    sep_len,
                    out_ptr,
                    out_cap,
                ),
            )
            .map_err(|e| RuntimeError::ExportCall(format!("generate_with_options: {e}")))
    }

    pub(crate) fn call_version_len(&mut self) -> Result<u32, RuntimeError> {
        self.version_len
            .call(&mut self.store, ())
            .map_err(|e| RuntimeError::ExportCall(format!("version_len: {e}")))
    }

    pub(crate) fn call_version_ptr(&mut self) -> Result<u32, RuntimeError> {
        self.version_ptr
            .call(&mut self.store, ())
            .map_err(|e| RuntimeError::ExportCall(format!("version: {e}")))
    }
}

fn typed_export<P, R>(
    instance: &Instance,
    store: &mut Store<WasiP1Ctx>,
    name: &str,
) -> Result<TypedFunc<P, R>, RuntimeError>
where
    P: WasmParams,
    R: WasmResults,
{
    instance
        .get_typed_func(&mut *store, name)
        .map_err(|e| RuntimeError::Init(format!("export '{name}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_returns_the_same_instance() {
        let a = NameModule::shared().expect("shared init");
        let b = NameModule::shared().expect("shared init");
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn failed_initialization_is_cached_and_replayed() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        // Same shape as SHARED: a failure is stored once and every later
        // caller gets a clone of it, without re-running initialization.
        static FAILED: OnceLock<Result<NameModule, RuntimeError>> = OnceLock::new();
        static ATTEMPTS: AtomicUsize = AtomicUsize::new(0);

        let init = || -> Result<NameModule, RuntimeError> {
            ATTEMPTS.fetch_add(1, Ordering::SeqCst);
            Err(RuntimeError::Init("compile: bad guest".into()))
        };

        let first = match FAILED.get_or_init(init) {
            Ok(_) => panic!("initialization unexpectedly succeeded"),
            Err(e) => e.clone(),
        };
        let second = match FAILED.get_or_init(init) {
            Ok(_) => panic!("initialization unexpectedly succeeded"),
            Err(e) => e.clone(),
        };

        assert_eq!(ATTEMPTS.load(Ordering::SeqCst), 1, "initialization was retried");
        assert_eq!(first.to_string(), second.to_string());
        assert!(matches!(second, RuntimeError::Init(_)));
    }

    #[test]
    fn independent_instances_do_not_share_state() {
        let a = NameModule::new().expect("init");
        let b = NameModule::new().expect("init");
        a.lock().call_alloc(8).expect("alloc");
        // b's bump heap is untouched by a's allocation
        assert_eq!(b.allocation_stats(), (0, 0));
    }
}
