use thiserror::Error;

/// Errors surfaced by the eponym runtime.
///
/// None of these are retried automatically. `Init` is cached for the
/// process lifetime (the guest is never re-instantiated after a failed
/// setup), and the remaining kinds indicate a broken guest contract rather
/// than a transient condition. `Clone` is required so the cached init
/// failure can be replayed to every later caller.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("guest initialization failed: {0}")]
    Init(String),

    #[error("guest allocator failed: {0}")]
    Alloc(String),

    #[error("guest memory access out of bounds: {0}")]
    MemoryAccess(String),

    #[error("guest export call failed: {0}")]
    ExportCall(String),

    #[error("invalid options: {0}")]
    InvalidOptions(String),
}
