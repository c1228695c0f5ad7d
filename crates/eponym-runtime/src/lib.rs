// eponym-runtime — host binding for the sandboxed name-generator guest

//! Random readable names, generated inside a sandboxed WebAssembly guest.
//!
//! The word lists and selection logic live in an embedded WASM module;
//! this crate implements the host side of the calling protocol: one-time
//! instantiation of the shared guest, serialized access to it, and
//! leak-free marshalling of arguments and results through the guest's own
//! allocator. The guest is opaque here — the crate depends only on its
//! C-style export surface (`allocate`, `free`, `generate_with_options`,
//! `version_len`, `version`).
//!
//! # Quick start
//!
//! ```rust,no_run
//! use eponym_runtime::NameOptions;
//!
//! # fn run() -> Result<(), eponym_runtime::RuntimeError> {
//! // Three dash-joined words, e.g. "misty-quiet-brook"
//! let name = eponym_runtime::generate()?;
//!
//! // Two words of at most four bytes, e.g. "cool_fox"
//! let short = eponym_runtime::generate_with_options(&NameOptions {
//!     components: 2,
//!     max_element_length: 4,
//!     separator: "_".into(),
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod error;
mod memory;
pub mod module;
pub mod namegen;

pub use error::RuntimeError;
pub use module::NameModule;
pub use namegen::NameOptions;

/// Generate a name with default options using the shared guest instance.
pub fn generate() -> Result<String, RuntimeError> {
    NameModule::shared()?.generate()
}

/// Generate a name with custom options using the shared guest instance.
pub fn generate_with_options(opts: &NameOptions) -> Result<String, RuntimeError> {
    NameModule::shared()?.generate_with_options(opts)
}

/// Version string of the embedded guest module.
pub fn version() -> Result<String, RuntimeError> {
    NameModule::shared()?.version()
}
