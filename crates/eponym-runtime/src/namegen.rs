//! Host-facing façades: name generation and guest version queries.
//!
//! Both run their whole marshalling sequence under the instance lock and
//! treat any allocator, export, or memory failure as fatal for the call —
//! a broken guest contract is surfaced, never masked as a partial name.

use crate::error::RuntimeError;
use crate::memory::AllocFrame;
use crate::module::{ModuleState, NameModule};

/// Byte budget for the words of a generated name, excluding separators.
///
/// Not part of the guest ABI — a tunable chosen to exceed sixteen of the
/// longest words. Separator bytes are budgeted exactly on top of this, so
/// even a pathologically long separator cannot truncate the output. The
/// guest writes at most the combined capacity and reports the actual
/// length.
const WORD_CAPACITY: u32 = 256;

const DEFAULT_SEPARATOR: &str = "-";

/// Options for generating names.
#[derive(Debug, Clone)]
pub struct NameOptions {
    /// Number of components (2-16). Default: 3
    pub components: u8,
    /// Maximum byte length per word. 0 means no limit.
    pub max_element_length: u32,
    /// Separator between components. Empty is treated as "-".
    pub separator: String,
}

impl Default for NameOptions {
    fn default() -> Self {
        Self {
            components: 3,
            max_element_length: 0,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

impl NameOptions {
    /// Boundary validation. The marshalling layer below assumes options
    /// are already valid.
    fn validate(&self) -> Result<(), RuntimeError> {
        if !(2..=16).contains(&self.components) {
            return Err(RuntimeError::InvalidOptions(format!(
                "components must be between 2 and 16, got {}",
                self.components
            )));
        }
        Ok(())
    }

    fn separator_bytes(&self) -> &[u8] {
        if self.separator.is_empty() {
            DEFAULT_SEPARATOR.as_bytes()
        } else {
            self.separator.as_bytes()
        }
    }
}

impl NameModule {
    /// Generate a name with default options: three dash-joined words.
    pub fn generate(&self) -> Result<String, RuntimeError> {
        self.generate_with_options(&NameOptions::default())
    }

    /// Generate a name with custom options.
    pub fn generate_with_options(&self, opts: &NameOptions) -> Result<String, RuntimeError> {
        opts.validate()?;
        let separator = opts.separator_bytes();

        let mut state = self.lock();
        let mut frame = AllocFrame::new();
        let generated = run_generate(&mut state, &mut frame, opts, separator);
        // Unconditional: a failed read must not skip cleanup.
        let closed = frame.close(&mut state);
        let name = generated?;
        closed?;

        tracing::trace!(len = name.len(), "Generated name");
        Ok(name)
    }

    /// Version string baked into the guest module. Stable for the life of
    /// the instance.
    pub fn version(&self) -> Result<String, RuntimeError> {
        let mut state = self.lock();
        let len = state.call_version_len()?;
        let ptr = state.call_version_ptr()?;
        // The version buffer is guest-owned and persistent; there is
        // nothing to allocate or free.
        let bytes = state.read(ptr, len)?;
        decode_utf8(bytes, "version")
    }
}

/// The fallible middle of a generate call. Buffers land in `frame` so the
/// caller can release them on every exit path.
fn run_generate(
    state: &mut ModuleState,
    frame: &mut AllocFrame,
    opts: &NameOptions,
    separator: &[u8],
) -> Result<String, RuntimeError> {
    let sep_len = separator.len() as u32;
    let sep_ptr = frame.allocate(state, sep_len)?;
    if sep_ptr != 0 {
        state.write(sep_ptr, separator)?;
    }

    // Word budget plus exact separator bytes; saturation only trips for
    // absurd separators, which then fail cleanly in the guest allocator.
    let out_cap = WORD_CAPACITY
        .saturating_add(sep_len.saturating_mul(u32::from(opts.components) - 1));
    let out_ptr = frame.allocate(state, out_cap)?;

    let actual = state.call_generate(
        opts.components,
        opts.max_element_length,
        sep_ptr,
        sep_len,
        out_ptr,
        out_cap,
    )?;
    if actual > out_cap {
        return Err(RuntimeError::ExportCall(format!(
            "guest reported {actual} bytes written into a {out_cap}-byte buffer"
        )));
    }

    // Exactly the prefix the guest reported, never the full capacity.
    let bytes = state.read(out_ptr, actual)?;
    decode_utf8(bytes, "generated name")
}

fn decode_utf8(bytes: Vec<u8>, what: &str) -> Result<String, RuntimeError> {
    String::from_utf8(bytes)
        .map_err(|e| RuntimeError::ExportCall(format!("{what} is not valid UTF-8: {e}")))
}
