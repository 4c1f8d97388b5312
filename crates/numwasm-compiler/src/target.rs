//! Target retargeting.
//!
//! [`TargetConfig`] names every knob the code generator reads: word and
//! index widths, passes to suppress, the allocator symbols wrappers call,
//! and the sandbox memory shape. [`install`] makes one configuration the
//! process-wide active target; it is applied once and never reverted, so
//! everything compiled later in the process sees it.

use std::sync::{Mutex, MutexGuard, OnceLock};

use numwasm_ir::DataLayout;
use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};

/// Name of the alignment-promotion pass, which assumes natural 64-bit
/// alignment of words.
pub const PASS_ALIGN_PROMOTE: &str = "align-promote";
pub const PASS_CONST_FOLD: &str = "const-fold";
pub const PASS_STRIP_DEAD: &str = "strip-dead";

/// Code-generation configuration for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Pointer width in bits.
    pub word_bits: u32,
    /// Width of size values (allocation sizes, element counts).
    pub size_type_bits: u32,
    /// Width of array index arithmetic.
    pub index_type_bits: u32,
    /// Module passes that must not run for this target.
    pub suppressed_passes: Vec<String>,
    /// Allocator entry point: `(size) -> ptr`.
    pub malloc_symbol: String,
    /// Deallocator entry point: `(ptr)`.
    pub free_symbol: String,
    /// Array data allocator: `(size, align) -> meminfo`.
    pub meminfo_alloc_symbol: String,
    /// Initial linear memory size in 64 KiB pages.
    pub memory_pages: u32,
    /// Maximum linear memory size in pages.
    pub max_memory_pages: Option<u32>,
    /// First heap address; everything below is reserved.
    pub heap_base: u32,
}

impl TargetConfig {
    /// The 32-bit sandbox.
    pub fn wasm32() -> Self {
        Self {
            word_bits: 32,
            size_type_bits: 32,
            index_type_bits: 32,
            suppressed_passes: vec![PASS_ALIGN_PROMOTE.to_string()],
            malloc_symbol: "malloc".into(),
            free_symbol: "free".into(),
            meminfo_alloc_symbol: "NRT_MemInfo_alloc_safe_aligned".into(),
            memory_pages: 17,
            max_memory_pages: Some(16384),
            heap_base: 1024,
        }
    }

    /// The 64-bit host the compiler itself runs on.
    pub fn host() -> Self {
        Self {
            word_bits: 64,
            size_type_bits: 64,
            index_type_bits: 64,
            suppressed_passes: Vec::new(),
            ..Self::wasm32()
        }
    }

    pub fn layout(&self) -> DataLayout {
        DataLayout {
            pointer_bits: self.word_bits,
        }
    }

    pub fn word_bytes(&self) -> u32 {
        self.word_bits / 8
    }

    pub fn is_suppressed(&self, pass: &str) -> bool {
        self.suppressed_passes.iter().any(|p| p == pass)
    }

    /// Reject configurations the code generator cannot honour.
    ///
    /// Words, sizes and indices share one register class, so the three
    /// widths must agree.
    pub fn validate(&self) -> CompileResult<()> {
        if !matches!(self.word_bits, 32 | 64) {
            return Err(CompileError::InvalidTarget(format!(
                "word width {} is not 32 or 64",
                self.word_bits
            )));
        }
        if self.size_type_bits != self.word_bits || self.index_type_bits != self.word_bits {
            return Err(CompileError::InvalidTarget(format!(
                "size ({}) and index ({}) widths must equal the word width ({})",
                self.size_type_bits, self.index_type_bits, self.word_bits
            )));
        }
        if self.heap_base % 8 != 0 {
            return Err(CompileError::InvalidTarget(format!(
                "heap base {} is not 8-byte aligned",
                self.heap_base
            )));
        }
        if let Some(max) = self.max_memory_pages {
            if max < self.memory_pages {
                return Err(CompileError::InvalidTarget(format!(
                    "maximum of {max} pages is below the initial {}",
                    self.memory_pages
                )));
            }
        }
        Ok(())
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self::wasm32()
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Process-wide state
// ══════════════════════════════════════════════════════════════════════════════

static ACTIVE: OnceLock<TargetConfig> = OnceLock::new();
static COMPILE_LOCK: Mutex<()> = Mutex::new(());

/// Install `config` as the process-wide target.
///
/// The first successful call wins. Later calls return the configuration
/// that is already active; a differing request is logged and ignored.
pub fn install(config: TargetConfig) -> CompileResult<&'static TargetConfig> {
    config.validate()?;
    let mut fresh = false;
    let active = ACTIVE.get_or_init(|| {
        fresh = true;
        config.clone()
    });
    if fresh {
        tracing::info!(
            word_bits = active.word_bits,
            suppressed = ?active.suppressed_passes,
            "retargeted code generation"
        );
    } else if *active != config {
        tracing::warn!(
            active_word_bits = active.word_bits,
            requested_word_bits = config.word_bits,
            "target already installed for this process; keeping the active one"
        );
    }
    Ok(active)
}

/// The installed target, if any.
pub fn active() -> Option<&'static TargetConfig> {
    ACTIVE.get()
}

/// Serialize compilation and assembly process-wide.
///
/// Hold the guard for the whole compile or assemble request. A poisoned
/// lock is recovered: the guarded state is the installed target, which is
/// never mutated after installation.
pub fn compile_lock() -> MutexGuard<'static, ()> {
    COMPILE_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        let sandbox = TargetConfig::wasm32();
        assert_eq!(sandbox.layout(), DataLayout::WASM32);
        assert!(sandbox.is_suppressed(PASS_ALIGN_PROMOTE));
        assert!(sandbox.validate().is_ok());

        let host = TargetConfig::host();
        assert_eq!(host.word_bytes(), 8);
        assert!(!host.is_suppressed(PASS_ALIGN_PROMOTE));
        assert!(host.validate().is_ok());
    }

    #[test]
    fn mismatched_widths_are_invalid() {
        let config = TargetConfig {
            index_type_bits: 64,
            ..TargetConfig::wasm32()
        };
        assert!(matches!(config.validate(), Err(CompileError::InvalidTarget(_))));
    }

    #[test]
    fn config_from_partial_json() {
        let config: TargetConfig =
            serde_json::from_str(r#"{"memory_pages": 32, "suppressed_passes": []}"#).unwrap();
        assert_eq!(config.memory_pages, 32);
        assert_eq!(config.word_bits, 32);
        assert!(config.suppressed_passes.is_empty());
    }
}
