//! [`Bridge`] over a `wasmi` instance of a built artifact.

use std::collections::BTreeSet;

use numwasm_compiler::TargetConfig;
use numwasm_types::{DescriptorError, DescriptorResult, SandboxAllocator, SandboxMemory};
use tracing::debug;
use wasmi::core::ValType;
use wasmi::{Engine, Linker, Memory, Module, Store, Val};
use wasmparser::{ExternalKind, Parser, Payload};

use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeLookupError, BridgeResult};
use crate::raw::RawValue;

/// Runtime entry points the bridge calls itself.
#[derive(Debug, Clone)]
struct RuntimeSymbols {
    malloc: String,
    free: String,
    meminfo_alloc: String,
}

/// A live sandbox instance. Its function exports are the callable table.
pub struct WasmBridge {
    store: Store<()>,
    instance: wasmi::Instance,
    memory: Memory,
    exports: BTreeSet<String>,
    runtime: RuntimeSymbols,
}

impl WasmBridge {
    /// Instantiate `wasm`, which must export `memory` and the runtime
    /// allocator named by `config`.
    pub fn new(wasm: &[u8], config: &TargetConfig) -> BridgeResult<Self> {
        let exports = exported_functions(wasm)?;

        let engine = Engine::default();
        let module = Module::new(&engine, wasm).map_err(instantiate_error)?;
        let mut store = Store::new(&engine, ());
        let linker = Linker::<()>::new(&engine);
        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(instantiate_error)?
            .start(&mut store)
            .map_err(instantiate_error)?;
        let memory = instance
            .get_memory(&store, "memory")
            .ok_or_else(|| BridgeError::Instantiate("no `memory` export".into()))?;

        let runtime = RuntimeSymbols {
            malloc: config.malloc_symbol.clone(),
            free: config.free_symbol.clone(),
            meminfo_alloc: config.meminfo_alloc_symbol.clone(),
        };
        for symbol in [&runtime.malloc, &runtime.free, &runtime.meminfo_alloc] {
            if !exports.contains(symbol) {
                return Err(BridgeError::Instantiate(format!(
                    "runtime symbol `{symbol}` is not exported"
                )));
            }
        }

        debug!(exports = exports.len(), "sandbox instantiated");
        Ok(Self {
            store,
            instance,
            memory,
            exports,
            runtime,
        })
    }

    /// Exported function names, sorted.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.exports.iter().map(String::as_str)
    }

    fn call_pointer(&mut self, symbol: &str, args: &[RawValue]) -> BridgeResult<u32> {
        let symbol = symbol.to_string();
        match self.invoke(&symbol, args)? {
            Some(RawValue::I32(ptr)) => Ok(ptr as u32),
            other => Err(BridgeError::Signature {
                symbol,
                message: format!("expected a pointer result, got {other:?}"),
            }),
        }
    }
}

impl SandboxMemory for WasmBridge {
    fn bytes(&self) -> &[u8] {
        self.memory.data(&self.store)
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self.memory.data_mut(&mut self.store)
    }
}

impl SandboxAllocator for WasmBridge {
    fn alloc(&mut self, size: u32) -> DescriptorResult<u32> {
        let malloc = self.runtime.malloc.clone();
        let ptr = self
            .call_pointer(&malloc, &[RawValue::pointer(size)])
            .map_err(|e| DescriptorError::AllocationFailed {
                size,
                reason: e.to_string(),
            })?;
        if ptr == 0 {
            return Err(DescriptorError::AllocationFailed {
                size,
                reason: "allocator returned null".into(),
            });
        }
        Ok(ptr)
    }
}

impl Bridge for WasmBridge {
    fn contains(&self, symbol: &str) -> bool {
        self.exports.contains(symbol)
    }

    fn invoke(&mut self, symbol: &str, args: &[RawValue]) -> BridgeResult<Option<RawValue>> {
        if !self.contains(symbol) {
            return Err(BridgeLookupError::new(symbol).into());
        }
        let func = self
            .instance
            .get_func(&self.store, symbol)
            .ok_or_else(|| BridgeLookupError::new(symbol))?;
        let ty = func.ty(&self.store);

        if ty.params().len() != args.len() {
            return Err(BridgeError::Signature {
                symbol: symbol.to_string(),
                message: format!("takes {} argument(s), {} given", ty.params().len(), args.len()),
            });
        }
        let mut inputs = Vec::with_capacity(args.len());
        for (i, (arg, expected)) in args.iter().zip(ty.params()).enumerate() {
            if val_type(*arg) != *expected {
                return Err(BridgeError::Signature {
                    symbol: symbol.to_string(),
                    message: format!("argument {} must be {expected:?}, got {arg}", i + 1),
                });
            }
            inputs.push(to_val(*arg));
        }
        let mut outputs: Vec<Val> = ty.results().iter().map(|t| Val::default(*t)).collect();

        debug!(symbol, args = args.len(), "bridge call");
        func.call(&mut self.store, &inputs, &mut outputs)
            .map_err(|e| BridgeError::Trap {
                symbol: symbol.to_string(),
                message: e.to_string(),
            })?;

        match outputs.first() {
            None => Ok(None),
            Some(val) => from_val(val).map(Some).ok_or_else(|| BridgeError::Signature {
                symbol: symbol.to_string(),
                message: format!("unsupported result {val:?}"),
            }),
        }
    }

    fn free(&mut self, ptr: u32) -> BridgeResult<()> {
        let free = self.runtime.free.clone();
        self.invoke(&free, &[RawValue::pointer(ptr)]).map(|_| ())
    }

    fn alloc_meminfo(&mut self, size: u32, align: u32) -> BridgeResult<u32> {
        let symbol = self.runtime.meminfo_alloc.clone();
        let meminfo = self.call_pointer(&symbol, &[RawValue::pointer(size), RawValue::pointer(align)])?;
        if meminfo == 0 {
            return Err(DescriptorError::AllocationFailed {
                size,
                reason: "array allocation returned null".into(),
            }
            .into());
        }
        Ok(meminfo)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn instantiate_error(e: impl std::fmt::Display) -> BridgeError {
    BridgeError::Instantiate(e.to_string())
}

fn exported_functions(wasm: &[u8]) -> BridgeResult<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for payload in Parser::new(0).parse_all(wasm) {
        if let Payload::ExportSection(reader) = payload.map_err(instantiate_error)? {
            for export in reader {
                let export = export.map_err(instantiate_error)?;
                if export.kind == ExternalKind::Func {
                    names.insert(export.name.to_string());
                }
            }
        }
    }
    Ok(names)
}

fn val_type(value: RawValue) -> ValType {
    match value {
        RawValue::I32(_) => ValType::I32,
        RawValue::I64(_) => ValType::I64,
        RawValue::F32(_) => ValType::F32,
        RawValue::F64(_) => ValType::F64,
    }
}

fn to_val(value: RawValue) -> Val {
    match value {
        RawValue::I32(v) => Val::I32(v),
        RawValue::I64(v) => Val::I64(v),
        RawValue::F32(v) => Val::F32(v.into()),
        RawValue::F64(v) => Val::F64(v.into()),
    }
}

fn from_val(value: &Val) -> Option<RawValue> {
    match value {
        Val::I32(v) => Some(RawValue::I32(*v)),
        Val::I64(v) => Some(RawValue::I64(*v)),
        Val::F32(v) => Some(RawValue::F32(f32::from(*v))),
        Val::F64(v) => Some(RawValue::F64(f64::from(*v))),
        _ => None,
    }
}
