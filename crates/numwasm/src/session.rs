//! Declaration sessions.
//!
//! A [`Session`] is what declaring code talks to. The same declarations
//! mean different things depending on the session's [`Mode`]:
//!
//! | mode           | `declare`                    | `call`                    |
//! |----------------|------------------------------|---------------------------|
//! | `Native`       | resolve + check              | evaluate in-process       |
//! | `TargetBuild`  | compile a unit for the target| [`NotCallable`]           |
//! | `BridgeCall`   | resolve the signature only   | invoke through the bridge |
//!
//! [`NotCallable`]: NumwasmError::NotCallable

use indexmap::IndexMap;
use numwasm_bridge::{
    array_from_bytes, Bridge, BridgeArg, BridgeError, BridgeLookupError, BridgeReturn, BridgeStub,
};
use numwasm_codegen::{emit_wasm, Assembler, ExportSet};
use numwasm_compiler::target::install;
use numwasm_compiler::{
    compile_lock, compile_unit, resolve_signature, CompiledFunctionUnit, SignatureTable,
};
use numwasm_eval::{ArrayRef, EvalError, Evaluator, GlobalSlots, HostArray, KernelTable};
use numwasm_types::kernel::KernelDecl;
use numwasm_types::{
    FunctionSignature, GlobalBinding, SandboxArray, SandboxMemory, ScalarType, ScalarValue,
};
use tracing::{debug, info};

use crate::artifact::BuildArtifact;
use crate::config::BuildConfig;
use crate::error::{NumwasmError, NumwasmResult};
use crate::global::GlobalState;
use crate::mode::Mode;
use crate::value::Value;

/// The handle a declaration returns; pass it to [`Session::call`].
#[derive(Debug, Clone, PartialEq)]
pub struct Declared {
    /// Qualified name, `<module>.<name>`.
    pub name: String,
    /// The symbol the function is exported under in the built artifact.
    pub symbol: String,
    pub signature: FunctionSignature,
    pub mode: Mode,
}

/// A set of kernel and global declarations under one mode.
pub struct Session {
    mode: Mode,
    config: BuildConfig,
    // native
    kernels: KernelTable,
    slots: GlobalSlots,
    // target build
    signatures: SignatureTable,
    units: Vec<CompiledFunctionUnit>,
    bindings: IndexMap<String, GlobalBinding>,
    // bridge call
    bridge: Option<Box<dyn Bridge>>,
}

impl Session {
    pub fn new(mode: Mode) -> Self {
        Self::with_config(mode, BuildConfig::default())
    }

    pub fn with_config(mode: Mode, config: BuildConfig) -> Self {
        Self {
            mode,
            config,
            kernels: KernelTable::new(),
            slots: GlobalSlots::new(),
            signatures: SignatureTable::new(),
            units: Vec::new(),
            bindings: IndexMap::new(),
            bridge: None,
        }
    }

    /// A session in the mode named by [`MODE_ENV`](crate::MODE_ENV).
    pub fn from_env(config: BuildConfig) -> NumwasmResult<Self> {
        Ok(Self::with_config(Mode::from_env()?, config))
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Declarations
    // ══════════════════════════════════════════════════════════════════════════

    /// Declare a kernel. Annotation errors surface here as
    /// [`NumwasmError::TypeMapping`], in every mode.
    ///
    /// Redeclaring a qualified name replaces the earlier declaration.
    pub fn declare(&mut self, decl: KernelDecl) -> NumwasmResult<Declared> {
        let name = decl.qualified_name();
        let symbol = decl.export_symbol();
        let signature = match self.mode {
            Mode::Native => self.kernels.declare(decl)?,
            Mode::TargetBuild => self.compile(&decl)?,
            Mode::BridgeCall => resolve_signature(&decl)?,
        };
        debug!(name = %name, symbol = %symbol, mode = %self.mode, "declared kernel");
        Ok(Declared {
            name,
            symbol,
            signature,
            mode: self.mode,
        })
    }

    fn compile(&mut self, decl: &KernelDecl) -> NumwasmResult<FunctionSignature> {
        let target = install(self.config.target.clone())?;
        let _guard = compile_lock();

        let name = decl.qualified_name();
        let signature = resolve_signature(decl)?;
        let mut table = self.signatures.clone();
        table.insert(name.clone(), signature.clone());
        let unit = compile_unit(decl, &table, target)?;

        self.signatures = table;
        match self.units.iter_mut().find(|u| u.symbol == unit.symbol) {
            Some(existing) => *existing = unit,
            None => self.units.push(unit),
        }
        Ok(signature)
    }

    /// Declare a module-level global of type `ty`, starting at `initial`
    /// (converted to `ty`).
    ///
    /// Redeclaring a name replaces its binding. In bridge-call mode the
    /// returned accessors are inert; the slot lives in the artifact.
    pub fn declare_global(
        &mut self,
        name: impl Into<String>,
        initial: ScalarValue,
        ty: ScalarType,
    ) -> GlobalState {
        let binding = GlobalBinding::new(name, initial, ty);
        let observable = match self.mode {
            Mode::Native => {
                self.slots.bind(binding.clone());
                true
            }
            Mode::TargetBuild => {
                self.bindings.insert(binding.name.clone(), binding.clone());
                true
            }
            Mode::BridgeCall => false,
        };
        debug!(global = %binding.name, ty = %binding.ty, observable, "declared global");
        GlobalState::new(binding, observable)
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Build
    // ══════════════════════════════════════════════════════════════════════════

    /// Assemble every compiled unit and the declared globals into one module
    /// and emit it. Only target-build sessions build.
    pub fn build(&self) -> NumwasmResult<BuildArtifact> {
        if self.mode != Mode::TargetBuild {
            return Err(NumwasmError::WrongMode {
                operation: "build",
                mode: self.mode,
            });
        }
        self.config.validate()?;
        let target = install(self.config.target.clone())?;
        let _guard = compile_lock();

        let mut exports = ExportSet::with_runtime(target);
        exports.extend(self.units.iter().map(|u| u.export_symbol().to_string()));
        exports.extend(self.config.exports.iter().cloned());

        let assembled = Assembler::new(&self.config.name, target)
            .exports(exports)
            .globals(self.bindings.values())
            .assemble(&self.units)?;
        let wasm = emit_wasm(&assembled.module, target)?;

        let artifact = BuildArtifact::new(
            &self.config.name,
            assembled.text.clone(),
            wasm,
            assembled.exported_functions(),
            self.bindings.keys().cloned().collect(),
        );
        info!(
            name = %self.config.name,
            units = self.units.len(),
            globals = self.bindings.len(),
            wasm_bytes = artifact.wasm.len(),
            "built artifact"
        );
        Ok(artifact)
    }

    /// Units compiled so far, in declaration order.
    pub fn units(&self) -> &[CompiledFunctionUnit] {
        &self.units
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Calls
    // ══════════════════════════════════════════════════════════════════════════

    /// Connect a bridge-call session to a loaded artifact, replacing any
    /// earlier one.
    pub fn attach_bridge(&mut self, bridge: impl Bridge + 'static) {
        self.bridge = Some(Box::new(bridge));
    }

    pub fn bridge(&self) -> Option<&dyn Bridge> {
        self.bridge.as_deref()
    }

    pub fn bridge_mut(&mut self) -> Option<&mut (dyn Bridge + 'static)> {
        self.bridge.as_deref_mut()
    }

    /// Call a declared kernel.
    ///
    /// Native calls share host arrays with the callee. Bridge calls copy
    /// each host array into the sandbox, and after a successful call copy
    /// the sandbox contents back, so in-place updates are visible either
    /// way. Array results come back as [`Value::Descriptor`]s to be read
    /// through [`Session::bridge`].
    pub fn call(&mut self, declared: &Declared, args: &[Value]) -> NumwasmResult<Value> {
        match declared.mode {
            Mode::Native => self.call_native(declared, args),
            Mode::TargetBuild => Err(NumwasmError::NotCallable {
                symbol: declared.symbol.clone(),
            }),
            Mode::BridgeCall => self.call_bridge(declared, args),
        }
    }

    fn call_native(&mut self, declared: &Declared, args: &[Value]) -> NumwasmResult<Value> {
        let args = args
            .iter()
            .map(|arg| match arg {
                Value::Scalar(v) => Ok(numwasm_eval::Value::Scalar(*v)),
                Value::Array(a) => Ok(numwasm_eval::Value::Array(a.clone())),
                Value::Void => Ok(numwasm_eval::Value::Void),
                Value::Sandbox(_) | Value::Descriptor(_) => Err(EvalError::TypeMismatch(format!(
                    "`{}` runs natively and cannot take sandbox arrays",
                    declared.name
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let result = Evaluator::new(&self.kernels, &mut self.slots).call(&declared.name, args)?;
        Ok(result.into())
    }

    fn call_bridge(&mut self, declared: &Declared, args: &[Value]) -> NumwasmResult<Value> {
        let bridge = match self.bridge.as_deref_mut() {
            Some(bridge) if bridge.contains(&declared.symbol) => bridge,
            _ => return Err(BridgeLookupError::new(&declared.symbol).into()),
        };

        let mut marshaled = Vec::with_capacity(args.len());
        let mut copied: Vec<(&ArrayRef, SandboxArray)> = Vec::new();
        for arg in args {
            marshaled.push(match arg {
                Value::Scalar(v) => BridgeArg::Scalar(*v),
                Value::Array(shared) => {
                    let host = shared.borrow();
                    let shape = host
                        .shape()
                        .iter()
                        .map(|&d| u32::try_from(d))
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(|_| BridgeError::Signature {
                            symbol: declared.symbol.clone(),
                            message: format!("shape {:?} exceeds the sandbox", host.shape()),
                        })?;
                    let array =
                        array_from_bytes(&mut *bridge, host.element(), shape, &host.to_le_bytes())?;
                    copied.push((shared, array.clone()));
                    BridgeArg::Array(array)
                }
                Value::Sandbox(array) => BridgeArg::Array(array.clone()),
                Value::Descriptor(handle) => BridgeArg::Descriptor(*handle),
                Value::Void => {
                    return Err(BridgeError::Signature {
                        symbol: declared.symbol.clone(),
                        message: "void is not an argument".into(),
                    }
                    .into())
                }
            });
        }

        let stub = BridgeStub::new(&declared.symbol, declared.signature.clone());
        let returned = stub.call(&mut *bridge, &marshaled)?;

        for (shared, array) in copied {
            let len = array.nbytes() as u32;
            let bytes = SandboxMemory::slice(&*bridge, array.data, len).map_err(BridgeError::from)?;
            let mut host = shared.borrow_mut();
            let updated = HostArray::from_le_bytes(host.element(), host.shape().to_vec(), bytes)?;
            *host = updated;
        }
        debug!(symbol = %declared.symbol, "bridge call returned");

        Ok(match returned {
            BridgeReturn::Scalar(v) => Value::Scalar(v),
            BridgeReturn::Array(handle) => Value::Descriptor(handle),
            BridgeReturn::Void => Value::Void,
        })
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Globals
    // ══════════════════════════════════════════════════════════════════════════

    /// Current value of a native global, if its slot has been touched or
    /// bound.
    pub fn global_value(&self, name: &str) -> Option<ScalarValue> {
        self.slots
            .peek(name)
            .or_else(|| self.slots.binding(name).map(|b| b.initial))
    }

    /// Globals declared for the build, in declaration order.
    pub fn globals(&self) -> impl Iterator<Item = &GlobalBinding> {
        self.bindings.values()
    }
}
