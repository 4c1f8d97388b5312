//! Compiled function units.
//!
//! [`compile_unit`] runs the target-build pipeline for one kernel:
//! resolve → check → lower → wrap → passes → verify. The result is a
//! self-contained IR module that defines the inner function and the
//! wrapper and declares everything else it needs.

use numwasm_ir::{verify, IrModule};
use numwasm_types::kernel::KernelDecl;
use numwasm_types::FunctionSignature;

use crate::check::{check_kernel, SignatureTable};
use crate::error::CompileResult;
use crate::lower::lower_kernel;
use crate::mapper::resolve_signature;
use crate::passes::PassManager;
use crate::target::TargetConfig;
use crate::wrapper::emit_wrapper;

/// One kernel compiled for the target, ready for assembly.
#[derive(Debug, Clone)]
pub struct CompiledFunctionUnit {
    /// Default entry symbol, `<module>.<name>`.
    pub symbol: String,
    /// Explicit export name replacing `symbol` after assembly.
    pub symbol_override: Option<String>,
    pub module: IrModule,
    pub signature: FunctionSignature,
}

impl CompiledFunctionUnit {
    /// The name the entry point is reachable under after assembly.
    pub fn export_symbol(&self) -> &str {
        self.symbol_override.as_deref().unwrap_or(&self.symbol)
    }
}

/// Compile `decl` for `config`.
///
/// `table` must hold the signature of every kernel `decl` calls. Callers
/// serialize compilation with [`compile_lock`](crate::target::compile_lock).
pub fn compile_unit(
    decl: &KernelDecl,
    table: &SignatureTable,
    config: &TargetConfig,
) -> CompileResult<CompiledFunctionUnit> {
    config.validate()?;
    let signature = resolve_signature(decl)?;
    check_kernel(decl, &signature, table)?;

    let symbol = decl.qualified_name();
    let mut module = IrModule::new(symbol.clone(), config.layout());
    lower_kernel(decl, &signature, table, config, &mut module)?;
    emit_wrapper(&mut module, decl, &signature, config)?;
    let ran = PassManager::standard().run(&mut module, config)?;
    verify(&module)?;

    tracing::debug!(
        symbol = %symbol,
        signature = %signature,
        passes = ?ran,
        "compiled unit"
    );
    Ok(CompiledFunctionUnit {
        symbol,
        symbol_override: decl.symbol.clone(),
        module,
        signature,
    })
}
