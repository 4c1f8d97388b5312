//! Module assembly.
//!
//! The [`Assembler`] merges the runtime support module and an ordered list
//! of [`CompiledFunctionUnit`]s into one module:
//!
//! 1. merge the runtime module, then every unit in list order
//! 2. materialize each referenced global slot once from its binding
//! 3. rename every overridden entry point to its override
//! 4. finalize: verify, and require every declaration to be defined
//! 5. cull visibility against the [`ExportSet`]
//!
//! Each step returns early on error and the partially merged module is
//! dropped, so a failed build never yields an artifact.

use indexmap::{IndexMap, IndexSet};
use numwasm_compiler::lower::scalar_const;
use numwasm_compiler::{CompiledFunctionUnit, TargetConfig};
use numwasm_ir::{verify, FuncType, Function, Global, IrError, IrModule, Linkage, Visibility};
use numwasm_types::global::{GlobalBinding, GLOBAL_SLOT_PREFIX};

use crate::error::{LinkError, LinkResult};
use crate::runtime::{runtime_module, runtime_symbols};

// ══════════════════════════════════════════════════════════════════════════════
// ExportSet
// ══════════════════════════════════════════════════════════════════════════════

/// Symbols that stay externally visible after assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSet {
    symbols: IndexSet<String>,
}

impl ExportSet {
    /// An empty allow-list.
    pub fn new() -> Self {
        Self::default()
    }

    /// The runtime support symbols, which the bridge allocates through.
    pub fn with_runtime(config: &TargetConfig) -> Self {
        let mut set = Self::new();
        set.extend(runtime_symbols(config));
        set
    }

    pub fn insert(&mut self, symbol: impl Into<String>) -> bool {
        self.symbols.insert(symbol.into())
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl<S: Into<String>> Extend<S> for ExportSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.symbols.extend(iter.into_iter().map(Into::into));
    }
}

impl<S: Into<String>> FromIterator<S> for ExportSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// AssembledModule
// ══════════════════════════════════════════════════════════════════════════════

/// The finalized, linked module and its textual serialization.
#[derive(Debug, Clone)]
pub struct AssembledModule {
    pub module: IrModule,
    pub text: String,
}

impl AssembledModule {
    /// Defined `external` functions with default visibility, in module order.
    pub fn exported_functions(&self) -> Vec<String> {
        self.module
            .functions()
            .filter(|f| f.is_definition())
            .filter(|f| f.linkage == Linkage::External && f.visibility == Visibility::Default)
            .map(|f| f.name.clone())
            .collect()
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Assembler
// ══════════════════════════════════════════════════════════════════════════════

/// Links compiled units into one module.
pub struct Assembler<'a> {
    name: String,
    config: &'a TargetConfig,
    exports: ExportSet,
    globals: IndexMap<String, GlobalBinding>,
}

impl<'a> Assembler<'a> {
    pub fn new(name: impl Into<String>, config: &'a TargetConfig) -> Self {
        Self {
            name: name.into(),
            config,
            exports: ExportSet::new(),
            globals: IndexMap::new(),
        }
    }

    pub fn exports(mut self, exports: ExportSet) -> Self {
        self.exports = exports;
        self
    }

    /// Register the global bindings slots are materialized from.
    pub fn globals<'g>(mut self, bindings: impl IntoIterator<Item = &'g GlobalBinding>) -> Self {
        for binding in bindings {
            self.globals
                .insert(binding.slot_symbol(), binding.clone());
        }
        self
    }

    /// Assemble `units` in order.
    pub fn assemble(&self, units: &[CompiledFunctionUnit]) -> LinkResult<AssembledModule> {
        let mut out = IrModule::new(self.name.clone(), self.config.layout());
        merge(&mut out, &runtime_module(self.config)?)?;
        for unit in units {
            if unit.module.layout != out.layout {
                return Err(LinkError::LayoutMismatch {
                    unit: unit.symbol.clone(),
                    expected: out.layout.pointer_bits,
                    found: unit.module.layout.pointer_bits,
                });
            }
            merge(&mut out, &unit.module)?;
            tracing::debug!(unit = %unit.symbol, "merged unit");
        }

        self.materialize_globals(&mut out)?;

        for unit in units {
            if let Some(symbol) = &unit.symbol_override {
                out.rename(&unit.symbol, symbol).map_err(|e| match e {
                    IrError::DuplicateSymbol(s) => LinkError::DuplicateSymbol(s),
                    IrError::UnknownSymbol(s) => LinkError::Unresolved(s),
                    other => LinkError::Ir(other),
                })?;
                tracing::debug!(from = %unit.symbol, to = %symbol, "applied symbol override");
            }
        }

        finalize(&out)?;
        let hidden = cull_visibility(&mut out, &self.exports);
        tracing::debug!(module = %out.name, hidden, "culled visibility");

        let text = out.to_string();
        Ok(AssembledModule { module: out, text })
    }

    /// Define every referenced global slot from its binding.
    fn materialize_globals(&self, out: &mut IrModule) -> LinkResult<()> {
        for slot in out.globals_mut() {
            if slot.is_definition() || !slot.name.starts_with(GLOBAL_SLOT_PREFIX) {
                continue;
            }
            let binding = self
                .globals
                .get(&slot.name)
                .ok_or_else(|| LinkError::Unresolved(slot.name.clone()))?;
            let init = scalar_const(binding.initial);
            if init.ty() != slot.ty {
                return Err(LinkError::SignatureMismatch {
                    symbol: slot.name.clone(),
                    existing: slot.ty.to_string(),
                    incoming: init.ty().to_string(),
                });
            }
            slot.init = Some(init);
            slot.linkage = Linkage::Internal;
        }
        Ok(())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Steps
// ══════════════════════════════════════════════════════════════════════════════

/// Merge `src` into `out`.
///
/// Declarations fold into definitions; two definitions of one symbol are
/// an error unless both are `linkonce_odr`, in which case the first stays.
pub fn merge(out: &mut IrModule, src: &IrModule) -> LinkResult<()> {
    for function in src.functions() {
        merge_function(out, function)?;
    }
    for global in src.globals() {
        merge_global(out, global)?;
    }
    Ok(())
}

fn merge_function(out: &mut IrModule, incoming: &Function) -> LinkResult<()> {
    let Some(existing) = out.function(&incoming.name) else {
        if out.global(&incoming.name).is_some() {
            return Err(LinkError::DuplicateSymbol(incoming.name.clone()));
        }
        out.add_function(incoming.clone())?;
        return Ok(());
    };
    if existing.ty != incoming.ty {
        return Err(LinkError::SignatureMismatch {
            symbol: incoming.name.clone(),
            existing: describe(&existing.ty),
            incoming: describe(&incoming.ty),
        });
    }
    match (existing.is_definition(), incoming.is_definition()) {
        (false, true) => out.replace_function(incoming.clone())?,
        (true, true) => {
            let odr = existing.linkage == Linkage::LinkOnceOdr
                && incoming.linkage == Linkage::LinkOnceOdr;
            if !odr {
                return Err(LinkError::DuplicateSymbol(incoming.name.clone()));
            }
        }
        _ => {}
    }
    Ok(())
}

fn merge_global(out: &mut IrModule, incoming: &Global) -> LinkResult<()> {
    let Some(existing) = out.global_mut(&incoming.name) else {
        if out.function(&incoming.name).is_some() {
            return Err(LinkError::DuplicateSymbol(incoming.name.clone()));
        }
        out.add_global(incoming.clone())?;
        return Ok(());
    };
    if existing.ty != incoming.ty {
        return Err(LinkError::SignatureMismatch {
            symbol: incoming.name.clone(),
            existing: existing.ty.to_string(),
            incoming: incoming.ty.to_string(),
        });
    }
    match (existing.is_definition(), incoming.is_definition()) {
        (false, true) => *existing = incoming.clone(),
        (true, true) => {
            let odr = existing.linkage == Linkage::LinkOnceOdr
                && incoming.linkage == Linkage::LinkOnceOdr;
            if !odr {
                return Err(LinkError::DuplicateSymbol(incoming.name.clone()));
            }
        }
        _ => {}
    }
    Ok(())
}

fn describe(ty: &FuncType) -> String {
    let list = |types: &[numwasm_ir::IrType]| {
        types.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ")
    };
    format!("({}) -> ({})", list(&ty.params), list(&ty.results))
}

/// Verify `module` and require every symbol to be defined.
pub fn finalize(module: &IrModule) -> LinkResult<()> {
    verify(module)?;
    if let Some(symbol) = module.undefined_symbols().into_iter().next() {
        return Err(LinkError::Unresolved(symbol));
    }
    Ok(())
}

/// Hide every defined symbol outside `exports`.
///
/// Restrictive linkages (`internal`, `private`) require default visibility
/// to stay well-formed, so those are set to default instead. Returns the
/// number of symbols hidden.
pub fn cull_visibility(module: &mut IrModule, exports: &ExportSet) -> usize {
    fn cull(name: &str, linkage: Linkage, visibility: &mut Visibility, exports: &ExportSet) -> bool {
        if exports.contains(name) {
            return false;
        }
        if linkage.is_restrictive() {
            *visibility = Visibility::Default;
            false
        } else {
            *visibility = Visibility::Hidden;
            true
        }
    }

    let mut hidden = 0;
    for f in module.functions_mut().filter(|f| f.is_definition()) {
        hidden += usize::from(cull(&f.name, f.linkage, &mut f.visibility, exports));
    }
    for g in module.globals_mut().filter(|g| g.is_definition()) {
        hidden += usize::from(cull(&g.name, g.linkage, &mut g.visibility, exports));
    }
    hidden
}

#[cfg(test)]
mod tests {
    use super::*;
    use numwasm_ir::{DataLayout, FunctionBuilder, Inst, IrType};

    fn defined(name: &str, linkage: Linkage) -> Function {
        let mut b = FunctionBuilder::new(vec![], vec![IrType::I32]);
        b.push(Inst::i32(1));
        b.finish(name, linkage)
    }

    #[test]
    fn declaration_folds_into_definition() {
        let mut a = IrModule::new("a", DataLayout::WASM32);
        a.declare_function("f", FuncType::new(vec![], vec![IrType::I32]));
        let mut b = IrModule::new("b", DataLayout::WASM32);
        b.add_function(defined("f", Linkage::External)).unwrap();

        let mut out = IrModule::new("out", DataLayout::WASM32);
        merge(&mut out, &a).unwrap();
        merge(&mut out, &b).unwrap();
        assert!(out.function("f").unwrap().is_definition());
    }

    #[test]
    fn double_definition_is_rejected_unless_odr() {
        let mut a = IrModule::new("a", DataLayout::WASM32);
        a.add_function(defined("f", Linkage::External)).unwrap();
        let mut out = IrModule::new("out", DataLayout::WASM32);
        merge(&mut out, &a).unwrap();
        assert_eq!(
            merge(&mut out, &a),
            Err(LinkError::DuplicateSymbol("f".into()))
        );

        let mut odr = IrModule::new("odr", DataLayout::WASM32);
        odr.add_function(defined("g", Linkage::LinkOnceOdr)).unwrap();
        merge(&mut out, &odr).unwrap();
        merge(&mut out, &odr).unwrap();
    }

    #[test]
    fn conflicting_types_are_rejected() {
        let mut a = IrModule::new("a", DataLayout::WASM32);
        a.declare_function("f", FuncType::new(vec![IrType::I64], vec![]));
        let mut b = IrModule::new("b", DataLayout::WASM32);
        b.add_function(defined("f", Linkage::External)).unwrap();
        let mut out = IrModule::new("out", DataLayout::WASM32);
        merge(&mut out, &a).unwrap();
        assert!(matches!(
            merge(&mut out, &b),
            Err(LinkError::SignatureMismatch { .. })
        ));
    }

    #[test]
    fn culling_respects_restrictive_linkage() {
        let mut module = IrModule::new("m", DataLayout::WASM32);
        module.add_function(defined("kept", Linkage::External)).unwrap();
        module.add_function(defined("dropped", Linkage::External)).unwrap();
        let mut local = defined("local", Linkage::Internal);
        local.visibility = Visibility::Hidden;
        module.add_function(local).unwrap();

        let exports: ExportSet = ["kept"].into_iter().collect();
        assert_eq!(cull_visibility(&mut module, &exports), 1);
        assert_eq!(module.function("kept").unwrap().visibility, Visibility::Default);
        assert_eq!(module.function("dropped").unwrap().visibility, Visibility::Hidden);
        assert_eq!(module.function("local").unwrap().visibility, Visibility::Default);
    }
}
