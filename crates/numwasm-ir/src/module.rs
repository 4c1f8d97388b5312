//! IR modules and their symbols.
//!
//! An [`IrModule`] holds two ordered symbol tables, functions and globals,
//! keyed by name. Insertion order is preserved so that serialization is
//! deterministic.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::inst::{Const, Inst, IrType};

// ══════════════════════════════════════════════════════════════════════════════
// Symbol properties
// ══════════════════════════════════════════════════════════════════════════════

/// Linkage category of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
    /// Visible to other modules.
    External,
    /// Local to the module; must keep default visibility.
    Internal,
    /// Local to the module and absent from any symbol table.
    Private,
    /// May be defined by several modules; all definitions are equivalent.
    LinkOnceOdr,
    /// Tentative zero-initialized definition.
    Common,
}

impl Linkage {
    /// `internal` and `private`: linkages that forbid non-default visibility.
    pub fn is_restrictive(self) -> bool {
        matches!(self, Self::Internal | Self::Private)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::External => "external",
            Self::Internal => "internal",
            Self::Private => "private",
            Self::LinkOnceOdr => "linkonce_odr",
            Self::Common => "common",
        }
    }
}

/// Symbol visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Default,
    Hidden,
    Protected,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Hidden => "hidden",
            Self::Protected => "protected",
        }
    }
}

/// Function attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FnAttrs {
    /// Never inline this function into its callers.
    pub noinline: bool,
    /// The returned pointer does not alias any other live pointer.
    pub noalias_return: bool,
}

/// Target data layout; only the pointer width is modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataLayout {
    pub pointer_bits: u32,
}

impl DataLayout {
    pub const WASM32: Self = Self { pointer_bits: 32 };
    pub const HOST64: Self = Self { pointer_bits: 64 };

    /// Integer type of a pointer-sized word.
    pub fn word(self) -> IrType {
        IrType::word(self.pointer_bits)
    }

    pub fn word_bytes(self) -> u32 {
        self.pointer_bits / 8
    }
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::HOST64
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Functions
// ══════════════════════════════════════════════════════════════════════════════

/// Parameter and result types. Several results are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FuncType {
    pub params: Vec<IrType>,
    pub results: Vec<IrType>,
}

impl FuncType {
    pub fn new(params: Vec<IrType>, results: Vec<IrType>) -> Self {
        Self { params, results }
    }
}

/// Locals (beyond parameters) and instructions of a defined function.
///
/// The instruction list is terminated by the function-level `end`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Body {
    pub locals: Vec<IrType>,
    pub insts: Vec<Inst>,
}

/// A function definition (`body` present) or declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub ty: FuncType,
    pub linkage: Linkage,
    pub visibility: Visibility,
    pub attrs: FnAttrs,
    pub body: Option<Body>,
}

impl Function {
    /// An external declaration of `name`.
    pub fn declaration(name: impl Into<String>, ty: FuncType) -> Self {
        Self {
            name: name.into(),
            ty,
            linkage: Linkage::External,
            visibility: Visibility::Default,
            attrs: FnAttrs::default(),
            body: None,
        }
    }

    pub fn is_definition(&self) -> bool {
        self.body.is_some()
    }

    /// Type of local `index` (parameters first).
    pub fn local_type(&self, index: u32) -> Option<IrType> {
        let index = index as usize;
        let params = self.ty.params.len();
        if index < params {
            return Some(self.ty.params[index]);
        }
        self.body.as_ref()?.locals.get(index - params).copied()
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Globals
// ══════════════════════════════════════════════════════════════════════════════

/// A module-level storage slot. `init` present means defined.
#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub name: String,
    pub ty: IrType,
    pub mutable: bool,
    pub linkage: Linkage,
    pub visibility: Visibility,
    pub init: Option<Const>,
}

impl Global {
    /// An external declaration of a mutable slot.
    pub fn declaration(name: impl Into<String>, ty: IrType) -> Self {
        Self {
            name: name.into(),
            ty,
            mutable: true,
            linkage: Linkage::External,
            visibility: Visibility::Default,
            init: None,
        }
    }

    pub fn is_definition(&self) -> bool {
        self.init.is_some()
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// IrModule
// ══════════════════════════════════════════════════════════════════════════════

/// A named collection of functions and globals for one data layout.
#[derive(Debug, Clone, PartialEq)]
pub struct IrModule {
    pub name: String,
    pub layout: DataLayout,
    functions: IndexMap<String, Function>,
    globals: IndexMap<String, Global>,
}

impl IrModule {
    pub fn new(name: impl Into<String>, layout: DataLayout) -> Self {
        Self {
            name: name.into(),
            layout,
            functions: IndexMap::new(),
            globals: IndexMap::new(),
        }
    }

    // ── Functions ────────────────────────────────────────────────────────

    /// Add a function. Fails if a function or global of that name exists.
    pub fn add_function(&mut self, function: Function) -> IrResult<()> {
        if self.contains(&function.name) {
            return Err(IrError::DuplicateSymbol(function.name));
        }
        self.functions.insert(function.name.clone(), function);
        Ok(())
    }

    /// Declare `name` unless a function of that name already exists.
    pub fn declare_function(&mut self, name: &str, ty: FuncType) {
        if !self.functions.contains_key(name) {
            self.functions
                .insert(name.to_string(), Function::declaration(name, ty));
        }
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.get_mut(name)
    }

    /// Replace an existing entry in place, keeping its position.
    pub fn replace_function(&mut self, function: Function) -> IrResult<()> {
        match self.functions.get_mut(&function.name) {
            Some(slot) => {
                *slot = function;
                Ok(())
            }
            None => Err(IrError::UnknownSymbol(function.name)),
        }
    }

    pub fn remove_function(&mut self, name: &str) -> Option<Function> {
        self.functions.shift_remove(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    pub fn functions_mut(&mut self) -> impl Iterator<Item = &mut Function> {
        self.functions.values_mut()
    }

    // ── Globals ──────────────────────────────────────────────────────────

    pub fn add_global(&mut self, global: Global) -> IrResult<()> {
        if self.contains(&global.name) {
            return Err(IrError::DuplicateSymbol(global.name));
        }
        self.globals.insert(global.name.clone(), global);
        Ok(())
    }

    /// Declare a mutable slot `name` of type `ty` unless it already exists.
    pub fn declare_global(&mut self, name: &str, ty: IrType) {
        if !self.globals.contains_key(name) {
            self.globals
                .insert(name.to_string(), Global::declaration(name, ty));
        }
    }

    pub fn global(&self, name: &str) -> Option<&Global> {
        self.globals.get(name)
    }

    pub fn global_mut(&mut self, name: &str) -> Option<&mut Global> {
        self.globals.get_mut(name)
    }

    pub fn globals(&self) -> impl Iterator<Item = &Global> {
        self.globals.values()
    }

    pub fn globals_mut(&mut self) -> impl Iterator<Item = &mut Global> {
        self.globals.values_mut()
    }

    // ── Symbols ──────────────────────────────────────────────────────────

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name) || self.globals.contains_key(name)
    }

    /// Names of every defined function and global, in table order.
    pub fn defined_symbols(&self) -> Vec<String> {
        self.functions
            .values()
            .filter(|f| f.is_definition())
            .map(|f| f.name.clone())
            .chain(
                self.globals
                    .values()
                    .filter(|g| g.is_definition())
                    .map(|g| g.name.clone()),
            )
            .collect()
    }

    /// Names of functions and globals that are declared but never defined.
    pub fn undefined_symbols(&self) -> Vec<String> {
        self.functions
            .values()
            .filter(|f| !f.is_definition())
            .map(|f| f.name.clone())
            .chain(
                self.globals
                    .values()
                    .filter(|g| !g.is_definition())
                    .map(|g| g.name.clone()),
            )
            .collect()
    }

    /// Rename symbol `from` to `to`, rewriting every reference.
    ///
    /// The entry keeps its table position.
    pub fn rename(&mut self, from: &str, to: &str) -> IrResult<()> {
        if from == to {
            return Ok(());
        }
        if self.contains(to) {
            return Err(IrError::DuplicateSymbol(to.to_string()));
        }
        if let Some(index) = self.functions.get_index_of(from) {
            let mut entries: Vec<(String, Function)> = self.functions.drain(..).collect();
            entries[index].0 = to.to_string();
            entries[index].1.name = to.to_string();
            self.functions = entries.into_iter().collect();
        } else if let Some(index) = self.globals.get_index_of(from) {
            let mut entries: Vec<(String, Global)> = self.globals.drain(..).collect();
            entries[index].0 = to.to_string();
            entries[index].1.name = to.to_string();
            self.globals = entries.into_iter().collect();
        } else {
            return Err(IrError::UnknownSymbol(from.to_string()));
        }

        for function in self.functions.values_mut() {
            let Some(body) = function.body.as_mut() else {
                continue;
            };
            for inst in &mut body.insts {
                if let Some(symbol) = inst.symbol_mut() {
                    if symbol == from {
                        *symbol = to.to_string();
                    }
                }
            }
        }
        Ok(())
    }

    /// Whether any function body references `name`.
    pub fn is_referenced(&self, name: &str) -> bool {
        self.functions
            .values()
            .filter_map(|f| f.body.as_ref())
            .flat_map(|b| b.insts.iter())
            .any(|i| i.symbol() == Some(name))
    }
}
