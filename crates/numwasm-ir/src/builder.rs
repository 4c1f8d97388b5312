//! Incremental construction of function bodies.

use crate::inst::{Inst, IrType};
use crate::module::{Body, FnAttrs, FuncType, Function, Linkage, Visibility};

/// Accumulates locals and instructions for one function.
///
/// Parameters occupy local indices `0..params.len()`; [`local`](Self::local)
/// hands out the following indices.
#[derive(Debug, Clone)]
pub struct FunctionBuilder {
    ty: FuncType,
    locals: Vec<IrType>,
    insts: Vec<Inst>,
    attrs: FnAttrs,
}

impl FunctionBuilder {
    pub fn new(params: Vec<IrType>, results: Vec<IrType>) -> Self {
        Self {
            ty: FuncType::new(params, results),
            locals: Vec::new(),
            insts: Vec::new(),
            attrs: FnAttrs::default(),
        }
    }

    pub fn param_count(&self) -> u32 {
        self.ty.params.len() as u32
    }

    pub fn results(&self) -> &[IrType] {
        &self.ty.results
    }

    /// Allocate a fresh local of type `ty`; returns its index.
    pub fn local(&mut self, ty: IrType) -> u32 {
        self.locals.push(ty);
        self.param_count() + self.locals.len() as u32 - 1
    }

    /// Type of local `index` (parameters first).
    pub fn local_type(&self, index: u32) -> Option<IrType> {
        let params = self.ty.params.len();
        let index = index as usize;
        if index < params {
            Some(self.ty.params[index])
        } else {
            self.locals.get(index - params).copied()
        }
    }

    pub fn push(&mut self, inst: Inst) -> &mut Self {
        self.insts.push(inst);
        self
    }

    pub fn extend(&mut self, insts: impl IntoIterator<Item = Inst>) -> &mut Self {
        self.insts.extend(insts);
        self
    }

    pub fn attrs(&mut self, attrs: FnAttrs) -> &mut Self {
        self.attrs = attrs;
        self
    }

    /// Close the body with the function-level `end` and produce a definition.
    pub fn finish(mut self, name: impl Into<String>, linkage: Linkage) -> Function {
        self.insts.push(Inst::End);
        Function {
            name: name.into(),
            ty: self.ty,
            linkage,
            visibility: Visibility::Default,
            attrs: self.attrs,
            body: Some(Body {
                locals: self.locals,
                insts: self.insts,
            }),
        }
    }
}
