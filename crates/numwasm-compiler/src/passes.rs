//! Module passes.
//!
//! Passes run per compiled unit, in a fixed order. A target can suppress
//! any of them by name; suppressed passes never run.

use numwasm_ir::{BinaryOp, Const, Inst, IrModule};

use crate::error::CompileResult;
use crate::target::{TargetConfig, PASS_ALIGN_PROMOTE, PASS_CONST_FOLD, PASS_STRIP_DEAD};

/// A whole-module transformation.
pub trait ModulePass {
    fn name(&self) -> &'static str;

    /// Transform `module`; returns whether anything changed.
    fn run(&self, module: &mut IrModule, config: &TargetConfig) -> CompileResult<bool>;
}

/// Ordered list of passes.
pub struct PassManager {
    passes: Vec<Box<dyn ModulePass + Send + Sync>>,
}

impl PassManager {
    pub fn empty() -> Self {
        Self { passes: Vec::new() }
    }

    /// `const-fold`, `align-promote`, `strip-dead`.
    pub fn standard() -> Self {
        let mut pm = Self::empty();
        pm.add(ConstFold);
        pm.add(AlignPromote);
        pm.add(StripDead);
        pm
    }

    pub fn add(&mut self, pass: impl ModulePass + Send + Sync + 'static) {
        self.passes.push(Box::new(pass));
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run every pass not suppressed by `config`; returns the names of the
    /// passes that ran.
    pub fn run(&self, module: &mut IrModule, config: &TargetConfig) -> CompileResult<Vec<&'static str>> {
        let mut ran = Vec::new();
        for pass in &self.passes {
            if config.is_suppressed(pass.name()) {
                tracing::debug!(pass = pass.name(), module = %module.name, "pass suppressed");
                continue;
            }
            let changed = pass.run(module, config)?;
            tracing::debug!(pass = pass.name(), module = %module.name, changed, "pass ran");
            ran.push(pass.name());
        }
        Ok(ran)
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::standard()
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// const-fold
// ══════════════════════════════════════════════════════════════════════════════

/// Folds `const, const, op` triples for non-trapping integer and float ops.
pub struct ConstFold;

impl ModulePass for ConstFold {
    fn name(&self) -> &'static str {
        PASS_CONST_FOLD
    }

    fn run(&self, module: &mut IrModule, _config: &TargetConfig) -> CompileResult<bool> {
        let mut changed = false;
        for function in module.functions_mut() {
            let Some(body) = function.body.as_mut() else {
                continue;
            };
            let mut out: Vec<Inst> = Vec::with_capacity(body.insts.len());
            for inst in body.insts.drain(..) {
                if let Inst::Binary { op, .. } = inst {
                    if let [.., Inst::Const(a), Inst::Const(b)] = out.as_slice() {
                        if let Some(folded) = fold(*a, *b, op) {
                            out.truncate(out.len() - 2);
                            out.push(Inst::Const(folded));
                            changed = true;
                            continue;
                        }
                    }
                }
                out.push(inst);
            }
            body.insts = out;
        }
        Ok(changed)
    }
}

fn fold(a: Const, b: Const, op: BinaryOp) -> Option<Const> {
    Some(match (a, b) {
        (Const::I32(x), Const::I32(y)) => Const::I32(match op {
            BinaryOp::Add => x.wrapping_add(y),
            BinaryOp::Sub => x.wrapping_sub(y),
            BinaryOp::Mul => x.wrapping_mul(y),
            BinaryOp::And => x & y,
            BinaryOp::Or => x | y,
            BinaryOp::Xor => x ^ y,
            _ => return None,
        }),
        (Const::I64(x), Const::I64(y)) => Const::I64(match op {
            BinaryOp::Add => x.wrapping_add(y),
            BinaryOp::Sub => x.wrapping_sub(y),
            BinaryOp::Mul => x.wrapping_mul(y),
            BinaryOp::And => x & y,
            BinaryOp::Or => x | y,
            BinaryOp::Xor => x ^ y,
            _ => return None,
        }),
        (Const::F64(x), Const::F64(y)) => Const::F64(match op {
            BinaryOp::Add => x + y,
            BinaryOp::Sub => x - y,
            BinaryOp::Mul => x * y,
            _ => return None,
        }),
        (Const::F32(x), Const::F32(y)) => Const::F32(match op {
            BinaryOp::Add => x + y,
            BinaryOp::Sub => x - y,
            BinaryOp::Mul => x * y,
            _ => return None,
        }),
        _ => return None,
    })
}

// ══════════════════════════════════════════════════════════════════════════════
// align-promote
// ══════════════════════════════════════════════════════════════════════════════

/// Raises the alignment hint of every word-sized load and store to 8 bytes.
///
/// Correct only when words are naturally 64-bit aligned. On a 32-bit
/// layout it produces hints wider than the access itself, which the
/// sandbox rejects; the sandbox target suppresses it.
pub struct AlignPromote;

impl ModulePass for AlignPromote {
    fn name(&self) -> &'static str {
        PASS_ALIGN_PROMOTE
    }

    fn run(&self, module: &mut IrModule, config: &TargetConfig) -> CompileResult<bool> {
        let word_bytes = config.word_bytes();
        let mut changed = false;
        for function in module.functions_mut() {
            let Some(body) = function.body.as_mut() else {
                continue;
            };
            for inst in &mut body.insts {
                if let Inst::Load { bytes, mem, .. } | Inst::Store { bytes, mem, .. } = inst {
                    if *bytes == word_bytes && mem.align != 3 {
                        mem.align = 3;
                        changed = true;
                    }
                }
            }
        }
        Ok(changed)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// strip-dead
// ══════════════════════════════════════════════════════════════════════════════

/// Removes `internal`/`private` functions nothing references.
pub struct StripDead;

impl ModulePass for StripDead {
    fn name(&self) -> &'static str {
        PASS_STRIP_DEAD
    }

    fn run(&self, module: &mut IrModule, _config: &TargetConfig) -> CompileResult<bool> {
        let mut changed = false;
        loop {
            let dead: Vec<String> = module
                .functions()
                .filter(|f| f.linkage.is_restrictive())
                .filter(|f| !module.is_referenced(&f.name))
                .map(|f| f.name.clone())
                .collect();
            if dead.is_empty() {
                return Ok(changed);
            }
            for name in dead {
                module.remove_function(&name);
            }
            changed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use numwasm_ir::{DataLayout, FunctionBuilder, IrType, Linkage};

    fn module_with(insts: Vec<Inst>) -> IrModule {
        let mut b = FunctionBuilder::new(vec![], vec![IrType::I32]);
        b.extend(insts);
        let mut m = IrModule::new("m", DataLayout::WASM32);
        m.add_function(b.finish("f", Linkage::External)).unwrap();
        m
    }

    fn body(m: &IrModule) -> Vec<Inst> {
        m.function("f").unwrap().body.clone().unwrap().insts
    }

    #[test]
    fn folds_nested_constants() {
        let mut m = module_with(vec![
            Inst::i32(2),
            Inst::i32(3),
            Inst::binary(IrType::I32, BinaryOp::Add),
            Inst::i32(4),
            Inst::binary(IrType::I32, BinaryOp::Mul),
        ]);
        assert!(ConstFold.run(&mut m, &TargetConfig::wasm32()).unwrap());
        assert_eq!(body(&m), vec![Inst::i32(20), Inst::End]);
    }

    #[test]
    fn division_is_never_folded() {
        let insts = vec![
            Inst::i32(1),
            Inst::i32(0),
            Inst::binary(IrType::I32, BinaryOp::DivS),
        ];
        let mut m = module_with(insts.clone());
        assert!(!ConstFold.run(&mut m, &TargetConfig::wasm32()).unwrap());
        assert_eq!(body(&m).len(), insts.len() + 1);
    }

    #[test]
    fn suppressed_passes_do_not_run() {
        let mut m = module_with(vec![Inst::i32(0), Inst::load(IrType::I32, 0)]);
        let ran = PassManager::standard()
            .run(&mut m, &TargetConfig::wasm32())
            .unwrap();
        assert_eq!(ran, vec![PASS_CONST_FOLD, PASS_STRIP_DEAD]);
        assert_eq!(body(&m)[1], Inst::load(IrType::I32, 0));
    }

    #[test]
    fn align_promote_widens_word_access_hints() {
        let mut m = module_with(vec![Inst::i32(0), Inst::load(IrType::I32, 0)]);
        let unsuppressed = TargetConfig {
            suppressed_passes: vec![],
            ..TargetConfig::wasm32()
        };
        assert!(AlignPromote.run(&mut m, &unsuppressed).unwrap());
        let Inst::Load { mem, .. } = &body(&m)[1] else {
            panic!("expected a load");
        };
        assert_eq!(mem.align, 3);
    }

    #[test]
    fn strip_dead_keeps_external_functions() {
        let mut m = module_with(vec![Inst::i32(0)]);
        let helper = FunctionBuilder::new(vec![], vec![]).finish("helper", Linkage::Internal);
        m.add_function(helper).unwrap();
        assert!(StripDead.run(&mut m, &TargetConfig::wasm32()).unwrap());
        assert!(m.function("helper").is_none());
        assert!(m.function("f").is_some());
    }
}
