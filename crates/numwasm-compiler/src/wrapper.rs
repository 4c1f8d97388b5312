//! Foreign export wrappers.
//!
//! The wrapper is the externally callable entry point of a kernel,
//! named `<module>.<name>`. Its ABI:
//!
//! - an array parameter is one word: the address of a descriptor, whose
//!   fields are loaded and passed to the inner function;
//! - scalar parameters pass through unchanged;
//! - an array result is stored field by field into a fresh block of
//!   `w * (5 + 2r) + w` bytes (the final word is reserved) obtained from
//!   the target allocator, and the block address is returned;
//! - scalar results are returned directly, void returns nothing.
//!
//! The call to the inner function is marked `noinline` so the wrapper
//! boundary survives every later lowering.

use numwasm_ir::{Const, FuncType, FunctionBuilder, Inst, IrModule, IrType, Linkage};
use numwasm_types::kernel::KernelDecl;
use numwasm_types::{FunctionSignature, SemanticType};

use crate::error::CompileResult;
use crate::lower::{array_words, impl_symbol, inner_type, scalar_ir};
use crate::target::TargetConfig;

/// Type of the wrapper for `sig`.
pub fn wrapper_type(sig: &FunctionSignature, word: IrType) -> FuncType {
    let abi = |ty: &SemanticType| match ty {
        SemanticType::Scalar(s) => Some(scalar_ir(*s)),
        SemanticType::Array { .. } => Some(word),
        SemanticType::Void => None,
    };
    FuncType::new(
        sig.params().iter().filter_map(abi).collect(),
        abi(&sig.ret()).into_iter().collect(),
    )
}

/// Emit the wrapper for `decl` into `module`, under the default symbol.
pub fn emit_wrapper(
    module: &mut IrModule,
    decl: &KernelDecl,
    sig: &FunctionSignature,
    config: &TargetConfig,
) -> CompileResult<()> {
    let word = IrType::word(config.word_bits);
    let w = config.word_bytes();
    let ty = wrapper_type(sig, word);
    let mut b = FunctionBuilder::new(ty.params, ty.results);

    for (index, param) in sig.params().iter().enumerate() {
        let local = index as u32;
        match param {
            SemanticType::Array { rank, .. } => {
                for field in 0..array_words(*rank) as u32 {
                    b.extend([Inst::LocalGet(local), Inst::load(word, field * w)]);
                }
            }
            _ => {
                b.push(Inst::LocalGet(local));
            }
        }
    }

    let inner = impl_symbol(&decl.qualified_name());
    module.declare_function(&inner, inner_type(sig, word));
    b.push(Inst::call_noinline(inner));

    if let SemanticType::Array { rank, .. } = sig.ret() {
        let count = array_words(rank);
        let fields: Vec<u32> = (0..count).map(|_| b.local(word)).collect();
        for &field in fields.iter().rev() {
            b.push(Inst::LocalSet(field));
        }

        let malloc = config.malloc_symbol.clone();
        module.declare_function(&malloc, FuncType::new(vec![word], vec![word]));
        let block = b.local(word);
        let size = i64::from(w) * count as i64 + i64::from(w);
        b.extend([
            Inst::Const(Const::word(word, size)),
            Inst::call(malloc),
            Inst::LocalSet(block),
        ]);
        for (k, &field) in fields.iter().enumerate() {
            b.extend([
                Inst::LocalGet(block),
                Inst::LocalGet(field),
                Inst::store(word, k as u32 * w),
            ]);
        }
        b.push(Inst::LocalGet(block));
    }

    module.add_function(b.finish(decl.qualified_name(), Linkage::External))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use numwasm_types::ScalarType;

    #[test]
    fn wrapper_abi_collapses_arrays_to_words() {
        let sig = FunctionSignature::new(
            vec![
                SemanticType::array(ScalarType::F64, 2),
                SemanticType::Scalar(ScalarType::F32),
            ],
            SemanticType::array(ScalarType::U32, 1),
        );
        let ty = wrapper_type(&sig, IrType::I32);
        assert_eq!(ty.params, vec![IrType::I32, IrType::F32]);
        assert_eq!(ty.results, vec![IrType::I32]);

        let void = FunctionSignature::new(vec![], SemanticType::Void);
        assert!(wrapper_type(&void, IrType::I32).results.is_empty());
    }
}
