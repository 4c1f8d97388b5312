//! Structural verifier.
//!
//! Checks what linking can break: every referenced symbol exists, local
//! indices and branch depths are in range, and block structure is balanced.
//! Operand-stack typing is left to the binary validator downstream.

use crate::error::{IrError, IrResult};
use crate::inst::Inst;
use crate::module::{Function, IrModule};

/// Verify every defined function of `module`.
pub fn verify(module: &IrModule) -> IrResult<()> {
    for function in module.functions() {
        verify_function(module, function)?;
    }
    for global in module.globals() {
        if let Some(init) = global.init {
            if init.ty() != global.ty {
                return Err(IrError::verify(
                    &global.name,
                    format!("initializer of type {} for {} slot", init.ty(), global.ty),
                ));
            }
        }
    }
    Ok(())
}

fn verify_function(module: &IrModule, function: &Function) -> IrResult<()> {
    let Some(body) = &function.body else {
        return Ok(());
    };
    let name = function.name.as_str();
    let local_count = (function.ty.params.len() + body.locals.len()) as u32;

    // One frame per open construct; the outermost is the function itself.
    // `true` marks an `if` frame, where `else` is allowed.
    let mut frames: Vec<bool> = vec![false];
    let mut closed = false;

    for (pc, inst) in body.insts.iter().enumerate() {
        if closed {
            return Err(IrError::verify(
                name,
                format!("instruction {pc} follows the final `end`"),
            ));
        }
        match inst {
            Inst::Block(_) | Inst::Loop(_) => frames.push(false),
            Inst::If(_) => frames.push(true),
            Inst::Else => {
                let nested = frames.len() > 1;
                match frames.last_mut() {
                    Some(is_if) if *is_if && nested => *is_if = false,
                    _ => {
                        return Err(IrError::verify(name, format!("`else` outside `if` at {pc}")))
                    }
                }
            }
            Inst::End => {
                frames.pop();
                if frames.is_empty() {
                    closed = true;
                }
            }
            Inst::Br(depth) | Inst::BrIf(depth) => {
                if *depth as usize >= frames.len() {
                    return Err(IrError::verify(
                        name,
                        format!("branch depth {depth} exceeds nesting {} at {pc}", frames.len()),
                    ));
                }
            }
            Inst::LocalGet(i) | Inst::LocalSet(i) | Inst::LocalTee(i) => {
                if *i >= local_count {
                    return Err(IrError::verify(
                        name,
                        format!("local {i} out of range ({local_count} locals) at {pc}"),
                    ));
                }
            }
            Inst::Call { callee, .. } => {
                if module.function(callee).is_none() {
                    return Err(IrError::verify(
                        name,
                        format!("call to undeclared function `{callee}`"),
                    ));
                }
            }
            Inst::GlobalGet(global) | Inst::GlobalSet(global) => {
                let Some(slot) = module.global(global) else {
                    return Err(IrError::verify(
                        name,
                        format!("reference to undeclared global `{global}`"),
                    ));
                };
                if matches!(inst, Inst::GlobalSet(_)) && !slot.mutable {
                    return Err(IrError::verify(
                        name,
                        format!("store to immutable global `{global}`"),
                    ));
                }
            }
            _ => {}
        }
    }

    if !closed {
        return Err(IrError::verify(
            name,
            format!("{} unclosed block(s)", frames.len()),
        ));
    }
    Ok(())
}
