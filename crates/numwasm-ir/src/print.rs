//! Textual serialization of IR modules.
//!
//! The text form is the build artifact handed to external tooling. It is a
//! pure function of the module: equal modules always print identically.
//!
//! ```text
//! ; module example_module
//! target datalayout = "p:32"
//!
//! @"__nw_heap_ptr" = internal default global mut i32 1024
//! declare external default i32 @"malloc"(i32)
//! define external default f64 @"example_module.square"(f64) {
//!   local.get 0
//!   ...
//! }
//! ```

use std::fmt;

use crate::inst::Inst;
use crate::module::{DataLayout, FnAttrs, Function, Global, IrModule};

impl fmt::Display for DataLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p:{}", self.pointer_bits)
    }
}

impl fmt::Display for FnAttrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.noinline {
            f.write_str(" noinline")?;
        }
        if self.noalias_return {
            f.write_str(" noalias")?;
        }
        Ok(())
    }
}

impl fmt::Display for Global {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@\"{}\" = {} {} global{} {}",
            self.name,
            self.linkage.as_str(),
            self.visibility.as_str(),
            if self.mutable { " mut" } else { "" },
            self.ty
        )?;
        match &self.init {
            Some(init) => write!(f, " {init}"),
            None => f.write_str(" external"),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = if self.is_definition() { "define" } else { "declare" };
        write!(
            f,
            "{keyword} {} {} ",
            self.linkage.as_str(),
            self.visibility.as_str()
        )?;
        match self.ty.results.as_slice() {
            [] => f.write_str("void")?,
            [one] => write!(f, "{one}")?,
            many => {
                f.write_str("{")?;
                write_list(f, many)?;
                f.write_str("}")?;
            }
        }
        write!(f, " @\"{}\"(", self.name)?;
        write_list(f, &self.ty.params)?;
        write!(f, "){}", self.attrs)?;

        let Some(body) = &self.body else {
            return Ok(());
        };
        f.write_str(" {\n")?;
        if !body.locals.is_empty() {
            f.write_str("  locals ")?;
            write_list(f, &body.locals)?;
            f.write_str("\n")?;
        }
        let mut depth = 1usize;
        for inst in &body.insts {
            if matches!(inst, Inst::End | Inst::Else) {
                depth = depth.saturating_sub(1);
            }
            // The function-level `end` is implied by the closing brace.
            if depth == 0 {
                break;
            }
            writeln!(f, "{:indent$}{inst}", "", indent = depth * 2)?;
            if inst.opens_block() || matches!(inst, Inst::Else) {
                depth += 1;
            }
        }
        f.write_str("}")
    }
}

impl fmt::Display for IrModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; module {}", self.name)?;
        writeln!(f, "target datalayout = \"{}\"", self.layout)?;
        if self.globals().next().is_some() {
            writeln!(f)?;
        }
        for global in self.globals() {
            writeln!(f, "{global}")?;
        }
        for function in self.functions() {
            writeln!(f)?;
            writeln!(f, "{function}")?;
        }
        Ok(())
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}
