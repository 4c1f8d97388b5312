//! Call stubs for kernels that live on the far side of the bridge.

use numwasm_types::{encode, FunctionSignature, SandboxArray, ScalarValue, SemanticType};
use tracing::warn;

use crate::bridge::{Bridge, DescriptorHandle};
use crate::error::{BridgeError, BridgeResult};
use crate::raw::RawValue;

/// An argument to a bridged call.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeArg {
    Scalar(ScalarValue),
    /// Encoded into a fresh descriptor that is freed after the call.
    Array(SandboxArray),
    /// A descriptor already in the sandbox, passed through as-is.
    Descriptor(DescriptorHandle),
}

/// The result of a bridged call.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeReturn {
    Scalar(ScalarValue),
    Array(DescriptorHandle),
    Void,
}

/// The callable stand-in for one declared kernel: its export symbol and the
/// signature used to marshal arguments and results.
///
/// Nothing is looked up until [`BridgeStub::call`].
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeStub {
    symbol: String,
    signature: FunctionSignature,
}

impl BridgeStub {
    pub fn new(symbol: impl Into<String>, signature: FunctionSignature) -> Self {
        Self {
            symbol: symbol.into(),
            signature,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    /// Encode `args`, invoke the symbol, free the argument descriptors and
    /// wrap the result.
    pub fn call<B: Bridge + ?Sized>(
        &self,
        bridge: &mut B,
        args: &[BridgeArg],
    ) -> BridgeResult<BridgeReturn> {
        if args.len() != self.signature.arity() {
            return Err(self.mismatch(format!(
                "takes {} argument(s), {} given",
                self.signature.arity(),
                args.len()
            )));
        }

        let mut raw = Vec::with_capacity(args.len());
        let mut owned = Vec::new();
        let mut marshaled = Ok(());
        for (i, (arg, ty)) in args.iter().zip(self.signature.params()).enumerate() {
            match self.marshal(bridge, i, arg, *ty) {
                Ok((value, fresh)) => {
                    raw.push(value);
                    owned.extend(fresh);
                }
                Err(e) => {
                    marshaled = Err(e);
                    break;
                }
            }
        }

        let result = marshaled.and_then(|()| bridge.invoke(&self.symbol, &raw));
        for ptr in owned {
            if let Err(e) = bridge.free(ptr) {
                warn!(symbol = %self.symbol, ptr, error = %e, "failed to free argument descriptor");
            }
        }
        self.unmarshal(result?)
    }

    /// Raw value for one argument, plus the descriptor to free afterwards.
    fn marshal<B: Bridge + ?Sized>(
        &self,
        bridge: &mut B,
        index: usize,
        arg: &BridgeArg,
        ty: SemanticType,
    ) -> BridgeResult<(RawValue, Option<u32>)> {
        match (arg, ty) {
            (BridgeArg::Scalar(v), SemanticType::Scalar(s)) if v.ty() == s => {
                Ok((RawValue::from_scalar(*v), None))
            }
            (BridgeArg::Array(a), SemanticType::Array { .. }) if !a.is_c_contiguous() => {
                Err(self.mismatch(format!(
                    "argument {} must be C-contiguous, got strides {:?} for shape {:?}",
                    index + 1,
                    a.strides,
                    a.shape
                )))
            }
            (BridgeArg::Array(a), SemanticType::Array { element, rank })
                if a.element == element && a.rank() == rank =>
            {
                let ptr = encode(bridge, a)?;
                Ok((RawValue::pointer(ptr), Some(ptr)))
            }
            (BridgeArg::Descriptor(h), SemanticType::Array { element, rank })
                if h.element == element && h.rank == rank =>
            {
                Ok((RawValue::pointer(h.ptr), None))
            }
            (arg, ty) => Err(self.mismatch(format!(
                "argument {} must be {ty}, got {}",
                index + 1,
                describe(arg)
            ))),
        }
    }

    fn unmarshal(&self, result: Option<RawValue>) -> BridgeResult<BridgeReturn> {
        match (self.signature.ret(), result) {
            (SemanticType::Void, None) => Ok(BridgeReturn::Void),
            (SemanticType::Scalar(ty), Some(raw)) => Ok(BridgeReturn::Scalar(raw.to_scalar(ty))),
            (SemanticType::Array { element, rank }, Some(RawValue::I32(ptr))) => {
                Ok(BridgeReturn::Array(DescriptorHandle {
                    ptr: ptr as u32,
                    element,
                    rank,
                }))
            }
            (ret, raw) => Err(self.mismatch(format!(
                "declared to return {ret}, returned {}",
                raw.map_or_else(|| "nothing".to_string(), |r| r.to_string())
            ))),
        }
    }

    fn mismatch(&self, message: String) -> BridgeError {
        BridgeError::Signature {
            symbol: self.symbol.clone(),
            message,
        }
    }
}

fn describe(arg: &BridgeArg) -> String {
    match arg {
        BridgeArg::Scalar(v) => v.ty().to_string(),
        BridgeArg::Array(a) => SemanticType::array(a.element, a.rank()).to_string(),
        BridgeArg::Descriptor(h) => SemanticType::array(h.element, h.rank).to_string(),
    }
}
