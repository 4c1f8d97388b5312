//! Build configuration.

use numwasm_compiler::TargetConfig;
use serde::{Deserialize, Serialize};

use crate::error::{NumwasmError, NumwasmResult};

/// How a session builds its artifact.
///
/// Every field has a default, so `{}` is a valid configuration:
///
/// ```
/// let config = numwasm::BuildConfig::from_json(r#"{ "name": "kernels" }"#).unwrap();
/// assert_eq!(config.name, "kernels");
/// assert_eq!(config.target.word_bits, 32);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Module name; also the stem of every written artifact file.
    pub name: String,
    pub target: TargetConfig,
    /// Symbols kept visible in addition to the runtime and the declared
    /// kernels.
    pub exports: Vec<String>,
}

impl BuildConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> NumwasmResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> NumwasmResult<()> {
        if self.name.is_empty() || self.name.contains(['/', '\\']) {
            return Err(NumwasmError::Config(format!(
                "module name {:?} is not a file stem",
                self.name
            )));
        }
        self.target.validate()?;
        Ok(())
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            name: "numwasm_module".into(),
            target: TargetConfig::wasm32(),
            exports: Vec::new(),
        }
    }
}
