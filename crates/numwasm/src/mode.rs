//! Execution mode selection.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{NumwasmError, NumwasmResult};

/// Environment variable selecting the process-wide mode.
pub const MODE_ENV: &str = "NUMWASM_MODE";

/// What a declaration turns into. Fixed at declaration time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Checked now, evaluated in-process on call.
    #[default]
    Native,
    /// Compiled for the sandbox and kept for assembly; not callable.
    TargetBuild,
    /// A stub calling the built artifact through a bridge.
    BridgeCall,
}

impl Mode {
    /// The mode named by [`MODE_ENV`], read on first use and cached for the
    /// rest of the process. Unset or empty means [`Mode::Native`].
    pub fn from_env() -> NumwasmResult<Mode> {
        static MODE: OnceLock<Result<Mode, String>> = OnceLock::new();
        MODE.get_or_init(|| {
            let raw = std::env::var(MODE_ENV).unwrap_or_default();
            let mode = raw.parse::<Mode>();
            if let Ok(mode) = &mode {
                tracing::debug!(%mode, "selected mode from {MODE_ENV}");
            }
            mode
        })
        .clone()
        .map_err(NumwasmError::Config)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::TargetBuild => "build",
            Self::BridgeCall => "bridge",
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "native" => Ok(Self::Native),
            "build" | "target_build" | "target-build" => Ok(Self::TargetBuild),
            "bridge" | "bridge_call" | "bridge-call" => Ok(Self::BridgeCall),
            other => Err(format!(
                "{MODE_ENV}={other:?} is not one of `native`, `build`, `bridge`"
            )),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
