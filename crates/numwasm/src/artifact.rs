//! Build artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use numwasm_codegen::emit::COMPILER_VERSION;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{NumwasmError, NumwasmResult};

/// Extension of the IR text file.
pub const IR_EXTENSION: &str = "nwir";

/// What a build produced, for the external toolchain and for auditing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub compiler_version: String,
    /// Externally callable function symbols, in module order.
    pub exports: Vec<String>,
    /// Global slots materialized in the module.
    pub globals: Vec<String>,
    /// Lowercase hex SHA-256 of the IR text.
    pub ir_sha256: String,
    /// Lowercase hex SHA-256 of the wasm binary.
    pub wasm_sha256: String,
}

/// The linked module as IR text and as a wasm32 binary, plus its manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub ir_text: String,
    pub wasm: Vec<u8>,
    pub manifest: Manifest,
}

impl BuildArtifact {
    pub fn new(
        name: impl Into<String>,
        ir_text: String,
        wasm: Vec<u8>,
        exports: Vec<String>,
        globals: Vec<String>,
    ) -> Self {
        let manifest = Manifest {
            name: name.into(),
            compiler_version: COMPILER_VERSION.to_string(),
            exports,
            globals,
            ir_sha256: sha256_hex(ir_text.as_bytes()),
            wasm_sha256: sha256_hex(&wasm),
        };
        Self {
            ir_text,
            wasm,
            manifest,
        }
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn manifest_json(&self) -> NumwasmResult<String> {
        Ok(serde_json::to_string_pretty(&self.manifest)?)
    }

    /// Write `<name>.nwir`, `<name>.wasm` and `<name>.json` into `dir`,
    /// creating it if needed. Returns the written paths in that order.
    pub fn write_to(&self, dir: &Path) -> NumwasmResult<Vec<PathBuf>> {
        fs::create_dir_all(dir).map_err(|source| NumwasmError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let manifest = self.manifest_json()?;
        let files: [(&str, &[u8]); 3] = [
            (IR_EXTENSION, self.ir_text.as_bytes()),
            ("wasm", &self.wasm),
            ("json", manifest.as_bytes()),
        ];

        let mut written = Vec::with_capacity(files.len());
        for (extension, contents) in files {
            let path = dir.join(format!("{}.{extension}", self.name()));
            fs::write(&path, contents).map_err(|source| NumwasmError::Io {
                path: path.clone(),
                source,
            })?;
            written.push(path);
        }
        tracing::info!(name = %self.name(), dir = %dir.display(), "wrote build artifact");
        Ok(written)
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digests_are_lowercase_hex() {
        let artifact = BuildArtifact::new("m", String::new(), Vec::new(), vec![], vec![]);
        assert_eq!(
            artifact.manifest.wasm_sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(artifact.manifest.ir_sha256, artifact.manifest.wasm_sha256);
    }
}
