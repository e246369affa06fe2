//! Zip packaging of action-handler code for the function service.

use std::io::{Cursor, Write};
use std::path::Path;

use tracing::debug;

use ragstack_contracts::error::{ProvisionError, ProvisionResult};

/// A deployable zip archive holding one handler source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionPackage {
    /// Name of the file inside the archive, e.g. `index.mjs`.
    pub entry_name: String,
    pub archive: Vec<u8>,
}

impl FunctionPackage {
    /// Package in-memory source under `entry_name`.
    pub fn from_source(entry_name: &str, source: &[u8]) -> ProvisionResult<Self> {
        if entry_name.is_empty() || entry_name.contains("..") {
            return Err(ProvisionError::ConfigError {
                reason: format!("invalid archive entry name '{entry_name}'"),
            });
        }

        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            zip.start_file(entry_name, zip::write::SimpleFileOptions::default())
                .map_err(|e| packaging_error(entry_name, e))?;
            zip.write_all(source)
                .map_err(|e| packaging_error(entry_name, e))?;
            zip.finish().map_err(|e| packaging_error(entry_name, e))?;
        }

        debug!(entry = %entry_name, bytes = buf.len(), "packaged function archive");
        Ok(Self {
            entry_name: entry_name.to_string(),
            archive: buf,
        })
    }

    /// Package the file at `path`, stored under its file name.
    pub fn from_file(path: &Path) -> ProvisionResult<Self> {
        let source = std::fs::read(path).map_err(|e| ProvisionError::ConfigError {
            reason: format!("failed to read handler source '{}': {}", path.display(), e),
        })?;
        let entry_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ProvisionError::ConfigError {
                reason: format!("handler source '{}' has no file name", path.display()),
            })?;
        Self::from_source(entry_name, &source)
    }
}

fn packaging_error(entry: &str, e: impl std::fmt::Display) -> ProvisionError {
    ProvisionError::fatal("package function", format!("{entry}: {e}"))
}
