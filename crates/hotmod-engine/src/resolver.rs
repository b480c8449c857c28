//! Module path resolution
//!
//! Resolution is a pure function of `(reference, base_dir)`: callers name
//! the directory relative references are resolved against.

use hotmod_kernel::{HotImportError, HotImportResult};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Turns module references into canonical absolute paths
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    /// Extensions tried for references without one
    extensions: Vec<String>,
}

impl PathResolver {
    pub fn new(extensions: Vec<String>) -> Self {
        Self { extensions }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Resolve `reference` against `base_dir`.
    ///
    /// Absolute references ignore `base_dir`. Relative references need an
    /// absolute `base_dir`. The result is lexically normalised.
    pub fn resolve(&self, reference: &Path, base_dir: Option<&Path>) -> HotImportResult<PathBuf> {
        if reference.as_os_str().is_empty() {
            return Err(HotImportError::PathResolution {
                reference: reference.to_path_buf(),
                reason: "empty reference".to_string(),
            });
        }

        if reference.is_absolute() {
            return Ok(normalize(reference));
        }

        let base = base_dir.ok_or_else(|| HotImportError::PathResolution {
            reference: reference.to_path_buf(),
            reason: "no base directory for a relative reference".to_string(),
        })?;

        if !base.is_absolute() {
            return Err(HotImportError::PathResolution {
                reference: reference.to_path_buf(),
                reason: format!("base directory {} is not absolute", base.display()),
            });
        }

        let resolved = normalize(&base.join(reference));
        debug!("Resolved {:?} against {:?} -> {:?}", reference, base, resolved);
        Ok(resolved)
    }

    /// Resolve, then try the configured extensions when the path does not
    /// exist and carries no extension (`./answer` -> `/base/answer.rhai`).
    pub fn resolve_module(
        &self,
        reference: &Path,
        base_dir: Option<&Path>,
    ) -> HotImportResult<PathBuf> {
        let resolved = self.resolve(reference, base_dir)?;
        if resolved.exists() || resolved.extension().is_some() {
            return Ok(resolved);
        }

        for ext in &self.extensions {
            let candidate = resolved.with_extension(ext);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        Ok(resolved)
    }
}

/// Lexically remove `.` and `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // never climb above the root
                if !matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
