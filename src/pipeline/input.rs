//! Input validation: make sure the user-supplied path is a PDF we are willing
//! to process before any engine or network work starts.
//!
//! Checks run cheapest first: existence, read permission and `%PDF` magic
//! bytes (one `open` + 4-byte read), then extension, then size.

use crate::error::OptimizerError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A path that passed [`validate_input`], with its size in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedInput {
    pub path: PathBuf,
    pub size: u64,
}

/// Validate a local PDF path.
pub fn validate_input(
    path: &Path,
    supported_extensions: &[&str],
    max_size: u64,
) -> Result<ValidatedInput, OptimizerError> {
    if !path.exists() {
        return Err(OptimizerError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            let read_ok = f.read_exact(&mut magic).is_ok();
            if !read_ok || &magic != b"%PDF" {
                return Err(OptimizerError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(OptimizerError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(OptimizerError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !supported_extensions.contains(&ext) {
        return Err(OptimizerError::UnsupportedExtension {
            path: path.to_path_buf(),
            expected: supported_extensions
                .iter()
                .map(|e| format!(".{e}"))
                .collect::<Vec<_>>()
                .join(", "),
        });
    }

    let size = std::fs::metadata(path)
        .map_err(|e| OptimizerError::Internal(format!("stat {}: {e}", path.display())))?
        .len();
    if size > max_size {
        return Err(OptimizerError::FileTooLarge {
            path: path.to_path_buf(),
            size,
            limit: max_size,
        });
    }

    debug!("Validated input PDF: {} ({} bytes)", path.display(), size);
    Ok(ValidatedInput {
        path: path.to_path_buf(),
        size,
    })
}
