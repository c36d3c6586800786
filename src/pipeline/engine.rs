//! Locating and binding the pdfium shared library.
//!
//! Search order, first successful bind wins:
//!
//! 1. `PDFIUM_LIB_PATH` (either the library file itself or its directory)
//! 2. `./`, `./pdfium/lib/`, `./pdfium/bin/`, `./lib/`
//! 3. `<user cache dir>/pdf-optimizer/pdfium/`
//! 4. the system library search path
//!
//! Every failed candidate is logged at debug level; only when all of them
//! fail is [`OptimizerError::PdfiumBindingFailed`] returned, carrying the
//! list of places that were tried.

use crate::error::OptimizerError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable pointing at a pdfium library file or directory.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Where a library candidate came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryCandidate {
    /// An explicit library file.
    File(PathBuf),
    /// A directory expected to contain the platform library name.
    Dir(PathBuf),
}

impl LibraryCandidate {
    /// Full path of the library this candidate refers to.
    pub fn library_path(&self) -> PathBuf {
        match self {
            LibraryCandidate::File(p) => p.clone(),
            LibraryCandidate::Dir(d) => {
                PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(d))
            }
        }
    }
}

/// Per-user cache location for a downloaded library.
pub fn pdfium_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .map(|base| base.join("pdf-optimizer").join("pdfium"))
}

/// Ordered candidate list, not including the system fallback.
pub fn library_candidates(env_override: Option<&Path>) -> Vec<LibraryCandidate> {
    let mut out = Vec::new();

    if let Some(p) = env_override {
        if p.is_dir() {
            out.push(LibraryCandidate::Dir(p.to_path_buf()));
        } else {
            out.push(LibraryCandidate::File(p.to_path_buf()));
        }
    }

    for dir in ["./", "./pdfium/lib/", "./pdfium/bin/", "./lib/"] {
        out.push(LibraryCandidate::Dir(PathBuf::from(dir)));
    }

    if let Some(cache) = pdfium_cache_dir() {
        out.push(LibraryCandidate::Dir(cache));
    }

    out
}

/// Bind pdfium, trying each candidate in turn and then the system library.
pub fn bind_pdfium() -> Result<Pdfium, OptimizerError> {
    let env_override = std::env::var_os(PDFIUM_LIB_PATH_ENV).map(PathBuf::from);
    let mut tried = Vec::new();

    for candidate in library_candidates(env_override.as_deref()) {
        let lib = candidate.library_path();
        if !lib.exists() {
            tried.push(format!("{} (missing)", lib.display()));
            continue;
        }
        match Pdfium::bind_to_library(&lib) {
            Ok(bindings) => {
                info!("Bound pdfium from {}", lib.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => {
                debug!("pdfium bind failed for {}: {:?}", lib.display(), e);
                tried.push(format!("{} ({:?})", lib.display(), e));
            }
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => {
            info!("Bound system pdfium library");
            Ok(Pdfium::new(bindings))
        }
        Err(e) => {
            tried.push(format!("system library ({e:?})"));
            Err(OptimizerError::PdfiumBindingFailed(format!(
                "tried: {}",
                tried.join("; ")
            )))
        }
    }
}
