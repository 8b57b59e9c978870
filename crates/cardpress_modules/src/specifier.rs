//! Import specifier resolution.
//!
//! A specifier is resolved relative to the importing module's directory.
//! Candidates are tried in a fixed order and the first regular file wins:
//!
//! 1. `<spec>.ts`
//! 2. `<spec>` verbatim
//! 3. `<spec>/index.ts`

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::escape::unescape_js;

/// File extension of source modules.
pub const MODULE_EXTENSION: &str = "ts";

const INDEX_FILE: &str = "index.ts";

/// Interface-only locations carry types, never runtime values.
const INTERFACE_MARKER: &str = "/interfaces";

/// Outcome of resolving one specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A module file that provides the binding.
    Resolved(PathBuf),
    /// Interface-only import; nothing to bind.
    NoBinding,
    /// No candidate exists. The import is dropped.
    Unresolved,
}

/// Decode a raw specifier (the text between its quotes).
pub fn decode_specifier(raw: &str) -> Result<String, String> {
    unescape_js(raw)
}

/// Resolve `specifier` as written inside the module at `importer`.
pub fn resolve(importer: &Path, specifier: &str) -> Resolution {
    if specifier.contains(INTERFACE_MARKER) {
        return Resolution::NoBinding;
    }

    let dir = importer.parent().unwrap_or_else(|| Path::new(""));
    let base = normalize(&dir.join(specifier));

    let mut with_extension = OsString::from(base.as_os_str());
    with_extension.push(".");
    with_extension.push(MODULE_EXTENSION);

    let candidates = [PathBuf::from(with_extension), base.clone(), base.join(INDEX_FILE)];
    candidates
        .into_iter()
        .find(|candidate| candidate.is_file())
        .map(Resolution::Resolved)
        .unwrap_or(Resolution::Unresolved)
}

/// Lexically fold `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
