use std::path::{Component, Path};

use crate::TransferError;

/// Checks a wire-form relative path (`/`-separated) before it is sent.
///
/// Every segment must be a plain name: no empty segments (which also
/// rules out leading `/` and `//`), no `.` or `..`, and no `\` or NUL,
/// which the server would not map back onto the same tree.
pub fn validate_relative_path(wire: &str) -> Result<(), TransferError> {
    if wire.is_empty() {
        return Err(TransferError::InvalidPath("empty path".into()));
    }

    for segment in wire.split('/') {
        let problem = match segment {
            "" => "empty segment",
            "." | ".." => "dot segment",
            s if s.contains('\\') => "backslash in segment",
            s if s.contains('\0') => "NUL in segment",
            _ => continue,
        };
        return Err(TransferError::InvalidPath(format!("{problem}: {wire:?}")));
    }
    Ok(())
}

/// Converts a path relative to the upload root into its wire form.
///
/// Components are joined with `/` on every platform and `.` components
/// are dropped, so `./a\b` on Windows and `a/b` elsewhere both become `a/b`.
/// Names that are not valid UTF-8 are rejected rather than rewritten.
pub fn wire_path(relative: &Path) -> Result<String, TransferError> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let name = part.to_str().ok_or_else(|| {
                    TransferError::InvalidPath(format!("not valid UTF-8: {}", relative.display()))
                })?;
                parts.push(name);
            }
            Component::CurDir => {}
            _ => {
                return Err(TransferError::InvalidPath(format!(
                    "not a relative path: {}",
                    relative.display()
                )));
            }
        }
    }

    let joined = parts.join("/");
    validate_relative_path(&joined)?;
    Ok(joined)
}
