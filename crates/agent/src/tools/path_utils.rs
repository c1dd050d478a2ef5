//! Path validation for writes under the output root

use std::path::{Component, Path, PathBuf};

/// Resolve `path` against `root`, rejecting anything that escapes it.
///
/// Relative paths are joined to `root`. Absolute paths are accepted only
/// when they already lie under `root`. `..` components are resolved
/// lexically, so the target need not exist yet.
pub fn resolve_output_path(path: &str, root: &Path) -> Result<PathBuf, String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err("empty path".to_string());
    }

    let root = normalize(&absolute(root));
    let candidate = Path::new(trimmed);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };
    let resolved = normalize(&joined);

    if resolved == root || !resolved.starts_with(&root) {
        return Err(format!(
            "path {} is outside output directory {}",
            trimmed,
            root.display()
        ));
    }
    Ok(resolved)
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
