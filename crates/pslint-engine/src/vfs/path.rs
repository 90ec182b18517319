//! Lexical path handling.

use std::path::{Component, Path, PathBuf};

/// Normalize a path: drop `.`, apply `..` against preceding components.
///
/// `..` at the root stays at the root; leading `..` on a relative path is kept.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => result.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match result.components().next_back() {
                Some(Component::Normal(_)) => {
                    result.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => result.push(".."),
            },
            Component::Normal(name) => result.push(name),
        }
    }
    result
}

/// Make a path absolute against the process working directory, then normalize it.
///
/// Scripts find their includes through `$PSScriptRoot`, which is only
/// meaningful for an absolute path.
pub fn absolute(path: &Path) -> PathBuf {
    match std::path::absolute(path) {
        Ok(path) => normalize(&path),
        Err(_) => normalize(path),
    }
}

/// Resolve a script-relative target against the directory of the file that names it.
///
/// Backslashes are treated as separators so Windows-style scripts resolve on
/// any host.
pub fn resolve(base_dir: &Path, target: &str) -> PathBuf {
    let target = target.replace('\\', "/");
    let target = Path::new(&target);
    if target.is_absolute() {
        normalize(target)
    } else {
        normalize(&base_dir.join(target))
    }
}
