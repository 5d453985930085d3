//! Turning a module specifier into a file on disk.

use std::env;
use std::path::{Component, Path, PathBuf};

use tracing::warn;

use crate::runner::module::ModuleType;

/// Directory a referrer's relative specifiers are resolved against.
pub fn base_directory(base_filename: &Path) -> PathBuf {
    match base_filename.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Join `specifier` onto `base` and normalise the result lexically. Symlinks
/// are not followed.
pub fn absolute_path(base: &Path, specifier: &str) -> PathBuf {
    let joined = base.join(specifier);
    let rooted = if joined.is_absolute() {
        joined
    } else {
        let cwd = env::current_dir().unwrap_or_else(|error| {
            warn!(%error, specifier, "cannot read the working directory, resolving from /");
            PathBuf::from("/")
        });
        cwd.join(joined)
    };
    normalize(&rooted)
}

fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                result.pop();
            }
            other => result.push(other.as_os_str()),
        }
    }
    result
}

/// Apply extension resolution: the literal path, then the path plus each
/// extension for `module_type`, then `index.<ext>` inside a directory. A path
/// that matches nothing is returned unchanged so opening it reports the error.
pub fn resolve_module_filename(filename: &Path, module_type: ModuleType) -> PathBuf {
    let extensions = module_type.extensions();
    if !filename.exists() {
        for extension in extensions {
            let mut candidate = filename.as_os_str().to_owned();
            candidate.push(".");
            candidate.push(extension);
            let candidate = PathBuf::from(candidate);
            if candidate.exists() {
                return candidate;
            }
        }
    } else if filename.is_dir() {
        for extension in extensions {
            let candidate = filename.join(format!("index.{}", extension));
            if candidate.exists() {
                return candidate;
            }
        }
    }
    filename.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn normalizes_parent_and_current_components() {
        let base = Path::new("/srv/app/lib");
        assert_eq!(absolute_path(base, "./a.js"), PathBuf::from("/srv/app/lib/a.js"));
        assert_eq!(absolute_path(base, "../b/../c.js"), PathBuf::from("/srv/app/c.js"));
        assert_eq!(absolute_path(base, "/etc/x.mjs"), PathBuf::from("/etc/x.mjs"));
    }

    #[test]
    fn base_directory_of_bare_filename_is_cwd() {
        assert_eq!(base_directory(Path::new("main.js")), PathBuf::from("."));
        assert_eq!(base_directory(Path::new("/a/b/main.js")), PathBuf::from("/a/b"));
    }

    #[test]
    fn literal_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("dep");
        fs::write(&file, "").unwrap();
        fs::write(dir.path().join("dep.js"), "").unwrap();
        assert_eq!(resolve_module_filename(&file, ModuleType::SourceText), file);
    }

    #[test]
    fn js_is_tried_before_mjs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("dep.js"), "").unwrap();
        fs::write(dir.path().join("dep.mjs"), "").unwrap();
        assert_eq!(
            resolve_module_filename(&dir.path().join("dep"), ModuleType::SourceText),
            dir.path().join("dep.js")
        );

        fs::write(dir.path().join("only.mjs"), "").unwrap();
        assert_eq!(
            resolve_module_filename(&dir.path().join("only"), ModuleType::SourceText),
            dir.path().join("only.mjs")
        );
    }

    #[test]
    fn json_type_only_tries_json() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("data.js"), "").unwrap();
        fs::write(dir.path().join("data.json"), "{}").unwrap();
        assert_eq!(
            resolve_module_filename(&dir.path().join("data"), ModuleType::Json),
            dir.path().join("data.json")
        );
    }

    #[test]
    fn directory_index_beats_sibling_file() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("pkg");
        fs::create_dir(&pkg).unwrap();
        fs::write(pkg.join("index.mjs"), "").unwrap();
        fs::write(dir.path().join("pkg.js"), "").unwrap();
        assert_eq!(resolve_module_filename(&pkg, ModuleType::SourceText), pkg.join("index.mjs"));
    }

    #[test]
    fn unresolvable_path_is_returned_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert_eq!(resolve_module_filename(&missing, ModuleType::SourceText), missing);
    }
}
