//! Depth-first discovery of function manifests under an application root.

use std::fs::FileType;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::funcfile::{is_func_file, parse_manifest, Manifest};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    /// Skip manifests whose directory has no file newer than the manifest.
    pub only_stale: bool,
}

/// Walk `root`, calling `visit` with every manifest path and its parse result.
///
/// Entries are visited in lexical order. Parse failures are handed to the
/// visitor rather than aborting the walk; an `Err` from the visitor stops it.
pub fn walk_func_files<F>(root: &Path, visit: F) -> Result<()>
where
    F: FnMut(&Path, Result<Manifest>) -> Result<()>,
{
    walk_func_files_with(root, WalkOptions::default(), visit)
}

pub fn walk_func_files_with<F>(root: &Path, opts: WalkOptions, mut visit: F) -> Result<()>
where
    F: FnMut(&Path, Result<Manifest>) -> Result<()>,
{
    walk_dir(root, opts, &mut visit)
}

fn walk_dir<F>(dir: &Path, opts: WalkOptions, visit: &mut F) -> Result<()>
where
    F: FnMut(&Path, Result<Manifest>) -> Result<()>,
{
    for (path, kind) in sorted_entries(dir)? {
        // Symlinked directories are not followed.
        if kind.is_dir() {
            walk_dir(&path, opts, visit)?;
            continue;
        }
        if !is_func_file(&path) {
            continue;
        }
        if opts.only_stale && !is_stale(&path) {
            tracing::debug!(path = %path.display(), "skipping unchanged function");
            continue;
        }
        let parsed = parse_manifest(&path);
        visit(&path, parsed)?;
    }
    Ok(())
}

fn sorted_entries(dir: &Path) -> Result<Vec<(PathBuf, FileType)>> {
    let walk_err = |e| Error::Walk {
        path: dir.to_path_buf(),
        source: e,
    };
    let mut entries = std::fs::read_dir(dir)
        .map_err(walk_err)?
        .map(|entry| entry.and_then(|e| Ok((e.path(), e.file_type()?))))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(walk_err)?;
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

/// True when any file below the manifest's directory is newer than the
/// manifest itself, or when mtimes cannot be read.
///
/// Coarse filesystem timestamps can produce false negatives.
pub fn is_stale(manifest: &Path) -> bool {
    let Some(fn_mtime) = mtime(manifest) else {
        return true;
    };
    let Some(dir) = manifest.parent() else {
        return true;
    };
    newest_below(dir).is_none_or(|newest| newest > fn_mtime)
}

fn mtime(path: &Path) -> Option<SystemTime> {
    // arch-lint: allow(no-silent-result-drop) reason="an unreadable mtime counts as stale"
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn newest_below(dir: &Path) -> Option<SystemTime> {
    let mut newest: Option<SystemTime> = None;
    // arch-lint: allow(no-silent-result-drop) reason="an unreadable directory counts as stale"
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries {
        let Ok(entry) = entry else {
            return None;
        };
        let path = entry.path();
        // arch-lint: allow(no-silent-result-drop) reason="an unreadable entry type is treated as a file"
        let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
        let candidate = if is_dir {
            newest_below(&path)
        } else {
            mtime(&path)
        };
        if let Some(t) = candidate {
            newest = Some(newest.map_or(t, |n| n.max(t)));
        }
    }
    newest
}
