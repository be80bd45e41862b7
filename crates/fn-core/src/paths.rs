use std::path::{Path, PathBuf};

/// Resolve the directory a command operates on.
///
/// `explicit` (from `--working-dir`) wins; relative values are resolved
/// against the process working directory.
pub fn working_dir(explicit: Option<&Path>) -> crate::Result<PathBuf> {
    let cwd = std::env::current_dir().map_err(|e| crate::Error::WorkingDir {
        path: PathBuf::from("."),
        source: e,
    })?;
    Ok(match explicit {
        Some(p) if p.is_absolute() => p.to_path_buf(),
        Some(p) => cwd.join(p),
        None => cwd,
    })
}

/// Join an optional function subdirectory onto a working directory.
pub fn function_dir(wd: &Path, sub: Option<&str>) -> PathBuf {
    match sub {
        Some(s) if !s.is_empty() => wd.join(s),
        _ => wd.to_path_buf(),
    }
}

pub fn exists(path: &Path) -> bool {
    path.exists()
}

pub fn is_dir(path: &Path) -> bool {
    path.is_dir()
}

/// Base name of a directory, lowercased; used as the default function name.
pub fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// The user's home directory.
pub fn home_dir() -> crate::Result<PathBuf> {
    let base = directories::BaseDirs::new().ok_or(crate::Error::HomeDirUnavailable)?;
    Ok(base.home_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_dir_ignores_empty_sub() {
        let wd = Path::new("/work");
        assert_eq!(function_dir(wd, None), PathBuf::from("/work"));
        assert_eq!(function_dir(wd, Some("")), PathBuf::from("/work"));
        assert_eq!(function_dir(wd, Some("hello")), PathBuf::from("/work/hello"));
    }

    #[test]
    fn dir_name_is_lowercased() {
        assert_eq!(dir_name(Path::new("/tmp/MyFunc")), "myfunc");
    }

    #[test]
    fn absolute_working_dir_is_kept() {
        let wd = working_dir(Some(Path::new("/opt/fns"))).unwrap();
        assert_eq!(wd, PathBuf::from("/opt/fns"));
    }
}
