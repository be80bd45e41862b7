use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::funcfile::{decode, encode, find_first, read_bytes, write_bytes};
use crate::{Error, Result};

pub const APP_FILE_NAMES: [&str; 3] = ["app.yaml", "app.yml", "app.json"];

/// The application manifest anchoring a multi-function tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppFile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syslog_url: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

pub fn find_app_file(dir: &Path) -> Result<PathBuf> {
    find_first(dir, &APP_FILE_NAMES).ok_or_else(|| Error::AppFileNotFound {
        dir: dir.to_path_buf(),
    })
}

pub fn parse_app_file(path: &Path) -> Result<AppFile> {
    let bytes = read_bytes(path)?;
    decode(path, &bytes)
}

/// Find and parse the app manifest in `dir`.
pub fn load_app_file(dir: &Path) -> Result<(PathBuf, AppFile)> {
    let path = find_app_file(dir)?;
    let af = parse_app_file(&path)?;
    Ok((path, af))
}

pub fn store_app_file(path: &Path, af: &AppFile) -> Result<()> {
    let bytes = encode(path, af)?;
    write_bytes(path, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_app_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = load_app_file(tmp.path()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn parses_config_and_annotations() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("app.yaml"),
            "name: myapp\nconfig:\n  DB: postgres\nannotations:\n  team: {owner: core}\n",
        )
        .unwrap();

        let (path, af) = load_app_file(tmp.path()).unwrap();
        assert_eq!(path, tmp.path().join("app.yaml"));
        assert_eq!(af.name, "myapp");
        assert_eq!(af.config["DB"], "postgres");
        assert_eq!(af.annotations["team"]["owner"], "core");
    }
}
