//! Upgrade of legacy manifests to `schema_version: 20180708`.

use std::path::{Path, PathBuf};

use crate::funcfile::{
    decode, find_func_file, read_bytes, store_func_file, write_bytes, FuncFile, FuncFileV1,
    Trigger, LATEST_SCHEMA_VERSION,
};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migrated {
    pub path: PathBuf,
    pub backup: PathBuf,
}

pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}

/// Convert a legacy record. The route `path` and `cpus` have no counterpart
/// and are dropped; a single HTTP trigger named after the function replaces
/// the route.
pub fn upgrade(v1: FuncFileV1) -> FuncFile {
    let trigger = Trigger::http(&v1.name, &v1.name);
    FuncFile {
        schema_version: LATEST_SCHEMA_VERSION,
        name: v1.name,
        version: v1.version,
        runtime: v1.runtime,
        build_image: v1.build_image,
        run_image: v1.run_image,
        cmd: v1.cmd,
        entrypoint: v1.entrypoint,
        content_type: v1.content_type,
        kind: v1.kind,
        memory: v1.memory,
        timeout: v1.timeout,
        idle_timeout: v1.idle_timeout,
        config: v1.config,
        annotations: v1.annotations,
        build: v1.build,
        expects: v1.expects,
        triggers: vec![trigger],
        tests: v1.tests,
        extra: v1.extra,
    }
}

/// Migrate the manifest found in `dir`.
///
/// The original bytes are written to `<manifest>.bak` before anything else.
/// If the upgraded record fails schema validation the manifest is left
/// untouched and the backup stays behind.
pub fn migrate_dir(dir: &Path) -> Result<Migrated> {
    let path = find_func_file(dir)?;
    migrate_file(&path)
}

pub fn migrate_file(path: &Path) -> Result<Migrated> {
    let bytes = read_bytes(path)?;
    let generic: serde_json::Value = decode(path, &bytes)?;
    if generic.get("schema_version").is_some() {
        return Err(Error::AlreadyMigrated {
            path: path.to_path_buf(),
        });
    }

    let backup = backup_path(path);
    write_bytes(&backup, &bytes)?;
    tracing::debug!(backup = %backup.display(), "wrote manifest backup");

    let v1: FuncFileV1 = decode(path, &bytes)?;
    let ff = upgrade(v1);

    let projection = serde_json::to_value(&ff).map_err(|e| Error::ManifestJson {
        path: path.to_path_buf(),
        source: e,
    })?;
    crate::schema::validate_func_file(&projection)?;

    store_func_file(path, &ff)?;
    Ok(Migrated {
        path: path.to_path_buf(),
        backup,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_appends_suffix() {
        assert_eq!(
            backup_path(Path::new("/w/func.yaml")),
            PathBuf::from("/w/func.yaml.bak")
        );
    }

    #[test]
    fn upgrade_drops_route_and_adds_trigger() {
        let v1 = FuncFileV1 {
            name: "hello".into(),
            version: "0.0.1".into(),
            runtime: "go".into(),
            path: "/hello".into(),
            cpus: "100m".into(),
            ..Default::default()
        };
        let ff = upgrade(v1);
        assert_eq!(ff.schema_version, LATEST_SCHEMA_VERSION);
        assert_eq!(ff.triggers, vec![Trigger::http("hello", "/hello")]);
        assert!(!ff.extra.contains_key("path"));
    }
}
