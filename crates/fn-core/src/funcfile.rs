//! Function manifests (`func.yaml`, `func.yml`, `func.json`).
//!
//! Two schemas exist on disk. Files carrying `schema_version: 20180708`
//! decode into [`FuncFile`]; files without a schema version are the legacy
//! layout and decode into [`FuncFileV1`]. [`Manifest`] wraps whichever one
//! was found.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const FUNC_FILE_NAMES: [&str; 3] = ["func.yaml", "func.yml", "func.json"];

pub const LATEST_SCHEMA_VERSION: u32 = 20180708;

pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

pub const DEFAULT_TIMEOUT: i32 = 30;

/// Encoding selected from a manifest's file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Ok(Format::Yaml),
            Some("json") => Ok(Format::Json),
            _ => Err(Error::UnexpectedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
}

impl Trigger {
    /// The HTTP trigger synthesized for a function that had a legacy route.
    pub fn http(fn_name: &str, source: &str) -> Self {
        Self {
            name: fn_name.to_owned(),
            kind: "http".to_owned(),
            source: normalize_source(source),
        }
    }
}

/// Prefix `source` with `/` unless it already has one.
pub fn normalize_source(source: &str) -> String {
    if source.starts_with('/') {
        source.to_owned()
    } else {
        format!("/{source}")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectedConfig {
    pub name: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Expects {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config: Vec<ExpectedConfig>,
}

impl Expects {
    pub fn is_empty(&self) -> bool {
        self.config.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputMap {
    #[serde(default)]
    pub body: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputMap {
    #[serde(default)]
    pub body: serde_json::Value,
}

/// One declared input/output pair for `fn test`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FnTest {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<InputMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

/// A `schema_version: 20180708` function manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuncFile {
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub runtime: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub build_image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub run_image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cmd: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entrypoint: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub memory: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout: Option<i32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build: Vec<String>,
    #[serde(default, skip_serializing_if = "Expects::is_empty")]
    pub expects: Expects,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<Trigger>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<FnTest>,
    /// Keys this version of the CLI does not know about, kept for round-trip.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl FuncFile {
    /// Full image reference for this function, `[registry/]name[:version]`.
    pub fn image_name(&self, registry: Option<&str>) -> String {
        crate::image::image_name(&self.name, &self.version, registry)
    }

    /// Split `runtime` on its first `:` into language and tag.
    pub fn runtime_tag(&self) -> (&str, &str) {
        runtime_tag(&self.runtime)
    }

    pub fn first_http_trigger(&self) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.kind == "http")
    }

    pub fn content_type_or_default(&self) -> &str {
        if self.content_type.is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            &self.content_type
        }
    }

    /// Reject names the remote side or the image grammar cannot carry.
    pub fn validate_name(name: &str) -> Result<()> {
        if name.contains(':') {
            return Err(Error::NameHasColon);
        }
        if name.to_lowercase() != name {
            return Err(Error::NameNotLowercase);
        }
        Ok(())
    }
}

/// A legacy function manifest (no `schema_version`, route `path` instead of
/// triggers).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuncFileV1 {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub runtime: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entrypoint: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<FnTest>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub build_image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub run_image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub memory: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cpus: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout: Option<i32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Expects::is_empty")]
    pub expects: Expects,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl FuncFileV1 {
    pub fn image_name(&self, registry: Option<&str>) -> String {
        crate::image::image_name(&self.name, &self.version, registry)
    }
}

/// A manifest of either schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Manifest {
    V1(FuncFileV1),
    V20180708(FuncFile),
}

impl Manifest {
    pub fn name(&self) -> &str {
        match self {
            Manifest::V1(ff) => &ff.name,
            Manifest::V20180708(ff) => &ff.name,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            Manifest::V1(ff) => &ff.version,
            Manifest::V20180708(ff) => &ff.version,
        }
    }

    pub fn schema_version(&self) -> Option<u32> {
        match self {
            Manifest::V1(_) => None,
            Manifest::V20180708(ff) => Some(ff.schema_version),
        }
    }

    /// The current-schema record, or the migrate hint for legacy files.
    pub fn into_latest(self, path: &Path) -> Result<FuncFile> {
        match self {
            Manifest::V20180708(ff) => Ok(ff),
            Manifest::V1(_) => Err(Error::UnsupportedSchema {
                path: path.to_path_buf(),
            }),
        }
    }
}

pub fn runtime_tag(runtime: &str) -> (&str, &str) {
    match runtime.split_once(':') {
        Some((rt, tag)) => (rt, tag),
        None => (runtime, ""),
    }
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}

// ── Locating ──

/// Find the manifest in `dir`, trying `func.yaml`, `func.yml`, `func.json`.
pub fn find_func_file(dir: &Path) -> Result<PathBuf> {
    find_first(dir, &FUNC_FILE_NAMES).ok_or_else(|| Error::ManifestNotFound {
        dir: dir.to_path_buf(),
    })
}

pub(crate) fn find_first(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    names
        .iter()
        .map(|n| dir.join(n))
        .find(|p| crate::paths::exists(p))
}

/// True when `path` is a regular file named like a function manifest.
pub fn is_func_file(path: &Path) -> bool {
    if path.is_dir() {
        return false;
    }
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| FUNC_FILE_NAMES.contains(&n))
}

// ── Decoding / encoding ──

#[derive(Deserialize)]
struct SchemaProbe {
    #[serde(default)]
    schema_version: Option<u32>,
}

pub(crate) fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| Error::ManifestRead {
        path: path.to_path_buf(),
        source: e,
    })
}

pub(crate) fn decode<T: DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T> {
    match Format::from_path(path)? {
        Format::Yaml => serde_yaml::from_slice(bytes).map_err(|e| Error::ManifestYaml {
            path: path.to_path_buf(),
            source: e,
        }),
        Format::Json => serde_json::from_slice(bytes).map_err(|e| Error::ManifestJson {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

pub(crate) fn encode<T: Serialize>(path: &Path, value: &T) -> Result<Vec<u8>> {
    match Format::from_path(path)? {
        Format::Yaml => serde_yaml::to_string(value)
            .map(String::into_bytes)
            .map_err(|e| Error::ManifestYaml {
                path: path.to_path_buf(),
                source: e,
            }),
        Format::Json => {
            let mut out = serde_json::to_vec_pretty(value).map_err(|e| Error::ManifestJson {
                path: path.to_path_buf(),
                source: e,
            })?;
            out.push(b'\n');
            Ok(out)
        }
    }
}

pub(crate) fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).map_err(|e| Error::ManifestWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Parse a manifest of either schema, dispatching on `schema_version`.
pub fn parse_manifest(path: &Path) -> Result<Manifest> {
    let bytes = read_bytes(path)?;
    let probe: SchemaProbe = decode(path, &bytes)?;
    match probe.schema_version {
        None => Ok(Manifest::V1(decode(path, &bytes)?)),
        Some(LATEST_SCHEMA_VERSION) => Ok(Manifest::V20180708(decode(path, &bytes)?)),
        Some(other) => {
            tracing::debug!(path = %path.display(), schema_version = other, "unknown schema version");
            Err(Error::UnsupportedSchema {
                path: path.to_path_buf(),
            })
        }
    }
}

/// Parse a manifest that must be on the current schema.
pub fn parse_func_file(path: &Path) -> Result<FuncFile> {
    parse_manifest(path)?.into_latest(path)
}

/// Find and parse the current-schema manifest in `dir`.
pub fn load_func_file(dir: &Path) -> Result<(PathBuf, FuncFile)> {
    let path = find_func_file(dir)?;
    let ff = parse_func_file(&path)?;
    Ok((path, ff))
}

/// Find and parse the manifest in `dir`, whatever its schema.
pub fn load_manifest(dir: &Path) -> Result<(PathBuf, Manifest)> {
    let path = find_func_file(dir)?;
    let m = parse_manifest(&path)?;
    Ok((path, m))
}

/// Write `ff` to `path` with the encoder matching the path's extension.
pub fn store_func_file(path: &Path, ff: &FuncFile) -> Result<()> {
    let bytes = encode(path, ff)?;
    write_bytes(path, &bytes)
}

pub fn store_manifest(path: &Path, m: &Manifest) -> Result<()> {
    let bytes = match m {
        Manifest::V1(ff) => encode(path, ff)?,
        Manifest::V20180708(ff) => encode(path, ff)?,
    };
    write_bytes(path, &bytes)
}
