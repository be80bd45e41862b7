//! Semantic-version bumping of a manifest's `version` field.

use std::path::Path;

use semver::Version;

use crate::funcfile::{parse_manifest, store_manifest, Manifest};
use crate::image::clean_image_name;
use crate::{Error, Result};

pub const INITIAL_VERSION: &str = "0.0.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionType {
    #[default]
    Patch,
    Minor,
    Major,
}

/// The version before and after a bump, kept so a failed deploy can roll back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BumpOutcome {
    pub previous: String,
    pub current: String,
}

/// Compute the next version. An empty version becomes [`INITIAL_VERSION`]
/// regardless of `kind`; pre-release and build metadata are dropped.
pub fn next_version(current: &str, kind: VersionType) -> Result<String> {
    if current.is_empty() {
        return Ok(INITIAL_VERSION.to_owned());
    }
    let v = Version::parse(current).map_err(|e| Error::InvalidVersion {
        version: current.to_owned(),
        source: e,
    })?;
    let next = match kind {
        VersionType::Major => Version::new(v.major + 1, 0, 0),
        VersionType::Minor => Version::new(v.major, v.minor + 1, 0),
        VersionType::Patch => Version::new(v.major, v.minor, v.patch + 1),
    };
    Ok(next.to_string())
}

fn bump_fields(name: &mut String, version: &mut String, kind: VersionType) -> Result<BumpOutcome> {
    let previous = version.clone();
    let current = next_version(version, kind)?;
    *name = clean_image_name(name);
    *version = current.clone();
    Ok(BumpOutcome { previous, current })
}

/// Bump the in-memory manifest, cleaning any `:tag` off its name.
pub fn bump_in_place(m: &mut Manifest, kind: VersionType) -> Result<BumpOutcome> {
    match m {
        Manifest::V1(ff) => bump_fields(&mut ff.name, &mut ff.version, kind),
        Manifest::V20180708(ff) => bump_fields(&mut ff.name, &mut ff.version, kind),
    }
}

/// Bump the manifest at `path` and persist it.
pub fn bump_manifest(path: &Path, kind: VersionType) -> Result<BumpOutcome> {
    let mut m = parse_manifest(path)?;
    let outcome = bump_in_place(&mut m, kind)?;
    store_manifest(path, &m)?;
    tracing::debug!(
        path = %path.display(),
        from = %outcome.previous,
        to = %outcome.current,
        "bumped function version"
    );
    Ok(outcome)
}

/// Put `previous` back into the manifest's `version` field.
pub fn restore_version(path: &Path, previous: &str) -> Result<()> {
    let mut m = parse_manifest(path)?;
    match &mut m {
        Manifest::V1(ff) => ff.version = previous.to_owned(),
        Manifest::V20180708(ff) => ff.version = previous.to_owned(),
    }
    store_manifest(path, &m)?;
    tracing::debug!(path = %path.display(), version = previous, "restored function version");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_version_becomes_initial_for_every_kind() {
        for kind in [VersionType::Patch, VersionType::Minor, VersionType::Major] {
            assert_eq!(next_version("", kind).unwrap(), "0.0.1");
        }
    }

    #[test]
    fn increments() {
        assert_eq!(next_version("1.2.3", VersionType::Patch).unwrap(), "1.2.4");
        assert_eq!(next_version("1.2.3", VersionType::Minor).unwrap(), "1.3.0");
        assert_eq!(next_version("1.2.3", VersionType::Major).unwrap(), "2.0.0");
    }

    #[test]
    fn prerelease_and_build_metadata_are_dropped() {
        assert_eq!(
            next_version("1.2.3-beta.1+sha.5114f85", VersionType::Patch).unwrap(),
            "1.2.4"
        );
    }

    #[test]
    fn garbage_version_is_rejected() {
        let err = next_version("latest", VersionType::Patch).unwrap_err();
        assert!(matches!(err, Error::InvalidVersion { .. }));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn patch_n_times_from_zero(n in 1u64..60) {
                let mut v = "0.0.0".to_owned();
                for _ in 0..n {
                    v = next_version(&v, VersionType::Patch).unwrap();
                }
                prop_assert_eq!(v, format!("0.0.{n}"));
            }
        }
    }
}
