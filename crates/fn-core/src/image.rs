//! Container image references: `[registry[:port]/]owner/repo[:tag]`.

use std::sync::LazyLock;

use regex::Regex;

use crate::{Error, Result};

pub const MAX_TAG_LEN: usize = 128;

static PATH_COMPONENT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    // arch-lint: allow(no-silent-result-drop) reason="literal pattern; None makes matching fail closed"
    Regex::new(r"^[a-z0-9]+(?:(?:\.|_|__|-+)[a-z0-9]+)*$").ok()
});

static TAG: LazyLock<Option<Regex>> = LazyLock::new(|| {
    // arch-lint: allow(no-silent-result-drop) reason="literal pattern; None makes matching fail closed"
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$").ok()
});

static REGISTRY_HOST: LazyLock<Option<Regex>> = LazyLock::new(|| {
    // arch-lint: allow(no-silent-result-drop) reason="literal pattern; None makes matching fail closed"
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9.-]*[A-Za-z0-9])?(?::[0-9]+)?$").ok()
});

/// A parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub registry: Option<String>,
    /// Repository path components after the registry (owner, repo, ...).
    pub path: Vec<String>,
    pub tag: Option<String>,
}

impl ImageRef {
    /// Split a reference into registry, path and tag without validating
    /// character sets.
    pub fn split(image: &str) -> Self {
        let mut components: Vec<&str> = image.split('/').collect();

        let registry = if components.len() > 1 && looks_like_registry(components[0]) {
            Some(components.remove(0).to_owned())
        } else {
            None
        };

        let mut tag = None;
        if let Some(last) = components.last_mut() {
            if let Some((repo, t)) = last.split_once(':') {
                tag = Some(t.to_owned());
                *last = repo;
            }
        }

        Self {
            registry,
            path: components.into_iter().map(str::to_owned).collect(),
            tag,
        }
    }

    pub fn parse(image: &str) -> Result<Self> {
        let r = Self::split(image);
        let invalid = |reason: String| Error::InvalidImage {
            image: image.to_owned(),
            reason,
        };

        if let Some(reg) = &r.registry {
            if !matches(&REGISTRY_HOST, reg) {
                return Err(invalid(format!("invalid registry host {reg:?}")));
            }
        }
        if r.path.is_empty() || r.path.iter().any(|c| c.is_empty()) {
            return Err(invalid("empty path component".to_owned()));
        }
        for c in &r.path {
            if !matches(&PATH_COMPONENT, c) {
                return Err(invalid(format!(
                    "path component {c:?} must be lowercase alphanumerics separated by single '.', '_', '__' or '-'"
                )));
            }
        }
        if let Some(tag) = &r.tag {
            validate_tag(tag).map_err(|reason| invalid(reason.to_owned()))?;
        }
        Ok(r)
    }
}

fn looks_like_registry(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

fn matches(re: &LazyLock<Option<Regex>>, s: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(s))
}

fn validate_tag(tag: &str) -> std::result::Result<(), &'static str> {
    if tag.is_empty() || tag.len() > MAX_TAG_LEN {
        return Err("tag must be between 1 and 128 characters");
    }
    if !matches(&TAG, tag) {
        return Err("tag may only contain [A-Za-z0-9_.-] and may not start with '.' or '-'");
    }
    Ok(())
}

/// Validate an image for create/update/push: owner and tag are required.
pub fn validate_full_image_name(image: &str) -> Result<()> {
    if !image.contains('/') {
        return Err(Error::ImageMissingOwner {
            image: image.to_owned(),
        });
    }
    validate_tag_image_name(image)?;
    let r = ImageRef::parse(image)?;
    if r.path.len() < 2 && r.registry.is_none() {
        return Err(Error::ImageMissingOwner {
            image: image.to_owned(),
        });
    }
    Ok(())
}

/// Validate that the last path segment carries a tag.
pub fn validate_tag_image_name(image: &str) -> Result<()> {
    let last = image.rsplit('/').next().unwrap_or(image);
    if last.split(':').count() != 2 {
        return Err(Error::ImageMissingTag {
            image: image.to_owned(),
        });
    }
    Ok(())
}

/// Strip a trailing `:tag` from the last path segment of a function name.
pub fn clean_image_name(name: &str) -> String {
    match name.rfind('/') {
        Some(slash) => {
            let (head, last) = name.split_at(slash + 1);
            let repo = last.split(':').next().unwrap_or(last);
            format!("{head}{repo}")
        }
        None => name.split(':').next().unwrap_or(name).to_owned(),
    }
}

/// Prefix `name` with a registry when it carries no `/`, then append `:version`.
pub fn image_name(name: &str, version: &str, registry: Option<&str>) -> String {
    let mut full = String::new();
    if !name.contains('/') {
        if let Some(reg) = registry.filter(|r| !r.is_empty()) {
            full.push_str(reg);
            if !reg.ends_with('/') {
                full.push('/');
            }
        }
    }
    full.push_str(name);
    if !version.is_empty() {
        full.push(':');
        full.push_str(version);
    }
    full
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_owner_repo_tag() {
        validate_full_image_name("fnproject/hello:0.0.1").unwrap();
        validate_full_image_name("registry.example.com:5000/team/hello:1.2.3").unwrap();
        validate_full_image_name("localhost/hello:latest").unwrap();
    }

    #[test]
    fn rejects_missing_owner() {
        let err = validate_full_image_name("hello:0.0.1").unwrap_err();
        assert!(matches!(err, Error::ImageMissingOwner { .. }));
    }

    #[test]
    fn rejects_missing_tag() {
        let err = validate_full_image_name("fnproject/hello").unwrap_err();
        assert!(matches!(err, Error::ImageMissingTag { .. }));
    }

    #[test]
    fn port_is_not_mistaken_for_tag() {
        let r = ImageRef::split("myreg:5000/owner/repo");
        assert_eq!(r.registry.as_deref(), Some("myreg:5000"));
        assert_eq!(r.path, vec!["owner", "repo"]);
        assert!(r.tag.is_none());
    }

    #[test]
    fn tag_length_boundary() {
        let ok = format!("owner/repo:{}", "a".repeat(128));
        let too_long = format!("owner/repo:{}", "a".repeat(129));
        validate_full_image_name(&ok).unwrap();
        assert!(validate_full_image_name(&too_long).is_err());
    }

    #[test]
    fn tag_may_not_start_with_period_or_dash() {
        assert!(validate_full_image_name("owner/repo:.x").is_err());
        assert!(validate_full_image_name("owner/repo:-x").is_err());
        validate_full_image_name("owner/repo:_x").unwrap();
    }

    #[test]
    fn repeated_separators_are_rejected() {
        assert!(ImageRef::parse("owner/re..po:1").is_err());
        assert!(ImageRef::parse("owner/_repo:1").is_err());
        ImageRef::parse("owner/re__po:1").unwrap();
    }

    #[test]
    fn clean_strips_only_last_segment_tag() {
        assert_eq!(clean_image_name("hello:0.0.3"), "hello");
        assert_eq!(clean_image_name("reg:5000/owner/hello:1"), "reg:5000/owner/hello");
        assert_eq!(clean_image_name("owner/hello"), "owner/hello");
    }

    #[test]
    fn image_name_prefixes_registry() {
        assert_eq!(image_name("hello", "0.0.1", Some("me")), "me/hello:0.0.1");
        assert_eq!(image_name("hello", "0.0.1", Some("me/")), "me/hello:0.0.1");
        assert_eq!(image_name("you/hello", "0.0.1", Some("me")), "you/hello:0.0.1");
        assert_eq!(image_name("hello", "", None), "hello");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn component() -> impl Strategy<Value = String> {
            "[a-z0-9]{1,8}([._-][a-z0-9]{1,8}){0,2}"
        }

        fn tag() -> impl Strategy<Value = String> {
            "[A-Za-z0-9_][A-Za-z0-9_.-]{0,40}"
        }

        proptest! {
            #[test]
            fn grammar_conforming_references_are_accepted(
                owner in component(),
                repo in component(),
                t in tag(),
            ) {
                let image = format!("{owner}/{repo}:{t}");
                prop_assert!(validate_full_image_name(&image).is_ok());
            }

            #[test]
            fn uppercase_repositories_are_rejected(
                owner in component(),
                repo in "[A-Z]{1,8}",
            ) {
                let image = format!("{owner}/{repo}:1");
                prop_assert!(validate_full_image_name(&image).is_err());
            }

            #[test]
            fn clean_image_name_is_idempotent(name in "[a-z0-9:/._-]{0,40}") {
                let once = clean_image_name(&name);
                prop_assert_eq!(clean_image_name(&once), once.clone());
            }
        }
    }
}
