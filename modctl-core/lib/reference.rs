//! Reference parser: `domain/repository[:tag][@digest]`.

use core::fmt;
use std::{ops::Deref, str::FromStr};

use crate::{Digest, ModctlError, ModctlResult};

/// Parsed form of a user-supplied target reference.
///
/// Delegates the bulk of the OCI reference grammar (domain, repository path,
/// tag) to [`oci_client::Reference`], which already implements it, and adds
/// the digest component and the at-least-one-of-{tag,digest} validation that
/// `oci_client::Reference` alone does not enforce uniformly.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String")]
#[serde(into = "String")]
pub struct Reference {
    inner: oci_client::Reference,
    digest: Option<Digest>,
}

impl Reference {
    /// Parses `s`, requiring that at least one of a tag or a digest be
    /// present (the default rule for most operations; callers that accept a
    /// bare repository, such as `prune`, parse with [`Reference::parse_repo_only`]).
    pub fn parse(s: &str) -> Result<Self, ModctlError> {
        let reference = Self::parse_repo_only(s)?;
        if reference.tag().is_none() && reference.digest().is_none() {
            return Err(ModctlError::Parse(format!(
                "reference {s:?} must include a tag or a digest"
            )));
        }
        Ok(reference)
    }

    /// Parses `s` without requiring a tag or digest (used by `prune`, which
    /// ignores tags entirely, and by repository-scoped commands).
    pub fn parse_repo_only(s: &str) -> Result<Self, ModctlError> {
        let (name, digest) = match s.split_once('@') {
            Some((name, digest)) => (name, Some(digest.parse::<Digest>()?)),
            None => (s, None),
        };

        if name.split('/').next().map(|d| d.is_empty()).unwrap_or(true) {
            return Err(ModctlError::Parse(format!(
                "reference {s:?} has no derivable domain component"
            )));
        }

        let inner = oci_client::Reference::from_str(name)
            .map_err(|e| ModctlError::Parse(format!("invalid reference {s:?}: {e}")))?;

        Ok(Reference { inner, digest })
    }

    /// The registry domain, e.g. `docker.io`.
    pub fn domain(&self) -> &str {
        self.inner.resolve_registry()
    }

    /// The domain-prefixed repository path, e.g. `docker.io/library/nginx`.
    pub fn repository(&self) -> String {
        format!("{}/{}", self.domain(), self.inner.repository())
    }

    /// The repository path without the domain prefix.
    pub fn repository_path(&self) -> &str {
        self.inner.repository()
    }

    /// The tag component, if present.
    pub fn tag(&self) -> Option<&str> {
        self.inner.tag()
    }

    /// The digest component, if present.
    pub fn digest(&self) -> Option<&Digest> {
        self.digest.as_ref()
    }

    /// The underlying `oci_client::Reference`, for code that needs to pass a
    /// reference into the registry client crate directly.
    pub fn as_oci_reference(&self) -> &oci_client::Reference {
        &self.inner
    }

    /// The reference to hand to a remote registry call, re-including the
    /// digest component when one is present.
    ///
    /// `parse_repo_only` strips a trailing `@digest` off `s` before handing
    /// the rest to `oci_client::Reference::from_str` (so it can validate the
    /// domain segment on its own), which means `self.inner` alone never
    /// carries a digest — a digest-only reference passed to
    /// [`Self::as_oci_reference`] would resolve against the registry's
    /// default tag instead of the intended digest. Remote-facing code that
    /// needs digest precision (`pull`, `fetch`, `tag`) should call this
    /// instead.
    pub fn as_oci_reference_for_remote(&self) -> ModctlResult<std::borrow::Cow<'_, oci_client::Reference>> {
        match &self.digest {
            None => Ok(std::borrow::Cow::Borrowed(&self.inner)),
            Some(_) => {
                let reparsed = oci_client::Reference::from_str(&self.to_string())
                    .map_err(|e| ModctlError::Parse(format!("reparsing {self} for a remote call: {e}")))?;
                Ok(std::borrow::Cow::Owned(reparsed))
            }
        }
    }
}

impl Deref for Reference {
    type Target = oci_client::Reference;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl FromStr for Reference {
    type Err = ModctlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reference::parse(s)
    }
}

impl TryFrom<String> for Reference {
    type Error = ModctlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Reference::parse(&value)
    }
}

impl From<Reference> for String {
    fn from(reference: Reference) -> Self {
        reference.to_string()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)?;
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_domain_repo_tag() {
        let r = Reference::parse("ghcr.io/org/app:1.0").unwrap();
        assert_eq!(r.domain(), "ghcr.io");
        assert_eq!(r.repository_path(), "org/app");
        assert_eq!(r.tag(), Some("1.0"));
        assert_eq!(r.digest(), None);
    }

    #[test]
    fn parses_domain_repo_digest() {
        let digest = "sha256:".to_string() + &"a".repeat(64);
        let r = Reference::parse(&format!("localhost/demo@{digest}")).unwrap();
        assert_eq!(r.tag(), None);
        assert_eq!(r.digest().unwrap().to_string(), digest);
    }

    #[test]
    fn parses_both_tag_and_digest() {
        let digest = "sha256:".to_string() + &"b".repeat(64);
        let r = Reference::parse(&format!("localhost/demo:v1@{digest}")).unwrap();
        assert_eq!(r.tag(), Some("v1"));
        assert_eq!(r.digest().unwrap().to_string(), digest);
    }

    #[test]
    fn rejects_neither_tag_nor_digest() {
        assert!(Reference::parse("localhost/demo").is_err());
    }

    #[test]
    fn parse_repo_only_accepts_bare_repository() {
        assert!(Reference::parse_repo_only("localhost/demo").is_ok());
    }

    #[test]
    fn round_trips_format() {
        let original = "localhost/demo:v1";
        let r = Reference::parse(original).unwrap();
        let reparsed = Reference::parse(&r.to_string()).unwrap();
        assert_eq!(r, reparsed);
    }

    #[test]
    fn defaults_registry_to_docker_io_when_missing() {
        let r = Reference::parse("org/app:1.0").unwrap();
        assert_eq!(r.domain(), "index.docker.io");
    }

    #[test]
    fn remote_reference_for_digest_only_carries_the_digest() {
        let digest = "sha256:".to_string() + &"c".repeat(64);
        let r = Reference::parse(&format!("localhost/demo@{digest}")).unwrap();
        let remote = r.as_oci_reference_for_remote().unwrap();
        assert!(remote.to_string().contains(&digest));
    }

    #[test]
    fn remote_reference_for_tag_only_matches_as_oci_reference() {
        let r = Reference::parse("localhost/demo:v1").unwrap();
        let remote = r.as_oci_reference_for_remote().unwrap();
        assert_eq!(remote.tag(), r.as_oci_reference().tag());
    }
}
