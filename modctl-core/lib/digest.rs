//! Content digests: the primary key of every blob and manifest.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::ModctlError;

/// An algorithm-qualified content hash, e.g. `sha256:9f86d0...`.
///
/// Equality is byte-exact on the lowercase hex encoding; `Digest` derives
/// `Hash`/`Ord` so it can key maps and sort deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest {
    algorithm: String,
    hex: String,
}

impl Digest {
    /// Computes the `sha256:` digest of a byte slice.
    pub fn sha256(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let hex = hex::encode(hasher.finalize());
        Digest {
            algorithm: "sha256".to_string(),
            hex,
        }
    }

    /// Finalizes an incrementally-fed `Sha256` hasher into a digest, for
    /// callers that stream bytes through a hasher rather than holding the
    /// whole payload in memory (the content store's blob writer).
    pub fn sha256_from_hasher(hasher: Sha256) -> Self {
        let hex = hex::encode(hasher.finalize());
        Digest {
            algorithm: "sha256".to_string(),
            hex,
        }
    }

    /// The algorithm component, e.g. `sha256`.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// The lowercase hex-encoded hash component.
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// The path segment this digest occupies under a content-addressed blob
    /// tree: `<algorithm>/<hex>`.
    pub fn storage_path_segment(&self) -> String {
        format!("{}/{}", self.algorithm, self.hex)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl FromStr for Digest {
    type Err = ModctlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, hex) = s
            .split_once(':')
            .ok_or_else(|| ModctlError::Parse(format!("invalid digest {s:?}: missing ':'")))?;

        if algorithm != "sha256" {
            return Err(ModctlError::Parse(format!(
                "unsupported digest algorithm {algorithm:?}"
            )));
        }

        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ModctlError::Parse(format!(
                "invalid digest {s:?}: non-hex payload"
            )));
        }

        Ok(Digest {
            algorithm: algorithm.to_string(),
            hex: hex.to_ascii_lowercase(),
        })
    }
}

impl TryFrom<String> for Digest {
    type Error = ModctlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Digest> for String {
    fn from(value: Digest) -> Self {
        value.to_string()
    }
}
