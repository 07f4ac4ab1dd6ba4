//! Model config: the JSON document embedded as the manifest's config blob.
//!
//! A `descriptor` block (family, name, createdAt, sourceURL, revision), a
//! `config` block (architecture, format, precision, quantization, paramSize,
//! capabilities.reasoning), and a `modelfs.diff_ids` ordered list mirroring
//! the manifest's layer digests — used by `attach` to detect semantic
//! no-ops on re-attach.

use serde::{Deserialize, Serialize};

use crate::Digest;

/// Media type stamped on the config blob.
pub const MODEL_CONFIG_MEDIA_TYPE: &str = "application/vnd.cnai.model.config.v1+json";

/// The model config document, the config blob every manifest points at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identity metadata.
    pub descriptor: ModelDescriptorBlock,

    /// Model architecture/format metadata.
    pub config: ModelConfigBlock,

    /// Ordered layer diff IDs, mirroring the manifest's layer digests.
    pub modelfs: ModelFs,
}

/// The `descriptor` block of a [`ModelConfig`]: identity and provenance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptorBlock {
    /// The model family, e.g. `llama`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,

    /// The model name, e.g. `llama-3-8b`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// RFC3339 creation timestamp.
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    /// The upstream source URL the model was fetched from, if known.
    #[serde(rename = "sourceURL", default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,

    /// Provenance revision: `<git-or-zeta-commit>[-dirty]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

/// The `config` block of a [`ModelConfig`]: architecture/format metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfigBlock {
    /// The model architecture, e.g. `transformer`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,

    /// The on-disk weight format, e.g. `safetensors`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// The weight precision, e.g. `fp16`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<String>,

    /// The weight quantization scheme, e.g. `q4_0`, if quantized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantization: Option<String>,

    /// The parameter count/size, e.g. `8B`.
    #[serde(rename = "paramSize", default, skip_serializing_if = "Option::is_none")]
    pub param_size: Option<String>,

    /// Model capabilities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<ModelCapabilities>,
}

/// Model capability flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    /// Whether the model supports a reasoning mode (`--reasoning` at build time).
    #[serde(default)]
    pub reasoning: bool,
}

/// The `modelfs` block: an ordered list of layer diff IDs.
///
/// Used to detect semantic no-ops on `attach`: if the newly computed ordered
/// diff ID list equals this one, the artifact is unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelFs {
    /// Ordered digests, one per manifest layer, in manifest order.
    #[serde(rename = "diff_ids")]
    pub diff_ids: Vec<Digest>,
}

impl ModelConfig {
    /// Serializes this config to canonical JSON bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parses a model config from JSON bytes.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// True if `diff_ids` matches `layers` exactly, in order — the no-op test
    /// `attach` uses to decide whether a rebuild is actually necessary.
    pub fn diff_ids_match(&self, layers: &[Digest]) -> bool {
        self.modelfs.diff_ids.len() == layers.len()
            && self.modelfs.diff_ids.iter().zip(layers).all(|(a, b)| a == b)
    }
}
