//! Descriptor: `{mediaType, digest, size}` plus annotations, the pointer type
//! used throughout the manifest/config/layer graph.

use std::collections::BTreeMap;

use oci_spec::image::{Descriptor as OciDescriptor, DescriptorBuilder, MediaType};
use serde::{Deserialize, Serialize};

use crate::{Digest, ModctlError};

/// Annotation key carrying a layer's workspace-relative path, preserved on extract.
pub const ANNOTATION_FILEPATH: &str = modctl_utils::defaults::ANNOTATION_FILEPATH;

/// A small JSON object that points to a blob via `{mediaType, digest, size}`,
/// plus a string-keyed annotation map and optional inline data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    /// The media type of the referenced content, e.g.
    /// `application/vnd.modctl.model.layer.v1.tar` or `.raw`.
    #[serde(rename = "mediaType")]
    pub media_type: String,

    /// The content digest of the referenced blob.
    pub digest: Digest,

    /// The size in bytes of the referenced blob.
    pub size: u64,

    /// Annotation map. Recognized keys are documented on the constants in
    /// this module and in [`crate::model_config`].
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Inline data, used sparingly (small config blobs may be inlined by a
    /// remote that supports it); modctl never relies on this being present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl Descriptor {
    /// Builds a descriptor for a freshly written blob.
    pub fn new(media_type: impl Into<String>, digest: Digest, size: u64) -> Self {
        Descriptor {
            media_type: media_type.into(),
            digest,
            size,
            annotations: BTreeMap::new(),
            data: None,
        }
    }

    /// Returns a copy of this descriptor with the given annotation set.
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// The `filepath` annotation, if present.
    pub fn filepath(&self) -> Option<&str> {
        self.annotations.get(ANNOTATION_FILEPATH).map(String::as_str)
    }

    /// True if this descriptor's media type carries the tar codec's suffix.
    pub fn is_tar(&self) -> bool {
        self.media_type.ends_with(modctl_utils::defaults::TAR_MEDIA_TYPE_SUFFIX)
    }
}

impl TryFrom<&Descriptor> for OciDescriptor {
    type Error = ModctlError;

    fn try_from(value: &Descriptor) -> Result<Self, Self::Error> {
        let mut builder = DescriptorBuilder::default()
            .media_type(MediaType::Other(value.media_type.clone()))
            .digest(value.digest.to_string())
            .size(value.size as i64);

        if !value.annotations.is_empty() {
            builder = builder.annotations(value.annotations.clone());
        }

        builder
            .build()
            .map_err(|e| ModctlError::Parse(format!("invalid descriptor: {e}")))
    }
}

impl TryFrom<&OciDescriptor> for Descriptor {
    type Error = ModctlError;

    fn try_from(value: &OciDescriptor) -> Result<Self, Self::Error> {
        Ok(Descriptor {
            media_type: value.media_type().to_string(),
            digest: value.digest().parse()?,
            size: value.size() as u64,
            annotations: value.annotations().clone().unwrap_or_default(),
            data: value.data().clone(),
        })
    }
}
