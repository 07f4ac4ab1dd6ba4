//! Manifest: the ordered `{config, layers[], annotations}` document that
//! identifies a model artifact.

use std::collections::BTreeMap;

use oci_spec::image::{ImageManifest, ImageManifestBuilder, MediaType};
use serde::{Deserialize, Serialize};

use crate::{Descriptor, Digest, ModctlError};

/// Media type stamped on every manifest this engine produces.
pub const MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";

/// The manifest document: a config descriptor, an ordered list of layer
/// descriptors, and an annotation map.
///
/// Layer order is significant — it is the order layers were added during
/// `build`/`attach`, and the order `extract` writes them back out in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Always 2 for the OCI image manifest schema.
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,

    #[serde(rename = "mediaType")]
    pub media_type: String,

    /// Descriptor pointing at the model config blob.
    pub config: Descriptor,

    /// Descriptors pointing at layer blobs, in build order.
    pub layers: Vec<Descriptor>,

    /// Manifest-level annotations, including `org.cnai.model.*` and
    /// `org.cnai.modctl.modelfile` when present.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Manifest {
    /// Builds a manifest from a config descriptor and an ordered layer list.
    pub fn new(config: Descriptor, layers: Vec<Descriptor>) -> Self {
        Manifest {
            schema_version: 2,
            media_type: MANIFEST_MEDIA_TYPE.to_string(),
            config,
            layers,
            annotations: BTreeMap::new(),
        }
    }

    /// Returns a copy of this manifest with the given annotation set.
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Serializes to canonical JSON (stable key order, no trailing newline)
    /// and hashes the result, self-identifying the manifest by its own
    /// content digest.
    pub fn canonical_digest(&self) -> Result<Digest, ModctlError> {
        let bytes = serde_json::to_vec(self)?;
        Ok(Digest::sha256(&bytes))
    }

    /// The digests of every layer, in manifest order.
    pub fn layer_digests(&self) -> impl Iterator<Item = &Digest> {
        self.layers.iter().map(|l| &l.digest)
    }

    /// True if this manifest carries the build-provenance annotation marking
    /// it as produced from a modelfile rather than a bare `tag`/`attach`.
    pub fn has_modelfile_annotation(&self) -> bool {
        self.annotations
            .contains_key(modctl_utils::defaults::ANNOTATION_MODELFILE)
    }
}

impl TryFrom<&Manifest> for ImageManifest {
    type Error = ModctlError;

    fn try_from(value: &Manifest) -> Result<Self, Self::Error> {
        let layers = value
            .layers
            .iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = ImageManifestBuilder::default()
            .schema_version(value.schema_version)
            .media_type(MediaType::Other(value.media_type.clone()))
            .config(TryInto::try_into(&value.config)?)
            .layers(layers);

        if !value.annotations.is_empty() {
            builder = builder.annotations(value.annotations.clone());
        }

        builder
            .build()
            .map_err(|e| ModctlError::Parse(format!("invalid manifest: {e}")))
    }
}

impl TryFrom<&ImageManifest> for Manifest {
    type Error = ModctlError;

    fn try_from(value: &ImageManifest) -> Result<Self, Self::Error> {
        let layers = value
            .layers()
            .iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Manifest {
            schema_version: value.schema_version() as u32,
            media_type: value
                .media_type()
                .as_ref()
                .map(|mt| mt.to_string())
                .unwrap_or_else(|| MediaType::ImageManifest.to_string()),
            config: TryInto::try_into(value.config())?,
            layers,
            annotations: value.annotations().clone().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(name: &str) -> Descriptor {
        Descriptor::new(
            "application/vnd.modctl.model.layer.v1.raw",
            Digest::sha256(name.as_bytes()),
            name.len() as u64,
        )
        .with_annotation(modctl_utils::defaults::ANNOTATION_FILEPATH, name)
    }

    fn config() -> Descriptor {
        Descriptor::new(
            "application/vnd.cnai.model.config.v1+json",
            Digest::sha256(b"config"),
            6,
        )
    }

    #[test]
    fn canonical_digest_is_stable() {
        let manifest = Manifest::new(config(), vec![layer("a.bin")]);
        let first = manifest.canonical_digest().unwrap();
        let second = manifest.canonical_digest().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn layer_order_is_preserved() {
        let manifest = Manifest::new(config(), vec![layer("a.bin"), layer("b.bin")]);
        let names: Vec<_> = manifest
            .layers
            .iter()
            .map(|l| l.filepath().unwrap())
            .collect();
        assert_eq!(names, vec!["a.bin", "b.bin"]);
    }

    #[test]
    fn oci_manifest_conversion_round_trips() {
        let manifest = Manifest::new(config(), vec![layer("a.bin")])
            .with_annotation(modctl_utils::defaults::ANNOTATION_MODELFILE, "Modelfile");
        let oci: ImageManifest = (&manifest).try_into().unwrap();
        let back: Manifest = (&oci).try_into().unwrap();
        assert_eq!(manifest, back);
        assert!(back.has_modelfile_annotation());
    }
}
