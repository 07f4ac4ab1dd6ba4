//! Per-media-type encoders/decoders that serialize one file into a layer
//! (streamed tar+gzip or raw stream) and reverse it.
//!
//! Polymorphism over media types: codecs are variants over
//! `{tar, raw}`, represented as a tagged dispatch table keyed by media type
//! rather than subtype inheritance — [`Codec::for_media_type`] is the one
//! dispatch point every caller goes through.

pub mod raw;
pub mod tar;

use std::path::{Path, PathBuf};

use tokio::io::AsyncRead;

use crate::{Descriptor, ModctlError, ModctlResult};

/// Media type for a tar-encoded layer (weights, weight-config, code —
/// anything whose directory structure or file mode must survive extraction).
pub const LAYER_MEDIA_TYPE_TAR: &str = "application/vnd.cnai.model.layer.v1.tar";

/// Media type for a raw (single-file, uncompressed) layer — used for docs
/// and other single, modeless files.
pub const LAYER_MEDIA_TYPE_RAW: &str = "application/vnd.cnai.model.layer.v1.raw";

/// A boxed async byte stream, the common currency between codecs, the
/// content store, and the remote client.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// One layer's encoding strategy: turn a workspace file into a byte stream
/// (`encode`) and reverse it onto disk (`decode`).
#[async_trait::async_trait]
pub trait Codec: Send + Sync {
    /// The media type this codec produces/consumes.
    fn media_type(&self) -> &'static str;

    /// Opens `workspace_root.join(filepath)` and wraps it in this codec's
    /// encoding, returning a stream ready to be hashed and written as a
    /// layer blob.
    async fn encode(&self, filepath: &Path, workspace_root: &Path) -> ModctlResult<ByteStream>;

    /// Decodes `stream` (the layer blob's bytes) back onto disk under
    /// `output_dir`, using `descriptor`'s `filepath` annotation to determine
    /// the destination path for codecs where the stream itself carries no
    /// path (the raw codec); the tar codec reads paths from tar headers
    /// instead but still receives `descriptor` for size bookkeeping.
    async fn decode(
        &self,
        output_dir: &Path,
        stream: ByteStream,
        descriptor: &Descriptor,
    ) -> ModctlResult<()>;
}

/// Selects a codec by a descriptor's or a requested media type's suffix:
/// `.tar` routes to the tar codec, anything else to the raw codec — per
/// the "a media-type suffix determines which codec is chosen."
pub fn for_media_type(media_type: &str) -> Box<dyn Codec> {
    if media_type.ends_with(modctl_utils::defaults::TAR_MEDIA_TYPE_SUFFIX) {
        Box::new(tar::TarCodec)
    } else {
        Box::new(raw::RawCodec)
    }
}

/// Computes the destination path for a raw-codec decode: `output_dir` joined
/// with the descriptor's `filepath` annotation, refusing traversal the same
/// way the tar codec's entry-path check does.
pub(crate) fn resolve_output_path(output_dir: &Path, filepath: &str) -> ModctlResult<PathBuf> {
    let sanitized = modctl_utils::path::sanitize_entry_path(filepath)
        .map_err(|e| ModctlError::Codec(format!("refusing layer path {filepath:?}: {e}")))?;
    Ok(output_dir.join(sanitized))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_tar_codec_for_tar_suffix() {
        let codec = for_media_type(LAYER_MEDIA_TYPE_TAR);
        assert_eq!(codec.media_type(), LAYER_MEDIA_TYPE_TAR);
    }

    #[test]
    fn selects_raw_codec_for_anything_else() {
        let codec = for_media_type(LAYER_MEDIA_TYPE_RAW);
        assert_eq!(codec.media_type(), LAYER_MEDIA_TYPE_RAW);

        let codec = for_media_type(crate::model_config::MODEL_CONFIG_MEDIA_TYPE);
        assert_eq!(codec.media_type(), LAYER_MEDIA_TYPE_RAW);
    }

    #[test]
    fn resolve_output_path_rejects_traversal() {
        assert!(resolve_output_path(Path::new("/out"), "../escape").is_err());
    }

    #[test]
    fn resolve_output_path_joins_clean_relative_path() {
        let path = resolve_output_path(Path::new("/out"), "weights/model.bin").unwrap();
        assert_eq!(path, PathBuf::from("/out/weights/model.bin"));
    }
}
