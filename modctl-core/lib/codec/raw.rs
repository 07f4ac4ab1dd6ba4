//! Raw codec: the layer *is* the file, streamed byte-for-byte.

use std::path::Path;

use tokio::{fs, io::AsyncWriteExt};

use crate::{
    Descriptor, ModctlError, ModctlResult,
    codec::{ByteStream, Codec, LAYER_MEDIA_TYPE_RAW, resolve_output_path},
};

/// Treats the layer as the file itself — no wrapping format.
pub struct RawCodec;

#[async_trait::async_trait]
impl Codec for RawCodec {
    fn media_type(&self) -> &'static str {
        LAYER_MEDIA_TYPE_RAW
    }

    async fn encode(&self, filepath: &Path, workspace_root: &Path) -> ModctlResult<ByteStream> {
        let source = workspace_root.join(filepath);
        let file = fs::File::open(&source)
            .await
            .map_err(|e| ModctlError::Codec(format!("opening {}: {e}", source.display())))?;
        Ok(Box::new(file))
    }

    async fn decode(
        &self,
        output_dir: &Path,
        mut stream: ByteStream,
        descriptor: &Descriptor,
    ) -> ModctlResult<()> {
        let filepath = descriptor
            .filepath()
            .ok_or_else(|| ModctlError::Codec("raw layer descriptor has no filepath annotation".to_string()))?;
        let dest = resolve_output_path(output_dir, filepath)?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&dest).await?;
        tokio::io::copy(&mut stream, &mut file).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn encode_then_decode_round_trips_bytes() {
        let workspace = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();

        tokio::fs::write(workspace.path().join("model.bin"), b"binary weights")
            .await
            .unwrap();

        let codec = RawCodec;
        let mut stream = codec
            .encode(Path::new("model.bin"), workspace.path())
            .await
            .unwrap();

        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).await.unwrap();
        assert_eq!(bytes, b"binary weights");

        let descriptor = Descriptor::new(LAYER_MEDIA_TYPE_RAW, crate::Digest::sha256(&bytes), bytes.len() as u64)
            .with_annotation(modctl_utils::defaults::ANNOTATION_FILEPATH, "model.bin");

        codec
            .decode(out.path(), Box::new(std::io::Cursor::new(bytes.clone())), &descriptor)
            .await
            .unwrap();

        let decoded = tokio::fs::read(out.path().join("model.bin")).await.unwrap();
        assert_eq!(decoded, bytes);
    }

    #[tokio::test]
    async fn decode_rejects_traversal_path() {
        let out = TempDir::new().unwrap();
        let codec = RawCodec;
        let descriptor = Descriptor::new(LAYER_MEDIA_TYPE_RAW, crate::Digest::sha256(b"x"), 1)
            .with_annotation(modctl_utils::defaults::ANNOTATION_FILEPATH, "../escape.bin");

        let result = codec
            .decode(out.path(), Box::new(std::io::Cursor::new(vec![1u8])), &descriptor)
            .await;
        assert!(result.is_err());
        assert!(!out.path().parent().unwrap().join("escape.bin").exists());
    }

    #[tokio::test]
    async fn decode_creates_intermediate_directories() {
        let out = TempDir::new().unwrap();
        let codec = RawCodec;
        let bytes = b"doc".to_vec();
        let descriptor = Descriptor::new(LAYER_MEDIA_TYPE_RAW, crate::Digest::sha256(&bytes), bytes.len() as u64)
            .with_annotation(modctl_utils::defaults::ANNOTATION_FILEPATH, "docs/readme.md");

        codec
            .decode(out.path(), Box::new(std::io::Cursor::new(bytes.clone())), &descriptor)
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(out.path().join("docs/readme.md")).await.unwrap(), bytes);
    }
}
