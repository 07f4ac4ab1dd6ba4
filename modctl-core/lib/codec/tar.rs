//! Tar codec: a single-entry gzip-compressed tar stream preserving the
//! original path and file mode, reversed by `decode` with traversal
//! refusal on every entry.

use std::path::Path;

use async_compression::tokio::{bufread::GzipDecoder, write::GzipEncoder};
use futures::StreamExt;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio_tar::{Archive, Builder, Header};

use crate::{
    Descriptor, ModctlError, ModctlResult,
    codec::{ByteStream, Codec, LAYER_MEDIA_TYPE_TAR, resolve_output_path},
};

/// A single-entry gzip+tar layer, preserving the entry's relative path and
/// Unix file mode.
pub struct TarCodec;

#[async_trait::async_trait]
impl Codec for TarCodec {
    fn media_type(&self) -> &'static str {
        LAYER_MEDIA_TYPE_TAR
    }

    async fn encode(&self, filepath: &Path, workspace_root: &Path) -> ModctlResult<ByteStream> {
        let source = workspace_root.join(filepath);
        let metadata = tokio::fs::metadata(&source)
            .await
            .map_err(|e| ModctlError::Codec(format!("stat {}: {e}", source.display())))?;

        #[cfg(unix)]
        let mode = {
            use std::os::unix::fs::PermissionsExt;
            metadata.permissions().mode()
        };
        #[cfg(not(unix))]
        let mode = 0o644u32;

        let file = tokio::fs::File::open(&source)
            .await
            .map_err(|e| ModctlError::Codec(format!("opening {}: {e}", source.display())))?;

        let mut header = Header::new_gnu();
        header.set_size(metadata.len());
        header.set_mode(mode);
        header.set_mtime(
            metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0),
        );
        header.set_cksum();

        let entry_path = filepath.to_string_lossy().replace('\\', "/");
        let log_path = entry_path.clone();

        // Pipes the tar+gzip bytes straight from `file` to whatever consumes
        // the returned stream, so neither the raw contents, the tar archive,
        // nor the gzip output ever sit fully in memory — only the pipe's own
        // 64 KB buffer, matching the store's own chunk size on the read side.
        let (reader, writer) = tokio::io::duplex(64 * 1024);

        tokio::spawn(async move {
            let result: std::io::Result<()> = async move {
                let mut builder = Builder::new(GzipEncoder::new(writer));
                builder.append_data(&mut header, &entry_path, file).await?;
                let mut encoder = builder.into_inner().await?;
                encoder.shutdown().await?;
                Ok(())
            }
            .await;

            if let Err(err) = result {
                tracing::warn!(path = %log_path, error = %err, "tar encode task failed");
            }
        });

        Ok(Box::new(reader))
    }

    async fn decode(
        &self,
        output_dir: &Path,
        stream: ByteStream,
        descriptor: &Descriptor,
    ) -> ModctlResult<()> {
        let _ = descriptor;
        let reader = GzipDecoder::new(BufReader::new(stream));
        let mut archive = Archive::new(reader);
        let mut entries = archive
            .entries()
            .map_err(|e| ModctlError::Codec(format!("reading tar archive: {e}")))?;

        while let Some(entry) = entries.next().await {
            let mut entry = entry.map_err(|e| ModctlError::Codec(format!("reading tar entry: {e}")))?;
            let entry_path = entry
                .path()
                .map_err(|e| ModctlError::Codec(format!("invalid tar entry path: {e}")))?
                .to_string_lossy()
                .into_owned();

            let dest = resolve_output_path(output_dir, &entry_path)?;

            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            let mode = entry.header().mode().unwrap_or(0o644);
            entry
                .unpack(&dest)
                .await
                .map_err(|e| ModctlError::Codec(format!("unpacking {entry_path}: {e}")))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                tokio::fs::set_permissions(&dest, std::fs::Permissions::from_mode(mode)).await?;
            }
        }

        Ok(())
    }
}
