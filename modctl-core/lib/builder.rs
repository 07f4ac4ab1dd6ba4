//! Builder: assembles layer, config, and manifest descriptors and routes
//! their bytes to a local-output or remote-output sink.
//!
//! I/O is reported through the same [`crate::progress`] sink the orchestrators
//! use elsewhere, via [`ProgressReader`] wrapping each blob's bytes while
//! they're written — the builder's `onStart`/`onComplete`/`onError` hooks
//! collapse to "start a bar, tee reads through it, finish or error it."

use std::{collections::BTreeMap, path::Path, sync::Arc};

use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use crate::{
    Descriptor, Digest, Manifest, ModctlError, ModctlResult,
    progress::{NoopProgress, ProgressReader, ProgressSink},
    reference::Reference,
    remote::{PushItem, RemoteClient},
    store::ContentStore,
};

/// Where a build's bytes ultimately land.
pub enum BuildSink {
    /// Writes go straight into the local content store.
    Local { store: Arc<ContentStore>, repo: String },
    /// Writes are buffered in memory and pushed to the remote registry as
    /// one batch when the manifest is built — `RemoteClient::push` already
    /// orders layers, then config, then manifest, and skips any digest the
    /// registry already has, matching push semantics.
    Remote {
        client: Arc<RemoteClient>,
        reference: Reference,
        layers: tokio::sync::Mutex<Vec<PushItem>>,
        config: tokio::sync::Mutex<Option<PushItem>>,
    },
}

impl BuildSink {
    /// A sink that writes into `store` under `repo`.
    pub fn local(store: Arc<ContentStore>, repo: impl Into<String>) -> Self {
        BuildSink::Local { store, repo: repo.into() }
    }

    /// A sink that batches writes for `reference`'s registry.
    pub fn remote(client: Arc<RemoteClient>, reference: Reference) -> Self {
        BuildSink::Remote {
            client,
            reference,
            layers: tokio::sync::Mutex::new(Vec::new()),
            config: tokio::sync::Mutex::new(None),
        }
    }
}

/// Assembles layers, a config blob, and a manifest for one build, routing
/// each through a progress sink and into `sink`.
pub struct Builder {
    sink: BuildSink,
    progress: Arc<dyn ProgressSink>,
}

impl Builder {
    /// Builds a `Builder` over `sink`, with no progress rendering.
    pub fn new(sink: BuildSink) -> Self {
        Builder {
            sink,
            progress: Arc::new(NoopProgress),
        }
    }

    /// Overrides the progress sink used for this builder's remaining writes.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Encodes `workspace_root.join(relative_path)` via `media_type`'s codec,
    /// writes the result to the sink, and returns its descriptor (carrying a
    /// `filepath` annotation plus any caller-supplied `annotations`).
    pub async fn build_layer(
        &self,
        relative_path: &Path,
        workspace_root: &Path,
        media_type: &'static str,
        annotations: BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> ModctlResult<Descriptor> {
        let name = relative_path.to_string_lossy().into_owned();
        let codec = crate::codec::for_media_type(media_type);

        let stream = codec.encode(relative_path, workspace_root).await;
        let stream = match stream {
            Ok(s) => s,
            Err(err) => {
                self.progress.start(&name, None).finish_with_error();
                return Err(err);
            }
        };

        let handle = self.progress.start(&name, None);
        let reader: crate::codec::ByteStream = Box::new(ProgressReader::new(stream, handle.clone()));

        let filepath = relative_path.to_string_lossy().replace('\\', "/");
        let mut annotations = annotations;
        annotations.insert(modctl_utils::defaults::ANNOTATION_FILEPATH.to_string(), filepath);

        let write_result = self.write_layer_stream(media_type, reader, annotations, cancel).await;
        match write_result {
            Ok(descriptor) => {
                handle.finish();
                Ok(descriptor)
            }
            Err(err) => {
                handle.finish_with_error();
                Err(err)
            }
        }
    }

    /// Streams an encoded layer straight into the sink: for a local sink the
    /// bytes go through [`ContentStore::push_blob_streamed`] and never exist
    /// as one in-memory buffer, since the digest is only known once the
    /// stream is drained. A remote sink still has to collect the bytes —
    /// `oci_client`'s push API is byte-oriented, the same constraint the
    /// teacher's own registry client has.
    async fn write_layer_stream(
        &self,
        media_type: &str,
        mut stream: crate::codec::ByteStream,
        annotations: BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> ModctlResult<Descriptor> {
        match &self.sink {
            BuildSink::Local { store, repo } => {
                let (digest, size) = store.push_blob_streamed(repo, stream, cancel).await?;
                let descriptor = annotations
                    .into_iter()
                    .fold(Descriptor::new(media_type, digest, size), |d, (k, v)| d.with_annotation(k, v));
                Ok(descriptor)
            }
            BuildSink::Remote { layers, .. } => {
                let mut bytes = Vec::new();
                stream.read_to_end(&mut bytes).await?;
                let digest = Digest::sha256(&bytes);
                let size = bytes.len() as u64;
                let descriptor = annotations
                    .iter()
                    .fold(Descriptor::new(media_type, digest.clone(), size), |d, (k, v)| d.with_annotation(k.clone(), v.clone()));
                layers.lock().await.push(PushItem {
                    data: bytes,
                    media_type: media_type.to_string(),
                    annotations,
                });
                Ok(descriptor)
            }
        }
    }

    /// Writes bytes whose digest/media type were computed elsewhere —
    /// `attach`'s carried-over, unchanged layers — to the sink without
    /// re-hashing. The caller guarantees `bytes` hashes to
    /// `descriptor.digest`.
    pub(crate) async fn carry_over_layer(&self, descriptor: &Descriptor, bytes: Vec<u8>, cancel: &CancellationToken) -> ModctlResult<()> {
        self.write_blob(&descriptor.media_type, &descriptor.digest, descriptor.size, bytes, &descriptor.annotations, cancel)
            .await
    }

    async fn write_blob(
        &self,
        media_type: &str,
        digest: &Digest,
        size: u64,
        bytes: Vec<u8>,
        annotations: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> ModctlResult<()> {
        match &self.sink {
            BuildSink::Local { store, repo } => {
                let descriptor = Descriptor::new(media_type, digest.clone(), size);
                store
                    .push_blob(repo, Box::new(std::io::Cursor::new(bytes)), &descriptor, cancel)
                    .await
                    .map(|_| ())
            }
            BuildSink::Remote { layers, .. } => {
                layers.lock().await.push(PushItem {
                    data: bytes,
                    media_type: media_type.to_string(),
                    annotations: annotations.clone(),
                });
                Ok(())
            }
        }
    }

    /// Serializes `config` and writes it to the sink, returning its
    /// descriptor.
    pub async fn build_config(&self, config: &crate::model_config::ModelConfig, cancel: &CancellationToken) -> ModctlResult<Descriptor> {
        let bytes = config.to_json_bytes()?;
        let digest = Digest::sha256(&bytes);
        let size = bytes.len() as u64;
        let descriptor = Descriptor::new(crate::model_config::MODEL_CONFIG_MEDIA_TYPE, digest.clone(), size);

        match &self.sink {
            BuildSink::Local { store, repo } => {
                store
                    .push_blob(repo, Box::new(std::io::Cursor::new(bytes)), &descriptor, cancel)
                    .await?;
            }
            BuildSink::Remote { config: slot, .. } => {
                *slot.lock().await = Some(PushItem {
                    data: bytes,
                    media_type: crate::model_config::MODEL_CONFIG_MEDIA_TYPE.to_string(),
                    annotations: BTreeMap::new(),
                });
            }
        }

        Ok(descriptor)
    }

    /// Serializes a manifest referencing `config_descriptor` and `layers`,
    /// writes it to the sink under `tag`, and returns its descriptor.
    ///
    /// For a remote sink, the bytes hashed into the returned descriptor are
    /// this crate's own canonical serialization of [`Manifest`]; the bytes
    /// the registry actually stores are built by `oci_client` from the same
    /// layers/config/annotations and may differ by key ordering. Both
    /// describe the same artifact; only the self-reported digest can drift
    /// from the registry's.
    pub async fn build_manifest(
        &self,
        layers: Vec<Descriptor>,
        config_descriptor: Descriptor,
        annotations: BTreeMap<String, String>,
        tag: Option<&str>,
        cancel: &CancellationToken,
    ) -> ModctlResult<Descriptor> {
        let mut manifest = Manifest::new(config_descriptor, layers);
        manifest.annotations = annotations;
        let bytes = serde_json::to_vec(&manifest)?;
        let digest = Digest::sha256(&bytes);

        match &self.sink {
            BuildSink::Local { store, repo } => {
                store.push_manifest(repo, tag, &bytes, cancel).await?;
            }
            BuildSink::Remote {
                client,
                reference,
                layers: pending_layers,
                config,
            } => {
                let pending_layers = std::mem::take(&mut *pending_layers.lock().await);
                let config_item = config
                    .lock()
                    .await
                    .take()
                    .ok_or_else(|| ModctlError::Custom(anyhow::anyhow!("build_manifest called before build_config")))?;

                client.push(reference, pending_layers, config_item, manifest.annotations.clone()).await?;
            }
        }

        Ok(Descriptor::new(crate::manifest::MANIFEST_MEDIA_TYPE, digest, bytes.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_config::{ModelConfig, ModelConfigBlock, ModelDescriptorBlock, ModelFs};
    use tempfile::TempDir;

    fn sample_config() -> ModelConfig {
        ModelConfig {
            descriptor: ModelDescriptorBlock {
                family: Some("demo".to_string()),
                name: Some("demo-7b".to_string()),
                created_at: Some("2024-01-01T00:00:00Z".to_string()),
                source_url: None,
                revision: None,
            },
            config: ModelConfigBlock {
                architecture: Some("llama".to_string()),
                format: Some("safetensors".to_string()),
                precision: Some("fp16".to_string()),
                quantization: None,
                param_size: Some("7B".to_string()),
                capabilities: None,
            },
            modelfs: ModelFs { diff_ids: vec![] },
        }
    }

    #[tokio::test]
    async fn local_build_layer_and_config_round_trip_through_store() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ContentStore::open(dir.path()).await.unwrap());
        let workspace = TempDir::new().unwrap();
        tokio::fs::write(workspace.path().join("model.safetensors"), b"tensor").await.unwrap();

        let builder = Builder::new(BuildSink::local(store.clone(), "demo"));
        let cancel = CancellationToken::new();

        let descriptor = builder
            .build_layer(
                Path::new("model.safetensors"),
                workspace.path(),
                crate::codec::LAYER_MEDIA_TYPE_TAR,
                BTreeMap::new(),
                &cancel,
            )
            .await
            .unwrap();

        assert!(store.stat_blob("demo", &descriptor.digest).await.unwrap());

        let config_descriptor = builder.build_config(&sample_config(), &cancel).await.unwrap();
        assert!(store.stat_blob("demo", &config_descriptor.digest).await.unwrap());

        let manifest_descriptor = builder
            .build_manifest(vec![descriptor], config_descriptor, BTreeMap::new(), Some("v1"), &cancel)
            .await
            .unwrap();

        assert!(store.stat_manifest("demo", &manifest_descriptor.digest).await.unwrap());
        assert_eq!(store.list_tags("demo").await.unwrap(), vec!["v1".to_string()]);
    }
}
