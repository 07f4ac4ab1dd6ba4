//! Argument parser for the `modctl` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use modctl_core::reference::Reference;

use crate::styles;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// modctl packages, distributes, and extracts AI model artifacts as
/// content-addressed OCI images.
#[derive(Debug, Parser)]
#[command(name = "modctl", author, version, styles = styles::styles())]
pub struct ModctlArgs {
    /// The subcommand to run.
    #[command(subcommand)]
    pub subcommand: Option<ModctlSubcommand>,

    /// Root directory of the local content-addressed store.
    #[arg(long, global = true)]
    pub storage_dir: Option<PathBuf>,

    /// Directory log files are written to.
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Log level (`trace`, `debug`, `info`, `warn`, `error`).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Disables progress bar rendering.
    #[arg(long, global = true)]
    pub no_progress: bool,
}

/// The public verbs: one variant per `modctl` subcommand.
#[derive(Debug, Clone, Subcommand)]
pub enum ModctlSubcommand {
    /// Build an artifact from a workspace directory.
    Build {
        /// Workspace directory to walk.
        path: PathBuf,

        /// Target reference; must include a tag.
        #[arg(short, long)]
        target: Reference,

        /// Path to the build recipe (Modelfile).
        #[arg(short = 'f', long, default_value = "Modelfile")]
        modelfile: PathBuf,

        /// Bounded concurrency for file processing.
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Push the built artifact directly to a remote registry instead of
        /// the local store.
        #[arg(long)]
        output_remote: bool,

        /// Use HTTP instead of HTTPS when `--output-remote` is set.
        #[arg(long)]
        plain_http: bool,

        /// Skip TLS certificate verification when `--output-remote` is set.
        #[arg(long)]
        insecure: bool,

        /// Force every layer through the raw codec.
        #[arg(long)]
        raw: bool,

        /// Set `capabilities.reasoning` on the model config.
        #[arg(long)]
        reasoning: bool,

        /// Suppress the `created` annotation and config timestamp.
        #[arg(long)]
        no_creation_time: bool,

        /// Override the probed provenance source URL.
        #[arg(long)]
        source_url: Option<String>,

        /// Override the probed provenance revision.
        #[arg(long)]
        source_revision: Option<String>,
    },

    /// Push an artifact from the local store to a remote registry.
    Push {
        /// Artifact to push; must include a tag.
        target: Reference,

        /// Use HTTP instead of HTTPS.
        #[arg(long)]
        plain_http: bool,

        /// Skip TLS certificate verification.
        #[arg(long)]
        insecure: bool,

        /// Proxy URL for the remote round trip.
        #[arg(long)]
        proxy: Option<String>,

        /// Explicit authfile path, overriding the ambient Docker config.
        #[arg(long)]
        authfile: Option<PathBuf>,
    },

    /// Pull an artifact from a remote registry into the local store.
    Pull {
        /// Artifact to pull.
        target: Reference,

        /// Use HTTP instead of HTTPS.
        #[arg(long)]
        plain_http: bool,

        /// Skip TLS certificate verification.
        #[arg(long)]
        insecure: bool,

        /// Proxy URL for the remote round trip.
        #[arg(long)]
        proxy: Option<String>,

        /// Explicit authfile path, overriding the ambient Docker config.
        #[arg(long)]
        authfile: Option<PathBuf>,

        /// Re-run extraction over the pulled manifest into this directory.
        #[arg(long)]
        extract_dir: Option<PathBuf>,

        /// Stream layers straight to `--extract-dir` without populating the
        /// local store.
        #[arg(long)]
        extract_from_remote: bool,

        /// Fetch every layer blob through this local P2P daemon endpoint
        /// instead of the direct HTTPS path.
        #[arg(long)]
        dragonfly_endpoint: Option<String>,
    },

    /// Selectively fetch layers from a remote registry by path pattern.
    Fetch {
        /// Source artifact.
        target: Reference,

        /// Glob patterns matched against each layer's `filepath` annotation.
        #[arg(long = "patterns", required = true)]
        patterns: Vec<String>,

        /// Destination directory.
        #[arg(short, long)]
        output: PathBuf,

        /// Bounded concurrency (reserved; fetch streams sequentially today,
        /// matching single-pass description).
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Use HTTP instead of HTTPS.
        #[arg(long)]
        plain_http: bool,

        /// Skip TLS certificate verification.
        #[arg(long)]
        insecure: bool,

        /// Proxy URL for the remote round trip.
        #[arg(long)]
        proxy: Option<String>,
    },

    /// Extract a local artifact's layers back onto disk.
    Extract {
        /// Artifact to extract.
        target: Reference,

        /// Destination directory.
        #[arg(short, long)]
        output: PathBuf,

        /// Bounded concurrency for layer decoding.
        #[arg(short, long)]
        concurrency: Option<usize>,
    },

    /// Attach (append or replace) one file in an existing artifact.
    Attach {
        /// File to attach.
        file: PathBuf,

        /// Source artifact.
        #[arg(short, long)]
        src: Reference,

        /// Target the rebuilt artifact is written under; must include a tag.
        #[arg(short, long)]
        target: Reference,

        /// Replace an existing layer at the same destination path instead
        /// of failing.
        #[arg(long)]
        force: bool,

        /// Force the new layer through the raw codec.
        #[arg(long)]
        raw: bool,

        /// Treat `file` as a model-config JSON document replacing the
        /// config blob directly.
        #[arg(long)]
        config: bool,

        /// Read/write both source and target through a remote registry
        /// instead of the local store.
        #[arg(long)]
        output_remote: bool,

        /// Use HTTP instead of HTTPS when `--output-remote` is set.
        #[arg(long)]
        plain_http: bool,

        /// Skip TLS certificate verification when `--output-remote` is set.
        #[arg(long)]
        insecure: bool,
    },

    /// Copy an artifact to a new repository/tag without re-hashing it.
    Tag {
        /// Source artifact.
        src: Reference,

        /// Destination repository/tag.
        target: Reference,
    },

    /// Remove a tag, or a manifest and all its tags by digest.
    Rm {
        /// Artifact to remove.
        target: Reference,
    },

    /// Delete blobs unreachable from any tagged or indexed manifest.
    Prune,

    /// Print a flat JSON report of an artifact's manifest and config.
    Inspect {
        /// Artifact to inspect.
        target: Reference,

        /// Read from a remote registry instead of the local store.
        #[arg(long)]
        output_remote: bool,

        /// Use HTTP instead of HTTPS when `--output-remote` is set.
        #[arg(long)]
        plain_http: bool,

        /// Skip TLS certificate verification when `--output-remote` is set.
        #[arg(long)]
        insecure: bool,
    },

    /// List every artifact in the local store.
    #[command(name = "ls")]
    List,

    /// Store credentials for a registry.
    Login {
        /// Registry host.
        registry: String,

        /// Username.
        #[arg(short, long)]
        username: Option<String>,

        /// Password (prefer `--password-stdin`).
        #[arg(short, long)]
        password: Option<String>,

        /// Read the password from stdin.
        #[arg(long)]
        password_stdin: bool,

        /// Explicit authfile path, overriding the ambient Docker config
        /// location.
        #[arg(long)]
        authfile: Option<PathBuf>,

        /// Use HTTP instead of HTTPS to validate credentials.
        #[arg(long)]
        plain_http: bool,
    },

    /// Remove stored credentials for a registry.
    Logout {
        /// Registry host.
        registry: String,

        /// Explicit authfile path, overriding the ambient Docker config
        /// location.
        #[arg(long)]
        authfile: Option<PathBuf>,
    },

    /// Print version information.
    Version,
}
