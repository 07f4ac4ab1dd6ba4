//! Subcommand handlers: each turns parsed CLI args into a `modctl-core`
//! options struct, runs the matching orchestrator under one [`OpContext`],
//! and prints a success summary to stdout.

use std::{
    io::Read,
    path::PathBuf,
    sync::Arc,
};

use console::style;
use modctl_cli::{ModctlArgs, ModctlCliError, ModctlCliResult};
use modctl_core::{
    ops::{self, OpContext},
    progress::{IndicatifProgress, NoopProgress, ProgressSink},
    reference::Reference,
    remote::RemoteOptions,
    store::ContentStore,
};
use modctl_utils::docker_config::{self, DockerAuthCredentials};

//--------------------------------------------------------------------------------------------------
// Functions: logging / setup
//--------------------------------------------------------------------------------------------------

/// Sets `RUST_LOG` from `--log-level`, if given, before the subscriber is
/// initialized.
pub fn log_level(args: &ModctlArgs) {
    if let Some(level) = &args.log_level {
        unsafe {
            std::env::set_var("RUST_LOG", level);
        }
    }
}

/// Opens the local content store at `--storage-dir` (or the default under
/// `~/.modctl`).
async fn open_store(args: &ModctlArgs) -> ModctlCliResult<Arc<ContentStore>> {
    let storage_dir = args
        .storage_dir
        .clone()
        .unwrap_or_else(modctl_utils::env::get_storage_dir_path);
    Ok(Arc::new(ContentStore::open(storage_dir).await?))
}

/// Builds the shared [`OpContext`] every subcommand runs under: opens the
/// store, picks a progress sink (disabled by `--no-progress` or a
/// non-terminal stdout), and applies the concurrency bound if given.
async fn build_context(args: &ModctlArgs, concurrency: Option<usize>) -> ModctlCliResult<OpContext> {
    let store = open_store(args).await?;
    let progress: Arc<dyn ProgressSink> = if args.no_progress || !modctl_utils::term::is_interactive_terminal() {
        Arc::new(NoopProgress)
    } else {
        Arc::new(IndicatifProgress::new())
    };

    let mut ctx = OpContext::new(store).with_progress(progress);
    if let Some(concurrency) = concurrency {
        ctx = ctx.with_concurrency(concurrency);
    }
    Ok(ctx)
}

fn remote_options(plain_http: bool, insecure: bool, proxy: Option<String>, authfile: Option<PathBuf>) -> RemoteOptions {
    RemoteOptions {
        plain_http,
        insecure,
        proxy,
        authfile,
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: subcommands
//--------------------------------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
pub async fn build_subcommand(
    args: &ModctlArgs,
    path: PathBuf,
    target: Reference,
    modelfile: PathBuf,
    concurrency: Option<usize>,
    output_remote: bool,
    plain_http: bool,
    insecure: bool,
    raw: bool,
    reasoning: bool,
    no_creation_time: bool,
    source_url: Option<String>,
    source_revision: Option<String>,
) -> ModctlCliResult<()> {
    let ctx = build_context(args, concurrency).await?;

    let remote = output_remote.then(|| remote_options(plain_http, insecure, None, None));

    let outcome = ops::build::build(
        &ctx,
        ops::build::BuildOptions {
            workspace: path,
            modelfile_path: modelfile,
            target,
            remote,
            raw,
            reasoning,
            no_creation_time,
            source_url,
            source_revision,
        },
    )
    .await?;

    println!(
        "{} built {} layers, manifest {}",
        style("✓").green(),
        outcome.layer_count,
        outcome.manifest_digest
    );
    Ok(())
}

pub async fn push_subcommand(
    args: &ModctlArgs,
    target: Reference,
    plain_http: bool,
    insecure: bool,
    proxy: Option<String>,
    authfile: Option<PathBuf>,
) -> ModctlCliResult<()> {
    let ctx = build_context(args, None).await?;

    let outcome = ops::push::push(
        &ctx,
        ops::push::PushOptions {
            target,
            remote: remote_options(plain_http, insecure, proxy, authfile),
        },
    )
    .await?;

    println!(
        "{} pushed {} layers, manifest {}",
        style("✓").green(),
        outcome.layers_pushed,
        outcome.manifest_digest
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn pull_subcommand(
    args: &ModctlArgs,
    target: Reference,
    plain_http: bool,
    insecure: bool,
    proxy: Option<String>,
    authfile: Option<PathBuf>,
    extract_dir: Option<PathBuf>,
    extract_from_remote: bool,
    dragonfly_endpoint: Option<String>,
) -> ModctlCliResult<()> {
    let ctx = build_context(args, None).await?;

    let outcome = ops::pull::pull(
        &ctx,
        ops::pull::PullOptions {
            target,
            remote: remote_options(plain_http, insecure, proxy, authfile),
            extract_dir,
            extract_from_remote,
            dragonfly_endpoint,
        },
    )
    .await?;

    match outcome.manifest_digest {
        Some(digest) => println!("{} pulled {} layers, manifest {}", style("✓").green(), outcome.layers_pulled, digest),
        None => println!("{} extracted {} layers", style("✓").green(), outcome.layers_pulled),
    }
    Ok(())
}

pub async fn fetch_subcommand(
    args: &ModctlArgs,
    target: Reference,
    patterns: Vec<String>,
    output: PathBuf,
    concurrency: Option<usize>,
    plain_http: bool,
    insecure: bool,
    proxy: Option<String>,
) -> ModctlCliResult<()> {
    let ctx = build_context(args, concurrency).await?;

    let outcome = ops::fetch::fetch(
        &ctx,
        ops::fetch::FetchOptions {
            target,
            patterns,
            output_dir: output,
            remote: remote_options(plain_http, insecure, proxy, None),
        },
    )
    .await?;

    println!("{} fetched {} layers", style("✓").green(), outcome.layers_fetched);
    Ok(())
}

pub async fn extract_subcommand(args: &ModctlArgs, target: Reference, output: PathBuf, concurrency: Option<usize>) -> ModctlCliResult<()> {
    let ctx = build_context(args, concurrency).await?;

    let outcome = ops::extract::extract(&ctx, ops::extract::ExtractOptions { target, output_dir: output }).await?;

    println!("{} extracted {} layers", style("✓").green(), outcome.layer_count);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn attach_subcommand(
    args: &ModctlArgs,
    file: PathBuf,
    src: Reference,
    target: Reference,
    force: bool,
    raw: bool,
    config: bool,
    output_remote: bool,
    plain_http: bool,
    insecure: bool,
) -> ModctlCliResult<()> {
    let ctx = build_context(args, None).await?;

    let remote = output_remote.then(|| remote_options(plain_http, insecure, None, None));

    let outcome = ops::attach::attach(
        &ctx,
        ops::attach::AttachOptions {
            source: src,
            target,
            file_path: file,
            force,
            raw,
            config,
            remote,
        },
    )
    .await?;

    if outcome.changed {
        println!("{} attached, manifest {}", style("✓").green(), outcome.manifest_digest);
    } else {
        println!("{} no-op (already attached), manifest {}", style("✓").green(), outcome.manifest_digest);
    }
    Ok(())
}

pub async fn tag_subcommand(args: &ModctlArgs, src: Reference, target: Reference) -> ModctlCliResult<()> {
    let ctx = build_context(args, None).await?;
    ops::tag::tag(&ctx, ops::tag::TagOptions { source: src, target: target.clone() }).await?;
    println!("{} tagged {target}", style("✓").green());
    Ok(())
}

pub async fn rm_subcommand(args: &ModctlArgs, target: Reference) -> ModctlCliResult<()> {
    let ctx = build_context(args, None).await?;
    ops::rm::rm(&ctx, ops::rm::RmOptions { target: target.clone() }).await?;
    println!("{} removed {target}", style("✓").green());
    Ok(())
}

pub async fn prune_subcommand(args: &ModctlArgs) -> ModctlCliResult<()> {
    let ctx = build_context(args, None).await?;
    let outcome = ops::prune::prune(&ctx).await?;
    for pruned in &outcome.pruned {
        println!("{pruned}");
    }
    println!("{} pruned {} blobs", style("✓").green(), outcome.pruned.len());
    Ok(())
}

pub async fn inspect_subcommand(args: &ModctlArgs, target: Reference, output_remote: bool, plain_http: bool, insecure: bool) -> ModctlCliResult<()> {
    let ctx = build_context(args, None).await?;

    let remote = output_remote.then(|| remote_options(plain_http, insecure, None, None));

    let report = ops::inspect::inspect(&ctx, ops::inspect::InspectOptions { target, remote }).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub async fn list_subcommand(args: &ModctlArgs) -> ModctlCliResult<()> {
    let ctx = build_context(args, None).await?;
    let items = ops::list::list(&ctx).await?;

    for item in &items {
        println!("{}\t{}\t{}\t{} bytes", item.repo, item.tag, item.digest, item.size);
    }
    Ok(())
}

pub async fn login_subcommand(
    registry: String,
    username: Option<String>,
    password: Option<String>,
    password_stdin: bool,
    authfile: Option<PathBuf>,
) -> ModctlCliResult<()> {
    let username = username.ok_or_else(|| ModctlCliError::InvalidArgument("login requires --username".to_string()))?;

    let password = if password_stdin {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf.trim_end().to_string()
    } else {
        password.ok_or_else(|| ModctlCliError::InvalidArgument("login requires --password or --password-stdin".to_string()))?
    };

    let path = authfile.or_else(docker_config::default_authfile_path).ok_or_else(|| {
        ModctlCliError::InvalidArgument("could not determine a credentials file location".to_string())
    })?;

    docker_config::store_registry_credentials(&path, &registry, &DockerAuthCredentials::Basic { username, password })?;

    println!("{} login succeeded for {registry}", style("✓").green());
    Ok(())
}

pub async fn logout_subcommand(registry: String, authfile: Option<PathBuf>) -> ModctlCliResult<()> {
    let path = authfile.or_else(docker_config::default_authfile_path).ok_or_else(|| {
        ModctlCliError::InvalidArgument("could not determine a credentials file location".to_string())
    })?;

    let removed = docker_config::remove_registry_credentials(&path, &registry)?;
    if removed {
        println!("{} removed credentials for {registry}", style("✓").green());
    } else {
        println!("no credentials stored for {registry}");
    }
    Ok(())
}

pub fn version_subcommand() {
    println!("modctl {}", env!("CARGO_PKG_VERSION"));
}
