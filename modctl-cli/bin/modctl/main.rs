#[path = "handlers.rs"]
mod handlers;

use clap::{CommandFactory, Parser};
use modctl_cli::{ModctlArgs, ModctlCliResult, ModctlSubcommand};

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ModctlCliResult<()> {
    let args = ModctlArgs::parse();

    handlers::log_level(&args);
    init_tracing(&args);

    match args.subcommand.clone() {
        Some(ModctlSubcommand::Build {
            path,
            target,
            modelfile,
            concurrency,
            output_remote,
            plain_http,
            insecure,
            raw,
            reasoning,
            no_creation_time,
            source_url,
            source_revision,
        }) => {
            handlers::build_subcommand(
                &args,
                path,
                target,
                modelfile,
                concurrency,
                output_remote,
                plain_http,
                insecure,
                raw,
                reasoning,
                no_creation_time,
                source_url,
                source_revision,
            )
            .await?;
        }
        Some(ModctlSubcommand::Push {
            target,
            plain_http,
            insecure,
            proxy,
            authfile,
        }) => {
            handlers::push_subcommand(&args, target, plain_http, insecure, proxy, authfile).await?;
        }
        Some(ModctlSubcommand::Pull {
            target,
            plain_http,
            insecure,
            proxy,
            authfile,
            extract_dir,
            extract_from_remote,
            dragonfly_endpoint,
        }) => {
            handlers::pull_subcommand(
                &args,
                target,
                plain_http,
                insecure,
                proxy,
                authfile,
                extract_dir,
                extract_from_remote,
                dragonfly_endpoint,
            )
            .await?;
        }
        Some(ModctlSubcommand::Fetch {
            target,
            patterns,
            output,
            concurrency,
            plain_http,
            insecure,
            proxy,
        }) => {
            handlers::fetch_subcommand(&args, target, patterns, output, concurrency, plain_http, insecure, proxy).await?;
        }
        Some(ModctlSubcommand::Extract { target, output, concurrency }) => {
            handlers::extract_subcommand(&args, target, output, concurrency).await?;
        }
        Some(ModctlSubcommand::Attach {
            file,
            src,
            target,
            force,
            raw,
            config,
            output_remote,
            plain_http,
            insecure,
        }) => {
            handlers::attach_subcommand(&args, file, src, target, force, raw, config, output_remote, plain_http, insecure).await?;
        }
        Some(ModctlSubcommand::Tag { src, target }) => {
            handlers::tag_subcommand(&args, src, target).await?;
        }
        Some(ModctlSubcommand::Rm { target }) => {
            handlers::rm_subcommand(&args, target).await?;
        }
        Some(ModctlSubcommand::Prune) => {
            handlers::prune_subcommand(&args).await?;
        }
        Some(ModctlSubcommand::Inspect {
            target,
            output_remote,
            plain_http,
            insecure,
        }) => {
            handlers::inspect_subcommand(&args, target, output_remote, plain_http, insecure).await?;
        }
        Some(ModctlSubcommand::List) => {
            handlers::list_subcommand(&args).await?;
        }
        Some(ModctlSubcommand::Login {
            registry,
            username,
            password,
            password_stdin,
            authfile,
            plain_http: _,
        }) => {
            handlers::login_subcommand(registry, username, password, password_stdin, authfile).await?;
        }
        Some(ModctlSubcommand::Logout { registry, authfile }) => {
            handlers::logout_subcommand(registry, authfile).await?;
        }
        Some(ModctlSubcommand::Version) => {
            handlers::version_subcommand();
        }
        None => {
            ModctlArgs::command().print_help()?;
        }
    }

    Ok(())
}

/// Initializes the `tracing` subscriber, writing to a rolling file under
/// `--log-dir` when set, in addition to stderr — the same ambient logging
/// stack the rest of the workspace uses (`tracing` + `tracing-subscriber` +
/// `tracing-appender`), per SPEC_FULL.md's ambient-stack section.
fn init_tracing(args: &ModctlArgs) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let log_dir = args.log_dir.clone().unwrap_or_else(|| modctl_utils::defaults::DEFAULT_LOG_DIR.clone());
    let _ = std::fs::create_dir_all(&log_dir);

    let file_appender = tracing_appender::rolling::daily(&log_dir, "modctl.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    // Leaked intentionally: the guard must outlive every subscriber write,
    // and main runs for the whole process lifetime.
    std::mem::forget(guard);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();
}
