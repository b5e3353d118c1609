mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, DepsCommand};
use nexus_cli::config::Config;
use nexus_cli::deps::{
    self, init_manifest, write_env, Dependency, LockFile, Manifest, SyncOptions, LOCK_FILE, MANIFEST_FILE,
};
use nexus_cli::remote::{self, Repository};
use nexus_cli::transfer::{download_folder, upload_folder, FolderStatus};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let code = match run(cli).await {
        Ok(status) => status.code(),
        Err(err) => {
            eprintln!("Error: {}", err);
            err.downcast_ref::<nexus_cli::Error>()
                .map(FolderStatus::from_error)
                .unwrap_or(FolderStatus::Error)
                .code()
        }
    };
    std::process::exit(code);
}

// RUST_LOG wins; otherwise -v means debug and -q means errors only.
fn init_logging(quiet: bool, verbose: bool) {
    let fallback = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<FolderStatus> {
    let quiet = cli.quiet;
    match cli.command {
        Command::Upload { src, dest, transfer } => {
            let options = transfer.builder(quiet).build()?;
            let repo = remote::connect(&Config::load()?)?;
            let report = upload_folder(repo, &src, &dest, &options).await?;
            Ok(report.status)
        }
        Command::Download {
            src,
            dest,
            transfer,
            flatten,
            delete,
            recursive,
        } => {
            let options = transfer
                .builder(quiet)
                .flatten(flatten)
                .delete_extra(delete)
                .recursive(recursive)
                .build()?;
            let repo = remote::connect(&Config::load()?)?;
            let report = download_folder(repo, &src, &dest, &options).await?;
            Ok(report.status)
        }
        Command::Deps { command } => run_deps(command, quiet).await,
    }
}

async fn run_deps(command: DepsCommand, quiet: bool) -> Result<FolderStatus> {
    let manifest_path = Path::new(MANIFEST_FILE);
    let lock_path = Path::new(LOCK_FILE);

    match command {
        DepsCommand::Init => {
            init_manifest(manifest_path)?;
            if !quiet {
                println!("Created {}", MANIFEST_FILE);
            }
        }
        DepsCommand::Lock => {
            let manifest = Manifest::load(manifest_path)?;
            let config = Config::load()?;
            let lock = deps::resolve(&manifest, connector(&config)).await?;
            lock.save(lock_path)?;
            if !quiet {
                let files: usize = lock.dependencies().map(|(_, files)| files.len()).sum();
                println!(
                    "Locked {} dependencies ({} files) in {}",
                    lock.len(),
                    files,
                    LOCK_FILE
                );
            }
        }
        DepsCommand::Sync { no_cleanup } => {
            let manifest = Manifest::load(manifest_path)?;
            let lock = LockFile::load(lock_path)?;
            let config = Config::load()?;
            let options = SyncOptions {
                cleanup: !no_cleanup,
                quiet,
                concurrency: None,
            };
            let report = deps::sync(&manifest, &lock, connector(&config), &options).await?;
            if !quiet {
                println!(
                    "Synced {} dependencies, {} files verified",
                    report.dependencies, report.files_verified
                );
                if !no_cleanup {
                    println!("Removed {} untracked files", report.deleted);
                }
            }
        }
        DepsCommand::Env { output } => {
            let manifest = Manifest::load(manifest_path)?;
            write_env(&manifest, &output)?;
            if !quiet {
                println!("Wrote {}", output.display());
            }
        }
    }
    Ok(FolderStatus::Success)
}

/// Connect each dependency to its own server when it names one.
fn connector(config: &Config) -> impl Fn(&Dependency) -> nexus_cli::Result<Arc<dyn Repository>> + '_ {
    move |dep: &Dependency| Ok(remote::connect(&config.for_url(dep.url()))?)
}
