//! Command line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use nexus_cli::deps::ENV_FILE;
use nexus_cli::transfer::{TransferOptionsBuilder, DEFAULT_CHECKSUM};

/// Upload, download and pin raw artifacts in a Nexus repository
#[derive(Parser, Debug)]
#[command(name = "nexus-cli", version, about, long_about = None)]
pub struct Cli {
    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a local directory to repository[/path]
    Upload {
        /// Local directory
        src: PathBuf,

        /// repository or repository/path, optionally ending in an archive name with --compress
        dest: String,

        #[command(flatten)]
        transfer: TransferArgs,
    },

    /// Download repository/path into a local directory
    Download {
        /// repository/path, ending in an archive name with --compress
        src: String,

        /// Local directory
        dest: PathBuf,

        #[command(flatten)]
        transfer: TransferArgs,

        /// Drop the source path prefix from local file names
        #[arg(short, long)]
        flatten: bool,

        /// Delete local files that do not exist remotely
        #[arg(long)]
        delete: bool,

        /// Include assets in subdirectories
        #[arg(short, long)]
        recursive: bool,
    },

    /// Manage pinned dependencies (deps.ini / deps-lock.ini)
    Deps {
        #[command(subcommand)]
        command: DepsCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum DepsCommand {
    /// Create a template deps.ini
    Init,

    /// Resolve dependencies and write deps-lock.ini
    Lock,

    /// Download dependencies and verify them against deps-lock.ini
    Sync {
        /// Keep files in output directories that are not in the lock file
        #[arg(long)]
        no_cleanup: bool,
    },

    /// Write DEPS_* variables for every dependency
    Env {
        /// Output file
        #[arg(short, long, default_value = ENV_FILE)]
        output: PathBuf,
    },
}

/// Flags shared by upload and download.
#[derive(Args, Debug, Clone)]
pub struct TransferArgs {
    /// Checksum algorithm for skip decisions (sha1, sha256, sha512, md5)
    #[arg(short, long, default_value = DEFAULT_CHECKSUM)]
    pub checksum: String,

    /// Skip files that already exist without comparing checksums
    #[arg(short, long)]
    pub skip_checksum: bool,

    /// Transfer every file, even if it already exists
    #[arg(long)]
    pub force: bool,

    /// Show what would be transferred without doing it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Comma-separated glob patterns; prefix with ! to exclude
    #[arg(short, long)]
    pub glob: Option<String>,

    /// Transfer the directory as a single archive
    #[arg(short = 'z', long)]
    pub compress: bool,

    /// Archive format: gzip, zstd or zip
    #[arg(long, value_name = "FORMAT")]
    pub compress_format: Option<String>,

    /// Replace {key} in the remote path with the sha256 of this file
    #[arg(long, value_name = "FILE")]
    pub key_from: Option<PathBuf>,

    /// Maximum number of concurrent transfers
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,
}

impl TransferArgs {
    pub fn builder(&self, quiet: bool) -> TransferOptionsBuilder {
        let mut builder = nexus_cli::transfer::TransferOptions::builder()
            .checksum(self.checksum.clone())
            .skip_checksum(self.skip_checksum)
            .force(self.force)
            .dry_run(self.dry_run)
            .compress(self.compress)
            .quiet(quiet);
        if let Some(glob) = &self.glob {
            builder = builder.glob(glob.clone());
        }
        if let Some(format) = &self.compress_format {
            builder = builder.compression_format(format.clone());
        }
        if let Some(key_from) = &self.key_from {
            builder = builder.key_from(key_from.clone());
        }
        if let Some(limit) = self.concurrency {
            builder = builder.concurrency(limit);
        }
        builder
    }
}
