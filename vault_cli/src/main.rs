use crate::init_config::CmdConfig;
use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use clap_verbosity_flag::InfoLevel;
use directories::ProjectDirs;
use std::path::PathBuf;

mod cmd;
mod config;
mod helpers;
mod init_config;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Database the addressed assets belong to
    #[arg(short, long, value_name = "ID", default_value = "default")]
    database: String,

    #[command(flatten)]
    verbosity: clap_verbosity_flag::Verbosity<InfoLevel>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Modify the vault config
    Config {
        #[command(subcommand)]
        cmd: CmdConfig,
    },
    /// Register and inspect asset records
    Asset {
        #[command(subcommand)]
        cmd: AssetCmd,
    },
    /// File lifecycle operations on one asset
    File {
        #[command(subcommand)]
        cmd: FileCmd,
    },
}

#[derive(Subcommand)]
enum AssetCmd {
    /// Create an asset record whose files live under `<asset id>/` in the
    /// content bucket
    Register {
        asset_id: String,
        /// Override the asset's base key
        #[arg(long, value_name = "KEY")]
        location: Option<String>,
    },
    /// Print the asset record
    Show { asset_id: String },
    /// Record the live version of every file as a new asset version and
    /// make it current
    Capture {
        asset_id: String,
        /// Id of the asset version to record
        version_id: String,
    },
}

#[derive(Subcommand)]
enum FileCmd {
    /// Upload a local file into the asset
    Put {
        asset_id: String,
        /// Destination path inside the asset, starting with `/`
        path: String,
        /// Local file to upload
        source: PathBuf,
        #[arg(long, value_name = "MIME")]
        content_type: Option<String>,
    },
    /// List the files of an asset
    Ls {
        asset_id: String,
        #[arg(long, value_name = "PATH")]
        prefix: Option<String>,
        /// Include archived files
        #[arg(short, long, action = ArgAction::SetTrue)]
        archived: bool,
        #[arg(long, value_name = "COUNT", default_value_t = 1000)]
        max_items: usize,
        #[arg(long, value_name = "COUNT", default_value_t = 1000)]
        page_size: usize,
        /// Continuation token printed by a previous listing
        #[arg(long, value_name = "TOKEN")]
        token: Option<String>,
    },
    /// Show the metadata of one file
    Info {
        asset_id: String,
        path: String,
        /// Include the version history
        #[arg(long, action = ArgAction::SetTrue)]
        versions: bool,
    },
    /// Archive a file, or every file under a prefix
    Archive {
        asset_id: String,
        path: String,
        #[arg(long, action = ArgAction::SetTrue)]
        prefix: bool,
    },
    /// Restore an archived file
    Unarchive { asset_id: String, path: String },
    /// Permanently delete a file with all of its versions
    Rm {
        asset_id: String,
        path: String,
        #[arg(long, action = ArgAction::SetTrue)]
        prefix: bool,
        /// Confirm the permanent deletion
        #[arg(long, action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Make an earlier version the current one
    Revert {
        asset_id: String,
        path: String,
        version_id: String,
    },
    /// Copy a file, optionally into another asset of the same database
    Cp {
        asset_id: String,
        source: String,
        destination: String,
        #[arg(long, value_name = "ASSET_ID")]
        to_asset: Option<String>,
    },
    /// Move a file within the asset
    Mv {
        asset_id: String,
        source: String,
        destination: String,
    },
    /// Set or clear (with an empty type) the primary type of a file
    SetPrimary {
        asset_id: String,
        path: String,
        primary_type: String,
        /// Free-form type, required when the type is `other`
        #[arg(long, value_name = "TYPE")]
        other: Option<String>,
    },
    /// Create an empty folder, the key must end with `/`
    Mkdir { asset_id: String, key: String },
    /// Delete the auxiliary files under a path
    RmAux { asset_id: String, path: String },
    /// Delete the asset-level preview image
    RmPreview { asset_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(std::io::stderr)
        .init();

    // Configs under ~/.config/vault/vault.toml, data under
    // ~/.local/share/vault/ unless the config says otherwise.
    let dirs =
        ProjectDirs::from("", "", "vault").context("failed to determine config directory path")?;
    let config_file = cli
        .config
        .unwrap_or_else(|| dirs.config_dir().join("vault.toml"));

    cmd::run_command(config_file, dirs.data_dir(), &cli.database, cli.cmd).await
}
