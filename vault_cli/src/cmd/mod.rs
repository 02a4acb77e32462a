use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::{Vault, VaultConfig};

mod asset;
mod file;

pub use asset::run_asset;
pub use file::run_file;

pub async fn run_command(
    config_file: PathBuf,
    local_data_dir: &Path,
    database_id: &str,
    cmd: crate::Commands,
) -> Result<()> {
    match cmd {
        crate::Commands::Config { cmd } => cmd.run(&config_file, local_data_dir),
        crate::Commands::Asset { cmd } => {
            let vault = Vault::open(VaultConfig::load(&config_file)?, database_id)?;
            run_asset(cmd, &vault).await
        }
        crate::Commands::File { cmd } => {
            let vault = Vault::open(VaultConfig::load(&config_file)?, database_id)?;
            run_file(cmd, &vault).await
        }
    }
}
