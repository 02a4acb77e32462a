use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::Subcommand;
use toml_edit::{DocumentMut, Item, Table};
use tracing::info;
use vault_files::EngineConfig;

use crate::config::default_content_bucket;

#[derive(Subcommand)]
pub enum CmdConfig {
    /// Creates the config file if it doesn't exist and fills in missing
    /// defaults, keeping every value already set
    Init,
}

impl CmdConfig {
    pub fn run(self, config_file: &Path, local_data_dir: &Path) -> anyhow::Result<()> {
        let mut doc = if config_file.exists() {
            fs::read_to_string(config_file)?
        } else {
            if let Some(parent) = config_file.parent() {
                fs::create_dir_all(parent)?;
            }
            String::new()
        }
        .parse::<DocumentMut>()
        .context("could not parse config file")?;

        match self {
            Self::Init => {
                let data_dir = local_data_dir
                    .to_str()
                    .context("data directory path is not valid UTF-8")?;
                doc.entry("data_dir").or_insert(data_dir.into());
                doc.entry("content_bucket")
                    .or_insert(default_content_bucket().into());

                let defaults = EngineConfig::default();
                let engine = doc
                    .entry("engine")
                    .or_insert(Item::Table(Table::new()))
                    .as_table_mut()
                    .context("`engine` must be a table")?;
                engine
                    .entry("auxiliary_bucket")
                    .or_insert(defaults.auxiliary_bucket.as_str().into());
                engine
                    .entry("version_history_limit")
                    .or_insert((defaults.version_history_limit as i64).into());

                let retry = engine
                    .entry("retry")
                    .or_insert(Item::Table(Table::new()))
                    .as_table_mut()
                    .context("`engine.retry` must be a table")?;
                retry
                    .entry("max_attempts")
                    .or_insert(i64::from(defaults.retry.max_attempts).into());
                retry
                    .entry("base_delay_ms")
                    .or_insert((defaults.retry.base_delay_ms as i64).into());
                retry
                    .entry("max_delay_ms")
                    .or_insert((defaults.retry.max_delay_ms as i64).into());
            }
        }

        info!("writing to config file {config_file:?}");

        let tmp_path: PathBuf = config_file.with_extension("tmp");
        let mut tmp = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        tmp.write_all(doc.to_string().as_bytes())?;
        tmp.sync_all()?;
        fs::rename(&tmp_path, config_file)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VaultConfig;

    #[test]
    fn init_writes_a_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_file = dir.path().join("conf").join("vault.toml");
        let data_dir = dir.path().join("data");

        CmdConfig::Init.run(&config_file, &data_dir).unwrap();
        let config = VaultConfig::load(&config_file).unwrap();
        assert_eq!(config.data_dir, data_dir);
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn init_keeps_existing_values() {
        let dir = tempfile::tempdir().unwrap();
        let config_file = dir.path().join("vault.toml");
        fs::write(
            &config_file,
            "data_dir = \"/srv/vault\"\n\n[engine.retry]\nmax_attempts = 9\n",
        )
        .unwrap();

        CmdConfig::Init.run(&config_file, dir.path()).unwrap();
        let config = VaultConfig::load(&config_file).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/vault"));
        assert_eq!(config.engine.retry.max_attempts, 9);
        assert_eq!(config.content_bucket, "content");
    }
}
