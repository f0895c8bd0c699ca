//! Config file commands

use anyhow::{bail, Result};
use clap::Subcommand;
use std::path::Path;

use crate::config::Config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration (file plus flags)
    Show,
    /// Write a config file with the default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the config file location
    Path,
}

/// Handle config commands
pub fn handle_config_command(config: &Config, path: &Path, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            print!("{}", toml::to_string_pretty(config)?);
        }
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "{} already exists. Use --force to overwrite it.",
                    path.display()
                );
            }
            Config::default().save(path)?;
            println!("✅ Wrote {}", path.display());
        }
        ConfigCommands::Path => println!("{}", path.display()),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_defaults_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");

        handle_config_command(&Config::default(), &path, ConfigCommands::Init { force: false })
            .unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().region, "us-west-1");

        let err =
            handle_config_command(&Config::default(), &path, ConfigCommands::Init { force: false })
                .unwrap_err();
        assert!(err.to_string().contains("already exists"));

        handle_config_command(&Config::default(), &path, ConfigCommands::Init { force: true })
            .unwrap();
    }
}
