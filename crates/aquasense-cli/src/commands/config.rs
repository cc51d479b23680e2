//! Config command implementation.

use std::path::Path;

use anyhow::{Result, bail};

use crate::cli::ConfigAction;
use crate::config::Config;
use crate::util::write_output;

pub fn cmd_config(action: ConfigAction, path: &Path) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = Config::load_from(path);
            let content = toml::to_string_pretty(&config)?;
            write_output(None, &content)
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load_from(path);
            config.set(key, &value)?;
            config.save_to(path)?;
            eprintln!("Updated {}", path.display());
            Ok(())
        }
        ConfigAction::Path => write_output(None, &format!("{}\n", path.display())),
        ConfigAction::Init => {
            if path.exists() {
                bail!("Config file already exists: {}", path.display());
            }
            Config::default().save_to(path)?;
            eprintln!("Created {}", path.display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ConfigKey;

    #[test]
    fn test_init_then_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        cmd_config(ConfigAction::Init, &path).unwrap();
        assert!(cmd_config(ConfigAction::Init, &path).is_err());

        cmd_config(
            ConfigAction::Set {
                key: ConfigKey::BaseUrl,
                value: "http://pond.local:8000".to_string(),
            },
            &path,
        )
        .unwrap();
        assert_eq!(Config::load_from(&path).base_url, "http://pond.local:8000");
    }
}
