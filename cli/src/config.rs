// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{error::Error, path::PathBuf};

use calsys_freebusy::SysConfig;
use tokio::fs;

use crate::cli::APP_NAME;

const CALSYS_CONFIG_ENV: &str = "CALSYS_CONFIG";

/// Loads the backend configuration from `--config`, `$CALSYS_CONFIG`, or the
/// user configuration directory, in that order.
#[tracing::instrument]
pub async fn parse_config(path: Option<PathBuf>) -> Result<SysConfig, Box<dyn Error>> {
    let path = if let Some(path) = path {
        path
    } else if let Ok(env_path) = std::env::var(CALSYS_CONFIG_ENV) {
        PathBuf::from(env_path)
    } else {
        let config = get_config_dir()?.join(format!("{APP_NAME}/config.toml"));
        if !config.exists() {
            return Err(format!("No config found at: {}", config.display()).into());
        }
        config
    };

    let content = fs::read_to_string(&path)
        .await
        .map_err(|e| format!("Failed to read config file at {}: {}", path.display(), e))?;
    Ok(SysConfig::from_toml(&content)?)
}

fn get_config_dir() -> Result<PathBuf, Box<dyn Error>> {
    #[cfg(unix)]
    let config_dir = xdg::BaseDirectories::new().get_config_home();
    #[cfg(windows)]
    let config_dir = dirs::config_dir();
    config_dir.ok_or_else(|| "User-specific home directory not found".into())
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use std::sync::OnceLock;
    use tempfile::TempDir;
    use tokio::sync::Mutex;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn write_config(dir: &TempDir, file: &str, server: &str) -> PathBuf {
        let path = dir.path().join(file);
        let content = format!(
            r#"
[servers.{server}]
kind = "domino"
base_url = "https://{server}.example.com"
"#
        );
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn cli_flag_overrides_env_var() {
        let temp_dir = TempDir::new().unwrap();
        let flag_path = write_config(&temp_dir, "config.toml", "flag");
        let env_path = write_config(&temp_dir, "env.toml", "env");

        let _guard = env_lock().lock().await;
        unsafe {
            std::env::set_var(CALSYS_CONFIG_ENV, &env_path);
        }

        let config = parse_config(Some(flag_path)).await.unwrap();
        assert!(config.server("flag").is_some());

        let config = parse_config(None).await.unwrap();
        assert!(config.server("env").is_some());

        unsafe {
            std::env::remove_var(CALSYS_CONFIG_ENV);
        }
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let err = parse_config(Some(temp_dir.path().join("absent.toml")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[tokio::test]
    async fn invalid_config_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[servers.x]\nkind = \"domino\"\nbase_url = \"\"\n").unwrap();
        let err = parse_config(Some(path)).await.unwrap_err();
        assert!(err.to_string().contains("empty base_url"));
    }
}
