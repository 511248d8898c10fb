//! Configuration file management for campaign.
//!
//! Config is read from `./campaign.toml`, falling back to
//! `~/.config/campaign/config.toml`, and resolved with the chain:
//! CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const LOCAL_CONFIG_FILE: &str = "campaign.toml";

pub const DEFAULT_DIR: &str = "campaign";
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5173;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub campaign: CampaignSection,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CampaignSection {
    /// Campaign directory, relative to the working directory.
    pub dir: Option<PathBuf>,
    /// Client behavior loader name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub bind: Option<String>,
    pub port: Option<u16>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the user-level campaign config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/campaign` or
/// `~/.config/campaign`, never the platform-specific `dirs::config_dir()`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("campaign");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("campaign")
}

/// Return the path to the user-level config file.
pub fn user_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

pub fn parse_config(contents: &str) -> Result<ConfigFile> {
    toml::from_str(contents).context("failed to parse config file")
}

fn read_config(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("invalid config file {}", path.display()))
}

/// Load the first config file found: `./campaign.toml`, then the user
/// config. `None` when neither exists; a file that exists but does not
/// parse is an error.
pub fn load_config() -> Result<Option<ConfigFile>> {
    for path in [PathBuf::from(LOCAL_CONFIG_FILE), user_config_path()] {
        if path.exists() {
            debug!(path = %path.display(), "loading config file");
            return read_config(&path).map(Some);
        }
    }
    Ok(None)
}

/// Serialize and write a config file.
pub fn save_config(path: &Path, config: &ConfigFile) -> Result<()> {
    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))
}

/// Execute `campaign init`: write `./campaign.toml` with the defaults.
pub fn cmd_init(force: bool) -> Result<()> {
    let path = PathBuf::from(LOCAL_CONFIG_FILE);
    init_at(&path, force)?;

    println!("Config written to {}", path.display());
    println!("  campaign.dir = {DEFAULT_DIR}");
    println!("  server.bind = {DEFAULT_BIND}");
    println!("  server.port = {DEFAULT_PORT}");
    println!();
    println!("Next: run `campaign serve` to start the dev server.");
    Ok(())
}

fn init_at(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }
    let cfg = ConfigFile {
        campaign: CampaignSection {
            dir: Some(PathBuf::from(DEFAULT_DIR)),
            client: None,
        },
        server: ServerSection {
            bind: Some(DEFAULT_BIND.to_string()),
            port: Some(DEFAULT_PORT),
        },
    };
    save_config(path, &cfg)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line.
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub dir: Option<PathBuf>,
    pub bind: Option<String>,
    pub port: Option<u16>,
}

impl CliOverrides {
    pub fn dir(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            ..Self::default()
        }
    }
}

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignConfig {
    pub dir: PathBuf,
    pub bind: String,
    pub port: u16,
    pub client: Option<String>,
}

impl CampaignConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - dir: `--dir` > `CAMPAIGN_DIR` > `campaign.dir` > `campaign`
    /// - bind: `--bind` > `CAMPAIGN_BIND` > `server.bind` > `127.0.0.1`
    /// - port: `--port` > `CAMPAIGN_PORT` > `server.port` > `5173`
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let file = load_config()?;
        Self::resolve_with(cli, file.unwrap_or_default())
    }

    fn resolve_with(cli: &CliOverrides, file: ConfigFile) -> Result<Self> {
        let dir = if let Some(dir) = &cli.dir {
            dir.clone()
        } else if let Ok(dir) = std::env::var("CAMPAIGN_DIR") {
            PathBuf::from(dir)
        } else if let Some(dir) = file.campaign.dir {
            dir
        } else {
            PathBuf::from(DEFAULT_DIR)
        };

        let bind = if let Some(bind) = &cli.bind {
            bind.clone()
        } else if let Ok(bind) = std::env::var("CAMPAIGN_BIND") {
            bind
        } else if let Some(bind) = file.server.bind {
            bind
        } else {
            DEFAULT_BIND.to_string()
        };

        let port = if let Some(port) = cli.port {
            port
        } else if let Ok(port) = std::env::var("CAMPAIGN_PORT") {
            port.parse::<u16>()
                .with_context(|| format!("CAMPAIGN_PORT env var is not a valid port: {port}"))?
        } else if let Some(port) = file.server.port {
            port
        } else {
            DEFAULT_PORT
        };

        Ok(Self {
            dir,
            bind,
            port,
            client: file.campaign.client,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    fn clear_env() {
        unsafe { std::env::remove_var("CAMPAIGN_DIR") };
        unsafe { std::env::remove_var("CAMPAIGN_BIND") };
        unsafe { std::env::remove_var("CAMPAIGN_PORT") };
    }

    fn sample_file() -> ConfigFile {
        parse_config(
            r#"
[campaign]
dir = "from-file"
client = "popup"

[server]
bind = "0.0.0.0"
port = 8080
"#,
        )
        .unwrap()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let _lock = lock_env();
        clear_env();

        let config = CampaignConfig::resolve_with(&CliOverrides::default(), ConfigFile::default()).unwrap();
        assert_eq!(config.dir, PathBuf::from(DEFAULT_DIR));
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.client, None);
    }

    #[test]
    fn config_file_overrides_defaults() {
        let _lock = lock_env();
        clear_env();

        let config = CampaignConfig::resolve_with(&CliOverrides::default(), sample_file()).unwrap();
        assert_eq!(config.dir, PathBuf::from("from-file"));
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.client.as_deref(), Some("popup"));
    }

    #[test]
    fn env_var_overrides_config_file() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var("CAMPAIGN_DIR", "from-env") };
        unsafe { std::env::set_var("CAMPAIGN_PORT", "9000") };

        let config = CampaignConfig::resolve_with(&CliOverrides::default(), sample_file()).unwrap();
        assert_eq!(config.dir, PathBuf::from("from-env"));
        assert_eq!(config.port, 9000);
        assert_eq!(config.bind, "0.0.0.0");

        clear_env();
    }

    #[test]
    fn cli_flag_overrides_all() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var("CAMPAIGN_DIR", "from-env") };
        unsafe { std::env::set_var("CAMPAIGN_BIND", "10.0.0.1") };

        let cli = CliOverrides {
            dir: Some(PathBuf::from("from-cli")),
            bind: Some("::1".to_string()),
            port: Some(3000),
        };
        let config = CampaignConfig::resolve_with(&cli, sample_file()).unwrap();
        assert_eq!(config.dir, PathBuf::from("from-cli"));
        assert_eq!(config.bind, "::1");
        assert_eq!(config.port, 3000);

        clear_env();
    }

    #[test]
    fn invalid_port_env_is_an_error() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var("CAMPAIGN_PORT", "not-a-port") };

        let result = CampaignConfig::resolve_with(&CliOverrides::default(), ConfigFile::default());
        clear_env();

        let msg = format!("{:#}", result.unwrap_err());
        assert!(msg.contains("CAMPAIGN_PORT"), "unexpected error: {msg}");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_config("[server]\nhost = \"x\"").is_err());
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join(LOCAL_CONFIG_FILE);

        init_at(&path, false).unwrap();
        let err = init_at(&path, false).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        init_at(&path, true).unwrap();

        let loaded = read_config(&path).unwrap();
        assert_eq!(loaded.campaign.dir, Some(PathBuf::from(DEFAULT_DIR)));
        assert_eq!(loaded.server.port, Some(DEFAULT_PORT));
    }

    #[test]
    fn user_config_path_ends_with_expected_filename() {
        let path = user_config_path();
        assert!(
            path.ends_with("campaign/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
