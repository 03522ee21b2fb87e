//! Configuration loading and the CLI surface.
//!
//! Startup inputs, all read exactly once:
//! - `config.toml`: connection settings, owner allow-list, file paths;
//! - the optional local override file: customization prefix + silence
//!   toggle;
//! - the ignore-list file: one login per line;
//! - the command line: positional channel and logging verbosity.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;
use tracing_subscriber::filter::LevelFilter;

/// Top-level configuration, deserialized from `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Connection target and credentials.
    pub settings: Settings,
    /// Access policy inputs.
    #[serde(default)]
    pub access: AccessConfig,
    /// Filesystem collaborator locations.
    #[serde(default)]
    pub paths: Paths,
}

/// `[settings]`: connection target and credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Bot login; also the `NICK` we register with.
    pub username: String,
    /// Auth token passed straight through as `PASS`.
    pub password: String,
    /// Channel joined when no CLI argument is given.
    pub channel: String,
    /// Wire charset label (`encoding_rs` name). Defaults to UTF-8.
    #[serde(default = "default_charset")]
    pub charset: String,
}

/// `[access]`: owner allow-list and the diagnostic whisper target.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessConfig {
    /// Logins granted the owner tier unconditionally.
    #[serde(default)]
    pub owners: Vec<String>,
    /// Recipient of encoding-failure diagnostics. Falls back to the
    /// first owner when empty.
    #[serde(default)]
    pub diagnostic_whisper: String,
}

/// `[paths]`: filesystem collaborators.
#[derive(Debug, Clone, Deserialize)]
pub struct Paths {
    /// Root of the per-day raw/chat logs.
    #[serde(default = "default_logs_dir")]
    pub logs: PathBuf,
    /// Directory of per-channel command files (`<dir>/<channel>.toml`).
    #[serde(default = "default_commands_dir")]
    pub commands: PathBuf,
    /// Ignore-list file, one login per line.
    #[serde(default = "default_ignore_file")]
    pub ignore: PathBuf,
    /// Local override file with the customization prefix + silence flag.
    #[serde(default = "default_override_file")]
    pub local_override: PathBuf,
}

fn default_charset() -> String {
    "utf-8".to_string()
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_commands_dir() -> PathBuf {
    PathBuf::from("commands")
}

fn default_ignore_file() -> PathBuf {
    PathBuf::from("ignoredusers.txt")
}

fn default_override_file() -> PathBuf {
    PathBuf::from("override.toml")
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            logs: default_logs_dir(),
            commands: default_commands_dir(),
            ignore: default_ignore_file(),
            local_override: default_override_file(),
        }
    }
}

impl BotConfig {
    /// Load and parse the config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading {}: {}", path.display(), e))?;
        let config: BotConfig = toml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("parsing {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// The diagnostic whisper recipient, resolved against the owner list.
    pub fn diagnostic_whisper(&self) -> &str {
        if !self.access.diagnostic_whisper.is_empty() {
            &self.access.diagnostic_whisper
        } else {
            self.access
                .owners
                .first()
                .map(String::as_str)
                .unwrap_or("")
        }
    }
}

/// Runtime toggles from the local override file. Read once at startup;
/// a missing file means defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverrideFlags {
    /// Fixed phrase prefixed to every outbound message.
    #[serde(default)]
    pub custom: Option<String>,
    /// When set, every outbound send is suppressed entirely.
    #[serde(default)]
    pub silence: bool,
}

impl OverrideFlags {
    /// Load the override file; absent or unparsable files yield defaults.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring unparsable override file");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }
}

/// Load the ignore list: one login per line, `#` comments and blank
/// lines skipped. A missing file yields an empty set.
pub fn load_ignore_list(path: impl AsRef<Path>) -> HashSet<String> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(text) => text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| line.to_ascii_lowercase())
            .collect(),
        Err(_) => {
            warn!(path = %path.display(), "no ignore list found, ignoring nobody");
            HashSet::new()
        }
    }
}

/// Parsed command line: `slirc-bot [CHANNEL] [LOGLEVEL]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// Target channel; falls back to the configured default.
    pub channel: Option<String>,
    /// Raw verbosity choice; resolved by [`level_filter`].
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Parse from an argument iterator (exclusive of the program name).
    pub fn parse(mut args: impl Iterator<Item = String>) -> Self {
        let channel = args.next();
        let log_level = args.next();
        Self { channel, log_level }
    }
}

/// Map the verbosity choice onto a tracing filter.
///
/// Accepted: debug, info, warning, error, critical. Anything else,
/// including omission, defaults to info.
pub fn level_filter(choice: Option<&str>) -> LevelFilter {
    match choice.map(|c| c.to_ascii_lowercase()).as_deref() {
        Some("debug") => LevelFilter::DEBUG,
        Some("info") => LevelFilter::INFO,
        Some("warning") => LevelFilter::WARN,
        // tracing has no level above error; critical collapses into it.
        Some("error") | Some("critical") => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    }
}

/// Normalize a channel argument to its `#name` form.
pub fn normalize_channel(channel: &str) -> String {
    let lowered = channel.to_ascii_lowercase();
    if lowered.starts_with('#') {
        lowered
    } else {
        format!("#{lowered}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r##"
[settings]
host = "irc.chat.twitch.tv"
port = 6667
username = "slb_bot"
password = "oauth:secret"
channel = "#somechannel"

[access]
owners = ["owner_login"]

[paths]
ignore = "custom_ignore.txt"
"##
        )
        .unwrap();

        let config = BotConfig::load(file.path()).unwrap();
        assert_eq!(config.settings.host, "irc.chat.twitch.tv");
        assert_eq!(config.settings.port, 6667);
        assert_eq!(config.settings.charset, "utf-8");
        assert_eq!(config.access.owners, vec!["owner_login"]);
        assert_eq!(config.diagnostic_whisper(), "owner_login");
        assert_eq!(config.paths.ignore, PathBuf::from("custom_ignore.txt"));
        assert_eq!(config.paths.logs, PathBuf::from("logs"));
    }

    #[test]
    fn test_load_missing_config_fails() {
        assert!(BotConfig::load("/definitely/not/here.toml").is_err());
    }

    #[test]
    fn test_override_flags_defaults_when_missing() {
        let flags = OverrideFlags::load("/definitely/not/here.toml");
        assert_eq!(flags.custom, None);
        assert!(!flags.silence);
    }

    #[test]
    fn test_override_flags_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "custom = \"[beta] \"\nsilence = true\n").unwrap();
        let flags = OverrideFlags::load(file.path());
        assert_eq!(flags.custom.as_deref(), Some("[beta] "));
        assert!(flags.silence);
    }

    #[test]
    fn test_ignore_list_parsing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "# bots\nNightbot\n\n  moobot  \n").unwrap();
        let list = load_ignore_list(file.path());
        assert!(list.contains("nightbot"));
        assert!(list.contains("moobot"));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_cli_args() {
        let args = CliArgs::parse(
            vec!["#chan".to_string(), "debug".to_string()].into_iter(),
        );
        assert_eq!(args.channel.as_deref(), Some("#chan"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));

        let args = CliArgs::parse(std::iter::empty());
        assert_eq!(args, CliArgs::default());
    }

    #[test]
    fn test_level_filter_choices() {
        assert_eq!(level_filter(Some("debug")), LevelFilter::DEBUG);
        assert_eq!(level_filter(Some("WARNING")), LevelFilter::WARN);
        assert_eq!(level_filter(Some("critical")), LevelFilter::ERROR);
        assert_eq!(level_filter(Some("bogus")), LevelFilter::INFO);
        assert_eq!(level_filter(None), LevelFilter::INFO);
    }

    #[test]
    fn test_normalize_channel() {
        assert_eq!(normalize_channel("Chan"), "#chan");
        assert_eq!(normalize_channel("#Chan"), "#chan");
    }
}
