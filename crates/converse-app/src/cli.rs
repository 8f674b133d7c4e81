//! CLI argument definitions for the Converse terminal client.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Converse: chat with a language model from the terminal.
#[derive(Parser, Debug)]
#[command(name = "converse", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Persona instruction shared by all backends.
    #[arg(long = "persona")]
    pub persona: Option<String>,

    /// Start with sending disabled.
    #[arg(long = "disabled")]
    pub disabled: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CONVERSE_CONFIG env var > ~/.converse/converse.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.resolve_config_path_from(std::env::var("CONVERSE_CONFIG").ok())
    }

    fn resolve_config_path_from(&self, env_path: Option<String>) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Some(p) = env_path.filter(|p| !p.is_empty()) {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log filter.
    ///
    /// Priority: --log-level flag > RUST_LOG env var > config file value.
    pub fn resolve_log_filter(&self, config_level: &str) -> String {
        self.resolve_log_filter_from(std::env::var("RUST_LOG").ok(), config_level)
    }

    fn resolve_log_filter_from(&self, rust_log: Option<String>, config_level: &str) -> String {
        if let Some(ref level) = self.log_level {
            return level.clone();
        }
        if let Some(filter) = rust_log.filter(|f| !f.trim().is_empty()) {
            return filter;
        }
        config_level.to_string()
    }
}

fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".converse").join("converse.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".converse").join("converse.toml");
    }
    PathBuf::from("converse.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_flags() {
        let args = CliArgs::parse_from([
            "converse",
            "-c",
            "/tmp/c.toml",
            "-l",
            "debug",
            "--persona",
            "Be terse.",
            "--disabled",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/c.toml")));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert_eq!(args.persona.as_deref(), Some("Be terse."));
        assert!(args.disabled);
    }

    #[test]
    fn test_config_path_priority() {
        let args = CliArgs::parse_from(["converse", "--config", "flag.toml"]);
        assert_eq!(
            args.resolve_config_path_from(Some("env.toml".into())),
            PathBuf::from("flag.toml")
        );

        let args = CliArgs::parse_from(["converse"]);
        assert_eq!(
            args.resolve_config_path_from(Some("env.toml".into())),
            PathBuf::from("env.toml")
        );
        assert!(args
            .resolve_config_path_from(None)
            .ends_with("converse.toml"));
    }

    #[test]
    fn test_log_filter_priority() {
        let args = CliArgs::parse_from(["converse", "-l", "trace"]);
        assert_eq!(args.resolve_log_filter_from(Some("warn".into()), "info"), "trace");

        let args = CliArgs::parse_from(["converse"]);
        assert_eq!(args.resolve_log_filter_from(Some("warn".into()), "info"), "warn");
        assert_eq!(args.resolve_log_filter_from(None, "error"), "error");
    }
}
