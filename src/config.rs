use anyhow::Context;
use clap::Args;
use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;
use crate::standing::{GraduationTarget, DEFAULT_GRADUATION_TARGET};

#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    pub database_url: Option<String>,

    /// Points that count as 100% graduation readiness
    #[arg(
        long = "target",
        env = "SIPMA_GRADUATION_TARGET",
        global = true,
        default_value_t = DEFAULT_GRADUATION_TARGET
    )]
    pub graduation_target: u32,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "SIPMA_LOG", global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    database_url: Option<String>,
    pub target: GraduationTarget,
    pub log_level: String,
}

impl Settings {
    pub fn from_args(args: GlobalArgs) -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: args.database_url.filter(|url| !url.trim().is_empty()),
            target: GraduationTarget::new(args.graduation_target)?,
            log_level: args.log_level,
        })
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }
}

pub fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.log_level)
            .with_context(|| format!("invalid log filter '{}'", settings.log_level))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(target: u32, url: Option<&str>) -> GlobalArgs {
        GlobalArgs {
            database_url: url.map(str::to_string),
            graduation_target: target,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn zero_target_is_a_configuration_error() {
        assert_eq!(
            Settings::from_args(args(0, None)).unwrap_err(),
            ConfigError::ZeroTarget
        );
    }

    #[test]
    fn blank_database_url_counts_as_missing() {
        let settings = Settings::from_args(args(250, Some("  "))).unwrap();
        assert!(settings.database_url().is_err());
        assert_eq!(settings.target.points(), 250);
    }

    #[test]
    fn database_url_passes_through() {
        let settings = Settings::from_args(args(300, Some("postgres://localhost/sipma"))).unwrap();
        assert_eq!(settings.database_url().unwrap(), "postgres://localhost/sipma");
    }
}
