//! Settings for the `reconcile` binary, read from `settings.toml` with
//! `RECONCILE__*` environment overrides (e.g. `RECONCILE__SERVER__PORT=8080`).
use config::{Config, ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Database::Memory => String::from("sqlite::memory:"),
            Database::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    pub server: Server,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(
            Config::builder()
                .add_source(File::with_name("settings").required(false))
                .add_source(
                    Environment::with_prefix("RECONCILE")
                        .separator("__")
                        .try_parsing(true),
                ),
        )
    }

    fn load(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    fn parse(toml: &str) -> Result<Settings, ConfigError> {
        Settings::load(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    #[test]
    fn sqlite_database_with_defaults() {
        let settings = parse(
            r#"
            [server]
            port = 3000
            database = { sqlite = "reconcile.db" }
            "#,
        )
        .unwrap();

        assert_eq!(settings.app.level, "info");
        assert_eq!(settings.server.bind, None);
        assert_eq!(
            settings.server.database,
            Database::Sqlite("reconcile.db".to_string())
        );
        assert_eq!(settings.server.database.url(), "sqlite:reconcile.db?mode=rwc");
    }

    #[test]
    fn memory_database() {
        let settings = parse(
            r#"
            [app]
            level = "debug"

            [server]
            bind = "0.0.0.0"
            port = 8080
            database = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(settings.app.level, "debug");
        assert_eq!(settings.server.database, Database::Memory);
        assert_eq!(settings.server.database.url(), "sqlite::memory:");
    }

    #[test]
    fn missing_server_section_is_an_error() {
        assert!(parse("[app]\nlevel = \"warn\"\n").is_err());
    }
}
