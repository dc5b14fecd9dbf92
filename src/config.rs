use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_MODEL_NAME: &str = "umm-maybe/AI-image-detector";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub model_name: String,
    pub model_dir: PathBuf,
    pub template_dir: PathBuf,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Settings {
    /// Defaults, then an optional `configuration` file, then the environment
    /// (`PORT`, `MODEL_NAME`, ...). A `.env` file is honored if present.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::load_with(Environment::default())
    }

    fn load_with(environment: Environment) -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(File::with_name("configuration").required(false))
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 5000_i64)?
            .set_default("model_name", DEFAULT_MODEL_NAME)?
            .set_default("model_dir", "models")?
            .set_default("template_dir", "templates")?
            .set_default("log_level", "info")?
            .set_default("log_format", "pretty")
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    pub fn index_path(&self) -> PathBuf {
        self.template_dir.join("index.html")
    }
}
