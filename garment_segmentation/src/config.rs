use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub model: ModelConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub debug_artifacts: DebugArtifactsConfig,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub trait Validatable {
    fn get_path(&self) -> PathBuf;

    fn validate(&self) -> Result<(), String> {
        let path = self.get_path();
        if !path.exists() {
            return Err(format!("File not found: {:?}", path));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub onnx_file: String,
    pub model_dir: PathBuf,
    #[serde(default = "default_model_instances")]
    pub num_instances: usize,
    #[serde(default = "default_input_name")]
    pub input_name: String,
    #[serde(default = "default_output_name")]
    pub output_name: String,
    #[serde(default = "default_num_classes")]
    pub num_classes: usize,
}

fn default_model_instances() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().min(4))
        .unwrap_or(2)
}

fn default_input_name() -> String {
    "pixel_values".into()
}

fn default_output_name() -> String {
    "logits".into()
}

// segformer-b3-fashion: background + 46 fashionpedia categories
fn default_num_classes() -> usize {
    47
}

impl Validatable for ModelConfig {
    fn get_path(&self) -> PathBuf {
        self.model_dir.join(&self.onnx_file)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BatchConfig {
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("./inputdata")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./outputdata")
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DebugArtifactsConfig {
    #[serde(default = "default_debug_enabled")]
    pub enabled: bool,
    #[serde(default = "default_segmented_path")]
    pub segmented_path: PathBuf,
    #[serde(default = "default_colormap_path")]
    pub colormap_path: PathBuf,
}

fn default_debug_enabled() -> bool {
    true
}

fn default_segmented_path() -> PathBuf {
    PathBuf::from("./output_segmented_image.png")
}

fn default_colormap_path() -> PathBuf {
    PathBuf::from("./output_colormap_image.png")
}

impl Default for DebugArtifactsConfig {
    fn default() -> Self {
        Self {
            enabled: default_debug_enabled(),
            segmented_path: default_segmented_path(),
            colormap_path: default_colormap_path(),
        }
    }
}

impl DebugArtifactsConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("current directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let config = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(
            config::File::from(
                configuration_directory.join(format!("{}.yaml", environment.as_str())),
            )
            .required(false),
        )
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;
    if let Err(e) = config.model.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        return Err(config::ConfigError::Message(e));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize::<Config>()
            .unwrap()
    }

    #[test]
    fn test_defaults_are_filled_in() {
        let config = parse(
            r#"
log_level: info
server:
  host: 0.0.0.0
  port: 9000
model:
  model_dir: models
  onnx_file: segformer-b3-fashion.onnx
"#,
        );

        assert_eq!(config.server.get_address(), "0.0.0.0:9000");
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.model.input_name, "pixel_values");
        assert_eq!(config.model.output_name, "logits");
        assert_eq!(config.model.num_classes, 47);
        assert!(config.model.num_instances >= 1);
        assert_eq!(
            config.model.get_path(),
            PathBuf::from("models/segformer-b3-fashion.onnx")
        );
        assert_eq!(config.batch.input_dir, PathBuf::from("./inputdata"));
        assert_eq!(config.batch.output_dir, PathBuf::from("./outputdata"));
        assert!(config.debug_artifacts.enabled);
        assert_eq!(
            config.debug_artifacts.colormap_path,
            PathBuf::from("./output_colormap_image.png")
        );
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let result = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
log_level: trace
server: { host: 127.0.0.1, port: 1 }
model: { model_dir: m, onnx_file: f.onnx }
"#,
                config::FileFormat::Yaml,
            ))
            .build()
            .unwrap()
            .try_deserialize::<Config>();

        assert!(result.is_err());
    }

    #[test]
    fn test_environment_parsing() {
        assert!(matches!(
            Environment::try_from("Production".to_string()),
            Ok(Environment::Production)
        ));
        assert!(Environment::try_from("staging".to_string()).is_err());
    }

    #[test]
    fn test_missing_model_file_fails_validation() {
        let model = ModelConfig {
            onnx_file: "missing.onnx".into(),
            model_dir: PathBuf::from("/nonexistent"),
            num_instances: 1,
            input_name: default_input_name(),
            output_name: default_output_name(),
            num_classes: default_num_classes(),
        };

        assert!(model.validate().is_err());
    }
}
