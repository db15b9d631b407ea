//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml / config.local.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, Provider};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// # 环境变量示例
/// - `QUILLFORGE_SERVER__PORT=8080`
/// - `QUILLFORGE_GENERATION__PROVIDER=fake`
/// - `QUILLFORGE_SPEECH__VOICES=alloy,nova`
/// - `QUILLFORGE_WORKER__MAX_CONCURRENT_JOBS=4`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级），其余字段由 serde default 补齐
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5080)?
        .set_default("database.path", "data/quillforge.db")?
        .set_default("storage.artifact_dir", "data/artifacts")?
        .set_default("storage.public_path", "/media")?
        .set_default("generation.provider", "http")?
        .set_default("worker.poll_interval_ms", 5000)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 配置文件
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 前缀: QUILLFORGE_，层级分隔符: __
    builder = builder.add_source(
        Environment::with_prefix("QUILLFORGE")
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("speech.voices")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("Server port cannot be 0"));
    }

    if config.database.path.trim().is_empty() {
        return Err(invalid("Database path cannot be empty"));
    }

    if config.generation.provider == Provider::Http {
        let urls = [
            ("generation.text_url", &config.generation.text_url),
            ("generation.image_url", &config.generation.image_url),
            ("speech.url", &config.speech.url),
            ("packaging.url", &config.packaging.url),
        ];
        if let Some((name, _)) = urls.iter().find(|(_, url)| url.trim().is_empty()) {
            return Err(invalid(format!("{} cannot be empty when provider is http", name)));
        }
    }

    if config.generation.default_chapter_count == 0 {
        return Err(invalid("generation.default_chapter_count cannot be 0"));
    }

    if config.worker.poll_interval_ms == 0 {
        return Err(invalid("worker.poll_interval_ms cannot be 0"));
    }

    if config.worker.max_concurrent_jobs == 0 {
        return Err(invalid("worker.max_concurrent_jobs cannot be 0"));
    }

    if config.speech.voices.is_empty() {
        return Err(invalid("speech.voices cannot be empty"));
    }

    if !config.speech.voices.contains(&config.speech.default_voice) {
        return Err(invalid(format!(
            "speech.default_voice {} is not in speech.voices",
            config.speech.default_voice
        )));
    }

    if !config.speech.rates.contains_key(&config.speech.default_model) {
        return Err(invalid(format!(
            "speech.default_model {} has no rate",
            config.speech.default_model
        )));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);
    tracing::info!("Public Base URL: {}", config.server.public_base_url());
    tracing::info!("Database: {}", config.database.path);
    tracing::info!(
        "Artifacts: {:?} mounted at {}",
        config.storage.artifact_dir,
        config.storage.public_path
    );
    tracing::info!("Provider: {:?}", config.generation.provider);
    if config.generation.provider == Provider::Http {
        tracing::info!("Text URL: {}", config.generation.text_url);
        tracing::info!("Image URL: {}", config.generation.image_url);
        tracing::info!("Speech URL: {}", config.speech.url);
        tracing::info!("Packaging URL: {}", config.packaging.url);
    }
    tracing::info!("Chapter Images: {}", config.generation.chapter_images);
    tracing::info!(
        "Worker: {} (max {} jobs, poll {}ms, stale after {}s)",
        config.worker.worker_id,
        config.worker.max_concurrent_jobs,
        config.worker.poll_interval_ms,
        config.worker.stale_after_secs
    );
    tracing::info!("Credits Enabled: {}", config.credits.enabled);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validation_passes_for_valid_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_empty_db_path() {
        let mut config = AppConfig::default();
        config.database.path = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_empty_url_only_matters_for_http_provider() {
        let mut config = AppConfig::default();
        config.speech.url = String::new();
        assert!(validate_config(&config).is_err());

        config.generation.provider = Provider::Fake;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_poll_interval() {
        let mut config = AppConfig::default();
        config.worker.poll_interval_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_speech_catalog() {
        let mut config = AppConfig::default();
        config.speech.voices.clear();
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.speech.default_model = "unpriced".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[generation]\nprovider = \"fake\"\nchapter_images = false\n\n[worker]\nmax_concurrent_jobs = 3"
        )
        .unwrap();

        let config = load_config_from_path(Some(file.path())).unwrap();
        assert_eq!(config.generation.provider, Provider::Fake);
        assert!(!config.generation.chapter_images);
        assert_eq!(config.worker.max_concurrent_jobs, 3);
        assert_eq!(config.worker.poll_interval_ms, 5000);
        assert_eq!(config.server.port, 5080);
    }
}
