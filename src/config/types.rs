//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,

    /// 产物存储配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// 文本/图片生成服务配置
    #[serde(default)]
    pub generation: GenerationConfig,

    /// 语音合成配置
    #[serde(default)]
    pub speech: SpeechConfig,

    /// 电子书打包服务配置
    #[serde(default)]
    pub packaging: PackagingConfig,

    /// 后台 worker 配置
    #[serde(default)]
    pub worker: WorkerConfig,

    /// 额度配置
    #[serde(default)]
    pub credits: CreditsConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 公开访问的 Base URL
    /// 如果未设置，则使用 http://{host}:{port}
    #[serde(default)]
    pub base_url: Option<String>,

    /// 上传文件最大大小（字节）
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5080
}

fn default_max_upload_size() -> usize {
    20 * 1024 * 1024 // 20 MB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: None,
            max_upload_size: default_max_upload_size(),
        }
    }
}

impl ServerConfig {
    /// 获取公开的 Base URL
    pub fn public_base_url(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| {
            let host = if self.host == "0.0.0.0" {
                "localhost"
            } else {
                &self.host
            };
            format!("http://{}:{}", host, self.port)
        })
    }
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库文件路径
    #[serde(default = "default_db_path")]
    pub path: String,

    /// 最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/quillforge.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// 产物存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 产物根目录（图片、电子书、音频）
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// 产物对外挂载的 URL 路径
    #[serde(default = "default_public_path")]
    pub public_path: String,
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("data/artifacts")
}

fn default_public_path() -> String {
    "/media".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            artifact_dir: default_artifact_dir(),
            public_path: default_public_path(),
        }
    }
}

/// 外部服务实现
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// 真实 HTTP 服务
    Http,
    /// 本地确定性实现，不发出网络请求
    Fake,
}

/// 生成服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// 对生成、语音、打包三类外部服务同时生效
    #[serde(default = "default_provider")]
    pub provider: Provider,

    #[serde(default = "default_text_url")]
    pub text_url: String,

    #[serde(default = "default_image_url")]
    pub image_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub text_model: String,

    #[serde(default = "default_model")]
    pub image_model: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// 书籍未指定章节数时的默认值
    #[serde(default = "default_chapter_count")]
    pub default_chapter_count: u32,

    /// 是否生成章节插图与封面图
    #[serde(default = "default_true")]
    pub chapter_images: bool,

    /// 每次开始生成消耗的额度
    #[serde(default = "default_credit_cost")]
    pub credit_cost: u32,
}

fn default_provider() -> Provider {
    Provider::Http
}

fn default_text_url() -> String {
    "http://localhost:8100/v1/text".to_string()
}

fn default_image_url() -> String {
    "http://localhost:8100/v1/image".to_string()
}

fn default_model() -> String {
    "default".to_string()
}

fn default_generation_timeout() -> u64 {
    300
}

fn default_chapter_count() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_credit_cost() -> u32 {
    1
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            text_url: default_text_url(),
            image_url: default_image_url(),
            api_key: None,
            text_model: default_model(),
            image_model: default_model(),
            timeout_secs: default_generation_timeout(),
            default_chapter_count: default_chapter_count(),
            chapter_images: true,
            credit_cost: default_credit_cost(),
        }
    }
}

/// 语音合成配置
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    #[serde(default = "default_speech_url")]
    pub url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_voice")]
    pub default_voice: String,

    #[serde(default = "default_speech_model")]
    pub default_model: String,

    /// 允许的音色
    #[serde(default = "default_voices")]
    pub voices: Vec<String>,

    /// model -> 每字符费用
    #[serde(default = "default_rates")]
    pub rates: HashMap<String, f64>,

    /// 试听片段最大字符数
    #[serde(default = "default_sample_characters")]
    pub sample_characters: usize,
}

fn default_speech_url() -> String {
    "http://localhost:8200".to_string()
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_speech_model() -> String {
    "tts-1".to_string()
}

fn default_voices() -> Vec<String> {
    ["alloy", "echo", "fable", "nova", "onyx", "shimmer"]
        .iter()
        .map(|v| v.to_string())
        .collect()
}

fn default_rates() -> HashMap<String, f64> {
    HashMap::from([
        ("tts-1".to_string(), 0.000015),
        ("tts-1-hd".to_string(), 0.00003),
    ])
}

fn default_sample_characters() -> usize {
    3000
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            url: default_speech_url(),
            api_key: None,
            timeout_secs: default_generation_timeout(),
            default_voice: default_voice(),
            default_model: default_speech_model(),
            voices: default_voices(),
            rates: default_rates(),
            sample_characters: default_sample_characters(),
        }
    }
}

/// 打包服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct PackagingConfig {
    #[serde(default = "default_packaging_url")]
    pub url: String,

    #[serde(default = "default_packaging_timeout")]
    pub timeout_secs: u64,
}

fn default_packaging_url() -> String {
    "http://localhost:8300".to_string()
}

fn default_packaging_timeout() -> u64 {
    120
}

impl Default for PackagingConfig {
    fn default() -> Self {
        Self {
            url: default_packaging_url(),
            timeout_secs: default_packaging_timeout(),
        }
    }
}

/// 后台 worker 配置
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_id")]
    pub worker_id: String,

    /// 轮询间隔（毫秒）
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// 同时执行的生成任务数
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// 心跳超过该时长的认领视为失效（秒）
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
}

fn default_worker_id() -> String {
    "worker-1".to_string()
}

fn default_poll_interval() -> u64 {
    5000
}

fn default_max_concurrent_jobs() -> usize {
    2
}

fn default_stale_after() -> u64 {
    900 // 15 分钟
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: default_worker_id(),
            poll_interval_ms: default_poll_interval(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            stale_after_secs: default_stale_after(),
        }
    }
}

/// 额度配置
#[derive(Debug, Clone, Deserialize)]
pub struct CreditsConfig {
    /// 关闭时所有预留都成功
    #[serde(default)]
    pub enabled: bool,

    /// 新用户的初始额度
    #[serde(default = "default_allowance")]
    pub default_allowance: u32,
}

fn default_allowance() -> u32 {
    5
}

impl Default for CreditsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_allowance: default_allowance(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5080);
        assert_eq!(config.database.path, "data/quillforge.db");
        assert_eq!(config.generation.provider, Provider::Http);
        assert!(config.speech.rates.contains_key(&config.speech.default_model));
        assert!(config.speech.voices.contains(&config.speech.default_voice));
    }

    #[test]
    fn test_public_base_url() {
        let mut config = ServerConfig::default();
        assert_eq!(config.public_base_url(), "http://localhost:5080");

        config.base_url = Some("https://books.example.com".to_string());
        assert_eq!(config.public_base_url(), "https://books.example.com");
    }

    #[test]
    fn test_provider_parses_lowercase() {
        let config: GenerationConfig = serde_json::from_str(r#"{"provider":"fake"}"#).unwrap();
        assert_eq!(config.provider, Provider::Fake);
        assert_eq!(config.default_chapter_count, 10);
        assert!(config.chapter_images);
    }
}
