use crate::core::errors::ConfigError;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
    pub max_upload_bytes: usize,
}

/// Text recognition configuration
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Tesseract executable (looked up on PATH if not absolute)
    pub tesseract_path: String,
    pub language: String,
    pub timeout_seconds: u64,
}

/// Upstream HTTP services
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub libretranslate_url: String,
    pub libretranslate_api_key: Option<String>,
    pub tts_url: String,
    pub tts_languages: Vec<String>,
    pub frankfurter_url: String,
    pub timeout_seconds: u64,
}

/// Translation cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// 0 disables the cache
    pub translation_entries: usize,
}

/// Circuit breaker configuration shared by all upstreams
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub failure_threshold: usize,
    pub timeout_seconds: u64,
}

/// Static data files
#[derive(Debug, Clone)]
pub struct DataConfig {
    pub phrases_path: PathBuf,
    pub audio_dir: PathBuf,
    pub sample_image_path: PathBuf,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub ocr: OcrConfig,
    pub upstream: UpstreamConfig,
    pub cache: CacheConfig,
    pub breaker: BreakerConfig,
    pub data: DataConfig,
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env();
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Self {
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        Self {
            server: ServerConfig {
                port: env_parse("SERVER_PORT", env_parse("PORT", 4000)),
                host: env_string("SERVER_HOST", "0.0.0.0"),
                log_level,
                max_upload_bytes: env_parse("MAX_UPLOAD_BYTES", 20 * 1024 * 1024),
            },
            ocr: OcrConfig {
                tesseract_path: env_string("TESSERACT_PATH", "tesseract"),
                language: env_string("OCR_LANGUAGE", "eng"),
                timeout_seconds: env_parse("OCR_TIMEOUT_SECONDS", 60),
            },
            upstream: UpstreamConfig {
                libretranslate_url: env_string("LIBRETRANSLATE_URL", "https://libretranslate.de"),
                libretranslate_api_key: env::var("LIBRETRANSLATE_API_KEY")
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
                tts_url: env_string("TTS_URL", "https://translate.google.com/translate_tts"),
                tts_languages: parse_list(&env_string("TTS_LANGUAGES", "en,hi,es,fr,de,zh,ar")),
                frankfurter_url: env_string("FRANKFURTER_URL", "https://api.frankfurter.app"),
                timeout_seconds: env_parse("API_TIMEOUT_SECONDS", 30),
            },
            cache: CacheConfig {
                translation_entries: env_parse("TRANSLATION_CACHE_ENTRIES", 1000),
            },
            breaker: BreakerConfig {
                failure_threshold: env_parse("BREAKER_FAILURE_THRESHOLD", 5),
                timeout_seconds: env_parse("BREAKER_TIMEOUT_SECONDS", 30),
            },
            data: DataConfig {
                phrases_path: PathBuf::from(env_string("PHRASES_PATH", "data/phrases.json")),
                audio_dir: PathBuf::from(env_string("AUDIO_DIR", "data/audio")),
                sample_image_path: PathBuf::from(env_string(
                    "SAMPLE_IMAGE_PATH",
                    "data/sample-menu.png",
                )),
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidServerConfig(
                "port must be non-zero".to_string(),
            ));
        }

        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::NonPositive {
                name: "MAX_UPLOAD_BYTES",
                value: 0,
            });
        }

        for (name, value) in [
            ("LIBRETRANSLATE_URL", &self.upstream.libretranslate_url),
            ("TTS_URL", &self.upstream.tts_url),
            ("FRANKFURTER_URL", &self.upstream.frankfurter_url),
        ] {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(ConfigError::InvalidUrl {
                    name,
                    value: value.clone(),
                });
            }
        }

        if self.upstream.tts_languages.is_empty() {
            return Err(ConfigError::InvalidServerConfig(
                "TTS_LANGUAGES must list at least one language".to_string(),
            ));
        }

        // Tesseract language packs are combined with '+', e.g. "eng+fra"
        if !self
            .ocr
            .language
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '_')
        {
            return Err(ConfigError::InvalidOcrConfig(format!(
                "invalid OCR language '{}'",
                self.ocr.language
            )));
        }

        for (name, value) in [
            ("OCR_TIMEOUT_SECONDS", self.ocr.timeout_seconds),
            ("API_TIMEOUT_SECONDS", self.upstream.timeout_seconds),
            ("BREAKER_FAILURE_THRESHOLD", self.breaker.failure_threshold as u64),
            ("BREAKER_TIMEOUT_SECONDS", self.breaker.timeout_seconds),
        ] {
            if value == 0 {
                return Err(ConfigError::NonPositive { name, value });
            }
        }

        Ok(())
    }

    /// Defaults without reading the environment
    pub fn defaults() -> Self {
        Self {
            server: ServerConfig {
                port: 4000,
                host: "0.0.0.0".to_string(),
                log_level: Level::INFO,
                max_upload_bytes: 20 * 1024 * 1024,
            },
            ocr: OcrConfig {
                tesseract_path: "tesseract".to_string(),
                language: "eng".to_string(),
                timeout_seconds: 60,
            },
            upstream: UpstreamConfig {
                libretranslate_url: "https://libretranslate.de".to_string(),
                libretranslate_api_key: None,
                tts_url: "https://translate.google.com/translate_tts".to_string(),
                tts_languages: parse_list("en,hi,es,fr,de,zh,ar"),
                frankfurter_url: "https://api.frankfurter.app".to_string(),
                timeout_seconds: 30,
            },
            cache: CacheConfig {
                translation_entries: 1000,
            },
            breaker: BreakerConfig {
                failure_threshold: 5,
                timeout_seconds: 30,
            },
            data: DataConfig {
                phrases_path: PathBuf::from("data/phrases.json"),
                audio_dir: PathBuf::from("data/audio"),
                sample_image_path: PathBuf::from("data/sample-menu.png"),
            },
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout_seconds)
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr.timeout_seconds)
    }

    pub fn breaker_timeout(&self) -> Duration {
        Duration::from_secs(self.breaker.timeout_seconds)
    }
}
