//! Configuration management for Professora
//!
//! Layers, lowest priority first: built-in defaults, the TOML file, then
//! environment variables. CLI flags are applied on top by the binary.

pub mod file;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::api::{DEFAULT_HISTORY_LIMIT, DEFAULT_SESSION_TTL};
use crate::aws::{Credentials, DEFAULT_REGION};
use crate::llm::{DEFAULT_MODEL, SamplingConfig};
use crate::voice::{Engine, OutputFormat, VoiceSettings};
use crate::{Error, Result};

pub use file::{ConfigFile, config_file_path, load_config_file};

/// Port the relay listens on unless overridden
pub const DEFAULT_PORT: u16 = 8001;

/// Default deadline for one inference call
pub const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_secs(8);

/// Default deadline for one synthesis call
pub const DEFAULT_SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(5);

/// Professora configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// AWS account, region and endpoints
    pub aws: AwsConfig,

    /// Inference configuration
    pub llm: LlmConfig,

    /// Speech synthesis configuration
    pub voice: VoiceConfig,

    /// Relay/HTTP server configuration
    pub server: ServerConfig,
}

/// AWS account configuration
#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub credentials: Credentials,
    pub region: String,
    pub bedrock_endpoint: Option<String>,
    pub polly_endpoint: Option<String>,
}

/// Inference configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Bedrock model identifier
    pub model: String,
    pub sampling: SamplingConfig,
    pub timeout: Duration,
}

/// Speech synthesis configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub settings: VoiceSettings,
    pub timeout: Duration,
}

/// Relay/HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Path to static files directory (browser UI)
    pub static_dir: Option<PathBuf>,
    /// Turns returned by the history endpoint when no limit is given
    pub history_limit: usize,
    /// Idle time after which an HTTP session is discarded
    pub session_ttl: Duration,
}

impl Config {
    /// Load configuration from the config file and process environment
    ///
    /// # Errors
    ///
    /// Returns error if credentials are missing or a value is invalid
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let file = load_config_file(config_path)?;
        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if credentials are missing or a value is invalid
    pub fn from_sources(file: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        // Credentials: environment first, then the secret section of the file
        let access_key_id = env("AWS_ACCESS_KEY_ID")
            .or(file.aws.access_key_id)
            .ok_or_else(|| Error::Config("AWS_ACCESS_KEY_ID is not set".to_string()))?;
        let secret_access_key = env("AWS_SECRET_ACCESS_KEY")
            .or(file.aws.secret_access_key)
            .ok_or_else(|| Error::Config("AWS_SECRET_ACCESS_KEY is not set".to_string()))?;
        let mut credentials = Credentials::new(access_key_id, secret_access_key);
        if let Some(token) = env("AWS_SESSION_TOKEN").or(file.aws.session_token) {
            credentials = credentials.with_session_token(token);
        }

        let region = env("AWS_REGION")
            .or_else(|| env("AWS_DEFAULT_REGION"))
            .or(file.aws.region)
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let aws = AwsConfig {
            credentials,
            region,
            bedrock_endpoint: env("PROFESSORA_BEDROCK_ENDPOINT").or(file.aws.bedrock_endpoint),
            polly_endpoint: env("PROFESSORA_POLLY_ENDPOINT").or(file.aws.polly_endpoint),
        };

        let defaults = SamplingConfig::default();
        let sampling = SamplingConfig {
            temperature: parse_env(&env, "PROFESSORA_TEMPERATURE")?
                .or(file.llm.temperature)
                .unwrap_or(defaults.temperature),
            top_p: parse_env(&env, "PROFESSORA_TOP_P")?
                .or(file.llm.top_p)
                .unwrap_or(defaults.top_p),
            max_tokens: parse_env(&env, "PROFESSORA_MAX_TOKENS")?
                .or(file.llm.max_tokens)
                .unwrap_or(defaults.max_tokens),
        };
        let llm = LlmConfig {
            model: env("PROFESSORA_MODEL")
                .or(file.llm.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            sampling,
            timeout: parse_env(&env, "PROFESSORA_INFERENCE_TIMEOUT_SECS")?
                .or(file.llm.timeout_secs)
                .map_or(DEFAULT_INFERENCE_TIMEOUT, Duration::from_secs),
        };

        let voice_defaults = VoiceSettings::default();
        let engine = match parse_env::<Engine>(&env, "PROFESSORA_ENGINE")? {
            Some(engine) => engine,
            None => file
                .voice
                .engine
                .as_deref()
                .map(str::parse::<Engine>)
                .transpose()?
                .unwrap_or(voice_defaults.engine),
        };
        let output_format = match parse_env::<OutputFormat>(&env, "PROFESSORA_OUTPUT_FORMAT")? {
            Some(format) => format,
            None => file
                .voice
                .output_format
                .as_deref()
                .map(str::parse::<OutputFormat>)
                .transpose()?
                .unwrap_or(voice_defaults.output_format),
        };
        let voice = VoiceConfig {
            settings: VoiceSettings {
                voice_id: env("PROFESSORA_VOICE")
                    .or(file.voice.voice_id)
                    .unwrap_or(voice_defaults.voice_id),
                engine,
                output_format,
            },
            timeout: parse_env(&env, "PROFESSORA_SYNTHESIS_TIMEOUT_SECS")?
                .or(file.voice.timeout_secs)
                .map_or(DEFAULT_SYNTHESIS_TIMEOUT, Duration::from_secs),
        };

        let server = ServerConfig {
            host: env("PROFESSORA_HOST")
                .or(file.server.host)
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: match parse_env::<u16>(&env, "PROFESSORA_PORT")? {
                Some(port) => port,
                None => parse_env(&env, "PORT")?
                    .or(file.server.port)
                    .unwrap_or(DEFAULT_PORT),
            },
            static_dir: env("PROFESSORA_STATIC_DIR")
                .map(PathBuf::from)
                .or(file.server.static_dir),
            history_limit: parse_env(&env, "PROFESSORA_HISTORY_LIMIT")?
                .or(file.server.history_limit)
                .unwrap_or(DEFAULT_HISTORY_LIMIT),
            session_ttl: parse_env(&env, "PROFESSORA_SESSION_TTL_SECS")?
                .or(file.server.session_ttl_secs)
                .map_or(DEFAULT_SESSION_TTL, Duration::from_secs),
        };

        let config = Self {
            aws,
            llm,
            voice,
            server,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns error describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        let sampling = &self.llm.sampling;
        if !(0.0..=1.0).contains(&sampling.temperature) {
            return Err(Error::Config(format!(
                "temperature must be within 0.0..=1.0, got {}",
                sampling.temperature
            )));
        }
        if !(sampling.top_p > 0.0 && sampling.top_p <= 1.0) {
            return Err(Error::Config(format!(
                "top_p must be within (0.0, 1.0], got {}",
                sampling.top_p
            )));
        }
        if sampling.max_tokens == 0 {
            return Err(Error::Config("max_tokens must be positive".to_string()));
        }
        if self.llm.timeout.is_zero() || self.voice.timeout.is_zero() {
            return Err(Error::Config("service timeouts must be positive".to_string()));
        }
        if self.server.history_limit == 0 {
            return Err(Error::Config("history_limit must be positive".to_string()));
        }
        if self.server.session_ttl.is_zero() {
            return Err(Error::Config("session_ttl_secs must be positive".to_string()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(Error::Config("model identifier must not be empty".to_string()));
        }
        if self.voice.settings.voice_id.trim().is_empty() {
            return Err(Error::Config("voice identifier must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Parse an optional environment value, rejecting garbage instead of
/// silently falling back to the default
fn parse_env<T>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::Config(format!("invalid {key}={raw}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const CREDS: [(&str, &str); 2] = [
        ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE"),
        ("AWS_SECRET_ACCESS_KEY", "secret"),
    ];

    #[test]
    fn defaults_match_tutor_deployment() {
        let config = Config::from_sources(ConfigFile::default(), env_from(&CREDS)).unwrap();
        assert_eq!(config.aws.region, "us-east-1");
        assert_eq!(config.llm.model, "amazon.nova-pro-v1:0");
        assert_eq!(config.llm.sampling, SamplingConfig::default());
        assert_eq!(config.voice.settings.voice_id, "Camila");
        assert_eq!(config.voice.settings.engine, Engine::Neural);
        assert_eq!(config.voice.settings.output_format, OutputFormat::Mp3);
        assert_eq!(config.server.port, 8001);
        assert_eq!(config.llm.timeout, DEFAULT_INFERENCE_TIMEOUT);
        assert_eq!(config.server.history_limit, 5);
        assert_eq!(config.server.session_ttl, Duration::from_secs(1800));
    }

    #[test]
    fn session_settings_are_layered() {
        let mut file = ConfigFile::default();
        file.server.history_limit = Some(10);
        file.server.session_ttl_secs = Some(600);

        let mut pairs = CREDS.to_vec();
        pairs.push(("PROFESSORA_SESSION_TTL_SECS", "90"));
        let config = Config::from_sources(file, env_from(&pairs)).unwrap();

        assert_eq!(config.server.history_limit, 10);
        assert_eq!(config.server.session_ttl, Duration::from_secs(90));

        let mut pairs = CREDS.to_vec();
        pairs.push(("PROFESSORA_HISTORY_LIMIT", "0"));
        assert!(Config::from_sources(ConfigFile::default(), env_from(&pairs)).is_err());
    }

    #[test]
    fn missing_credentials_is_config_error() {
        let err = Config::from_sources(ConfigFile::default(), env_from(&[])).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("AWS_ACCESS_KEY_ID")));

        let err = Config::from_sources(
            ConfigFile::default(),
            env_from(&[("AWS_ACCESS_KEY_ID", "AKID"), ("AWS_SECRET_ACCESS_KEY", "  ")]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("AWS_SECRET_ACCESS_KEY")));
    }

    #[test]
    fn env_overrides_file() {
        let mut file = ConfigFile::default();
        file.llm.model = Some("file-model".to_string());
        file.server.port = Some(9000);
        file.voice.engine = Some("standard".to_string());

        let mut pairs = CREDS.to_vec();
        pairs.extend([("PROFESSORA_MODEL", "env-model"), ("PORT", "7000")]);
        let config = Config::from_sources(file, env_from(&pairs)).unwrap();

        assert_eq!(config.llm.model, "env-model");
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.voice.settings.engine, Engine::Standard);
    }

    #[test]
    fn professora_port_beats_generic_port() {
        let mut pairs = CREDS.to_vec();
        pairs.extend([("PROFESSORA_PORT", "8100"), ("PORT", "7000")]);
        let config = Config::from_sources(ConfigFile::default(), env_from(&pairs)).unwrap();
        assert_eq!(config.server.port, 8100);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut pairs = CREDS.to_vec();
        pairs.push(("PROFESSORA_PORT", "eighty"));
        assert!(Config::from_sources(ConfigFile::default(), env_from(&pairs)).is_err());

        let mut pairs = CREDS.to_vec();
        pairs.push(("PROFESSORA_TEMPERATURE", "1.5"));
        assert!(Config::from_sources(ConfigFile::default(), env_from(&pairs)).is_err());

        let mut file = ConfigFile::default();
        file.voice.output_format = Some("wav".to_string());
        assert!(Config::from_sources(file, env_from(&CREDS)).is_err());
    }

    #[test]
    fn credentials_can_come_from_file() {
        let mut file = ConfigFile::default();
        file.aws.access_key_id = Some("AKIDFILE".to_string());
        file.aws.secret_access_key = Some("file-secret".to_string());
        file.aws.region = Some("sa-east-1".to_string());
        let config = Config::from_sources(file, env_from(&[])).unwrap();
        assert_eq!(config.aws.credentials.access_key_id(), "AKIDFILE");
        assert_eq!(config.aws.region, "sa-east-1");
    }
}
