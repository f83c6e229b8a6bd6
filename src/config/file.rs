//! TOML configuration file loading
//!
//! Supports `~/.config/professora/config.toml` (or an explicit `--config`
//! path) as a persistent config source. All fields are optional; the file
//! is a partial overlay on top of defaults and is itself overridden by
//! environment variables.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// AWS account and endpoint settings
    #[serde(default)]
    pub aws: AwsFileConfig,

    /// Inference settings
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Speech synthesis settings
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Relay server settings
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// AWS configuration
#[derive(Debug, Default, Deserialize)]
pub struct AwsFileConfig {
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    /// Override for the Bedrock Runtime endpoint
    pub bedrock_endpoint: Option<String>,
    /// Override for the Polly endpoint
    pub polly_endpoint: Option<String>,
}

/// Inference configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Bedrock model identifier (e.g. "amazon.nova-pro-v1:0")
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
}

/// Speech synthesis configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Polly voice (e.g. "Camila")
    pub voice_id: Option<String>,
    /// "standard", "neural", "long-form" or "generative"
    pub engine: Option<String>,
    /// "mp3", "ogg_vorbis" or "pcm"
    pub output_format: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Directory with a browser UI bundle to serve
    pub static_dir: Option<PathBuf>,
    /// Turns returned by the history endpoint by default
    pub history_limit: Option<usize>,
    /// Idle seconds before an HTTP session is discarded
    pub session_ttl_secs: Option<u64>,
}

/// Load the TOML config file
///
/// An explicit `path` must exist and parse. Without one, the standard
/// path is tried and `ConfigFile::default()` is returned if it is absent
/// or unreadable.
///
/// # Errors
///
/// Returns error if an explicit path cannot be read or parsed
pub fn load_config_file(path: Option<&Path>) -> Result<ConfigFile> {
    if let Some(path) = path {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "loaded config file");
        return Ok(config);
    }

    let Some(path) = config_file_path() else {
        return Ok(ConfigFile::default());
    };

    if !path.exists() {
        return Ok(ConfigFile::default());
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                Ok(config)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                Ok(ConfigFile::default())
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            Ok(ConfigFile::default())
        }
    }
}

/// Return the config file path: `~/.config/professora/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "professora", "professora")
        .map(|d| d.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parses_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[llm]
model = "amazon.nova-lite-v1:0"
max_tokens = 80

[voice]
voice_id = "Vitoria"

[server]
port = 9000
"#
        )
        .unwrap();

        let config = load_config_file(Some(file.path())).unwrap();
        assert_eq!(config.llm.model.as_deref(), Some("amazon.nova-lite-v1:0"));
        assert_eq!(config.llm.max_tokens, Some(80));
        assert_eq!(config.llm.temperature, None);
        assert_eq!(config.voice.voice_id.as_deref(), Some("Vitoria"));
        assert_eq!(config.server.port, Some(9000));
        assert!(config.aws.region.is_none());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let result = load_config_file(Some(Path::new("/nonexistent/professora.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn unknown_section_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[persona]\nname = \"orin\"").unwrap();
        assert!(load_config_file(Some(file.path())).is_err());
    }
}
