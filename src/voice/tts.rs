//! Text-to-speech (TTS) processing

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::aws::{Credentials, SignableRequest, Signer, classify_error};
use crate::error::{FailureKind, ServiceFailure};
use crate::{Error, Result};

/// Default neural voice (Brazilian Portuguese, reads code-mixed English well)
pub const DEFAULT_VOICE: &str = "Camila";

/// Renders reply text as encoded audio
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Short identifier used in logs and readiness output
    fn name(&self) -> &'static str;

    /// Format of the bytes returned by [`synthesize`](Self::synthesize)
    fn output_format(&self) -> OutputFormat;

    /// Synthesize `text` into audio bytes
    async fn synthesize(&self, text: &str) -> std::result::Result<Vec<u8>, ServiceFailure>;
}

/// Audio encoding requested from the synthesis service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Mp3,
    OggVorbis,
    Pcm,
}

impl OutputFormat {
    /// Polly wire identifier
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::OggVorbis => "ogg_vorbis",
            Self::Pcm => "pcm",
        }
    }

    /// MIME type for HTTP responses
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::OggVorbis => "audio/ogg",
            Self::Pcm => "audio/pcm",
        }
    }

    /// File extension for saved audio
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::OggVorbis => "ogg",
            Self::Pcm => "pcm",
        }
    }

    /// Guess the encoding of audio received without metadata
    ///
    /// MP3 is recognised by an ID3 tag or an MPEG frame sync, Ogg by its
    /// page marker. Anything else is treated as raw PCM.
    #[must_use]
    pub fn sniff(audio: &[u8]) -> Self {
        match audio {
            [b'I', b'D', b'3', ..] => Self::Mp3,
            [0xFF, second, ..] if second & 0xE0 == 0xE0 => Self::Mp3,
            [b'O', b'g', b'g', b'S', ..] => Self::OggVorbis,
            _ => Self::Pcm,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "ogg_vorbis" | "ogg" => Ok(Self::OggVorbis),
            "pcm" => Ok(Self::Pcm),
            other => Err(Error::Config(format!("unsupported output format: {other}"))),
        }
    }
}

/// Polly synthesis engine tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Engine {
    Standard,
    #[default]
    Neural,
    LongForm,
    Generative,
}

impl Engine {
    /// Polly wire identifier
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Neural => "neural",
            Self::LongForm => "long-form",
            Self::Generative => "generative",
        }
    }
}

impl FromStr for Engine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "neural" => Ok(Self::Neural),
            "long-form" | "long_form" => Ok(Self::LongForm),
            "generative" => Ok(Self::Generative),
            other => Err(Error::Config(format!("unsupported engine: {other}"))),
        }
    }
}

/// Voice parameters for every synthesis request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub voice_id: String,
    pub engine: Engine,
    pub output_format: OutputFormat,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            voice_id: DEFAULT_VOICE.to_string(),
            engine: Engine::Neural,
            output_format: OutputFormat::Mp3,
        }
    }
}

/// Synthesizes speech through Amazon Polly
pub struct PollySynthesizer {
    client: reqwest::Client,
    signer: Signer,
    url: Url,
    voice: VoiceSettings,
}

impl PollySynthesizer {
    /// Create a Polly client for the public regional endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the voice is empty or the HTTP client cannot be built
    pub fn new(
        credentials: Credentials,
        region: &str,
        voice: VoiceSettings,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = format!("https://polly.{region}.amazonaws.com");
        Self::with_endpoint(credentials, region, &endpoint, voice, timeout)
    }

    /// Create a Polly client against an explicit endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is invalid, the voice is empty, or
    /// the HTTP client cannot be built
    pub fn with_endpoint(
        credentials: Credentials,
        region: &str,
        endpoint: &str,
        voice: VoiceSettings,
        timeout: Duration,
    ) -> Result<Self> {
        if voice.voice_id.trim().is_empty() {
            return Err(Error::Config("Polly voice identifier required for TTS".to_string()));
        }

        let url = Url::parse(&format!("{}/v1/speech", endpoint.trim_end_matches('/')))
            .map_err(|e| Error::Config(format!("invalid Polly endpoint {endpoint}: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            signer: Signer::new(credentials, region, "polly"),
            url,
            voice,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for PollySynthesizer {
    fn name(&self) -> &'static str {
        "polly"
    }

    fn output_format(&self) -> OutputFormat {
        self.voice.output_format
    }

    async fn synthesize(&self, text: &str) -> std::result::Result<Vec<u8>, ServiceFailure> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct SpeechRequest<'a> {
            text: &'a str,
            output_format: &'static str,
            voice_id: &'a str,
            engine: &'static str,
        }

        let request = SpeechRequest {
            text,
            output_format: self.voice.output_format.as_str(),
            voice_id: &self.voice.voice_id,
            engine: self.voice.engine.as_str(),
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| ServiceFailure::new(FailureKind::InvalidRequest, e.to_string()))?;

        let auth = self.signer.sign(
            &SignableRequest {
                method: "POST",
                url: &self.url,
                headers: &[("content-type", "application/json")],
                body: &body,
            },
            chrono::Utc::now(),
        );

        let mut builder = self
            .client
            .post(self.url.clone())
            .header("content-type", "application/json");
        for (name, value) in auth {
            builder = builder.header(name, value);
        }

        let response = builder
            .body(body)
            .send()
            .await
            .map_err(|e| ServiceFailure::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_type = response
                .headers()
                .get("x-amzn-errortype")
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string);
            let body = response.text().await.unwrap_or_default();
            let failure = classify_error(status, error_type.as_deref(), &body);
            tracing::warn!(voice = %self.voice.voice_id, kind = %failure.kind, "Polly synthesis failed");
            return Err(failure);
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| ServiceFailure::from_reqwest(&e))?;
        if audio.is_empty() {
            return Err(ServiceFailure::new(
                FailureKind::EmptyResponse,
                "Polly returned an empty audio stream",
            ));
        }

        tracing::debug!(bytes = audio.len(), voice = %self.voice.voice_id, "synthesized speech");
        Ok(audio.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_identifiers() {
        assert_eq!("MP3".parse::<OutputFormat>().unwrap(), OutputFormat::Mp3);
        assert_eq!("ogg".parse::<OutputFormat>().unwrap(), OutputFormat::OggVorbis);
        assert_eq!("long-form".parse::<Engine>().unwrap(), Engine::LongForm);
        assert!("wav".parse::<OutputFormat>().is_err());
        assert!("turbo".parse::<Engine>().is_err());
    }

    #[test]
    fn sniffs_container_from_magic_bytes() {
        assert_eq!(OutputFormat::sniff(b"ID3\x04\x00rest"), OutputFormat::Mp3);
        assert_eq!(OutputFormat::sniff(&[0xFF, 0xFB, 0x90, 0x64]), OutputFormat::Mp3);
        assert_eq!(OutputFormat::sniff(b"OggS\x00\x02"), OutputFormat::OggVorbis);
        assert_eq!(OutputFormat::sniff(&[0x01, 0x00, 0xFE, 0xFF]), OutputFormat::Pcm);
        assert_eq!(OutputFormat::sniff(&[]), OutputFormat::Pcm);
    }

    #[test]
    fn default_voice_is_neural_mp3() {
        let voice = VoiceSettings::default();
        assert_eq!(voice.voice_id, "Camila");
        assert_eq!(voice.engine.as_str(), "neural");
        assert_eq!(voice.output_format.mime_type(), "audio/mpeg");
    }

    #[test]
    fn rejects_blank_voice() {
        let voice = VoiceSettings {
            voice_id: String::new(),
            ..VoiceSettings::default()
        };
        let result = PollySynthesizer::new(
            Credentials::new("AKID", "secret"),
            "us-east-1",
            voice,
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
