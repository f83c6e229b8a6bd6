//! Daemon - the relay service
//!
//! Builds the inference and synthesis clients once from [`Config`], wraps
//! them in a shared [`TurnOrchestrator`] and serves the relay.

use std::sync::Arc;

use crate::api::ApiServerBuilder;
use crate::llm::BedrockInference;
use crate::tutor::TurnOrchestrator;
use crate::voice::PollySynthesizer;
use crate::{Config, Result};

/// Build the orchestrator backed by Bedrock and Polly
///
/// # Errors
///
/// Returns a configuration error if either client cannot be constructed
pub fn build_orchestrator(config: &Config) -> Result<TurnOrchestrator> {
    let aws = &config.aws;

    let inference = match &aws.bedrock_endpoint {
        Some(endpoint) => BedrockInference::with_endpoint(
            aws.credentials.clone(),
            &aws.region,
            endpoint,
            config.llm.model.clone(),
            config.llm.timeout,
        )?,
        None => BedrockInference::new(
            aws.credentials.clone(),
            &aws.region,
            config.llm.model.clone(),
            config.llm.timeout,
        )?,
    };

    let synthesizer = match &aws.polly_endpoint {
        Some(endpoint) => PollySynthesizer::with_endpoint(
            aws.credentials.clone(),
            &aws.region,
            endpoint,
            config.voice.settings.clone(),
            config.voice.timeout,
        )?,
        None => PollySynthesizer::new(
            aws.credentials.clone(),
            &aws.region,
            config.voice.settings.clone(),
            config.voice.timeout,
        )?,
    };

    tracing::info!(
        region = %aws.region,
        model = %config.llm.model,
        voice = %config.voice.settings.voice_id,
        engine = config.voice.settings.engine.as_str(),
        "service clients initialized"
    );

    Ok(TurnOrchestrator::new(Arc::new(inference), Arc::new(synthesizer))
        .with_sampling(config.llm.sampling)
        .with_timeouts(config.llm.timeout, config.voice.timeout))
}

/// The professora daemon
pub struct Daemon {
    config: Config,
    orchestrator: Arc<TurnOrchestrator>,
}

impl Daemon {
    /// Create a daemon, building service clients up front
    ///
    /// # Errors
    ///
    /// Returns a configuration error before anything is bound
    pub fn new(config: Config) -> Result<Self> {
        let orchestrator = Arc::new(build_orchestrator(&config)?);
        Ok(Self { config, orchestrator })
    }

    /// Serve the relay until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if the server cannot bind or fails while running
    pub async fn run(self) -> Result<()> {
        let server = &self.config.server;
        tracing::info!(
            host = %server.host,
            port = server.port,
            model = %self.config.llm.model,
            "daemon running"
        );

        ApiServerBuilder::new(self.orchestrator, server.port)
            .host(server.host.clone())
            .static_dir(server.static_dir.clone())
            .history_limit(server.history_limit)
            .session_ttl(server.session_ttl)
            .build()
            .run()
            .await
    }
}
