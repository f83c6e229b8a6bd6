//! Professora - conversational language tutor relay
//!
//! This library provides the core of the Professora tutor:
//! - Turn orchestration: transcript → bilingual reply → speech
//! - Amazon Bedrock inference and Amazon Polly synthesis clients
//! - Per-client session logs
//! - Transport adapters (in-process, WebSocket relay, HTTP)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Transports                        │
//! │   Browser (WS /ws)  │  HTTP /api  │  CLI (direct)   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 TurnOrchestrator                     │
//! │        Session log  │  Tutor prompt  │  Sampling     │
//! └──────────┬──────────────────────────────┬───────────┘
//!            │                              │
//! ┌──────────▼──────────┐        ┌──────────▼──────────┐
//! │  Bedrock (Converse) │        │   Polly (Speech)    │
//! └─────────────────────┘        └─────────────────────┘
//! ```

pub mod api;
pub mod aws;
pub mod config;
pub mod daemon;
pub mod error;
pub mod llm;
pub mod transport;
pub mod tutor;
pub mod voice;

pub use config::Config;
pub use daemon::{Daemon, build_orchestrator};
pub use error::{Error, FailureKind, Result, ServiceFailure};
pub use llm::{BedrockInference, InferenceService, Prompt, SamplingConfig};
pub use transport::{DirectTransport, RelayClient, Transport};
pub use tutor::{Reply, SYSTEM_PROMPT, Session, Turn, TurnOrchestrator};
pub use voice::{Engine, OutputFormat, PollySynthesizer, SpeechSynthesizer, VoiceSettings};
