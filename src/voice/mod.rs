//! Voice processing module
//!
//! Speech synthesis for tutor replies, plus optional local playback.
//! Speech recognition happens in the learner's browser and never reaches
//! this crate as audio.

#[cfg(feature = "playback")]
mod playback;
mod tts;

#[cfg(feature = "playback")]
pub use playback::AudioPlayback;
pub use tts::{DEFAULT_VOICE, Engine, OutputFormat, PollySynthesizer, SpeechSynthesizer, VoiceSettings};
