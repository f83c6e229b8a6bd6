//! The tutor turn: one transcript in, one reply and its speech out

mod orchestrator;
mod prompt;
mod session;

pub use orchestrator::{Reply, TurnOrchestrator};
pub use prompt::SYSTEM_PROMPT;
pub use session::{Session, Turn};
