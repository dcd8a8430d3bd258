//! The agent loop for Ragway.
//!
//! The retrieval agent follows a **Think → Act → Observe** cycle:
//!
//! 1. **Receive** the translated conversation history
//! 2. **Send to LLM** with the persona prompt and tool schemas
//! 3. **If tool calls**: dispatch them concurrently, append observations,
//!    loop back to step 2
//! 4. **If text response**: finish with it as the final answer
//!
//! The loop's events are projected either into a token stream carrying
//! only the final answer, or into the full transcript. Structured
//! extraction and plain chat are simpler single-request modes beside it.

pub mod chat;
pub mod extraction;
pub mod loop_runner;
pub mod projector;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use chat::ChatResponder;
pub use extraction::{Extraction, Extractor, Tone};
pub use loop_runner::{AgentLoop, AgentSettings};
pub use projector::{AgentStream, ExecutionMode, Transcript, TurnBuffer, project_full, project_stream};
pub use stream_event::{AgentEvent, ModelTurn};
