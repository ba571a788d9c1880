//! LLM layer: advisory lead assessment and outreach drafts over an
//! OpenAI-compatible chat-completions API.

pub mod analyst;
pub mod client;

pub use analyst::{LeadAnalyst, OpenAiAnalyst};
pub use client::{ChatMessage, OpenAiClient, OpenAiConfig};
