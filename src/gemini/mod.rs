mod client;
pub mod prompts;

pub use client::GeminiClient;
