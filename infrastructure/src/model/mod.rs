//! Generative model adapters

pub mod gemini;

pub use gemini::{GeminiClient, GeminiConfig};
