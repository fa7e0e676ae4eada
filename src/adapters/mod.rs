// Adapters layer: concrete clients for external systems.

pub mod ollama;

pub use ollama::OllamaClient;
