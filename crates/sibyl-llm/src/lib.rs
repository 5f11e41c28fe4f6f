//! # sibyl-llm
//!
//! Upstream answer client: forwards one prompt to the Perplexity
//! chat-completions API and returns one text answer or a typed error.
//!
//! The [`AnswerClient`] trait is the seam the protocol core calls through;
//! [`PerplexityClient`] is the production implementation (OpenAI-compatible
//! request shape, bearer auth, non-streaming, bounded retry with backoff).
//! Tests substitute the trait.

#![deny(unsafe_code)]

pub mod client;
pub mod error;
pub mod model;
pub mod retry;

pub use client::{AnswerClient, AnswerRequest, PerplexityClient, PerplexityConfig};
pub use error::{AnswerError, AnswerResult};
pub use model::SonarModel;
pub use retry::RetryPolicy;
