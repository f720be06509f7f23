//! # External Providers
//!
//! Clients for the external capabilities the pipeline consumes: language
//! models and embeddings.

pub mod ai;
