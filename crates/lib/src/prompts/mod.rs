//! # Prompt Template Modules
//!
//! All prompt templates used by the pipeline, organized by stage. Each
//! template is a plain constant with `{placeholder}` slots filled by
//! `str::replace` at the call site; the placeholders available to a
//! template are listed in its doc comment.

pub mod article;
pub mod conversation;
pub mod outline;
pub mod persona;
