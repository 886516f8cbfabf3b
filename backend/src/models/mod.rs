//! Data models for the prompt library.
//!
//! Field names serialize in camelCase to match the presentation layer's documents.

mod filter;
mod prompt;
mod tag;
mod user;

pub use filter::*;
pub use prompt::*;
pub use tag::*;
pub use user::*;
