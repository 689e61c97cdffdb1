// src/script/mod.rs

//! Script payloads for remote steps.
//!
//! - [`placeholder`] implements literal `__NAME__` substitution and the
//!   optional leftover-placeholder scan.
//! - [`loader`] reads payloads through the [`FileSystem`](crate::fs::FileSystem)
//!   seam and applies the configured [`PlaceholderPolicy`](crate::types::PlaceholderPolicy).

pub mod loader;
pub mod placeholder;

pub use loader::{ScriptLoader, ScriptPayload};
pub use placeholder::{placeholder_token, substitute, unresolved_placeholders};

/// Ordered `(name, value)` pairs substituted into a payload.
pub type ScriptVars = Vec<(String, String)>;
