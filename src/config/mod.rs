// src/config/mod.rs

//! Configuration loading and validation for cloudstep.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load the settings file and overlay the environment (`loader.rs`).
//! - Validate it once into typed [`Settings`] (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{apply_env_overrides, load_and_validate, load_env_file, load_from_path};
pub use model::{ConfigFile, EngineConfig, EngineSection, RawConfigFile, Settings, StackSection};
