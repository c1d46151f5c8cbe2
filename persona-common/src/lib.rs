//! # Persona Common Library
//!
//! Shared code for the persona training services:
//! - Error and Result types
//! - Configuration loading and root folder resolution
//! - Training event types and the EventBus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
