//! # Configuration Module
//!
//! This module provides the booth's deployment configuration.

pub mod config;

pub use config::BoothConfig;
