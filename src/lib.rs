//! Face Inference Service Library

pub mod api;
pub mod config;
pub mod engine;
pub mod provider;
pub mod service;
pub mod utils;

pub use config::Config;
