//! Nexora - scan orchestration and reporting engine.
//!
//! Classifies a raw target, plans which of nmap, OWASP ZAP and Arachni to
//! invoke for the requested scan mode, executes the plan concurrently with
//! graceful degradation, persists the normalized results to SQLite and
//! renders JSON and PDF reports from the persisted run.

pub mod adapters;
pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod models;
pub mod parser;
pub mod planner;
pub mod report;
pub mod security;
pub mod service;
pub mod store;

pub use config::AppConfig;
pub use errors::{EngineError, Result};
pub use service::ScanService;
