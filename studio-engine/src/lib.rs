//! studio-engine: dual-engine XSLT transform dispatcher
//!
//! Requests for XSLT 1.0 run on xrust, in a worker process when one is
//! available; requests for XSLT 2.0 or
//! 3.0 run on Saxon-HE through `java` when it is enabled. Both engines sit
//! behind [`TransformEngine`] and every outcome, good or bad, comes back as
//! a [`TransformResult`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use studio_engine::{ConfigLoader, Dispatcher, TransformRequest, XsltVersion};
//!
//! let config = Arc::new(ConfigLoader::load(None)?);
//! let dispatcher = Dispatcher::new(config);
//! let request = TransformRequest::new(xml, xslt, XsltVersion::V1_0);
//! let result = dispatcher.dispatch(&request).await;
//! println!("{}", result.html);
//! ```

pub mod config;
pub mod dependencies;
pub mod diagnostics;
pub mod error;
pub mod hardened;
pub mod worker;

pub mod engine_saxon;
pub mod engine_xrust;

pub mod unified;

// Re-export core types
pub use config::{
    ConfigLoader, LimitsConfig, PrimaryEngineConfig, SecondaryEngineConfig, StudioConfig,
};
pub use error::ConfigError;
pub use studio_engine_traits::{
    Diagnostic, DiagnosticLevel, EngineKind, EngineRun, LogLine, RequestError, SourceKind,
    SourceLocation, SyntaxFailure, TransformEngine, TransformFailure, TransformRequest,
    TransformResult, XsltVersion,
};

// Re-export engines and the dispatcher
pub use engine_saxon::SaxonEngine;
pub use engine_xrust::XrustEngine;
pub use unified::Dispatcher;
pub use worker::WorkerCommand;
