//! Core types and the engine seam for the stylesheet studio.
//!
//! This crate defines the request/result model shared by every transform
//! backend and the [`TransformEngine`] trait they implement, so that the
//! dispatcher can drive an in-process XSLT 1.0 engine and an external
//! XSLT 2.0/3.0 processor interchangeably.

pub mod error;
pub mod log;
pub mod result;
pub mod xslt;

pub use error::{Diagnostic, DiagnosticLevel, SyntaxFailure, TransformFailure};
pub use log::{LogLine, SourceKind, SourceLocation};
pub use result::{EngineRun, RequestError, TransformRequest, TransformResult};
pub use xslt::{EngineKind, TransformEngine, XsltVersion};
