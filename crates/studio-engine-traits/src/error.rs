//! Failure taxonomy for transform operations
//!
//! Every way a transform can go wrong is one variant of [`TransformFailure`].
//! Adapters build the variant explicitly; its `Display` text is the error
//! message handed back to the caller.

use crate::log::SourceKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of an engine-internal diagnostic entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiagnosticLevel {
    Error,
    Warning,
    /// Output of `xsl:message`
    Message,
}

impl DiagnosticLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticLevel::Error => "ERROR",
            DiagnosticLevel::Warning => "WARNING",
            DiagnosticLevel::Message => "MESSAGE",
        }
    }
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sub-diagnostic attached to a syntax or apply failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Diagnostic {
    pub fn new<S: Into<String>>(level: DiagnosticLevel, message: S) -> Self {
        Self {
            level,
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

/// Malformed XML or XSLT input.
///
/// `message` is the human part used in the log line; `raw` is the parser's
/// message exactly as it reported it and becomes the error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{raw}")]
pub struct SyntaxFailure {
    pub source_kind: SourceKind,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub message: String,
    pub raw: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl SyntaxFailure {
    pub fn new<S: Into<String>>(source_kind: SourceKind, raw: S) -> Self {
        let raw = raw.into();
        Self {
            source_kind,
            line: None,
            column: None,
            message: raw.clone(),
            raw,
            diagnostics: Vec::new(),
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.diagnostics.push(diagnostic);
        self
    }
}

/// Why a transform did not produce output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum TransformFailure {
    /// Empty or otherwise unusable input
    #[error("{message}")]
    Validation { message: String },

    /// Malformed XML or XSLT
    #[error(transparent)]
    Syntax(#[from] SyntaxFailure),

    /// The stylesheet failed to compile or to run
    #[error("{message}")]
    Apply {
        message: String,
        diagnostics: Vec<Diagnostic>,
    },

    /// A required tool or runtime is missing or disabled
    #[error("{message}")]
    Environment { message: String },

    /// The external processor ran but did not deliver a result
    #[error("{message}")]
    Execution {
        message: String,
        stdout: String,
        stderr: String,
        exit_code: Option<i32>,
    },

    /// Last-resort guard for anything else
    #[error("{message}")]
    Unexpected { message: String },
}

impl TransformFailure {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        TransformFailure::Validation {
            message: message.into(),
        }
    }

    pub fn apply<S: Into<String>>(message: S, diagnostics: Vec<Diagnostic>) -> Self {
        TransformFailure::Apply {
            message: message.into(),
            diagnostics,
        }
    }

    pub fn environment<S: Into<String>>(message: S) -> Self {
        TransformFailure::Environment {
            message: message.into(),
        }
    }

    /// An execution failure with no captured streams
    pub fn execution<S: Into<String>>(message: S) -> Self {
        TransformFailure::Execution {
            message: message.into(),
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
        }
    }

    pub fn unexpected<S: Into<String>>(message: S) -> Self {
        TransformFailure::Unexpected {
            message: message.into(),
        }
    }

    /// Short name of the variant, for structured operator logs
    pub fn kind_name(&self) -> &'static str {
        match self {
            TransformFailure::Validation { .. } => "validation",
            TransformFailure::Syntax(_) => "syntax",
            TransformFailure::Apply { .. } => "apply",
            TransformFailure::Environment { .. } => "environment",
            TransformFailure::Execution { .. } => "execution",
            TransformFailure::Unexpected { .. } => "unexpected",
        }
    }
}
