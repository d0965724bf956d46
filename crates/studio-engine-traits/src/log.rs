//! User-facing log lines and source location tags

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which input document a diagnostic refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// The source XML document
    Xml,
    /// The XSLT stylesheet
    Xslt,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Xml => "xml",
            SourceKind::Xslt => "xslt",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A position inside one of the two input documents.
///
/// Lines and columns are 1-based, as reported by the parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub source: SourceKind,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl SourceLocation {
    pub fn new(source: SourceKind, line: u32) -> Self {
        Self {
            source,
            line,
            column: None,
        }
    }

    pub fn with_column(mut self, column: u32) -> Self {
        self.column = Some(column);
        self
    }

    /// Render the `[SRC:<kind> L:<line> C:<col>]` tag; the column part is
    /// omitted when unknown.
    pub fn tag(&self) -> String {
        match self.column {
            Some(column) => format!("[SRC:{} L:{} C:{}]", self.source, self.line, column),
            None => format!("[SRC:{} L:{}]", self.source, self.line),
        }
    }
}

/// One entry of the diagnostic log returned to the caller.
///
/// `text` is the fully rendered line, tag included. `location` repeats the
/// tag in structured form so a UI can jump to the position without parsing
/// the text back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl LogLine {
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            location: None,
        }
    }

    pub fn located<S: Into<String>>(location: SourceLocation, text: S) -> Self {
        Self {
            text: text.into(),
            location: Some(location),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl From<String> for LogLine {
    fn from(text: String) -> Self {
        LogLine::new(text)
    }
}

impl From<&str> for LogLine {
    fn from(text: &str) -> Self {
        LogLine::new(text)
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_with_and_without_column() {
        let loc = SourceLocation::new(SourceKind::Xml, 12);
        assert_eq!(loc.tag(), "[SRC:xml L:12]");
        assert_eq!(loc.with_column(3).tag(), "[SRC:xml L:12 C:3]");
    }

    #[test]
    fn log_line_serializes_without_empty_location() {
        let json = serde_json::to_string(&LogLine::new("hello")).unwrap();
        assert_eq!(json, r#"{"text":"hello"}"#);

        let located = LogLine::located(SourceLocation::new(SourceKind::Xslt, 4), "x");
        let json = serde_json::to_string(&located).unwrap();
        assert!(json.contains(r#""source":"xslt""#));
    }
}
