//! Diagnostics formatter
//!
//! Turns parser errors, engine error logs and subprocess output into the
//! flat, ordered log shown to the user. Lines that point into one of the
//! inputs carry a `[SRC:<kind> L:<line> C:<col>]` tag and the same position
//! as a structured [`SourceLocation`].

use regex::Regex;
use std::sync::OnceLock;
use studio_engine_traits::{
    Diagnostic, LogLine, SourceKind, SourceLocation, SyntaxFailure, TransformFailure,
};

/// Scratch file names the secondary engine writes the inputs to
pub const XML_FILE_NAME: &str = "input.xml";
pub const XSLT_FILE_NAME: &str = "stylesheet.xslt";

/// Append the log entry for a syntax error, then one line per attached
/// sub-diagnostic.
pub fn format_syntax_error(log: &mut Vec<LogLine>, failure: &SyntaxFailure) {
    match failure.line {
        Some(line) => {
            let mut location = SourceLocation::new(failure.source_kind, line);
            if let Some(column) = failure.column {
                location = location.with_column(column);
            }
            log.push(LogLine::located(
                location,
                format!("[ERROR] {} {}", location.tag(), failure.message),
            ));
        }
        None => log.push(LogLine::new(format!(
            "[ERROR] {} syntax error: {}",
            failure.source_kind.as_str().to_uppercase(),
            failure.message
        ))),
    }

    for diagnostic in &failure.diagnostics {
        log.push(LogLine::new(describe(diagnostic)));
    }
}

/// Append the log entries for a failure while compiling or applying a
/// stylesheet. Diagnostics with a known line are tagged as stylesheet
/// positions.
pub fn format_apply_error(log: &mut Vec<LogLine>, message: &str, diagnostics: &[Diagnostic]) {
    log.push(LogLine::new(format!("XSLTApplyError: {message}")));
    for diagnostic in diagnostics {
        match diagnostic.line {
            Some(line) => {
                let location = SourceLocation::new(SourceKind::Xslt, line);
                log.push(LogLine::located(
                    location,
                    format!("{} {}", location.tag(), describe(diagnostic)),
                ));
            }
            None => log.push(LogLine::new(describe(diagnostic))),
        }
    }
}

/// Append captured process output as a block: a `"<label>:"` header and
/// one indented line per output line. Nothing is appended for empty output.
pub fn append_stream(log: &mut Vec<LogLine>, label: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    log.push(LogLine::new(format!("{label}:")));
    for line in text.lines() {
        let rendered = format!("  {line}");
        match locate_saxon_line(line) {
            Some(location) => log.push(LogLine::located(location, rendered)),
            None => log.push(LogLine::new(rendered)),
        }
    }
}

/// Append whatever lines describe `failure`: the formatted entries for
/// syntax and apply failures, the message itself for every other kind.
pub fn record_failure(log: &mut Vec<LogLine>, failure: &TransformFailure) {
    match failure {
        TransformFailure::Syntax(syntax) => format_syntax_error(log, syntax),
        TransformFailure::Apply {
            message,
            diagnostics,
        } => format_apply_error(log, message, diagnostics),
        other => log.push(LogLine::new(other.to_string())),
    }
}

/// Drop a trailing `" at <line>:<col>"` that repeats the position already
/// shown in the tag.
pub fn strip_position_suffix(message: &str, line: u32, column: u32) -> &str {
    let suffix = format!(" at {line}:{column}");
    message.strip_suffix(suffix.as_str()).unwrap_or(message)
}

fn describe(diagnostic: &Diagnostic) -> String {
    let message = diagnostic.message.trim();
    match diagnostic.line {
        Some(line) => format!("{}: {} (line {})", diagnostic.level, message, line),
        None => format!("{}: {}", diagnostic.level, message),
    }
}

fn saxon_position_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"on line (\d+)(?:\s+column (\d+))?\s+of\s+(\S+?):?$")
            .unwrap_or_else(|e| panic!("invalid Saxon position pattern: {e}"))
    })
}

/// Recognise Saxon's `... on line N column M of <file>:` and map the file
/// back to the input it was written from.
fn locate_saxon_line(line: &str) -> Option<SourceLocation> {
    let captures = saxon_position_pattern().captures(line.trim_end())?;
    let file = captures.get(3)?.as_str();
    let source = if file.ends_with(XSLT_FILE_NAME) {
        SourceKind::Xslt
    } else if file.ends_with(XML_FILE_NAME) {
        SourceKind::Xml
    } else {
        return None;
    };

    let line_no = captures.get(1)?.as_str().parse().ok()?;
    let mut location = SourceLocation::new(source, line_no);
    if let Some(column) = captures.get(2).and_then(|c| c.as_str().parse().ok()) {
        location = location.with_column(column);
    }
    Some(location)
}
