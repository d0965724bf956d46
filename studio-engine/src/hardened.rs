//! Hardened well-formedness check for untrusted XML and XSLT
//!
//! Every document goes through this parser before the XSLT library sees
//! it. The options refuse any document type declaration, so no entity,
//! internal or external, can be declared or expanded and no DTD is ever
//! loaded. roxmltree performs no I/O of its own, and the node count is
//! capped to stop amplification attacks.

use crate::diagnostics::strip_position_suffix;
use roxmltree::{Document, ParsingOptions};
use studio_engine_traits::{SourceKind, SyntaxFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardenedParser {
    nodes_limit: u32,
}

impl HardenedParser {
    pub fn new(nodes_limit: u32) -> Self {
        Self { nodes_limit }
    }

    pub fn nodes_limit(&self) -> u32 {
        self.nodes_limit
    }

    fn options(&self) -> ParsingOptions<'_> {
        let mut options = ParsingOptions::default();
        options.allow_dtd = false;
        options.nodes_limit = self.nodes_limit;
        options
    }

    /// Parse `text` under the hardened options, reporting the first error
    /// as a syntax failure attributed to `source`.
    pub fn check(&self, source: SourceKind, text: &str) -> Result<(), SyntaxFailure> {
        Document::parse_with_options(text, self.options())
            .map(|_| ())
            .map_err(|err| syntax_failure(source, &err))
    }
}

/// roxmltree only appends `" at <row>:<col>"` for errors that have a real
/// position; the suffix is how positionless errors are told apart.
fn syntax_failure(source: SourceKind, err: &roxmltree::Error) -> SyntaxFailure {
    let raw = err.to_string();
    let pos = err.pos();
    let message = strip_position_suffix(&raw, pos.row, pos.col);

    if message.len() == raw.len() {
        return SyntaxFailure::new(source, raw);
    }
    let message = message.to_string();
    SyntaxFailure::new(source, raw)
        .at(pos.row, pos.col)
        .with_message(message)
}
