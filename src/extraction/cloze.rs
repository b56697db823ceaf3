use once_cell::sync::Lazy;
use regex::Regex;

use super::Block;
use crate::documents::Document;
use crate::prompts::Prompt;

/// A hidden span: `{like this}`
pub static CLOZE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^{}\n]+)\}").unwrap());

/// Extract a cloze prompt from a block containing at least one `{...}` span
pub fn extract(block: &Block, document: &Document) -> Option<Prompt> {
    let text = block.text();
    if !CLOZE_RE.is_match(&text) {
        return None;
    }

    Some(Prompt::cloze_from_document(text, document, block.start_line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::ingest::parse_document;
    use chrono::Utc;
    use std::path::Path;

    fn doc() -> Document {
        parse_document(String::new(), Path::new("a.md"), Utc::now())
    }

    #[test]
    fn test_extracts_cloze_block() {
        let block = Block { start_line: 2, lines: vec!["{Oslo} is the capital", "of {Norway}"] };
        let prompt = extract(&block, &doc()).unwrap();

        assert_eq!(prompt.text(), Some("{Oslo} is the capital\nof {Norway}"));
        assert_eq!(prompt.provenance().map(|p| p.line_nr), Some(2));
    }

    #[test]
    fn test_ignores_blocks_without_spans() {
        let block = Block { start_line: 1, lines: vec!["No hidden text here", "{}"] };
        assert!(extract(&block, &doc()).is_none());
    }
}
