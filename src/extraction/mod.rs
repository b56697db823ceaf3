//! Prompt extraction from markdown documents
//!
//! A document body is split into blank-line separated blocks (fenced code is
//! never a prompt). Each block is offered to the QA extractor first and to the
//! cloze extractor second.

pub mod cloze;
pub mod qa;

use crate::documents::Document;
use crate::prompts::Prompt;

/// A run of consecutive non-blank lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'a> {
    /// 1-based line number of the first line in the source file
    pub start_line: usize,
    pub lines: Vec<&'a str>,
}

impl Block<'_> {
    pub fn text(&self) -> String {
        self.lines.join("\n").trim().to_string()
    }
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Split a markdown body into blocks, skipping fenced code
pub fn split_blocks(body: &str, line_offset: usize) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut current: Option<Block> = None;
    let mut in_code_block = false;

    for (i, line) in body.split('\n').enumerate() {
        let line_nr = line_offset + i + 1;

        if is_fence(line) {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            in_code_block = !in_code_block;
            continue;
        }

        if in_code_block {
            continue;
        }

        if line.trim().is_empty() {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            continue;
        }

        current
            .get_or_insert_with(|| Block { start_line: line_nr, lines: Vec::new() })
            .lines
            .push(line.trim_end_matches('\r'));
    }

    if let Some(block) = current {
        blocks.push(block);
    }

    blocks
}

/// Extract every prompt from a document
pub fn extract_prompts(document: &Document) -> Vec<Prompt> {
    let (body, offset) = document.body();

    split_blocks(body, offset)
        .iter()
        .filter_map(|block| {
            qa::extract(block, document).or_else(|| cloze::extract(block, document))
        })
        .collect()
}

/// Extract prompts from many documents
pub fn extract_all(documents: &[Document]) -> Vec<Prompt> {
    let prompts: Vec<Prompt> = documents.iter().flat_map(extract_prompts).collect();
    log::info!("Extracted {} prompts from {} documents", prompts.len(), documents.len());
    prompts
}
