use super::Block;
use crate::documents::Document;
use crate::prompts::Prompt;

pub const QUESTION_PREFIX: &str = "Q.";
pub const ANSWER_PREFIX: &str = "A.";

/// Extract a QA prompt from a block.
///
/// The block needs a line starting with `Q.` followed (later) by a line
/// starting with `A.`. Lines in between continue the question, lines after
/// the `A.` line continue the answer.
pub fn extract(block: &Block, document: &Document) -> Option<Prompt> {
    let question_idx = block
        .lines
        .iter()
        .position(|line| line.trim_start().starts_with(QUESTION_PREFIX))?;

    let answer_idx = block.lines[question_idx + 1..]
        .iter()
        .position(|line| line.trim_start().starts_with(ANSWER_PREFIX))
        .map(|i| i + question_idx + 1)?;

    let question = join_after_prefix(&block.lines[question_idx..answer_idx], QUESTION_PREFIX);
    let answer = join_after_prefix(&block.lines[answer_idx..], ANSWER_PREFIX);

    if question.is_empty() || answer.is_empty() {
        return None;
    }

    Some(Prompt::qa_from_document(
        question,
        answer,
        document,
        block.start_line + question_idx,
    ))
}

fn join_after_prefix(lines: &[&str], prefix: &str) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(lines.len());
    if let Some((first, rest)) = lines.split_first() {
        parts.push(first.trim_start()[prefix.len()..].trim());
        parts.extend(rest.iter().map(|line| line.trim()));
    }
    parts.join("\n").trim().to_string()
}
