//! Rendering prompts into Anki notes and reading records back

use std::collections::BTreeMap;

use pulldown_cmark::{html, Options, Parser};
use serde_json::{json, Value};

use super::client::{NewNote, NoteInfo};
use crate::extraction::cloze::CLOZE_RE;
use crate::prompts::{Prompt, PromptKind};
use crate::sync::RemoteCardRecord;

pub const UUID_FIELD: &str = "UUID";
pub const UPDATE_ID_FIELD: &str = "UpdateId";

/// A note type this crate creates and writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteModel {
    pub name: &'static str,
    pub fields: &'static [&'static str],
    pub is_cloze: bool,
    front: &'static str,
    back: &'static str,
}

pub const QA_MODEL: NoteModel = NoteModel {
    name: "Memium QA",
    fields: &["Question", "Answer", "Extra", UUID_FIELD, UPDATE_ID_FIELD],
    is_cloze: false,
    front: r#"<div class="front">{{Question}}</div><div class="extra">{{Extra}}</div>"#,
    back: r#"<div class="back"><div class="question">{{Question}}</div><div class="answer">{{Answer}}</div><div class="extra">{{Extra}}</div></div>"#,
};

pub const CLOZE_MODEL: NoteModel = NoteModel {
    name: "Memium Cloze",
    fields: &["Text", "Extra", UUID_FIELD, UPDATE_ID_FIELD],
    is_cloze: true,
    front: r#"<div class="front">{{cloze:Text}}</div><div class="extra">{{Extra}}</div>"#,
    back: r#"<div class="back">{{cloze:Text}}</div><div class="extra">{{Extra}}</div>"#,
};

const CSS: &str = ".card { font-family: arial; font-size: 20px; text-align: center; color: black; background-color: white; }\n.extra { font-size: 12px; color: grey; }";

impl NoteModel {
    pub fn for_kind(kind: PromptKind) -> &'static NoteModel {
        match kind {
            PromptKind::Qa => &QA_MODEL,
            PromptKind::Cloze => &CLOZE_MODEL,
        }
    }

    /// Parameters for AnkiConnect `createModel`
    pub fn create_params(&self) -> Value {
        json!({
            "modelName": self.name,
            "inOrderFields": self.fields,
            "css": CSS,
            "isCloze": self.is_cloze,
            "cardTemplates": [{
                "Name": self.template_name(),
                "Front": self.front,
                "Back": self.back,
            }],
        })
    }

    /// Parameters for AnkiConnect `updateModelTemplates`, bringing an existing
    /// note type's card template up to date
    pub fn update_templates_params(&self) -> Value {
        let mut templates = serde_json::Map::new();
        templates.insert(
            self.template_name(),
            json!({ "Front": self.front, "Back": self.back }),
        );
        json!({ "model": { "name": self.name, "templates": templates } })
    }

    /// Parameters for AnkiConnect `updateModelStyling`
    pub fn update_styling_params(&self) -> Value {
        json!({ "model": { "name": self.name, "css": CSS } })
    }

    fn template_name(&self) -> String {
        format!("{} Card", self.name)
    }
}

/// Render a markdown field to HTML
pub fn render_markdown(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);

    let parser = Parser::new_ext(text, options);
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Rewrite `{hidden}` spans into numbered Anki cloze deletions
pub fn to_anki_cloze(text: &str) -> String {
    let mut n = 0;
    CLOZE_RE
        .replace_all(text, |caps: &regex::Captures| {
            n += 1;
            format!("{{{{c{}::{}}}}}", n, &caps[1])
        })
        .into_owned()
}

/// Extra field: where the prompt came from plus its tags
fn extra(prompt: &Prompt) -> String {
    let mut parts = Vec::new();
    if let Some(provenance) = prompt.provenance() {
        parts.push(format!("{}:{}", provenance.path.display(), provenance.line_nr));
    }
    if !prompt.tags().is_empty() {
        parts.push(prompt.tags().join(" "));
    }
    parts.join(" | ")
}

/// Field values for a prompt's note, keyed by field name
pub fn note_fields(prompt: &Prompt) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();

    match prompt.kind() {
        PromptKind::Qa => {
            let question = prompt.display_question().unwrap_or_default();
            let answer = prompt.answer().unwrap_or_default();
            fields.insert("Question".to_string(), render_markdown(question));
            fields.insert("Answer".to_string(), render_markdown(answer));
        }
        PromptKind::Cloze => {
            let text = prompt.text().unwrap_or_default();
            fields.insert("Text".to_string(), render_markdown(&to_anki_cloze(text)));
        }
    }

    fields.insert("Extra".to_string(), extra(prompt));
    fields.insert(UUID_FIELD.to_string(), prompt.scheduling_id().to_string());
    fields.insert(UPDATE_ID_FIELD.to_string(), prompt.update_id().to_string());
    fields
}

/// Anki tags cannot contain spaces
fn anki_tags(prompt: &Prompt) -> Vec<String> {
    prompt.tags().iter().map(|t| t.replace(' ', "_")).collect()
}

pub fn new_note(deck: &str, prompt: &Prompt) -> NewNote {
    NewNote {
        deck_name: deck.to_string(),
        model_name: NoteModel::for_kind(prompt.kind()).name.to_string(),
        fields: note_fields(prompt),
        tags: anki_tags(prompt),
    }
}

/// Parse an id field. Fields edited in Anki may come back wrapped in `<p>`.
fn parse_id_field(value: &str) -> Option<u64> {
    value
        .replace("<p>", "")
        .replace("</p>", "")
        .trim()
        .parse()
        .ok()
}

/// Remote record for a note, or `None` for notes this crate does not manage
pub fn record_from_note(note: &NoteInfo) -> Option<RemoteCardRecord> {
    let scheduling_id = note.field(UUID_FIELD).and_then(parse_id_field)?;

    Some(RemoteCardRecord {
        scheduling_id,
        handle: note.note_id,
        update_id: note.field(UPDATE_ID_FIELD).and_then(parse_id_field),
    })
}

/// Search query for the notes directly in `deck`, excluding its subdecks
pub fn deck_query(deck: &str) -> String {
    let mut escaped = String::with_capacity(deck.len());
    for c in deck.chars() {
        // `*` and `_` are wildcards in Anki searches
        if matches!(c, '\\' | '"' | '*' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    format!(r#""deck:{0}" -"deck:{0}::*""#, escaped)
}
