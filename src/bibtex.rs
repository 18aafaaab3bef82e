//! BibTeX reading and writing.
//!
//! Entries keep every field in source order so that a corrected bibliography
//! round-trips fields this tool does not touch. Only `title`, `year`,
//! `author`, `journal` and `note` are mapped onto a `Citation`.
//!
//! `@string`, `@preamble` and `@comment` blocks are kept verbatim and written
//! ahead of the entries, so macro references in untouched fields stay defined.
//! Field values are also expanded (macros substituted, `#` chains joined) for
//! lookups.

use crate::models::Citation;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibField {
    pub name: String,
    /// Expanded value without outer delimiters; inner braces are kept.
    pub value: String,
    /// Source text written back as-is while the value is unchanged.
    /// Set for bare numbers, macro references and `#` concatenations.
    pub raw: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibEntry {
    pub entry_type: String,
    pub cite_key: String,
    pub fields: Vec<BibField>,
}

impl BibEntry {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.value.as_str())
    }

    /// Update a field in place, or append it when missing.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.fields.iter_mut().find(|f| f.name.eq_ignore_ascii_case(name)) {
            Some(field) => {
                if field.value != value {
                    field.value = value.to_string();
                    field.raw = None;
                }
            }
            None => self.fields.push(BibField {
                name: name.to_string(),
                value: value.to_string(),
                raw: None,
            }),
        }
    }

    pub fn to_citation(&self) -> Citation {
        Citation {
            title: self.get("title").unwrap_or("").to_string(),
            year: self.get("year").map(|s| s.to_string()),
            author: self.get("author").map(|s| s.to_string()),
            journal: self.get("journal").map(|s| s.to_string()),
            note: self.get("note").map(|s| s.to_string()),
        }
    }

    /// Write the citation's fields back onto this entry.
    pub fn apply_citation(&mut self, citation: &Citation) {
        if self.get("title").unwrap_or("") != citation.title {
            self.set("title", &citation.title);
        }
        let optional = [
            ("year", &citation.year),
            ("author", &citation.author),
            ("journal", &citation.journal),
            ("note", &citation.note),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                self.set(name, value);
            }
        }
    }

    pub fn to_bibtex(&self) -> String {
        let mut out = format!("@{}{{{},\n", self.entry_type, self.cite_key);
        for field in &self.fields {
            match &field.raw {
                Some(raw) => out.push_str(&format!("  {} = {},\n", field.name, raw)),
                None => out.push_str(&format!("  {} = {{{}}},\n", field.name, field.value)),
            }
        }
        out.push('}');
        out
    }
}

// ============================================================================
// Files
// ============================================================================

/// A parsed `.bib` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BibFile {
    /// `@string`, `@preamble` and `@comment` blocks, verbatim, in source order.
    pub directives: Vec<String>,
    pub entries: Vec<BibEntry>,
}

impl BibFile {
    pub fn parse(content: &str) -> Self {
        let mut file = BibFile::default();
        let mut macros = HashMap::new();

        for block in split_bib_file(content) {
            match block {
                BibBlock::Directive { kind, text } => {
                    if kind == "string" {
                        if let Some((name, value)) = parse_string_macro(&text, &macros) {
                            macros.insert(name, value);
                        }
                    }
                    file.directives.push(text);
                }
                BibBlock::Entry(text) => {
                    if let Some(entry) = parse_entry_with(&text, &macros) {
                        file.entries.push(entry);
                    }
                }
            }
        }
        file
    }

    pub fn to_bibtex(&self) -> String {
        let mut bib = String::new();
        for directive in &self.directives {
            bib.push_str(directive);
            bib.push_str("\n\n");
        }
        for entry in &self.entries {
            bib.push_str(&entry.to_bibtex());
            bib.push_str("\n\n");
        }
        bib
    }
}

// ============================================================================
// File Splitting
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BibBlock {
    Entry(String),
    /// `kind` is the lowercased directive name (`string`, `preamble`, `comment`).
    Directive { kind: String, text: String },
}

const DIRECTIVES: [&str; 3] = ["comment", "preamble", "string"];

/// Split a multi-entry .bib file into `@...{...}` blocks.
/// Tracks brace depth to handle nested braces correctly.
pub fn split_bib_file(content: &str) -> Vec<BibBlock> {
    let mut blocks = Vec::new();
    let mut chars = content.chars().peekable();

    while let Some(&ch) = chars.peek() {
        if ch != '@' {
            chars.next();
            continue;
        }

        let mut text = String::new();
        let mut block_type = String::new();
        if let Some(at) = chars.next() {
            text.push(at);
        }

        while let Some(&c) = chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                block_type.push(c);
                text.push(c);
                chars.next();
            } else {
                break;
            }
        }

        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                text.push(c);
                chars.next();
            } else {
                break;
            }
        }

        if chars.peek() != Some(&'{') {
            continue;
        }
        let mut depth = 0;
        for c in chars.by_ref() {
            text.push(c);
            if c == '{' {
                depth += 1;
            } else if c == '}' {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
        }

        let text = text.trim().to_string();
        let kind = block_type.to_lowercase();
        if DIRECTIVES.contains(&kind.as_str()) {
            blocks.push(BibBlock::Directive { kind, text });
        } else {
            blocks.push(BibBlock::Entry(text));
        }
    }

    blocks
}

// ============================================================================
// Entry Parsing
// ============================================================================

/// `@string{name = value}` into a lowercased name and its expanded value.
fn parse_string_macro(text: &str, macros: &HashMap<String, String>) -> Option<(String, String)> {
    let open = text.find('{')?;
    let body: Vec<char> = text[open + 1..].chars().collect();
    let eq = body.iter().position(|c| *c == '=')?;
    let name: String = body[..eq].iter().collect();
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return None;
    }

    let mut i = eq + 1;
    while i < body.len() && body[i].is_whitespace() {
        i += 1;
    }
    if i >= body.len() {
        return None;
    }
    let (value, _, _) = read_value(&body, i, macros);
    Some((name, value))
}

/// Parse one `@type{key, field = value, ...}` entry without macro definitions.
pub fn parse_entry(bibtex: &str) -> Option<BibEntry> {
    parse_entry_with(bibtex, &HashMap::new())
}

fn parse_entry_with(bibtex: &str, macros: &HashMap<String, String>) -> Option<BibEntry> {
    let bibtex = bibtex.trim();
    let at_pos = bibtex.find('@')?;
    let after_at = &bibtex[at_pos + 1..];
    let type_end = after_at.find(|c: char| !c.is_alphanumeric() && c != '_')?;
    let entry_type = after_at[..type_end].to_lowercase();

    let after_type = after_at[type_end..].trim_start();
    let body = after_type.strip_prefix('{')?;
    let key_end = body.find(|c: char| c == ',' || c == '}')?;
    let cite_key = body[..key_end].trim().to_string();

    let chars: Vec<char> = body[key_end..].chars().collect();
    let mut fields = Vec::new();
    let mut i = 0;

    loop {
        while i < chars.len() && (chars[i].is_whitespace() || chars[i] == ',') {
            i += 1;
        }
        if i >= chars.len() || chars[i] == '}' {
            break;
        }

        let name_start = i;
        while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '=' && chars[i] != '}' {
            i += 1;
        }
        let name: String = chars[name_start..i].iter().collect();

        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() || chars[i] != '=' {
            // Not a field assignment; the entry is malformed past this point
            break;
        }
        i += 1;
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }

        let (value, raw, next) = read_value(&chars, i, macros);
        i = next;
        fields.push(BibField {
            name: name.to_lowercase(),
            value,
            raw,
        });
    }

    Some(BibEntry {
        entry_type,
        cite_key,
        fields,
    })
}

/// Read a value, following `part # part` chains.
/// Returns the expanded value, the raw source text when it is not a single
/// delimited part, and the index after the value.
fn read_value(
    chars: &[char],
    start: usize,
    macros: &HashMap<String, String>,
) -> (String, Option<String>, usize) {
    let mut value = String::new();
    let mut parts = 0;
    let mut delimited = true;
    let mut i = start;

    while i < chars.len() {
        let (part, is_delimited, next) = read_part(chars, i, macros);
        value.push_str(&part);
        parts += 1;
        delimited &= is_delimited;
        i = next;

        let mut j = i;
        while j < chars.len() && chars[j].is_whitespace() {
            j += 1;
        }
        if j >= chars.len() || chars[j] != '#' {
            break;
        }
        j += 1;
        while j < chars.len() && chars[j].is_whitespace() {
            j += 1;
        }
        i = j;
    }

    let raw = if parts == 1 && delimited {
        None
    } else {
        let text: String = chars[start..i].iter().collect();
        Some(text.trim().to_string())
    };
    (value, raw, i)
}

/// Read one brace-, quote- or bare-delimited part starting at `start`.
fn read_part(
    chars: &[char],
    start: usize,
    macros: &HashMap<String, String>,
) -> (String, bool, usize) {
    match chars[start] {
        '{' => {
            let mut depth = 0;
            let mut i = start;
            while i < chars.len() {
                match chars[i] {
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            let value: String = chars[start + 1..i].iter().collect();
                            return (value, true, i + 1);
                        }
                    }
                    _ => {}
                }
                i += 1;
            }
            (chars[start + 1..].iter().collect(), true, chars.len())
        }
        '"' => {
            let mut depth = 0;
            let mut i = start + 1;
            while i < chars.len() {
                match chars[i] {
                    '{' => depth += 1,
                    '}' => depth -= 1,
                    '"' if depth == 0 => {
                        let value: String = chars[start + 1..i].iter().collect();
                        return (value, true, i + 1);
                    }
                    _ => {}
                }
                i += 1;
            }
            (chars[start + 1..].iter().collect(), true, chars.len())
        }
        _ => {
            let mut i = start;
            while i < chars.len()
                && !chars[i].is_whitespace()
                && !matches!(chars[i], ',' | '}' | '#')
            {
                i += 1;
            }
            let token: String = chars[start..i].iter().collect();
            let value = macros
                .get(&token.to_lowercase())
                .cloned()
                .unwrap_or(token);
            (value, false, i)
        }
    }
}
