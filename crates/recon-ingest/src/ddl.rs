//! Column extraction from `CREATE TABLE` / `CREATE VIEW` definitions.

use std::sync::LazyLock;

use recon_map::{CollaboratorError, ColumnExtractor};
use recon_model::PhysicalColumn;
use regex::Regex;

/// `CREATE [OR REPLACE] [modifiers] TABLE|VIEW [IF NOT EXISTS] name (`
static CREATE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)^\s*CREATE\s+(?:OR\s+REPLACE\s+)?(?:(?:SECURE|TRANSIENT|TEMPORARY|TEMP|LOCAL|GLOBAL|VOLATILE|MATERIALIZED|DYNAMIC|EXTERNAL|RECURSIVE)\s+)*(?:TABLE|VIEW)\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:"[^"]+"|[\w$]+)(?:\s*\.\s*(?:"[^"]+"|[\w$]+))*\s*\("#,
    )
    .expect("valid CREATE header regex")
});

const CONSTRAINT_PREFIXES: &[&str] = &[
    "CONSTRAINT",
    "PRIMARY KEY",
    "UNIQUE",
    "FOREIGN KEY",
    "CHECK",
];

const OPTION_KEYWORDS: &[&str] = &[
    "NOT",
    "NULL",
    "DEFAULT",
    "COMMENT",
    "COLLATE",
    "PRIMARY",
    "UNIQUE",
    "REFERENCES",
    "AUTOINCREMENT",
    "IDENTITY",
    "CONSTRAINT",
    "WITH",
    "MASKING",
    "AS",
];

/// Parses warehouse DDL text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DdlColumnExtractor;

impl ColumnExtractor for DdlColumnExtractor {
    fn extract_columns(&self, definition: &str) -> Result<Vec<PhysicalColumn>, CollaboratorError> {
        Ok(extract_columns(definition))
    }
}

/// Ordered columns of the first parenthesised block after the CREATE header.
///
/// Returns an empty list when the text is not a recognised CREATE statement
/// or declares no column list.
pub fn extract_columns(definition: &str) -> Vec<PhysicalColumn> {
    let Some(header) = CREATE_HEADER.find(definition) else {
        tracing::debug!("definition is not a CREATE TABLE/VIEW statement");
        return Vec::new();
    };
    let Some(body) = parenthesised_body(&definition[header.end()..]) else {
        tracing::debug!("column list is not closed");
        return Vec::new();
    };

    split_top_level(body, ',')
        .into_iter()
        .filter_map(|entry| parse_entry(entry.trim()))
        .collect()
}

/// Text up to the parenthesis closing an already-opened block.
fn parenthesised_body(text: &str) -> Option<&str> {
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    for (i, ch) in text.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on `separator` outside parentheses and quotes.
fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, c) if depth == 0 && (c == separator || (separator == ' ' && c.is_whitespace())) => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn parse_entry(entry: &str) -> Option<PhysicalColumn> {
    if entry.is_empty() {
        return None;
    }
    let upper = entry.to_uppercase();
    if CONSTRAINT_PREFIXES.iter().any(|prefix| {
        upper.starts_with(prefix)
            && upper[prefix.len()..]
                .chars()
                .next()
                .is_none_or(|c| c.is_whitespace() || c == '(')
    }) {
        return None;
    }

    let (name, rest) = split_identifier(entry)?;
    let words: Vec<&str> = split_top_level(rest, ' ')
        .into_iter()
        .filter(|w| !w.is_empty())
        .collect();
    let type_words: Vec<&str> = words
        .into_iter()
        .take_while(|word| {
            let keyword = word
                .split('(')
                .next()
                .unwrap_or_default()
                .to_uppercase();
            !OPTION_KEYWORDS.contains(&keyword.as_str())
        })
        .collect();

    Some(PhysicalColumn::new(name, type_words.join(" ")))
}

/// Leading identifier (quoted or bare) and the remaining text.
fn split_identifier(entry: &str) -> Option<(String, &str)> {
    if let Some(quoted) = entry.strip_prefix('"') {
        let mut name = String::new();
        let mut chars = quoted.char_indices().peekable();
        while let Some((i, ch)) = chars.next() {
            if ch == '"' {
                if chars.peek().is_some_and(|&(_, next)| next == '"') {
                    name.push('"');
                    chars.next();
                    continue;
                }
                return Some((name, &quoted[i + 1..]));
            }
            name.push(ch);
        }
        return None;
    }
    let end = entry.find(char::is_whitespace).unwrap_or(entry.len());
    let name = &entry[..end];
    (!name.is_empty()).then(|| (name.to_string(), &entry[end..]))
}
