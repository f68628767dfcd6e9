//! Parse `entry.md`: YAML front matter, an optional lead and the body.

use std::fs;
use std::path::Path;

use flog_api_types::{EntryMeta, META_FIELDS};
use serde_yaml_ng::Value;

use crate::client::CliError;

pub const ENTRY_FILE: &str = "entry.md";
pub const FRONT_MATTER_MARKER: &str = "---";
pub const LEAD_SEPARATOR: &str = "<!--more-->";

/// An entry as authored, before any markup conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub slug: String,
    pub meta: EntryMeta,
    pub lead: Option<String>,
    pub content: String,
}

pub fn read_document(dir: &Path) -> Result<SourceDocument, CliError> {
    let path = dir.join(ENTRY_FILE);
    let source = fs::read_to_string(&path).map_err(|source| CliError::InputFile {
        path: path.display().to_string(),
        source,
    })?;
    parse_document(&source)
}

pub fn parse_document(source: &str) -> Result<SourceDocument, CliError> {
    let lines: Vec<&str> = source.lines().collect();
    let markers: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.trim_end() == FRONT_MATTER_MARKER)
        .map(|(idx, _)| idx)
        .collect();

    let (open, close) = match markers.as_slice() {
        [0, close] => (0, *close),
        [_, _] => {
            return Err(malformed("the document must start with a `---` line"));
        }
        [] | [_] => return Err(malformed("front matter must be enclosed by two `---` lines")),
        more => {
            return Err(malformed(format!(
                "found {} `---` lines, expected exactly two",
                more.len()
            )));
        }
    };

    let front_matter = lines[open + 1..close].join("\n");
    let (slug, meta) = parse_front_matter(&front_matter)?;
    let (lead, content) = split_lead(&lines[close + 1..])?;

    Ok(SourceDocument {
        slug,
        meta,
        lead,
        content,
    })
}

fn parse_front_matter(raw: &str) -> Result<(String, EntryMeta), CliError> {
    let value: Value = serde_yaml_ng::from_str(raw)
        .map_err(|err| malformed(format!("front matter is not valid YAML: {err}")))?;
    let mut mapping = match value {
        Value::Mapping(mapping) => mapping,
        Value::Null => return Err(malformed("front matter is missing `slug`")),
        _ => return Err(malformed("front matter must be a mapping")),
    };

    let slug = match mapping.remove("slug") {
        Some(Value::String(slug)) => slug,
        Some(_) => return Err(malformed("`slug` must be a string")),
        None => return Err(malformed("front matter is missing `slug`")),
    };
    validate_slug(&slug)?;

    for key in mapping.keys() {
        let name = key
            .as_str()
            .ok_or_else(|| malformed("front-matter keys must be strings"))?;
        if !META_FIELDS.contains(&name) {
            return Err(malformed(format!("unknown front-matter field `{name}`")));
        }
    }

    let meta = serde_yaml_ng::from_value::<EntryMeta>(Value::Mapping(mapping))
        .map_err(|err| malformed(format!("invalid front matter: {err}")))?;
    Ok((slug, meta))
}

fn validate_slug(slug: &str) -> Result<(), CliError> {
    if slug.is_empty() {
        return Err(malformed("`slug` must not be empty"));
    }
    if let Some(bad) = slug
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_')))
    {
        return Err(malformed(format!(
            "`slug` may only contain a-z, 0-9, `-` and `_` (found {bad:?})"
        )));
    }
    Ok(())
}

fn split_lead(body: &[&str]) -> Result<(Option<String>, String), CliError> {
    let separators: Vec<usize> = body
        .iter()
        .enumerate()
        .filter(|(_, line)| line.trim() == LEAD_SEPARATOR)
        .map(|(idx, _)| idx)
        .collect();

    match separators.as_slice() {
        [] => Ok((None, body.join("\n"))),
        [at] => Ok((
            Some(body[..*at].join("\n")),
            body[*at + 1..].join("\n"),
        )),
        _ => Err(malformed(format!(
            "at most one `{LEAD_SEPARATOR}` separator is allowed"
        ))),
    }
}

fn malformed(message: impl Into<String>) -> CliError {
    CliError::MalformedDocument(message.into())
}
