//! YAML frontmatter extraction from `.roadmap` markdown files.
//!
//! Expected shape:
//! ```text
//! ---
//! key: value
//! ---
//! # Markdown content
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde_yaml::Value;
use tracing::{error, warn};

const DELIMITER: &str = "---\n";
const END_MARKER: &str = "\n---\n";

/// Parses the YAML frontmatter block. Files without a frontmatter block
/// are treated as having an empty metadata map, not an error. A block
/// that fails to parse is logged and also yields an empty map — callers
/// that need a hard `schema` error wrap this with their own check (the
/// File Parser's `parse` operation does).
pub fn parse_yaml_frontmatter(path: &Path) -> HashMap<String, Value> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            error!(file = %path.display(), error = %err, "failed to read file for frontmatter parsing");
            return HashMap::new();
        }
    };

    if !content.starts_with(DELIMITER) {
        return HashMap::new();
    }

    match content[DELIMITER.len()..].find(END_MARKER) {
        Some(offset) => {
            let end = DELIMITER.len() + offset;
            let frontmatter = &content[DELIMITER.len()..end];
            parse_mapping(frontmatter, path)
        }
        None => {
            // No end marker: treat the entire file as one YAML document,
            // matching the original's fallback behavior.
            parse_mapping(&content, path)
        }
    }
}

fn parse_mapping(text: &str, path: &Path) -> HashMap<String, Value> {
    match serde_yaml::from_str::<Value>(text) {
        Ok(Value::Mapping(map)) => map
            .into_iter()
            .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v)))
            .collect(),
        Ok(_) => HashMap::new(),
        Err(err) => {
            warn!(file = %path.display(), error = %err, "failed to parse yaml frontmatter");
            HashMap::new()
        }
    }
}

/// A `schema` error is raised only when the content clearly begins a
/// frontmatter block (`---\n`) but the embedded YAML is invalid — this
/// mirrors the `parse(path) -> Entity | ParseError` contract's
/// distinction between "no frontmatter" (fine) and "malformed
/// frontmatter" (an error naming the path).
pub fn validate_frontmatter(path: &Path) -> Result<HashMap<String, Value>, String> {
    let content = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;

    if !content.starts_with(DELIMITER) {
        return Ok(HashMap::new());
    }

    let frontmatter = match content[DELIMITER.len()..].find(END_MARKER) {
        Some(offset) => &content[DELIMITER.len()..DELIMITER.len() + offset],
        None => &content[..],
    };

    match serde_yaml::from_str::<Value>(frontmatter) {
        Ok(Value::Mapping(map)) => Ok(map
            .into_iter()
            .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v)))
            .collect()),
        Ok(_) => Ok(HashMap::new()),
        Err(err) => Err(format!("{}: {err}", path.display())),
    }
}

/// Like `validate_frontmatter`, but also returns the markdown body that
/// follows the closing `---` so callers can populate an entity's
/// free-text content.
pub fn parse_with_body(path: &Path) -> Result<(HashMap<String, Value>, String), String> {
    let content = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;

    if !content.starts_with(DELIMITER) {
        return Ok((HashMap::new(), content));
    }

    match content[DELIMITER.len()..].find(END_MARKER) {
        Some(offset) => {
            let end = DELIMITER.len() + offset;
            let frontmatter = &content[DELIMITER.len()..end];
            let body = content[end + END_MARKER.len()..].to_string();
            match serde_yaml::from_str::<Value>(frontmatter) {
                Ok(Value::Mapping(map)) => Ok((
                    map.into_iter()
                        .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v)))
                        .collect(),
                    body,
                )),
                Ok(_) => Ok((HashMap::new(), body)),
                Err(err) => Err(format!("{}: {err}", path.display())),
            }
        }
        None => match serde_yaml::from_str::<Value>(&content) {
            Ok(Value::Mapping(map)) => Ok((
                map.into_iter()
                    .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v)))
                    .collect(),
                String::new(),
            )),
            Ok(_) => Ok((HashMap::new(), String::new())),
            Err(err) => Err(format!("{}: {err}", path.display())),
        },
    }
}
