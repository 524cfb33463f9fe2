//! Markdown → TOML command conversion.
//!
//! Centrally stored commands are always markdown. Agents whose command
//! format is TOML (Gemini) receive per-file conversions generated at
//! link time: the front-matter `description` and the markdown body become
//! `description` and `prompt` keys.

use crate::Result;

/// Converts a markdown command file into the TOML command format.
///
/// ```
/// use corral_core::command_to_toml;
///
/// let md = "---\ndescription: Review a diff\n---\n\nReview the diff.\n";
/// let toml = command_to_toml("review", md).unwrap();
/// assert!(toml.contains("description = \"Review a diff\""));
/// assert!(toml.contains("prompt = "));
/// ```
pub fn command_to_toml(name: &str, markdown: &str) -> Result<String> {
    let (front, body) = split_front_matter(markdown);

    let description = front
        .as_deref()
        .and_then(front_matter_description)
        .unwrap_or_else(|| format!("{name} command"));

    let mut table = toml::Table::new();
    table.insert("description".into(), toml::Value::String(description));
    table.insert(
        "prompt".into(),
        toml::Value::String(body.trim().to_string()),
    );
    Ok(toml::to_string_pretty(&table)?)
}

/// Splits a leading `---` YAML front-matter block off markdown content.
///
/// Returns `(front_matter_yaml, body)`. Content without front matter, or
/// with an unclosed block, is returned whole as the body.
pub fn split_front_matter(content: &str) -> (Option<String>, String) {
    let trimmed = content.trim_start();
    let Some(after_open) = trimmed.strip_prefix("---") else {
        return (None, content.to_string());
    };
    let after_open = after_open.trim_start_matches(['\r', '\n']);

    for marker in ["\n---", "\r\n---"] {
        if let Some(end) = after_open.find(marker) {
            let yaml = &after_open[..end];
            let rest = &after_open[end + marker.len()..];
            let rest = rest.trim_start_matches(['\r', '\n']);
            return (Some(yaml.to_string()), rest.to_string());
        }
    }
    (None, content.to_string())
}

fn front_matter_description(yaml: &str) -> Option<String> {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml).ok()?;
    value
        .get("description")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}
