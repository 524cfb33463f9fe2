//! Heading-based section extraction (the fallback when `mq` is absent).

use anyhow::bail;
use regex::Regex;

use crate::Result;

/// Returns the body of the section whose heading text matches `section`,
/// up to (but not including) the next heading of equal or shallower
/// depth, trimmed.
pub fn extract_section(content: &str, section: &str) -> Result<String> {
    let pattern = format!(r"(?m)^(#{{1,6}})\s+{}\s*$", regex::escape(section));
    let heading = Regex::new(&pattern)?;

    let Some(found) = heading.captures(content) else {
        bail!("section '{section}' not found");
    };
    let depth = found
        .get(1)
        .map(|m| m.as_str().len())
        .unwrap_or(1);
    let start = found.get(0).map(|m| m.end()).unwrap_or(0);

    let rest = &content[start..];
    let any_heading = Regex::new(r"(?m)^(#{1,6})\s+\S")?;
    let mut end = rest.len();
    for cap in any_heading.captures_iter(rest) {
        let candidate_depth = cap.get(1).map(|m| m.as_str().len()).unwrap_or(usize::MAX);
        if candidate_depth <= depth {
            end = cap.get(0).map(|m| m.start()).unwrap_or(end);
            break;
        }
    }
    Ok(rest[..end].trim().to_string())
}
