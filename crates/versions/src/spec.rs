//! Agent install spec parsing (`<agent>[@<version>]`).

use corral_core::AgentId;

/// Parses an install spec into an agent and version.
///
/// The version defaults to `latest`. Unknown agent names yield `None`.
///
/// ```
/// use corral_core::AgentId;
/// use corral_versions::parse_spec;
///
/// assert_eq!(parse_spec("claude"), Some((AgentId::Claude, "latest".into())));
/// assert_eq!(parse_spec("codex@0.47.0"), Some((AgentId::Codex, "0.47.0".into())));
/// assert_eq!(parse_spec("vim@9"), None);
/// ```
pub fn parse_spec(spec: &str) -> Option<(AgentId, String)> {
    let spec = spec.trim();
    let (name, version) = match spec.split_once('@') {
        Some((name, version)) if !version.is_empty() => (name, version),
        Some(_) => return None,
        None => (spec, "latest"),
    };
    AgentId::parse(name).map(|agent| (agent, version.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_agent_means_latest() {
        assert_eq!(
            parse_spec("gemini"),
            Some((AgentId::Gemini, "latest".into()))
        );
    }

    #[test]
    fn pinned_versions_pass_through() {
        assert_eq!(
            parse_spec("claude@2.0.14"),
            Some((AgentId::Claude, "2.0.14".into()))
        );
        assert_eq!(
            parse_spec("codex@latest"),
            Some((AgentId::Codex, "latest".into()))
        );
    }

    #[test]
    fn invalid_inputs_are_none() {
        assert_eq!(parse_spec("emacs"), None);
        assert_eq!(parse_spec("claude@"), None);
        assert_eq!(parse_spec(""), None);
    }
}
