//! The closed set of managed agents and their static descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// File name agents share for cross-agent instructions. Memory files with
/// this name are renamed to the agent's own instructions file at link time.
pub const SHARED_INSTRUCTIONS_FILE: &str = "AGENTS.md";

/// One of the five agent CLIs corral manages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AgentId {
    /// Claude Code (`claude`).
    Claude,
    /// Codex CLI (`codex`).
    Codex,
    /// Gemini CLI (`gemini`).
    Gemini,
    /// GitHub Copilot CLI (`copilot`).
    Copilot,
    /// Cursor Agent (`cursor-agent`).
    Cursor,
}

/// On-disk format of an agent's command files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandFormat {
    /// Markdown with YAML front matter.
    Markdown,
    /// TOML with `description` and `prompt` keys.
    Toml,
}

/// What an agent's config surface supports.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub hooks: bool,
    pub mcp: bool,
    pub skills: bool,
    pub allowlist: bool,
}

/// Static description of one managed agent.
#[derive(Debug, Clone, Copy)]
pub struct AgentDescriptor {
    /// Human-facing name.
    pub display_name: &'static str,
    /// Executable name on PATH.
    pub cli_name: &'static str,
    /// Upstream npm package, when the agent is npm-distributed.
    pub package: Option<&'static str>,
    /// Config directory basename under HOME (e.g. `.claude`).
    pub config_dir: &'static str,
    /// Subdirectory of the config dir holding command files.
    pub commands_subdir: &'static str,
    /// The agent's instructions/memory file name.
    pub instructions_file: &'static str,
    /// Command file format.
    pub command_format: CommandFormat,
    /// Supported config surfaces.
    pub capabilities: Capabilities,
}

const CLAUDE: AgentDescriptor = AgentDescriptor {
    display_name: "Claude Code",
    cli_name: "claude",
    package: Some("@anthropic-ai/claude-code"),
    config_dir: ".claude",
    commands_subdir: "commands",
    instructions_file: "CLAUDE.md",
    command_format: CommandFormat::Markdown,
    capabilities: Capabilities {
        hooks: true,
        mcp: true,
        skills: true,
        allowlist: true,
    },
};

const CODEX: AgentDescriptor = AgentDescriptor {
    display_name: "Codex CLI",
    cli_name: "codex",
    package: Some("@openai/codex"),
    config_dir: ".codex",
    commands_subdir: "prompts",
    instructions_file: "AGENTS.md",
    command_format: CommandFormat::Markdown,
    capabilities: Capabilities {
        hooks: false,
        mcp: true,
        skills: true,
        allowlist: false,
    },
};

const GEMINI: AgentDescriptor = AgentDescriptor {
    display_name: "Gemini CLI",
    cli_name: "gemini",
    package: Some("@google/gemini-cli"),
    config_dir: ".gemini",
    commands_subdir: "commands",
    instructions_file: "GEMINI.md",
    command_format: CommandFormat::Toml,
    capabilities: Capabilities {
        hooks: false,
        mcp: true,
        skills: false,
        allowlist: false,
    },
};

const COPILOT: AgentDescriptor = AgentDescriptor {
    display_name: "Copilot CLI",
    cli_name: "copilot",
    package: Some("@github/copilot"),
    config_dir: ".copilot",
    commands_subdir: "prompts",
    instructions_file: "AGENTS.md",
    command_format: CommandFormat::Markdown,
    capabilities: Capabilities {
        hooks: false,
        mcp: true,
        skills: false,
        allowlist: false,
    },
};

const CURSOR: AgentDescriptor = AgentDescriptor {
    display_name: "Cursor Agent",
    cli_name: "cursor-agent",
    package: None,
    config_dir: ".cursor",
    commands_subdir: "commands",
    instructions_file: "AGENTS.md",
    command_format: CommandFormat::Markdown,
    capabilities: Capabilities {
        hooks: false,
        mcp: true,
        skills: false,
        allowlist: false,
    },
};

impl AgentId {
    /// Every managed agent, in display order.
    pub const ALL: [AgentId; 5] = [
        AgentId::Claude,
        AgentId::Codex,
        AgentId::Gemini,
        AgentId::Copilot,
        AgentId::Cursor,
    ];

    /// The static descriptor for this agent.
    pub fn descriptor(&self) -> &'static AgentDescriptor {
        match self {
            AgentId::Claude => &CLAUDE,
            AgentId::Codex => &CODEX,
            AgentId::Gemini => &GEMINI,
            AgentId::Copilot => &COPILOT,
            AgentId::Cursor => &CURSOR,
        }
    }

    /// Stable lowercase key used in files and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::Claude => "claude",
            AgentId::Codex => "codex",
            AgentId::Gemini => "gemini",
            AgentId::Copilot => "copilot",
            AgentId::Cursor => "cursor",
        }
    }

    /// Parses a string key into an `AgentId`.
    ///
    /// ```
    /// use corral_core::AgentId;
    ///
    /// assert_eq!(AgentId::parse("claude"), Some(AgentId::Claude));
    /// assert_eq!(AgentId::parse("CODEX"), Some(AgentId::Codex));
    /// assert_eq!(AgentId::parse("unknown"), None);
    /// ```
    pub fn parse(key: &str) -> Option<AgentId> {
        AgentId::ALL
            .into_iter()
            .find(|a| key.eq_ignore_ascii_case(a.as_str()))
    }

    /// Whether this agent supports programmatic one-shot execution and can
    /// therefore be used by daemon jobs.
    pub fn supports_jobs(&self) -> bool {
        matches!(self, AgentId::Claude | AgentId::Codex | AgentId::Gemini)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_agent() {
        for agent in AgentId::ALL {
            assert_eq!(AgentId::parse(agent.as_str()), Some(agent));
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(AgentId::parse("Claude"), Some(AgentId::Claude));
        assert_eq!(AgentId::parse("GEMINI"), Some(AgentId::Gemini));
    }

    #[test]
    fn unknown_agent_is_none() {
        assert_eq!(AgentId::parse("aider"), None);
        assert_eq!(AgentId::parse(""), None);
    }

    #[test]
    fn gemini_is_the_only_toml_agent() {
        let toml_agents: Vec<AgentId> = AgentId::ALL
            .into_iter()
            .filter(|a| a.descriptor().command_format == CommandFormat::Toml)
            .collect();
        assert_eq!(toml_agents, vec![AgentId::Gemini]);
    }

    #[test]
    fn job_agents_are_the_closed_trio() {
        let job_agents: Vec<AgentId> = AgentId::ALL
            .into_iter()
            .filter(AgentId::supports_jobs)
            .collect();
        assert_eq!(
            job_agents,
            vec![AgentId::Claude, AgentId::Codex, AgentId::Gemini]
        );
    }

    #[test]
    fn cursor_has_no_package() {
        assert!(AgentId::Cursor.descriptor().package.is_none());
        for agent in [AgentId::Claude, AgentId::Codex, AgentId::Gemini] {
            assert!(agent.descriptor().package.is_some());
        }
    }

    #[test]
    fn serde_uses_lowercase_keys() {
        let json = serde_json::to_string(&AgentId::Claude).unwrap();
        assert_eq!(json, "\"claude\"");
        let back: AgentId = serde_json::from_str("\"gemini\"").unwrap();
        assert_eq!(back, AgentId::Gemini);
    }
}
