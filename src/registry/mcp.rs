//! MCP server catalog
//!
//! Each server binding declares its transport, the prerequisites it needs on
//! the workstation, and the secret environment variables it reads. The
//! mcp-prereq view checks prerequisites; the secrets wizard collects values
//! for [`McpSecret`] entries into the private secrets store.

use std::process::Command;

/// How the server communicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpTransport {
    Http,
    Stdio,
}

/// A requirement for an MCP server (a binary, an auth state, a system fix).
#[derive(Debug, Clone)]
pub struct McpPrerequisite {
    pub id: &'static str,
    pub name: &'static str,
    /// Command + args probed for success, e.g. ["node", "--version"]
    pub check_cmd: &'static [&'static str],
    /// Shown to the user when the check fails
    pub fix_instructions: &'static str,
}

/// A secret environment variable a server reads.
#[derive(Debug, Clone)]
pub struct McpSecret {
    pub env_var: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Where to obtain the credential
    pub get_url: &'static str,
    /// Required secrets block the server; optional ones degrade it
    pub required: bool,
}

/// A single MCP server binding.
#[derive(Debug, Clone)]
pub struct McpServer {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub transport: McpTransport,
    /// HTTP transport: endpoint URL
    pub url: &'static str,
    /// Stdio transport: command line to execute
    pub command: &'static str,
    pub prerequisites: &'static [McpPrerequisite],
    pub secrets: &'static [McpSecret],
}

/// The outcome of probing one prerequisite.
#[derive(Debug, Clone)]
pub struct PrerequisiteResult {
    pub prerequisite: McpPrerequisite,
    pub passed: bool,
}

impl McpServer {
    /// Probe every prerequisite. Each check is a short command run; a
    /// non-zero exit or spawn failure counts as not passed.
    pub fn check_prerequisites(&self) -> Vec<PrerequisiteResult> {
        self.prerequisites
            .iter()
            .map(|p| {
                let passed = match p.check_cmd.split_first() {
                    Some((bin, args)) => Command::new(bin)
                        .args(args)
                        .output()
                        .map(|o| o.status.success())
                        .unwrap_or(false),
                    None => false,
                };
                PrerequisiteResult {
                    prerequisite: p.clone(),
                    passed,
                }
            })
            .collect()
    }

    /// Required secrets that must be collected before the server works.
    pub fn required_secrets(&self) -> Vec<&McpSecret> {
        self.secrets.iter().filter(|s| s.required).collect()
    }
}

const NODE_PREREQ: McpPrerequisite = McpPrerequisite {
    id: "nodejs",
    name: "Node.js via fnm",
    check_cmd: &["node", "--version"],
    fix_instructions: "Install Node.js from the dashboard first",
};

const GH_AUTH_PREREQ: McpPrerequisite = McpPrerequisite {
    id: "gh_auth",
    name: "GitHub CLI authentication",
    check_cmd: &["gh", "auth", "status"],
    fix_instructions: "Run `gh auth login` in another terminal",
};

/// The fixed server catalog.
pub fn mcp_servers() -> Vec<McpServer> {
    vec![
        McpServer {
            id: "context7",
            display_name: "Context7",
            description: "Library documentation lookup",
            transport: McpTransport::Http,
            url: "https://mcp.context7.com/mcp",
            command: "",
            prerequisites: &[],
            secrets: &[McpSecret {
                env_var: "CONTEXT7_API_KEY",
                name: "Context7 API Key",
                description: "API key for the hosted Context7 endpoint",
                get_url: "https://context7.com",
                required: true,
            }],
        },
        McpServer {
            id: "github",
            display_name: "GitHub",
            description: "Repository and issue access",
            transport: McpTransport::Stdio,
            url: "",
            command: "gh mcp serve",
            prerequisites: &[GH_AUTH_PREREQ],
            secrets: &[],
        },
        McpServer {
            id: "filesystem",
            display_name: "Filesystem",
            description: "Sandboxed file access for agents",
            transport: McpTransport::Stdio,
            url: "",
            command: "npx -y @modelcontextprotocol/server-filesystem",
            prerequisites: &[NODE_PREREQ],
            secrets: &[],
        },
        McpServer {
            id: "memory",
            display_name: "Memory",
            description: "Persistent knowledge graph",
            transport: McpTransport::Stdio,
            url: "",
            command: "npx -y @modelcontextprotocol/server-memory",
            prerequisites: &[NODE_PREREQ],
            secrets: &[],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_ids_unique() {
        let servers = mcp_servers();
        let mut ids: Vec<_> = servers.iter().map(|s| s.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), servers.len());
    }

    #[test]
    fn test_transport_fields_consistent() {
        for server in mcp_servers() {
            match server.transport {
                McpTransport::Http => assert!(!server.url.is_empty(), "{}", server.id),
                McpTransport::Stdio => assert!(!server.command.is_empty(), "{}", server.id),
            }
        }
    }

    #[test]
    fn test_required_secrets() {
        let context7 = mcp_servers().into_iter().find(|s| s.id == "context7").unwrap();
        assert_eq!(context7.required_secrets().len(), 1);
    }
}
