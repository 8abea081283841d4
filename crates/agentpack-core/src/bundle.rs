pub const DEFAULT_REPO: &str = "agentpack-sh/agentpack";

pub const RELEASE_API_BASE: &str = "https://api.github.com";

pub const AGENTS_ASSET: &str = "agents.zip";
pub const SERVER_ASSET: &str = "agentpack-server";
pub const MCP_ASSET: &str = "agentpack-mcp";

pub const SERVER_BINARY: &str = "agentpack-server";
pub const MCP_BINARY: &str = "agentpack-mcp";

pub const SETTINGS_AGENT_FILES_FIELD: &str = "agentFilesLocations";
pub const SETTINGS_PARENT_FIELD: &str = "chat";

pub const MCP_SERVERS_FIELD: &str = "servers";
pub const MCP_INPUTS_FIELD: &str = "inputs";
pub const MANAGED_SERVER_KEY: &str = "agentpack";

pub const STATE_SCHEMA_VERSION: u32 = 1;

pub fn required_asset_names() -> [&'static str; 3] {
    [AGENTS_ASSET, SERVER_ASSET, MCP_ASSET]
}

pub fn latest_release_url(repo: &str) -> String {
    format!("{RELEASE_API_BASE}/repos/{repo}/releases/latest")
}
