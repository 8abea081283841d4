mod bundle;
mod cancel;
mod error;

pub use bundle::{
    latest_release_url, required_asset_names, AGENTS_ASSET, DEFAULT_REPO, MANAGED_SERVER_KEY,
    MCP_ASSET, MCP_BINARY, MCP_INPUTS_FIELD, MCP_SERVERS_FIELD, RELEASE_API_BASE, SERVER_ASSET,
    SERVER_BINARY, SETTINGS_AGENT_FILES_FIELD, SETTINGS_PARENT_FIELD, STATE_SCHEMA_VERSION,
};
pub use cancel::CancelToken;
pub use error::{Error, Result};

#[cfg(test)]
mod tests;
