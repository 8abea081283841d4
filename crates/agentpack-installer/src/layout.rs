use std::path::{Path, PathBuf};

use agentpack_core::{MCP_BINARY, SERVER_BINARY};

pub const BIN_DIR_ENV: &str = "AGENTPACK_BIN_DIR";
pub const SETTINGS_FILE_ENV: &str = "AGENTPACK_SETTINGS_FILE";
pub const MCP_FILE_ENV: &str = "AGENTPACK_MCP_FILE";

/// All on-disk locations one installation touches, computed once up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPaths {
    pub home: PathBuf,
    pub bin_dir: PathBuf,
    pub agents_dir: PathBuf,
    pub settings_file: PathBuf,
    pub mcp_file: PathBuf,
    pub state_file: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub bin_dir: Option<String>,
    pub settings_file: Option<String>,
    pub mcp_file: Option<String>,
}

impl PathOverrides {
    pub fn from_env() -> Self {
        Self {
            bin_dir: std::env::var(BIN_DIR_ENV).ok(),
            settings_file: std::env::var(SETTINGS_FILE_ENV).ok(),
            mcp_file: std::env::var(MCP_FILE_ENV).ok(),
        }
    }
}

/// Pure computation, no I/O. Override rule: empty keeps the default, a
/// leading `~` expands to home, a relative path resolves against home, an
/// absolute path is used verbatim.
pub fn resolve_install_paths(home: &Path, overrides: &PathOverrides) -> InstallPaths {
    let agentpack_root = home.join(".agentpack");
    let config_root = home.join(".config").join("agentstudio");

    InstallPaths {
        home: home.to_path_buf(),
        bin_dir: resolve_override(home, overrides.bin_dir.as_deref(), agentpack_root.join("bin")),
        agents_dir: agentpack_root.join("agents"),
        settings_file: resolve_override(
            home,
            overrides.settings_file.as_deref(),
            config_root.join("settings.json"),
        ),
        mcp_file: resolve_override(
            home,
            overrides.mcp_file.as_deref(),
            config_root.join("mcp.json"),
        ),
        state_file: agentpack_root.join("state").join("tracked.json"),
    }
}

fn resolve_override(home: &Path, value: Option<&str>, default: PathBuf) -> PathBuf {
    let Some(value) = value else {
        return default;
    };
    if value.is_empty() {
        return default;
    }

    if let Some(rest) = value.strip_prefix('~') {
        let rest = rest.trim_start_matches('/');
        if rest.is_empty() {
            return home.to_path_buf();
        }
        return home.join(rest);
    }

    let path = Path::new(value);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    home.join(path)
}

impl InstallPaths {
    pub fn server_binary(&self) -> PathBuf {
        self.bin_dir.join(binary_file_name(SERVER_BINARY))
    }

    pub fn mcp_binary(&self) -> PathBuf {
        self.bin_dir.join(binary_file_name(MCP_BINARY))
    }

    pub fn managed_binary_paths(&self) -> [PathBuf; 2] {
        [self.server_binary(), self.mcp_binary()]
    }
}

fn binary_file_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}
