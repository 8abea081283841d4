use agentpack_core::{latest_release_url, AGENTS_ASSET, Error, MCP_ASSET, SERVER_ASSET};
use serde::Deserialize;

use crate::http::HttpFetcher;

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub id: i64,
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// The three assets every bundle release must carry.
#[derive(Debug, Clone, Copy)]
pub struct BundleAssets<'a> {
    pub agents: &'a ReleaseAsset,
    pub server: &'a ReleaseAsset,
    pub mcp: &'a ReleaseAsset,
}

pub fn fetch_latest_release(http: &dyn HttpFetcher, repo: &str) -> Result<Release, Error> {
    let body = http.get(&latest_release_url(repo))?;
    serde_json::from_slice(&body).map_err(|err| Error::ReleaseMetadata {
        repo: repo.to_string(),
        detail: err.to_string(),
    })
}

/// Fails fast, before any download, when any expected asset is absent; the
/// error names every missing asset.
pub fn select_bundle_assets(release: &Release) -> Result<BundleAssets<'_>, Error> {
    let find = |name: &str| release.assets.iter().find(|asset| asset.name == name);

    let agents = find(AGENTS_ASSET);
    let server = find(SERVER_ASSET);
    let mcp = find(MCP_ASSET);

    if let (Some(agents), Some(server), Some(mcp)) = (agents, server, mcp) {
        return Ok(BundleAssets {
            agents,
            server,
            mcp,
        });
    }

    let mut missing = Vec::new();
    for (asset, name) in [(agents, AGENTS_ASSET), (server, SERVER_ASSET), (mcp, MCP_ASSET)] {
        if asset.is_none() {
            missing.push(name.to_string());
        }
    }
    Err(Error::MissingAssets {
        tag: release.tag_name.clone(),
        missing,
    })
}
