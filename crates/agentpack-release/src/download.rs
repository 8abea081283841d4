use std::io::Write;
use std::path::Path;

use agentpack_core::{CancelToken, Error};
use agentpack_security::sha256_hex;
use tempfile::NamedTempFile;

use crate::http::HttpFetcher;
use crate::release::{BundleAssets, ReleaseAsset};

/// A downloaded asset spooled to a temp file; the file is removed when the
/// value is dropped, on every exit path.
#[derive(Debug)]
pub struct DownloadedAsset {
    pub name: String,
    pub sha256: String,
    spool: NamedTempFile,
}

impl DownloadedAsset {
    pub fn path(&self) -> &Path {
        self.spool.path()
    }
}

#[derive(Debug)]
pub struct DownloadedBundle {
    pub agents: DownloadedAsset,
    pub server: DownloadedAsset,
    pub mcp: DownloadedAsset,
}

pub fn download_bundle(
    http: &dyn HttpFetcher,
    assets: &BundleAssets<'_>,
    cancel: &CancelToken,
    on_asset: &mut dyn FnMut(&str),
) -> Result<DownloadedBundle, Error> {
    Ok(DownloadedBundle {
        agents: download_asset(http, assets.agents, cancel, on_asset)?,
        server: download_asset(http, assets.server, cancel, on_asset)?,
        mcp: download_asset(http, assets.mcp, cancel, on_asset)?,
    })
}

fn download_asset(
    http: &dyn HttpFetcher,
    asset: &ReleaseAsset,
    cancel: &CancelToken,
    on_asset: &mut dyn FnMut(&str),
) -> Result<DownloadedAsset, Error> {
    cancel.check()?;
    on_asset(&asset.name);

    let body = http.get(&asset.browser_download_url)?;
    let sha256 = sha256_hex(&body);

    let mut spool = NamedTempFile::new()
        .map_err(|err| Error::io(format!("failed to spool asset {}", asset.name), err))?;
    spool
        .write_all(&body)
        .and_then(|()| spool.flush())
        .map_err(|err| Error::io(format!("failed to spool asset {}", asset.name), err))?;

    Ok(DownloadedAsset {
        name: asset.name.clone(),
        sha256,
        spool,
    })
}
