mod download;
mod http;
mod release;

pub use download::{download_bundle, DownloadedAsset, DownloadedBundle};
pub use http::{HttpFetcher, ReqwestFetcher};
pub use release::{fetch_latest_release, select_bundle_assets, BundleAssets, Release, ReleaseAsset};

#[cfg(test)]
mod tests;
