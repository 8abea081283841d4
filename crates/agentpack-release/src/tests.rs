use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use agentpack_core::{latest_release_url, CancelToken, Error};
use agentpack_security::sha256_hex;

use crate::{download_bundle, fetch_latest_release, select_bundle_assets, HttpFetcher, Release};

struct CannedFetcher {
    responses: HashMap<String, Vec<u8>>,
    hits: AtomicUsize,
}

impl CannedFetcher {
    fn new(responses: HashMap<String, Vec<u8>>) -> Self {
        Self {
            responses,
            hits: AtomicUsize::new(0),
        }
    }
}

impl HttpFetcher for CannedFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>, Error> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Http {
                url: url.to_string(),
                detail: "unexpected status 404 Not Found".to_string(),
            })
    }
}

fn release_json(id: i64, tag: &str, asset_names: &[&str]) -> Vec<u8> {
    let assets = asset_names
        .iter()
        .map(|name| {
            format!(
                "{{\"name\":\"{name}\",\"browser_download_url\":\"https://dl.example.test/{name}\"}}"
            )
        })
        .collect::<Vec<_>>()
        .join(",");
    format!("{{\"id\":{id},\"tag_name\":\"{tag}\",\"assets\":[{assets}]}}").into_bytes()
}

#[test]
fn fetch_latest_release_parses_metadata() {
    let url = latest_release_url("agentpack-sh/agentpack");
    let fetcher = CannedFetcher::new(HashMap::from([(
        url,
        release_json(42, "v1.2.0", &["agents.zip", "agentpack-server", "agentpack-mcp"]),
    )]));

    let release = fetch_latest_release(&fetcher, "agentpack-sh/agentpack").expect("must resolve");
    assert_eq!(release.id, 42);
    assert_eq!(release.tag_name, "v1.2.0");
    assert_eq!(release.assets.len(), 3);
}

#[test]
fn fetch_latest_release_rejects_malformed_payload() {
    let url = latest_release_url("agentpack-sh/agentpack");
    let fetcher = CannedFetcher::new(HashMap::from([(url, b"not json".to_vec())]));

    let err = fetch_latest_release(&fetcher, "agentpack-sh/agentpack")
        .expect_err("malformed metadata must fail");
    assert!(matches!(err, Error::ReleaseMetadata { .. }));
}

#[test]
fn select_bundle_assets_names_every_missing_asset() {
    let release: Release =
        serde_json::from_slice(&release_json(7, "v0.9.0", &["agentpack-server"]))
            .expect("must parse");

    let err = select_bundle_assets(&release).expect_err("incomplete release must fail");
    match err {
        Error::MissingAssets { tag, missing } => {
            assert_eq!(tag, "v0.9.0");
            assert_eq!(missing, vec!["agents.zip", "agentpack-mcp"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn download_bundle_spools_assets_and_records_digests() {
    let release: Release = serde_json::from_slice(&release_json(
        7,
        "v1.0.0",
        &["agents.zip", "agentpack-server", "agentpack-mcp"],
    ))
    .expect("must parse");
    let assets = select_bundle_assets(&release).expect("must select");

    let fetcher = CannedFetcher::new(HashMap::from([
        (
            "https://dl.example.test/agents.zip".to_string(),
            b"zip-bytes".to_vec(),
        ),
        (
            "https://dl.example.test/agentpack-server".to_string(),
            b"server-bytes".to_vec(),
        ),
        (
            "https://dl.example.test/agentpack-mcp".to_string(),
            b"mcp-bytes".to_vec(),
        ),
    ]));

    let cancel = CancelToken::new();
    let mut seen = Vec::new();
    let bundle = download_bundle(&fetcher, &assets, &cancel, &mut |name| {
        seen.push(name.to_string());
    })
    .expect("must download");

    assert_eq!(seen, vec!["agents.zip", "agentpack-server", "agentpack-mcp"]);
    assert_eq!(bundle.agents.sha256, sha256_hex(b"zip-bytes"));
    assert_eq!(
        std::fs::read(bundle.server.path()).expect("must read spool"),
        b"server-bytes"
    );
    assert_eq!(fetcher.hits.load(Ordering::SeqCst), 3);
}

#[test]
fn download_bundle_stops_on_cancellation() {
    let release: Release = serde_json::from_slice(&release_json(
        7,
        "v1.0.0",
        &["agents.zip", "agentpack-server", "agentpack-mcp"],
    ))
    .expect("must parse");
    let assets = select_bundle_assets(&release).expect("must select");

    let fetcher = CannedFetcher::new(HashMap::new());
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = download_bundle(&fetcher, &assets, &cancel, &mut |_| {})
        .expect_err("cancelled token must abort");
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(fetcher.hits.load(Ordering::SeqCst), 0);
}
