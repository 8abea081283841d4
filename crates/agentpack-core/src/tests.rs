use std::path::PathBuf;

use crate::{latest_release_url, required_asset_names, CancelToken, Error};

#[test]
fn latest_release_url_targets_repo() {
    assert_eq!(
        latest_release_url("agentpack-sh/agentpack"),
        "https://api.github.com/repos/agentpack-sh/agentpack/releases/latest"
    );
}

#[test]
fn required_asset_names_cover_bundle() {
    let names = required_asset_names();
    assert_eq!(names, ["agents.zip", "agentpack-server", "agentpack-mcp"]);
}

#[test]
fn attestation_error_message_is_stable() {
    let err = Error::AttestationFailed {
        asset: "agents.zip".to_string(),
        detail: "exit status 1".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "attestation verification failed for agents.zip: exit status 1"
    );
}

#[test]
fn state_unreadable_message_is_stable() {
    let err = Error::StateUnreadable {
        path: PathBuf::from("/home/user/.agentpack/state/tracked.json"),
        detail: "expected value at line 1".to_string(),
    };
    assert!(err.to_string().starts_with("tracked state is unreadable: "));
}

#[test]
fn mcp_type_mismatch_names_the_offending_field() {
    let err = Error::McpFieldNotObject {
        field: "servers".to_string(),
        file: PathBuf::from("/tmp/mcp.json"),
    };
    assert!(err.to_string().contains("mcp key servers"));
}

#[test]
fn missing_assets_message_lists_every_name() {
    let err = Error::MissingAssets {
        tag: "v1.2.0".to_string(),
        missing: vec!["agents.zip".to_string(), "agentpack-mcp".to_string()],
    };
    assert_eq!(
        err.to_string(),
        "release v1.2.0 is missing expected asset(s): agents.zip, agentpack-mcp"
    );
}

#[test]
fn rollback_failed_is_flagged_for_manual_recovery() {
    let err = Error::RollbackFailed {
        cause: Box::new(Error::Cancelled),
        detail: "could not restore /tmp/a".to_string(),
    };
    assert!(err.needs_manual_recovery());
    assert!(!Error::Cancelled.needs_manual_recovery());
}

#[test]
fn cancel_token_trips_once_cancelled() {
    let token = CancelToken::new();
    assert!(token.check().is_ok());

    let observer = token.clone();
    token.cancel();
    assert!(observer.is_cancelled());
    assert!(matches!(observer.check(), Err(Error::Cancelled)));
}
