use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

use agentpack_core::Error;

/// Provenance check for a downloaded asset. Any failure, including a missing
/// verification tool, must abort the operation before filesystem mutation.
pub trait AttestationVerifier {
    fn verify(&self, asset_name: &str, asset_path: &Path) -> Result<(), Error>;
}

/// Shells out to `gh attestation verify` against the release repository.
pub struct GhCliVerifier {
    repo: String,
}

impl GhCliVerifier {
    pub fn new(repo: impl Into<String>) -> Self {
        Self { repo: repo.into() }
    }

    fn command_args(&self, asset_path: &Path) -> Vec<OsString> {
        vec![
            OsString::from("attestation"),
            OsString::from("verify"),
            asset_path.as_os_str().to_os_string(),
            OsString::from("--repo"),
            OsString::from(&self.repo),
        ]
    }
}

impl AttestationVerifier for GhCliVerifier {
    fn verify(&self, asset_name: &str, asset_path: &Path) -> Result<(), Error> {
        let output = Command::new("gh")
            .args(self.command_args(asset_path))
            .output()
            .map_err(|err| Error::AttestationFailed {
                asset: asset_name.to_string(),
                detail: format!("failed to run gh: {err}"),
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(Error::AttestationFailed {
            asset: asset_name.to_string(),
            detail: format!("{} {}", output.status, stderr.trim()),
        })
    }
}
