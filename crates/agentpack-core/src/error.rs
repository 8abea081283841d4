use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Closed set of failure kinds for the whole install/update/uninstall
/// surface. Callers match on variant; the messages are part of the
/// compatibility contract and must stay stable.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to fetch release metadata for {repo}: {detail}")]
    ReleaseMetadata { repo: String, detail: String },

    #[error("release {tag} is missing expected asset(s): {}", missing.join(", "))]
    MissingAssets { tag: String, missing: Vec<String> },

    #[error("http request failed for {url}: {detail}")]
    Http { url: String, detail: String },

    #[error("attestation verification failed for {asset}: {detail}")]
    AttestationFailed { asset: String, detail: String },

    #[error("tracked state is unreadable: {}: {detail}", path.display())]
    StateUnreadable { path: PathBuf, detail: String },

    #[error("failed to persist tracked state: {}: {detail}", path.display())]
    StateWrite { path: PathBuf, detail: String },

    #[error("agents archive is invalid: {detail}")]
    Archive { detail: String },

    #[error("config file is missing: {}", file.display())]
    ConfigMissing { file: PathBuf },

    #[error("failed to parse config file {}: {detail}", file.display())]
    ConfigUnreadable { file: PathBuf, detail: String },

    #[error("config file {} does not contain a JSON object", file.display())]
    ConfigNotObject { file: PathBuf },

    #[error("settings key {field} is not an array in {}", file.display())]
    SettingsFieldNotArray { field: String, file: PathBuf },

    #[error("settings key {field} is missing from {}", file.display())]
    SettingsFieldMissing { field: String, file: PathBuf },

    #[error("settings key {field} has no entry equal to '{value}' in {}", file.display())]
    SettingsEntryMissing {
        field: String,
        value: String,
        file: PathBuf,
    },

    #[error("mcp key {field} is not an object in {}", file.display())]
    McpFieldNotObject { field: String, file: PathBuf },

    #[error("cannot snapshot {what} for rollback: {}: {detail}", path.display())]
    SnapshotFailed {
        what: &'static str,
        path: PathBuf,
        detail: String,
    },

    /// Rollback itself failed after an earlier error; the filesystem may be
    /// inconsistent and needs manual recovery. Strictly more severe than the
    /// cause it wraps.
    #[error("rollback failed ({detail}) after: {cause}; manual recovery may be required")]
    RollbackFailed { cause: Box<Error>, detail: String },

    #[error("uninstall reverts failed: {detail}")]
    RevertFailed { detail: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("{what}: {source}")]
    Io {
        what: String,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn io(what: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            what: what.into(),
            source,
        }
    }

    /// True for kinds that indicate the filesystem may already be damaged,
    /// as opposed to a cleanly-aborted operation.
    pub fn needs_manual_recovery(&self) -> bool {
        matches!(self, Self::RollbackFailed { .. })
    }
}
