mod attest;
mod checksum;

pub use attest::{AttestationVerifier, GhCliVerifier};
pub use checksum::{sha256_hex, sha256_hex_file};
