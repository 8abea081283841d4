use std::fs::File;
use std::io;
use std::path::Path;

use agentpack_core::Error;
use sha2::{Digest, Sha256};

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn sha256_hex_file(path: &Path) -> Result<String, Error> {
    let mut file = File::open(path)
        .map_err(|err| Error::io(format!("failed to open {}", path.display()), err))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|err| Error::io(format!("failed to hash {}", path.display()), err))?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::{sha256_hex, sha256_hex_file};

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn empty_input_digest() {
        assert_eq!(sha256_hex(b""), EMPTY_SHA256);
    }

    #[test]
    fn known_input_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn file_digest_matches_buffer_digest() {
        let dir = tempfile::tempdir().expect("must create temp dir");
        let path = dir.path().join("payload.bin");
        std::fs::write(&path, b"agentpack").expect("must write payload");

        let from_file = sha256_hex_file(&path).expect("must hash file");
        assert_eq!(from_file, sha256_hex(b"agentpack"));
    }
}
