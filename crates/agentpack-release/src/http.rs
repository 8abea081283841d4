use agentpack_core::Error;

/// Blocking byte-level fetch. The orchestrator owns one implementation for
/// both release metadata and asset downloads; tests substitute a canned one.
pub trait HttpFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>, Error>;
}

pub struct ReqwestFetcher {
    client: reqwest::blocking::Client,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("agentpack")
            .build()
            .map_err(|err| Error::Http {
                url: String::new(),
                detail: format!("failed to build http client: {err}"),
            })?;
        Ok(Self { client })
    }
}

impl HttpFetcher for ReqwestFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>, Error> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| Error::Http {
                url: url.to_string(),
                detail: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                url: url.to_string(),
                detail: format!("unexpected status {status}"),
            });
        }

        let bytes = response.bytes().map_err(|err| Error::Http {
            url: url.to_string(),
            detail: err.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}
