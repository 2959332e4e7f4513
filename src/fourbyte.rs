//! Function-signature directory lookups.
//!
//! Calldata selectors are resolved to textual signatures through a public
//! directory (4byte.directory compatible API). Collisions are expected, so a
//! lookup returns every known candidate together with its registration id;
//! the decoder tries candidates oldest-first.

use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::instrument;
use url::Url;

/// One directory entry for a 4-byte selector.
#[derive(Debug, Clone, Deserialize)]
pub struct SignatureRecord {
    /// Directory-internal registration id; lower means registered earlier.
    pub id: u64,
    pub text_signature: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("signature directory request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A service resolving 4-byte selectors into candidate function signatures.
pub trait SignatureDirectory {
    fn lookup(
        &self,
        selector: [u8; 4],
    ) -> impl Future<Output = Result<Vec<SignatureRecord>, DirectoryError>> + Send;
}

/// HTTP client for a 4byte.directory-compatible signature database.
#[derive(Debug, Clone)]
pub struct FourByteDirectory {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SignatureSearchPage {
    #[serde(default)]
    results: Vec<SignatureRecord>,
}

impl FourByteDirectory {
    pub fn new(base_url: Url) -> Self {
        FourByteDirectory {
            client: reqwest::Client::new(),
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        }
    }
}

impl SignatureDirectory for FourByteDirectory {
    #[instrument(skip_all, err, fields(selector = %hex::encode(selector)))]
    async fn lookup(&self, selector: [u8; 4]) -> Result<Vec<SignatureRecord>, DirectoryError> {
        let url = format!(
            "{}/api/v1/signatures/?hex_signature=0x{}",
            self.base_url,
            hex::encode(selector)
        );
        let page: SignatureSearchPage = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(page.results)
    }
}
