// HTTP client side of the peer protocol

use crate::error::{Error, Result};
use crate::peers::PeerGetter;
use once_cell::sync::OnceCell;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// How long a peer fetch may take before it degrades to the local loader
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches cache entries from one remote peer over HTTP
///
/// Requests `GET {base_url}{group}/{key}` with both segments URL-escaped and
/// expects the raw value bytes back. Any transport failure or non-200 status
/// surfaces as [`Error::Peer`].
pub struct HttpGetter {
    base_url: String,
    client: OnceCell<reqwest::blocking::Client>,
}

impl HttpGetter {
    /// Client for the peer whose cache endpoint lives under `base_url`
    /// (address plus base path, e.g. `http://10.0.0.2:8001/peercache/`)
    pub fn new(base_url: String) -> Self {
        HttpGetter {
            base_url,
            client: OnceCell::new(),
        }
    }

    // Built on first use: constructing a blocking client spins up its own
    // I/O thread, which must not happen on an async worker.
    fn client(&self) -> Result<&reqwest::blocking::Client> {
        self.client.get_or_try_init(|| {
            reqwest::blocking::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .map_err(|err| Error::Peer(err.to_string()))
        })
    }

    fn entry_url(&self, group: &str, key: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| Error::Peer(format!("invalid peer url {}: {err}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Peer(format!("peer url {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend([group, key]);
        Ok(url)
    }
}

impl PeerGetter for HttpGetter {
    fn get(&self, group: &str, key: &str) -> Result<Vec<u8>> {
        let url = self.entry_url(group, key)?;
        debug!(%url, "fetching from peer");

        let response = self.client()?.get(url.clone()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Peer(format!("peer {url} returned {status}")));
        }
        let body = response.bytes()?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_url_escapes_segments() {
        let getter = HttpGetter::new("http://10.0.0.2:8001/peercache/".to_string());
        let url = getter.entry_url("scores", "weird key/slash").unwrap();
        assert_eq!(
            url.as_str(),
            "http://10.0.0.2:8001/peercache/scores/weird%20key%2Fslash"
        );
    }

    #[test]
    fn test_entry_url_rejects_garbage_base() {
        let getter = HttpGetter::new("not a url".to_string());
        assert!(matches!(
            getter.entry_url("scores", "Tom"),
            Err(Error::Peer(_))
        ));
    }
}
