//! Access to datahub change streams
//!
//! The fetcher hands back the response body as a reader so the entity
//! parser can consume it straight off the connection.

use std::io::Read;

use reqwest::StatusCode;
use tracing::debug;
use url::Url;

use crate::error::FetchError;

/// Number of changes requested per page
pub const PAGE_LIMIT: u32 = 1000;

/// Byte stream of one page of changes
pub type ChangeStream = Box<dyn Read + Send>;

/// Source of change streams for remote datasets
pub trait ChangeSource: Send + Sync {
    /// Open the change stream of `remote_name`, resuming after `since`
    ///
    /// An empty `since` is treated as absent.
    fn changes(&self, remote_name: &str, since: Option<&str>) -> Result<ChangeStream, FetchError>;
}

/// Build `<base>/datasets/<remote>/changes?since=..&limit=1000&latestOnly=true`
pub fn changes_url(base: &Url, remote_name: &str, since: Option<&str>) -> Result<Url, FetchError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| FetchError::InvalidBase(base.to_string()))?
        .pop_if_empty()
        .extend(["datasets", remote_name, "changes"]);

    {
        let mut query = url.query_pairs_mut();
        query.clear();
        if let Some(since) = since.filter(|s| !s.is_empty()) {
            query.append_pair("since", since);
        }
        query
            .append_pair("limit", &PAGE_LIMIT.to_string())
            .append_pair("latestOnly", "true");
    }
    Ok(url)
}

/// Fetches change streams over HTTP with a blocking client
///
/// The client must be created and dropped outside of an async runtime.
pub struct HttpChangeSource {
    base: Url,
    client: reqwest::blocking::Client,
}

impl HttpChangeSource {
    pub fn new(base: Url) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder().build()?;
        Ok(Self { base, client })
    }
}

impl ChangeSource for HttpChangeSource {
    fn changes(&self, remote_name: &str, since: Option<&str>) -> Result<ChangeStream, FetchError> {
        let url = changes_url(&self.base, remote_name, since)?;
        debug!(%url, "fetching changes");

        let response = self.client.get(url).send()?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(Box::new(response))
    }
}
