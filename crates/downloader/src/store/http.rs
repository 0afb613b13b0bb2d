use super::{BlobStore, BlobStoreError, ObjectMetadata, RemoteObject};
use crate::planner::ByteRange;
use bytes::Bytes;
use reqwest::{
    header::{CONTENT_LENGTH, RANGE},
    Client, Response, StatusCode,
};
use tracing::trace;
use url::Url;

/// A [`BlobStore`] reached over HTTP, such as a public S3 bucket or any server honouring range
/// requests.
///
/// Objects are addressed path-style: `endpoint/container/key`.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    client: Client,
    endpoint: Url,
}

impl HttpBlobStore {
    /// Constructs [`HttpBlobStore`] using `client` to issue requests against `endpoint`.
    pub const fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    /// Returns the url of `object`, each path segment percent-encoded.
    pub fn object_url(&self, object: &RemoteObject) -> Result<Url, BlobStoreError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| BlobStoreError::Other(format!("{} cannot be a base url", self.endpoint)))?
            .pop_if_empty()
            .push(&object.container)
            .extend(object.key.split('/'));
        Ok(url)
    }
}

impl BlobStore for HttpBlobStore {
    async fn head_object(&self, object: &RemoteObject) -> Result<ObjectMetadata, BlobStoreError> {
        let url = self.object_url(object)?;
        trace!(target: "rangefetch::store::http", %url, "HEAD");

        let response = check_status(self.client.head(url).send().await?)?;

        // `Response::content_length` reflects the (empty) body of a HEAD response, read the
        // header instead
        let size = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .ok_or_else(|| {
                BlobStoreError::Other(format!("{object} has no valid Content-Length header"))
            })?;

        Ok(ObjectMetadata { size })
    }

    async fn get_object_range(
        &self,
        object: &RemoteObject,
        range: ByteRange,
    ) -> Result<Bytes, BlobStoreError> {
        let url = self.object_url(object)?;
        trace!(target: "rangefetch::store::http", %url, %range, "GET");

        let response = self.client.get(url).header(RANGE, range.to_header_value()).send().await?;
        let response = check_status(response)?;
        let status = response.status();
        let body = response.bytes().await?;

        match status {
            StatusCode::PARTIAL_CONTENT => Ok(body),
            // some servers ignore the range header, which is only fine if the range spans the
            // whole object
            StatusCode::OK if body.len() as u64 == range.len() => Ok(body),
            status => Err(BlobStoreError::Other(format!(
                "expected 206 Partial Content for range {range}, got {status}"
            ))),
        }
    }
}

/// Maps an unsuccessful response to a [`BlobStoreError`].
fn check_status(response: Response) -> Result<Response, BlobStoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response)
    }
    Err(classify_status(status))
}

fn classify_status(status: StatusCode) -> BlobStoreError {
    match status {
        StatusCode::NOT_FOUND => BlobStoreError::NotFound,
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            BlobStoreError::Transport(status.to_string())
        }
        status if status.is_server_error() => BlobStoreError::Transport(status.to_string()),
        status => BlobStoreError::Other(format!("unexpected status {status}")),
    }
}

impl From<reqwest::Error> for BlobStoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
            Self::Transport(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}
