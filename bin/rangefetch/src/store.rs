//! Selects the [`BlobStore`] implementation for an endpoint.

use bytes::Bytes;
use eyre::{bail, eyre, WrapErr};
use rangefetch_config::HttpConfig;
use rangefetch_downloader::{
    store::{HttpBlobStore, LocalBlobStore},
    BlobStore, BlobStoreError, ByteRange, ObjectMetadata, RemoteObject,
};
use reqwest::Client;
use url::Url;

/// The blob store behind an endpoint url.
///
/// `file://` urls are served from the local file-system, `http://` and `https://` urls by an
/// HTTP server answering `Range` requests.
#[derive(Debug, Clone)]
pub enum EndpointStore {
    /// A remote store reached over HTTP.
    Http(HttpBlobStore),
    /// A directory on the local file-system.
    Local(LocalBlobStore),
}

impl EndpointStore {
    /// Creates the store for `endpoint`.
    pub fn from_endpoint(endpoint: Url, http: &HttpConfig) -> eyre::Result<Self> {
        match endpoint.scheme() {
            "file" => {
                let root = endpoint
                    .to_file_path()
                    .map_err(|_| eyre!("endpoint {endpoint} is not a valid file path"))?;
                Ok(Self::Local(LocalBlobStore::new(root)))
            }
            "http" | "https" => {
                let client = Client::builder()
                    .connect_timeout(http.connect_timeout)
                    .timeout(http.request_timeout)
                    .user_agent(&http.user_agent)
                    .build()
                    .wrap_err("failed to build http client")?;
                Ok(Self::Http(HttpBlobStore::new(client, endpoint)))
            }
            scheme => bail!("unsupported endpoint scheme {scheme:?}, expected file, http or https"),
        }
    }
}

impl BlobStore for EndpointStore {
    async fn head_object(&self, object: &RemoteObject) -> Result<ObjectMetadata, BlobStoreError> {
        match self {
            Self::Http(store) => store.head_object(object).await,
            Self::Local(store) => store.head_object(object).await,
        }
    }

    async fn get_object_range(
        &self,
        object: &RemoteObject,
        range: ByteRange,
    ) -> Result<Bytes, BlobStoreError> {
        match self {
            Self::Http(store) => store.get_object_range(object, range).await,
            Self::Local(store) => store.get_object_range(object, range).await,
        }
    }
}
