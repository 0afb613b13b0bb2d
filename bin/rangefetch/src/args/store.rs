//! clap [Args](clap::Args) for the object to fetch.

use clap::Args;
use rangefetch_downloader::RemoteObject;
use url::Url;

/// Where the object lives.
#[derive(Debug, Clone, Args, PartialEq, Eq)]
#[command(next_help_heading = "Store")]
pub struct StoreArgs {
    /// Base url of the blob store.
    ///
    /// `file://` urls point at a local directory whose sub-directories are containers.
    /// `http://` and `https://` urls point at a server answering `Range` requests at
    /// `<endpoint>/<container>/<key>`.
    #[arg(long, value_name = "URL", env = "RANGEFETCH_ENDPOINT")]
    pub endpoint: Url,

    /// Container (bucket) holding the object.
    #[arg(long, value_name = "NAME")]
    pub container: String,

    /// Key of the object inside its container.
    #[arg(long, value_name = "KEY")]
    pub key: String,
}

impl StoreArgs {
    /// The object these arguments name.
    pub fn object(&self) -> RemoteObject {
        RemoteObject::new(&self.container, &self.key)
    }
}
