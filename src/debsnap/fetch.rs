use crate::debsnap::http::ArchiveEndpoint;
use crate::debsnap::instant::SnapshotInstant;
use crate::error::{SnapshotError, TransferError};
use log::debug;
use reqwest::blocking::Client;
use std::fmt;
use std::io::{self, Read};
use liblzma::read::XzDecoder;

/// The distribution/component/architecture triple a run archives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub distribution: String,
    pub component: String,
    pub architecture: String,
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/binary-{}",
            self.distribution, self.component, self.architecture
        )
    }
}

/// Wraps a raw index body in a decoding reader.
///
/// The returned reader takes ownership of `raw`, so dropping it releases the
/// underlying response as well.
pub trait Decompressor {
    /// Suffix of the index file this decoder expects, e.g. `.xz`.
    fn extension(&self) -> &'static str;
    fn wrap(&self, raw: Box<dyn Read>) -> Box<dyn Read>;
}

pub struct XzDecompressor;

impl Decompressor for XzDecompressor {
    fn extension(&self) -> &'static str {
        ".xz"
    }

    fn wrap(&self, raw: Box<dyn Read>) -> Box<dyn Read> {
        Box::new(XzDecoder::new(raw))
    }
}

/// For archives that publish an uncompressed `Packages` file.
pub struct PlainDecompressor;

impl Decompressor for PlainDecompressor {
    fn extension(&self) -> &'static str {
        ""
    }

    fn wrap(&self, raw: Box<dyn Read>) -> Box<dyn Read> {
        raw
    }
}

pub fn decompressor_for(name: &str) -> Option<Box<dyn Decompressor>> {
    match name {
        "xz" => Some(Box::new(XzDecompressor)),
        "none" => Some(Box::new(PlainDecompressor)),
        _ => None,
    }
}

pub trait IndexFetcher {
    fn fetch(
        &self,
        at: SnapshotInstant,
        selector: &Selector,
    ) -> Result<Box<dyn Read>, SnapshotError>;
}

/// Response body reader whose errors are tagged as [`TransferError`].
struct TransferReader<R> {
    inner: R,
    url: String,
}

impl<R: Read> Read for TransferReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).map_err(|source| {
            TransferError {
                url: self.url.clone(),
                source,
            }
            .into_io()
        })
    }
}

pub struct HttpIndexFetcher {
    client: Client,
    endpoint: ArchiveEndpoint,
    decompressor: Box<dyn Decompressor>,
}

impl HttpIndexFetcher {
    pub fn new(client: Client, endpoint: ArchiveEndpoint, decompressor: Box<dyn Decompressor>) -> Self {
        Self {
            client,
            endpoint,
            decompressor,
        }
    }

    pub fn index_url(&self, at: SnapshotInstant, selector: &Selector) -> String {
        let stamp = at.to_string();
        let binary_dir = format!("binary-{}", selector.architecture);
        let file = format!("Packages{}", self.decompressor.extension());
        self.endpoint.join(&[
            &stamp,
            "dists",
            &selector.distribution,
            &selector.component,
            &binary_dir,
            &file,
        ])
    }
}

impl IndexFetcher for HttpIndexFetcher {
    fn fetch(
        &self,
        at: SnapshotInstant,
        selector: &Selector,
    ) -> Result<Box<dyn Read>, SnapshotError> {
        let url = self.index_url(at, selector);
        debug!("fetching {url}");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|source| SnapshotError::TransientNetwork {
                op: "GET",
                url: url.clone(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(SnapshotError::MissingIndex {
                url,
                status: status.as_u16(),
            });
        }
        let body = TransferReader {
            inner: response,
            url,
        };
        Ok(self.decompressor.wrap(Box::new(body)))
    }
}
