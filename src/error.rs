use std::io;
use thiserror::Error;

/// A read from the archive connection failed after the response started.
///
/// Travels inside an `io::Error` through the decompression and parsing
/// readers so it can be told apart from a corrupt index afterwards.
#[derive(Debug, Error)]
#[error("transfer of {url} interrupted: {source}")]
pub struct TransferError {
    pub url: String,
    #[source]
    pub source: io::Error,
}

impl TransferError {
    pub fn into_io(self) -> io::Error {
        io::Error::new(self.source.kind(), self)
    }

    /// Take a tagged transfer failure back out of `err`; any other error is
    /// returned as is.
    pub fn recover(err: io::Error) -> Result<Self, io::Error> {
        if !err.get_ref().is_some_and(|inner| inner.is::<Self>()) {
            return Err(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<Self>()) {
            Some(Ok(transfer)) => Ok(*transfer),
            Some(Err(inner)) => Err(io::Error::new(kind, inner)),
            None => Err(io::Error::from(kind)),
        }
    }
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("{op} {url} failed: {source}")]
    TransientNetwork {
        op: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error(transparent)]
    InterruptedTransfer(#[from] TransferError),
    #[error("archive protocol violation at {url}: {reason}")]
    ProtocolViolation { url: String, reason: String },
    #[error("package index missing at {url}: status {status}")]
    MissingIndex { url: String, status: u16 },
    #[error("failed to parse package index for snapshot {instant}: {reason}")]
    IndexParse { instant: String, reason: String },
    #[error("failed to materialize {target}: {reason}")]
    Materialization { target: String, reason: String },
}

impl SnapshotError {
    pub fn materialization(target: impl Into<String>, reason: impl ToString) -> Self {
        Self::Materialization {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TransientNetwork { .. } | Self::InterruptedTransfer(_) => {
                ErrorKind::TransientNetwork
            }
            Self::ProtocolViolation { .. } => ErrorKind::ProtocolViolation,
            Self::MissingIndex { .. } => ErrorKind::MissingIndex,
            Self::IndexParse { .. } => ErrorKind::IndexParse,
            Self::Materialization { .. } => ErrorKind::Materialization,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TransientNetwork,
    ProtocolViolation,
    MissingIndex,
    IndexParse,
    Materialization,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TransientNetwork => "transient-network",
            Self::ProtocolViolation => "archive-protocol-violation",
            Self::MissingIndex => "archive-missing-index",
            Self::IndexParse => "index-parse-failure",
            Self::Materialization => "materialization-failure",
        }
    }
}
