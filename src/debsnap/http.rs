use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use std::time::Duration;

pub const DEFAULT_ARCHIVE_URL: &str = "https://snapshot.debian.org/archive/debian";

const USER_AGENT: &str = concat!("debsnap/", env!("CARGO_PKG_VERSION"));

/// Base URL of a snapshot archive; every path the tool requests hangs off it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEndpoint {
    base: String,
}

impl ArchiveEndpoint {
    pub fn new(base_url: &str) -> Self {
        Self {
            base: base_url.trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn join(&self, segments: &[&str]) -> String {
        let mut url = self.base.clone();
        for segment in segments {
            url.push('/');
            url.push_str(segment.trim_matches('/'));
        }
        url
    }

    pub fn as_str(&self) -> &str {
        &self.base
    }
}

/// Client for redirect probes: the 301 itself is the answer, so it must not be followed.
pub fn probe_client(timeout_secs: u64) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .redirect(Policy::none())
        .build()
}

pub fn download_client(timeout_secs: u64) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
}
