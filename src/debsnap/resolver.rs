use crate::debsnap::http::ArchiveEndpoint;
use crate::debsnap::instant::SnapshotInstant;
use crate::error::SnapshotError;
use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::header::LOCATION;
use reqwest::{StatusCode, Url};

/// Maps an arbitrary instant onto one the archive actually published.
pub trait TimeResolver {
    fn resolve(&self, at: SnapshotInstant) -> Result<SnapshotInstant, SnapshotError>;
}

/// Resolves by probing `HEAD <base>/<instant>/` and reading the redirect.
///
/// snapshot.debian.org has no listing API. Asking for an arbitrary
/// timestamp answers with a permanent redirect to the snapshot that covers
/// it, and the last path segment of that target is the real instant.
pub struct HttpTimeResolver {
    client: Client,
    endpoint: ArchiveEndpoint,
}

impl HttpTimeResolver {
    /// `client` must not follow redirects; see [`crate::debsnap::http::probe_client`].
    pub fn new(client: Client, endpoint: ArchiveEndpoint) -> Self {
        Self { client, endpoint }
    }
}

impl TimeResolver for HttpTimeResolver {
    fn resolve(&self, at: SnapshotInstant) -> Result<SnapshotInstant, SnapshotError> {
        let url = format!("{}/", self.endpoint.join(&[&at.to_string()]));
        debug!("probing {url}");
        let response = self
            .client
            .head(&url)
            .send()
            .map_err(|source| SnapshotError::TransientNetwork {
                op: "HEAD",
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::OK {
            warn!("archive answered {status} for {at} directly; using it as a snapshot instant");
            return Ok(at);
        }
        if status != StatusCode::MOVED_PERMANENTLY && status != StatusCode::PERMANENT_REDIRECT {
            return Err(violation(&url, format!("unexpected status {status}")));
        }

        let location = response
            .headers()
            .get(LOCATION)
            .ok_or_else(|| violation(&url, format!("{status} without a Location header")))?
            .to_str()
            .map_err(|_| violation(&url, "Location header is not visible ASCII"))?;
        let resolved = instant_from_location(&url, location)?;
        debug!("{at} resolved to {resolved}");
        Ok(resolved)
    }
}

fn violation(url: &str, reason: impl Into<String>) -> SnapshotError {
    SnapshotError::ProtocolViolation {
        url: url.to_string(),
        reason: reason.into(),
    }
}

/// Expects targets shaped like `https://snapshot.debian.org/archive/debian/20210801T023234Z/`.
fn instant_from_location(request_url: &str, location: &str) -> Result<SnapshotInstant, SnapshotError> {
    let base = Url::parse(request_url)
        .map_err(|err| violation(request_url, format!("request url is invalid: {err}")))?;
    let target = base
        .join(location)
        .map_err(|err| violation(request_url, format!("bad Location {location:?}: {err}")))?;
    let segment = target
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .ok_or_else(|| violation(request_url, format!("Location {location:?} has no path")))?;
    SnapshotInstant::parse(segment).ok_or_else(|| {
        violation(
            request_url,
            format!("Location {location:?} does not end in a snapshot timestamp"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debsnap::http::probe_client;
    use crate::debsnap::testing::{floor_snapshot, instant, redirect, serve, status};
    use crate::error::ErrorKind;
    use tiny_http::Method;

    fn resolver(base_url: &str) -> HttpTimeResolver {
        HttpTimeResolver::new(probe_client(5).expect("client"), ArchiveEndpoint::new(base_url))
    }

    fn floor_archive(published: Vec<SnapshotInstant>) -> String {
        serve(move |method, url| {
            if *method != Method::Head {
                return status(405);
            }
            let stamp = url.trim_matches('/').rsplit('/').next().unwrap_or_default();
            let Some(at) = SnapshotInstant::parse(stamp) else {
                return status(400);
            };
            match floor_snapshot(&published, at) {
                Some(hit) => redirect(301, &format!("/archive/debian/{hit}/")),
                None => status(404),
            }
        })
    }

    #[test]
    fn redirect_target_is_the_resolved_instant() {
        let base = floor_archive(vec![instant("20210801T023234Z"), instant("20210801T083012Z")]);
        let got = resolver(&base).resolve(instant("20210801T060000Z")).expect("resolve");
        assert_eq!(got, instant("20210801T023234Z"));
    }

    #[test]
    fn resolving_a_resolved_instant_is_stable() {
        let base = floor_archive(vec![instant("20210801T023234Z"), instant("20210801T083012Z")]);
        let resolver = resolver(&base);
        for probe in ["20210801T030000Z", "20210801T090000Z", "20210801T083012Z"] {
            let once = resolver.resolve(instant(probe)).expect("first");
            let twice = resolver.resolve(once).expect("second");
            assert_eq!(once, twice, "probe {probe}");
        }
    }

    #[test]
    fn direct_hit_returns_the_requested_instant() {
        let base = serve(|_, _| status(200));
        let at = instant("20210801T023234Z");
        assert_eq!(resolver(&base).resolve(at).expect("resolve"), at);
    }

    #[test]
    fn absolute_location_and_permanent_redirect_308_are_accepted() {
        let base = serve(|_, _| {
            redirect(308, "https://snapshot.debian.org/archive/debian/20200101T000000Z/")
        });
        let got = resolver(&base).resolve(instant("20200101T050000Z")).expect("resolve");
        assert_eq!(got, instant("20200101T000000Z"));
    }

    #[test]
    fn unexpected_status_is_a_protocol_violation() {
        let base = serve(|_, _| status(302));
        let err = resolver(&base)
            .resolve(instant("20210801T000000Z"))
            .expect_err("302 is not permanent");
        assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
    }

    #[test]
    fn missing_location_is_a_protocol_violation() {
        let base = serve(|_, _| status(301));
        let err = resolver(&base)
            .resolve(instant("20210801T000000Z"))
            .expect_err("no location");
        assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
    }

    #[test]
    fn unparseable_segment_is_a_protocol_violation() {
        let base = serve(|_, _| redirect(301, "/archive/debian/latest/"));
        let err = resolver(&base)
            .resolve(instant("20210801T000000Z"))
            .expect_err("bad segment");
        assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
    }

    #[test]
    fn connection_failure_is_transient_network() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let err = resolver(&format!("http://127.0.0.1:{port}/archive/debian"))
            .resolve(instant("20210801T000000Z"))
            .expect_err("refused");
        assert_eq!(err.kind(), ErrorKind::TransientNetwork);
    }
}
