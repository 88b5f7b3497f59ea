#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, Utc};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::thread;
use tiny_http::{Header, Method, Response, ResponseBox, Server};
use liblzma::write::XzEncoder;

pub const FORMAT: &str = "%Y%m%dT%H%M%SZ";

pub fn stamp(at: DateTime<Utc>) -> String {
    at.format(FORMAT).to_string()
}

pub fn parse_stamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

pub fn days(n: i64) -> Duration {
    Duration::days(n)
}

pub fn hours(n: i64) -> Duration {
    Duration::hours(n)
}

fn xz(text: &str) -> Vec<u8> {
    let mut encoder = XzEncoder::new(Vec::new(), 6);
    encoder.write_all(text.as_bytes()).expect("compress");
    encoder.finish().expect("finish xz")
}

fn empty(status: u16) -> ResponseBox {
    Response::empty(status).boxed()
}

/// A snapshot.debian.org stand-in: probes redirect to the latest published
/// snapshot at or before the requested instant; index GETs serve xz bodies.
/// A snapshot published with `None` has no index and answers 404.
pub fn spawn_archive(published: Vec<(DateTime<Utc>, Option<String>)>) -> String {
    let snapshots: BTreeMap<DateTime<Utc>, Option<Vec<u8>>> = published
        .into_iter()
        .map(|(at, text)| (at, text.as_deref().map(xz)))
        .collect();

    let server = Server::http("127.0.0.1:0").expect("bind fake archive");
    let port = server.server_addr().to_ip().expect("ip listener").port();
    thread::spawn(move || {
        for request in server.incoming_requests() {
            let response = answer(&snapshots, request.method(), request.url());
            let _ = request.respond(response);
        }
    });
    format!("http://127.0.0.1:{port}/archive/debian")
}

fn answer(
    snapshots: &BTreeMap<DateTime<Utc>, Option<Vec<u8>>>,
    method: &Method,
    url: &str,
) -> ResponseBox {
    let Some(rest) = url.strip_prefix("/archive/debian/") else {
        return empty(404);
    };
    let mut parts = rest.splitn(2, '/');
    let Some(at) = parts.next().and_then(parse_stamp) else {
        return empty(404);
    };
    let tail = parts.next().unwrap_or_default();

    match (method, tail) {
        (Method::Head, "") => match snapshots.range(..=at).next_back() {
            Some((hit, _)) => {
                let location = format!("/archive/debian/{}/", stamp(*hit));
                let header = Header::from_bytes(&b"Location"[..], location.as_bytes())
                    .expect("location header");
                Response::empty(301).with_header(header).boxed()
            }
            None => empty(404),
        },
        (Method::Get, "dists/sid/main/binary-amd64/Packages.xz") => match snapshots.get(&at) {
            Some(Some(body)) => Response::from_data(body.clone()).boxed(),
            _ => empty(404),
        },
        _ => empty(404),
    }
}

pub fn debsnap(home: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("debsnap");
    cmd.current_dir(home)
        .env("HOME", home)
        .env("DEBSNAP_CONFIG_PATH", home.join("absent.toml"))
        .env_remove("DEBSNAP_HOME")
        .env("DEBSNAP_LOG", "debug");
    cmd
}
