//! In-process fakes shared by unit tests.

use crate::debsnap::instant::SnapshotInstant;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use tiny_http::{Header, Method, Response, ResponseBox, Server};

/// Serve `handler` on an ephemeral localhost port; returns the archive base URL.
pub fn serve<F>(handler: F) -> String
where
    F: Fn(&Method, &str) -> ResponseBox + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").expect("bind fake archive");
    let port = server
        .server_addr()
        .to_ip()
        .expect("fake archive listens on ip")
        .port();
    thread::spawn(move || {
        for request in server.incoming_requests() {
            let response = handler(request.method(), request.url());
            let _ = request.respond(response);
        }
    });
    format!("http://127.0.0.1:{port}/archive/debian")
}

/// Answer one connection with `response` written verbatim, then hand the
/// stream to `after`. For replies tiny_http will not produce, such as a body
/// shorter than its `Content-Length`.
pub fn serve_raw<F>(response: Vec<u8>, after: F) -> String
where
    F: FnOnce(TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind raw archive");
    let port = listener.local_addr().expect("raw archive addr").port();
    thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let mut head = Vec::new();
        let mut byte = [0u8; 1];
        while !head.ends_with(b"\r\n\r\n") {
            match stream.read(&mut byte) {
                Ok(1) => head.push(byte[0]),
                _ => return,
            }
        }
        let _ = stream.write_all(&response);
        let _ = stream.flush();
        after(stream);
    });
    format!("http://127.0.0.1:{port}/archive/debian")
}

/// Block until the peer closes `stream`.
pub fn wait_for_close(mut stream: TcpStream) {
    let mut sink = [0u8; 4096];
    loop {
        match stream.read(&mut sink) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
    }
}

pub fn redirect(status: u16, location: &str) -> ResponseBox {
    let header = Header::from_bytes(&b"Location"[..], location.as_bytes()).expect("header");
    Response::empty(status).with_header(header).boxed()
}

pub fn status(code: u16) -> ResponseBox {
    Response::empty(code).boxed()
}

pub fn body(bytes: Vec<u8>) -> ResponseBox {
    Response::from_data(bytes).boxed()
}

/// Latest instant in `published` that is not after `at`, which is how the
/// snapshot archive answers a probe.
pub fn floor_snapshot(published: &[SnapshotInstant], at: SnapshotInstant) -> Option<SnapshotInstant> {
    published.iter().copied().filter(|s| *s <= at).max()
}

pub fn instant(raw: &str) -> SnapshotInstant {
    SnapshotInstant::parse(raw).expect("canonical instant")
}
