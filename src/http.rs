//! The Description Server (§4.8): a minimal dual-stack HTTP/1.x listener
//! answering GET requests for the device description document.

use std::io::{self, Read, Write};
use std::net::{IpAddr, SocketAddr};

use log::debug;
use mio::net::TcpStream;

use crate::device_description;
use crate::identity::DiscoveryIdentity;

const MAX_REQUEST_BYTES: usize = 1024;

/// Handle one accepted connection to completion: read the request, dispatch
/// a status line, and close. Blocking-style `Read`/`Write` on a
/// non-blocking `mio::net::TcpStream` is acceptable here because the event
/// loop only calls this after `accept` reported readiness and the
/// description document is tiny (a single `read`/`write` pair rarely
/// spans more than one syscall in practice), and any `WouldBlock` simply
/// aborts this one request rather than the whole loop (§4.8).
pub fn handle_connection(mut stream: TcpStream, peer: SocketAddr, identity: &DiscoveryIdentity) -> io::Result<()> {
    let local = stream.local_addr()?;

    let mut buf = [0u8; MAX_REQUEST_BYTES];
    let read = match stream.read(&mut buf) {
        Ok(n) => n,
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
        Err(e) => return Err(e),
    };
    let request = String::from_utf8_lossy(&buf[..read]);
    debug!("Description request from {peer}: {}", request.lines().next().unwrap_or(""));

    match parse_request_line(&request) {
        RequestOutcome::BadRequest => write_status(&mut stream, "400 Bad Request"),
        RequestOutcome::NotFound => write_status(&mut stream, "404 Not Found"),
        RequestOutcome::Ok => {
            let host = presentation_host(local.ip());
            let body = device_description::render(identity, &host);
            let response = format!(
                "HTTP/1.1 200 OK\r\n\
                 Content-Type: text/xml\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\
                 \r\n\
                 {body}",
                body.len()
            );
            stream.write_all(response.as_bytes())
        }
    }
}

enum RequestOutcome {
    Ok,
    BadRequest,
    NotFound,
}

fn parse_request_line(request: &str) -> RequestOutcome {
    let Some(line) = request.lines().next() else {
        return RequestOutcome::BadRequest;
    };
    let mut parts = line.split_whitespace();
    let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next()) else {
        return RequestOutcome::BadRequest;
    };
    if method != "GET" || (version != "HTTP/1.0" && version != "HTTP/1.1") {
        return RequestOutcome::BadRequest;
    }
    if !target.contains(crate::net::DESCRIPTION_PATH) {
        return RequestOutcome::NotFound;
    }
    RequestOutcome::Ok
}

fn write_status(stream: &mut TcpStream, status: &str) -> io::Result<()> {
    let response = format!("HTTP/1.1 {status}\r\nConnection: close\r\n\r\n");
    stream.write_all(response.as_bytes())
}

/// Render the client-visible host for `{presentation_url}`: an IPv4-mapped
/// IPv6 address is unwrapped to its plain IPv4 literal; any other IPv6
/// address is bracketed (§4.8).
fn presentation_host(local: IpAddr) -> String {
    match local {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => format!("[{v6}]"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_get_description_request() {
        let line = "GET /description.xml HTTP/1.1";
        assert!(matches!(parse_request_line(line), RequestOutcome::Ok));
    }

    #[test]
    fn rejects_non_get_method() {
        let line = "POST /description.xml HTTP/1.1";
        assert!(matches!(parse_request_line(line), RequestOutcome::BadRequest));
    }

    #[test]
    fn rejects_unknown_protocol() {
        let line = "GET /description.xml HTTP/2";
        assert!(matches!(parse_request_line(line), RequestOutcome::BadRequest));
    }

    #[test]
    fn not_found_for_other_paths() {
        let line = "GET /favicon.ico HTTP/1.1";
        assert!(matches!(parse_request_line(line), RequestOutcome::NotFound));
    }

    #[test]
    fn presentation_host_unwraps_v4_mapped() {
        let mapped: IpAddr = "::ffff:192.168.1.10".parse().unwrap();
        assert_eq!(presentation_host(mapped), "192.168.1.10");
    }

    #[test]
    fn presentation_host_brackets_plain_v6() {
        let addr: IpAddr = "fe80::1".parse().unwrap();
        assert_eq!(presentation_host(addr), "[fe80::1]");
    }
}
