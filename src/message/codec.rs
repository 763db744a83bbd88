//! Formatting and parsing of the three HTTP-over-UDP message shapes (§4.5):
//! NOTIFY, M-SEARCH (incoming only, this responder never issues active
//! searches), and the unicast M-SEARCH response.
//!
//! Outbound messages are a tagged enum rather than a nullable `type` string
//! threaded through one `snprintf`-style formatter, so "the bare UUID" and
//! "no type at all" can never be confused (§9, REDESIGN FLAGS R2).

use time::format_description::FormatItem;
use time::OffsetDateTime;

use super::CACHE_TIMEOUT;
use crate::identity::{DiscoveryIdentity, ST_ALL};
use crate::net::{SSDP_PORT, DESCRIPTION_PATH, DESCRIPTION_PORT};

/// RFC 1123 GMT form (e.g. `Tue, 28 Jul 2026 00:00:00 GMT`), the fixed-zone
/// rendering §4.5 calls for; `Rfc2822` renders the zone as `+0000` instead
/// of the literal `GMT` the original's `%Z` produces.
const RFC1123_GMT: &[FormatItem<'_>] =
    time::macros::format_description!("[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT");

/// An outbound SSDP message, addressed either to the multicast group
/// (NOTIFY) or to a single peer (search response).
pub enum OutboundMessage {
    /// NOTIFY for the catch-all type: `NT` carries the UUID, and so does
    /// `USN` (§4.5).
    NotifyAll,
    /// NOTIFY for one concrete type (never `ssdp:all`, never the bare
    /// UUID, see [`crate::announce`]).
    Notify(String),
    /// Unicast response to an M-SEARCH matching search target `st`.
    Response(String),
}

/// Render the `Host:` group literal for a NOTIFY, `[...]`-wrapping and
/// stripping `%scope` for IPv6 per §4.5's host-field rendering rule.
fn render_host(host: &str) -> String {
    match host.split_once('%') {
        Some((addr, _scope)) => format!("[{addr}]"),
        None if host.contains(':') => format!("[{host}]"),
        None => host.to_string(),
    }
}

fn usn_for(uuid: &str, type_value: &str) -> String {
    if type_value == uuid || type_value == ST_ALL {
        uuid.to_string()
    } else {
        format!("{uuid}::{type_value}")
    }
}

/// Format `msg` into the CRLF-terminated wire body (§4.5).
///
/// `host` is the interface-local address the `Location:` URL should point
/// clients back to (unrendered, `[...]`-wrapping for IPv6 happens here).
pub fn format_message(msg: &OutboundMessage, identity: &DiscoveryIdentity, host: &str, now: OffsetDateTime) -> String {
    let location_host = render_host(host);
    let cache_secs = CACHE_TIMEOUT.as_secs();

    match msg {
        OutboundMessage::NotifyAll => {
            let nt = identity.uuid.as_str();
            let usn = identity.uuid.as_str();
            format!(
                "NOTIFY * HTTP/1.1\r\n\
                 Host: {group}:{port}\r\n\
                 Server: {server}\r\n\
                 Location: http://{location_host}:{desc_port}{desc_path}\r\n\
                 NT: {nt}\r\n\
                 NTS: ssdp:alive\r\n\
                 USN: {usn}\r\n\
                 Cache-Control: max-age={cache_secs}\r\n\
                 \r\n",
                group = crate::net::ssdp_group_addr(family_hint(host)),
                port = SSDP_PORT,
                server = identity.server_string,
                desc_port = DESCRIPTION_PORT,
                desc_path = DESCRIPTION_PATH,
            )
        }
        OutboundMessage::Notify(nt) => {
            let usn = usn_for(&identity.uuid, nt);
            format!(
                "NOTIFY * HTTP/1.1\r\n\
                 Host: {group}:{port}\r\n\
                 Server: {server}\r\n\
                 Location: http://{location_host}:{desc_port}{desc_path}\r\n\
                 NT: {nt}\r\n\
                 NTS: ssdp:alive\r\n\
                 USN: {usn}\r\n\
                 Cache-Control: max-age={cache_secs}\r\n\
                 \r\n",
                group = crate::net::ssdp_group_addr(family_hint(host)),
                port = SSDP_PORT,
                server = identity.server_string,
                desc_port = DESCRIPTION_PORT,
                desc_path = DESCRIPTION_PATH,
            )
        }
        OutboundMessage::Response(st) => {
            let usn = usn_for(&identity.uuid, st);
            let date = now.format(&RFC1123_GMT).unwrap_or_default();
            format!(
                "HTTP/1.1 200 OK\r\n\
                 Server: {server}\r\n\
                 Date: {date}\r\n\
                 Location: http://{location_host}:{desc_port}{desc_path}\r\n\
                 ST: {st}\r\n\
                 EXT: \r\n\
                 USN: {usn}\r\n\
                 Cache-Control: max-age={cache_secs}\r\n\
                 \r\n",
                server = identity.server_string,
                desc_port = DESCRIPTION_PORT,
                desc_path = DESCRIPTION_PATH,
            )
        }
    }
}

/// `crate::net::ssdp_group_addr` only needs *a* same-family address to pick
/// the right literal; a rendered host string carries no [`std::net::IpAddr`]
/// anymore, so recover the family from whether it looks like an IPv6
/// literal. Used only for selecting the NOTIFY `Host:` group address.
fn family_hint(host: &str) -> std::net::IpAddr {
    if host.contains(':') {
        std::net::IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
    } else {
        std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
    }
}

/// Outcome of scanning an inbound datagram for an M-SEARCH request (§4.5).
#[derive(Debug, PartialEq, Eq)]
pub enum ParsedSearch {
    /// Not an M-SEARCH request at all (e.g. a NOTIFY from a peer); silently
    /// ignored by the caller.
    NotASearch,
    /// A search target was found (or defaulted to `ssdp:all` when the `ST`
    /// header was absent).
    Target(String),
    /// Looked like an M-SEARCH with an `ST:` header but it had no
    /// terminator; dropped per §4.5/§7 (`MalformedRequest`).
    Malformed,
}

/// Parse an inbound datagram for `M-SEARCH * ... ST: <value>` (§4.5).
pub fn parse_search_target(datagram: &[u8]) -> ParsedSearch {
    let text = String::from_utf8_lossy(datagram);

    if !text.starts_with("M-SEARCH *") {
        return ParsedSearch::NotASearch;
    }

    let Some(st_pos) = find_ci(&text, "\r\nST:") else {
        return ParsedSearch::Target(ST_ALL.to_string());
    };

    let after_colon = &text[st_pos + "\r\nST:".len()..];
    let Some(terminator) = after_colon.find("\r\n") else {
        return ParsedSearch::Malformed;
    };

    let value = after_colon[..terminator].trim_start();
    ParsedSearch::Target(value.to_string())
}

fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    let haystack_lower = haystack.to_ascii_lowercase();
    let needle_lower = needle.to_ascii_lowercase();
    haystack_lower.find(&needle_lower)
}
