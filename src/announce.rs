//! The Announcer / Responder (§4.6): periodic NOTIFY waves and reactive
//! M-SEARCH responses.

use std::net::SocketAddr;

use log::{debug, warn};
use time::OffsetDateTime;

use crate::identity::{DiscoveryIdentity, ST_ALL};
use crate::message::{format_message, OutboundMessage};
use crate::registry::InterfaceRegistry;

/// Which records an [`announce`] wave covers.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum AnnounceMode {
    /// Only records with `modified == true` (freshly admitted interfaces).
    Incremental,
    /// Every sender record, regardless of `modified`.
    Full,
}

/// Emit one NOTIFY per supported type (skipping the bare UUID, which is
/// implicit in the `ssdp:all` NOTIFY's USN) on every record selected by
/// `mode`, then clear `modified` on the ones that were sent (§4.6).
pub fn announce(registry: &mut InterfaceRegistry, identity: &DiscoveryIdentity, mode: AnnounceMode) {
    let now = OffsetDateTime::now_utc();

    for record in registry.iter_mut() {
        if record.is_listener() {
            continue;
        }
        if mode == AnnounceMode::Incremental && !record.modified {
            continue;
        }

        let host = render_record_host(record);
        for st in identity.supported_types() {
            if st == &identity.uuid {
                continue;
            }
            let msg = if st == ST_ALL {
                OutboundMessage::NotifyAll
            } else {
                OutboundMessage::Notify(st.clone())
            };
            let body = format_message(&msg, identity, &host, now);
            send_to_group(record, &body);
        }
        record.modified = false;
    }
}

/// Compose and send a unicast response to `sender` for search target `st`
/// on the record selected by [`InterfaceRegistry::find_outbound`] (§4.6).
pub fn respond(registry: &InterfaceRegistry, identity: &DiscoveryIdentity, sender: SocketAddr, st: &str) {
    let Some(record) = registry.find_outbound(sender.ip()) else {
        debug!("No outbound interface for search from {sender}, dropping");
        return;
    };
    let Some(socket) = record.out_socket.as_ref() else {
        debug!("Matched record for {sender} has no send socket, dropping");
        return;
    };

    let host = render_record_host(record);
    let body = format_message(&OutboundMessage::Response(st.to_string()), identity, &host, OffsetDateTime::now_utc());

    match socket.send_to(body.as_bytes(), sender) {
        Ok(_) => debug!("Responded to {sender} for ST {st}"),
        Err(e) => warn!("Could not send response to {sender}: {e}"),
    }
}

fn render_record_host(record: &crate::registry::InterfaceRecord) -> String {
    match record.addr {
        std::net::IpAddr::V4(v4) => v4.to_string(),
        std::net::IpAddr::V6(v6) => format!("{v6}%{}", record.ifname),
    }
}

fn send_to_group(record: &crate::registry::InterfaceRecord, body: &str) {
    let Some(socket) = record.out_socket.as_ref() else { return };
    let group = crate::net::ssdp_group_addr(record.addr);
    let dest = SocketAddr::new(group, crate::net::SSDP_PORT);
    if let Err(e) = socket.send_to(body.as_bytes(), dest) {
        warn!("Could not send NOTIFY on {}: {e}", record.ifname);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::DeviceMetadata;
    use mio::net::UdpSocket as MioUdpSocket;
    use std::net::{IpAddr, Ipv4Addr};

    fn identity() -> DiscoveryIdentity {
        DiscoveryIdentity::new(
            "uuid:12345678-1234-4abc-8abc-1234567890ab".to_string(),
            "test/1.0".to_string(),
            DeviceMetadata::default(),
        )
    }

    fn bound_socket(addr: IpAddr) -> MioUdpSocket {
        let std_sock = std::net::UdpSocket::bind(SocketAddr::new(addr, 0)).unwrap();
        std_sock.set_nonblocking(true).unwrap();
        MioUdpSocket::from_std(std_sock)
    }

    #[test]
    fn full_announce_clears_modified_flag() {
        let mut registry = InterfaceRegistry::new();
        let addr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
        registry.insert("lo0".into(), addr, Ipv4Addr::new(255, 0, 0, 0), bound_socket(addr));
        // `insert` rejects real loopback; use a private address instead.
        let addr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10));
        registry.insert("eth0".into(), addr, Ipv4Addr::new(255, 255, 255, 0), bound_socket(addr));

        let id = identity();
        announce(&mut registry, &id, AnnounceMode::Full);

        assert!(registry.iter().filter(|r| !r.is_listener()).all(|r| !r.modified));
    }

    #[test]
    fn incremental_announce_skips_unmodified_records() {
        let mut registry = InterfaceRegistry::new();
        let addr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10));
        registry.insert("eth0".into(), addr, Ipv4Addr::new(255, 255, 255, 0), bound_socket(addr));
        let id = identity();

        announce(&mut registry, &id, AnnounceMode::Full);
        assert!(registry.iter().next().map(|r| !r.modified).unwrap_or(false));

        // A second incremental pass over an all-unmodified registry must be
        // a no-op: nothing left to flip.
        announce(&mut registry, &id, AnnounceMode::Incremental);
        assert!(registry.iter().next().map(|r| !r.modified).unwrap_or(false));
    }
}
