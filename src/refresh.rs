//! The Interface Refresher (§4.4): periodic enumeration of system interfaces,
//! admitting newly-eligible addresses and sweeping ones that disappeared.

use std::ffi::CString;
use std::net::{IpAddr, Ipv4Addr};

use log::{debug, warn};

use crate::net::socket::{join_listener_v6, open_send_socket};
use crate::net::SSDP_PORT;
use crate::registry::InterfaceRegistry;

/// Run one mark/enumerate/clear/sweep/admit cycle (§4.4).
///
/// `v6_listener` receives the per-scope multicast joins newly-admitted IPv6
/// interfaces need on the shared listener socket. `allowlist` empty means
/// every interface with an eligible address is accepted.
///
/// Returns the number of records added or removed; a non-zero count drives
/// an incremental announcement (§4.6/§4.7).
pub fn refresh(
    registry: &mut InterfaceRegistry,
    v6_listener: &mio::net::UdpSocket,
    allowlist: &[String],
) -> usize {
    registry.mark_all_stale();

    let interfaces = match if_addrs::get_if_addrs() {
        Ok(ifaces) => ifaces,
        Err(e) => {
            warn!("Could not enumerate interfaces: {e}");
            Vec::new()
        }
    };

    for iface in &interfaces {
        if !allowed(&iface.name, allowlist) {
            continue;
        }
        if let Some(addr) = eligible_addr(iface) {
            registry.clear_stale(addr);
        }
    }

    let removed = registry.sweep_stale();
    if removed > 0 {
        debug!("Swept {removed} stale interface record(s)");
    }

    let mut added = 0;
    for iface in &interfaces {
        if !allowed(&iface.name, allowlist) {
            continue;
        }
        let Some(addr) = eligible_addr(iface) else { continue };
        if registry.find_exact(addr).is_some() {
            continue;
        }
        if subnet_already_covered(registry, addr) {
            continue;
        }

        let scope_id = interface_index(&iface.name);
        match open_send_socket(&iface.name, addr, scope_id, SSDP_PORT) {
            Ok(socket) => {
                if let IpAddr::V6(_) = addr {
                    if let Err(e) = join_listener_v6(v6_listener, scope_id) {
                        warn!("Could not join multicast listener for {}: {e}", iface.name);
                        continue;
                    }
                }
                let mask = ipv4_mask(iface).unwrap_or(Ipv4Addr::UNSPECIFIED);
                if registry.insert(iface.name.clone(), addr, mask, socket) {
                    added += 1;
                }
            }
            Err(e) => warn!("Could not open socket for interface {}: {e}", iface.name),
        }
    }

    removed + added
}

/// Resolve an interface name to its kernel index for IPv6 scope ids, the
/// same `if_nametoindex(3)` call the original daemon uses. Returns 0 (no
/// scope) if the name can't be resolved, e.g. in test sandboxes.
fn interface_index(ifname: &str) -> u32 {
    let Ok(cname) = CString::new(ifname) else { return 0 };
    unsafe { libc::if_nametoindex(cname.as_ptr()) }
}

fn allowed(ifname: &str, allowlist: &[String]) -> bool {
    allowlist.is_empty() || allowlist.iter().any(|n| n == ifname)
}

/// Extract `iface`'s address if it passes the address filter (§4.4):
/// not unspecified, not loopback, link-local for IPv6.
fn eligible_addr(iface: &if_addrs::Interface) -> Option<IpAddr> {
    if iface.is_loopback() {
        return None;
    }
    let addr = iface.ip();
    if addr.is_unspecified() {
        return None;
    }
    if let IpAddr::V6(v6) = addr {
        if !crate::registry::is_unicast_link_local(v6) {
            return None;
        }
    }
    Some(addr)
}

fn ipv4_mask(iface: &if_addrs::Interface) -> Option<Ipv4Addr> {
    match &iface.addr {
        if_addrs::IfAddr::V4(v4) => Some(v4.netmask),
        if_addrs::IfAddr::V6(_) => None,
    }
}

/// Reject an IPv4 candidate already covered by another record in the same
/// subnet (§4.4's address filter); IPv6 has no equivalent rule here since
/// registry insertion already rejects duplicate exact matches.
fn subnet_already_covered(registry: &InterfaceRegistry, addr: IpAddr) -> bool {
    let IpAddr::V4(candidate) = addr else { return false };
    registry.iter().any(|r| match r.addr {
        IpAddr::V4(existing) if !r.mask.is_unspecified() => {
            existing != candidate && (u32::from(existing) & u32::from(r.mask)) == (u32::from(candidate) & u32::from(r.mask))
        }
        _ => false,
    })
}
