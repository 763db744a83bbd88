//! The Socket Factory (§4.2) and the two shared Multicast Listener sockets
//! (§4.3), built on `socket2` for the option-by-option control the spec
//! demands (dual-stack opt-out, scope ids, multicast egress selection).

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use log::debug;
use mio::net::{TcpListener as MioTcpListener, UdpSocket as MioUdpSocket};
use socket2::{Domain, Protocol, Socket, Type};

use super::{DESCRIPTION_PORT, SSDP_GROUP_V4, SSDP_GROUP_V6, SSDP_PORT};

/// Create one UDP send socket bound to `addr` on `ifname`, joined to the
/// SSDP multicast group, configured per §4.2. On any failure the
/// partially-created socket is dropped (closing it) before returning.
pub fn open_send_socket(ifname: &str, addr: IpAddr, scope_id: u32, port: u16) -> io::Result<MioUdpSocket> {
    match addr {
        IpAddr::V4(v4) => open_send_socket_v4(ifname, v4, port),
        IpAddr::V6(v6) => open_send_socket_v6(ifname, v6, scope_id, port),
    }
}

fn open_send_socket_v4(ifname: &str, addr: Ipv4Addr, port: u16) -> io::Result<MioUdpSocket> {
    // `Socket::new` sets SOCK_CLOEXEC on platforms that support it.
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;

    socket.bind(&SocketAddr::V4(SocketAddrV4::new(addr, port)).into())?;

    socket.join_multicast_v4(&SSDP_GROUP_V4, &addr)?;
    socket.set_multicast_loop_v4(false)?;
    socket.set_multicast_ttl_v4(super::MULTICAST_TTL)?;
    socket.set_multicast_if_v4(&addr)?;

    debug!("Adding new interface {ifname} with address {addr}");
    Ok(MioUdpSocket::from_std(socket.into()))
}

fn open_send_socket_v6(ifname: &str, addr: Ipv6Addr, scope_id: u32, port: u16) -> io::Result<MioUdpSocket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_only_v6(true)?;
    socket.set_reuse_address(true)?;
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;

    socket.bind(&SocketAddr::V6(SocketAddrV6::new(addr, port, 0, scope_id)).into())?;

    socket.join_multicast_v6(&SSDP_GROUP_V6, scope_id)?;
    socket.set_multicast_loop_v6(false)?;
    socket.set_multicast_if_v6(scope_id)?;

    debug!("Adding new interface {ifname} with address {addr}%{scope_id}");
    Ok(MioUdpSocket::from_std(socket.into()))
}

/// Build the IPv4 multicast listener: bound to `(239.255.255.250, 1900)`
/// with reuse flags, as a pure receive socket (§4.3).
pub fn open_multicast_listener_v4() -> io::Result<MioUdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::V4(SocketAddrV4::new(SSDP_GROUP_V4, SSDP_PORT)).into())?;
    Ok(MioUdpSocket::from_std(socket.into()))
}

/// Build the IPv6 multicast listener: bound to `(::, 1900)`, v6-only, with
/// reuse flags (§4.3). Joins happen per-interface as records are admitted.
pub fn open_multicast_listener_v6() -> io::Result<MioUdpSocket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_only_v6(true)?;
    socket.set_reuse_address(true)?;
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, SSDP_PORT, 0, 0)).into())?;
    Ok(MioUdpSocket::from_std(socket.into()))
}

/// Join the shared IPv6 listener to the SSDP group on a newly admitted
/// interface. IPv4 joins happen implicitly via `open_send_socket_v4`
/// because the group membership there is per-bound-address; IPv6 multicast
/// membership on a wildcard-bound socket needs an explicit per-scope join
/// on the shared listener as well.
pub fn join_listener_v6(listener: &MioUdpSocket, scope_id: u32) -> io::Result<()> {
    listener.join_multicast_v6(&SSDP_GROUP_V6, scope_id)
}

/// Build the description server's TCP listener: bound to `(::, 1901)` with
/// `IPV6_V6ONLY` explicitly disabled so IPv4 clients arrive as
/// IPv4-mapped IPv6 peers on the same listener (§4.8).
pub fn open_description_listener() -> io::Result<MioTcpListener> {
    let socket = Socket::new(Domain::IPV6, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_only_v6(false)?;
    socket.set_reuse_address(true)?;
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, DESCRIPTION_PORT, 0, 0)).into())?;
    socket.listen(1024)?;
    Ok(MioTcpListener::from_std(socket.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use if_addrs::get_if_addrs;

    #[test]
    fn opens_and_binds_a_send_socket_on_loopback_like_address() {
        // We can't bind to a real interface address in CI sandboxes beyond
        // loopback, so exercise the v4 path end-to-end against whatever
        // non-loopback address (if any) is available, and skip otherwise.
        let Some(iface) = get_if_addrs()
            .unwrap_or_default()
            .into_iter()
            .find(|i| matches!(i.addr, if_addrs::IfAddr::V4(_)) && !i.is_loopback())
        else {
            return;
        };
        let IpAddr::V4(addr) = iface.ip() else { unreachable!() };
        let sock = open_send_socket_v4(&iface.name, addr, 0);
        assert!(sock.is_ok(), "{:?}", sock.err());
    }
}
