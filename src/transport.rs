//! UDP socket setup for a DHCPv6 server listening on a single link.

use std::{
    net::{Ipv6Addr, SocketAddr, SocketAddrV6, UdpSocket},
    time::Duration,
};

use nix::{ifaddrs::getifaddrs, net::if_::if_nametoindex};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::{debug, warn};

use crate::{Error, Result};

pub const CLIENT_PORT: u16 = 546;
pub const SERVER_PORT: u16 = 547;

/// All_DHCP_Relay_Agents_and_Servers
pub const ALL_DHCP_SERVERS: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 1, 2);

/// How long a blocking receive waits before the worker re-checks for shutdown.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(1);

pub fn interface_index(interface: &str) -> Result<u32> {
    if_nametoindex(interface).map_err(|e| Error::Interface {
        name: interface.to_owned(),
        reason: format!("error getting index: {e}"),
    })
}

/// First link-local address configured on `interface`, if any.
pub fn link_local_addr(interface: &str) -> Result<Option<Ipv6Addr>> {
    let addrs = getifaddrs().map_err(|e| Error::Interface {
        name: interface.to_owned(),
        reason: format!("getifaddrs failed: {e}"),
    })?;
    Ok(addrs
        .filter(|ifaddr| ifaddr.interface_name == interface)
        .filter_map(|ifaddr| ifaddr.address?.as_sockaddr_in6().map(|sin6| sin6.ip()))
        .find(|ip| ip.segments()[0] & 0xffc0 == 0xfe80))
}

/// Bind `[::]:port` on `interface` and join ff02::1:2 there.
pub fn bind_multicast(interface: &str, port: u16) -> Result<UdpSocket> {
    let interface_index = interface_index(interface)?;

    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_only_v6(true)?;

    // SO_BINDTODEVICE needs CAP_NET_RAW, the multicast membership below is
    // already scoped to the interface so keep going without it
    if let Err(e) = socket.bind_device(Some(interface.as_bytes())) {
        warn!(interface, "failed to SO_BINDTODEVICE: {e}");
    }

    socket
        .join_multicast_v6(&ALL_DHCP_SERVERS, interface_index)
        .map_err(|e| Error::Interface {
            name: interface.to_owned(),
            reason: format!("failed to join {ALL_DHCP_SERVERS}: {e}"),
        })?;
    debug!(interface, interface_index, "joined {ALL_DHCP_SERVERS}");

    socket.bind(&SockAddr::from(SocketAddr::V6(SocketAddrV6::new(
        Ipv6Addr::UNSPECIFIED,
        port,
        0,
        0,
    ))))?;

    let socket: UdpSocket = socket.into();
    socket.set_read_timeout(Some(RECV_TIMEOUT))?;
    Ok(socket)
}

/// Plain unicast bind, used for loopback testing without an interface.
pub fn bind_unicast(addr: &str) -> Result<UdpSocket> {
    let socket = UdpSocket::bind(addr)?;
    socket.set_read_timeout(Some(RECV_TIMEOUT))?;
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_interface_is_an_error() {
        let err = interface_index("does-not-exist0").unwrap_err();
        assert!(matches!(err, Error::Interface { .. }));
    }

    #[test]
    fn unicast_bind_has_timeout() {
        let socket = bind_unicast("[::1]:0")
            .or_else(|_| bind_unicast("127.0.0.1:0"))
            .unwrap();
        assert_eq!(socket.read_timeout().unwrap(), Some(RECV_TIMEOUT));
    }

    #[test]
    fn all_dhcp_servers_is_link_scoped_multicast() {
        assert!(ALL_DHCP_SERVERS.is_multicast());
        assert_eq!(ALL_DHCP_SERVERS.to_string(), "ff02::1:2");
    }
}
