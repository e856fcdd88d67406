use arc_swap::ArcSwap;
use dhcproto::{v6::Message, Decodable, Encodable};
use mock_dhcpv6::config::Config;
use std::{
    fmt::Write,
    io,
    net::{SocketAddr, UdpSocket},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::{debug, error, info, trace, warn};

use crate::v6::{
    handlers::{handle_message, DhcpV6Response},
    session::ClientSession,
};

/// Receive loop. One datagram is fully handled and answered before the next
/// is read, so the session needs no locking. Returns once `shutdown` is set,
/// after the reply in flight (if any) has been sent.
pub fn v6_worker(socket: UdpSocket, config: Arc<ArcSwap<Config>>, shutdown: Arc<AtomicBool>) {
    let mut session = ClientSession::new();
    let mut read_buf = [0u8; 2048];

    match socket.local_addr() {
        Ok(addr) => info!("mock DHCPv6 server listening on {addr}"),
        Err(e) => warn!("unable to read local address: {e}"),
    }

    while !shutdown.load(Ordering::Relaxed) {
        let (amount, src) = match socket.recv_from(&mut read_buf) {
            Ok((amount, src)) => {
                debug!("Received {amount} bytes from {src:?}");
                trace!("Data: {}", hex_for_text2pcap(&read_buf[..amount]));
                (amount, src)
            }
            // read timeout, go around and check for shutdown
            Err(err)
                if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
            {
                continue
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == io::ErrorKind::ConnectionReset => {
                error!("Sent response to host that responded with ICMP unreachable");
                continue;
            }
            Err(err) => {
                error!("Error receiving: {err:?}");
                continue;
            }
        };

        let msg = match Message::from_bytes(&read_buf[..amount]) {
            Ok(msg) => msg,
            Err(e) => {
                error!("Unable to parse dhcp message {}", e);
                continue;
            }
        };
        trace!("Message: {:#?}", msg);
        info!(msg_type = ?msg.msg_type(), xid = ?msg.xid(), %src, "received message");

        session.peer = Some(src);
        let response = handle_message(&config.load(), &mut session, &msg, unix_now());
        match response {
            DhcpV6Response::Message(reply) => send_reply(&socket, &reply, src),
            DhcpV6Response::NoResponse(reason) => {
                debug!(reason = reason.as_str(), "no response sent")
            }
        }
        session.log_state("session state");
    }

    drop(socket);
    info!("server socket closed");
}

fn send_reply(socket: &UdpSocket, reply: &Message, dst: SocketAddr) {
    let write_buf = match reply.to_vec() {
        Ok(buf) => buf,
        Err(e) => {
            error!("Problem encoding response message: {e}");
            return;
        }
    };
    match socket.send_to(&write_buf, dst) {
        Ok(sent) => info!(
            msg_type = ?reply.msg_type(),
            xid = ?reply.xid(),
            %dst,
            "responded with {sent} bytes"
        ),
        Err(e) => error!("Problem sending response message: {e}"),
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn hex_for_text2pcap(bytes: &[u8]) -> String {
    let mut s = String::new();
    s.push_str("0000 ");
    for b in bytes {
        let _ = write!(&mut s, " {:02x}", b);
    }
    s
}
