use dhcproto::{v6, Decodable, Encodable};

use std::{net::UdpSocket, time::Duration};

/// Run one Solicit/Advertise/Request/Reply exchange against a mock server.
///
/// client [SERVER_ADDR] [--bind ADDR]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = pico_args::Arguments::from_env();
    let bind: String = args
        .opt_value_from_str("--bind")?
        .unwrap_or_else(|| "[::1]:0".into());
    let server: String = args
        .opt_free_from_str()?
        .unwrap_or_else(|| "[::1]:547".into());

    let socket = UdpSocket::bind(&bind)?;
    socket.set_read_timeout(Some(Duration::from_secs(5)))?;

    let solicit = dhcpv6_test_solicit();
    let advertise = exchange(&socket, &server, &solicit)?;
    println!("advertise: {advertise:#?}");

    let server_id = advertise
        .opts()
        .iter()
        .find_map(|opt| match opt {
            v6::DhcpOption::ServerId(id) => Some(id.clone()),
            _ => None,
        })
        .ok_or("Advertise without Server ID")?;

    let reply = exchange(&socket, &server, &dhcpv6_test_request(server_id))?;
    println!("reply: {reply:#?}");
    Ok(())
}

fn exchange(
    socket: &UdpSocket,
    server: &str,
    msg: &v6::Message,
) -> Result<v6::Message, Box<dyn std::error::Error>> {
    socket.send_to(&msg.to_vec()?, server)?;

    let mut recv_buf = vec![0u8; 1500];
    let recv_bytes = socket.recv(&mut recv_buf)?;
    println!("received {recv_bytes} bytes in response");

    Ok(v6::Message::from_bytes(&recv_buf[..recv_bytes])?)
}

// DUID-LL, ethernet 02:00:00:00:00:01
const CLIENT_DUID: [u8; 10] = [0x00, 0x03, 0x00, 0x01, 0x02, 0x00, 0x00, 0x00, 0x00, 0x01];
const IA_NA_IAID: u32 = 10;
const IA_PD_IAID: u32 = 20;

fn with_ias(mut msg: v6::Message) -> v6::Message {
    let opts = msg.opts_mut();
    opts.insert(v6::DhcpOption::ClientId(CLIENT_DUID.to_vec()));
    opts.insert(v6::DhcpOption::IANA(v6::IANA {
        id: IA_NA_IAID,
        t1: 0,
        t2: 0,
        opts: v6::DhcpOptions::new(),
    }));
    opts.insert(v6::DhcpOption::IAPD(v6::IAPD {
        id: IA_PD_IAID,
        t1: 0,
        t2: 0,
        opts: v6::DhcpOptions::new(),
    }));
    msg
}

fn dhcpv6_test_solicit() -> v6::Message {
    // construct a new Solicit Message with a random xid
    with_ias(v6::Message::new(v6::MessageType::Solicit))
}

fn dhcpv6_test_request(server_id: Vec<u8>) -> v6::Message {
    let mut msg = with_ias(v6::Message::new(v6::MessageType::Request));
    msg.opts_mut().insert(v6::DhcpOption::ServerId(server_id));
    msg
}
