use std::net::Ipv6Addr;

use advmac::MacAddr6;
use dhcproto::v6::{DhcpOption, Message, StatusCode, IANA, IAPD};
use ipnet::Ipv6Net;
use tracing::debug;

/// DUID type codes from RFC 8415.
const DUID_LLT: u16 = 1; // Link-layer address plus time
const DUID_LL: u16 = 3; // Link-layer address

/// Hardware type for Ethernet from IANA.
const HTYPE_ETHERNET: u16 = 1;

/// Helpers for interacting with dhcproto::v6::Message
pub trait MessageExtV6 {
    fn client_id(&self) -> Option<&[u8]>;
    fn server_id(&self) -> Option<&[u8]>;
    fn ia_na(&self) -> Option<&IANA>;
    fn ia_pd(&self) -> Option<&IAPD>;
    fn ia_na_address(&self) -> Option<Ipv6Addr>;
    fn ia_pd_prefix(&self) -> Option<Ipv6Net>;
    /// Message level Status Code, not the ones nested in IAs
    fn status_code(&self) -> Option<&StatusCode>;
    fn preference(&self) -> Option<u8>;
    fn client_hw_addr(&self) -> Option<MacAddr6>;
}

impl MessageExtV6 for Message {
    /// Get the bytes representing the DUID
    fn client_id(&self) -> Option<&[u8]> {
        self.opts().iter().find_map(|opt| match opt {
            DhcpOption::ClientId(id) => Some(id.as_slice()),
            _ => None,
        })
    }

    fn server_id(&self) -> Option<&[u8]> {
        self.opts().iter().find_map(|opt| match opt {
            DhcpOption::ServerId(id) => Some(id.as_slice()),
            _ => None,
        })
    }

    fn ia_na(&self) -> Option<&IANA> {
        self.opts().iter().find_map(|opt| match opt {
            DhcpOption::IANA(iana) => Some(iana),
            _ => None,
        })
    }

    fn ia_na_address(&self) -> Option<Ipv6Addr> {
        self.ia_na().and_then(|na| {
            na.opts.iter().find_map(|opt| match opt {
                DhcpOption::IAAddr(ia) => Some(ia.addr),
                _ => None,
            })
        })
    }

    fn ia_pd(&self) -> Option<&IAPD> {
        self.opts().iter().find_map(|opt| match opt {
            DhcpOption::IAPD(iapd) => Some(iapd),
            _ => None,
        })
    }

    fn ia_pd_prefix(&self) -> Option<Ipv6Net> {
        self.ia_pd().and_then(|pd| {
            pd.opts.iter().find_map(|opt| match opt {
                DhcpOption::IAPrefix(ia) => Ipv6Net::new(ia.prefix_ip, ia.prefix_len).ok(),
                _ => None,
            })
        })
    }

    fn status_code(&self) -> Option<&StatusCode> {
        self.opts().iter().find_map(|opt| match opt {
            DhcpOption::StatusCode(code) => Some(code),
            _ => None,
        })
    }

    fn preference(&self) -> Option<u8> {
        self.opts().iter().find_map(|opt| match opt {
            DhcpOption::Preference(pref) => Some(*pref),
            _ => None,
        })
    }

    /// Link-layer address embedded in a DUID-LLT or DUID-LL client id.
    ///
    /// DUID-LLT format: type(2) + htype(2) + time(4) + link-layer(variable)
    /// DUID-LL format:  type(2) + htype(2) + link-layer(variable)
    ///
    /// Only informational, the MAC may have changed since the DUID was created.
    fn client_hw_addr(&self) -> Option<MacAddr6> {
        let client_id = self.client_id()?;
        if client_id.len() < 4 {
            return None;
        }

        let duid_type = u16::from_be_bytes([client_id[0], client_id[1]]);
        let htype = u16::from_be_bytes([client_id[2], client_id[3]]);
        if htype != HTYPE_ETHERNET {
            return None;
        }

        let ll = match duid_type {
            DUID_LLT => client_id.get(8..)?,
            DUID_LL => &client_id[4..],
            _ => return None,
        };

        match <[u8; 6]>::try_from(ll) {
            Ok(bytes) => Some(MacAddr6::new(bytes)),
            Err(_) => {
                debug!("DUID link-layer address wasn't 6 bytes: {:?}", ll);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhcproto::v6::MessageType;

    fn with_client_id(id: Vec<u8>) -> Message {
        let mut msg = Message::new(MessageType::Solicit);
        msg.opts_mut().insert(DhcpOption::ClientId(id));
        msg
    }

    #[test]
    fn hw_addr_from_duid_ll() {
        let msg = with_client_id(vec![0, 3, 0, 1, 0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(
            msg.client_hw_addr(),
            Some(MacAddr6::new([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]))
        );
    }

    #[test]
    fn hw_addr_from_duid_llt() {
        let msg = with_client_id(vec![
            0, 1, 0, 1, 0x2a, 0x2b, 0x2c, 0x2d, 0x02, 0x11, 0x22, 0x33, 0x44, 0x55,
        ]);
        assert_eq!(
            msg.client_hw_addr(),
            Some(MacAddr6::new([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]))
        );
    }

    #[test]
    fn hw_addr_absent_for_duid_en_and_short_ids() {
        // DUID-EN
        let msg = with_client_id(vec![0, 2, 0, 0, 0x01, 0x37, 1, 2, 3, 4]);
        assert_eq!(msg.client_hw_addr(), None);
        let msg = with_client_id(vec![0, 3, 0]);
        assert_eq!(msg.client_hw_addr(), None);
        // truncated DUID-LLT
        let msg = with_client_id(vec![0, 1, 0, 1, 0, 0]);
        assert_eq!(msg.client_hw_addr(), None);
    }

    #[test]
    fn missing_options_are_none() {
        let msg = Message::new(MessageType::Renew);
        assert!(msg.client_id().is_none());
        assert!(msg.server_id().is_none());
        assert!(msg.ia_na().is_none());
        assert!(msg.ia_pd().is_none());
        assert!(msg.status_code().is_none());
        assert!(msg.preference().is_none());
    }
}
