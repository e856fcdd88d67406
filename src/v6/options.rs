//! Construction of the IA_NA and IA_PD options carried in Advertise and Reply.

use std::net::Ipv6Addr;

use dhcproto::v6::{DhcpOption, DhcpOptions, IAAddr, IAPrefix, Status, StatusCode, IANA, IAPD};
use ipnet::Ipv6Net;

/// T1 and T2 for an IA, half and 80% of the preferred lifetime rounded down.
pub fn renewal_times(preferred_lifetime: u32) -> (u32, u32) {
    let t1 = preferred_lifetime / 2;
    let t2 = (u64::from(preferred_lifetime) * 4 / 5) as u32;
    (t1, t2)
}

pub fn status_code(status: Status) -> DhcpOption {
    let msg = status_message(&status).into();
    DhcpOption::StatusCode(StatusCode { status, msg })
}

fn status_message(status: &Status) -> &'static str {
    match status {
        Status::Success => "Success",
        Status::NoBinding => "NoBinding",
        _ => "UnspecFail",
    }
}

/// IA_NA with an IA Address (when `address` is set) and a Status Code.
pub fn build_ia_na(
    iaid: u32,
    address: Option<Ipv6Addr>,
    preferred_lifetime: u32,
    valid_lifetime: u32,
    status: Status,
) -> IANA {
    let mut opts = DhcpOptions::new();
    if let Some(addr) = address {
        opts.insert(DhcpOption::IAAddr(IAAddr {
            addr,
            preferred_life: preferred_lifetime,
            valid_life: valid_lifetime,
            opts: DhcpOptions::new(),
        }));
    }
    opts.insert(status_code(status));

    let (t1, t2) = renewal_times(preferred_lifetime);
    IANA {
        id: iaid,
        t1,
        t2,
        opts,
    }
}

/// IA_PD with an IA Prefix (when `prefix` is set) and a Status Code.
pub fn build_ia_pd(
    iaid: u32,
    prefix: Option<Ipv6Net>,
    preferred_lifetime: u32,
    valid_lifetime: u32,
    status: Status,
) -> IAPD {
    let mut opts = DhcpOptions::new();
    if let Some(prefix) = prefix {
        opts.insert(DhcpOption::IAPrefix(IAPrefix {
            preferred_lifetime,
            valid_lifetime,
            prefix_len: prefix.prefix_len(),
            prefix_ip: prefix.addr(),
            opts: DhcpOptions::new(),
        }));
    }
    opts.insert(status_code(status));

    let (t1, t2) = renewal_times(preferred_lifetime);
    IAPD {
        id: iaid,
        t1,
        t2,
        opts,
    }
}

pub fn no_binding_ia_na(iaid: u32) -> IANA {
    build_ia_na(iaid, None, 0, 0, Status::NoBinding)
}

pub fn no_binding_ia_pd(iaid: u32) -> IAPD {
    build_ia_pd(iaid, None, 0, 0, Status::NoBinding)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(opts: &DhcpOptions) -> Option<&StatusCode> {
        opts.iter().find_map(|opt| match opt {
            DhcpOption::StatusCode(code) => Some(code),
            _ => None,
        })
    }

    #[test]
    fn renewal_times_round_down() {
        assert_eq!(renewal_times(1800), (900, 1440));
        assert_eq!(renewal_times(7200), (3600, 5760));
        assert_eq!(renewal_times(0), (0, 0));
        assert_eq!(renewal_times(1), (0, 0));
        assert_eq!(renewal_times(5), (2, 4));
        assert_eq!(renewal_times(7), (3, 5));
        assert_eq!(renewal_times(u32::MAX), (u32::MAX / 2, 3_435_973_836));
    }

    #[test]
    fn renewal_times_match_floor() {
        for preferred in [3u32, 10, 99, 101, 1799, 3601, 86_399] {
            let (t1, t2) = renewal_times(preferred);
            assert_eq!(t1, (f64::from(preferred) * 0.5).floor() as u32);
            assert!(u64::from(t2) * 5 <= u64::from(preferred) * 4);
            assert!(u64::from(t2 + 1) * 5 > u64::from(preferred) * 4);
        }
    }

    #[test]
    fn ia_na_with_address() {
        let addr: Ipv6Addr = "2001:db8:cafe::100".parse().unwrap();
        let iana = build_ia_na(10, Some(addr), 1800, 3600, Status::Success);

        assert_eq!(iana.id, 10);
        assert_eq!((iana.t1, iana.t2), (900, 1440));

        let ia_addr = iana
            .opts
            .iter()
            .find_map(|opt| match opt {
                DhcpOption::IAAddr(a) => Some(a),
                _ => None,
            })
            .expect("IA_NA missing IAAddr");
        assert_eq!(ia_addr.addr, addr);
        assert_eq!(ia_addr.preferred_life, 1800);
        assert_eq!(ia_addr.valid_life, 3600);

        let status = status_of(&iana.opts).expect("IA_NA missing StatusCode");
        assert_eq!(status.status, Status::Success);
        assert_eq!(status.msg, "Success");
    }

    #[test]
    fn ia_na_no_binding_has_no_address() {
        let iana = no_binding_ia_na(99);
        assert_eq!(iana.id, 99);
        assert_eq!((iana.t1, iana.t2), (0, 0));
        assert!(!iana
            .opts
            .iter()
            .any(|opt| matches!(opt, DhcpOption::IAAddr(_))));
        let status = status_of(&iana.opts).unwrap();
        assert_eq!(status.status, Status::NoBinding);
        assert_eq!(status.msg, "NoBinding");
    }

    #[test]
    fn ia_pd_with_prefix() {
        let prefix: Ipv6Net = "2001:db8:aaaa::/64".parse().unwrap();
        let iapd = build_ia_pd(20, Some(prefix), 7200, 10800, Status::Success);

        assert_eq!(iapd.id, 20);
        assert_eq!((iapd.t1, iapd.t2), (3600, 5760));

        let ia_prefix = iapd
            .opts
            .iter()
            .find_map(|opt| match opt {
                DhcpOption::IAPrefix(p) => Some(p),
                _ => None,
            })
            .expect("IA_PD missing IAPrefix");
        assert_eq!(ia_prefix.prefix_ip, prefix.addr());
        assert_eq!(ia_prefix.prefix_len, 64);
        assert_eq!(ia_prefix.preferred_lifetime, 7200);
        assert_eq!(ia_prefix.valid_lifetime, 10800);
        assert_eq!(status_of(&iapd.opts).unwrap().status, Status::Success);
    }

    #[test]
    fn ia_pd_no_binding_has_no_prefix() {
        let iapd = no_binding_ia_pd(21);
        assert!(!iapd
            .opts
            .iter()
            .any(|opt| matches!(opt, DhcpOption::IAPrefix(_))));
        assert_eq!(status_of(&iapd.opts).unwrap().status, Status::NoBinding);
    }
}
