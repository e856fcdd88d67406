//! Lease state of the single client tracked by the mock server.
//!
//! The address (IA_NA) and prefix (IA_PD) leases are independent state
//! machines. Every transition returns a [`LeaseOutcome`]; a transition whose
//! guard fails leaves the lease untouched and returns `NoBinding`.

use std::{
    fmt,
    net::{Ipv6Addr, SocketAddr},
};

use ipnet::Ipv6Net;
use mock_dhcpv6::Duid;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeaseState {
    #[default]
    Init,
    /// Offered in an Advertise, waiting for the Request
    Selecting,
    Bound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseOutcome {
    Offered,
    Bound,
    Refreshed,
    Released,
    NoBinding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease<T> {
    pub iaid: Option<u32>,
    pub state: LeaseState,
    pub assigned: Option<T>,
    // absolute unix seconds, 0 when unset
    pub preferred_until: u64,
    pub valid_until: u64,
}

pub type AddressLease = Lease<Ipv6Addr>;
pub type PrefixLease = Lease<Ipv6Net>;

impl<T> Default for Lease<T> {
    fn default() -> Self {
        Self {
            iaid: None,
            state: LeaseState::Init,
            assigned: None,
            preferred_until: 0,
            valid_until: 0,
        }
    }
}

impl<T: Copy> Lease<T> {
    fn owns(&self, iaid: u32) -> bool {
        self.iaid == Some(iaid)
    }

    pub fn is_bound(&self) -> bool {
        self.state == LeaseState::Bound && self.assigned.is_some() && self.valid_until > 0
    }

    /// Solicit: remember the IAID we are offering to, nothing is assigned yet.
    pub fn offer(&mut self, iaid: u32) -> LeaseOutcome {
        *self = Self {
            iaid: Some(iaid),
            state: LeaseState::Selecting,
            ..Default::default()
        };
        LeaseOutcome::Offered
    }

    /// Request: bind `value` if this IAID was offered.
    pub fn bind(
        &mut self,
        iaid: u32,
        value: T,
        preferred_lifetime: u32,
        valid_lifetime: u32,
        now: u64,
    ) -> LeaseOutcome {
        if self.state != LeaseState::Selecting || !self.owns(iaid) {
            return LeaseOutcome::NoBinding;
        }
        self.assigned = Some(value);
        self.set_lifetimes(preferred_lifetime, valid_lifetime, now);
        self.state = LeaseState::Bound;
        LeaseOutcome::Bound
    }

    /// Renew and Rebind: extend the lifetimes, never the assigned value.
    pub fn refresh(
        &mut self,
        iaid: u32,
        preferred_lifetime: u32,
        valid_lifetime: u32,
        now: u64,
    ) -> LeaseOutcome {
        if self.state != LeaseState::Bound || !self.owns(iaid) || self.assigned.is_none() {
            return LeaseOutcome::NoBinding;
        }
        self.set_lifetimes(preferred_lifetime, valid_lifetime, now);
        LeaseOutcome::Refreshed
    }

    pub fn release(&mut self, iaid: u32) -> LeaseOutcome {
        if self.state != LeaseState::Bound || !self.owns(iaid) {
            return LeaseOutcome::NoBinding;
        }
        self.assigned = None;
        self.preferred_until = 0;
        self.valid_until = 0;
        self.state = LeaseState::Init;
        LeaseOutcome::Released
    }

    fn set_lifetimes(&mut self, preferred_lifetime: u32, valid_lifetime: u32, now: u64) {
        self.preferred_until = now + u64::from(preferred_lifetime);
        self.valid_until = now + u64::from(valid_lifetime);
    }
}

/// Everything the server knows about the one client it serves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSession {
    pub client_duid: Option<Duid>,
    pub transaction_id: Option<[u8; 3]>,
    pub peer: Option<SocketAddr>,
    pub address: AddressLease,
    pub prefix: PrefixLease,
}

impl ClientSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        info!("resetting client lease information");
        *self = Self::default();
    }

    /// Drop both leases but keep tracking the client so that later messages
    /// from it are still answered (with NoBinding).
    pub fn clear_leases(&mut self) {
        self.address = AddressLease::default();
        self.prefix = PrefixLease::default();
    }

    pub fn is_client(&self, client_id: &[u8]) -> bool {
        self.client_duid
            .as_ref()
            .is_some_and(|duid| *duid == *client_id)
    }

    /// Both leases either untouched or waiting for a Request.
    pub fn is_selecting(&self) -> bool {
        matches!(self.address.state, LeaseState::Init | LeaseState::Selecting)
            && matches!(self.prefix.state, LeaseState::Init | LeaseState::Selecting)
    }

    pub fn is_idle(&self) -> bool {
        self.address.state == LeaseState::Init && self.prefix.state == LeaseState::Init
    }

    pub fn log_state(&self, message: &str) {
        info!(
            client_duid = %DisplayOpt(self.client_duid.as_ref()),
            peer = %DisplayOpt(self.peer.as_ref()),
            na_state = ?self.address.state,
            na_iaid = ?self.address.iaid,
            assigned_ip = %DisplayOpt(self.address.assigned.as_ref()),
            ip_preferred_until = self.address.preferred_until,
            ip_valid_until = self.address.valid_until,
            pd_state = ?self.prefix.state,
            pd_iaid = ?self.prefix.iaid,
            delegated_prefix = %DisplayOpt(self.prefix.assigned.as_ref()),
            prefix_preferred_until = self.prefix.preferred_until,
            prefix_valid_until = self.prefix.valid_until,
            "{message}"
        );
    }
}

struct DisplayOpt<'a, T>(Option<&'a T>);

impl<T: fmt::Display> fmt::Display for DisplayOpt<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => v.fmt(f),
            None => f.write_str("-"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000;

    fn addr() -> Ipv6Addr {
        "2001:db8:cafe::100".parse().unwrap()
    }

    fn bound_lease(iaid: u32) -> AddressLease {
        let mut lease = AddressLease::default();
        lease.offer(iaid);
        assert_eq!(lease.bind(iaid, addr(), 1800, 3600, NOW), LeaseOutcome::Bound);
        lease
    }

    #[test]
    fn offer_moves_to_selecting() {
        let mut lease = AddressLease::default();
        assert_eq!(lease.offer(10), LeaseOutcome::Offered);
        assert_eq!(lease.state, LeaseState::Selecting);
        assert_eq!(lease.iaid, Some(10));
        assert_eq!(lease.assigned, None);
        assert!(!lease.is_bound());
    }

    #[test]
    fn bind_sets_lifetimes_from_now() {
        let lease = bound_lease(10);
        assert_eq!(lease.state, LeaseState::Bound);
        assert_eq!(lease.assigned, Some(addr()));
        assert_eq!(lease.preferred_until, NOW + 1800);
        assert_eq!(lease.valid_until, NOW + 3600);
        assert!(lease.valid_until >= lease.preferred_until);
        assert!(lease.is_bound());
    }

    #[test]
    fn bind_with_other_iaid_is_no_binding() {
        let mut lease = AddressLease::default();
        lease.offer(10);
        let before = lease.clone();
        assert_eq!(lease.bind(11, addr(), 1800, 3600, NOW), LeaseOutcome::NoBinding);
        assert_eq!(lease, before);
    }

    #[test]
    fn bind_without_offer_is_no_binding() {
        let mut lease = AddressLease::default();
        assert_eq!(lease.bind(10, addr(), 1800, 3600, NOW), LeaseOutcome::NoBinding);
        assert_eq!(lease.state, LeaseState::Init);
    }

    #[test]
    fn bind_twice_is_no_binding() {
        let mut lease = bound_lease(10);
        assert_eq!(lease.bind(10, addr(), 1800, 3600, NOW + 5), LeaseOutcome::NoBinding);
        assert_eq!(lease.preferred_until, NOW + 1800);
    }

    #[test]
    fn refresh_only_moves_lifetimes() {
        let mut lease = bound_lease(10);
        assert_eq!(lease.refresh(10, 1800, 3600, NOW + 900), LeaseOutcome::Refreshed);
        assert_eq!(lease.assigned, Some(addr()));
        assert_eq!(lease.state, LeaseState::Bound);
        assert_eq!(lease.preferred_until, NOW + 900 + 1800);
        assert_eq!(lease.valid_until, NOW + 900 + 3600);
    }

    #[test]
    fn refresh_with_other_iaid_is_no_binding() {
        let mut lease = bound_lease(10);
        let before = lease.clone();
        assert_eq!(lease.refresh(99, 1800, 3600, NOW + 900), LeaseOutcome::NoBinding);
        assert_eq!(lease, before);
    }

    #[test]
    fn refresh_while_selecting_is_no_binding() {
        let mut lease = AddressLease::default();
        lease.offer(10);
        assert_eq!(lease.refresh(10, 1800, 3600, NOW), LeaseOutcome::NoBinding);
        assert_eq!(lease.state, LeaseState::Selecting);
    }

    #[test]
    fn release_clears_binding_and_blocks_rebind() {
        let mut lease = bound_lease(10);
        assert_eq!(lease.release(10), LeaseOutcome::Released);
        assert_eq!(lease.state, LeaseState::Init);
        assert_eq!(lease.assigned, None);
        assert_eq!(lease.valid_until, 0);
        assert_eq!(lease.preferred_until, 0);

        // no stale binding survives
        assert_eq!(lease.bind(10, addr(), 1800, 3600, NOW), LeaseOutcome::NoBinding);
        assert_eq!(lease.refresh(10, 1800, 3600, NOW), LeaseOutcome::NoBinding);
        assert_eq!(lease.release(10), LeaseOutcome::NoBinding);
    }

    #[test]
    fn release_with_other_iaid_is_no_binding() {
        let mut lease = bound_lease(10);
        assert_eq!(lease.release(11), LeaseOutcome::NoBinding);
        assert!(lease.is_bound());
    }

    #[test]
    fn prefix_lease_is_symmetric() {
        let prefix: Ipv6Net = "2001:db8:aaaa::/64".parse().unwrap();
        let mut lease = PrefixLease::default();
        lease.offer(20);
        assert_eq!(lease.bind(20, prefix, 7200, 10800, NOW), LeaseOutcome::Bound);
        assert_eq!(lease.refresh(20, 7200, 10800, NOW + 1), LeaseOutcome::Refreshed);
        assert_eq!(lease.assigned, Some(prefix));
        assert_eq!(lease.release(20), LeaseOutcome::Released);
        assert_eq!(lease.assigned, None);
    }

    #[test]
    fn session_leases_are_independent() {
        let mut session = ClientSession::new();
        session.address = bound_lease(10);
        assert!(session.address.is_bound());
        assert_eq!(session.prefix.state, LeaseState::Init);
        assert!(!session.is_selecting());
        assert!(!session.is_idle());

        session.address.release(10);
        assert!(session.is_idle());
    }

    #[test]
    fn session_reset_forgets_client() {
        let mut session = ClientSession::new();
        session.client_duid = Some(Duid::from(vec![1, 2, 3]));
        session.address = bound_lease(10);
        assert!(session.is_client(&[1, 2, 3]));
        assert!(!session.is_client(&[1, 2, 4]));

        session.reset();
        assert_eq!(session, ClientSession::default());
        assert!(!session.is_client(&[1, 2, 3]));
    }

    #[test]
    fn clear_leases_keeps_client() {
        let mut session = ClientSession::new();
        session.client_duid = Some(Duid::from(vec![1, 2, 3]));
        session.address = bound_lease(10);
        session.clear_leases();
        assert!(session.is_idle());
        assert_eq!(session.address.iaid, None);
        assert!(session.is_client(&[1, 2, 3]));
    }
}
