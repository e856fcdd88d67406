use dhcproto::v6::{DhcpOption, Message, MessageType, Status, IANA, IAPD};
use mock_dhcpv6::{config::Config, Duid};
use tracing::{debug, field, info, instrument, warn, Span};

use crate::v6::{
    extensions::MessageExtV6,
    options::{build_ia_na, build_ia_pd, no_binding_ia_na, no_binding_ia_pd, status_code},
    session::{AddressLease, ClientSession, LeaseOutcome, PrefixLease},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NoResponseReason {
    NoClientId,
    WrongClientId,
    NoServerId,
    WrongServerId,
    NoIaRequested,
    Discarded,
}

impl NoResponseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoResponseReason::NoClientId => "NoClientId",
            NoResponseReason::WrongClientId => "WrongClientId",
            NoResponseReason::NoServerId => "NoServerId",
            NoResponseReason::WrongServerId => "WrongServerId",
            NoResponseReason::NoIaRequested => "NoIaRequested",
            NoResponseReason::Discarded => "Discarded",
        }
    }
}

/// Result of processing an incoming DHCPv6 message.
///
/// `DhcpV6Response` indicates whether the server should send a DHCPv6
/// message back to the client or intentionally remain silent.
#[derive(Debug)]
pub enum DhcpV6Response {
    Message(Message),
    NoResponse(NoResponseReason),
}

/// Advertise or Reply skeleton: same xid, client id echoed, our server id.
fn new_response(
    config: &Config,
    msg_type: MessageType,
    msg: &Message,
    client_id: &[u8],
) -> Message {
    let mut reply = Message::new_with_id(msg_type, msg.xid());
    let opts = reply.opts_mut();
    opts.insert(DhcpOption::ClientId(client_id.to_vec()));
    opts.insert(DhcpOption::ServerId(config.server_id.bytes.clone()));
    reply
}

/// Every message but Solicit must come from the client we are tracking.
fn tracked_client_id<'a>(
    session: &ClientSession,
    msg: &'a Message,
) -> Result<&'a [u8], NoResponseReason> {
    let client_id = msg.client_id().ok_or(NoResponseReason::NoClientId)?;
    Span::current().record("client_id", field::display(Duid::from(client_id)));
    if !session.is_client(client_id) {
        info!("{:?} with mismatched Client ID, ignoring", msg.msg_type());
        return Err(NoResponseReason::WrongClientId);
    }
    Ok(client_id)
}

/// Renew and Release are addressed to one server and MUST carry its id.
fn check_server_id(config: &Config, msg: &Message) -> Result<(), NoResponseReason> {
    match msg.server_id() {
        Some(bytes) if config.server_id == *bytes => Ok(()),
        Some(_) => {
            info!("{:?} not for this server (Server ID mismatch), ignoring", msg.msg_type());
            Err(NoResponseReason::WrongServerId)
        }
        None => {
            info!("{:?} without Server ID, ignoring", msg.msg_type());
            Err(NoResponseReason::NoServerId)
        }
    }
}

/// IA_NA to put in the response for `outcome` of a transition on `lease`.
fn ia_na_for(config: &Config, lease: &AddressLease, iaid: u32, outcome: LeaseOutcome) -> IANA {
    let preferred = config.address_preferred_lifetime;
    let valid = config.address_valid_lifetime;
    match outcome {
        LeaseOutcome::Offered => {
            build_ia_na(iaid, Some(config.address), preferred, valid, Status::Success)
        }
        LeaseOutcome::Bound | LeaseOutcome::Refreshed => {
            build_ia_na(iaid, lease.assigned, preferred, valid, Status::Success)
        }
        LeaseOutcome::Released => build_ia_na(iaid, None, 0, 0, Status::Success),
        LeaseOutcome::NoBinding => {
            info!(
                iaid,
                tracked_iaid = ?lease.iaid,
                state = ?lease.state,
                "no binding for IA_NA"
            );
            no_binding_ia_na(iaid)
        }
    }
}

/// IA_PD to put in the response for `outcome` of a transition on `lease`.
fn ia_pd_for(config: &Config, lease: &PrefixLease, iaid: u32, outcome: LeaseOutcome) -> IAPD {
    let preferred = config.prefix_preferred_lifetime;
    let valid = config.prefix_valid_lifetime;
    match outcome {
        LeaseOutcome::Offered => {
            build_ia_pd(iaid, Some(config.prefix), preferred, valid, Status::Success)
        }
        LeaseOutcome::Bound | LeaseOutcome::Refreshed => {
            build_ia_pd(iaid, lease.assigned, preferred, valid, Status::Success)
        }
        LeaseOutcome::Released => build_ia_pd(iaid, None, 0, 0, Status::Success),
        LeaseOutcome::NoBinding => {
            info!(
                iaid,
                tracked_iaid = ?lease.iaid,
                state = ?lease.state,
                "no binding for IA_PD"
            );
            no_binding_ia_pd(iaid)
        }
    }
}

#[instrument(skip(config, session, msg),
fields(client_id = field::Empty, xid = ?msg.xid()))]
fn handle_solicit(
    config: &Config,
    session: &mut ClientSession,
    msg: &Message,
) -> Result<Message, NoResponseReason> {
    let client_id = msg.client_id();

    if let Some(tracked) = &session.client_duid {
        if client_id.map_or(true, |id| *tracked != *id) {
            info!(previous = %tracked, "new client DUID, resetting previous lease");
            session.reset();
        } else if !session.is_selecting() {
            // Lenient: a client that lost its state starts over with the same DUID
            warn!(
                na_state = ?session.address.state,
                pd_state = ?session.prefix.state,
                "Solicit in unexpected state, processing as new"
            );
            session.reset();
        }
    }

    let client_id = match client_id {
        Some(id) => id,
        None => {
            info!("Solicit without Client ID, ignoring");
            return Err(NoResponseReason::NoClientId);
        }
    };
    Span::current().record("client_id", field::display(Duid::from(client_id)));
    if let Some(hw) = msg.client_hw_addr() {
        info!("hw_addr from DUID: {hw}");
    }

    session.client_duid = Some(Duid::from(client_id));
    session.transaction_id = Some(msg.xid());

    if msg.ia_na().is_none() && msg.ia_pd().is_none() {
        info!("Solicit did not request any IA_NA or IA_PD, ignoring");
        return Err(NoResponseReason::NoIaRequested);
    }

    let mut advertise = new_response(config, MessageType::Advertise, msg, client_id);
    let opts = advertise.opts_mut();

    match msg.ia_na() {
        Some(iana) => {
            let outcome = session.address.offer(iana.id);
            opts.insert(DhcpOption::IANA(ia_na_for(config, &session.address, iana.id, outcome)));
        }
        None => debug!("Solicit without IA_NA, not offering address"),
    }

    match msg.ia_pd() {
        Some(iapd) => {
            let outcome = session.prefix.offer(iapd.id);
            opts.insert(DhcpOption::IAPD(ia_pd_for(config, &session.prefix, iapd.id, outcome)));
        }
        None => debug!("Solicit without IA_PD, not offering prefix"),
    }

    // RFC 8415 Section 21.8: Advertise messages should include a Preference option
    opts.insert(DhcpOption::Preference(config.preference));
    Ok(advertise)
}

/// Request may be sent to any server while selecting, the Server ID is not checked.
#[instrument(skip(config, session, msg),
fields(client_id = field::Empty, xid = ?msg.xid()))]
fn handle_request(
    config: &Config,
    session: &mut ClientSession,
    msg: &Message,
    now: u64,
) -> Result<Message, NoResponseReason> {
    let client_id = tracked_client_id(session, msg)?;
    session.transaction_id = Some(msg.xid());

    if msg.ia_na().is_none() && msg.ia_pd().is_none() {
        info!("Request contained no IA_NA or IA_PD, ignoring");
        return Err(NoResponseReason::NoIaRequested);
    }

    let mut reply = new_response(config, MessageType::Reply, msg, client_id);
    let opts = reply.opts_mut();

    if let Some(iana) = msg.ia_na() {
        let outcome = session.address.bind(
            iana.id,
            config.address,
            config.address_preferred_lifetime,
            config.address_valid_lifetime,
            now,
        );
        opts.insert(DhcpOption::IANA(ia_na_for(config, &session.address, iana.id, outcome)));
    }

    if let Some(iapd) = msg.ia_pd() {
        let outcome = session.prefix.bind(
            iapd.id,
            config.prefix,
            config.prefix_preferred_lifetime,
            config.prefix_valid_lifetime,
            now,
        );
        opts.insert(DhcpOption::IAPD(ia_pd_for(config, &session.prefix, iapd.id, outcome)));
    }

    Ok(reply)
}

/// Renew and Rebind share everything after identity checks: extend the
/// lifetimes of bound IAs, NoBinding for the rest.
fn refresh_leases(
    config: &Config,
    session: &mut ClientSession,
    msg: &Message,
    client_id: &[u8],
    now: u64,
) -> Result<Message, NoResponseReason> {
    if msg.ia_na().is_none() && msg.ia_pd().is_none() {
        info!("{:?} did not contain any IA_NA or IA_PD, ignoring", msg.msg_type());
        return Err(NoResponseReason::NoIaRequested);
    }

    let mut reply = new_response(config, MessageType::Reply, msg, client_id);
    let opts = reply.opts_mut();

    if let Some(iana) = msg.ia_na() {
        let outcome = session.address.refresh(
            iana.id,
            config.address_preferred_lifetime,
            config.address_valid_lifetime,
            now,
        );
        opts.insert(DhcpOption::IANA(ia_na_for(config, &session.address, iana.id, outcome)));
    }

    if let Some(iapd) = msg.ia_pd() {
        let outcome = session.prefix.refresh(
            iapd.id,
            config.prefix_preferred_lifetime,
            config.prefix_valid_lifetime,
            now,
        );
        opts.insert(DhcpOption::IAPD(ia_pd_for(config, &session.prefix, iapd.id, outcome)));
    }

    Ok(reply)
}

#[instrument(skip(config, session, msg),
fields(client_id = field::Empty, xid = ?msg.xid()))]
fn handle_renew(
    config: &Config,
    session: &mut ClientSession,
    msg: &Message,
    now: u64,
) -> Result<Message, NoResponseReason> {
    let client_id = tracked_client_id(session, msg)?;
    check_server_id(config, msg)?;
    session.transaction_id = Some(msg.xid());
    refresh_leases(config, session, msg, client_id, now)
}

/// Handle Rebind messages per RFC 8415 Section 18.4.5
///
/// Rebind is similar to Renew, but the client sends it to any available server
/// (not specifically to the server that originally assigned the lease).
#[instrument(skip(config, session, msg),
fields(client_id = field::Empty, xid = ?msg.xid()))]
fn handle_rebind(
    config: &Config,
    session: &mut ClientSession,
    msg: &Message,
    now: u64,
) -> Result<Message, NoResponseReason> {
    let client_id = tracked_client_id(session, msg)?;
    session.transaction_id = Some(msg.xid());
    refresh_leases(config, session, msg, client_id, now)
}

#[instrument(skip(config, session, msg),
fields(client_id = field::Empty, xid = ?msg.xid()))]
fn handle_release(
    config: &Config,
    session: &mut ClientSession,
    msg: &Message,
) -> Result<Message, NoResponseReason> {
    let client_id = tracked_client_id(session, msg)?;
    check_server_id(config, msg)?;
    session.transaction_id = Some(msg.xid());

    let mut reply = new_response(config, MessageType::Reply, msg, client_id);
    let opts = reply.opts_mut();

    if let Some(iana) = msg.ia_na() {
        let released = session.address.assigned;
        let outcome = session.address.release(iana.id);
        if outcome == LeaseOutcome::Released {
            info!(iaid = iana.id, address = ?released, "released address");
        }
        opts.insert(DhcpOption::IANA(ia_na_for(config, &session.address, iana.id, outcome)));
    }

    if let Some(iapd) = msg.ia_pd() {
        let released = session.prefix.assigned;
        let outcome = session.prefix.release(iapd.id);
        if outcome == LeaseOutcome::Released {
            info!(iaid = iapd.id, prefix = ?released, "released prefix");
        }
        opts.insert(DhcpOption::IAPD(ia_pd_for(config, &session.prefix, iapd.id, outcome)));
    }

    if msg.ia_na().is_none() && msg.ia_pd().is_none() {
        opts.insert(status_code(Status::Success));
    }

    if session.is_idle() {
        info!("all leases for client released");
        session.clear_leases();
    }

    Ok(reply)
}

/// Decide the response to `msg` and apply it to `session`.
///
/// `now` is the current unix time in seconds, lease lifetimes are counted from it.
pub fn handle_message(
    config: &Config,
    session: &mut ClientSession,
    msg: &Message,
    now: u64,
) -> DhcpV6Response {
    let result = match msg.msg_type() {
        // A client sends a Solicit message to locate servers.
        // https://datatracker.ietf.org/doc/html/rfc8415#section-16.2
        MessageType::Solicit => handle_solicit(config, session, msg),
        // https://datatracker.ietf.org/doc/html/rfc8415#section-16.4
        MessageType::Request => handle_request(config, session, msg, now),
        MessageType::Renew => handle_renew(config, session, msg, now),
        MessageType::Rebind => handle_rebind(config, session, msg, now),
        MessageType::Release => handle_release(config, session, msg),
        msg_type => {
            warn!(?msg_type, xid = ?msg.xid(), "unhandled DHCPv6 message type");
            Err(NoResponseReason::Discarded)
        }
    };

    match result {
        Ok(response) => DhcpV6Response::Message(response),
        Err(reason) => {
            debug!(reason = reason.as_str(), "not responding");
            DhcpV6Response::NoResponse(reason)
        }
    }
}
