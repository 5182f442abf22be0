//! End-to-end handshake tests through the public API only.
//!
//! A toy TLS engine stands in for a real TLS 1.3 stack: it speaks a tiny
//! length-prefixed message protocol over the CRYPTO streams and releases
//! fixed secrets at the points a real engine would, so a client and a
//! server `Handshake` can be driven against each other in memory.

extern crate std;

use std::collections::VecDeque;
use std::vec;
use std::vec::Vec;

use milli_quic_tls::connection::{Direction, HandshakeConfig, HandshakeHooks, NumberSpace};
use milli_quic_tls::error::{Error, TransportError};
use milli_quic_tls::tls::transport_params::ConnectionIdBytes;
use milli_quic_tls::tls::{CipherSuite, TransportParams};
use milli_quic_tls::{EncryptionLevel, Handshake, HandshakeEvent, Role, TlsSession};

// =========================================================================
// Toy engine
// =========================================================================

const CLIENT_HELLO: u8 = 1;
const SERVER_HELLO: u8 = 2;
const SERVER_FINISHED: u8 = 3;
const CLIENT_FINISHED: u8 = 4;
const NEW_SESSION_TICKET: u8 = 5;

const HS: CipherSuite = CipherSuite::TlsAes128GcmSha256;
const APP: CipherSuite = CipherSuite::TlsAes256GcmSha384;

const CLIENT_HS_SECRET: [u8; 32] = [0x11; 32];
const SERVER_HS_SECRET: [u8; 32] = [0x22; 32];
const CLIENT_APP_SECRET: [u8; 48] = [0x33; 48];
const SERVER_APP_SECRET: [u8; 48] = [0x44; 48];

const DCID: [u8; 8] = [0x83, 0x94, 0xc8, 0xf0, 0x3e, 0x51, 0x57, 0x08];

enum Step {
    Read(EncryptionLevel, CipherSuite, Vec<u8>),
    Write(EncryptionLevel, CipherSuite, Vec<u8>),
    Data(EncryptionLevel, Vec<u8>),
    Done,
    Params(Vec<u8>),
}

fn message(kind: u8, payload: &[u8]) -> Vec<u8> {
    let mut m = vec![kind];
    m.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    m.extend_from_slice(payload);
    m
}

fn level_index(level: EncryptionLevel) -> usize {
    match level {
        EncryptionLevel::Initial => 0,
        EncryptionLevel::EarlyData => 1,
        EncryptionLevel::Handshake => 2,
        EncryptionLevel::Application => 3,
    }
}

#[derive(Default)]
struct ToyTls {
    role: Option<Role>,
    local_params: Vec<u8>,
    inbox: [Vec<u8>; 4],
    queue: VecDeque<Step>,
    current: Option<Step>,
    fed: Vec<(EncryptionLevel, Vec<u8>)>,
    tickets_sent: usize,
    tickets_received: usize,
}

impl ToyTls {
    fn inject(&mut self, steps: Vec<Step>) {
        self.queue.extend(steps);
    }

    fn handle(&mut self, level: EncryptionLevel, kind: u8, payload: Vec<u8>) -> Result<(), Error> {
        use milli_quic_tls::EncryptionLevel as L;
        let steps = match (self.role, level, kind) {
            (Some(Role::Server), L::Initial, CLIENT_HELLO) => vec![
                Step::Params(payload),
                Step::Data(L::Initial, message(SERVER_HELLO, &[])),
                Step::Write(L::Handshake, HS, SERVER_HS_SECRET.to_vec()),
                Step::Read(L::Handshake, HS, CLIENT_HS_SECRET.to_vec()),
                Step::Data(L::Handshake, message(SERVER_FINISHED, &self.local_params)),
                Step::Write(L::Application, APP, SERVER_APP_SECRET.to_vec()),
            ],
            (Some(Role::Server), L::Handshake, CLIENT_FINISHED) => vec![
                Step::Read(L::Application, APP, CLIENT_APP_SECRET.to_vec()),
                Step::Done,
            ],
            (Some(Role::Client), L::Initial, SERVER_HELLO) => vec![
                Step::Read(L::Handshake, HS, SERVER_HS_SECRET.to_vec()),
                Step::Write(L::Handshake, HS, CLIENT_HS_SECRET.to_vec()),
            ],
            (Some(Role::Client), L::Handshake, SERVER_FINISHED) => vec![
                Step::Params(payload),
                Step::Data(L::Handshake, message(CLIENT_FINISHED, &[])),
                Step::Write(L::Application, APP, CLIENT_APP_SECRET.to_vec()),
                Step::Read(L::Application, APP, SERVER_APP_SECRET.to_vec()),
                Step::Done,
            ],
            (Some(Role::Client), L::Application, NEW_SESSION_TICKET) => {
                self.tickets_received += 1;
                vec![]
            }
            _ => return Err(Error::Tls),
        };
        self.queue.extend(steps);
        Ok(())
    }
}

impl TlsSession for ToyTls {
    fn start(&mut self, role: Role) -> Result<(), Error> {
        if self.role.is_some() {
            return Err(Error::Tls);
        }
        self.role = Some(role);
        if role == Role::Client {
            let hello = message(CLIENT_HELLO, &self.local_params);
            self.queue.push_back(Step::Data(EncryptionLevel::Initial, hello));
        }
        Ok(())
    }

    fn next_event(&mut self) -> HandshakeEvent<'_> {
        self.current = self.queue.pop_front();
        match &self.current {
            None => HandshakeEvent::NoEvent,
            Some(Step::Read(level, suite, secret)) => HandshakeEvent::SetReadSecret {
                level: *level,
                suite: *suite,
                secret,
            },
            Some(Step::Write(level, suite, secret)) => HandshakeEvent::SetWriteSecret {
                level: *level,
                suite: *suite,
                secret,
            },
            Some(Step::Data(level, data)) => HandshakeEvent::WriteData {
                level: *level,
                data,
            },
            Some(Step::Done) => HandshakeEvent::HandshakeDone,
            Some(Step::Params(data)) => HandshakeEvent::TransportParameters(data),
        }
    }

    fn feed(&mut self, level: EncryptionLevel, data: &[u8]) -> Result<(), Error> {
        self.fed.push((level, data.to_vec()));
        let idx = level_index(level);
        self.inbox[idx].extend_from_slice(data);
        loop {
            let inbox = &self.inbox[idx];
            if inbox.len() < 3 {
                return Ok(());
            }
            let len = u16::from_be_bytes([inbox[1], inbox[2]]) as usize;
            if inbox.len() < 3 + len {
                return Ok(());
            }
            let kind = inbox[0];
            let payload = inbox[3..3 + len].to_vec();
            self.inbox[idx].drain(..3 + len);
            self.handle(level, kind, payload)?;
        }
    }

    fn set_transport_parameters(&mut self, data: &[u8]) {
        self.local_params = data.to_vec();
    }

    fn send_session_ticket(&mut self, allow_early_data: bool) -> Result<(), Error> {
        self.tickets_sent += 1;
        let ticket = message(NEW_SESSION_TICKET, &[allow_early_data as u8]);
        self.queue
            .push_back(Step::Data(EncryptionLevel::Application, ticket));
        Ok(())
    }
}

// =========================================================================
// Connection stand-in
// =========================================================================

#[derive(Default)]
struct Conn {
    confirmed: Vec<u64>,
    peer_params: Vec<TransportParams>,
    events: usize,
}

impl HandshakeHooks for Conn {
    fn confirm_handshake(&mut self, now: u64) {
        self.confirmed.push(now);
    }

    fn receive_transport_parameters(&mut self, params: TransportParams) {
        self.peer_params.push(params);
    }

    fn on_tls_event(&mut self, _event: &HandshakeEvent<'_>) {
        self.events += 1;
    }
}

type Endpoint = Handshake<ToyTls, Conn>;

fn endpoint(config: HandshakeConfig) -> Endpoint {
    Handshake::new(config, ToyTls::default(), Conn::default())
}

fn client_params() -> TransportParams {
    TransportParams {
        initial_max_data: 5000,
        ..TransportParams::default_params()
    }
}

fn server_params() -> TransportParams {
    let mut params = TransportParams {
        stateless_reset_token: Some([0x5a; 16]),
        ..TransportParams::default_params()
    };
    params.original_destination_connection_id = Some(ConnectionIdBytes::from_slice(&DCID).unwrap());
    params
}

/// Move all pending CRYPTO bytes from one endpoint to the other, in
/// `chunk`-sized frames delivered last-to-first.
fn transfer(from: &mut Endpoint, to: &mut Endpoint, now: u64, chunk: usize) -> Result<(), Error> {
    for space in NumberSpace::ALL {
        let (offset, bytes) = {
            let (offset, bytes) = from.crypto_stream(space).outbound.pending();
            (offset, bytes.to_vec())
        };
        if bytes.is_empty() {
            continue;
        }
        from.crypto_stream_mut(space).outbound.mark_sent(bytes.len());

        let frames: Vec<(u64, &[u8])> = bytes
            .chunks(chunk)
            .enumerate()
            .map(|(i, c)| (offset + (i * chunk) as u64, c))
            .collect();
        for (off, data) in frames.into_iter().rev() {
            to.deliver_inbound(now, space, off, data)?;
        }
    }
    Ok(())
}

fn assert_keys_mirrored(client: &Endpoint, server: &Endpoint, space: NumberSpace) {
    let c = client.keys();
    let s = server.keys();
    assert!(c.lookup(space, Direction::Write).is_some(), "{space:?}");
    assert_eq!(c.lookup(space, Direction::Write), s.lookup(space, Direction::Read));
    assert_eq!(c.lookup(space, Direction::Read), s.lookup(space, Direction::Write));
}

fn run_handshake(chunk: usize) -> (Endpoint, Endpoint) {
    let mut client = endpoint(HandshakeConfig::client());
    let mut server = endpoint(HandshakeConfig::server());

    client.start_handshake(0, &DCID, &client_params()).unwrap();
    server.start_handshake(0, &DCID, &server_params()).unwrap();

    transfer(&mut client, &mut server, 10, chunk).unwrap();
    transfer(&mut server, &mut client, 20, chunk).unwrap();
    transfer(&mut client, &mut server, 30, chunk).unwrap();
    transfer(&mut server, &mut client, 40, chunk).unwrap();
    (client, server)
}

// =========================================================================
// Tests
// =========================================================================

#[test]
fn full_handshake_installs_mirrored_keys() {
    let (client, server) = run_handshake(1000);

    for space in NumberSpace::ALL {
        assert_keys_mirrored(&client, &server, space);
    }
    let app = client
        .keys()
        .lookup(NumberSpace::AppData, Direction::Write)
        .unwrap();
    assert_eq!(app.suite(), APP);
    assert_eq!(app.key().len(), 32);
}

#[test]
fn full_handshake_exchanges_params_and_confirms_server() {
    let (client, server) = run_handshake(1000);

    assert_eq!(client.hooks().peer_params, [server_params()]);
    assert_eq!(server.hooks().peer_params, [client_params()]);

    assert!(client.is_complete());
    assert!(server.is_complete());
    // only the server confirms on TLS completion
    assert_eq!(client.confirmed_at(), None);
    assert_eq!(server.confirmed_at(), Some(30));
    assert_eq!(server.hooks().confirmed, [30]);

    assert_eq!(server.tls().tickets_sent, 1);
    assert_eq!(client.tls().tickets_received, 1);
    for space in NumberSpace::ALL {
        assert!(!client.crypto_stream(space).outbound.has_pending());
        assert!(!server.crypto_stream(space).outbound.has_pending());
    }
}

#[test]
fn reordered_small_frames_feed_engine_in_order() {
    let (client, server) = run_handshake(3);
    let (whole_client, whole_server) = run_handshake(1000);

    let concat = |fed: &[(EncryptionLevel, Vec<u8>)], level| -> Vec<u8> {
        fed.iter()
            .filter(|(l, _)| *l == level)
            .flat_map(|(_, b)| b.iter().copied())
            .collect()
    };
    for level in [
        EncryptionLevel::Initial,
        EncryptionLevel::Handshake,
        EncryptionLevel::Application,
    ] {
        assert_eq!(
            concat(&server.tls().fed, level),
            concat(&whole_server.tls().fed, level)
        );
        assert_eq!(
            concat(&client.tls().fed, level),
            concat(&whole_client.tls().fed, level)
        );
    }
    for space in NumberSpace::ALL {
        assert_keys_mirrored(&client, &server, space);
    }
}

#[test]
fn retransmitted_flight_is_ignored() {
    let mut client = endpoint(HandshakeConfig::client());
    let mut server = endpoint(HandshakeConfig::server());
    client.start_handshake(0, &DCID, &client_params()).unwrap();
    server.start_handshake(0, &DCID, &server_params()).unwrap();

    let (_, hello) = client
        .crypto_stream(NumberSpace::Initial)
        .outbound
        .pending();
    let hello = hello.to_vec();
    server
        .deliver_inbound(1, NumberSpace::Initial, 0, &hello)
        .unwrap();
    server
        .deliver_inbound(2, NumberSpace::Initial, 0, &hello)
        .unwrap();

    assert_eq!(server.tls().fed.len(), 1);
    assert_eq!(server.hooks().peer_params.len(), 1);
}

#[test]
fn tampered_retransmission_is_protocol_violation() {
    let mut server = endpoint(HandshakeConfig::server());
    server.start_handshake(0, &DCID, &server_params()).unwrap();

    let hello = message(CLIENT_HELLO, b"params?");
    // only the header arrives, so the engine sees nothing it can act on
    server
        .deliver_inbound(1, NumberSpace::Initial, 0, &hello[..2])
        .unwrap();
    let mut forged = hello.clone();
    forged[1] ^= 0xff;
    assert_eq!(
        server.deliver_inbound(2, NumberSpace::Initial, 0, &forged),
        Err(Error::Transport(TransportError::ProtocolViolation))
    );
}

#[test]
fn responder_event_sequence() {
    let mut server = endpoint(HandshakeConfig::server());
    server.start_handshake(0, &DCID, &server_params()).unwrap();
    let events_before = server.hooks().events;

    server.tls_mut().inject(vec![
        Step::Write(EncryptionLevel::Handshake, HS, SERVER_HS_SECRET.to_vec()),
        Step::Data(EncryptionLevel::Handshake, b"b1".to_vec()),
        Step::Read(EncryptionLevel::Application, APP, CLIENT_APP_SECRET.to_vec()),
        Step::Write(EncryptionLevel::Application, APP, SERVER_APP_SECRET.to_vec()),
        Step::Done,
    ]);
    server.drain_events(77).unwrap();

    let keys = server.keys();
    assert!(keys.lookup(NumberSpace::Handshake, Direction::Write).is_some());
    assert!(keys.lookup(NumberSpace::Handshake, Direction::Read).is_none());
    assert!(keys.has_keys(NumberSpace::AppData));
    assert_eq!(
        server.crypto_stream(NumberSpace::Handshake).outbound.pending(),
        (0, &b"b1"[..])
    );
    assert_eq!(server.confirmed_at(), Some(77));
    assert_eq!(server.tls().tickets_sent, 1);
    // five events, then the ticket's WriteData, then NoEvent
    assert_eq!(server.hooks().events - events_before, 7);
}

#[test]
fn responder_without_tickets() {
    let mut server = endpoint(HandshakeConfig::server().with_session_tickets(false));
    server.start_handshake(0, &DCID, &server_params()).unwrap();
    server.tls_mut().inject(vec![Step::Done, Step::Done]);
    server.drain_events(5).unwrap();

    assert_eq!(server.hooks().confirmed, [5]);
    assert_eq!(server.tls().tickets_sent, 0);
    assert!(!server
        .crypto_stream(NumberSpace::AppData)
        .outbound
        .has_pending());
}

#[test]
fn unknown_level_stops_drain_and_keeps_prior_effects() {
    let mut client = endpoint(HandshakeConfig::client());
    client.start_handshake(0, &DCID, &client_params()).unwrap();

    client.tls_mut().inject(vec![
        Step::Read(EncryptionLevel::Handshake, HS, SERVER_HS_SECRET.to_vec()),
        Step::Write(EncryptionLevel::EarlyData, HS, CLIENT_HS_SECRET.to_vec()),
        Step::Write(EncryptionLevel::Handshake, HS, CLIENT_HS_SECRET.to_vec()),
    ]);
    let err = client.drain_events(1).unwrap_err();
    assert_eq!(err, Error::Transport(TransportError::InternalError));
    assert!(err.is_protocol());

    let keys = client.keys();
    assert!(keys.lookup(NumberSpace::Handshake, Direction::Read).is_some());
    // the event after the failure was never processed
    assert!(keys.lookup(NumberSpace::Handshake, Direction::Write).is_none());
    assert!(keys.lookup(NumberSpace::AppData, Direction::Write).is_none());
}

#[test]
fn engine_rejecting_data_surfaces_error() {
    let mut client = endpoint(HandshakeConfig::client());
    client.start_handshake(0, &DCID, &client_params()).unwrap();
    // a ClientHello sent to a client is unexpected
    let bogus = message(CLIENT_HELLO, &[]);
    assert_eq!(
        client.deliver_inbound(1, NumberSpace::Initial, 0, &bogus),
        Err(Error::Tls)
    );
}

#[test]
fn initial_protection_round_trips_between_roles() {
    let mut client = endpoint(HandshakeConfig::client());
    let mut server = endpoint(HandshakeConfig::server());
    client.start_handshake(0, &DCID, &client_params()).unwrap();
    server.start_handshake(0, &DCID, &server_params()).unwrap();

    let seal = client
        .keys()
        .lookup(NumberSpace::Initial, Direction::Write)
        .unwrap()
        .protection()
        .unwrap();
    let open = server
        .keys()
        .lookup(NumberSpace::Initial, Direction::Read)
        .unwrap()
        .protection()
        .unwrap();

    let mut buf = [0u8; 64];
    buf[..5].copy_from_slice(b"hello");
    let ct = seal.seal_in_place(0, b"header", &mut buf, 5).unwrap();
    let pt = open.open_in_place(0, b"header", &mut buf, ct).unwrap();
    assert_eq!(&buf[..pt], b"hello");

    let sample = [0x42u8; 16];
    assert_eq!(seal.header_mask(&sample), open.header_mask(&sample));
}
