//! Driving a TLS 1.3 engine through the QUIC handshake (RFC 9001 §4).
//!
//! [`Handshake`] owns the engine, the key slots and the per-space CRYPTO
//! streams. Every call that can make the engine progress ends by draining
//! its events until it reports [`HandshakeEvent::NoEvent`]:
//!
//! - secrets become packet keys in the matching (space, direction) slot
//! - handshake bytes are queued on the space's outbound CRYPTO stream
//! - the peer's transport parameters are decoded and passed to the hooks
//! - on the server, completion confirms the handshake

use log::{debug, trace, warn};

use crate::connection::crypto_stream::DEFAULT_CRYPTO_BUF;
use crate::connection::{CryptoStream, Direction, HandshakeConfig, KeyStore, NumberSpace};
use crate::error::Error;
use crate::tls::{HandshakeEvent, Role, TlsSession, TransportParams};
use crate::Instant;

/// Room for our own encoded transport parameters.
const MAX_TRANSPORT_PARAMS_LEN: usize = 256;

/// What the owning connection does with handshake outcomes.
pub trait HandshakeHooks {
    /// The handshake is confirmed (server: when TLS completes). Called once.
    fn confirm_handshake(&mut self, now: Instant);

    /// The peer's transport parameters arrived and parsed.
    fn receive_transport_parameters(&mut self, params: TransportParams);

    /// Observe every engine event as it is drained, `NoEvent` included.
    fn on_tls_event(&mut self, _event: &HandshakeEvent<'_>) {}
}

/// TLS handshake state for one connection.
pub struct Handshake<T: TlsSession, H: HandshakeHooks, const CRYPTO_BUF: usize = DEFAULT_CRYPTO_BUF> {
    config: HandshakeConfig,
    tls: T,
    hooks: H,
    keys: KeyStore,
    streams: [CryptoStream<CRYPTO_BUF>; 3],
    started: bool,
    /// TLS reported HandshakeDone.
    complete: bool,
    confirmed: Option<Instant>,
}

impl<T: TlsSession, H: HandshakeHooks, const CRYPTO_BUF: usize> Handshake<T, H, CRYPTO_BUF> {
    pub fn new(config: HandshakeConfig, tls: T, hooks: H) -> Self {
        Self {
            config,
            tls,
            hooks,
            keys: KeyStore::new(),
            streams: [CryptoStream::new(), CryptoStream::new(), CryptoStream::new()],
            started: false,
            complete: false,
            confirmed: None,
        }
    }

    /// Install the Initial keys, hand our transport parameters to the
    /// engine, start it, and process whatever it produces (a client's
    /// ClientHello).
    ///
    /// `initial_dcid` is the Destination Connection ID of the client's
    /// first Initial packet.
    pub fn start_handshake(
        &mut self,
        now: Instant,
        initial_dcid: &[u8],
        params: &TransportParams,
    ) -> Result<(), Error> {
        if self.started {
            return Err(Error::InvalidState);
        }
        self.started = true;

        self.keys.install_initial(self.config.role, initial_dcid)?;

        let mut buf = [0u8; MAX_TRANSPORT_PARAMS_LEN];
        let len = params.encode(&mut buf)?;
        self.tls.set_transport_parameters(&buf[..len]);

        self.tls.start(self.config.role).map_err(|e| {
            warn!("TLS engine failed to start: {}", e);
            Error::Config
        })?;
        debug!("{:?} handshake started", self.config.role);

        self.drain_events(now)
    }

    /// Process engine events until it has nothing more to report.
    ///
    /// Stops at the first error; the connection must then be abandoned.
    pub fn drain_events(&mut self, now: Instant) -> Result<(), Error> {
        loop {
            let event = self.tls.next_event();
            self.hooks.on_tls_event(&event);

            match event {
                HandshakeEvent::NoEvent => return Ok(()),
                HandshakeEvent::SetReadSecret {
                    level,
                    suite,
                    secret,
                } => {
                    let space = NumberSpace::from_level(level)?;
                    self.keys.install(space, Direction::Read, suite, secret)?;
                }
                HandshakeEvent::SetWriteSecret {
                    level,
                    suite,
                    secret,
                } => {
                    let space = NumberSpace::from_level(level)?;
                    self.keys.install(space, Direction::Write, suite, secret)?;
                }
                HandshakeEvent::WriteData { level, data } => {
                    let space = NumberSpace::from_level(level)?;
                    self.streams[space.index()].outbound.write(data)?;
                    trace!("queued {} CRYPTO bytes in {:?}", data.len(), space);
                }
                HandshakeEvent::HandshakeDone => {
                    self.complete = true;
                    // RFC 9001 §4.1.2: the server's handshake is confirmed
                    // when it completes. A client waits for HANDSHAKE_DONE.
                    if self.config.role == Role::Server && self.confirmed.is_none() {
                        self.confirmed = Some(now);
                        debug!("handshake confirmed");
                        self.hooks.confirm_handshake(now);
                        if self.config.session_tickets {
                            self.tls.send_session_ticket(false)?;
                            debug!("session ticket issued");
                        }
                    }
                }
                HandshakeEvent::TransportParameters(data) => {
                    let params = TransportParams::decode(data).map_err(|e| {
                        warn!("malformed peer transport parameters");
                        e
                    })?;
                    debug!("peer transport parameters received");
                    self.hooks.receive_transport_parameters(params);
                }
            }
        }
    }

    /// Accept the payload of a CRYPTO frame received in `space`.
    ///
    /// The bytes are buffered; any newly contiguous data at the stream's
    /// read offset goes to the engine, then its events are drained.
    pub fn deliver_inbound(
        &mut self,
        now: Instant,
        space: NumberSpace,
        offset: u64,
        data: &[u8],
    ) -> Result<(), Error> {
        if !self.started {
            return Err(Error::InvalidState);
        }
        let level = space.level();
        let inbound = &mut self.streams[space.index()].inbound;
        inbound.insert(offset, data)?;

        let tls = &mut self.tls;
        let fed = inbound.deliver(|bytes| tls.feed(level, bytes))?;
        if fed > 0 {
            trace!("fed {} CRYPTO bytes at {:?}", fed, level);
        }

        self.drain_events(now)
    }

    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    pub fn role(&self) -> Role {
        self.config.role
    }

    /// Installed packet keys, for the packet protection layer.
    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    /// Drop a space's keys once it is no longer needed (RFC 9001 §4.9).
    pub fn discard_keys(&mut self, space: NumberSpace) {
        self.keys.discard(space);
    }

    pub fn crypto_stream(&self, space: NumberSpace) -> &CryptoStream<CRYPTO_BUF> {
        &self.streams[space.index()]
    }

    /// Mutable stream access, for the framer to take outbound bytes.
    pub fn crypto_stream_mut(&mut self, space: NumberSpace) -> &mut CryptoStream<CRYPTO_BUF> {
        &mut self.streams[space.index()]
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// TLS has reported the handshake complete.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// When the handshake was confirmed, if it has been.
    pub fn confirmed_at(&self) -> Option<Instant> {
        self.confirmed
    }

    pub fn tls(&self) -> &T {
        &self.tls
    }

    pub fn tls_mut(&mut self) -> &mut T {
        &mut self.tls
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }
}
