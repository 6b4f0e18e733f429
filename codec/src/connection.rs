//! Per-connection codec state and the packet send/receive API.

use std::fmt;
use std::sync::Arc;

use dataio::{DataReader, DataWriter};
use schema::{registry_hash, Capabilities, Direction, NegotiatedCaps, PacketDef, PacketType, Registry, VariantId};
use tracing::{debug, error};
use wire::{encode_frame, FrameBuffer, HeaderLayout, Limits as WireLimits};

use crate::cache::CacheSet;
use crate::engine::{decode_message, encode_message, read_key, EncodeOutcome};
use crate::error::{CodecError, CodecResult, LimitKind};
use crate::limits::CodecLimits;
use crate::resolver::VariantResolver;
use crate::value::{Message, MessageKey};

/// Which end of the connection this codec runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    /// Returns `true` if this side may send packets of `direction`.
    #[must_use]
    pub const fn may_send(self, direction: Direction) -> bool {
        match self {
            Self::Client => direction.client_sends(),
            Self::Server => direction.server_sends(),
        }
    }

    /// Returns `true` if this side may receive packets of `direction`.
    #[must_use]
    pub const fn may_receive(self, direction: Direction) -> bool {
        match self {
            Self::Client => direction.server_sends(),
            Self::Server => direction.client_sends(),
        }
    }
}

/// Selects the sent or received cache set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheDirection {
    Sent,
    Received,
}

/// Connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub role: Role,
    pub local_caps: Capabilities,
    pub peer_caps: Capabilities,
    pub header: HeaderLayout,
    pub limits: CodecLimits,
    pub wire_limits: WireLimits,
}

impl ConnectionConfig {
    /// Config with default header layout and limits.
    #[must_use]
    pub fn new(role: Role, local_caps: Capabilities, peer_caps: Capabilities) -> Self {
        Self {
            role,
            local_caps,
            peer_caps,
            header: HeaderLayout::default(),
            limits: CodecLimits::default(),
            wire_limits: WireLimits::default(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, header: HeaderLayout) -> Self {
        self.header = header;
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: CodecLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn with_wire_limits(mut self, wire_limits: WireLimits) -> Self {
        self.wire_limits = wire_limits;
        self
    }
}

/// Application callbacks for packet types that request them.
///
/// Both methods default to doing nothing.
pub trait PacketHooks: Send {
    /// Called with the outgoing message before it is diffed.
    fn pre_send(&mut self, _packet_type: PacketType, _message: &mut Message) {}

    /// Called with the merged message before it is returned.
    fn post_receive(&mut self, _packet_type: PacketType, _message: &Message) {}
}

/// Result of [`Connection::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// A frame of `bytes` bytes was queued.
    Sent { bytes: usize },
    /// Nothing changed; nothing was queued.
    Unchanged,
}

/// A decoded inbound packet.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedPacket {
    pub packet_type: PacketType,
    pub message: Message,
}

/// Delta codec state of one connection.
///
/// Owns the sent and received caches, the variant choices and the framed
/// byte buffers in both directions. All operations take `&mut self`.
pub struct Connection {
    registry: Arc<Registry>,
    role: Role,
    caps: NegotiatedCaps,
    header: HeaderLayout,
    limits: CodecLimits,
    wire_limits: WireLimits,
    resolver: VariantResolver,
    sent: CacheSet,
    received: CacheSet,
    outbound: Vec<u8>,
    inbound: FrameBuffer,
    hooks: Option<Box<dyn PacketHooks>>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("role", &self.role)
            .field("caps", &self.caps)
            .field("header", &self.header)
            .field("sent_entries", &self.sent.entries())
            .field("received_entries", &self.received.entries())
            .field("outbound", &self.outbound.len())
            .field("inbound", &self.inbound.buffered())
            .finish_non_exhaustive()
    }
}

impl Connection {
    #[must_use]
    pub fn new(registry: Arc<Registry>, config: ConnectionConfig) -> Self {
        debug!(
            role = ?config.role,
            packets = registry.len(),
            registry_hash = registry_hash(&registry),
            "connection created"
        );
        Self {
            registry,
            role: config.role,
            caps: NegotiatedCaps::new(config.local_caps, config.peer_caps),
            header: config.header,
            limits: config.limits,
            inbound: FrameBuffer::new(config.header, config.wire_limits.clone()),
            wire_limits: config.wire_limits,
            resolver: VariantResolver::new(),
            sent: CacheSet::new(),
            received: CacheSet::new(),
            outbound: Vec::new(),
            hooks: None,
        }
    }

    /// Installs application hooks, replacing any previous ones.
    pub fn set_hooks(&mut self, hooks: Box<dyn PacketHooks>) {
        self.hooks = Some(hooks);
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[must_use]
    pub const fn caps(&self) -> &NegotiatedCaps {
        &self.caps
    }

    /// Replaces the peer capabilities. Variants already chosen stay in use.
    pub fn set_peer_caps(&mut self, peer: Capabilities) {
        self.caps.peer = peer;
    }

    /// Variant in use for `packet_type`, once resolved.
    #[must_use]
    pub fn resolved_variant(&self, packet_type: PacketType) -> Option<VariantId> {
        self.resolver.resolved(packet_type)
    }

    #[must_use]
    pub const fn cache(&self, direction: CacheDirection) -> &CacheSet {
        match direction {
            CacheDirection::Sent => &self.sent,
            CacheDirection::Received => &self.received,
        }
    }

    /// Encodes `message` and queues its frame in the outbound buffer.
    ///
    /// Delta packets whose fields all match the last sent value are
    /// suppressed unless the packet type forces full sends.
    pub fn send(&mut self, packet_type: PacketType, mut message: Message) -> CodecResult<SendOutcome> {
        let registry = Arc::clone(&self.registry);
        let def = lookup(&registry, packet_type)?;
        if !self.role.may_send(def.direction) {
            error!(
                packet = %packet_type,
                name = %def.name,
                role = ?self.role,
                "sending packet in the wrong direction"
            );
        }
        let variant = self.resolver.resolve(def, &self.caps)?;

        if def.hooks.pre_send {
            if let Some(hooks) = self.hooks.as_mut() {
                hooks.pre_send(packet_type, &mut message);
            }
        }

        let key = MessageKey::from_message(def, &message)?;
        let old = if def.is_delta() {
            self.sent.lookup(packet_type, &key)
        } else {
            None
        };

        let mut body = DataWriter::new();
        let outcome = encode_message(def, variant, old, &message, &self.limits, &mut body)?;
        let EncodeOutcome::Written { bytes, fields } = outcome else {
            debug!(packet = %packet_type, name = %def.name, %key, "unchanged, not sent");
            return Ok(SendOutcome::Unchanged);
        };
        if bytes > self.limits.max_body_bytes {
            return Err(CodecError::LimitsExceeded {
                kind: LimitKind::BodyBytes,
                limit: self.limits.max_body_bytes,
                actual: bytes,
            });
        }

        let framed = encode_frame(
            self.header,
            packet_type.raw(),
            body.as_slice(),
            &self.wire_limits,
            &mut self.outbound,
        )?;

        for &cancelled in &def.cancels {
            self.sent.remove(cancelled, &key);
        }
        if def.is_delta() {
            self.sent.cache_mut(packet_type).insert(key.clone(), message);
        }

        debug!(
            packet = %packet_type,
            name = %def.name,
            %key,
            variant = variant.id,
            fields,
            bytes = framed,
            "sent packet"
        );
        Ok(SendOutcome::Sent { bytes: framed })
    }

    /// Drains the framed bytes queued for the transport.
    pub fn take_outbound(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbound)
    }

    /// Number of framed bytes waiting in the outbound buffer.
    #[must_use]
    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    /// Buffers bytes read from the transport.
    pub fn receive_bytes(&mut self, bytes: &[u8]) -> CodecResult<()> {
        self.inbound.push(bytes)?;
        Ok(())
    }

    /// Decodes the next complete inbound frame.
    ///
    /// Frames of unknown packet types are logged and skipped. A malformed
    /// frame header is an error and leaves the inbound buffer untouched;
    /// [`reset`](Self::reset) discards it.
    pub fn poll_packet(&mut self) -> CodecResult<Option<ReceivedPacket>> {
        while let Some(frame) = self.inbound.next_frame()? {
            let packet_type = PacketType::new(frame.packet_type);
            if self.registry.get(packet_type).is_none() {
                error!(packet = %packet_type, bytes = frame.body.len(), "discarding frame of unknown packet type");
                continue;
            }
            let message = self.receive(packet_type, &frame.body)?;
            return Ok(Some(ReceivedPacket {
                packet_type,
                message,
            }));
        }
        Ok(None)
    }

    /// Decodes one packet body of a known type.
    ///
    /// The cached value for the decoded key is taken out before decoding; if
    /// decoding fails it stays removed.
    pub fn receive(&mut self, packet_type: PacketType, body: &[u8]) -> CodecResult<Message> {
        let registry = Arc::clone(&self.registry);
        let def = lookup(&registry, packet_type)?;
        if body.len() > self.limits.max_body_bytes {
            return Err(CodecError::LimitsExceeded {
                kind: LimitKind::BodyBytes,
                limit: self.limits.max_body_bytes,
                actual: body.len(),
            });
        }
        if !self.role.may_receive(def.direction) {
            error!(
                packet = %packet_type,
                name = %def.name,
                role = ?self.role,
                "received packet in the wrong direction"
            );
        }
        let variant = self.resolver.resolve(def, &self.caps)?;

        let mut reader = DataReader::new(body);
        let keys = read_key(def, variant, &mut reader, &self.limits)?;
        let key = keys.key();
        let old = if def.is_delta() {
            self.received.cache_mut(packet_type).take(&key)
        } else {
            None
        };
        let message = decode_message(def, variant, keys, old, &mut reader, &self.limits)?;
        if !reader.is_empty() {
            return Err(CodecError::TrailingBytes {
                packet_type,
                remaining: reader.remaining(),
            });
        }

        for &cancelled in &def.cancels {
            self.received.remove(cancelled, &key);
        }
        if def.is_delta() {
            self.received
                .cache_mut(packet_type)
                .insert(key.clone(), message.clone());
        }

        if def.hooks.post_receive {
            if let Some(hooks) = self.hooks.as_mut() {
                hooks.post_receive(packet_type, &message);
            }
        }

        debug!(
            packet = %packet_type,
            name = %def.name,
            %key,
            variant = variant.id,
            bytes = body.len(),
            "received packet"
        );
        Ok(message)
    }

    /// Drops one cached entry. Returns `true` if it existed.
    pub fn invalidate(&mut self, direction: CacheDirection, packet_type: PacketType, key: &MessageKey) -> bool {
        let caches = match direction {
            CacheDirection::Sent => &mut self.sent,
            CacheDirection::Received => &mut self.received,
        };
        caches.remove(packet_type, key).is_some()
    }

    /// Returns the connection to its initial state: caches, variant choices
    /// and buffered bytes are discarded.
    pub fn reset(&mut self) {
        debug!(
            sent = self.sent.entries(),
            received = self.received.entries(),
            "resetting connection state"
        );
        self.sent.clear();
        self.received.clear();
        self.resolver.reset();
        self.outbound.clear();
        self.inbound.clear();
    }
}

fn lookup(registry: &Registry, packet_type: PacketType) -> CodecResult<&PacketDef> {
    registry
        .get(packet_type)
        .ok_or(CodecError::UnknownPacket { packet_type })
}
