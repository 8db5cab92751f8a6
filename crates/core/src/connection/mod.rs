//! STREAM connection state.
//!
//! A connection is identified by the destination address and the shared secret. The
//! pair fixes the AES-GCM key used by both ends, which is why the sequence numbers
//! issued on a connection must never repeat and why the connection closes for good
//! once [`MAX_SEQUENCE`] packets have been issued.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::crypto::SharedSecret;
use crate::packet::InterledgerAddress;
use crate::stream::Denomination;

mod registry;

pub use self::registry::ConnectionRegistry;

/// Highest sequence number a connection will ever issue (2^31).
///
/// Both ends encrypt with the same key, so 2^31 packets per side keeps the total
/// number of AES-GCM invocations under the 2^32 NIST limit.
pub const MAX_SEQUENCE: u64 = 1 << 31;

/// Set in the sequence word once the connection is closed. Keeping the flag and the
/// counter in one atomic makes closing linearizable with respect to `next_sequence`.
const CLOSED_FLAG: u64 = 1 << 63;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("connection {0} is closed")]
    Closed(ConnectionId),
    #[error("destination asset changed from {known} to {reported}")]
    DenominationConflict {
        known: Denomination,
        reported: Denomination,
    },
}

/// Deterministic key of a connection: BLAKE3 over the destination and a fingerprint of
/// the shared secret.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId([u8; 32]);

impl ConnectionId {
    pub fn derive(destination: &InterledgerAddress, secret: &SharedSecret) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(destination.as_bytes());
        hasher.update(&[0]);
        hasher.update(&secret.fingerprint());
        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({self})")
    }
}

/// Lifecycle of a connection. Transitions only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    Available,
    Open,
    Closed,
}

pub struct StreamConnection {
    id: ConnectionId,
    destination: InterledgerAddress,
    shared_secret: SharedSecret,
    created_at: DateTime<Utc>,
    /// Last issued sequence, or'ed with `CLOSED_FLAG` once closed.
    sequence: AtomicU64,
    opened: AtomicBool,
    destination_denomination: RwLock<Option<Denomination>>,
}

impl StreamConnection {
    pub fn new(destination: InterledgerAddress, shared_secret: SharedSecret) -> Self {
        Self::resume(destination, shared_secret, 0)
    }

    /// Restores a connection whose last issued sequence was persisted elsewhere, so
    /// that a restarted process never reissues a sequence number.
    pub fn resume(
        destination: InterledgerAddress,
        shared_secret: SharedSecret,
        last_sequence: u64,
    ) -> Self {
        let sequence = if last_sequence >= MAX_SEQUENCE {
            MAX_SEQUENCE | CLOSED_FLAG
        } else {
            last_sequence
        };
        Self {
            id: ConnectionId::derive(&destination, &shared_secret),
            destination,
            shared_secret,
            created_at: Utc::now(),
            sequence: AtomicU64::new(sequence),
            opened: AtomicBool::new(last_sequence > 0),
            destination_denomination: RwLock::new(None),
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn destination(&self) -> &InterledgerAddress {
        &self.destination
    }

    pub fn shared_secret(&self) -> &SharedSecret {
        &self.shared_secret
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Issues the next sequence number.
    ///
    /// The connection closes when the issued value reaches [`MAX_SEQUENCE`]; any call
    /// after that fails with [`ConnectionError::Closed`].
    pub fn next_sequence(&self) -> Result<u64, ConnectionError> {
        let updated = self
            .sequence
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current & CLOSED_FLAG != 0 || current >= MAX_SEQUENCE {
                    None
                } else {
                    Some(current + 1)
                }
            });
        match updated {
            Ok(previous) => {
                let sequence = previous + 1;
                if sequence >= MAX_SEQUENCE {
                    tracing::warn!(connection = %self.id, sequence, "sequence space exhausted, closing connection");
                    self.close();
                }
                Ok(sequence)
            }
            Err(_) => {
                self.close();
                Err(ConnectionError::Closed(self.id.clone()))
            }
        }
    }

    /// Sequence number most recently issued (0 if none).
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire) & !CLOSED_FLAG
    }

    /// Whether no further sequence can be issued.
    pub fn is_sequence_exhausted(&self) -> bool {
        let current = self.sequence.load(Ordering::Acquire);
        current & CLOSED_FLAG != 0 || current >= MAX_SEQUENCE
    }

    pub fn state(&self) -> ConnectionState {
        if self.sequence.load(Ordering::Acquire) & CLOSED_FLAG != 0 {
            ConnectionState::Closed
        } else if self.opened.load(Ordering::Acquire) {
            ConnectionState::Open
        } else {
            ConnectionState::Available
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    /// Advances `Available -> Open -> Closed`. No-op once closed.
    pub fn transition_state(&self) -> ConnectionState {
        match self.state() {
            ConnectionState::Available => {
                self.mark_open();
            }
            ConnectionState::Open => self.close(),
            ConnectionState::Closed => {}
        }
        self.state()
    }

    /// Marks an available connection as open. Does nothing in any other state.
    pub fn mark_open(&self) {
        if !self.opened.swap(true, Ordering::AcqRel) {
            tracing::debug!(connection = %self.id, destination = %self.destination, "connection opened");
        }
    }

    /// Closes the connection permanently.
    pub fn close(&self) {
        let previous = self.sequence.fetch_or(CLOSED_FLAG, Ordering::AcqRel);
        if previous & CLOSED_FLAG == 0 {
            tracing::debug!(connection = %self.id, last_sequence = previous, "connection closed");
        }
    }

    pub fn destination_denomination(&self) -> Option<Denomination> {
        self.destination_denomination.read().clone()
    }

    /// Records the asset the receiver reported; the first report wins.
    pub fn set_destination_denomination(
        &self,
        reported: Denomination,
    ) -> Result<(), ConnectionError> {
        let mut known = self.destination_denomination.write();
        match known.as_ref() {
            None => {
                tracing::debug!(connection = %self.id, denomination = %reported, "learnt destination asset");
                *known = Some(reported);
                Ok(())
            }
            Some(existing) if *existing == reported => Ok(()),
            Some(existing) => Err(ConnectionError::DenominationConflict {
                known: existing.clone(),
                reported,
            }),
        }
    }
}

impl PartialEq for StreamConnection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StreamConnection {}

impl Hash for StreamConnection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConnection")
            .field("id", &self.id)
            .field("destination", &self.destination)
            .field("state", &self.state())
            .field("last_sequence", &self.last_sequence())
            .finish()
    }
}
