//! Resource chunking and reassembly.
//!
//! A resource larger than the transport's message ceiling crosses the wire as
//! a sequence of [`ResourceChunk`]s. Each chunk names its resource, the total
//! payload size and its own offset, so the receiver can rebuild the payload
//! regardless of arrival order. There is no per-chunk acknowledgement:
//! reliability is the transport's job.
//!
//! ## Invariants
//!
//! - `offset + data.len() <= total_size` for every valid chunk.
//! - The chunks of one transfer, ordered by offset, cover `[0, total_size)`
//!   exactly once.
//! - An empty payload still produces exactly one zero-length chunk so the
//!   receiver learns the resource exists.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::{ParticipantId, ResourceContentHash};

/// A bounded slice of a resource payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceChunk {
    pub resource: ResourceContentHash,
    pub total_size: u64,
    pub offset: u64,
    pub data: Bytes,
}

impl ResourceChunk {
    /// Check `offset + len <= total_size`.
    pub fn validate(&self) -> Result<()> {
        let len = self.data.len() as u64;
        match self.offset.checked_add(len) {
            Some(end) if end <= self.total_size => Ok(()),
            _ => Err(CoreError::ChunkOutOfBounds {
                resource: self.resource,
                offset: self.offset,
                len,
                total: self.total_size,
            }),
        }
    }

    /// Whether this single chunk carries the whole payload.
    pub fn is_complete(&self) -> bool {
        self.offset == 0 && self.data.len() as u64 == self.total_size
    }
}

/// Split `payload` left to right into chunks of at most `max_chunk_bytes`.
///
/// Slices share the payload's buffer; no bytes are copied.
pub fn split(
    payload: &Bytes,
    resource: ResourceContentHash,
    max_chunk_bytes: usize,
) -> Result<Vec<ResourceChunk>> {
    if max_chunk_bytes == 0 {
        return Err(CoreError::InvalidChunkSize);
    }

    let total_size = payload.len() as u64;
    if payload.is_empty() {
        return Ok(vec![ResourceChunk {
            resource,
            total_size,
            offset: 0,
            data: Bytes::new(),
        }]);
    }

    let chunks = (0..payload.len())
        .step_by(max_chunk_bytes)
        .map(|start| {
            let end = (start + max_chunk_bytes).min(payload.len());
            ResourceChunk {
                resource,
                total_size,
                offset: start as u64,
                data: payload.slice(start..end),
            }
        })
        .collect();
    Ok(chunks)
}

/// Partially received payload from one sender.
#[derive(Debug)]
struct PendingReassembly {
    total_size: u64,
    /// Received slices keyed by offset. Never overlapping.
    received: BTreeMap<u64, Bytes>,
    received_bytes: u64,
    last_activity: Instant,
}

impl PendingReassembly {
    fn new(total_size: u64, now: Instant) -> Self {
        Self {
            total_size,
            received: BTreeMap::new(),
            received_bytes: 0,
            last_activity: now,
        }
    }

    /// Insert a validated chunk. Returns `Ok(false)` for an exact duplicate.
    fn insert(&mut self, chunk: ResourceChunk) -> Result<bool> {
        let offset = chunk.offset;
        let len = chunk.data.len() as u64;

        if let Some((&prev_offset, prev)) = self.received.range(..=offset).next_back() {
            if prev_offset == offset && prev.len() as u64 == len {
                return Ok(false);
            }
            if prev_offset + prev.len() as u64 > offset {
                return Err(CoreError::OverlappingChunk {
                    resource: chunk.resource,
                    offset,
                });
            }
        }
        if let Some((&next_offset, _)) = self
            .received
            .range((Bound::Excluded(offset), Bound::Unbounded))
            .next()
        {
            if next_offset < offset + len {
                return Err(CoreError::OverlappingChunk {
                    resource: chunk.resource,
                    offset,
                });
            }
        }

        self.received.insert(offset, chunk.data);
        self.received_bytes += len;
        Ok(true)
    }

    fn is_complete(&self) -> bool {
        self.received_bytes == self.total_size
    }

    fn assemble(self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.total_size as usize);
        for data in self.received.into_values() {
            buf.extend_from_slice(&data);
        }
        buf.freeze()
    }
}

/// Accumulates chunks per `(sender, resource)` until a payload is complete.
///
/// `ingest` never blocks. A protocol violation drops the affected stream and is
/// reported as an error; other streams are unaffected.
#[derive(Debug)]
pub struct Reassembler {
    pending: HashMap<(ParticipantId, ResourceContentHash), PendingReassembly>,
    max_total_bytes: u64,
}

impl Reassembler {
    /// Create a reassembler accepting declared payloads up to `max_total_bytes`.
    pub fn new(max_total_bytes: u64) -> Self {
        Self {
            pending: HashMap::new(),
            max_total_bytes,
        }
    }

    /// Feed one chunk from `sender`.
    ///
    /// Returns the full payload once every byte of `[0, total_size)` has been
    /// received, and `None` while the transfer is still incomplete or the
    /// chunk was a duplicate.
    pub fn ingest(&mut self, sender: ParticipantId, chunk: ResourceChunk) -> Result<Option<Bytes>> {
        let key = (sender, chunk.resource);

        if let Err(e) = self.check(&chunk) {
            self.pending.remove(&key);
            return Err(e);
        }

        if !self.pending.contains_key(&key) && chunk.is_complete() {
            return Ok(Some(chunk.data));
        }

        let now = Instant::now();
        let pending = self
            .pending
            .entry(key)
            .or_insert_with(|| PendingReassembly::new(chunk.total_size, now));

        if pending.total_size != chunk.total_size {
            let expected = pending.total_size;
            self.pending.remove(&key);
            return Err(CoreError::TotalSizeMismatch {
                resource: chunk.resource,
                expected,
                declared: chunk.total_size,
            });
        }

        pending.last_activity = now;
        if chunk.data.is_empty() {
            return Ok(None);
        }

        let offset = chunk.offset;
        match pending.insert(chunk) {
            Ok(true) => {}
            Ok(false) => {
                tracing::trace!(resource = %key.1, offset, "duplicate chunk absorbed");
                return Ok(None);
            }
            Err(e) => {
                self.pending.remove(&key);
                return Err(e);
            }
        }

        if !pending.is_complete() {
            tracing::trace!(
                resource = %key.1,
                received = pending.received_bytes,
                total = pending.total_size,
                "chunk buffered"
            );
            return Ok(None);
        }

        Ok(self.pending.remove(&key).map(PendingReassembly::assemble))
    }

    fn check(&self, chunk: &ResourceChunk) -> Result<()> {
        if chunk.total_size > self.max_total_bytes {
            return Err(CoreError::PayloadTooLarge {
                resource: chunk.resource,
                declared: chunk.total_size,
                limit: self.max_total_bytes,
            });
        }
        chunk.validate()
    }

    /// Drop every partial transfer from `sender`. Returns how many were dropped.
    pub fn discard_sender(&mut self, sender: &ParticipantId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|(from, _), _| from != sender);
        before - self.pending.len()
    }

    /// Drop transfers that have seen no chunk for longer than `timeout`.
    pub fn evict_idle(&mut self, now: Instant, timeout: Duration) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|_, p| now.saturating_duration_since(p.last_activity) <= timeout);
        before - self.pending.len()
    }

    /// Drop all partial transfers.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Number of incomplete transfers.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether a transfer of `resource` from `sender` is in progress.
    pub fn is_pending(&self, sender: &ParticipantId, resource: &ResourceContentHash) -> bool {
        self.pending.contains_key(&(*sender, *resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const LIMIT: u64 = 1 << 24;

    fn payload(len: usize) -> Bytes {
        (0..len).map(|i| (i * 31 % 251) as u8).collect::<Vec<_>>().into()
    }

    fn sender() -> ParticipantId {
        ParticipantId::from_u128(7)
    }

    #[test]
    fn test_small_payload_is_one_chunk() {
        let data = payload(100);
        let chunks = split(&data, ResourceContentHash::of(&data), 1000).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_complete());
    }

    #[test]
    fn test_empty_payload_is_one_empty_chunk() {
        let data = Bytes::new();
        let chunks = split(&data, ResourceContentHash::of(&data), 16).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].total_size, 0);
        assert!(chunks[0].data.is_empty());

        let mut r = Reassembler::new(LIMIT);
        let out = r.ingest(sender(), chunks[0].clone()).unwrap();
        assert_eq!(out, Some(Bytes::new()));
        assert_eq!(r.pending_count(), 0);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let data = payload(10);
        assert_eq!(
            split(&data, ResourceContentHash::ZERO, 0),
            Err(CoreError::InvalidChunkSize)
        );
    }

    #[test]
    fn test_multi_chunk_reverse_order_delivers_once() {
        let data = payload(2500);
        let hash = ResourceContentHash::of(&data);
        let chunks = split(&data, hash, 1000).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].data.len(), 500);

        let mut r = Reassembler::new(LIMIT);
        let mut delivered = Vec::new();
        for chunk in chunks.iter().rev().cloned() {
            if let Some(p) = r.ingest(sender(), chunk).unwrap() {
                delivered.push(p);
            }
        }
        assert_eq!(delivered, vec![data]);
        assert!(!r.is_pending(&sender(), &hash));
    }

    #[test]
    fn test_duplicate_chunk_absorbed() {
        let data = payload(300);
        let hash = ResourceContentHash::of(&data);
        let chunks = split(&data, hash, 100).unwrap();

        let mut r = Reassembler::new(LIMIT);
        assert_eq!(r.ingest(sender(), chunks[0].clone()).unwrap(), None);
        assert_eq!(r.ingest(sender(), chunks[0].clone()).unwrap(), None);
        assert_eq!(r.ingest(sender(), chunks[1].clone()).unwrap(), None);
        assert_eq!(r.ingest(sender(), chunks[2].clone()).unwrap(), Some(data));
    }

    #[test]
    fn test_total_size_mismatch_drops_stream() {
        let data = payload(300);
        let hash = ResourceContentHash::of(&data);
        let chunks = split(&data, hash, 100).unwrap();

        let mut r = Reassembler::new(LIMIT);
        r.ingest(sender(), chunks[0].clone()).unwrap();

        let mut bad = chunks[1].clone();
        bad.total_size = 400;
        let err = r.ingest(sender(), bad).unwrap_err();
        assert!(matches!(err, CoreError::TotalSizeMismatch { expected: 300, declared: 400, .. }));
        assert_eq!(r.pending_count(), 0);
    }

    #[test]
    fn test_out_of_bounds_chunk_rejected() {
        let chunk = ResourceChunk {
            resource: ResourceContentHash::ZERO,
            total_size: 10,
            offset: 8,
            data: Bytes::from_static(b"abcd"),
        };
        let mut r = Reassembler::new(LIMIT);
        assert!(matches!(
            r.ingest(sender(), chunk),
            Err(CoreError::ChunkOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_offset_overflow_rejected() {
        let chunk = ResourceChunk {
            resource: ResourceContentHash::ZERO,
            total_size: 10,
            offset: u64::MAX,
            data: Bytes::from_static(b"a"),
        };
        assert!(chunk.validate().is_err());
    }

    #[test]
    fn test_overlapping_chunk_drops_stream() {
        let hash = ResourceContentHash::ZERO;
        let mk = |offset: u64, len: usize| ResourceChunk {
            resource: hash,
            total_size: 100,
            offset,
            data: vec![1u8; len].into(),
        };

        let mut r = Reassembler::new(LIMIT);
        r.ingest(sender(), mk(0, 50)).unwrap();
        assert!(matches!(
            r.ingest(sender(), mk(40, 20)),
            Err(CoreError::OverlappingChunk { offset: 40, .. })
        ));
        assert_eq!(r.pending_count(), 0);

        r.ingest(sender(), mk(50, 50)).unwrap();
        assert!(matches!(
            r.ingest(sender(), mk(0, 60)),
            Err(CoreError::OverlappingChunk { offset: 0, .. })
        ));
    }

    #[test]
    fn test_oversized_declaration_rejected() {
        let chunk = ResourceChunk {
            resource: ResourceContentHash::ZERO,
            total_size: 1000,
            offset: 0,
            data: Bytes::from_static(b"x"),
        };
        let mut r = Reassembler::new(100);
        assert!(matches!(
            r.ingest(sender(), chunk),
            Err(CoreError::PayloadTooLarge { declared: 1000, limit: 100, .. })
        ));
        assert_eq!(r.pending_count(), 0);
    }

    #[test]
    fn test_senders_are_isolated() {
        let data = payload(200);
        let hash = ResourceContentHash::of(&data);
        let chunks = split(&data, hash, 100).unwrap();
        let a = ParticipantId::from_u128(1);
        let b = ParticipantId::from_u128(2);

        let mut r = Reassembler::new(LIMIT);
        r.ingest(a, chunks[0].clone()).unwrap();
        assert_eq!(r.ingest(b, chunks[1].clone()).unwrap(), None);
        assert_eq!(r.pending_count(), 2);

        assert_eq!(r.discard_sender(&a), 1);
        assert!(!r.is_pending(&a, &hash));
        assert!(r.is_pending(&b, &hash));
    }

    #[test]
    fn test_discarded_transfer_restarts_from_zero() {
        let data = payload(300);
        let hash = ResourceContentHash::of(&data);
        let chunks = split(&data, hash, 100).unwrap();

        let mut r = Reassembler::new(LIMIT);
        r.ingest(sender(), chunks[0].clone()).unwrap();
        r.ingest(sender(), chunks[1].clone()).unwrap();
        r.discard_sender(&sender());

        // Only the tail arrives after the restart: nothing may complete.
        assert_eq!(r.ingest(sender(), chunks[2].clone()).unwrap(), None);
        assert!(r.is_pending(&sender(), &hash));
    }

    #[test]
    fn test_evict_idle() {
        let data = payload(200);
        let chunks = split(&data, ResourceContentHash::of(&data), 100).unwrap();
        let mut r = Reassembler::new(LIMIT);
        r.ingest(sender(), chunks[0].clone()).unwrap();

        let timeout = Duration::from_secs(5);
        assert_eq!(r.evict_idle(Instant::now(), timeout), 0);
        assert_eq!(r.evict_idle(Instant::now() + timeout * 2, timeout), 1);
        assert_eq!(r.pending_count(), 0);
    }

    fn shuffled_chunks() -> impl Strategy<Value = (Bytes, usize, Vec<ResourceChunk>)> {
        (prop::collection::vec(any::<u8>(), 0..4096), 1usize..600).prop_flat_map(|(data, limit)| {
            let data = Bytes::from(data);
            let chunks = split(&data, ResourceContentHash::of(&data), limit).unwrap();
            (Just(data), Just(limit), Just(chunks).prop_shuffle())
        })
    }

    proptest! {
        #[test]
        fn prop_split_then_ingest_any_order((data, limit, chunks) in shuffled_chunks()) {
            let expected = if data.is_empty() { 1 } else { data.len().div_ceil(limit) };
            prop_assert_eq!(chunks.len(), expected);

            let mut r = Reassembler::new(LIMIT);
            let mut delivered = Vec::new();
            for chunk in chunks {
                if let Some(p) = r.ingest(sender(), chunk).unwrap() {
                    delivered.push(p);
                }
            }
            prop_assert_eq!(delivered, vec![data]);
            prop_assert_eq!(r.pending_count(), 0);
        }
    }
}
