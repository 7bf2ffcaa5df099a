use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::buffer::{Endianness, RawBuffer};
use crate::error::{DecodeError, Result};
use crate::trailer::{ChunkId, ChunkRecord};

/// A chunk-capable node advertised by the external feature schema.
#[derive(Debug, Clone)]
pub struct ChunkNodeDesc {
    pub name: String,
    pub id: ChunkId,
}

/// The slice of the external feature tree this core consumes: which nodes
/// expect device chunk data, and under which wire ids.
pub trait ChunkSchema {
    fn chunk_nodes(&self) -> Vec<ChunkNodeDesc>;
}

/// Caching behavior for chunk byte windows bound to feature nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub enum CachePolicy {
    /// Serve every read from the attached buffer.
    Live,
    /// Materialize every bound window.
    Unlimited,
    /// Materialize windows of at most this many bytes; larger ones stay live.
    Limit(usize),
}

impl CachePolicy {
    fn admits(&self, length: usize) -> bool {
        match self {
            Self::Live => false,
            Self::Unlimited => true,
            Self::Limit(max) => length <= *max,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    offset: usize,
    length: usize,
}

struct BoundNode {
    name: String,
    window: Option<Window>,
    cached: Option<Bytes>,
}

/// Binds decoded chunk records to named feature nodes and serves their
/// byte-addressed reads.
///
/// At most one buffer is attached at a time; attaching another detaches the
/// previous one first. Operations are not internally synchronized - callers
/// serialize attach, reads and detach.
#[derive(Default)]
pub struct ChunkPortBinding {
    nodes: Vec<BoundNode>,
    numeric: HashMap<u64, usize>,
    patterns: Vec<(Vec<u8>, usize)>,
    buffer: Option<Bytes>,
}

impl ChunkPortBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans the schema for chunk-capable nodes and rebuilds the id map.
    ///
    /// Any attached buffer is fully detached first. A schema exposing no
    /// chunk-capable nodes yields an empty, valid binding.
    pub fn attach_schema(&mut self, schema: &dyn ChunkSchema) {
        self.detach_buffer();
        self.nodes.clear();
        self.numeric.clear();
        self.patterns.clear();

        for desc in schema.chunk_nodes() {
            let index = self.nodes.len();
            match &desc.id {
                ChunkId::Numeric(id) => {
                    self.numeric.insert(*id, index);
                }
                ChunkId::Bytes(pattern) => {
                    self.patterns.push((pattern.clone(), index));
                }
            }
            self.nodes.push(BoundNode {
                name: desc.name,
                window: None,
                cached: None,
            });
        }
        debug!("schema attached with {} chunk-capable nodes", self.nodes.len());
    }

    fn node_index(&self, id: &ChunkId) -> Option<usize> {
        match id {
            ChunkId::Numeric(id) => self.numeric.get(id).copied(),
            ChunkId::Bytes(bytes) => self
                .patterns
                .iter()
                .find(|(pattern, _)| pattern == bytes)
                .map(|&(_, index)| index),
        }
    }

    /// Looks up the node name bound to a wire chunk id.
    pub fn node_by_id(&self, id: &ChunkId) -> Option<&str> {
        self.node_index(id).map(|index| self.nodes[index].name.as_str())
    }

    /// Binds each matched record's byte window to its node.
    ///
    /// Records with no matching node are ignored so that newer devices can
    /// append chunks an older schema does not know. A record that violates
    /// the buffer extent is a programmer error: the decoders never emit one.
    pub fn attach_buffer(
        &mut self,
        buffer: &RawBuffer,
        records: &[ChunkRecord],
        policy: CachePolicy,
    ) -> Result<()> {
        self.detach_buffer();
        let data = buffer.data().clone();

        let mut matched = 0usize;
        for record in records {
            let Some(index) = self.node_index(&record.id) else {
                debug!("no node for chunk {}, ignoring", record.id);
                continue;
            };
            let in_bounds = record
                .offset
                .checked_add(record.length)
                .is_some_and(|end| end <= buffer.filled());
            if !in_bounds {
                self.detach_buffer();
                return Err(DecodeError::InvalidArgument(format!(
                    "record {} spans {}+{}, beyond filled size {}",
                    record.id,
                    record.offset,
                    record.length,
                    buffer.filled()
                )));
            }
            self.nodes[index].window = Some(Window {
                offset: record.offset,
                length: record.length,
            });
            matched += 1;
        }

        self.materialize(&data, policy);
        self.buffer = Some(data);
        debug!("attached buffer, {matched} of {} records bound", records.len());
        Ok(())
    }

    /// Copies admitted windows into one arena and hands each node a slice.
    fn materialize(&mut self, data: &Bytes, policy: CachePolicy) {
        let mut arena = BytesMut::new();
        let mut ranges: Vec<Option<(usize, usize)>> = vec![None; self.nodes.len()];

        for (index, node) in self.nodes.iter().enumerate() {
            let Some(window) = node.window else { continue };
            if !policy.admits(window.length) {
                continue;
            }
            let start = arena.len();
            arena.extend_from_slice(&data[window.offset..window.offset + window.length]);
            ranges[index] = Some((start, arena.len()));
        }

        let arena = arena.freeze();
        for (node, range) in self.nodes.iter_mut().zip(ranges) {
            node.cached = range.map(|(start, end)| arena.slice(start..end));
        }
    }

    /// Clears all windows and caches. Idempotent; reads fail with
    /// `AccessDenied` until the next attach.
    pub fn detach_buffer(&mut self) {
        self.buffer = None;
        for node in &mut self.nodes {
            node.window = None;
            node.cached = None;
        }
    }

    /// Drops materialized copies without detaching; reads fall back to the
    /// live window.
    pub fn clear_caches(&mut self) {
        for node in &mut self.nodes {
            node.cached = None;
        }
    }

    pub fn is_attached(&self) -> bool {
        self.buffer.is_some()
    }

    fn node_by_name(&self, name: &str) -> Result<&BoundNode> {
        self.nodes
            .iter()
            .find(|node| node.name == name)
            .ok_or_else(|| {
                DecodeError::InvalidArgument(format!("no chunk-capable node named {name}"))
            })
    }

    /// Serves `length` bytes at `address` within the node's chunk window.
    pub fn read(&self, name: &str, address: u64, length: usize) -> Result<Bytes> {
        let node = self.node_by_name(name)?;
        let (Some(buffer), Some(window)) = (&self.buffer, node.window) else {
            return Err(DecodeError::AccessDenied(format!(
                "read from {name} while no buffer is attached"
            )));
        };

        let start = address as usize;
        let end = start.checked_add(length).filter(|&end| end <= window.length);
        let Some(end) = end else {
            return Err(DecodeError::OutOfBounds {
                offset: address + length as u64,
                max: window.length as u64,
            });
        };

        match &node.cached {
            Some(cached) => Ok(cached.slice(start..end)),
            None => Ok(buffer.slice(window.offset + start..window.offset + end)),
        }
    }

    /// Length of the chunk window bound to a node, if any.
    pub fn window_len(&self, name: &str) -> Result<Option<usize>> {
        Ok(self.node_by_name(name)?.window.map(|window| window.length))
    }

    /// Decodes a node's whole 4- or 8-byte window as an unsigned integer.
    pub fn chunk_value_u64(&self, name: &str, endianness: Endianness) -> Result<u64> {
        let node = self.node_by_name(name)?;
        let Some(window) = node.window else {
            return Err(DecodeError::AccessDenied(format!(
                "no chunk window bound to {name}"
            )));
        };
        let bytes = self.read(name, 0, window.length)?;

        match (bytes.len(), endianness) {
            (4, Endianness::Big) => {
                Ok(u64::from(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])))
            }
            (4, Endianness::Little) => {
                Ok(u64::from(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])))
            }
            (8, Endianness::Big) => Ok(u64::from_be_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ])),
            (8, Endianness::Little) => Ok(u64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ])),
            (len, _) => Err(DecodeError::InvalidArgument(format!(
                "chunk window of {name} is {len} bytes, not an integer"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PayloadType;

    struct FixedSchema(Vec<ChunkNodeDesc>);

    impl ChunkSchema for FixedSchema {
        fn chunk_nodes(&self) -> Vec<ChunkNodeDesc> {
            self.0.clone()
        }
    }

    fn schema() -> FixedSchema {
        FixedSchema(vec![
            ChunkNodeDesc {
                name: "ChunkWidth".into(),
                id: ChunkId::Numeric(0x61),
            },
            ChunkNodeDesc {
                name: "ChunkExposure".into(),
                id: ChunkId::Numeric(0x62),
            },
            ChunkNodeDesc {
                name: "ChunkVendorTag".into(),
                id: ChunkId::Bytes(vec![0xCA, 0xFE, 0xBA, 0xBE, 0x00]),
            },
        ])
    }

    fn buffer_with_records() -> (RawBuffer, Vec<ChunkRecord>) {
        let mut data = vec![0u8; 32];
        data.extend_from_slice(&640u32.to_le_bytes());
        data.extend_from_slice(&20_000u64.to_le_bytes());
        data.extend_from_slice(b"vendor-bytes");
        let filled = data.len();
        let buffer =
            RawBuffer::new(Bytes::from(data), filled, 32, PayloadType::Image).unwrap();
        let records = vec![
            ChunkRecord {
                id: ChunkId::Numeric(0x61),
                offset: 32,
                length: 4,
            },
            ChunkRecord {
                id: ChunkId::Numeric(0x62),
                offset: 36,
                length: 8,
            },
            ChunkRecord {
                id: ChunkId::Bytes(vec![0xCA, 0xFE, 0xBA, 0xBE, 0x00]),
                offset: 44,
                length: 12,
            },
        ];
        (buffer, records)
    }

    fn bound(policy: CachePolicy) -> ChunkPortBinding {
        let (buffer, records) = buffer_with_records();
        let mut binding = ChunkPortBinding::new();
        binding.attach_schema(&schema());
        binding.attach_buffer(&buffer, &records, policy).unwrap();
        binding
    }

    #[test]
    fn test_read_live_and_cached_agree() {
        for policy in [CachePolicy::Live, CachePolicy::Unlimited] {
            let binding = bound(policy);
            assert_eq!(binding.read("ChunkWidth", 0, 4).unwrap().as_ref(), &640u32.to_le_bytes());
            assert_eq!(binding.read("ChunkVendorTag", 7, 5).unwrap().as_ref(), b"bytes");
        }
    }

    #[test]
    fn test_chunk_value_u64() {
        let binding = bound(CachePolicy::Unlimited);
        assert_eq!(
            binding.chunk_value_u64("ChunkWidth", Endianness::Little).unwrap(),
            640
        );
        assert_eq!(
            binding.chunk_value_u64("ChunkExposure", Endianness::Little).unwrap(),
            20_000
        );
        assert!(binding
            .chunk_value_u64("ChunkVendorTag", Endianness::Little)
            .is_err());
    }

    #[test]
    fn test_cache_limit_admits_small_windows_only() {
        let binding = bound(CachePolicy::Limit(4));
        assert!(binding.nodes[0].cached.is_some());
        assert!(binding.nodes[1].cached.is_none());
        // Large window still readable, live.
        assert_eq!(binding.read("ChunkExposure", 0, 8).unwrap().len(), 8);
    }

    #[test]
    fn test_unmatched_records_are_ignored() {
        let (buffer, mut records) = buffer_with_records();
        records.push(ChunkRecord {
            id: ChunkId::Numeric(0xDEAD),
            offset: 0,
            length: 4,
        });
        let mut binding = ChunkPortBinding::new();
        binding.attach_schema(&schema());
        binding
            .attach_buffer(&buffer, &records, CachePolicy::Live)
            .unwrap();
        assert_eq!(binding.read("ChunkWidth", 0, 4).unwrap().len(), 4);
    }

    #[test]
    fn test_record_past_extent_is_invalid_argument() {
        let (buffer, _) = buffer_with_records();
        let bad = vec![ChunkRecord {
            id: ChunkId::Numeric(0x61),
            offset: buffer.filled(),
            length: 1,
        }];
        let mut binding = ChunkPortBinding::new();
        binding.attach_schema(&schema());
        let result = binding.attach_buffer(&buffer, &bad, CachePolicy::Live);
        assert!(matches!(result, Err(DecodeError::InvalidArgument(_))));
        assert!(!binding.is_attached());
    }

    #[test]
    fn test_detach_is_idempotent() {
        let mut binding = bound(CachePolicy::Unlimited);
        binding.detach_buffer();
        binding.detach_buffer();
        assert!(!binding.is_attached());
        assert!(matches!(
            binding.read("ChunkWidth", 0, 4),
            Err(DecodeError::AccessDenied(_))
        ));
    }

    #[test]
    fn test_reattach_replaces_previous_buffer() {
        let mut binding = bound(CachePolicy::Unlimited);
        let (buffer, records) = buffer_with_records();
        binding
            .attach_buffer(&buffer, &records[..1], CachePolicy::Live)
            .unwrap();
        // Only the width record is bound after the second attach.
        assert!(binding.read("ChunkWidth", 0, 4).is_ok());
        assert!(binding.read("ChunkExposure", 0, 8).is_err());
    }

    #[test]
    fn test_clear_caches_falls_back_to_live() {
        let mut binding = bound(CachePolicy::Unlimited);
        binding.clear_caches();
        assert!(binding.is_attached());
        assert_eq!(binding.read("ChunkWidth", 0, 4).unwrap().as_ref(), &640u32.to_le_bytes());
    }

    #[test]
    fn test_read_past_window_is_out_of_bounds() {
        let binding = bound(CachePolicy::Live);
        assert!(matches!(
            binding.read("ChunkWidth", 2, 4),
            Err(DecodeError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_unknown_node_is_invalid_argument() {
        let binding = bound(CachePolicy::Live);
        assert!(matches!(
            binding.read("ChunkGain", 0, 1),
            Err(DecodeError::InvalidArgument(_))
        ));
    }
}
