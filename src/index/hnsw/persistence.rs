//! Bit-exact `HNSW` on-disk format (spec.md §6).
//!
//! Neighbor lists persist as the neighbor's stable `id`, not its arena
//! index: arena positions are an implementation detail of the live
//! process (tombstones from removed nodes leave gaps) and are
//! recomputed fresh on load.

use super::{compute_ml, HnswIndex, HnswInner, Node};
use crate::codec::{
    read_magic, read_u32, read_u64, read_vector, write_magic, write_u32, write_u64, write_vector,
};
use crate::config::HnswConfig;
use crate::distance::DistanceMetric;
use crate::error::Result;
use crate::rng::Rng;

use rustc_hash::FxHashMap;

const MAGIC: &[u8; 4] = b"HNSW";
const VERSION: u32 = 1;

impl HnswIndex {
    /// Serializes the live (non-tombstoned) graph to the bit-exact
    /// `HNSW` format: header, then per node its id, max layer, vector,
    /// and per-layer neighbor id lists.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::IoError`] if writing to the in-memory
    /// buffer fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let inner = self.inner.read();
        let mut buf = Vec::new();
        write_magic(&mut buf, MAGIC)?;
        write_u32(&mut buf, VERSION)?;
        write_u64(&mut buf, self.dimension as u64)?;
        write_u32(&mut buf, self.metric.to_code())?;
        write_u64(&mut buf, self.m as u64)?;

        let entry_point_id =
            inner.entry_point.and_then(|idx| inner.nodes[idx].as_ref()).map(|n| n.id).unwrap_or(0);
        write_u64(&mut buf, entry_point_id)?;
        write_u64(&mut buf, inner.entry_point_layer as u64)?;

        let live: Vec<&Node> = inner.nodes.iter().filter_map(|slot| slot.as_ref()).collect();
        write_u64(&mut buf, live.len() as u64)?;
        for node in &live {
            write_u64(&mut buf, node.id)?;
            write_u64(&mut buf, node.max_layer as u64)?;
            write_vector(&mut buf, &node.vector)?;
            for layer in &node.neighbors {
                write_u64(&mut buf, layer.len() as u64)?;
                for &neighbor_idx in layer {
                    let neighbor_id = inner.nodes[neighbor_idx].as_ref().map(|n| n.id).unwrap_or(0);
                    write_u64(&mut buf, neighbor_id)?;
                }
            }
        }
        Ok(buf)
    }

    /// Deserializes from the bit-exact `HNSW` format.
    ///
    /// Only `dimension`, `metric`, and `M` are persisted (spec.md §6's
    /// file layout has no field for `ef_construction`/`ef_search`/the
    /// level-assignment seed); the restored index takes
    /// [`HnswConfig::default`] for those, with `m` overridden from the
    /// file. This is a property of the wire format, not a loss specific
    /// to this implementation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Serialization`] if `bytes` is truncated,
    /// has a bad magic, or references an unknown metric code.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let mut r: &[u8] = bytes;
        read_magic(&mut r, MAGIC)?;
        let _version = read_u32(&mut r)?;
        let dimension = read_u64(&mut r)? as usize;
        let metric = DistanceMetric::from_code(read_u32(&mut r)?)?;
        let m = (read_u64(&mut r)? as usize).max(1);
        let entry_point_id = read_u64(&mut r)?;
        let entry_point_layer = read_u64(&mut r)? as usize;
        let node_count = read_u64(&mut r)? as usize;

        struct RawNode {
            id: u64,
            max_layer: usize,
            vector: Vec<f32>,
            neighbor_ids: Vec<Vec<u64>>,
        }

        let mut raw_nodes = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            let id = read_u64(&mut r)?;
            let max_layer = read_u64(&mut r)? as usize;
            let vector = read_vector(&mut r, dimension)?;
            let mut neighbor_ids = Vec::with_capacity(max_layer + 1);
            for _ in 0..=max_layer {
                let count = read_u64(&mut r)? as usize;
                let mut ids = Vec::with_capacity(count);
                for _ in 0..count {
                    ids.push(read_u64(&mut r)?);
                }
                neighbor_ids.push(ids);
            }
            raw_nodes.push(RawNode { id, max_layer, vector, neighbor_ids });
        }

        let mut id_to_node = FxHashMap::default();
        id_to_node.reserve(raw_nodes.len());
        for (idx, raw) in raw_nodes.iter().enumerate() {
            id_to_node.insert(raw.id, idx);
        }

        let nodes = raw_nodes
            .into_iter()
            .map(|raw| {
                let neighbors: Vec<Vec<usize>> = raw
                    .neighbor_ids
                    .iter()
                    .map(|layer| layer.iter().filter_map(|nid| id_to_node.get(nid).copied()).collect())
                    .collect();
                Some(Node { id: raw.id, vector: raw.vector, max_layer: raw.max_layer, neighbors })
            })
            .collect();

        let entry_point = id_to_node.get(&entry_point_id).copied();
        let config = HnswConfig { m, ..HnswConfig::default() };
        let ml = compute_ml(m);

        Ok(Self {
            dimension,
            metric,
            m,
            m_max: m,
            m_max0: m * 2,
            ml,
            ef_construction: config.ef_construction,
            ef_search: config.ef_search,
            inner: parking_lot::RwLock::new(HnswInner {
                nodes,
                id_to_node,
                entry_point,
                entry_point_layer: if entry_point.is_some() { entry_point_layer } else { 0 },
                rng: Rng::new(config.random_seed),
            }),
            config,
        })
    }
}
