//! Shared transposition table with per-slot compare-and-set gates.
//!
//! The table is an array of 64-byte clusters, each holding four slots. A
//! cluster is selected by the low 32 bits of the zobrist key; the high 32
//! bits are stored in the slot as a partial key.
//!
//! ## Slot layout
//!
//! ```text
//! gate (AtomicU32): 0 = free, 1 = held by one reader or writer
//! key  (AtomicU32): upper 32 bits of the zobrist key
//! data (AtomicU64):
//!   bits  0-31: move       (Move::raw)
//!   bits 32-47: score      (i16 as u16)
//!   bits 48-55: depth + 1  (0 = vacant)
//!   bits 56-57: bound      (00 exact, 01 lower, 10 upper)
//!   bits 58-63: generation (6 bits, wraps at 64)
//! ```
//!
//! ## Concurrency
//!
//! Every access acquires the slot gate with a compare-and-set from 0 to 1
//! and releases it with a `Release` store. Readers that cannot take the gate
//! within a few spins report a miss; writers skip the store. Because both
//! the key and data are read under the gate, a reader never combines the
//! key of one entry with the data of another.

use std::hint::spin_loop;
use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};

use kestrel_core::Move;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::search::MATE_THRESHOLD;

const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn check() {
        assert_send_sync::<TranspositionTable>();
    }
    let _ = check;
};

/// Slots per cluster.
pub const CLUSTER_SIZE: usize = 4;

const GENERATION_MASK: u8 = 0x3F;

/// Retention penalty for entries from an earlier search. Larger than any
/// depth, so a stale slot is always evicted before a current one.
const AGE_PENALTY: i32 = 256;

/// Attempts at taking a gate before a read counts as a miss.
const READ_SPINS: u32 = 8;

/// Attempts at taking a gate before a write is dropped.
const WRITE_SPINS: u32 = 2;

/// Bound type of a stored score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Bound {
    /// The score is exact (PV node).
    Exact = 0,
    /// The score is a lower bound (failed high).
    Lower = 1,
    /// The score is an upper bound (failed low).
    Upper = 2,
}

impl Bound {
    const fn from_bits(bits: u64) -> Bound {
        match bits & 0x3 {
            1 => Bound::Lower,
            2 => Bound::Upper,
            _ => Bound::Exact,
        }
    }
}

/// A consistent entry read from the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtEntry {
    pub mv: Move,
    /// Stored score, still relative to the storing node for mate scores.
    /// See [`score_from_tt`].
    pub score: i16,
    pub depth: u8,
    pub bound: Bound,
}

/// Convert a search score into its height-independent stored form.
///
/// Mate scores count plies from the root; the table stores them counting
/// from the node instead so they stay valid when reached by another path.
pub fn score_to_tt(score: i32, height: usize) -> i16 {
    let height = height as i32;
    let adjusted = if score > MATE_THRESHOLD {
        score + height
    } else if score < -MATE_THRESHOLD {
        score - height
    } else {
        score
    };
    adjusted.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Reverse [`score_to_tt`] for a node at `height`.
pub fn score_from_tt(score: i16, height: usize) -> i32 {
    let score = i32::from(score);
    let height = height as i32;
    if score > MATE_THRESHOLD {
        score - height
    } else if score < -MATE_THRESHOLD {
        score + height
    } else {
        score
    }
}

fn pack(mv: Move, score: i16, depth: u8, bound: Bound, generation: u8) -> u64 {
    u64::from(mv.raw())
        | (u64::from(score as u16) << 32)
        | (u64::from(depth.saturating_add(1)) << 48)
        | ((bound as u64) << 56)
        | (u64::from(generation & GENERATION_MASK) << 58)
}

/// Stored depth plus one; zero marks a vacant slot.
const fn depth_field(data: u64) -> u8 {
    (data >> 48) as u8
}

const fn generation_field(data: u64) -> u8 {
    (data >> 58) as u8 & GENERATION_MASK
}

fn unpack(data: u64) -> TtEntry {
    TtEntry {
        mv: Move::from_raw(data as u32),
        score: (data >> 32) as u16 as i16,
        depth: depth_field(data) - 1,
        bound: Bound::from_bits(data >> 56),
    }
}

#[derive(Default)]
struct Slot {
    gate: AtomicU32,
    key: AtomicU32,
    data: AtomicU64,
}

/// Holds a slot gate; releases it on drop.
struct SlotGuard<'a> {
    gate: &'a AtomicU32,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.gate.store(0, Ordering::Release);
    }
}

impl Slot {
    fn lock(&self, attempts: u32) -> Option<SlotGuard<'_>> {
        for _ in 0..attempts {
            if self
                .gate
                .compare_exchange(0, 1, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return Some(SlotGuard { gate: &self.gate });
            }
            spin_loop();
        }
        None
    }
}

#[derive(Default)]
#[repr(align(64))]
struct Cluster {
    slots: [Slot; CLUSTER_SIZE],
}

/// Fixed-capacity, concurrently shared position cache.
///
/// Reads and updates take `&self`; resizing and clearing need `&mut self`
/// and therefore only happen between searches.
pub struct TranspositionTable {
    clusters: Vec<Cluster>,
    mask: usize,
    megabytes: usize,
    generation: AtomicU8,
}

impl TranspositionTable {
    /// Allocate a table of at most `megabytes` MB.
    ///
    /// The cluster count is rounded down to a power of two.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidHashSize`] for zero megabytes and
    /// [`EngineError::HashAllocation`] when the memory cannot be reserved.
    pub fn new(megabytes: usize) -> Result<Self, EngineError> {
        let count = Self::cluster_count(megabytes)?;
        let mut clusters = Vec::new();
        if clusters.try_reserve_exact(count).is_err() {
            warn!(megabytes, "transposition table allocation failed");
            return Err(EngineError::HashAllocation { megabytes });
        }
        clusters.resize_with(count, Cluster::default);
        debug!(megabytes, clusters = count, "transposition table allocated");

        Ok(Self {
            clusters,
            mask: count - 1,
            megabytes,
            generation: AtomicU8::new(0),
        })
    }

    fn cluster_count(megabytes: usize) -> Result<usize, EngineError> {
        let invalid = || EngineError::InvalidHashSize {
            megabytes,
            min: 1,
            max: usize::MAX / (1024 * 1024),
        };
        let bytes = megabytes.checked_mul(1024 * 1024).ok_or_else(invalid)?;
        let count = bytes / std::mem::size_of::<Cluster>();
        if count == 0 {
            return Err(invalid());
        }
        Ok(1 << count.ilog2())
    }

    /// Reallocate for a new size. Cheap when the cluster count is unchanged.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new); on error the old table is kept.
    pub fn resize(&mut self, megabytes: usize) -> Result<(), EngineError> {
        if Self::cluster_count(megabytes)? == self.clusters.len() {
            self.megabytes = megabytes;
            return Ok(());
        }
        *self = Self::new(megabytes)?;
        Ok(())
    }

    pub fn megabytes(&self) -> usize {
        self.megabytes
    }

    /// Forget every entry and reset the generation.
    pub fn clear(&mut self) {
        for cluster in &mut self.clusters {
            for slot in &mut cluster.slots {
                *slot.gate.get_mut() = 0;
                *slot.key.get_mut() = 0;
                *slot.data.get_mut() = 0;
            }
        }
        *self.generation.get_mut() = 0;
    }

    /// Start a new search: entries written from now on are "current", and
    /// older ones become preferred eviction victims.
    pub fn prepare_new_search(&self) {
        let next = self.generation().wrapping_add(1) & GENERATION_MASK;
        self.generation.store(next, Ordering::Relaxed);
    }

    pub fn generation(&self) -> u8 {
        self.generation.load(Ordering::Relaxed)
    }

    fn cluster(&self, key: u64) -> &Cluster {
        &self.clusters[key as u32 as usize & self.mask]
    }

    /// Look up `key`. A slot that is busy or was replaced mid-read is a miss.
    pub fn read(&self, key: u64) -> Option<TtEntry> {
        let partial = (key >> 32) as u32;
        for slot in &self.cluster(key).slots {
            if slot.key.load(Ordering::Relaxed) != partial {
                continue;
            }
            let Some(_guard) = slot.lock(READ_SPINS) else {
                continue;
            };
            // Another writer may have replaced the slot before we gated it.
            if slot.key.load(Ordering::Relaxed) != partial {
                continue;
            }
            let data = slot.data.load(Ordering::Relaxed);
            if depth_field(data) == 0 {
                continue;
            }
            return Some(unpack(data));
        }
        None
    }

    /// Store a search result for `key`.
    ///
    /// Overwrites the slot already holding `key` if there is one; otherwise
    /// fills a vacant slot, or evicts the slot with the lowest retention
    /// (`depth`, minus [`AGE_PENALTY`] for entries from older searches).
    pub fn update(&self, key: u64, depth: u8, score: i16, bound: Bound, mv: Move) {
        let partial = (key >> 32) as u32;
        let generation = self.generation();
        let cluster = self.cluster(key);

        let mut target = 0;
        let mut matched = false;
        let mut lowest = i32::MAX;
        for (i, slot) in cluster.slots.iter().enumerate() {
            let data = slot.data.load(Ordering::Relaxed);
            if depth_field(data) == 0 {
                if lowest > i32::MIN {
                    lowest = i32::MIN;
                    target = i;
                }
                continue;
            }
            if slot.key.load(Ordering::Relaxed) == partial {
                target = i;
                matched = true;
                break;
            }
            let mut retention = i32::from(depth_field(data));
            if generation_field(data) != generation {
                retention -= AGE_PENALTY;
            }
            if retention < lowest {
                lowest = retention;
                target = i;
            }
        }

        let slot = &cluster.slots[target];
        let Some(_guard) = slot.lock(WRITE_SPINS) else {
            return;
        };

        let mut mv = mv;
        if matched && mv.is_empty() && slot.key.load(Ordering::Relaxed) == partial {
            // Keep the old ordering hint rather than erase it.
            let old = slot.data.load(Ordering::Relaxed);
            if depth_field(old) != 0 {
                mv = Move::from_raw(old as u32);
            }
        }

        slot.key.store(partial, Ordering::Relaxed);
        slot.data
            .store(pack(mv, score, depth, bound, generation), Ordering::Relaxed);
    }

    /// Permille of sampled slots holding an entry from the current search.
    pub fn hashfull(&self) -> u32 {
        let generation = self.generation();
        let sample = self.clusters.iter().take(1000 / CLUSTER_SIZE);
        let mut total = 0u32;
        let mut used = 0u32;
        for cluster in sample {
            for slot in &cluster.slots {
                total += 1;
                let data = slot.data.load(Ordering::Relaxed);
                if depth_field(data) != 0 && generation_field(data) == generation {
                    used += 1;
                }
            }
        }
        if total == 0 { 0 } else { used * 1000 / total }
    }
}

impl std::fmt::Debug for TranspositionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranspositionTable")
            .field("megabytes", &self.megabytes)
            .field("clusters", &self.clusters.len())
            .field("generation", &self.generation())
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
