//! Resource allocation policy.
//!
//! Partitions a measured host resource (CPU shares, memory bytes, disk
//! bytes) into the fixed set of service tiers. Everything in here is pure
//! arithmetic; measuring the host is the runtime crate's job.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Divisor for the `test4` and `test` tiers.
pub const TEST_DIVIDER: u64 = 8;
/// Divisor for the `small` tier.
pub const SMALL_DIVIDER: u64 = 128;
/// Divisor for the `medium` tier.
pub const MEDIUM_DIVIDER: u64 = 8;
/// Divisor for the `large` tier.
pub const LARGE_DIVIDER: u64 = 1;

/// Fraction of the raw disk size handed out to tiers.
pub const DISK_FACTOR: f64 = 0.95;
/// Fraction of the averaged memory measurement handed out to tiers.
pub const MEMORY_FACTOR: f64 = 0.9;
/// Fraction of the averaged CPU shares handed out to tiers.
pub const CPU_FACTOR: f64 = 0.9;
/// CPU shares granted per core (cgroup `cpu.shares` scale).
pub const CPU_SHARES_PER_CORE: u64 = 1024;

/// Every disk quantity passed to the volume manager is a multiple of this.
pub const VOLUME_CHUNK: u64 = 512 * SMALL_DIVIDER;

/// A named resource-allocation bucket, ordered from the smallest service class
/// declaration to the largest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Test4,
    Test,
    Small,
    Medium,
    Large,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Test4,
        Tier::Test,
        Tier::Small,
        Tier::Medium,
        Tier::Large,
    ];

    pub fn divisor(self) -> u64 {
        match self {
            Tier::Test4 | Tier::Test => TEST_DIVIDER,
            Tier::Small => SMALL_DIVIDER,
            Tier::Medium => MEDIUM_DIVIDER,
            Tier::Large => LARGE_DIVIDER,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Test4 => "test4",
            Tier::Test => "test",
            Tier::Small => "small",
            Tier::Medium => "medium",
            Tier::Large => "large",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single tier quantity. Whole quantities serialize as JSON integers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Quantity {
    Whole(u64),
    Fractional(f64),
}

impl Quantity {
    pub fn as_f64(self) -> f64 {
        match self {
            Quantity::Whole(v) => v as f64,
            Quantity::Fractional(v) => v,
        }
    }

    /// Truncated integer value.
    pub fn whole(self) -> u64 {
        match self {
            Quantity::Whole(v) => v,
            Quantity::Fractional(v) => v as u64,
        }
    }
}

/// Tier name to quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceAlloc {
    values: BTreeMap<Tier, Quantity>,
}

impl ResourceAlloc {
    /// Look up a tier as a truncated integer. Missing tiers read as 0.
    pub fn get(&self, tier: Tier) -> u64 {
        self.values.get(&tier).map(|q| q.whole()).unwrap_or(0)
    }

    pub fn quantity(&self, tier: Tier) -> Option<Quantity> {
        self.values.get(&tier).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tier, Quantity)> + '_ {
        self.values.iter().map(|(t, q)| (*t, *q))
    }

    fn map_whole(self, f: impl Fn(u64) -> u64) -> Self {
        let values = self
            .values
            .into_iter()
            .map(|(t, q)| (t, Quantity::Whole(f(q.whole()))))
            .collect();
        Self { values }
    }
}

/// Split `quantity` across the tiers by their divisors.
///
/// Unless `fractional` is set, every tier is truncated toward zero.
pub fn allocate(quantity: f64, fractional: bool) -> ResourceAlloc {
    let quantity = quantity.max(0.0);
    let values = Tier::ALL
        .iter()
        .map(|tier| {
            let raw = quantity / tier.divisor() as f64;
            let q = if fractional {
                Quantity::Fractional(raw)
            } else {
                Quantity::Whole(raw.trunc() as u64)
            };
            (*tier, q)
        })
        .collect();
    ResourceAlloc { values }
}

/// Round `bytes` down to a multiple of [`VOLUME_CHUNK`].
pub fn chunk_floor(bytes: u64) -> u64 {
    bytes / VOLUME_CHUNK * VOLUME_CHUNK
}

/// Tier the raw disk size, keeping headroom and chunk alignment.
pub fn disk_alloc(raw_bytes: u64) -> ResourceAlloc {
    let usable = chunk_floor((raw_bytes as f64 * DISK_FACTOR) as u64);
    allocate(usable as f64, false).map_whole(chunk_floor)
}

/// Tier a service's share of the averaged memory measurement.
pub fn memory_alloc(total_bytes: f64, proportion: f64) -> ResourceAlloc {
    allocate(total_bytes * MEMORY_FACTOR * proportion, false)
}

/// Tier a service's share of the host CPU, expressed in cgroup shares.
pub fn cpu_alloc(cpu_count: f64, proportion: f64) -> ResourceAlloc {
    allocate(
        cpu_count * CPU_SHARES_PER_CORE as f64 * CPU_FACTOR * proportion,
        false,
    )
}

/// Per-tier soft limits for named volume sub-allocations.
pub type VolumeAllocation = BTreeMap<Tier, BTreeMap<String, u64>>;

/// Multiply each tier's disk quantity by each declared proportion.
///
/// Proportions are independent limits and need not sum to 1.
pub fn compose_volume_allocation(
    disk: &ResourceAlloc,
    proportions: &BTreeMap<String, f64>,
) -> VolumeAllocation {
    disk.iter()
        .map(|(tier, quantity)| {
            let limits = proportions
                .iter()
                .map(|(name, p)| (name.clone(), (p * quantity.as_f64()).floor() as u64))
                .collect();
            (tier, limits)
        })
        .collect()
}

/// Allocation for the main tiered workload service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadAllocation {
    pub cpu_shares: ResourceAlloc,
    pub mem: ResourceAlloc,
    pub disk: ResourceAlloc,
    pub volume_limits: VolumeAllocation,
}

/// Allocation for the companion service that runs next to each workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanionAllocation {
    pub cpu_shares: ResourceAlloc,
    pub mem: ResourceAlloc,
}

/// Contents of `resource_allocation.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAllocation {
    pub workload: WorkloadAllocation,
    pub companion: CompanionAllocation,
}
