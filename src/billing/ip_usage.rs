//! Free-tier usage counter keyed by client IP
//!
//! Process-lifetime only; counts reset on restart. The trait keeps the
//! governance layer independent of where the counts live.

use dashmap::DashMap;

/// Narrow counter interface for anonymous free-tier governance
pub trait IpUsageCounter: Send + Sync {
    /// Record one attempt and return the new count
    fn increment(&self, ip: &str) -> u32;
    fn get(&self, ip: &str) -> u32;
    fn reset(&self, ip: &str);
}

/// In-memory counter backed by a lock-free map
#[derive(Default)]
pub struct InMemoryIpUsage {
    counts: DashMap<String, u32>,
}

impl InMemoryIpUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracked_ips(&self) -> usize {
        self.counts.len()
    }
}

impl IpUsageCounter for InMemoryIpUsage {
    fn increment(&self, ip: &str) -> u32 {
        // The entry guard holds the shard lock across read-increment-write
        let mut entry = self.counts.entry(ip.to_string()).or_insert(0);
        *entry = entry.saturating_add(1);
        *entry
    }

    fn get(&self, ip: &str) -> u32 {
        self.counts.get(ip).map(|count| *count).unwrap_or(0)
    }

    fn reset(&self, ip: &str) {
        self.counts.remove(ip);
    }
}
