//! Per-source staleness gate for inbound moves.
//!
//! Moves travel over UDP and may arrive reordered or duplicated. Each source
//! keeps its own high-water mark so one lagging sender never holds back
//! another.

use std::collections::HashMap;

use sync_shared::net::ClientId;

#[derive(Debug, Default)]
pub struct StalenessFilter {
    last_accepted: HashMap<ClientId, i64>,
}

impl StalenessFilter {
    /// Accepts `timestamp` iff it is strictly newer than anything accepted
    /// from `source` so far.
    pub fn accept(&mut self, source: ClientId, timestamp: i64) -> bool {
        let last = self.last_accepted(source).unwrap_or(i64::MIN);
        if timestamp <= last {
            return false;
        }
        self.last_accepted.insert(source, timestamp);
        true
    }

    pub fn last_accepted(&self, source: ClientId) -> Option<i64> {
        self.last_accepted.get(&source).copied()
    }
}
