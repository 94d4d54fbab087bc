use crate::{
    block::SealedBlock,
    primitives::{
        Address,
        B256,
        Log,
    },
};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::trace;

/// A log captured from an executed transaction, pinned to its containing
/// block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLog {
    pub block_hash: B256,
    pub block_number: u64,
    pub transaction_hash: B256,
    pub log: Log,
}

/// Address and topic filter over the accumulated log index.
///
/// `topics[i]` of `None` matches any topic at position `i`; a log with fewer
/// topics than the filter does not match. An empty address list matches any
/// emitter.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub addresses: Vec<Address>,
    pub topics: Vec<Option<B256>>,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
}

impl LogFilter {
    fn matches(&self, entry: &StoredLog) -> bool {
        if let Some(from) = self.from_block
            && entry.block_number < from
        {
            return false;
        }
        if let Some(to) = self.to_block
            && entry.block_number > to
        {
            return false;
        }
        if !self.addresses.is_empty() && !self.addresses.contains(&entry.log.address) {
            return false;
        }
        let topics = entry.log.topics();
        for (position, wanted) in self.topics.iter().enumerate() {
            match wanted {
                None => {
                    if position >= topics.len() {
                        return false;
                    }
                }
                Some(topic) => {
                    if topics.get(position) != Some(topic) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

/// Log index owned by the ledger. Fed once per mined block append; genesis
/// and call-only blocks never reach it.
#[derive(Debug, Default)]
pub struct LogIndex {
    entries: RwLock<Vec<StoredLog>>,
    /// Positions in `entries` grouped by `(emitter, topic0)`, so the common
    /// event-signature query avoids a full scan.
    by_emitter_topic0: DashMap<(Address, B256), Vec<usize>>,
}

impl LogIndex {
    /// Absorbs the logs one transaction of a mined block emitted.
    pub fn absorb(&self, block: &SealedBlock, transaction_hash: B256, logs: &[Log]) {
        if logs.is_empty() {
            return;
        }
        let mut entries = self.entries.write();
        for log in logs {
            let index = entries.len();
            if let Some(topic0) = log.topics().first() {
                self.by_emitter_topic0
                    .entry((log.address, *topic0))
                    .or_default()
                    .push(index);
            }
            entries.push(StoredLog {
                block_hash: block.hash(),
                block_number: block.number(),
                transaction_hash,
                log: log.clone(),
            });
        }
        trace!(
            target: "sandbox::logs",
            block_number = block.number(),
            %transaction_hash,
            count = logs.len(),
            "Indexed transaction logs"
        );
    }

    /// All indexed logs matching the filter, in emission order.
    pub fn logs_matching(&self, filter: &LogFilter) -> Vec<StoredLog> {
        let entries = self.entries.read();

        // A single emitter with a pinned topic0 can be answered off the
        // grouped index instead of scanning everything.
        if let ([address], [Some(topic0), ..]) = (&filter.addresses[..], &filter.topics[..]) {
            let Some(positions) = self.by_emitter_topic0.get(&(*address, *topic0)) else {
                return Vec::new();
            };
            return positions
                .iter()
                .map(|&i| &entries[i])
                .filter(|entry| filter.matches(entry))
                .cloned()
                .collect();
        }

        entries
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{
        Bytes,
        address,
    };
    use alloy_consensus::Header;

    fn block(number: u64) -> SealedBlock {
        SealedBlock::seal(
            Header {
                number,
                ..Default::default()
            },
            vec![],
        )
    }

    fn log(emitter: Address, topics: Vec<B256>) -> Log {
        Log::new_unchecked(emitter, topics, Bytes::new())
    }

    fn topic(byte: u8) -> B256 {
        B256::from([byte; 32])
    }

    #[test]
    fn absorbed_logs_are_queryable_by_emitter_and_topic() {
        let index = LogIndex::default();
        let emitter = address!("1000000000000000000000000000000000000000");
        let other = address!("2000000000000000000000000000000000000000");
        let b = block(1);

        index.absorb(&b, B256::ZERO, &[log(emitter, vec![topic(1)])]);
        index.absorb(&b, B256::ZERO, &[log(other, vec![topic(1)])]);
        index.absorb(&b, B256::ZERO, &[log(emitter, vec![topic(2)])]);

        let matched = index.logs_matching(&LogFilter {
            addresses: vec![emitter],
            topics: vec![Some(topic(1))],
            ..Default::default()
        });
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].log.address, emitter);
        assert_eq!(matched[0].block_number, 1);
    }

    #[test]
    fn wildcard_topic_requires_presence() {
        let index = LogIndex::default();
        let emitter = address!("1000000000000000000000000000000000000000");
        let b = block(1);

        index.absorb(&b, B256::ZERO, &[log(emitter, vec![])]);
        index.absorb(&b, B256::ZERO, &[log(emitter, vec![topic(1), topic(2)])]);

        // One wildcard position: matches any topic0, but a log without topics
        // does not qualify.
        let matched = index.logs_matching(&LogFilter {
            topics: vec![None],
            ..Default::default()
        });
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].log.topics(), &[topic(1), topic(2)]);
    }

    #[test]
    fn block_range_bounds_apply() {
        let index = LogIndex::default();
        let emitter = address!("1000000000000000000000000000000000000000");

        index.absorb(&block(1), B256::ZERO, &[log(emitter, vec![topic(1)])]);
        index.absorb(&block(2), B256::ZERO, &[log(emitter, vec![topic(1)])]);
        index.absorb(&block(5), B256::ZERO, &[log(emitter, vec![topic(1)])]);

        let matched = index.logs_matching(&LogFilter {
            from_block: Some(2),
            to_block: Some(4),
            ..Default::default()
        });
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].block_number, 2);
    }

    #[test]
    fn empty_filter_matches_everything() {
        let index = LogIndex::default();
        let emitter = address!("1000000000000000000000000000000000000000");
        index.absorb(&block(1), B256::ZERO, &[log(emitter, vec![topic(1)])]);
        index.absorb(&block(2), B256::ZERO, &[log(emitter, vec![])]);

        assert_eq!(index.logs_matching(&LogFilter::default()).len(), 2);
        assert_eq!(index.len(), 2);
    }
}
