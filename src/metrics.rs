use crate::models::{MissingStat, ValidatorRecord, ValidatorSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Production {
    Blocks,
    Chunks,
}

impl Production {
    pub fn label(self) -> &'static str {
        match self {
            Production::Blocks => "blocks",
            Production::Chunks => "chunks",
        }
    }

    fn counts(self, record: &ValidatorRecord) -> (u64, u64) {
        match self {
            Production::Blocks => (record.blocks_produced, record.blocks_expected),
            Production::Chunks => (record.chunks_produced, record.chunks_expected),
        }
    }
}

fn compute_missing(snapshot: &ValidatorSnapshot, kind: Production) -> Vec<MissingStat> {
    snapshot
        .current_validators
        .iter()
        .filter_map(|record| {
            let (produced, expected) = kind.counts(record);
            (expected > produced).then(|| MissingStat {
                account_id: record.account_id.clone(),
                produced,
                expected,
                missing: expected - produced,
            })
        })
        .collect()
}

pub fn compute_missing_blocks(snapshot: &ValidatorSnapshot) -> Vec<MissingStat> {
    compute_missing(snapshot, Production::Blocks)
}

pub fn compute_missing_chunks(snapshot: &ValidatorSnapshot) -> Vec<MissingStat> {
    compute_missing(snapshot, Production::Chunks)
}
