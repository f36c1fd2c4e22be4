use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    pub params: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// One entry of `current_validators`. Counts the node leaves out read as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidatorRecord {
    #[serde(default)]
    pub account_id: String,
    #[serde(rename = "num_produced_blocks", default)]
    pub blocks_produced: u64,
    #[serde(rename = "num_expected_blocks", default)]
    pub blocks_expected: u64,
    #[serde(rename = "num_produced_chunks", default)]
    pub chunks_produced: u64,
    #[serde(rename = "num_expected_chunks", default)]
    pub chunks_expected: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ValidatorRecord {
    // i128 holds the difference of any two u64 counts without wrapping.
    pub fn blocks_missed(&self) -> i128 {
        self.blocks_expected as i128 - self.blocks_produced as i128
    }

    pub fn chunks_missed(&self) -> i128 {
        self.chunks_expected as i128 - self.chunks_produced as i128
    }
}

/// The `result` payload of a `validators` call. Everything other than
/// `current_validators` is carried along untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidatorSnapshot {
    #[serde(default)]
    pub current_validators: Vec<ValidatorRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingStat {
    pub account_id: String,
    pub produced: u64,
    pub expected: u64,
    pub missing: u64,
}
