use chrono::{DateTime, Local};

use crate::metrics::{compute_missing_blocks, compute_missing_chunks, Production};
use crate::models::{MissingStat, ValidatorSnapshot};

pub const ALL_PERFORMING: &str = "All validators are performing as expected";

/// Terse one-liner for a single validator. Only zero vs non-zero matters
/// when picking the phrasing; negative counts are printed as they come.
pub fn quiet_summary(blocks_missed: i128, chunks_missed: i128) -> String {
    match (blocks_missed == 0, chunks_missed == 0) {
        (true, true) => "no blocks missed, no chunks missed".to_string(),
        (false, true) => format!("{} blocks missed, no chunks missed", blocks_missed),
        (true, false) => format!("no blocks missed, {} chunks missed", chunks_missed),
        (false, false) => format!(
            "{} blocks missed, {} chunks missed",
            blocks_missed, chunks_missed
        ),
    }
}

/// First record with a matching id wins, duplicates further down are ignored.
pub fn report_for_validator(
    snapshot: &ValidatorSnapshot,
    account_id: &str,
    quiet: bool,
) -> Vec<String> {
    let Some(validator) = snapshot
        .current_validators
        .iter()
        .find(|v| v.account_id == account_id)
    else {
        return vec![format!("Validator {} not found", account_id)];
    };

    if quiet {
        return vec![quiet_summary(
            validator.blocks_missed(),
            validator.chunks_missed(),
        )];
    }

    vec![
        String::new(),
        format!("Validator: {}", account_id),
        format!(
            "Blocks: {}/{}",
            validator.blocks_produced, validator.blocks_expected
        ),
        format!(
            "Chunks: {}/{}",
            validator.chunks_produced, validator.chunks_expected
        ),
    ]
}

fn push_section(lines: &mut Vec<String>, kind: Production, stats: &[MissingStat]) {
    if stats.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.push(format!("Validators missing {}:", kind.label()));
    for stat in stats {
        lines.push(format!(
            "- {}: missing {} {} (produced {}/{})",
            stat.account_id,
            stat.missing,
            kind.label(),
            stat.produced,
            stat.expected
        ));
    }
}

pub fn report_all(snapshot: &ValidatorSnapshot, at: DateTime<Local>) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        format!(
            "=== Validator Status Check at {} ===",
            at.format("%Y-%m-%d %H:%M:%S")
        ),
    ];

    let missing_blocks = compute_missing_blocks(snapshot);
    let missing_chunks = compute_missing_chunks(snapshot);

    push_section(&mut lines, Production::Blocks, &missing_blocks);
    push_section(&mut lines, Production::Chunks, &missing_chunks);

    if missing_blocks.is_empty() && missing_chunks.is_empty() {
        lines.push(ALL_PERFORMING.to_string());
    }

    lines
}
