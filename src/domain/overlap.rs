use crate::domain::models::Block;

/// Returns the existing blocks that conflict in time with `candidate` on
/// the same visible day.
///
/// Two blocks conflict when their ranges intersect on an open interval:
/// `candidate.start < other.end && candidate.end > other.start`. Blocks
/// that merely touch at an endpoint do not conflict, the candidate never
/// conflicts with itself, and blocks on other days are never compared,
/// even for times rolled past 24.
///
/// This is a gate, not a hard constraint: callers surface the conflicts
/// and let the user proceed anyway or revise.
pub fn find_overlaps(existing: &[Block], candidate: &Block) -> Vec<Block> {
    existing
        .iter()
        .filter(|other| {
            other.id != candidate.id
                && other.day == candidate.day
                && candidate.start_time < other.end_time
                && candidate.end_time > other.start_time
        })
        .cloned()
        .collect()
}
