use crate::domain::models::{Block, RepeatRule};
use crate::domain::overlap::find_overlaps;
use crate::domain::window::DayWindow;
use std::collections::HashSet;

/// Instances a single expansion pass wants to materialize, plus counts
/// of what it deliberately left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpansionPlan {
    pub candidates: Vec<Block>,
    pub skipped_existing: usize,
    pub skipped_conflicts: usize,
}

/// Computes the blocks a set of recurrence rules would add over the
/// visible window.
///
/// The pass is idempotent because instance ids are a pure function of
/// rule id and date: anything already present is skipped, not
/// re-created. A candidate that overlaps an existing block, or one
/// synthesized earlier in the same pass, silently loses and is dropped.
/// Malformed rules never expand.
pub fn plan_instances(
    window: &DayWindow,
    rules: &[RepeatRule],
    existing: &[Block],
) -> ExpansionPlan {
    let mut plan = ExpansionPlan::default();
    let mut known_ids: HashSet<String> = existing.iter().map(|block| block.id.clone()).collect();
    let mut occupied: Vec<Block> = existing.to_vec();

    for rule in rules {
        if rule.validate().is_err() {
            continue;
        }
        for day in 0..window.len() {
            let Some(date) = window.date_for(day) else {
                continue;
            };
            if !rule.matches_date(date) {
                continue;
            }

            let instance_id = rule.instance_id(date);
            if known_ids.contains(&instance_id) {
                plan.skipped_existing += 1;
                continue;
            }

            let candidate = Block {
                id: instance_id,
                day,
                start_time: rule.start_time,
                end_time: rule.end_time,
                title: rule.title.clone(),
                description: rule.description.clone(),
                color: rule.color.clone(),
            };

            if !find_overlaps(&occupied, &candidate).is_empty() {
                plan.skipped_conflicts += 1;
                continue;
            }

            known_ids.insert(candidate.id.clone());
            occupied.push(candidate.clone());
            plan.candidates.push(candidate);
        }
    }

    plan
}
