//! Chain-reduction algebra: collapse a verified single-path selection
//! into one equivalent derived component, and undo it exactly.
//!
//! Nothing is mutated until every precondition and every per-frequency
//! cascade has succeeded, so a failed merge leaves the lineup untouched.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::cascade;
use crate::component::{Category, Component, ComponentDef, ComponentId, DirectionalRaw};
use crate::component::parse_frequency;
use crate::constants::REFERENCE_INPUT_DBM;
use crate::error::{BudgetError, BudgetResult};
use crate::lineup::Lineup;
use crate::spec::{Direction, RawSpec};

/// Collapse the selected components into one merged component carrying
/// their cascaded totals per common frequency and direction.
///
/// `direction` picks the connection map used to order the selection; the
/// derived specs and the boundary reconnection always cover both
/// directions.
pub fn merge(
    lineup: &mut Lineup,
    selection: &[ComponentId],
    name: &str,
    direction: Direction,
) -> BudgetResult<ComponentId> {
    if selection.len() < 2 {
        return Err(BudgetError::InvalidSelection(
            "select at least two components".to_string(),
        ));
    }
    let selection_set: HashSet<ComponentId> = selection.iter().copied().collect();
    if selection_set.len() != selection.len() {
        return Err(BudgetError::InvalidSelection(
            "the selection repeats a component".to_string(),
        ));
    }
    for id in selection {
        if lineup.component(*id).is_none() {
            return Err(BudgetError::UnknownComponent(*id));
        }
    }

    let ordered_ids = order_selection(lineup, &selection_set, selection.len(), direction)?;
    let members: Vec<&Component> = ordered_ids
        .iter()
        .map(|id| {
            lineup
                .component(*id)
                .ok_or(BudgetError::UnknownComponent(*id))
        })
        .collect::<BudgetResult<_>>()?;

    let frequencies = common_frequencies(&members)?;
    debug!(name, members = members.len(), ?frequencies, "merging selection");

    // Derive the merged specs: one cascade per frequency and direction at
    // the reference input, captured as raw entries.
    let mut specs_by_freq: BTreeMap<String, DirectionalRaw> = BTreeMap::new();
    for frequency in &frequencies {
        let forward = derive_raw(&members, frequency, Direction::Forward)?;
        let reverse = derive_raw(&members, frequency, Direction::Reverse)?;
        specs_by_freq.insert(frequency.clone(), DirectionalRaw { forward, reverse });
    }

    let member_defs: Vec<ComponentDef> = members.iter().map(|m| m.to_def()).collect();
    let merged = Component::from_def(ComponentDef {
        name: name.to_string(),
        category: Category::Merged {
            members: member_defs,
        },
        specs_by_freq,
    })?;

    // Boundary neighbors, captured per direction before any removal.
    let first = ordered_ids[0];
    let last = ordered_ids[ordered_ids.len() - 1];
    let boundaries: Vec<(Direction, Option<ComponentId>, Option<ComponentId>)> = Direction::BOTH
        .iter()
        .map(|&dir| {
            let incoming = lineup
                .predecessor(dir, first)
                .filter(|from| !selection_set.contains(from));
            let outgoing = lineup
                .successor(dir, last)
                .filter(|to| !selection_set.contains(to));
            (dir, incoming, outgoing)
        })
        .collect();

    // Every check passed; now mutate.
    for id in &ordered_ids {
        lineup.remove(*id);
    }
    let merged_id = lineup.add(merged);
    for (dir, incoming, outgoing) in boundaries {
        if let Some(from) = incoming {
            lineup.connect(dir, from, merged_id)?;
        }
        if let Some(to) = outgoing {
            lineup.connect(dir, merged_id, to)?;
        }
    }
    Ok(merged_id)
}

/// Reinstate a merged component's stored members: original order,
/// original specs, linear internal connectivity in both directions, and
/// the merged component's boundary edges. No recomputation.
pub fn unmerge(lineup: &mut Lineup, merged_id: ComponentId) -> BudgetResult<Vec<ComponentId>> {
    let merged = lineup
        .component(merged_id)
        .ok_or(BudgetError::UnknownComponent(merged_id))?;
    let member_defs: Vec<ComponentDef> = match merged.merged_members() {
        Some(members) if !members.is_empty() => members.to_vec(),
        _ => {
            return Err(BudgetError::NotMerged {
                component: merged.name.clone(),
            })
        }
    };
    debug!(name = %merged.name, members = member_defs.len(), "unmerging");

    // Rebuild every member before touching the lineup.
    let restored: Vec<Component> = member_defs
        .into_iter()
        .map(Component::from_def)
        .collect::<BudgetResult<_>>()?;

    let boundaries: Vec<(Direction, Option<ComponentId>, Option<ComponentId>)> = Direction::BOTH
        .iter()
        .map(|&dir| {
            (
                dir,
                lineup.predecessor(dir, merged_id),
                lineup.successor(dir, merged_id),
            )
        })
        .collect();

    lineup.remove(merged_id);
    let ids: Vec<ComponentId> = restored.into_iter().map(|c| lineup.add(c)).collect();
    for pair in ids.windows(2) {
        for dir in Direction::BOTH {
            lineup.connect(dir, pair[0], pair[1])?;
        }
    }
    let first = ids[0];
    let last = ids[ids.len() - 1];
    for (dir, incoming, outgoing) in boundaries {
        if let Some(from) = incoming {
            lineup.connect(dir, from, first)?;
        }
        if let Some(to) = outgoing {
            lineup.connect(dir, last, to)?;
        }
    }
    Ok(ids)
}

/// Order-verify the selection against one direction's connection map,
/// restricted to edges with both endpoints inside the selection. The
/// selection must reduce to exactly one start node, no loop, and a
/// contiguous path covering every member.
fn order_selection(
    lineup: &Lineup,
    selection_set: &HashSet<ComponentId>,
    selection_len: usize,
    direction: Direction,
) -> BudgetResult<Vec<ComponentId>> {
    let mut in_degree: HashMap<ComponentId, usize> =
        selection_set.iter().map(|id| (*id, 0)).collect();
    let mut next_of: HashMap<ComponentId, ComponentId> = HashMap::new();
    for (from, to) in lineup.edges(direction) {
        if selection_set.contains(from) && selection_set.contains(to) {
            next_of.insert(*from, *to);
            if let Some(degree) = in_degree.get_mut(to) {
                *degree += 1;
            }
        }
    }

    let mut queue: VecDeque<ComponentId> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    if queue.is_empty() {
        return Err(BudgetError::InvalidSelection(
            "the selection contains a loop".to_string(),
        ));
    }
    if queue.len() > 1 {
        return Err(BudgetError::InvalidSelection(format!(
            "the selection must be a single contiguous chain ({} start points found)",
            queue.len()
        )));
    }

    let mut ordered = Vec::with_capacity(selection_len);
    while let Some(id) = queue.pop_front() {
        ordered.push(id);
        if let Some(next) = next_of.get(&id) {
            if let Some(degree) = in_degree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(*next);
                }
            }
        }
    }
    if ordered.len() != selection_len {
        return Err(BudgetError::InvalidSelection(
            "the selection is not one contiguous chain".to_string(),
        ));
    }
    Ok(ordered)
}

/// Intersect the members' declared frequencies, numerically ascending.
fn common_frequencies(members: &[&Component]) -> BudgetResult<Vec<String>> {
    let mut common: Option<HashSet<String>> = None;
    for member in members {
        let declared: HashSet<String> = member.available_frequencies().into_iter().collect();
        common = Some(match common {
            None => declared,
            Some(common) => common.intersection(&declared).cloned().collect(),
        });
    }
    let common = common.unwrap_or_default();
    if common.is_empty() {
        return Err(BudgetError::NoCommonFrequency);
    }
    let mut frequencies: Vec<(String, f64)> = common
        .into_iter()
        .map(|frequency| {
            let ghz = parse_frequency(&frequency)?;
            Ok((frequency, ghz))
        })
        .collect::<BudgetResult<_>>()?;
    frequencies.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    Ok(frequencies.into_iter().map(|(frequency, _)| frequency).collect())
}

/// Run the sub-chain cascade and capture its totals as a derived raw spec.
fn derive_raw(
    members: &[&Component],
    frequency: &str,
    direction: Direction,
) -> BudgetResult<RawSpec> {
    let result = cascade::calculate(members, frequency, direction, REFERENCE_INPUT_DBM)?;
    let totals = result.totals;
    Ok(RawSpec::Derived {
        gain_db: totals.gain_db,
        noise_figure_db: totals.noise_figure_db,
        output_p1db_dbm: totals.output_p1db_dbm,
        active_gain_db: totals.partition.active_db,
        passive_gain_db: totals.partition.passive_db,
        antenna_gain_db: totals.partition.antenna_db,
    })
}
