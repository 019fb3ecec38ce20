//! The driver/follower merge loop. One backend pages candidate keys in its own
//! order, the other confirms them against its subset of the filter; windowing
//! and the iteration cap bound total work regardless of backend contents.

use std::collections::{HashMap, HashSet};

use sift_domain::{
	EntityDescriptor, FieldPredicate, FilterNode, Record, SearchCriteria, SortColumn,
	SplitFilter, TenantContext,
};

use crate::{Backends, ServiceResult};

pub(crate) const MAX_ITERATIONS: u32 = 50;
/// Follower-side IN-list ceiling; also the oversampling hard cap.
pub(crate) const MAX_CANDIDATE_WINDOW: u32 = 1000;

pub(crate) fn oversample(limit: u32) -> u32 {
	if limit == 0 { MAX_CANDIDATE_WINDOW } else { limit.saturating_mul(4).min(MAX_CANDIDATE_WINDOW) }
}

struct MergeState {
	results_to_skip: u32,
	found: u32,
	iteration: u32,
	driver_offset: u32,
	keep_going: bool,
}
impl MergeState {
	fn new(criteria: &SearchCriteria) -> Self {
		Self {
			results_to_skip: criteria.offset,
			found: 0,
			iteration: 0,
			driver_offset: 0,
			keep_going: true,
		}
	}

	/// Applies the pagination window to rows already in final order.
	fn append(&mut self, out: &mut Vec<Record>, target: u32, rows: impl Iterator<Item = Record>) {
		for row in rows {
			if self.results_to_skip > 0 {
				self.results_to_skip -= 1;

				continue;
			}
			if self.found >= target {
				break;
			}

			out.push(row);
			self.found += 1;
		}
	}

	/// End-of-iteration bookkeeping.
	fn advance(&mut self, entity: &EntityDescriptor, oversample: u32) {
		self.driver_offset += oversample;
		self.iteration += 1;

		if self.iteration >= MAX_ITERATIONS {
			tracing::warn!(
				entity = %entity.name,
				iterations = self.iteration,
				"Combined search stopped at the iteration cap; the result may be short."
			);

			self.keep_going = false;
		}
	}
}

fn target(criteria: &SearchCriteria) -> u32 {
	if criteria.limit == 0 { u32::MAX } else { criteria.limit }
}

fn key_in(entity: &EntityDescriptor, keys: &[i64]) -> FilterNode {
	FilterNode::field(entity.key_field.clone(), FieldPredicate::KeyIn(keys.to_vec()))
}

/// Text backend drives in relevance (or text-sort) order; the relational
/// backend confirms each candidate window against the DB subset.
pub(crate) async fn text_driven(
	backends: &Backends,
	entity: &EntityDescriptor,
	split: &SplitFilter,
	text_sort: &[SortColumn],
	criteria: &SearchCriteria,
	tenant: &TenantContext,
) -> ServiceResult<Vec<Record>> {
	let oversample = oversample(criteria.limit);
	let target = target(criteria);
	let mut state = MergeState::new(criteria);
	let mut out = Vec::new();
	let sorted = !criteria.sort.is_empty();

	while state.keep_going && state.found < target {
		let driver_criteria = SearchCriteria {
			filter: split.search.clone(),
			sort: text_sort.to_vec(),
			limit: oversample,
			offset: state.driver_offset,
			..SearchCriteria::default()
		};
		let candidates = backends.text.search_keys(entity, &driver_criteria, tenant).await?;

		if (candidates.len() as u32) < oversample {
			state.keep_going = false;
		}
		if candidates.is_empty() {
			break;
		}

		// Without a sort the follower's own row order is arbitrary, so a limit
		// there would truncate the wrong rows; the candidate window already
		// bounds the result.
		let remaining = if !sorted || target == u32::MAX {
			0
		} else {
			(target - state.found).saturating_add(state.results_to_skip)
		};
		let follower_criteria = SearchCriteria {
			filter: Some(FilterNode::and_opt(split.db.clone(), key_in(entity, &candidates))),
			sort: criteria.sort.clone(),
			limit: remaining,
			..SearchCriteria::default()
		};
		let rows = backends.db.search(entity, &follower_criteria, tenant).await?;

		if sorted {
			// The follower applied the common sort; keep its order.
			state.append(&mut out, target, rows.into_iter());
		} else {
			// No sort means the driver's relevance order is the output order.
			let mut by_key = rows
				.into_iter()
				.filter_map(|row| row.key.map(|key| (key, row)))
				.collect::<HashMap<_, _>>();

			state.append(
				&mut out,
				target,
				candidates.iter().filter_map(|key| by_key.remove(key)),
			);
		}

		state.advance(entity, oversample);
	}

	Ok(out)
}

/// Relational backend drives in the requested sort order; the text backend
/// confirms candidates, and surviving keys are fetched back in driver order.
pub(crate) async fn db_driven(
	backends: &Backends,
	entity: &EntityDescriptor,
	split: &SplitFilter,
	text_key_field: &str,
	criteria: &SearchCriteria,
	tenant: &TenantContext,
) -> ServiceResult<Vec<Record>> {
	let oversample = oversample(criteria.limit);
	let target = target(criteria);
	let mut state = MergeState::new(criteria);
	let mut out = Vec::new();

	while state.keep_going && state.found < target {
		let driver_criteria = SearchCriteria {
			filter: split.db.clone(),
			sort: criteria.sort.clone(),
			limit: oversample,
			offset: state.driver_offset,
			..SearchCriteria::default()
		};
		let candidates = backends.db.search_keys(entity, &driver_criteria, tenant).await?;

		if (candidates.len() as u32) < oversample {
			state.keep_going = false;
		}
		if candidates.is_empty() {
			break;
		}

		let follower_criteria = SearchCriteria {
			filter: Some(FilterNode::and_opt(
				split.search.clone(),
				FilterNode::field(
					text_key_field.to_string(),
					FieldPredicate::KeyIn(candidates.clone()),
				),
			)),
			..SearchCriteria::default()
		};
		let confirmed = backends
			.text
			.search_keys(entity, &follower_criteria, tenant)
			.await?
			.into_iter()
			.collect::<HashSet<_>>();
		// Membership only; the output order is the driver's sort order.
		let mut window = Vec::new();

		for key in &candidates {
			if !confirmed.contains(key) {
				continue;
			}
			if state.results_to_skip > 0 {
				state.results_to_skip -= 1;

				continue;
			}
			if state.found + (window.len() as u32) >= target {
				break;
			}

			window.push(*key);
		}

		let rows = backends.db.fetch_by_keys(entity, &window, tenant).await?;
		let appended = rows.len() as u32;

		out.extend(rows);
		state.found += appended;
		state.advance(entity, oversample);
	}

	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn oversample_is_quadruple_the_limit_up_to_the_cap() {
		assert_eq!(oversample(10), 40);
		assert_eq!(oversample(250), 1000);
		assert_eq!(oversample(400), 1000);
		assert_eq!(oversample(0), 1000);
	}
}
