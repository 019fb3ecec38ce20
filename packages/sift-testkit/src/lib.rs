//! In-memory stand-ins for the two storage backends. Rows live in plain
//! vectors, predicates are evaluated structurally, and every backend call is
//! counted so tests can assert bounded work.

use std::{
	cmp::Ordering,
	sync::atomic::{AtomicU32, Ordering as AtomicOrdering},
};

use serde_json::Value;
use time::format_description::well_known::Rfc3339;

use sift_domain::{
	EntityDescriptor, FieldPredicate, FilterNode, KeyExample, Record, SearchCriteria, SortColumn,
	TenantContext, TenantRestriction,
};
use sift_service::{BoxFuture, DbBackend, ServiceResult, TextBackend};

/// An in-memory relational backend. Field columns are assumed to share their
/// field names, and dotted filter paths match flat dotted field keys.
#[derive(Default)]
pub struct MemoryDb {
	rows: Vec<Record>,
	search_calls: AtomicU32,
	key_calls: AtomicU32,
	fetch_calls: AtomicU32,
	count_calls: AtomicU32,
}
impl MemoryDb {
	pub fn new(rows: Vec<Record>) -> Self {
		Self { rows, ..Self::default() }
	}

	pub fn search_call_count(&self) -> u32 {
		self.search_calls.load(AtomicOrdering::Relaxed)
	}

	pub fn key_call_count(&self) -> u32 {
		self.key_calls.load(AtomicOrdering::Relaxed)
	}

	pub fn fetch_call_count(&self) -> u32 {
		self.fetch_calls.load(AtomicOrdering::Relaxed)
	}

	pub fn count_call_count(&self) -> u32 {
		self.count_calls.load(AtomicOrdering::Relaxed)
	}

	fn select(
		&self,
		entity: &EntityDescriptor,
		criteria: &SearchCriteria,
		tenant: &TenantContext,
	) -> Vec<Record> {
		let mut rows = self
			.rows
			.iter()
			.filter(|row| visible(entity, row, tenant))
			.filter(|row| {
				criteria
					.filter
					.as_ref()
					.is_none_or(|filter| matches_filter(row, filter, &entity.key_field))
			})
			.cloned()
			.collect::<Vec<_>>();
		let sort = entity.effective_sort(criteria);

		if !sort.is_empty() {
			rows.sort_by(|left, right| compare_rows(left, right, &sort, &entity.key_field));
		}

		window(rows, criteria)
	}
}
impl DbBackend for MemoryDb {
	fn search<'a>(
		&'a self,
		entity: &'a EntityDescriptor,
		criteria: &'a SearchCriteria,
		tenant: &'a TenantContext,
	) -> BoxFuture<'a, ServiceResult<Vec<Record>>> {
		self.search_calls.fetch_add(1, AtomicOrdering::Relaxed);

		Box::pin(async move { Ok(self.select(entity, criteria, tenant)) })
	}

	fn search_keys<'a>(
		&'a self,
		entity: &'a EntityDescriptor,
		criteria: &'a SearchCriteria,
		tenant: &'a TenantContext,
	) -> BoxFuture<'a, ServiceResult<Vec<i64>>> {
		self.key_calls.fetch_add(1, AtomicOrdering::Relaxed);

		Box::pin(async move {
			Ok(self.select(entity, criteria, tenant).into_iter().filter_map(|row| row.key).collect())
		})
	}

	fn fetch_by_keys<'a>(
		&'a self,
		entity: &'a EntityDescriptor,
		keys: &'a [i64],
		tenant: &'a TenantContext,
	) -> BoxFuture<'a, ServiceResult<Vec<Record>>> {
		self.fetch_calls.fetch_add(1, AtomicOrdering::Relaxed);

		Box::pin(async move {
			Ok(keys
				.iter()
				.filter_map(|key| {
					self.rows
						.iter()
						.find(|row| row.key == Some(*key) && visible(entity, row, tenant))
						.cloned()
				})
				.collect())
		})
	}

	fn count<'a>(
		&'a self,
		entity: &'a EntityDescriptor,
		criteria: &'a SearchCriteria,
		tenant: &'a TenantContext,
	) -> BoxFuture<'a, ServiceResult<u64>> {
		self.count_calls.fetch_add(1, AtomicOrdering::Relaxed);

		Box::pin(async move {
			let unpaged = SearchCriteria {
				filter: criteria.filter.clone(),
				..SearchCriteria::default()
			};

			Ok(self.select(entity, &unpaged, tenant).len() as u64)
		})
	}

	fn find_by_example<'a>(
		&'a self,
		entity: &'a EntityDescriptor,
		example: &'a KeyExample,
		tenant: &'a TenantContext,
	) -> BoxFuture<'a, ServiceResult<Vec<Record>>> {
		Box::pin(async move {
			let mut rows = self
				.rows
				.iter()
				.filter(|row| visible(entity, row, tenant))
				.filter(|row| {
					example.fields.iter().all(|(column, value)| {
						row.fields.get(column).is_some_and(|stored| stored == value)
					})
				})
				.cloned()
				.collect::<Vec<_>>();

			// Caller's own tenant sorts first, mirroring the real backend.
			if let Some(column) = &entity.tenant_column {
				rows.sort_by_key(|row| {
					row.fields.get(column).map(|value| value != &Value::String(tenant.tenant_id.clone()))
				});
			}

			rows.truncate(3);

			Ok(rows)
		})
	}
}

/// An in-memory text backend. Document insertion order is relevance order;
/// documents are records whose fields already carry text-backend names.
#[derive(Default)]
pub struct MemoryText {
	docs: Vec<Record>,
	search_calls: AtomicU32,
	count_calls: AtomicU32,
}
impl MemoryText {
	pub fn new(docs: Vec<Record>) -> Self {
		Self { docs, ..Self::default() }
	}

	pub fn search_call_count(&self) -> u32 {
		self.search_calls.load(AtomicOrdering::Relaxed)
	}

	pub fn count_call_count(&self) -> u32 {
		self.count_calls.load(AtomicOrdering::Relaxed)
	}

	fn select(
		&self,
		entity: &EntityDescriptor,
		criteria: &SearchCriteria,
		tenant: &TenantContext,
	) -> Vec<Record> {
		let mut docs = self
			.docs
			.iter()
			.filter(|doc| visible(entity, doc, tenant))
			.filter(|doc| {
				criteria
					.filter
					.as_ref()
					.is_none_or(|filter| matches_filter(doc, filter, &entity.key_field))
			})
			.cloned()
			.collect::<Vec<_>>();

		if !criteria.sort.is_empty() {
			docs.sort_by(|left, right| compare_rows(left, right, &criteria.sort, &entity.key_field));
		}

		window(docs, criteria)
	}
}
impl TextBackend for MemoryText {
	fn search_keys<'a>(
		&'a self,
		entity: &'a EntityDescriptor,
		criteria: &'a SearchCriteria,
		tenant: &'a TenantContext,
	) -> BoxFuture<'a, ServiceResult<Vec<i64>>> {
		self.search_calls.fetch_add(1, AtomicOrdering::Relaxed);

		Box::pin(async move {
			Ok(self.select(entity, criteria, tenant).into_iter().filter_map(|doc| doc.key).collect())
		})
	}

	fn count<'a>(
		&'a self,
		entity: &'a EntityDescriptor,
		criteria: &'a SearchCriteria,
		tenant: &'a TenantContext,
	) -> BoxFuture<'a, ServiceResult<u64>> {
		self.count_calls.fetch_add(1, AtomicOrdering::Relaxed);

		Box::pin(async move {
			let unpaged = SearchCriteria {
				filter: criteria.filter.clone(),
				..SearchCriteria::default()
			};

			Ok(self.select(entity, &unpaged, tenant).len() as u64)
		})
	}
}

fn window(rows: Vec<Record>, criteria: &SearchCriteria) -> Vec<Record> {
	let take = if criteria.limit == 0 { usize::MAX } else { criteria.limit as usize };

	rows.into_iter().skip(criteria.offset as usize).take(take).collect()
}

fn visible(entity: &EntityDescriptor, row: &Record, tenant: &TenantContext) -> bool {
	let Some(column) = &entity.tenant_column else {
		return true;
	};
	let owner = row.fields.get(column).and_then(|value| value.as_str()).unwrap_or_default();

	match entity.tenant_policy.restriction(tenant) {
		TenantRestriction::None => true,
		TenantRestriction::Only(tenant_id) => owner == tenant_id,
		TenantRestriction::MeOrGlobal { me, global } => owner == me || owner == global,
	}
}

fn matches_filter(row: &Record, node: &FilterNode, key_field: &str) -> bool {
	match node {
		FilterNode::Field(leaf) => {
			let value = if leaf.path == key_field {
				row.key.map(Value::from)
			} else {
				row.fields.get(&leaf.path).cloned()
			};

			matches_leaf(value.as_ref(), &leaf.predicate)
		},
		FilterNode::Not(child) => !matches_filter(row, child, key_field),
		FilterNode::And(left, right) =>
			matches_filter(row, left, key_field) && matches_filter(row, right, key_field),
		FilterNode::Or(left, right) =>
			matches_filter(row, left, key_field) || matches_filter(row, right, key_field),
	}
}

fn matches_leaf(value: Option<&Value>, predicate: &FieldPredicate) -> bool {
	let Some(value) = value else {
		return false;
	};

	match predicate {
		FieldPredicate::TextEquals(text) => value.as_str() == Some(text),
		FieldPredicate::TextPrefix(prefix) =>
			value.as_str().is_some_and(|text| text.starts_with(prefix)),
		FieldPredicate::TextRange { lower, upper } => value.as_str().is_some_and(|text| {
			lower.as_deref().is_none_or(|bound| text >= bound)
				&& upper.as_deref().is_none_or(|bound| text <= bound)
		}),
		FieldPredicate::IntEquals(expected) => value.as_i64() == Some(*expected),
		FieldPredicate::IntIn(values) | FieldPredicate::KeyIn(values) =>
			value.as_i64().is_some_and(|actual| values.contains(&actual)),
		FieldPredicate::IntRange { lower, upper } => value.as_i64().is_some_and(|actual| {
			lower.is_none_or(|bound| actual >= bound) && upper.is_none_or(|bound| actual <= bound)
		}),
		FieldPredicate::FloatRange { lower, upper } => value.as_f64().is_some_and(|actual| {
			lower.is_none_or(|bound| actual >= bound) && upper.is_none_or(|bound| actual <= bound)
		}),
		FieldPredicate::BoolEquals(expected) => value.as_bool() == Some(*expected),
		// Stored representation comparisons: tests populate token strings or
		// ordinal numbers directly.
		FieldPredicate::EnumEquals(expected) => enum_matches(value, expected),
		FieldPredicate::EnumIn(values) => values.iter().any(|expected| enum_matches(value, expected)),
		FieldPredicate::EnumSetContainsAll(values) => value.as_array().is_some_and(|stored| {
			values.iter().all(|expected| stored.iter().any(|item| enum_matches(item, expected)))
		}),
		FieldPredicate::TimeRange { lower, upper } => value.as_str().is_some_and(|text| {
			let lower = lower.and_then(|bound| bound.format(&Rfc3339).ok());
			let upper = upper.and_then(|bound| bound.format(&Rfc3339).ok());

			lower.as_deref().is_none_or(|bound| text >= bound)
				&& upper.as_deref().is_none_or(|bound| text <= bound)
		}),
	}
}

fn enum_matches(stored: &Value, expected: &sift_domain::EnumValue) -> bool {
	match expected {
		sift_domain::EnumValue::Token(token) => stored.as_str() == Some(token),
		sift_domain::EnumValue::Ordinal(ordinal) => stored.as_i64() == Some(*ordinal as i64),
		sift_domain::EnumValue::Name(_) => false,
	}
}

fn compare_rows(left: &Record, right: &Record, sort: &[SortColumn], key_field: &str) -> Ordering {
	for column in sort {
		let lhs = field_value(left, &column.path, key_field);
		let rhs = field_value(right, &column.path, key_field);
		let ordering = compare_values(lhs.as_ref(), rhs.as_ref());
		let ordering = if column.descending { ordering.reverse() } else { ordering };

		if ordering != Ordering::Equal {
			return ordering;
		}
	}

	Ordering::Equal
}

fn field_value(row: &Record, path: &str, key_field: &str) -> Option<Value> {
	if path == key_field {
		return row.key.map(Value::from);
	}

	row.fields.get(path).cloned()
}

fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
	match (left, right) {
		(None, None) => Ordering::Equal,
		(None, Some(_)) => Ordering::Greater,
		(Some(_), None) => Ordering::Less,
		(Some(Value::String(lhs)), Some(Value::String(rhs))) => lhs.cmp(rhs),
		(Some(Value::Bool(lhs)), Some(Value::Bool(rhs))) => lhs.cmp(rhs),
		(Some(lhs), Some(rhs)) => match (lhs.as_f64(), rhs.as_f64()) {
			(Some(lhs), Some(rhs)) => lhs.partial_cmp(&rhs).unwrap_or(Ordering::Equal),
			_ => Ordering::Equal,
		},
	}
}
