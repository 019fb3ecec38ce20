//! Text-backend adapter. Documents mirror relational rows: a numeric point id
//! (or a payload key field) carries the primary key, and leaf predicates
//! translate into payload conditions on the entity's collection.

use std::collections::HashMap;

use qdrant_client::qdrant::{
	Condition, CountPointsBuilder, DatetimeRange, Direction, Document, Filter, OrderBy, PointId,
	Query, QueryPointsBuilder, Range, ScrollPointsBuilder, Timestamp, Value,
	point_id::PointIdOptions, value::Kind,
};
use time::OffsetDateTime;

use sift_domain::{
	EntityDescriptor, Error, FieldFilter, FieldPredicate, FilterNode, SearchCriteria,
	TenantContext, TenantRestriction,
};

use crate::Result;

pub const BM25_MODEL: &str = "qdrant/bm25";
pub const BM25_VECTOR_NAME: &str = "bm25";

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
}
impl QdrantStore {
	pub fn new(cfg: &sift_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client })
	}

	/// Runs the text subset and returns matching primary keys. With a free-text
	/// expression the keys come back in relevance order; otherwise in the
	/// (single-column) sort order, or backend order when no sort is given.
	pub async fn search_keys(
		&self,
		entity: &EntityDescriptor,
		criteria: &SearchCriteria,
		tenant: &TenantContext,
	) -> Result<Vec<i64>> {
		let filter = build_filter(entity, criteria.filter.as_ref(), tenant)?;

		if let Some(expression) = &criteria.expression {
			return self.query_by_relevance(entity, criteria, filter, expression).await;
		}

		self.scroll(entity, criteria, filter).await
	}

	pub async fn count(
		&self,
		entity: &EntityDescriptor,
		criteria: &SearchCriteria,
		tenant: &TenantContext,
	) -> Result<u64> {
		let filter = build_filter(entity, criteria.filter.as_ref(), tenant)?;
		let mut count = CountPointsBuilder::new(entity.document_name.clone()).exact(true);

		if let Some(filter) = filter {
			count = count.filter(filter);
		}

		let response = self.client.count(count).await?;

		Ok(response.result.map(|result| result.count).unwrap_or(0))
	}

	async fn query_by_relevance(
		&self,
		entity: &EntityDescriptor,
		criteria: &SearchCriteria,
		filter: Option<Filter>,
		expression: &str,
	) -> Result<Vec<i64>> {
		let mut query = QueryPointsBuilder::new(entity.document_name.clone())
			.query(Query::new_nearest(Document::new(expression.to_string(), BM25_MODEL)))
			.using(BM25_VECTOR_NAME)
			.with_payload(true)
			.limit(fetch_limit(criteria.limit));

		if criteria.offset != 0 {
			query = query.offset(criteria.offset as u64);
		}
		if let Some(filter) = filter {
			query = query.filter(filter);
		}

		let response = self.client.query(query).await?;

		Ok(response
			.result
			.iter()
			.filter_map(|point| {
				record_key(point.id.as_ref(), &point.payload, entity).or_else(|| {
					tracing::warn!(
						entity = %entity.name,
						"Scored point without a usable key; skipping."
					);

					None
				})
			})
			.collect())
	}

	async fn scroll(
		&self,
		entity: &EntityDescriptor,
		criteria: &SearchCriteria,
		filter: Option<Filter>,
	) -> Result<Vec<i64>> {
		// Scroll has no numeric offset, so the window is fetched from the start
		// and the leading rows are dropped client-side.
		let window = fetch_limit(criteria.limit).saturating_add(criteria.offset as u64);
		let mut scroll = ScrollPointsBuilder::new(entity.document_name.clone())
			.with_payload(true)
			.limit(window.min(u32::MAX as u64) as u32);

		if let Some(filter) = filter {
			scroll = scroll.filter(filter);
		}
		if let Some(column) = criteria.sort.first() {
			if criteria.sort.len() > 1 {
				tracing::warn!(
					entity = %entity.name,
					"Text backend applies only the first sort column."
				);
			}

			let direction =
				if column.descending { Direction::Desc } else { Direction::Asc };

			scroll = scroll.order_by(OrderBy {
				key: column.path.clone(),
				direction: Some(direction as i32),
				start_from: None,
			});
		}

		let response = self.client.scroll(scroll).await?;

		Ok(response
			.result
			.iter()
			.filter_map(|point| {
				record_key(point.id.as_ref(), &point.payload, entity).or_else(|| {
					tracing::warn!(
						entity = %entity.name,
						"Scrolled point without a usable key; skipping."
					);

					None
				})
			})
			.skip(criteria.offset as usize)
			.collect())
	}
}

fn fetch_limit(limit: u32) -> u64 {
	if limit == 0 { u32::MAX as u64 } else { limit as u64 }
}

fn record_key(
	id: Option<&PointId>,
	payload: &HashMap<String, Value>,
	entity: &EntityDescriptor,
) -> Option<i64> {
	if let Some(value) = payload.get(&entity.key_field)
		&& let Some(Kind::IntegerValue(key)) = &value.kind
	{
		return Some(*key);
	}

	match id?.point_id_options.as_ref()? {
		PointIdOptions::Num(key) => i64::try_from(*key).ok(),
		_ => None,
	}
}

/// Combines the caller's (already field-remapped) text subset with the tenant
/// restriction into one top-level conjunction.
fn build_filter(
	entity: &EntityDescriptor,
	filter: Option<&FilterNode>,
	tenant: &TenantContext,
) -> Result<Option<Filter>> {
	let mut must = Vec::new();

	if let Some(filter) = filter {
		must.push(to_condition(entity, filter)?);
	}

	match entity.tenant_policy.restriction(tenant) {
		TenantRestriction::None => {},
		TenantRestriction::Only(tenant_id) => {
			must.push(Condition::matches(tenant_field(entity)?, tenant_id));
		},
		TenantRestriction::MeOrGlobal { me, global } => {
			must.push(Condition::matches(tenant_field(entity)?, vec![me, global]));
		},
	}

	if must.is_empty() {
		return Ok(None);
	}

	Ok(Some(Filter { must, ..Filter::default() }))
}

/// Documents carry the tenant under the same name as the relational column.
fn tenant_field(entity: &EntityDescriptor) -> Result<String> {
	entity.tenant_column.clone().ok_or_else(|| {
		Error::InvalidDescriptor {
			entity: entity.name.clone(),
			message: "tenant restriction requires a tenant column".to_string(),
		}
		.into()
	})
}

fn to_condition(entity: &EntityDescriptor, node: &FilterNode) -> Result<Condition> {
	match node {
		FilterNode::Field(leaf) => leaf_condition(entity, leaf),
		FilterNode::Not(child) => Ok(Condition::from(Filter {
			must_not: vec![to_condition(entity, child)?],
			..Filter::default()
		})),
		FilterNode::And(left, right) => Ok(Condition::from(Filter::all([
			to_condition(entity, left)?,
			to_condition(entity, right)?,
		]))),
		FilterNode::Or(left, right) => Ok(Condition::from(Filter {
			should: vec![to_condition(entity, left)?, to_condition(entity, right)?],
			..Filter::default()
		})),
	}
}

fn leaf_condition(entity: &EntityDescriptor, leaf: &FieldFilter) -> Result<Condition> {
	let field = leaf.path.clone();
	let unsupported = || -> crate::Error {
		Error::invalid_filter(
			&leaf.path,
			format!(
				"operator '{}' is not supported by the text backend",
				leaf.predicate.operator_name()
			),
		)
		.into()
	};

	let condition = match &leaf.predicate {
		FieldPredicate::TextEquals(text) => Condition::matches(field, text.clone()),
		// Token-level full-text match; the closest the backend offers to a
		// leading-substring predicate.
		FieldPredicate::TextPrefix(text) => Condition::matches_text(field, text.clone()),
		FieldPredicate::TextRange { .. } => return Err(unsupported()),
		FieldPredicate::IntEquals(value) => Condition::matches(field, *value),
		FieldPredicate::IntIn(values) | FieldPredicate::KeyIn(values) =>
			Condition::matches(field, values.clone()),
		FieldPredicate::IntRange { lower, upper } => Condition::range(field, Range {
			gte: lower.map(|value| value as f64),
			lte: upper.map(|value| value as f64),
			..Range::default()
		}),
		FieldPredicate::FloatRange { lower, upper } => Condition::range(field, Range {
			gte: *lower,
			lte: *upper,
			..Range::default()
		}),
		FieldPredicate::BoolEquals(value) => Condition::matches(field, *value),
		FieldPredicate::EnumEquals(value) => {
			let stored = resolve_enum(entity, &leaf.path, value)?;

			match stored {
				StoredEnum::Token(token) => Condition::matches(field, token),
				StoredEnum::Ordinal(ordinal) => Condition::matches(field, ordinal),
			}
		},
		FieldPredicate::EnumIn(values) => {
			let stored = values
				.iter()
				.map(|value| resolve_enum(entity, &leaf.path, value))
				.collect::<Result<Vec<_>>>()?;

			if stored.iter().all(|value| matches!(value, StoredEnum::Token(_))) {
				let tokens = stored
					.into_iter()
					.filter_map(|value| match value {
						StoredEnum::Token(token) => Some(token),
						StoredEnum::Ordinal(_) => None,
					})
					.collect::<Vec<_>>();

				Condition::matches(field, tokens)
			} else {
				let ordinals = stored
					.into_iter()
					.map(|value| match value {
						StoredEnum::Token(_) => 0,
						StoredEnum::Ordinal(ordinal) => ordinal,
					})
					.collect::<Vec<_>>();

				Condition::matches(field, ordinals)
			}
		},
		FieldPredicate::EnumSetContainsAll(values) => {
			let conditions = values
				.iter()
				.map(|value| {
					resolve_enum(entity, &leaf.path, value).map(|stored| match stored {
						StoredEnum::Token(token) => Condition::matches(leaf.path.clone(), token),
						StoredEnum::Ordinal(ordinal) =>
							Condition::matches(leaf.path.clone(), ordinal),
					})
				})
				.collect::<Result<Vec<_>>>()?;

			Condition::from(Filter::all(conditions))
		},
		FieldPredicate::TimeRange { lower, upper } =>
			Condition::datetime_range(field, DatetimeRange {
				gte: lower.map(to_timestamp),
				lte: upper.map(to_timestamp),
				..DatetimeRange::default()
			}),
	};

	Ok(condition)
}

enum StoredEnum {
	Token(String),
	Ordinal(i64),
}

/// Text-side enum resolution works on the original relational field when the
/// leaf was remapped to a document field, falling back to a literal token when
/// the path is unknown to the schema.
fn resolve_enum(
	entity: &EntityDescriptor,
	path: &str,
	value: &sift_domain::EnumValue,
) -> Result<StoredEnum> {
	let original = entity
		.text_field_mappings
		.iter()
		.find(|(_, mapped)| mapped.as_str() == path)
		.map(|(original, _)| original.as_str())
		.unwrap_or(path);
	let field = match original.split('.').next_back().and_then(|name| entity.field(name)) {
		Some(field) => field,
		None =>
			return match value {
				sift_domain::EnumValue::Token(token) => Ok(StoredEnum::Token(token.clone())),
				sift_domain::EnumValue::Ordinal(ordinal) => Ok(StoredEnum::Ordinal(*ordinal as i64)),
				sift_domain::EnumValue::Name(_) => Err(Error::invalid_filter(
					path,
					"enum name cannot be resolved without a field descriptor",
				)
				.into()),
			},
	};

	match field.resolve_enum(value)? {
		serde_json::Value::String(token) => Ok(StoredEnum::Token(token)),
		other => Ok(StoredEnum::Ordinal(other.as_i64().unwrap_or_default())),
	}
}

fn to_timestamp(datetime: OffsetDateTime) -> Timestamp {
	Timestamp { seconds: datetime.unix_timestamp(), nanos: datetime.nanosecond() as i32 }
}

#[cfg(test)]
mod tests {
	use super::*;
	use qdrant_client::qdrant::condition::ConditionOneOf;
	use sift_domain::TenantPolicy;

	fn entity() -> EntityDescriptor {
		EntityDescriptor::builder("order", "orders")
			.tenant_column("tenant_id")
			.tenant_policy(TenantPolicy { me_or_global: true, ..TenantPolicy::isolated() })
			.field("order_id", "order_id", sift_domain::FieldKind::Text)
			.build()
			.unwrap()
	}

	#[test]
	fn tenant_restriction_joins_the_must_clause() {
		let entity = entity();
		let filter = FilterNode::field("order_id", FieldPredicate::TextEquals("A-1".to_string()));
		let built =
			build_filter(&entity, Some(&filter), &TenantContext::new("acme")).unwrap().unwrap();

		assert_eq!(built.must.len(), 2);
	}

	#[test]
	fn not_nodes_become_must_not_filters() {
		let entity = entity();
		let node =
			FilterNode::not(FilterNode::field("order_id", FieldPredicate::TextEquals(
				"A-1".to_string(),
			)));
		let condition = to_condition(&entity, &node).unwrap();
		let Some(ConditionOneOf::Filter(filter)) = condition.condition_one_of else {
			panic!("expected a nested filter condition");
		};

		assert_eq!(filter.must_not.len(), 1);
		assert!(filter.must.is_empty());
	}

	#[test]
	fn text_range_is_rejected_on_the_text_backend() {
		let entity = entity();
		let node = FilterNode::field("order_id", FieldPredicate::TextRange {
			lower: Some("a".to_string()),
			upper: None,
		});

		assert!(to_condition(&entity, &node).is_err());
	}
}
