//! Compiles the abstract search vocabulary into Postgres SQL. Dotted paths walk
//! the registered relations and become LEFT JOIN aliases; leaf predicates are
//! checked against the field kind before anything is pushed into the builder.

use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};

use sift_domain::{
	Aggregate, EntityDescriptor, Error, FieldFilter, FieldKind, FilterNode, Grouping, KeyExample,
	Registry, RelationDescriptor, SearchCriteria, SortColumn, TenantContext, TenantRestriction,
};

use crate::Result;

/// What a compiled query returns per row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectKind {
	/// Full records, one output column per registered field plus the key.
	Records,
	/// Primary keys only, for driving a combined search.
	Keys,
	/// A single count row.
	Count,
}

/// Decode plan for one output column, positional.
#[derive(Clone, Debug)]
pub struct OutputColumn {
	pub name: String,
	pub kind: FieldKind,
	pub is_key: bool,
}

/// A ready-to-execute query plus the plan for decoding its rows.
pub struct SelectQuery {
	pub builder: QueryBuilder<'static, Postgres>,
	pub columns: Vec<OutputColumn>,
}

struct Join {
	parent_alias: String,
	segment: String,
	alias: String,
	clause: String,
}

/// Path resolution state for one query: the root entity is `t0`, every distinct
/// relation hop gets a stable `tN` alias and a LEFT JOIN clause.
struct PathScope<'a> {
	registry: &'a Registry,
	root: &'a EntityDescriptor,
	joins: Vec<Join>,
}

struct Resolved {
	expr: String,
	kind: FieldKind,
	/// The owning field, kept around to translate caller-side enum values.
	enum_field: Option<sift_domain::FieldDescriptor>,
}

impl<'a> PathScope<'a> {
	fn new(registry: &'a Registry, root: &'a EntityDescriptor) -> Self {
		Self { registry, root, joins: Vec::new() }
	}

	fn resolve(&mut self, path: &str) -> Result<Resolved> {
		let registry = self.registry;
		let mut entity = self.root;
		let mut alias = "t0".to_string();
		let segments = path.split('.').collect::<Vec<_>>();

		for (index, segment) in segments.iter().enumerate() {
			let last = index + 1 == segments.len();

			if last {
				if *segment == entity.key_field {
					return Ok(Resolved {
						expr: format!("{alias}.{}", entity.key_column),
						kind: FieldKind::Int,
						enum_field: None,
					});
				}

				let field = entity.field(segment).ok_or_else(|| {
					Error::invalid_filter(path, format!("unknown field on entity '{}'", entity.name))
				})?;
				let enum_field =
					matches!(field.kind, FieldKind::Enum { .. } | FieldKind::EnumSet { .. })
						.then(|| field.clone());

				return Ok(Resolved {
					expr: format!("{alias}.{}", field.column),
					kind: field.kind.clone(),
					enum_field,
				});
			}

			let relation = entity.relation(segment).ok_or_else(|| {
				Error::invalid_filter(
					path,
					format!("unknown relation segment on entity '{}'", entity.name),
				)
			})?;
			let target = registry.get(&relation.target_entity)?;

			alias = self.join(&alias, entity, relation, target);
			entity = target;
		}

		Err(Error::invalid_filter(path, "empty field path").into())
	}

	fn join(
		&mut self,
		parent_alias: &str,
		parent: &EntityDescriptor,
		relation: &RelationDescriptor,
		target: &EntityDescriptor,
	) -> String {
		if let Some(existing) = self
			.joins
			.iter()
			.find(|join| join.parent_alias == parent_alias && join.segment == relation.segment)
		{
			return existing.alias.clone();
		}

		let alias = format!("t{}", self.joins.len() + 1);

		self.joins.push(Join {
			clause: format!(
				"LEFT JOIN {} {alias} ON {alias}.{} = {parent_alias}.{}",
				target.table, relation.parent_column, parent.key_column
			),
			parent_alias: parent_alias.to_string(),
			segment: relation.segment.clone(),
			alias: alias.clone(),
		});

		alias
	}
}

/// Compiles one search into SQL. All joins, the caller filter, the tenant
/// restriction, grouping, sorting, and pagination end up in a single statement.
pub fn build_search(
	registry: &Registry,
	entity: &EntityDescriptor,
	criteria: &SearchCriteria,
	tenant: &TenantContext,
	kind: SelectKind,
) -> Result<SelectQuery> {
	let mut scope = PathScope::new(registry, entity);
	let sort = entity.effective_sort(criteria);

	// Resolve every path up front so the join list is complete before the
	// SELECT and FROM clauses are emitted.
	if let Some(filter) = &criteria.filter {
		register_filter(&mut scope, filter)?;
	}

	let mut sort_exprs = Vec::with_capacity(sort.len());

	for column in &sort {
		sort_exprs.push(scope.resolve(&column.path)?.expr);
	}

	let grouping = match (kind, &criteria.grouping) {
		(SelectKind::Records, Some(grouping)) => {
			validate_grouping(entity, grouping)?;

			Some(grouping)
		},
		_ => None,
	};
	let (select, columns) = match kind {
		SelectKind::Records => match grouping {
			Some(grouping) => grouped_select(entity, grouping),
			None => record_select(entity, criteria.apply_distinct),
		},
		SelectKind::Keys => keys_select(entity, &scope, &sort_exprs),
		SelectKind::Count => (count_select(entity, criteria.apply_distinct, &scope), Vec::new()),
	};
	let mut builder = QueryBuilder::new(select);

	builder.push(format!(" FROM {} t0", entity.table));

	for join in &scope.joins {
		builder.push(format!(" {}", join.clause));
	}

	let mut has_where = false;

	if let Some(filter) = &criteria.filter {
		builder.push(" WHERE ");
		push_filter(&mut scope, &mut builder, filter)?;
		has_where = true;
	}

	push_tenant(&mut builder, entity, tenant, &mut has_where)?;

	if let Some(grouping) = grouping {
		let grouped = grouping
			.group_by
			.iter()
			.map(|name| Ok(scope.resolve(name)?.expr))
			.collect::<Result<Vec<_>>>()?;

		builder.push(format!(" GROUP BY {}", grouped.join(", ")));
	}
	if kind != SelectKind::Count && !sort.is_empty() {
		push_order_by(&mut scope, &mut builder, &sort, grouping)?;
	}
	if kind != SelectKind::Count {
		if criteria.limit != 0 {
			builder.push(format!(" LIMIT {}", criteria.limit));
		}
		if criteria.offset != 0 {
			builder.push(format!(" OFFSET {}", criteria.offset));
		}
	}

	Ok(SelectQuery { builder, columns })
}

/// Fetches full records for an explicit key set. Row order is unspecified; the
/// caller re-establishes whatever order it needs.
pub fn build_fetch_by_keys(
	entity: &EntityDescriptor,
	keys: &[i64],
	tenant: &TenantContext,
) -> Result<SelectQuery> {
	let (select, columns) = record_select(entity, false);
	let mut builder = QueryBuilder::new(select);

	builder.push(format!(" FROM {} t0 WHERE t0.{} = ANY(", entity.table, entity.key_column));
	builder.push_bind(keys.to_vec());
	builder.push(")");

	let mut has_where = true;

	push_tenant(&mut builder, entity, tenant, &mut has_where)?;

	Ok(SelectQuery { builder, columns })
}

/// Query-by-example for generic-key lookup: equality on every populated key
/// field, the caller's row visibility, and the caller's own tenant ordered
/// first so a two-row me-or-global result is disambiguated deterministically.
/// Three rows are enough to distinguish "unique", "shadowed", and "too many".
pub fn build_by_example(
	entity: &EntityDescriptor,
	example: &KeyExample,
	tenant: &TenantContext,
) -> Result<SelectQuery> {
	let (select, columns) = record_select(entity, false);
	let mut builder = QueryBuilder::new(select);

	builder.push(format!(" FROM {} t0", entity.table));

	let mut has_where = false;

	for (column, value) in &example.fields {
		builder.push(if has_where { " AND " } else { " WHERE " });
		builder.push(format!("t0.{column} = "));
		push_stored_value(&mut builder, column, value)?;
		has_where = true;
	}

	push_tenant(&mut builder, entity, tenant, &mut has_where)?;

	if entity.tenant_policy.isolated
		&& let Some(column) = &entity.tenant_column
	{
		builder.push(format!(" ORDER BY (t0.{column} = "));
		builder.push_bind(tenant.tenant_id.clone());
		builder.push(") DESC");
	}

	builder.push(" LIMIT 3");

	Ok(SelectQuery { builder, columns })
}

fn record_select(entity: &EntityDescriptor, distinct: bool) -> (String, Vec<OutputColumn>) {
	let mut parts = vec![format!("t0.{}", entity.key_column)];
	let mut columns = vec![OutputColumn {
		name: entity.key_field.clone(),
		kind: FieldKind::Int,
		is_key: true,
	}];

	for field in &entity.fields {
		parts.push(format!("t0.{}", field.column));
		columns.push(OutputColumn {
			name: field.name.clone(),
			kind: field.kind.clone(),
			is_key: false,
		});
	}

	let select =
		format!("SELECT {}{}", if distinct { "DISTINCT " } else { "" }, parts.join(", "));

	(select, columns)
}

/// Aggregated rows carry no key: every selected column is either grouped, an
/// explicit aggregate, or the default aggregate for its kind.
fn grouped_select(entity: &EntityDescriptor, grouping: &Grouping) -> (String, Vec<OutputColumn>) {
	let mut parts = Vec::with_capacity(entity.fields.len());
	let mut columns = Vec::with_capacity(entity.fields.len());

	for field in &entity.fields {
		let expr = format!("t0.{}", field.column);
		let (expr, kind) = if grouping.is_grouped(&field.name) {
			(expr, field.kind.clone())
		} else if let Some(function) = grouping.aggregate_for(&field.name) {
			(aggregate_sql(function, &expr), aggregate_kind(function, &field.kind))
		} else {
			(default_aggregate(&expr, &field.kind), field.kind.clone())
		};

		parts.push(expr);
		columns.push(OutputColumn { name: field.name.clone(), kind, is_key: false });
	}

	(format!("SELECT {}", parts.join(", ")), columns)
}

fn keys_select(
	entity: &EntityDescriptor,
	scope: &PathScope,
	sort_exprs: &[String],
) -> (String, Vec<OutputColumn>) {
	let key = format!("t0.{}", entity.key_column);
	let column = OutputColumn { name: entity.key_field.clone(), kind: FieldKind::Int, is_key: true };

	if scope.joins.is_empty() {
		return (format!("SELECT {key}"), vec![column]);
	}

	// Joins can fan rows out. DISTINCT dedupes, which in turn forces the sort
	// expressions into the select list.
	let mut parts = vec![key];

	for expr in sort_exprs {
		if !parts.contains(expr) {
			parts.push(expr.clone());
		}
	}

	(format!("SELECT DISTINCT {}", parts.join(", ")), vec![column])
}

fn count_select(entity: &EntityDescriptor, distinct: bool, scope: &PathScope) -> String {
	if distinct || !scope.joins.is_empty() {
		format!("SELECT COUNT(DISTINCT t0.{})", entity.key_column)
	} else {
		"SELECT COUNT(*)".to_string()
	}
}

fn validate_grouping(entity: &EntityDescriptor, grouping: &Grouping) -> Result<()> {
	for name in &grouping.group_by {
		if name.contains('.') {
			return Err(Error::invalid_filter(name, "grouping requires root-level fields").into());
		}

		entity.require_field(name)?;
	}
	for aggregate in &grouping.aggregates {
		entity.require_field(&aggregate.field)?;
	}

	Ok(())
}

fn aggregate_sql(function: Aggregate, expr: &str) -> String {
	match function {
		Aggregate::Sum => format!("SUM({expr})::float8"),
		Aggregate::Avg => format!("AVG({expr})::float8"),
		Aggregate::Max => format!("MAX({expr})"),
		Aggregate::Min => format!("MIN({expr})"),
		Aggregate::Count => format!("COUNT({expr})"),
		Aggregate::CountDistinct => format!("COUNT(DISTINCT {expr})"),
	}
}

fn default_aggregate(expr: &str, kind: &FieldKind) -> String {
	if matches!(kind, FieldKind::Bool) { "false".to_string() } else { format!("MAX({expr})") }
}

fn aggregate_kind(function: Aggregate, kind: &FieldKind) -> FieldKind {
	match function {
		Aggregate::Sum | Aggregate::Avg => FieldKind::Float,
		Aggregate::Count | Aggregate::CountDistinct => FieldKind::Int,
		Aggregate::Max | Aggregate::Min => kind.clone(),
	}
}

fn push_order_by(
	scope: &mut PathScope,
	builder: &mut QueryBuilder<'static, Postgres>,
	sort: &[SortColumn],
	grouping: Option<&Grouping>,
) -> Result<()> {
	builder.push(" ORDER BY ");

	for (index, column) in sort.iter().enumerate() {
		if index != 0 {
			builder.push(", ");
		}

		let resolved = scope.resolve(&column.path)?;
		// Under grouping, a sort on an ungrouped first-level column must order
		// by the aggregated expression the select list produces.
		let expr = match grouping {
			Some(grouping) if !column.path.contains('.') && !grouping.is_grouped(&column.path) =>
				match grouping.aggregate_for(&column.path) {
					Some(function) => aggregate_sql(function, &resolved.expr),
					None => default_aggregate(&resolved.expr, &resolved.kind),
				},
			_ => resolved.expr,
		};

		builder.push(expr);

		if column.descending {
			builder.push(" DESC");
		}
	}

	Ok(())
}

fn push_tenant(
	builder: &mut QueryBuilder<'static, Postgres>,
	entity: &EntityDescriptor,
	tenant: &TenantContext,
	has_where: &mut bool,
) -> Result<()> {
	let restriction = entity.tenant_policy.restriction(tenant);

	if restriction == TenantRestriction::None {
		return Ok(());
	}

	let column = entity.tenant_column.as_ref().ok_or_else(|| Error::InvalidDescriptor {
		entity: entity.name.clone(),
		message: "tenant restriction requires a tenant column".to_string(),
	})?;

	builder.push(if *has_where { " AND " } else { " WHERE " });
	*has_where = true;

	match restriction {
		TenantRestriction::Only(tenant_id) => {
			builder.push(format!("t0.{column} = "));
			builder.push_bind(tenant_id);
		},
		TenantRestriction::MeOrGlobal { me, global } => {
			builder.push(format!("t0.{column} IN ("));
			builder.push_bind(me);
			builder.push(", ");
			builder.push_bind(global);
			builder.push(")");
		},
		TenantRestriction::None => unreachable!(),
	}

	Ok(())
}

fn register_filter(scope: &mut PathScope, node: &FilterNode) -> Result<()> {
	match node {
		FilterNode::Field(leaf) => {
			scope.resolve(&leaf.path)?;
		},
		FilterNode::Not(child) => register_filter(scope, child)?,
		FilterNode::And(left, right) | FilterNode::Or(left, right) => {
			register_filter(scope, left)?;
			register_filter(scope, right)?;
		},
	}

	Ok(())
}

fn push_filter(
	scope: &mut PathScope,
	builder: &mut QueryBuilder<'static, Postgres>,
	node: &FilterNode,
) -> Result<()> {
	match node {
		FilterNode::Field(leaf) => {
			let resolved = scope.resolve(&leaf.path)?;

			push_leaf(builder, &resolved, leaf)
		},
		FilterNode::Not(child) => {
			builder.push("NOT (");
			push_filter(scope, builder, child)?;
			builder.push(")");

			Ok(())
		},
		FilterNode::And(left, right) => {
			builder.push("(");
			push_filter(scope, builder, left)?;
			builder.push(" AND ");
			push_filter(scope, builder, right)?;
			builder.push(")");

			Ok(())
		},
		FilterNode::Or(left, right) => {
			builder.push("(");
			push_filter(scope, builder, left)?;
			builder.push(" OR ");
			push_filter(scope, builder, right)?;
			builder.push(")");

			Ok(())
		},
	}
}

fn push_leaf(
	builder: &mut QueryBuilder<'static, Postgres>,
	resolved: &Resolved,
	leaf: &FieldFilter,
) -> Result<()> {
	use sift_domain::FieldPredicate as P;

	let mismatch = || -> crate::Error {
		Error::invalid_filter(
			&leaf.path,
			format!("operator '{}' does not apply to this field", leaf.predicate.operator_name()),
		)
		.into()
	};

	match (&leaf.predicate, &resolved.kind) {
		(P::TextEquals(text), FieldKind::Text) => {
			builder.push(format!("{} = ", resolved.expr));
			builder.push_bind(text.clone());
		},
		(P::TextPrefix(prefix), FieldKind::Text) => {
			builder.push(format!("{} LIKE ", resolved.expr));
			builder.push_bind(format!("{}%", escape_like(prefix)));
			builder.push(" ESCAPE '\\'");
		},
		(P::TextRange { lower, upper }, FieldKind::Text) =>
			push_range(builder, resolved, leaf, lower.clone(), upper.clone())?,
		(P::IntEquals(value), FieldKind::Int) => {
			builder.push(format!("{} = ", resolved.expr));
			builder.push_bind(*value);
		},
		(P::IntIn(values) | P::KeyIn(values), FieldKind::Int) => {
			builder.push(format!("{} = ANY(", resolved.expr));
			builder.push_bind(values.clone());
			builder.push(")");
		},
		(P::IntRange { lower, upper }, FieldKind::Int) =>
			push_range(builder, resolved, leaf, *lower, *upper)?,
		(P::FloatRange { lower, upper }, FieldKind::Float) =>
			push_range(builder, resolved, leaf, *lower, *upper)?,
		(P::BoolEquals(value), FieldKind::Bool) => {
			builder.push(format!("{} = ", resolved.expr));
			builder.push_bind(*value);
		},
		(P::EnumEquals(value), FieldKind::Enum { .. }) => {
			let field = resolved.enum_field.as_ref().ok_or_else(mismatch)?;

			builder.push(format!("{} = ", resolved.expr));
			push_stored_value(builder, &leaf.path, &field.resolve_enum(value)?)?;
		},
		(P::EnumIn(values), FieldKind::Enum { .. }) => {
			let field = resolved.enum_field.as_ref().ok_or_else(mismatch)?;
			let stored = values
				.iter()
				.map(|value| field.resolve_enum(value))
				.collect::<sift_domain::Result<Vec<_>>>()?;

			builder.push(format!("{} = ANY(", resolved.expr));

			if stored.iter().all(|value| matches!(value, Value::String(_))) {
				let tokens = stored
					.into_iter()
					.filter_map(|value| match value {
						Value::String(token) => Some(token),
						_ => None,
					})
					.collect::<Vec<_>>();

				builder.push_bind(tokens);
			} else {
				let ordinals = stored
					.into_iter()
					.filter_map(|value| value.as_i64())
					.collect::<Vec<_>>();

				builder.push_bind(ordinals);
			}

			builder.push(")");
		},
		(P::EnumSetContainsAll(values), FieldKind::EnumSet { .. }) => {
			let field = resolved.enum_field.as_ref().ok_or_else(mismatch)?;
			let tokens = values
				.iter()
				.map(|value| {
					field.resolve_enum(value).map(|stored| match stored {
						Value::String(token) => token,
						other => other.to_string(),
					})
				})
				.collect::<sift_domain::Result<Vec<_>>>()?;

			builder.push(format!("{} @> ", resolved.expr));
			builder.push_bind(tokens);
		},
		(P::TimeRange { lower, upper }, FieldKind::Timestamp) =>
			push_range(builder, resolved, leaf, *lower, *upper)?,
		_ => return Err(mismatch()),
	}

	Ok(())
}

fn push_range<T>(
	builder: &mut QueryBuilder<'static, Postgres>,
	resolved: &Resolved,
	leaf: &FieldFilter,
	lower: Option<T>,
	upper: Option<T>,
) -> Result<()>
where
	T: 'static + Send + sqlx::Type<Postgres> + for<'q> sqlx::Encode<'q, Postgres>,
{
	match (lower, upper) {
		(Some(lower), Some(upper)) => {
			builder.push(format!("({} >= ", resolved.expr));
			builder.push_bind(lower);
			builder.push(format!(" AND {} <= ", resolved.expr));
			builder.push_bind(upper);
			builder.push(")");
		},
		(Some(lower), None) => {
			builder.push(format!("{} >= ", resolved.expr));
			builder.push_bind(lower);
		},
		(None, Some(upper)) => {
			builder.push(format!("{} <= ", resolved.expr));
			builder.push_bind(upper);
		},
		(None, None) =>
			return Err(Error::invalid_filter(&leaf.path, "range requires at least one bound").into()),
	}

	Ok(())
}

fn push_stored_value(
	builder: &mut QueryBuilder<'static, Postgres>,
	column: &str,
	value: &Value,
) -> Result<()> {
	match value {
		Value::String(text) => builder.push_bind(text.clone()),
		Value::Bool(flag) => builder.push_bind(*flag),
		Value::Number(number) if number.is_i64() => builder.push_bind(number.as_i64().unwrap_or_default()),
		_ =>
			return Err(Error::invalid_filter(column, "unsupported stored value representation")
				.into()),
	};

	Ok(())
}

fn escape_like(text: &str) -> String {
	let mut out = String::with_capacity(text.len());

	for ch in text.chars() {
		if matches!(ch, '%' | '_' | '\\') {
			out.push('\\');
		}

		out.push(ch);
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use sift_domain::{
		AggregateColumn, EnumStorage, EnumValue, EnumVariant, ExampleValue, FieldPredicate,
		TenantPolicy,
	};

	fn registry() -> Registry {
		let order = EntityDescriptor::builder("order", "orders")
			.key_column("object_key")
			.tenant_column("tenant_id")
			.tenant_policy(TenantPolicy { me_or_global: true, ..TenantPolicy::isolated() })
			.field("order_id", "order_id", FieldKind::Text)
			.field("amount", "amount", FieldKind::Float)
			.field("open", "open", FieldKind::Bool)
			.field("state", "state", FieldKind::Enum {
				variants: vec![
					EnumVariant { name: "Open".to_string(), token: "O".to_string(), ordinal: 0 },
					EnumVariant { name: "Closed".to_string(), token: "C".to_string(), ordinal: 1 },
				],
				storage: EnumStorage::Token,
			})
			.relation("customer", "customer", "order_key")
			.default_sort(vec![SortColumn::asc("order_id")])
			.build()
			.unwrap();
		let customer = EntityDescriptor::builder("customer", "customers")
			.field("name", "name", FieldKind::Text)
			.build()
			.unwrap();

		Registry::builder().entity(order).entity(customer).build().unwrap()
	}

	fn tenant() -> TenantContext {
		TenantContext::new("acme")
	}

	#[test]
	fn plain_search_compiles_filter_tenant_sort_and_pagination() {
		let registry = registry();
		let entity = registry.get("order").unwrap();
		let criteria = SearchCriteria {
			filter: Some(FilterNode::field(
				"order_id",
				FieldPredicate::TextPrefix("A-1".to_string()),
			)),
			limit: 20,
			offset: 40,
			..SearchCriteria::default()
		};
		let query =
			build_search(&registry, entity, &criteria, &tenant(), SelectKind::Records).unwrap();

		assert_eq!(
			query.builder.sql(),
			"SELECT t0.object_key, t0.order_id, t0.amount, t0.open, t0.state FROM orders t0 \
			 WHERE t0.order_id LIKE $1 ESCAPE '\\' AND t0.tenant_id IN ($2, $3) \
			 ORDER BY t0.order_id LIMIT 20 OFFSET 40"
		);
		assert!(query.columns[0].is_key);
	}

	#[test]
	fn dotted_path_emits_left_join_with_stable_alias() {
		let registry = registry();
		let entity = registry.get("order").unwrap();
		let criteria = SearchCriteria {
			filter: Some(FilterNode::and(
				FilterNode::field("customer.name", FieldPredicate::TextEquals("x".to_string())),
				FilterNode::not(FilterNode::field("customer.name", FieldPredicate::TextPrefix(
					"y".to_string(),
				))),
			)),
			..SearchCriteria::default()
		};
		let query =
			build_search(&registry, entity, &criteria, &tenant(), SelectKind::Records).unwrap();
		let sql = query.builder.sql();

		// The same relation hop is reused, never joined twice.
		assert_eq!(sql.matches("LEFT JOIN customers t1").count(), 1);
		assert!(sql.contains("LEFT JOIN customers t1 ON t1.order_key = t0.object_key"));
		assert!(sql.contains("(t1.name = $1 AND NOT (t1.name LIKE $2 ESCAPE '\\'))"));
	}

	#[test]
	fn enum_values_are_translated_before_binding() {
		let registry = registry();
		let entity = registry.get("order").unwrap();
		let criteria = SearchCriteria {
			filter: Some(FilterNode::field(
				"state",
				FieldPredicate::EnumEquals(EnumValue::Name("Closed".to_string())),
			)),
			..SearchCriteria::default()
		};
		let query =
			build_search(&registry, entity, &criteria, &tenant(), SelectKind::Records).unwrap();

		assert!(query.builder.sql().contains("t0.state = $1"));
	}

	#[test]
	fn operator_field_kind_mismatch_is_rejected() {
		let registry = registry();
		let entity = registry.get("order").unwrap();
		let criteria = SearchCriteria {
			filter: Some(FilterNode::field("amount", FieldPredicate::TextEquals("x".to_string()))),
			..SearchCriteria::default()
		};
		let result = build_search(&registry, entity, &criteria, &tenant(), SelectKind::Records);

		assert!(matches!(
			result,
			Err(crate::Error::Domain(Error::InvalidFilterParameters { .. }))
		));
	}

	#[test]
	fn keys_select_stays_plain_without_joins() {
		let registry = registry();
		let entity = registry.get("order").unwrap();
		let criteria = SearchCriteria { limit: 10, ..SearchCriteria::default() };
		let query = build_search(&registry, entity, &criteria, &tenant(), SelectKind::Keys).unwrap();

		assert!(query.builder.sql().starts_with("SELECT t0.object_key FROM orders t0"));
	}

	#[test]
	fn count_uses_distinct_keys_when_joins_fan_out() {
		let registry = registry();
		let entity = registry.get("order").unwrap();
		let criteria = SearchCriteria {
			filter: Some(FilterNode::field(
				"customer.name",
				FieldPredicate::TextEquals("x".to_string()),
			)),
			..SearchCriteria::default()
		};
		let query =
			build_search(&registry, entity, &criteria, &tenant(), SelectKind::Count).unwrap();

		assert!(query.builder.sql().starts_with("SELECT COUNT(DISTINCT t0.object_key)"));
	}

	#[test]
	fn grouping_selects_defaults_and_sorts_by_aggregate() {
		let registry = registry();
		let entity = registry.get("order").unwrap();
		let criteria = SearchCriteria {
			grouping: Some(Grouping {
				group_by: vec!["order_id".to_string()],
				aggregates: vec![AggregateColumn {
					field: "amount".to_string(),
					function: Aggregate::Sum,
				}],
			}),
			sort: vec![SortColumn::desc("amount")],
			..SearchCriteria::default()
		};
		let query =
			build_search(&registry, entity, &criteria, &tenant(), SelectKind::Records).unwrap();
		let sql = query.builder.sql();

		// Grouped column raw, explicit SUM, boolean default `false`, MAX default.
		assert!(sql.starts_with(
			"SELECT t0.order_id, SUM(t0.amount)::float8, false, MAX(t0.state) FROM orders t0"
		));
		assert!(sql.contains("GROUP BY t0.order_id"));
		assert!(sql.contains("ORDER BY SUM(t0.amount)::float8 DESC"));
	}

	#[test]
	fn by_example_orders_caller_tenant_first_and_limits_to_three() {
		let registry = registry();
		let entity = registry.get("order").unwrap();
		let example = entity
			.key_example(&[("order_id", ExampleValue::Text("A-1".to_string()))])
			.unwrap();
		let query = build_by_example(entity, &example, &tenant()).unwrap();

		assert_eq!(
			query.builder.sql(),
			"SELECT t0.object_key, t0.order_id, t0.amount, t0.open, t0.state FROM orders t0 \
			 WHERE t0.order_id = $1 AND t0.tenant_id IN ($2, $3) \
			 ORDER BY (t0.tenant_id = $4) DESC LIMIT 3"
		);
	}

	#[test]
	fn fetch_by_keys_binds_the_key_set() {
		let registry = registry();
		let entity = registry.get("order").unwrap();
		let query = build_fetch_by_keys(entity, &[3, 1, 2], &tenant()).unwrap();

		assert!(query.builder.sql().contains("WHERE t0.object_key = ANY($1)"));
		assert!(query.builder.sql().contains("t0.tenant_id IN ($2, $3)"));
	}
}
