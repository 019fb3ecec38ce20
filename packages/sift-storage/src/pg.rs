use std::{collections::HashMap, sync::Arc};

use serde_json::Value;
use sqlx::{PgPool, Row, postgres::PgRow};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use sift_domain::{
	EntityDescriptor, EnumStorage, FieldKind, KeyExample, Record, Registry, SearchCriteria,
	TenantContext,
};

use crate::{
	Db, Error, Result,
	sql::{self, OutputColumn, SelectKind},
};

/// The relational backend adapter. Statements are generated per request by
/// [`crate::sql`]; rows decode positionally through the query's column plan.
pub struct PgStore {
	pool: PgPool,
	registry: Arc<Registry>,
}
impl PgStore {
	pub fn new(db: Db, registry: Arc<Registry>) -> Self {
		Self { pool: db.pool, registry }
	}

	pub async fn search(
		&self,
		entity: &EntityDescriptor,
		criteria: &SearchCriteria,
		tenant: &TenantContext,
	) -> Result<Vec<Record>> {
		let mut query =
			sql::build_search(&self.registry, entity, criteria, tenant, SelectKind::Records)?;
		let rows = query.builder.build().fetch_all(&self.pool).await?;

		rows.iter().map(|row| decode_record(row, &query.columns)).collect()
	}

	pub async fn search_keys(
		&self,
		entity: &EntityDescriptor,
		criteria: &SearchCriteria,
		tenant: &TenantContext,
	) -> Result<Vec<i64>> {
		let mut query =
			sql::build_search(&self.registry, entity, criteria, tenant, SelectKind::Keys)?;
		let rows = query.builder.build().fetch_all(&self.pool).await?;

		rows.iter().map(|row| row.try_get::<i64, _>(0).map_err(Error::from)).collect()
	}

	pub async fn count(
		&self,
		entity: &EntityDescriptor,
		criteria: &SearchCriteria,
		tenant: &TenantContext,
	) -> Result<u64> {
		let mut query =
			sql::build_search(&self.registry, entity, criteria, tenant, SelectKind::Count)?;
		let row = query.builder.build().fetch_one(&self.pool).await?;
		let count = row.try_get::<i64, _>(0)?;

		Ok(count.max(0) as u64)
	}

	/// Fetches full records for a key window and returns them in the order of
	/// `keys`. Keys the caller may not see (or that vanished concurrently) are
	/// silently absent.
	pub async fn fetch_by_keys(
		&self,
		entity: &EntityDescriptor,
		keys: &[i64],
		tenant: &TenantContext,
	) -> Result<Vec<Record>> {
		if keys.is_empty() {
			return Ok(Vec::new());
		}

		let mut query = sql::build_fetch_by_keys(entity, keys, tenant)?;
		let rows = query.builder.build().fetch_all(&self.pool).await?;
		let mut by_key = HashMap::with_capacity(rows.len());

		for row in &rows {
			let record = decode_record(row, &query.columns)?;

			match record.key {
				Some(key) => {
					by_key.insert(key, record);
				},
				None => tracing::warn!(entity = %entity.name, "Fetched row without a key; skipping."),
			}
		}

		Ok(keys.iter().filter_map(|key| by_key.remove(key)).collect())
	}

	pub async fn find_by_example(
		&self,
		entity: &EntityDescriptor,
		example: &KeyExample,
		tenant: &TenantContext,
	) -> Result<Vec<Record>> {
		let mut query = sql::build_by_example(entity, example, tenant)?;
		let rows = query.builder.build().fetch_all(&self.pool).await?;

		rows.iter().map(|row| decode_record(row, &query.columns)).collect()
	}
}

fn decode_record(row: &PgRow, columns: &[OutputColumn]) -> Result<Record> {
	let mut record = Record::default();

	for (index, column) in columns.iter().enumerate() {
		if column.is_key {
			record.key = row.try_get::<Option<i64>, _>(index).map_err(decode_err(column))?;

			continue;
		}

		record.fields.insert(column.name.clone(), decode_value(row, index, column)?);
	}

	Ok(record)
}

fn decode_value(row: &PgRow, index: usize, column: &OutputColumn) -> Result<Value> {
	let value = match &column.kind {
		FieldKind::Text => row
			.try_get::<Option<String>, _>(index)
			.map_err(decode_err(column))?
			.map(Value::String),
		FieldKind::Int => row
			.try_get::<Option<i64>, _>(index)
			.map_err(decode_err(column))?
			.map(Value::from),
		FieldKind::Float => row
			.try_get::<Option<f64>, _>(index)
			.map_err(decode_err(column))?
			.map(Value::from),
		FieldKind::Bool => row
			.try_get::<Option<bool>, _>(index)
			.map_err(decode_err(column))?
			.map(Value::Bool),
		FieldKind::Enum { storage: EnumStorage::Token, .. } => row
			.try_get::<Option<String>, _>(index)
			.map_err(decode_err(column))?
			.map(Value::String),
		FieldKind::Enum { storage: EnumStorage::Ordinal, .. } => row
			.try_get::<Option<i32>, _>(index)
			.map_err(decode_err(column))?
			.map(Value::from),
		FieldKind::EnumSet { .. } => row
			.try_get::<Option<Vec<String>>, _>(index)
			.map_err(decode_err(column))?
			.map(|tokens| Value::Array(tokens.into_iter().map(Value::String).collect())),
		FieldKind::Timestamp => {
			let timestamp =
				row.try_get::<Option<OffsetDateTime>, _>(index).map_err(decode_err(column))?;

			match timestamp {
				Some(timestamp) => Some(Value::String(
					timestamp.format(&Rfc3339).map_err(|err| Error::Decode {
						column: column.name.clone(),
						message: err.to_string(),
					})?,
				)),
				None => None,
			}
		},
	};

	Ok(value.unwrap_or(Value::Null))
}

fn decode_err(column: &OutputColumn) -> impl FnOnce(sqlx::Error) -> Error {
	let column = column.name.clone();

	move |err| Error::Decode { column, message: err.to_string() }
}
