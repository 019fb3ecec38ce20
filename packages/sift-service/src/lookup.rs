//! Generic lookup of a single record through a structurally concrete alternate
//! key: one equality predicate per populated field, tenant visibility applied,
//! the caller's own tenant winning over a global shadow row.

use sift_domain::{ExampleValue, Record, TenantContext};

use crate::{ServiceError, ServiceResult, SiftService};

impl SiftService {
	pub async fn lookup_by_key(
		&self,
		entity_name: &str,
		key_fields: &[(&str, ExampleValue)],
		tenant: &TenantContext,
	) -> ServiceResult<Record> {
		let entity = self.registry.get(entity_name)?;
		let example = entity.key_example(key_fields)?;

		if example.is_empty() {
			return Err(ServiceError::MissingKeyParameter { entity: entity.name.clone() });
		}

		let rows = self.backends.db.find_by_example(entity, &example, tenant).await?;

		match rows.len() {
			0 => Err(ServiceError::RecordDoesNotExist { entity: entity.name.clone() }),
			// One row, or the caller's row shadowing the global tenant's; the
			// backend already ordered the caller's tenant first.
			1 | 2 => rows
				.into_iter()
				.next()
				.ok_or_else(|| ServiceError::RecordDoesNotExist { entity: entity.name.clone() }),
			_ => Err(ServiceError::TooManyRecords { entity: entity.name.clone() }),
		}
	}
}
