use sift_domain::{EntityDescriptor, KeyExample, Record, SearchCriteria, TenantContext};
use sift_storage::{PgStore, QdrantStore};

use crate::{BoxFuture, DbBackend, ServiceResult, TextBackend};

impl DbBackend for PgStore {
	fn search<'a>(
		&'a self,
		entity: &'a EntityDescriptor,
		criteria: &'a SearchCriteria,
		tenant: &'a TenantContext,
	) -> BoxFuture<'a, ServiceResult<Vec<Record>>> {
		Box::pin(async move { PgStore::search(self, entity, criteria, tenant).await.map_err(Into::into) })
	}

	fn search_keys<'a>(
		&'a self,
		entity: &'a EntityDescriptor,
		criteria: &'a SearchCriteria,
		tenant: &'a TenantContext,
	) -> BoxFuture<'a, ServiceResult<Vec<i64>>> {
		Box::pin(async move {
			PgStore::search_keys(self, entity, criteria, tenant).await.map_err(Into::into)
		})
	}

	fn fetch_by_keys<'a>(
		&'a self,
		entity: &'a EntityDescriptor,
		keys: &'a [i64],
		tenant: &'a TenantContext,
	) -> BoxFuture<'a, ServiceResult<Vec<Record>>> {
		Box::pin(async move {
			PgStore::fetch_by_keys(self, entity, keys, tenant).await.map_err(Into::into)
		})
	}

	fn count<'a>(
		&'a self,
		entity: &'a EntityDescriptor,
		criteria: &'a SearchCriteria,
		tenant: &'a TenantContext,
	) -> BoxFuture<'a, ServiceResult<u64>> {
		Box::pin(async move { PgStore::count(self, entity, criteria, tenant).await.map_err(Into::into) })
	}

	fn find_by_example<'a>(
		&'a self,
		entity: &'a EntityDescriptor,
		example: &'a KeyExample,
		tenant: &'a TenantContext,
	) -> BoxFuture<'a, ServiceResult<Vec<Record>>> {
		Box::pin(async move {
			PgStore::find_by_example(self, entity, example, tenant).await.map_err(Into::into)
		})
	}
}

impl TextBackend for QdrantStore {
	fn search_keys<'a>(
		&'a self,
		entity: &'a EntityDescriptor,
		criteria: &'a SearchCriteria,
		tenant: &'a TenantContext,
	) -> BoxFuture<'a, ServiceResult<Vec<i64>>> {
		Box::pin(async move {
			QdrantStore::search_keys(self, entity, criteria, tenant).await.map_err(Into::into)
		})
	}

	fn count<'a>(
		&'a self,
		entity: &'a EntityDescriptor,
		criteria: &'a SearchCriteria,
		tenant: &'a TenantContext,
	) -> BoxFuture<'a, ServiceResult<u64>> {
		Box::pin(async move {
			QdrantStore::count(self, entity, criteria, tenant).await.map_err(Into::into)
		})
	}
}
