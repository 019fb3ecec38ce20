mod merge;
mod strategy;

pub use strategy::Strategy;

use serde::{Deserialize, Serialize};

use sift_domain::{
	EngineSet, EntityDescriptor, Error, FilterNode, Record, SearchCriteria, SortColumn,
	SplitFilter, TenantContext, classify, classify_field, split,
};

use crate::{ServiceError, ServiceResult, SiftService};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchRequest {
	pub entity: String,
	pub criteria: SearchCriteria,
	pub tenant: TenantContext,
	/// Compute an exact total through a separate count query. Only available
	/// for strategies a single backend can answer; merged strategies return
	/// `None`.
	#[serde(default)]
	pub with_total: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PagedResult {
	pub records: Vec<Record>,
	pub total: Option<u64>,
}

impl SiftService {
	/// The single entry point: classifies the filter, splits it across the two
	/// backends, picks an execution strategy, and runs it.
	pub async fn search(&self, request: SearchRequest) -> ServiceResult<PagedResult> {
		let entity = self.registry.get(&request.entity)?;
		let criteria = &request.criteria;
		let tenant = &request.tenant;
		let filter_engines = match &criteria.filter {
			Some(filter) => classify(&entity.routing, filter)?,
			None => EngineSet::default(),
		};
		let sort_engine = criteria
			.sort
			.first()
			.map(|column| classify_field(&entity.routing, &column.path));
		let split = match &criteria.filter {
			Some(filter) => split(&entity.routing, filter)?,
			None => SplitFilter::default(),
		};
		let strategy = strategy::select(
			criteria.expression.is_some(),
			&filter_engines,
			sort_engine,
			split.db.is_none(),
		);

		tracing::debug!(entity = %entity.name, strategy = ?strategy, "Combined search routed.");

		if criteria.grouping.is_some() && strategy != Strategy::DbOnly {
			return Err(ServiceError::InvalidRequest {
				message: "aggregation requires a query the relational backend can execute alone."
					.to_string(),
			});
		}
		if criteria.filter.is_some() && split.db.is_none() && split.search.is_none() {
			return Err(Error::NoResolvableFilter.into());
		}

		// The text side works on document field names from here on; BOTH-routed
		// leaves were cloned during splitting, so the DB side stays untouched.
		let split = SplitFilter {
			db: split.db,
			search: remap_filter(entity, split.search),
		};

		match strategy {
			Strategy::DbOnly => self.db_only(entity, &request, criteria, tenant).await,
			Strategy::TextOnly => self.text_only(entity, &request, criteria, tenant).await,
			Strategy::TextWithDbSort =>
				self.text_with_db_sort(entity, &request, &split, criteria, tenant).await,
			Strategy::DbDriven => {
				let records = merge::db_driven(
					&self.backends,
					entity,
					&split,
					&entity.key_field,
					criteria,
					tenant,
				)
				.await?;

				Ok(self.merged(records, &request))
			},
			Strategy::TextDriven => {
				let text_sort = remap_sort(entity, &criteria.sort);
				let records = merge::text_driven(
					&self.backends,
					entity,
					&split,
					&text_sort,
					criteria,
					tenant,
				)
				.await?;

				Ok(self.merged(records, &request))
			},
		}
	}

	async fn db_only(
		&self,
		entity: &EntityDescriptor,
		request: &SearchRequest,
		criteria: &SearchCriteria,
		tenant: &TenantContext,
	) -> ServiceResult<PagedResult> {
		let records = self.backends.db.search(entity, criteria, tenant).await?;
		let total = match request.with_total {
			true => Some(self.backends.db.count(entity, criteria, tenant).await?),
			false => None,
		};

		Ok(PagedResult { records, total })
	}

	/// The whole query runs on the text backend; full records are then fetched
	/// by key, preserving the text backend's (relevance) order.
	async fn text_only(
		&self,
		entity: &EntityDescriptor,
		request: &SearchRequest,
		criteria: &SearchCriteria,
		tenant: &TenantContext,
	) -> ServiceResult<PagedResult> {
		let text_criteria = SearchCriteria {
			filter: remap_filter(entity, criteria.filter.clone()),
			sort: remap_sort(entity, &criteria.sort),
			limit: criteria.limit,
			offset: criteria.offset,
			expression: criteria.expression.clone(),
			..SearchCriteria::default()
		};
		let keys = self.backends.text.search_keys(entity, &text_criteria, tenant).await?;
		let records = self.backends.db.fetch_by_keys(entity, &keys, tenant).await?;
		let total = match request.with_total {
			true => Some(self.backends.text.count(entity, &text_criteria, tenant).await?),
			false => None,
		};

		Ok(PagedResult { records, total })
	}

	/// Text-only filters under a relational sort with no relational predicate:
	/// fetch every text match in one call, then let the relational backend
	/// apply the sort and the pagination window over the full key set. Result
	/// volume is bounded only by filter selectivity (or the configured cap).
	async fn text_with_db_sort(
		&self,
		entity: &EntityDescriptor,
		request: &SearchRequest,
		split: &SplitFilter,
		criteria: &SearchCriteria,
		tenant: &TenantContext,
	) -> ServiceResult<PagedResult> {
		let text_criteria = SearchCriteria {
			filter: split.search.clone(),
			limit: self.cfg.engine.unsolvable_fetch_cap.unwrap_or(0),
			..SearchCriteria::default()
		};
		let keys = self.backends.text.search_keys(entity, &text_criteria, tenant).await?;

		if keys.is_empty() {
			return Ok(PagedResult {
				records: Vec::new(),
				total: request.with_total.then_some(0),
			});
		}

		let db_criteria = SearchCriteria {
			filter: Some(FilterNode::field(
				entity.key_field.clone(),
				sift_domain::FieldPredicate::KeyIn(keys),
			)),
			sort: criteria.sort.clone(),
			limit: criteria.limit,
			offset: criteria.offset,
			apply_distinct: criteria.apply_distinct,
			..SearchCriteria::default()
		};
		let records = self.backends.db.search(entity, &db_criteria, tenant).await?;
		let total = match request.with_total {
			true => Some(self.backends.text.count(entity, &text_criteria, tenant).await?),
			false => None,
		};

		Ok(PagedResult { records, total })
	}

	fn merged(&self, records: Vec<Record>, request: &SearchRequest) -> PagedResult {
		if request.with_total {
			tracing::debug!(
				entity = %request.entity,
				"Exact totals are not computed for merged strategies."
			);
		}

		PagedResult { records, total: None }
	}
}

fn remap_filter(entity: &EntityDescriptor, filter: Option<FilterNode>) -> Option<FilterNode> {
	filter.map(|mut node| {
		node.map_paths(&|path| entity.text_field(path));

		node
	})
}

fn remap_sort(entity: &EntityDescriptor, sort: &[SortColumn]) -> Vec<SortColumn> {
	sort.iter()
		.map(|column| SortColumn {
			path: entity.text_field(&column.path).unwrap_or_else(|| column.path.clone()),
			descending: column.descending,
		})
		.collect()
}
