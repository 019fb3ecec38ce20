//! Query planning over a split storage layer: one relational backend, one
//! full-text backend, and an orchestrator that routes each request to the
//! cheapest strategy that preserves the caller's filter, sort, and pagination
//! semantics.

pub mod lookup;
pub mod search;

mod backends;

use std::{future::Future, pin::Pin, sync::Arc};

pub use search::{PagedResult, SearchRequest};

use tracing_subscriber::EnvFilter;

use sift_config::Config;
use sift_domain::{EntityDescriptor, KeyExample, Record, Registry, SearchCriteria, TenantContext};

/// Install the global subscriber from the configured log level; falls back to
/// `info` when the level does not parse.
pub fn init_tracing(cfg: &Config) {
	let filter =
		EnvFilter::try_new(&cfg.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub type ServiceResult<T> = Result<T, ServiceError>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Missing key parameter for entity '{entity}'.")]
	MissingKeyParameter { entity: String },
	#[error("Record does not exist for entity '{entity}'.")]
	RecordDoesNotExist { entity: String },
	#[error("Too many records match the key for entity '{entity}'.")]
	TooManyRecords { entity: String },
	#[error(transparent)]
	Domain(#[from] sift_domain::Error),
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Text backend error: {message}")]
	Text { message: String },
}
impl From<sift_storage::Error> for ServiceError {
	fn from(err: sift_storage::Error) -> Self {
		match err {
			sift_storage::Error::Domain(err) => Self::Domain(err),
			sift_storage::Error::Qdrant(err) => Self::Text { message: err.to_string() },
			other => Self::Storage { message: other.to_string() },
		}
	}
}

/// The relational side. Row order is the backend's sort order; `fetch_by_keys`
/// returns records in the order of the requested keys.
pub trait DbBackend
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		entity: &'a EntityDescriptor,
		criteria: &'a SearchCriteria,
		tenant: &'a TenantContext,
	) -> BoxFuture<'a, ServiceResult<Vec<Record>>>;

	fn search_keys<'a>(
		&'a self,
		entity: &'a EntityDescriptor,
		criteria: &'a SearchCriteria,
		tenant: &'a TenantContext,
	) -> BoxFuture<'a, ServiceResult<Vec<i64>>>;

	fn fetch_by_keys<'a>(
		&'a self,
		entity: &'a EntityDescriptor,
		keys: &'a [i64],
		tenant: &'a TenantContext,
	) -> BoxFuture<'a, ServiceResult<Vec<Record>>>;

	fn count<'a>(
		&'a self,
		entity: &'a EntityDescriptor,
		criteria: &'a SearchCriteria,
		tenant: &'a TenantContext,
	) -> BoxFuture<'a, ServiceResult<u64>>;

	fn find_by_example<'a>(
		&'a self,
		entity: &'a EntityDescriptor,
		example: &'a KeyExample,
		tenant: &'a TenantContext,
	) -> BoxFuture<'a, ServiceResult<Vec<Record>>>;
}

/// The full-text side. Keys come back in relevance order when the criteria
/// carry a free-text expression and no sort.
pub trait TextBackend
where
	Self: Send + Sync,
{
	fn search_keys<'a>(
		&'a self,
		entity: &'a EntityDescriptor,
		criteria: &'a SearchCriteria,
		tenant: &'a TenantContext,
	) -> BoxFuture<'a, ServiceResult<Vec<i64>>>;

	fn count<'a>(
		&'a self,
		entity: &'a EntityDescriptor,
		criteria: &'a SearchCriteria,
		tenant: &'a TenantContext,
	) -> BoxFuture<'a, ServiceResult<u64>>;
}

#[derive(Clone)]
pub struct Backends {
	pub db: Arc<dyn DbBackend>,
	pub text: Arc<dyn TextBackend>,
}

pub struct SiftService {
	pub cfg: Config,
	pub registry: Arc<Registry>,
	pub backends: Backends,
}
impl SiftService {
	pub fn new(cfg: Config, registry: Arc<Registry>, backends: Backends) -> Self {
		Self { cfg, registry, backends }
	}
}
