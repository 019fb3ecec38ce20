use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	#[serde(default)]
	pub engine: Engine,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Engine {
	/// Upper bound on the single-shot text fetch performed by the
	/// text-filter-with-db-sort strategy. Unset preserves the historical
	/// unbounded behavior.
	pub unsolvable_fetch_cap: Option<u32>,
}
