use sift_domain::{Engine, EngineSet};

/// How one request gets executed across the two backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
	/// The relational backend answers alone.
	DbOnly,
	/// The text backend answers alone; records are then fetched by key.
	TextOnly,
	/// Text-only filters with a relational sort and no relational predicate:
	/// one unbounded text call, then the relational backend sorts the full key
	/// set. The only path without iteration or oversampling.
	TextWithDbSort,
	/// Relational driver, text follower.
	DbDriven,
	/// Text driver (relevance order), relational follower.
	TextDriven,
}

/// The routing ladder. Rules are ordered; the first that applies wins.
pub fn select(
	has_expression: bool,
	filter_engines: &EngineSet,
	sort_engine: Option<Engine>,
	db_subset_empty: bool,
) -> Strategy {
	// A free-text relevance query cannot be decomposed across backends.
	if has_expression {
		return Strategy::TextOnly;
	}
	if !filter_engines.contains(Engine::SearchOnly) && sort_engine != Some(Engine::SearchOnly) {
		return Strategy::DbOnly;
	}
	if !filter_engines.contains(Engine::DbOnly) && sort_engine != Some(Engine::DbOnly) {
		return Strategy::TextOnly;
	}
	if sort_engine == Some(Engine::DbOnly)
		&& filter_engines.contains(Engine::SearchOnly)
		&& db_subset_empty
	{
		return Strategy::TextWithDbSort;
	}
	if sort_engine == Some(Engine::DbOnly)
		|| (!filter_engines.contains(Engine::SearchOnly) && !filter_engines.contains(Engine::Both))
	{
		return Strategy::DbDriven;
	}

	Strategy::TextDriven
}
