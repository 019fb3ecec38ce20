use serde::{Deserialize, Serialize};

use crate::{Error, Result, filter::FilterNode};

/// Which backend(s) can evaluate a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
	DbOnly,
	SearchOnly,
	Both,
}

/// The set of engine labels collected over a filter tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineSet {
	db_only: bool,
	search_only: bool,
	both: bool,
}
impl EngineSet {
	pub fn add(&mut self, engine: Engine) {
		match engine {
			Engine::DbOnly => self.db_only = true,
			Engine::SearchOnly => self.search_only = true,
			Engine::Both => self.both = true,
		}
	}

	pub const fn contains(&self, engine: Engine) -> bool {
		match engine {
			Engine::DbOnly => self.db_only,
			Engine::SearchOnly => self.search_only,
			Engine::Both => self.both,
		}
	}

	pub const fn is_empty(&self) -> bool {
		!self.db_only && !self.search_only && !self.both
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
	Exact,
	Prefix,
	Substring,
}

/// One path-routing rule. Rules are evaluated in registration order; the first
/// match wins and the absence of any match defaults to [`Engine::DbOnly`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathRule {
	pub pattern: String,
	pub match_kind: MatchKind,
	pub engine: Engine,
}
impl PathRule {
	pub fn new(pattern: impl Into<String>, match_kind: MatchKind, engine: Engine) -> Self {
		Self { pattern: pattern.into(), match_kind, engine }
	}

	fn matches(&self, path: &str) -> bool {
		match self.match_kind {
			MatchKind::Exact => path == self.pattern,
			MatchKind::Prefix => path.starts_with(&self.pattern),
			MatchKind::Substring => path.contains(&self.pattern),
		}
	}
}

/// Determines which engine(s) can evaluate a field path.
pub fn classify_field(rules: &[PathRule], path: &str) -> Engine {
	rules.iter().find(|rule| rule.matches(path)).map_or(Engine::DbOnly, |rule| rule.engine)
}

/// Collects the engine labels over a filter tree. Only AND and NOT combinators
/// are valid here; anything else cannot be routed across two backends.
pub fn classify(rules: &[PathRule], node: &FilterNode) -> Result<EngineSet> {
	let mut set = EngineSet::default();

	classify_into(rules, node, &mut set)?;

	Ok(set)
}

fn classify_into(rules: &[PathRule], node: &FilterNode, set: &mut EngineSet) -> Result<()> {
	match node {
		FilterNode::Field(leaf) => {
			set.add(classify_field(rules, &leaf.path));

			Ok(())
		},
		FilterNode::Not(child) => classify_into(rules, child, set),
		FilterNode::And(left, right) => {
			classify_into(rules, left, set)?;
			classify_into(rules, right, set)
		},
		other => Err(Error::UnsupportedFilter { kind: other.kind_name() }),
	}
}

/// The two per-backend filter subsets produced by [`split`]. A `None` side
/// means that backend runs without a routed predicate.
#[derive(Clone, Debug, Default)]
pub struct SplitFilter {
	pub db: Option<FilterNode>,
	pub search: Option<FilterNode>,
}
impl SplitFilter {
	fn add_db(&mut self, node: FilterNode) {
		self.db = Some(FilterNode::and_opt(self.db.take(), node));
	}

	fn add_search(&mut self, node: FilterNode) {
		self.search = Some(FilterNode::and_opt(self.search.take(), node));
	}
}

/// Partitions a filter tree into the DB and text subsets consistent with the
/// classification. BOTH-routed leaves are cloned into each subset so that the
/// text side's in-place name remapping cannot corrupt the DB side.
pub fn split(rules: &[PathRule], node: &FilterNode) -> Result<SplitFilter> {
	let mut out = SplitFilter::default();

	split_into(rules, node, &mut out)?;

	Ok(out)
}

fn split_into(rules: &[PathRule], node: &FilterNode, out: &mut SplitFilter) -> Result<()> {
	match node {
		FilterNode::Field(leaf) => {
			match classify_field(rules, &leaf.path) {
				Engine::DbOnly => out.add_db(node.clone()),
				Engine::SearchOnly => out.add_search(node.clone()),
				Engine::Both => {
					out.add_db(node.clone());
					out.add_search(node.clone());
				},
			}

			Ok(())
		},
		FilterNode::Not(child) => {
			// A negation travels whole; it goes to the text side only when its
			// subtree is provably text-only, and stays an opaque DB leaf
			// otherwise.
			let set = classify(rules, child)?;

			if set.contains(Engine::SearchOnly)
				&& !set.contains(Engine::DbOnly)
				&& !set.contains(Engine::Both)
			{
				out.add_search(node.clone());
			} else {
				out.add_db(node.clone());
			}

			Ok(())
		},
		FilterNode::And(left, right) => {
			split_into(rules, left, out)?;
			split_into(rules, right, out)
		},
		other => Err(Error::UnsupportedFilter { kind: other.kind_name() }),
	}
}
