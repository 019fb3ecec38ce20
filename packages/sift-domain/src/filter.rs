use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A filter tree as submitted by the caller. `Or` is representable because both
/// backends can compile it in isolation, but the combined-routing classifier
/// rejects it: OR semantics cannot be split across two backends without a full
/// outer join.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FilterNode {
	Field(FieldFilter),
	Not(Box<FilterNode>),
	And(Box<FilterNode>, Box<FilterNode>),
	Or(Box<FilterNode>, Box<FilterNode>),
}
impl FilterNode {
	pub fn field(path: impl Into<String>, predicate: FieldPredicate) -> Self {
		Self::Field(FieldFilter { path: path.into(), predicate })
	}

	pub fn and(left: Self, right: Self) -> Self {
		Self::And(Box::new(left), Box::new(right))
	}

	pub fn not(node: Self) -> Self {
		Self::Not(Box::new(node))
	}

	/// Combines an optional accumulated filter with one more node, the way the
	/// splitter and the merge engine grow per-backend subsets.
	pub fn and_opt(acc: Option<Self>, node: Self) -> Self {
		match acc {
			Some(existing) => Self::and(existing, node),
			None => node,
		}
	}

	pub const fn kind_name(&self) -> &'static str {
		match self {
			Self::Field(_) => "field",
			Self::Not(_) => "not",
			Self::And(..) => "and",
			Self::Or(..) => "or",
		}
	}

	/// Renames leaf paths in place through `map`. Used to translate relational
	/// field paths into text-backend document fields, which is why BOTH-routed
	/// leaves must be cloned into each subset before either side is remapped.
	pub fn map_paths(&mut self, map: &dyn Fn(&str) -> Option<String>) {
		match self {
			Self::Field(leaf) =>
				if let Some(renamed) = map(&leaf.path) {
					leaf.path = renamed;
				},
			Self::Not(child) => child.map_paths(map),
			Self::And(left, right) | Self::Or(left, right) => {
				left.map_paths(map);
				right.map_paths(map);
			},
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
	pub path: String,
	pub predicate: FieldPredicate,
}

/// Semantic leaf predicates. Each backend adapter translates these into its
/// own query language; an operator applied to an incompatible field kind is an
/// invalid-filter-parameters error naming the field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldPredicate {
	TextEquals(String),
	TextPrefix(String),
	TextRange { lower: Option<String>, upper: Option<String> },
	IntEquals(i64),
	IntIn(Vec<i64>),
	IntRange { lower: Option<i64>, upper: Option<i64> },
	FloatRange { lower: Option<f64>, upper: Option<f64> },
	BoolEquals(bool),
	EnumEquals(EnumValue),
	EnumIn(Vec<EnumValue>),
	EnumSetContainsAll(Vec<EnumValue>),
	TimeRange { lower: Option<OffsetDateTime>, upper: Option<OffsetDateTime> },
	/// Candidate-key injection used by the merge engine: restricts the follower
	/// backend to the driver's key window. Never supplied by callers.
	KeyIn(Vec<i64>),
}
impl FieldPredicate {
	pub const fn operator_name(&self) -> &'static str {
		match self {
			Self::TextEquals(_) => "text_equals",
			Self::TextPrefix(_) => "text_prefix",
			Self::TextRange { .. } => "text_range",
			Self::IntEquals(_) => "int_equals",
			Self::IntIn(_) => "int_in",
			Self::IntRange { .. } => "int_range",
			Self::FloatRange { .. } => "float_range",
			Self::BoolEquals(_) => "bool_equals",
			Self::EnumEquals(_) => "enum_equals",
			Self::EnumIn(_) => "enum_in",
			Self::EnumSetContainsAll(_) => "enum_set_contains_all",
			Self::TimeRange { .. } => "time_range",
			Self::KeyIn(_) => "key_in",
		}
	}
}

/// An enumerated value as supplied by a caller; resolved against the field
/// descriptor to whichever representation the backing column stores.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EnumValue {
	Name(String),
	Token(String),
	Ordinal(i32),
}
