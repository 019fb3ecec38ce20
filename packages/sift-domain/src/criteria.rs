use serde::{Deserialize, Serialize};

use crate::filter::FilterNode;

/// One sort key. Only the first element of a sort list participates in
/// combined-search routing, but every element is applied by whichever backend
/// executes the sort.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortColumn {
	pub path: String,
	pub descending: bool,
}
impl SortColumn {
	pub fn asc(path: impl Into<String>) -> Self {
		Self { path: path.into(), descending: false }
	}

	pub fn desc(path: impl Into<String>) -> Self {
		Self { path: path.into(), descending: true }
	}
}

/// The abstract query both backends compile. `limit = 0` means unbounded.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
	pub filter: Option<FilterNode>,
	pub sort: Vec<SortColumn>,
	pub limit: u32,
	pub offset: u32,
	pub apply_distinct: bool,
	/// Free-text relevance expression. Forces the text-only strategy since a
	/// relevance query cannot be decomposed across backends.
	pub expression: Option<String>,
	pub grouping: Option<Grouping>,
}
impl SearchCriteria {
	pub fn paginated(&self) -> bool {
		self.offset != 0 || self.limit != 0
	}
}

/// Group-by plus the caller's explicit aggregate choices. Any selected column
/// that is neither grouped nor listed here falls back to the default aggregate
/// (MAX, or a literal `false` for booleans).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Grouping {
	pub group_by: Vec<String>,
	pub aggregates: Vec<AggregateColumn>,
}
impl Grouping {
	pub fn aggregate_for(&self, field: &str) -> Option<Aggregate> {
		self.aggregates.iter().find(|column| column.field == field).map(|column| column.function)
	}

	pub fn is_grouped(&self, field: &str) -> bool {
		self.group_by.iter().any(|grouped| grouped == field)
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggregateColumn {
	pub field: String,
	pub function: Aggregate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
	Sum,
	Avg,
	Max,
	Min,
	Count,
	CountDistinct,
}
