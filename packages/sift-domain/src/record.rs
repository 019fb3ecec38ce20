use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A backend-agnostic result row. Mapping rows to domain objects is the
/// embedding application's concern; the planner only needs the primary key
/// (absent for grouped rows) and the selected field values.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Record {
	pub key: Option<i64>,
	pub fields: Map<String, Value>,
}
impl Record {
	pub fn new(key: i64) -> Self {
		Self { key: Some(key), fields: Map::new() }
	}

	pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
		self.fields.insert(name.into(), value);

		self
	}
}
