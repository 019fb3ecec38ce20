use std::{collections::HashMap, sync::Arc};

use serde_json::Value;

use crate::{
	Error, Result,
	criteria::{SearchCriteria, SortColumn},
	filter::EnumValue,
	routing::PathRule,
	tenant::TenantPolicy,
};

/// Semantic type of a stored field. Backend adapters check leaf predicates
/// against this to reject invalid operator/type combinations.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
	Text,
	Int,
	Float,
	Bool,
	Enum { variants: Vec<EnumVariant>, storage: EnumStorage },
	EnumSet { variants: Vec<EnumVariant> },
	Timestamp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnumStorage {
	Token,
	Ordinal,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumVariant {
	pub name: String,
	pub token: String,
	pub ordinal: i32,
}

#[derive(Clone, Debug)]
pub struct FieldDescriptor {
	pub name: String,
	pub column: String,
	pub kind: FieldKind,
}
impl FieldDescriptor {
	/// Translates a caller-side enum value into the representation the backing
	/// column stores.
	pub fn resolve_enum(&self, value: &EnumValue) -> Result<Value> {
		let (variants, storage) = match &self.kind {
			FieldKind::Enum { variants, storage } => (variants, *storage),
			FieldKind::EnumSet { variants } => (variants, EnumStorage::Token),
			_ =>
				return Err(Error::invalid_filter(
					&self.name,
					"enum value supplied for a non-enum field",
				)),
		};
		let variant = variants
			.iter()
			.find(|variant| match value {
				EnumValue::Name(name) => &variant.name == name,
				EnumValue::Token(token) => &variant.token == token,
				EnumValue::Ordinal(ordinal) => variant.ordinal == *ordinal,
			})
			.ok_or_else(|| Error::invalid_filter(&self.name, "unknown enum value"))?;

		Ok(match storage {
			EnumStorage::Token => Value::String(variant.token.clone()),
			EnumStorage::Ordinal => Value::from(variant.ordinal),
		})
	}
}

/// One populated field of a structurally concrete alternate key, already
/// translated to stored representation. Built through [`EntityDescriptor::key_example`].
#[derive(Clone, Debug, Default)]
pub struct KeyExample {
	pub fields: Vec<(String, Value)>,
}
impl KeyExample {
	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}
}

/// A caller-side value for one alternate-key field.
#[derive(Clone, Debug)]
pub enum ExampleValue {
	Text(String),
	Int(i64),
	Bool(bool),
	Enum(EnumValue),
}

/// A dotted-path segment that crosses into a related (one-to-many or
/// map-valued) entity. Compiles to a LEFT OUTER JOIN on the relational side.
#[derive(Clone, Debug)]
pub struct RelationDescriptor {
	pub segment: String,
	pub target_entity: String,
	/// Column on the target table referencing the parent's key column.
	pub parent_column: String,
}

/// Everything the planner knows about one entity type; replaces the original
/// design's runtime reflection with a table populated once at startup.
#[derive(Clone, Debug)]
pub struct EntityDescriptor {
	pub name: String,
	pub table: String,
	pub key_column: String,
	pub tenant_column: Option<String>,
	pub fields: Vec<FieldDescriptor>,
	pub relations: Vec<RelationDescriptor>,
	pub default_sort: Vec<SortColumn>,
	pub tenant_policy: TenantPolicy,
	pub routing: Vec<PathRule>,
	/// Document/collection name on the text backend.
	pub document_name: String,
	/// Payload field on the text backend carrying the primary key.
	pub key_field: String,
	/// Relational path → text-backend field renames, applied in place to the
	/// text subset after splitting.
	pub text_field_mappings: HashMap<String, String>,
}
impl EntityDescriptor {
	pub fn builder(name: impl Into<String>, table: impl Into<String>) -> EntityDescriptorBuilder {
		EntityDescriptorBuilder::new(name, table)
	}

	pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
		self.fields.iter().find(|field| field.name == name)
	}

	pub fn require_field(&self, name: &str) -> Result<&FieldDescriptor> {
		self.field(name).ok_or_else(|| Error::UnknownField {
			entity: self.name.clone(),
			field: name.to_string(),
		})
	}

	pub fn relation(&self, segment: &str) -> Option<&RelationDescriptor> {
		self.relations.iter().find(|relation| relation.segment == segment)
	}

	/// Validates and translates alternate-key field values into their stored
	/// representation so a backend can match them by equality.
	pub fn key_example(&self, values: &[(&str, ExampleValue)]) -> Result<KeyExample> {
		let mut example = KeyExample::default();

		for (name, value) in values {
			let field = self.require_field(name)?;
			let stored = match (value, &field.kind) {
				(ExampleValue::Text(text), FieldKind::Text) => Value::String(text.clone()),
				(ExampleValue::Int(int), FieldKind::Int) => Value::from(*int),
				(ExampleValue::Bool(flag), FieldKind::Bool) => Value::Bool(*flag),
				(ExampleValue::Enum(value), _) => field.resolve_enum(value)?,
				_ =>
					return Err(Error::invalid_filter(
						&field.name,
						"key value does not match the field type",
					)),
			};

			example.fields.push((field.column.clone(), stored));
		}

		Ok(example)
	}

	/// The sort columns a backend should actually apply: the caller's columns
	/// first, then — when pagination is requested — the entity defaults that
	/// the caller did not already name (case-insensitive), to keep page
	/// boundaries stable.
	pub fn effective_sort(&self, criteria: &SearchCriteria) -> Vec<SortColumn> {
		let mut out = criteria.sort.clone();

		if criteria.paginated() {
			for default in &self.default_sort {
				let already_named =
					out.iter().any(|column| column.path.eq_ignore_ascii_case(&default.path));

				if !already_named {
					out.push(default.clone());
				}
			}
		}

		out
	}

	/// Text-backend field name for a relational path, when a rename exists.
	pub fn text_field(&self, path: &str) -> Option<String> {
		self.text_field_mappings.get(path).cloned()
	}
}

pub struct EntityDescriptorBuilder {
	descriptor: EntityDescriptor,
}
impl EntityDescriptorBuilder {
	fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
		let name = name.into();

		Self {
			descriptor: EntityDescriptor {
				document_name: name.clone(),
				name,
				table: table.into(),
				key_column: "object_key".to_string(),
				tenant_column: None,
				fields: Vec::new(),
				relations: Vec::new(),
				default_sort: Vec::new(),
				tenant_policy: TenantPolicy::shared(),
				routing: Vec::new(),
				key_field: "object_key".to_string(),
				text_field_mappings: HashMap::new(),
			},
		}
	}

	pub fn key_column(mut self, column: impl Into<String>) -> Self {
		self.descriptor.key_column = column.into();

		self
	}

	pub fn tenant_column(mut self, column: impl Into<String>) -> Self {
		self.descriptor.tenant_column = Some(column.into());

		self
	}

	pub fn field(mut self, name: impl Into<String>, column: impl Into<String>, kind: FieldKind) -> Self {
		self.descriptor.fields.push(FieldDescriptor {
			name: name.into(),
			column: column.into(),
			kind,
		});

		self
	}

	pub fn relation(
		mut self,
		segment: impl Into<String>,
		target_entity: impl Into<String>,
		parent_column: impl Into<String>,
	) -> Self {
		self.descriptor.relations.push(RelationDescriptor {
			segment: segment.into(),
			target_entity: target_entity.into(),
			parent_column: parent_column.into(),
		});

		self
	}

	pub fn default_sort(mut self, columns: Vec<SortColumn>) -> Self {
		self.descriptor.default_sort = columns;

		self
	}

	pub fn tenant_policy(mut self, policy: TenantPolicy) -> Self {
		self.descriptor.tenant_policy = policy;

		self
	}

	pub fn routing(mut self, rules: Vec<PathRule>) -> Self {
		self.descriptor.routing = rules;

		self
	}

	pub fn document_name(mut self, name: impl Into<String>) -> Self {
		self.descriptor.document_name = name.into();

		self
	}

	pub fn key_field(mut self, field: impl Into<String>) -> Self {
		self.descriptor.key_field = field.into();

		self
	}

	pub fn map_text_field(mut self, path: impl Into<String>, field: impl Into<String>) -> Self {
		self.descriptor.text_field_mappings.insert(path.into(), field.into());

		self
	}

	fn validate(descriptor: &EntityDescriptor) -> Result<()> {
		let invalid = |message: &str| Error::InvalidDescriptor {
			entity: descriptor.name.clone(),
			message: message.to_string(),
		};

		if descriptor.tenant_policy.isolated && descriptor.tenant_column.is_none() {
			return Err(invalid("tenant-isolated entities require a tenant column"));
		}

		for (index, field) in descriptor.fields.iter().enumerate() {
			if descriptor.fields[..index].iter().any(|other| other.name == field.name) {
				return Err(invalid("duplicate field name"));
			}
		}

		for column in &descriptor.default_sort {
			if !column.path.contains('.') && descriptor.field(&column.path).is_none() {
				return Err(invalid("default sort references an unknown field"));
			}
		}

		Ok(())
	}

	pub fn build(self) -> Result<EntityDescriptor> {
		Self::validate(&self.descriptor)?;

		Ok(self.descriptor)
	}
}

/// Immutable, process-wide entity table; built once at startup and shared
/// read-only across requests.
#[derive(Clone, Debug, Default)]
pub struct Registry {
	entities: HashMap<String, Arc<EntityDescriptor>>,
}
impl Registry {
	pub fn builder() -> RegistryBuilder {
		RegistryBuilder::default()
	}

	pub fn get(&self, name: &str) -> Result<&EntityDescriptor> {
		self.entities
			.get(name)
			.map(Arc::as_ref)
			.ok_or_else(|| Error::UnknownEntity(name.to_string()))
	}
}

#[derive(Default)]
pub struct RegistryBuilder {
	entities: Vec<EntityDescriptor>,
}
impl RegistryBuilder {
	pub fn entity(mut self, descriptor: EntityDescriptor) -> Self {
		self.entities.push(descriptor);

		self
	}

	pub fn build(self) -> Result<Registry> {
		let mut entities = HashMap::with_capacity(self.entities.len());

		for descriptor in &self.entities {
			for relation in &descriptor.relations {
				if !self.entities.iter().any(|entity| entity.name == relation.target_entity) {
					return Err(Error::InvalidDescriptor {
						entity: descriptor.name.clone(),
						message: format!(
							"relation '{}' targets unregistered entity '{}'",
							relation.segment, relation.target_entity
						),
					});
				}
			}
		}
		for descriptor in self.entities {
			entities.insert(descriptor.name.clone(), Arc::new(descriptor));
		}

		Ok(Registry { entities })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::criteria::SearchCriteria;

	fn entity() -> EntityDescriptor {
		EntityDescriptor::builder("order", "orders")
			.field("status", "status", FieldKind::Text)
			.field("amount", "amount", FieldKind::Float)
			.default_sort(vec![SortColumn::asc("status"), SortColumn::desc("amount")])
			.build()
			.unwrap()
	}

	#[test]
	fn default_sort_appended_only_when_paginated() {
		let entity = entity();
		let unpaginated = SearchCriteria::default();

		assert!(entity.effective_sort(&unpaginated).is_empty());

		let paginated = SearchCriteria { limit: 10, ..SearchCriteria::default() };

		assert_eq!(
			entity.effective_sort(&paginated),
			vec![SortColumn::asc("status"), SortColumn::desc("amount")]
		);
	}

	#[test]
	fn caller_sort_keeps_precedence_and_order() {
		let entity = entity();
		let criteria = SearchCriteria {
			limit: 10,
			sort: vec![SortColumn::desc("STATUS")],
			..SearchCriteria::default()
		};

		// The caller's column wins its case-insensitive duplicate; the missing
		// default is appended after it.
		assert_eq!(
			entity.effective_sort(&criteria),
			vec![SortColumn::desc("STATUS"), SortColumn::desc("amount")]
		);
	}

	#[test]
	fn isolated_entity_requires_tenant_column() {
		let result = EntityDescriptor::builder("order", "orders")
			.tenant_policy(TenantPolicy::isolated())
			.build();

		assert!(matches!(result, Err(Error::InvalidDescriptor { .. })));
	}

	#[test]
	fn registry_rejects_dangling_relation() {
		let order = EntityDescriptor::builder("order", "orders")
			.relation("items", "order_item", "order_key")
			.build()
			.unwrap();
		let result = Registry::builder().entity(order).build();

		assert!(matches!(result, Err(Error::InvalidDescriptor { .. })));
	}

	#[test]
	fn enum_resolution_translates_to_stored_representation() {
		let variants = vec![
			EnumVariant { name: "Open".to_string(), token: "O".to_string(), ordinal: 0 },
			EnumVariant { name: "Closed".to_string(), token: "C".to_string(), ordinal: 1 },
		];
		let entity = EntityDescriptor::builder("order", "orders")
			.field("state", "state", FieldKind::Enum {
				variants: variants.clone(),
				storage: EnumStorage::Token,
			})
			.field("state_ord", "state_ord", FieldKind::Enum {
				variants,
				storage: EnumStorage::Ordinal,
			})
			.build()
			.unwrap();
		let token_field = entity.field("state").unwrap();
		let ordinal_field = entity.field("state_ord").unwrap();

		assert_eq!(
			token_field.resolve_enum(&EnumValue::Name("Closed".to_string())).unwrap(),
			Value::String("C".to_string())
		);
		assert_eq!(
			ordinal_field.resolve_enum(&EnumValue::Token("O".to_string())).unwrap(),
			Value::from(0)
		);
		assert!(token_field.resolve_enum(&EnumValue::Name("Nope".to_string())).is_err());
	}

	#[test]
	fn key_example_translates_and_rejects_mismatches() {
		let entity = entity();
		let example = entity
			.key_example(&[("status", ExampleValue::Text("open".to_string()))])
			.unwrap();

		assert_eq!(example.fields, vec![("status".to_string(), Value::String("open".to_string()))]);
		assert!(entity.key_example(&[("status", ExampleValue::Int(1))]).is_err());
		assert!(entity.key_example(&[("missing", ExampleValue::Int(1))]).is_err());
	}
}
