mod criteria;
mod error;
mod filter;
mod record;
mod routing;
mod schema;
mod tenant;

pub use criteria::{Aggregate, AggregateColumn, Grouping, SearchCriteria, SortColumn};
pub use error::{Error, Result};
pub use filter::{EnumValue, FieldFilter, FieldPredicate, FilterNode};
pub use record::Record;
pub use routing::{Engine, EngineSet, MatchKind, PathRule, SplitFilter, classify, classify_field, split};
pub use schema::{
	EntityDescriptor, EntityDescriptorBuilder, EnumStorage, EnumVariant, ExampleValue,
	FieldDescriptor, FieldKind, KeyExample, Registry, RegistryBuilder, RelationDescriptor,
};
pub use tenant::{GLOBAL_TENANT_ID, TenantContext, TenantPolicy, TenantRestriction};
