pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Unsupported combined filter expression: {kind}.")]
	UnsupportedFilter { kind: &'static str },
	#[error("No resolvable combined filter.")]
	NoResolvableFilter,
	#[error("Invalid filter parameters for field '{field}': {message}")]
	InvalidFilterParameters { field: String, message: String },
	#[error("Unknown entity type '{0}'.")]
	UnknownEntity(String),
	#[error("Unknown field '{field}' on entity '{entity}'.")]
	UnknownField { entity: String, field: String },
	#[error("Invalid entity descriptor for '{entity}': {message}")]
	InvalidDescriptor { entity: String, message: String },
}
impl Error {
	pub fn invalid_filter(field: impl Into<String>, message: impl Into<String>) -> Self {
		Self::InvalidFilterParameters { field: field.into(), message: message.into() }
	}
}
