use sift_domain::{ExampleValue, FieldPredicate, FilterNode, SearchCriteria, TenantContext};
use sift_service::{SearchRequest, ServiceError};

use super::{keys, service, setting_row};

fn code(value: &str) -> Vec<(&'static str, ExampleValue)> {
	vec![("code", ExampleValue::Text(value.to_string()))]
}

#[tokio::test]
async fn lookup_prefers_the_callers_tenant_over_the_global_row() {
	let (service, ..) = service(
		vec![setting_row(1, "@", "currency", "EUR"), setting_row(2, "acme", "currency", "USD")],
		Vec::new(),
	);
	let record = service
		.lookup_by_key("setting", &code("currency"), &TenantContext::new("acme"))
		.await
		.unwrap();

	assert_eq!(record.key, Some(2));
	assert_eq!(record.fields["value"], "USD");
}

#[tokio::test]
async fn lookup_falls_back_to_the_global_row() {
	let (service, ..) =
		service(vec![setting_row(1, "@", "currency", "EUR")], Vec::new());
	let record = service
		.lookup_by_key("setting", &code("currency"), &TenantContext::new("acme"))
		.await
		.unwrap();

	assert_eq!(record.key, Some(1));
}

#[tokio::test]
async fn lookup_without_key_fields_is_rejected() {
	let (service, ..) = service(Vec::new(), Vec::new());
	let err = service
		.lookup_by_key("setting", &[], &TenantContext::new("acme"))
		.await
		.unwrap_err();

	assert!(matches!(err, ServiceError::MissingKeyParameter { .. }));
}

#[tokio::test]
async fn lookup_misses_are_a_structured_error() {
	let (service, ..) = service(Vec::new(), Vec::new());
	let err = service
		.lookup_by_key("setting", &code("currency"), &TenantContext::new("acme"))
		.await
		.unwrap_err();

	assert!(matches!(err, ServiceError::RecordDoesNotExist { .. }));
}

#[tokio::test]
async fn ambiguous_lookups_are_a_structured_error() {
	let rows = vec![
		setting_row(1, "acme", "currency", "EUR"),
		setting_row(2, "acme", "currency", "USD"),
		setting_row(3, "acme", "currency", "GBP"),
	];
	let (service, ..) = service(rows, Vec::new());
	let err = service
		.lookup_by_key("setting", &code("currency"), &TenantContext::new("acme"))
		.await
		.unwrap_err();

	assert!(matches!(err, ServiceError::TooManyRecords { .. }));
}

/// Searches on an isolated entity only ever see the caller's tenant and the
/// global tenant.
#[tokio::test]
async fn searches_respect_tenant_visibility() {
	let rows = vec![
		setting_row(1, "acme", "theme", "dark"),
		setting_row(2, "rival", "theme", "light"),
		setting_row(3, "@", "theme", "plain"),
	];
	let (service, ..) = service(rows, Vec::new());
	let criteria = SearchCriteria {
		filter: Some(FilterNode::field(
			"code",
			FieldPredicate::TextEquals("theme".to_string()),
		)),
		..SearchCriteria::default()
	};
	let result = service
		.search(SearchRequest {
			entity: "setting".to_string(),
			criteria,
			tenant: TenantContext::new("acme"),
			with_total: false,
		})
		.await
		.unwrap();

	assert_eq!(keys(&result.records), vec![1, 3]);
}
