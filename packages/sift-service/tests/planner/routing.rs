use serde_json::json;

use sift_domain::{
	FieldPredicate, FilterNode, Grouping, Record, SearchCriteria, SortColumn, TenantContext,
};
use sift_service::{SearchRequest, ServiceError};

use super::{keys, keyword_doc, order_row, service};

fn request(criteria: SearchCriteria) -> SearchRequest {
	SearchRequest {
		entity: "order".to_string(),
		criteria,
		tenant: TenantContext::new("acme"),
		with_total: false,
	}
}

fn status_is(status: &str) -> FilterNode {
	FilterNode::field("status", FieldPredicate::TextEquals(status.to_string()))
}

fn keywords_are(keywords: &str) -> FilterNode {
	FilterNode::field("keywords", FieldPredicate::TextEquals(keywords.to_string()))
}

/// Mixed relational/text filter with no sort: the text backend drives, and the
/// output is its relevance order restricted to relational matches.
#[tokio::test]
async fn mixed_filter_without_sort_keeps_relevance_order() {
	let rows = (1..=6).map(|key| order_row(key, if key % 2 == 1 { "open" } else { "closed" }));
	let docs = [5, 2, 3, 1].into_iter().map(|key| keyword_doc(key, "x"));
	let (service, db, text) = service(rows.collect(), docs.collect());
	let criteria = SearchCriteria {
		filter: Some(FilterNode::and(status_is("open"), keywords_are("x"))),
		limit: 10,
		..SearchCriteria::default()
	};
	let result = service.search(request(criteria)).await.unwrap();

	assert_eq!(keys(&result.records), vec![5, 3, 1]);
	assert_eq!(result.total, None);
	assert_eq!(text.search_call_count(), 1);
	assert_eq!(db.search_call_count(), 1);
}

/// Pure relational filter and sort: one relational query, no merge loop, with
/// the pagination window pushed down.
#[tokio::test]
async fn pure_db_query_runs_once_with_pushed_down_pagination() {
	let rows = (0..10).map(|key| order_row(key, &format!("s{key}")));
	let (service, db, text) = service(rows.collect(), Vec::new());
	let criteria = SearchCriteria {
		filter: Some(FilterNode::field(
			"status",
			FieldPredicate::TextPrefix("s".to_string()),
		)),
		sort: vec![SortColumn::asc("status")],
		limit: 20,
		offset: 5,
		..SearchCriteria::default()
	};
	let result = service.search(request(criteria)).await.unwrap();

	assert_eq!(keys(&result.records), vec![5, 6, 7, 8, 9]);
	assert_eq!(db.search_call_count(), 1);
	assert_eq!(db.fetch_call_count(), 0);
	assert_eq!(text.search_call_count(), 0);
}

/// Text-only filter under a relational sort with no relational predicate: one
/// unbounded text call, then the relational side sorts the complete key set
/// and applies the window.
#[tokio::test]
async fn text_filter_with_db_sort_sorts_the_full_match_set() {
	let statuses = [(1, "d"), (2, "c"), (3, "b"), (4, "a")];
	let rows = statuses.into_iter().map(|(key, status)| order_row(key, status));
	let docs = [1, 2, 3].into_iter().map(|key| keyword_doc(key, "x"));
	let (service, db, text) = service(rows.collect(), docs.collect());
	let criteria = SearchCriteria {
		filter: Some(keywords_are("x")),
		sort: vec![SortColumn::asc("status")],
		limit: 2,
		..SearchCriteria::default()
	};
	let result = service.search(request(criteria)).await.unwrap();

	// Keys {1,2,3} sorted by status (d,c,b) ascending, windowed to two.
	assert_eq!(keys(&result.records), vec![3, 2]);
	assert_eq!(text.search_call_count(), 1);
	assert_eq!(db.search_call_count(), 1);
}

/// A free-text expression always runs on the text backend; records come back
/// in relevance order.
#[tokio::test]
async fn expression_routes_to_text_and_preserves_relevance_order() {
	let rows = (1..=3).map(|key| order_row(key, "open"));
	let docs = [2, 1, 3]
		.into_iter()
		.map(|key| Record::new(key).with_field("text", json!("widget")));
	let (service, _, text) = service(rows.collect(), docs.collect());
	let criteria = SearchCriteria {
		expression: Some("widget".to_string()),
		limit: 10,
		..SearchCriteria::default()
	};
	let mut request = request(criteria);

	request.with_total = true;

	let result = service.search(request).await.unwrap();

	assert_eq!(keys(&result.records), vec![2, 1, 3]);
	assert_eq!(result.total, Some(3));
	assert_eq!(text.search_call_count(), 1);
}

#[tokio::test]
async fn or_filters_are_rejected() {
	let (service, ..) = service(Vec::new(), Vec::new());
	let criteria = SearchCriteria {
		filter: Some(FilterNode::Or(
			Box::new(status_is("open")),
			Box::new(keywords_are("x")),
		)),
		..SearchCriteria::default()
	};
	let result = service.search(request(criteria)).await;

	assert!(matches!(
		result,
		Err(ServiceError::Domain(sift_domain::Error::UnsupportedFilter { kind: "or" }))
	));
}

#[tokio::test]
async fn unknown_entity_is_a_structured_error() {
	let (service, ..) = service(Vec::new(), Vec::new());
	let mut request = request(SearchCriteria::default());

	request.entity = "shipment".to_string();

	assert!(matches!(
		service.search(request).await,
		Err(ServiceError::Domain(sift_domain::Error::UnknownEntity(_)))
	));
}

#[tokio::test]
async fn aggregation_requires_a_db_executable_query() {
	let (service, ..) = service(Vec::new(), Vec::new());
	let criteria = SearchCriteria {
		filter: Some(keywords_are("x")),
		grouping: Some(Grouping { group_by: vec!["status".to_string()], aggregates: Vec::new() }),
		..SearchCriteria::default()
	};

	assert!(matches!(
		service.search(request(criteria)).await,
		Err(ServiceError::InvalidRequest { .. })
	));
}
