use sift_domain::{FieldPredicate, FilterNode, SearchCriteria, TenantContext};
use sift_service::SearchRequest;

use super::{keyword_doc, order_row, service};

fn request(criteria: SearchCriteria) -> SearchRequest {
	SearchRequest {
		entity: "order".to_string(),
		criteria,
		tenant: TenantContext::new("acme"),
		with_total: true,
	}
}

#[tokio::test]
async fn relational_totals_ignore_pagination() {
	let rows = (1..=9).map(|key| order_row(key, "open")).collect();
	let (service, db, _) = service(rows, Vec::new());
	let criteria = SearchCriteria {
		filter: Some(FilterNode::field(
			"status",
			FieldPredicate::TextEquals("open".to_string()),
		)),
		limit: 2,
		..SearchCriteria::default()
	};
	let result = service.search(request(criteria)).await.unwrap();

	assert_eq!(result.records.len(), 2);
	assert_eq!(result.total, Some(9));
	assert_eq!(db.count_call_count(), 1);
}

#[tokio::test]
async fn totals_are_skipped_when_not_requested() {
	let rows = (1..=4).map(|key| order_row(key, "open")).collect();
	let (service, db, _) = service(rows, Vec::new());
	let mut request = request(SearchCriteria::default());

	request.with_total = false;

	let result = service.search(request).await.unwrap();

	assert_eq!(result.total, None);
	assert_eq!(db.count_call_count(), 0);
}

#[tokio::test]
async fn text_totals_come_from_the_text_backend() {
	let docs = (1..=7).map(|key| keyword_doc(key, "x")).collect();
	let rows = (1..=7).map(|key| order_row(key, "open")).collect();
	let (service, _, text) = service(rows, docs);
	let criteria = SearchCriteria {
		filter: Some(FilterNode::field(
			"keywords",
			FieldPredicate::TextEquals("x".to_string()),
		)),
		limit: 3,
		..SearchCriteria::default()
	};
	let result = service.search(request(criteria)).await.unwrap();

	assert_eq!(result.records.len(), 3);
	assert_eq!(result.total, Some(7));
	assert_eq!(text.count_call_count(), 1);
}

/// Merged strategies never report a total, even when one is requested.
#[tokio::test]
async fn merged_strategies_report_no_total() {
	let docs = (1..=5).map(|key| keyword_doc(key, "x")).collect();
	let rows = (1..=5).map(|key| order_row(key, "open")).collect();
	let (service, ..) = service(rows, docs);
	let criteria = SearchCriteria {
		filter: Some(FilterNode::and(
			FilterNode::field("status", FieldPredicate::TextEquals("open".to_string())),
			FilterNode::field("keywords", FieldPredicate::TextEquals("x".to_string())),
		)),
		limit: 3,
		..SearchCriteria::default()
	};
	let result = service.search(request(criteria)).await.unwrap();

	assert_eq!(result.records.len(), 3);
	assert_eq!(result.total, None);
}
