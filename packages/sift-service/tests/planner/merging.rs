use sift_domain::{FieldPredicate, FilterNode, Record, SearchCriteria, SortColumn, TenantContext};
use sift_service::SearchRequest;

use super::{keys, keyword_doc, order_row, service};

fn request(criteria: SearchCriteria) -> SearchRequest {
	SearchRequest {
		entity: "order".to_string(),
		criteria,
		tenant: TenantContext::new("acme"),
		with_total: false,
	}
}

fn mixed_filter() -> FilterNode {
	FilterNode::and(
		FilterNode::field("status", FieldPredicate::TextEquals("open".to_string())),
		FilterNode::field("keywords", FieldPredicate::TextEquals("x".to_string())),
	)
}

fn open_rows(count: i64) -> Vec<Record> {
	(1..=count).map(|key| order_row(key, "open")).collect()
}

const RELEVANCE: [i64; 10] = [12, 7, 3, 9, 1, 5, 8, 2, 11, 4];

fn relevance_docs() -> Vec<Record> {
	RELEVANCE.into_iter().map(|key| keyword_doc(key, "x")).collect()
}

/// Two consecutive pages equal one double-sized page.
#[tokio::test]
async fn merged_pagination_is_idempotent() {
	let page = |limit: u32, offset: u32| async move {
		let (service, ..) = service(open_rows(12), relevance_docs());
		let criteria = SearchCriteria {
			filter: Some(mixed_filter()),
			limit,
			offset,
			..SearchCriteria::default()
		};

		keys(&service.search(request(criteria)).await.unwrap().records)
	};
	let mut first_two = page(3, 0).await;

	first_two.extend(page(3, 3).await);

	assert_eq!(first_two, page(6, 0).await);
	assert_eq!(first_two, RELEVANCE[..6]);
}

/// A filter combination where nothing ever confirms must still terminate, with
/// a short (here empty) result instead of an error.
#[tokio::test]
async fn iteration_cap_bounds_backend_round_trips() {
	let docs = (1..=500).map(|key| keyword_doc(key, "x")).collect();
	let (service, db, text) = service(Vec::new(), docs);
	let criteria = SearchCriteria {
		filter: Some(mixed_filter()),
		limit: 2,
		..SearchCriteria::default()
	};
	let result = service.search(request(criteria)).await.unwrap();

	assert!(result.records.is_empty());
	// limit=2 gives an oversample of 8, so 500 candidates never run out; the
	// cap is what stops the loop.
	assert_eq!(text.search_call_count(), 50);
	assert_eq!(db.search_call_count(), 50);
}

/// A driver page one short of the oversample window ends the loop even though
/// the target was not reached.
#[tokio::test]
async fn short_driver_page_terminates_after_one_iteration() {
	let docs = (1..=39).map(|key| keyword_doc(key, "x")).collect();
	// Only five of the candidates exist relationally.
	let (service, _, text) = service(open_rows(5), docs);
	let criteria = SearchCriteria {
		filter: Some(mixed_filter()),
		limit: 10,
		..SearchCriteria::default()
	};
	let result = service.search(request(criteria)).await.unwrap();

	assert_eq!(result.records.len(), 5);
	assert_eq!(text.search_call_count(), 1);
}

/// With a relational sort and a relational subset, the relational side drives:
/// output is its sort order restricted to text-confirmed keys.
#[tokio::test]
async fn db_drives_when_the_sort_is_relational() {
	let rows =
		(1..=8).map(|key| order_row(key, &format!("s{}", (b'a' + key as u8 - 1) as char)));
	let docs = [7, 2, 5].into_iter().map(|key| keyword_doc(key, "x"));
	let (service, db, text) = service(rows.collect(), docs.collect());
	let criteria = SearchCriteria {
		filter: Some(FilterNode::and(
			FilterNode::field("status", FieldPredicate::TextPrefix("s".to_string())),
			FilterNode::field("keywords", FieldPredicate::TextEquals("x".to_string())),
		)),
		sort: vec![SortColumn::asc("status")],
		limit: 10,
		..SearchCriteria::default()
	};
	let result = service.search(request(criteria)).await.unwrap();

	assert_eq!(keys(&result.records), vec![2, 5, 7]);
	assert_eq!(db.key_call_count(), 1);
	assert_eq!(db.fetch_call_count(), 1);
	assert_eq!(text.search_call_count(), 1);
}

#[tokio::test]
async fn db_driven_offset_skips_confirmed_rows() {
	let rows =
		(1..=8).map(|key| order_row(key, &format!("s{}", (b'a' + key as u8 - 1) as char)));
	let docs = [7, 2, 5].into_iter().map(|key| keyword_doc(key, "x"));
	let (service, ..) = service(rows.collect(), docs.collect());
	let criteria = SearchCriteria {
		filter: Some(FilterNode::and(
			FilterNode::field("status", FieldPredicate::TextPrefix("s".to_string())),
			FilterNode::field("keywords", FieldPredicate::TextEquals("x".to_string())),
		)),
		sort: vec![SortColumn::asc("status")],
		limit: 1,
		offset: 1,
		..SearchCriteria::default()
	};
	let result = service.search(request(criteria)).await.unwrap();

	assert_eq!(keys(&result.records), vec![5]);
}
