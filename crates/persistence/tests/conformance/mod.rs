//! Backend-independent record store checks.
//!
//! Each function drives a [`RecordService`] and asserts one behavior. The
//! per-backend test files call every function with a fresh service.

use std::time::Duration;

use serde_json::json;

use stowage_persistence::core::{Precondition, RecordStorage};
use stowage_persistence::service::RecordService;
use stowage_persistence::watch::RecordUpdate;
use stowage_persistence::types::{
    Filter, FilterOp, ListOptions, ListQuery, SortField, TestType, TestTypeFields,
};

fn text_num(text: &str, num: i64) -> TestType {
    TestType {
        text: text.to_string(),
        num,
    }
}

// ============================================================================
// Create / Get / Replace
// ============================================================================

/// The create, get, replace(text only), get sequence.
pub async fn full_replace_scenario<S: RecordStorage>(service: RecordService<S>) {
    let created = service
        .create::<TestType>(&TestTypeFields::default().text("foo").num(5))
        .await
        .unwrap();
    assert_eq!(created.record, text_num("foo", 5));

    let fetched = service.get::<TestType>(&created.id).await.unwrap();
    assert_eq!(fetched, created);

    let replaced = service
        .replace::<TestType>(&created.id, &TestTypeFields::default().text("bar"), None)
        .await
        .unwrap();
    assert_eq!(replaced.record, text_num("bar", 0));
    assert_eq!(replaced.id, created.id);

    let fetched = service.get::<TestType>(&created.id).await.unwrap();
    assert_eq!(fetched, replaced);
}

/// Omitted fields are zero on create.
pub async fn create_fills_zero_values<S: RecordStorage>(service: RecordService<S>) {
    let empty = service
        .create::<TestType>(&TestTypeFields::default())
        .await
        .unwrap();
    assert_eq!(empty.record, TestType::default());

    let num_only = service
        .create_record("testtype", json!({"num": 9}))
        .await
        .unwrap();
    assert_eq!(num_only.content(), &json!({"text": "", "num": 9}));
}

/// An explicit zero and an omitted field store the same value.
pub async fn explicit_zero_matches_omission<S: RecordStorage>(service: RecordService<S>) {
    let created = service
        .create::<TestType>(&TestTypeFields::default().text("foo").num(5))
        .await
        .unwrap();

    let explicit = service
        .replace::<TestType>(
            &created.id,
            &TestTypeFields::default().text("bar").num(0),
            None,
        )
        .await
        .unwrap();
    let omitted = service
        .replace::<TestType>(&created.id, &TestTypeFields::default().text("bar"), None)
        .await
        .unwrap();

    assert_eq!(explicit.record, omitted.record);
    assert_eq!(explicit.etag, omitted.etag);
    assert_eq!(omitted.generation, 2);
}

/// Replacing with an empty field set resets everything.
pub async fn replace_with_nothing_resets_all<S: RecordStorage>(service: RecordService<S>) {
    let created = service
        .create_record("testtype", json!({"text": "foo", "num": 5}))
        .await
        .unwrap();

    let replaced = service
        .replace_record("testtype", created.id(), json!({}), None)
        .await
        .unwrap();
    assert_eq!(replaced.content(), &json!({"text": "", "num": 0}));
}

/// Metadata in the input never overrides server-owned metadata.
pub async fn input_metadata_is_ignored<S: RecordStorage>(service: RecordService<S>) {
    let created = service
        .create_record(
            "testtype",
            json!({"id": "mine", "generation": 7, "etag": "etag:x", "text": "foo"}),
        )
        .await
        .unwrap();
    assert_ne!(created.id(), "mine");
    assert_eq!(created.generation(), 0);
    assert_ne!(created.etag(), "etag:x");

    let replaced = service
        .replace_record(
            "testtype",
            created.id(),
            json!({"id": "other", "generation": 99, "num": 1}),
            None,
        )
        .await
        .unwrap();
    assert_eq!(replaced.id(), created.id());
    assert_eq!(replaced.generation(), 1);
}

/// Get, replace and delete on an unknown id fail with not found.
pub async fn missing_ids_are_not_found<S: RecordStorage>(service: RecordService<S>) {
    let err = service.get::<TestType>("missing").await.unwrap_err();
    assert!(err.is_not_found());

    let err = service
        .replace::<TestType>("missing", &TestTypeFields::default().text("x"), None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = service.delete::<TestType>("missing", None).await.unwrap_err();
    assert!(err.is_not_found());
}

/// A mistyped field is rejected and the record is left as it was.
pub async fn invalid_replace_does_not_mutate<S: RecordStorage>(service: RecordService<S>) {
    let created = service
        .create_record("testtype", json!({"text": "foo", "num": 5}))
        .await
        .unwrap();

    let err = service
        .replace_record("testtype", created.id(), json!({"num": "x"}), None)
        .await
        .unwrap_err();
    assert!(err.is_invalid_argument());

    let err = service
        .replace_record("testtype", created.id(), json!("not an object"), None)
        .await
        .unwrap_err();
    assert!(err.is_invalid_argument());

    let current = service.get_record("testtype", created.id()).await.unwrap();
    assert_eq!(current, created);
}

// ============================================================================
// Preconditions
// ============================================================================

/// Matching preconditions succeed; mismatches fail without writing.
pub async fn preconditions<S: RecordStorage>(service: RecordService<S>) {
    let created = service
        .create::<TestType>(&TestTypeFields::default().text("foo").num(5))
        .await
        .unwrap();
    let fields = TestTypeFields::default().text("bar");

    let by_etag = Precondition::Etag(created.etag.clone());
    let replaced = service
        .replace::<TestType>(&created.id, &fields, Some(&by_etag))
        .await
        .unwrap();
    assert_eq!(replaced.generation, 1);

    // The old etag is stale now.
    let err = service
        .replace::<TestType>(&created.id, &fields, Some(&by_etag))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("etag mismatch"));

    let by_generation = Precondition::Generation(1);
    let replaced = service
        .replace::<TestType>(&created.id, &TestTypeFields::default().num(3), Some(&by_generation))
        .await
        .unwrap();
    assert_eq!(replaced.record, text_num("", 3));

    let err = service
        .replace::<TestType>(&created.id, &fields, Some(&Precondition::Generation(50)))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("generation mismatch"));

    let current = service.get::<TestType>(&created.id).await.unwrap();
    assert_eq!(current, replaced);

    let err = service
        .delete::<TestType>(&created.id, Some(&Precondition::Generation(0)))
        .await
        .unwrap_err();
    assert!(err.is_precondition_failed());
    service
        .delete::<TestType>(&created.id, Some(&Precondition::Generation(2)))
        .await
        .unwrap();
}

// ============================================================================
// Delete
// ============================================================================

/// A deleted record behaves like one that never existed.
pub async fn delete_removes_record<S: RecordStorage>(service: RecordService<S>) {
    let created = service
        .create::<TestType>(&TestTypeFields::default().text("foo"))
        .await
        .unwrap();
    let other = service
        .create::<TestType>(&TestTypeFields::default().text("keep"))
        .await
        .unwrap();

    service.delete::<TestType>(&created.id, None).await.unwrap();

    assert!(service.get::<TestType>(&created.id).await.unwrap_err().is_not_found());
    assert!(service.get::<TestType>(&other.id).await.is_ok());
    assert_eq!(service.storage().count("testtype").await.unwrap(), 1);
}

// ============================================================================
// List
// ============================================================================

async fn seed<S: RecordStorage>(service: &RecordService<S>) {
    for (text, num) in [("alpha", 3), ("beta", 1), ("gamma", 2), ("alphabet", 5)] {
        service
            .create::<TestType>(&TestTypeFields::default().text(text).num(num))
            .await
            .unwrap();
    }
}

fn texts(records: &[stowage_persistence::Stored<TestType>]) -> Vec<&str> {
    records.iter().map(|r| r.record.text.as_str()).collect()
}

/// Filters, sorting and windowing.
pub async fn list_filters_and_sorts<S: RecordStorage>(service: RecordService<S>) {
    seed(&service).await;

    let all = service.list::<TestType>(&ListOptions::new()).await.unwrap();
    assert_eq!(all.len(), 4);

    let by_num = ListOptions::new().sort(SortField::asc("num"));
    assert_eq!(
        texts(&service.list::<TestType>(&by_num).await.unwrap()),
        vec!["beta", "gamma", "alpha", "alphabet"]
    );

    let desc_window = ListOptions::new()
        .sort(SortField::desc("num"))
        .offset(1)
        .limit(2);
    assert_eq!(
        texts(&service.list::<TestType>(&desc_window).await.unwrap()),
        vec!["alpha", "gamma"]
    );

    let gte = ListOptions::new()
        .filter(Filter::new("num", FilterOp::Gte, 3))
        .sort(SortField::asc("text"));
    assert_eq!(
        texts(&service.list::<TestType>(&gte).await.unwrap()),
        vec!["alpha", "alphabet"]
    );

    let prefix = ListOptions::new()
        .filter(Filter::new("text", FilterOp::HasPrefix, "alpha"))
        .filter(Filter::new("num", FilterOp::Lt, 5));
    assert_eq!(
        texts(&service.list::<TestType>(&prefix).await.unwrap()),
        vec!["alpha"]
    );

    let one_of = ListOptions::new()
        .filter(Filter::one_of("num", [1, 2]))
        .sort(SortField::desc("text"));
    assert_eq!(
        texts(&service.list::<TestType>(&one_of).await.unwrap()),
        vec!["gamma", "beta"]
    );
}

/// Raw query strings resolve against the record type.
pub async fn list_raw_queries<S: RecordStorage>(service: RecordService<S>) {
    seed(&service).await;

    let query = ListQuery::from_pairs([("num[gt]", "1"), ("_sort", "-num"), ("_limit", "2")])
        .unwrap();
    let records = service.list_records("testtype", &query).await.unwrap();
    let nums: Vec<i64> = records
        .iter()
        .map(|r| r.content()["num"].as_i64().unwrap())
        .collect();
    assert_eq!(nums, vec![5, 3]);

    let query = ListQuery::from_pairs([("generation", "0"), ("text", "beta")]).unwrap();
    assert_eq!(service.list_records("testtype", &query).await.unwrap().len(), 1);

    let query = ListQuery::from_pairs([("bogus", "1")]).unwrap();
    let err = service.list_records("testtype", &query).await.unwrap_err();
    assert!(err.is_invalid_argument());
}

// ============================================================================
// Find
// ============================================================================

/// Short ID lookup succeeds only for a unique prefix.
pub async fn find_by_short_id<S: RecordStorage>(service: RecordService<S>) {
    let foo = service
        .create::<TestType>(&TestTypeFields::default().text("foo"))
        .await
        .unwrap();

    let found = service.find::<TestType>(&foo.id[..4]).await.unwrap();
    assert_eq!(found, foo);

    assert!(service.find::<TestType>("doesnotexist").await.unwrap_err().is_not_found());

    service
        .create::<TestType>(&TestTypeFields::default().text("bar"))
        .await
        .unwrap();
    assert!(service.find::<TestType>("").await.unwrap_err().is_ambiguous());
    assert_eq!(service.find::<TestType>(&foo.id).await.unwrap().record.text, "foo");
}

// ============================================================================
// Watch
// ============================================================================

const WATCH_TIMEOUT: Duration = Duration::from_secs(5);

/// A record watch reports the initial state, each replace, then the delete.
pub async fn watch_record_follows_writes<S: RecordStorage>(service: RecordService<S>) {
    let created = service
        .create_record("testtype", json!({"text": "foo"}))
        .await
        .unwrap();

    let mut watch = service.watch_record("testtype", created.id()).await.unwrap();
    assert_eq!(watch.id(), created.id());

    match tokio::time::timeout(WATCH_TIMEOUT, watch.next()).await.unwrap().unwrap() {
        Some(RecordUpdate::Initial(record)) => {
            assert_eq!(record.etag(), created.etag());
            assert_eq!(record.generation(), 0);
        }
        other => panic!("expected initial state, got {:?}", other),
    }

    service
        .replace_record("testtype", created.id(), json!({"text": "bar"}), None)
        .await
        .unwrap();
    match tokio::time::timeout(WATCH_TIMEOUT, watch.next()).await.unwrap().unwrap() {
        Some(RecordUpdate::Updated(record)) => {
            assert_eq!(record.content(), &json!({"text": "bar", "num": 0}));
            assert_eq!(record.generation(), 1);
        }
        other => panic!("expected update, got {:?}", other),
    }

    service.delete_record("testtype", created.id(), None).await.unwrap();
    let deleted = tokio::time::timeout(WATCH_TIMEOUT, watch.next()).await.unwrap().unwrap();
    assert_eq!(deleted, Some(RecordUpdate::Deleted));

    let done = tokio::time::timeout(WATCH_TIMEOUT, watch.next()).await.unwrap().unwrap();
    assert_eq!(done, None);
}

/// Watching a missing record or type fails up front.
pub async fn watch_missing_record<S: RecordStorage>(service: RecordService<S>) {
    let err = service.watch_record("testtype", "junk").await.err().unwrap();
    assert!(err.is_not_found());

    let err = service.watch_record("doesnotexist", "junk").await.err().unwrap();
    assert!(err.to_string().contains("unknown type"));

    let err = service
        .watch_list("doesnotexist", &ListQuery::default())
        .await
        .err()
        .unwrap();
    assert!(err.to_string().contains("unknown type"));
}

/// A list watch yields the list again after each create, replace and delete.
pub async fn watch_list_follows_writes<S: RecordStorage>(service: RecordService<S>) {
    let mut watch = service
        .watch_list("testtype", &ListQuery::default())
        .await
        .unwrap();

    let initial = tokio::time::timeout(WATCH_TIMEOUT, watch.next()).await.unwrap().unwrap().unwrap();
    assert!(initial.is_empty());

    let created = service
        .create_record("testtype", json!({"text": "foo"}))
        .await
        .unwrap();
    let list = tokio::time::timeout(WATCH_TIMEOUT, watch.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].id(), created.id());
    assert_eq!(list[0].field("text"), Some(json!("foo")));

    service
        .replace_record("testtype", created.id(), json!({"text": "bar"}), None)
        .await
        .unwrap();
    let list = tokio::time::timeout(WATCH_TIMEOUT, watch.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].field("text"), Some(json!("bar")));

    service.delete_record("testtype", created.id(), None).await.unwrap();
    let list = tokio::time::timeout(WATCH_TIMEOUT, watch.next()).await.unwrap().unwrap().unwrap();
    assert!(list.is_empty());
}

/// A list watch applies its options and ignores writes to other types.
pub async fn watch_list_applies_options<S: RecordStorage>(service: RecordService<S>) {
    for text in ["foo", "bar"] {
        service
            .create_record("testtype", json!({ "text": text }))
            .await
            .unwrap();
    }

    let query = ListQuery::from_pairs([("_limit", "1"), ("_sort", "text")]).unwrap();
    let mut watch = service.watch_list("testtype", &query).await.unwrap();

    let initial = tokio::time::timeout(WATCH_TIMEOUT, watch.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(initial.len(), 1);
    assert_eq!(initial[0].field("text"), Some(json!("bar")));

    service
        .storage()
        .create("othertype", json!({"text": "aaa"}))
        .await
        .unwrap();
    service
        .create_record("testtype", json!({"text": "zzz"}))
        .await
        .unwrap();

    let quiet = tokio::time::timeout(Duration::from_millis(200), watch.next()).await;
    assert!(quiet.is_err(), "unchanged window must not be yielded again");
}
