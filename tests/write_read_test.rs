mod helpers;

use helpers::{keyed, note, tagged, test_service};
use memoria::memory::types::{ListRequest, RetrieveRequest};

fn query(scope: Option<&str>, text: &str) -> RetrieveRequest {
    RetrieveRequest {
        scope: scope.map(String::from),
        query: text.into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn stored_note_is_retrieved_by_meaning() {
    let svc = test_service();
    svc.store(Some("app"), keyed("m1", "Use Zod for validation", "validation-lib"))
        .await
        .unwrap();
    svc.store(Some("app"), note("m2", "Deploy on Friday")).await.unwrap();

    let results = svc
        .retrieve(query(Some("app"), "which validation library"))
        .await
        .unwrap();

    assert_eq!(results[0].entry.id, "m1");
    assert!(results[0].score > results[1].score);
}

#[tokio::test]
async fn scopes_are_isolated() {
    let svc = test_service();
    svc.store(Some("alpha"), note("a1", "Use Rust")).await.unwrap();
    svc.store(Some("beta"), note("b1", "Use Python")).await.unwrap();
    svc.store(None, note("g1", "Use tabs")).await.unwrap();

    let alpha = svc.retrieve(query(Some("alpha"), "use")).await.unwrap();
    assert_eq!(alpha.len(), 1);
    assert_eq!(alpha[0].entry.id, "a1");

    let global = svc.retrieve(query(None, "use")).await.unwrap();
    assert_eq!(global.len(), 1);
    assert_eq!(global[0].entry.scope, "global");
}

#[tokio::test]
async fn wildcard_reads_every_scope() {
    let svc = test_service();
    svc.store(Some("alpha"), note("a1", "Use Rust")).await.unwrap();
    svc.store(Some("beta"), note("b1", "Use Python")).await.unwrap();
    svc.store(None, note("g1", "Use tabs")).await.unwrap();

    let all = svc.retrieve(query(Some("*"), "use")).await.unwrap();
    assert_eq!(all.len(), 3);

    let listed = svc
        .list(ListRequest {
            scope: Some("*".into()),
            tags: vec![],
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 3);
}

#[tokio::test]
async fn tag_filter_requires_every_tag() {
    let svc = test_service();
    svc.store(Some("p"), tagged("t1", "Use Zod", &["conventions", "frontend"]))
        .await
        .unwrap();
    svc.store(Some("p"), tagged("t2", "Avoid Joi", &["conventions"]))
        .await
        .unwrap();

    let both = svc
        .retrieve(RetrieveRequest {
            tags: vec!["Conventions".into(), "FRONTEND".into()],
            ..query(Some("p"), "zod joi")
        })
        .await
        .unwrap();
    assert_eq!(both.len(), 1);
    assert_eq!(both[0].entry.id, "t1");

    let one = svc
        .list(ListRequest {
            scope: Some("p".into()),
            tags: vec!["conventions".into()],
        })
        .await
        .unwrap();
    assert_eq!(one.len(), 2);
}

#[tokio::test]
async fn limit_caps_results() {
    let svc = test_service();
    for i in 0..5 {
        svc.store(None, note(&format!("n{i}"), "Use Rust")).await.unwrap();
    }

    let two = svc
        .retrieve(RetrieveRequest {
            limit: Some(2),
            ..query(None, "rust")
        })
        .await
        .unwrap();
    assert_eq!(two.len(), 2);

    let zero_means_default = svc
        .retrieve(RetrieveRequest {
            limit: Some(0),
            ..query(None, "rust")
        })
        .await
        .unwrap();
    assert_eq!(zero_means_default.len(), 5);
}

#[tokio::test]
async fn equal_scores_prefer_most_recent() {
    let svc = test_service();
    svc.store(None, note("old", "Use Rust")).await.unwrap();
    svc.store(None, note("new", "Use Rust")).await.unwrap();

    let results = svc.retrieve(query(None, "rust")).await.unwrap();
    assert_eq!(results[0].entry.id, "new");
    assert_eq!(results[1].entry.id, "old");
}

#[tokio::test]
async fn list_orders_by_recency() {
    let svc = test_service();
    svc.store(None, note("first", "Use Rust")).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    svc.store(None, note("second", "Use Python")).await.unwrap();

    let listed = svc.list(ListRequest::default()).await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["second", "first"]);
}

#[tokio::test]
async fn delete_needs_matching_scope() {
    let svc = test_service();
    svc.store(Some("p"), note("d1", "Use Rust")).await.unwrap();

    assert!(!svc.delete(None, "d1").await.unwrap());
    assert!(svc.delete(Some("p"), "d1").await.unwrap());
    assert!(!svc.delete(Some("p"), "d1").await.unwrap());

    let listed = svc
        .list(ListRequest {
            scope: Some("p".into()),
            tags: vec![],
        })
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn blank_query_is_rejected() {
    let svc = test_service();
    let err = svc.retrieve(query(None, "   ")).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_argument");
}
