//! Cached reads and optimistic source mutations.

mod common;

use std::time::Duration;

use catchup_core::api::SourcesApi;
use catchup_core::models::{CreateSourceInput, UpdateSourceInput};
use catchup_core::{ErrorKind, MutationCache, SourceId};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rename(name: &str) -> UpdateSourceInput {
    UpdateSourceInput {
        name: Some(name.to_string()),
        ..UpdateSourceInput::default()
    }
}

fn source_json(id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "feed_url": format!("https://feeds.example.com/{id}"),
        "active": true,
        "last_crawled_at": null
    })
}

#[tokio::test]
async fn test_failed_update_restores_cache_exactly() {
    let server = MockServer::start().await;
    let (client, _) = common::client(&server.uri());
    let cache = client.cache();
    cache.write(&SourcesApi::list_key(), json!([{ "id": 1, "name": "A" }]));

    Mock::given(method("PUT"))
        .and(path("/sources/1"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({ "message": "taken" })))
        .expect(1)
        .mount(&server)
        .await;

    let error = client
        .sources()
        .update(SourceId(1), &rename("B"))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Client);
    assert_eq!(
        cache.snapshot(&SourcesApi::list_key()),
        Some(json!([{ "id": 1, "name": "A" }]))
    );
}

#[tokio::test]
async fn test_sibling_is_untouched_through_optimistic_and_rollback_phases() {
    let server = MockServer::start().await;
    let (client, _) = common::client(&server.uri());
    let cache = client.cache().clone();
    let sibling = json!({ "id": 2, "name": "Other", "feed_url": "https://o.dev", "extra": [1, 2] });
    cache.write(
        &SourcesApi::list_key(),
        json!([{ "id": 1, "name": "A" }, sibling.clone()]),
    );

    Mock::given(method("PUT"))
        .and(path("/sources/1"))
        .respond_with(ResponseTemplate::new(500).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let sources = client.sources();
    let pending = tokio::spawn(async move { sources.update(SourceId(1), &rename("B")).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let optimistic = cache.snapshot(&SourcesApi::list_key()).unwrap();
    assert_eq!(optimistic[0], json!({ "id": 1, "name": "B" }));
    assert_eq!(
        serde_json::to_string(&optimistic[1]).unwrap(),
        serde_json::to_string(&sibling).unwrap()
    );

    assert!(pending.await.unwrap().is_err());
    let rolled_back = cache.snapshot(&SourcesApi::list_key()).unwrap();
    assert_eq!(rolled_back[0], json!({ "id": 1, "name": "A" }));
    assert_eq!(
        serde_json::to_string(&rolled_back[1]).unwrap(),
        serde_json::to_string(&sibling).unwrap()
    );
}

#[tokio::test]
async fn test_concurrent_updates_keep_each_others_writes() {
    let server = MockServer::start().await;
    let (client, _) = common::client(&server.uri());
    let cache = client.cache().clone();
    cache.write(
        &SourcesApi::list_key(),
        json!([source_json(1, "A"), source_json(2, "Other")]),
    );

    Mock::given(method("PUT"))
        .and(path("/sources/1"))
        .respond_with(ResponseTemplate::new(400).set_delay(Duration::from_millis(200)))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/sources/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(source_json(2, "Y")))
        .mount(&server)
        .await;

    let sources = client.sources();
    let first = {
        let sources = sources.clone();
        tokio::spawn(async move { sources.update(SourceId(1), &rename("B")).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let updated = sources.update(SourceId(2), &rename("Y")).await.unwrap();
    assert_eq!(updated.name, "Y");
    assert!(first.await.unwrap().is_err());

    assert_eq!(
        cache.snapshot(&SourcesApi::list_key()),
        Some(json!([source_json(1, "A"), source_json(2, "Y")]))
    );
}

#[tokio::test]
async fn test_successful_update_refetches_on_next_read() {
    let server = MockServer::start().await;
    let (client, _) = common::client(&server.uri());

    Mock::given(method("GET"))
        .and(path("/sources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([source_json(1, "A")])))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([source_json(1, "B")])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/sources/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(source_json(1, "B")))
        .expect(1)
        .mount(&server)
        .await;

    let sources = client.sources();
    assert_eq!(sources.list().await.unwrap()[0].name, "A");
    assert_eq!(sources.list().await.unwrap()[0].name, "A");

    sources.update(SourceId(1), &rename("B")).await.unwrap();
    assert!(client.cache().is_stale(&SourcesApi::list_key()));
    assert_eq!(sources.list().await.unwrap()[0].name, "B");
}

#[tokio::test]
async fn test_update_with_cold_cache_still_sends_request() {
    let server = MockServer::start().await;
    let (client, _) = common::client(&server.uri());

    Mock::given(method("PUT"))
        .and(path("/sources/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(source_json(5, "Fresh")))
        .expect(1)
        .mount(&server)
        .await;

    let updated = client
        .sources()
        .update(SourceId(5), &rename("Fresh"))
        .await
        .unwrap();
    assert_eq!(updated.id, SourceId(5));
    assert_eq!(client.cache().snapshot(&SourcesApi::list_key()), None);
}

#[tokio::test]
async fn test_failed_delete_puts_source_back_in_place() {
    let server = MockServer::start().await;
    let (client, _) = common::client(&server.uri());
    let original = json!([source_json(1, "A"), source_json(2, "B"), source_json(3, "C")]);
    client
        .cache()
        .write(&SourcesApi::list_key(), original.clone());

    Mock::given(method("DELETE"))
        .and(path("/sources/2"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "gone" })))
        .expect(1)
        .mount(&server)
        .await;

    let error = client.sources().delete(SourceId(2)).await.unwrap_err();
    assert_eq!(error.to_string(), "gone");
    assert_eq!(client.cache().snapshot(&SourcesApi::list_key()), Some(original));
}

#[tokio::test]
async fn test_delete_removes_source_and_accepts_empty_body() {
    let server = MockServer::start().await;
    let (client, _) = common::client(&server.uri());
    client.cache().write(
        &SourcesApi::list_key(),
        json!([source_json(1, "A"), source_json(2, "B")]),
    );

    Mock::given(method("DELETE"))
        .and(path("/sources/1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client.sources().delete(SourceId(1)).await.unwrap();
    assert_eq!(
        client.cache().snapshot(&SourcesApi::list_key()),
        Some(json!([source_json(2, "B")]))
    );
    assert!(client.cache().is_stale(&SourcesApi::list_key()));
}

#[tokio::test]
async fn test_create_validates_before_sending() {
    let server = MockServer::start().await;
    let (client, _) = common::client(&server.uri());

    Mock::given(method("POST"))
        .and(path("/sources"))
        .respond_with(ResponseTemplate::new(201).set_body_json(source_json(9, "Lobsters")))
        .expect(1)
        .mount(&server)
        .await;

    let invalid = CreateSourceInput::new("Lobsters", "lobste.rs/rss");
    let error = client.sources().create(&invalid).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidRequest);

    let created = client
        .sources()
        .create(&CreateSourceInput::new("Lobsters", "https://lobste.rs/rss"))
        .await
        .unwrap();
    assert_eq!(created.id, SourceId(9));
}

#[tokio::test]
async fn test_article_reads_are_cached() {
    let server = MockServer::start().await;
    let (client, _) = common::client(&server.uri());

    Mock::given(method("GET"))
        .and(path("/articles/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 3,
            "source_id": 1,
            "title": "Zero-cost futures",
            "url": "https://example.com/futures",
            "summary": "Why polling works."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let articles = client.articles();
    let first = articles.get(catchup_core::ArticleId(3)).await.unwrap();
    let second = articles.get(catchup_core::ArticleId(3)).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.title, "Zero-cost futures");
}
