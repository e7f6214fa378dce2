//! Async receive and stream consumption of room events.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chat_stream::{EventHandlers, EventPoller, PollerConfig, RoomId};
use common::{event, ScriptedFetcher};
use futures::StreamExt;
use tokio::time::{sleep, timeout};

fn poller_with(fetcher: &Arc<ScriptedFetcher>) -> EventPoller {
    EventPoller::new(
        Arc::clone(fetcher) as _,
        PollerConfig::default().with_default_interval(Duration::from_millis(100)),
    )
}

#[tokio::test(start_paused = true)]
async fn test_recv_yields_events_in_order() {
    let fetcher = ScriptedFetcher::new();
    fetcher.push_page("lobby", Some("c1"), vec![event("a", "goal"), event("b", "purge")]);
    fetcher.push_page("lobby", Some("c2"), vec![event("c", "reaction")]);
    let poller = poller_with(&fetcher);

    let mut updates = poller.updates("lobby").unwrap();

    let mut ids = Vec::new();
    for _ in 0..3 {
        let received = timeout(Duration::from_secs(1), updates.recv()).await.unwrap();
        ids.push(received.unwrap().id);
    }
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert!(updates.try_recv().is_none());

    poller.shutdown_all().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_updates_as_stream() {
    let fetcher = ScriptedFetcher::new();
    fetcher.push_page("lobby", Some("c1"), vec![event("a", "goal"), event("b", "reply")]);
    let poller = poller_with(&fetcher);

    let updates = poller
        .updates_every("lobby", Duration::from_millis(250))
        .unwrap();
    let events: Vec<_> = timeout(Duration::from_secs(1), updates.take(2).collect())
        .await
        .unwrap();

    let ids: Vec<_> = events.iter().map(|event| event.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);

    poller.shutdown_all().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_dropping_updates_stops_the_room() {
    let fetcher = ScriptedFetcher::new();
    let poller = poller_with(&fetcher);
    let room = RoomId::new("lobby");

    let updates = poller.updates("lobby").unwrap();
    assert!(poller.is_subscribed(&room));

    drop(updates);
    assert!(!poller.is_subscribed(&room));

    sleep(Duration::from_secs(1)).await;
    assert!(fetcher.call_count("lobby") <= 1);

    poller.shutdown_all().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_replaced_updates_end_without_stopping_the_room() {
    let fetcher = ScriptedFetcher::new();
    let poller = poller_with(&fetcher);
    let room = RoomId::new("lobby");

    let mut updates = poller.updates("lobby").unwrap();
    sleep(Duration::from_millis(10)).await;

    poller
        .start_updates_default("lobby", EventHandlers::new())
        .unwrap();

    let ended = timeout(Duration::from_secs(1), updates.recv()).await.unwrap();
    assert!(ended.is_none());

    drop(updates);
    assert!(poller.is_subscribed(&room));

    poller.shutdown_all().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stop_ends_updates_after_buffered_events() {
    let fetcher = ScriptedFetcher::new();
    fetcher.push_page("lobby", Some("c1"), vec![event("a", "goal")]);
    let poller = poller_with(&fetcher);

    let mut updates = poller.updates("lobby").unwrap();
    sleep(Duration::from_millis(10)).await;
    assert!(updates.stop());

    let buffered = timeout(Duration::from_secs(1), updates.recv()).await.unwrap();
    assert_eq!(buffered.map(|event| event.id), Some("a".to_string()));

    let ended = timeout(Duration::from_secs(60), updates.recv()).await.unwrap();
    assert!(ended.is_none());
    assert!(poller.is_polling(&RoomId::new("lobby")));

    poller.shutdown_all().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stopping_the_room_ends_the_stream() {
    let fetcher = ScriptedFetcher::new();
    let poller = poller_with(&fetcher);

    let updates = poller.updates("lobby").unwrap();
    sleep(Duration::from_millis(10)).await;
    assert!(poller.stop_updates(&RoomId::new("lobby")));

    let rest: Vec<_> = timeout(Duration::from_secs(60), updates.collect())
        .await
        .unwrap();
    assert!(rest.is_empty());

    poller.shutdown_all().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stopping_through_handle_ends_updates() {
    let fetcher = ScriptedFetcher::new();
    let poller = poller_with(&fetcher);

    let mut updates = poller.updates("lobby").unwrap();
    let handle = updates.handle().clone();
    assert!(handle.stop());
    assert!(!handle.is_active());

    let ended = timeout(Duration::from_secs(60), updates.recv()).await.unwrap();
    assert!(ended.is_none());

    poller.shutdown_all().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_ends_updates() {
    let fetcher = ScriptedFetcher::new();
    let poller = poller_with(&fetcher);

    let mut updates = poller.updates("lobby").unwrap();
    poller.shutdown_all().await.unwrap();

    assert!(updates.recv().await.is_none());
}
