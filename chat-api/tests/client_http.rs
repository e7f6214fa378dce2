//! HTTP-level tests for ChatClient against a mock chat service.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chat_api::{
    ApiError, ChatClient, ClientConfig, Cursor, EventFetcher, EventType, RoomId, Token,
    TokenHolder, TokenRefreshBroadcaster,
};
use mockito::Matcher;

const UPDATES_PATH: &str = "/app-1/chat/rooms/room-1/updates";

fn updates_body(cursor: &str, events: &[(&str, &str)]) -> String {
    let events: Vec<_> = events
        .iter()
        .map(|(id, eventtype)| {
            serde_json::json!({
                "kind": "chat.event",
                "id": id,
                "roomid": "room-1",
                "body": format!("body of {id}"),
                "eventtype": eventtype,
            })
        })
        .collect();

    serde_json::json!({
        "kind": "api.result",
        "message": "Success",
        "code": 200,
        "data": {
            "kind": "list.chatevents",
            "cursor": cursor,
            "more": false,
            "itemcount": events.len(),
            "events": events,
        }
    })
    .to_string()
}

fn client_for(server: &mockito::Server, tokens: TokenHolder) -> ChatClient {
    ChatClient::new(ClientConfig::new(server.url(), "app-1", "api-key"), tokens).unwrap()
}

#[tokio::test]
async fn test_get_updates_sends_credentials_and_cursor() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", UPDATES_PATH)
        .match_query(Matcher::UrlEncoded("cursor".into(), "c-41".into()))
        .match_header("x-api-token", "api-key")
        .match_header("authorization", "Bearer user-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(updates_body("c-42", &[("e1", "goal"), ("e2", "speech")]))
        .create_async()
        .await;

    let client = client_for(&server, TokenHolder::new(Some(Token::new("user-token"))));
    let page = client
        .get_updates(&RoomId::new("room-1"), Some(&Cursor::new("c-41")))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(page.next_cursor(), Some(&Cursor::new("c-42")));
    assert_eq!(page.events.len(), 2);
    assert_eq!(page.events[0].eventtype, EventType::Goal);
    assert_eq!(page.events[1].eventtype, EventType::Other("speech".to_string()));
}

#[tokio::test]
async fn test_unauthenticated_request_has_no_bearer() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", UPDATES_PATH)
        .match_query(Matcher::Any)
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body(updates_body("c-1", &[]))
        .create_async()
        .await;

    let client = client_for(&server, TokenHolder::default());
    let page = client
        .fetch_events(&RoomId::new("room-1"), None)
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(page.events.is_empty());
}

#[tokio::test]
async fn test_token_is_read_at_request_time() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", UPDATES_PATH)
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer second")
        .with_status(200)
        .with_body(updates_body("c-1", &[]))
        .create_async()
        .await;

    let tokens = TokenHolder::new(Some(Token::new("first")));
    let client = client_for(&server, tokens.clone());
    tokens.set(Some(Token::new("second")));

    client.get_updates(&RoomId::new("room-1"), None).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rejected_token_triggers_refresh() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", UPDATES_PATH)
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(r#"{"kind":"api.result","message":"Unauthorized","code":401}"#)
        .create_async()
        .await;

    let tokens = TokenHolder::new(Some(Token::new("expired")));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let broadcaster = TokenRefreshBroadcaster::new(tokens.clone(), move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, chat_auth::AuthError>(Token::new("renewed")) }
    });

    let client = client_for(&server, tokens.clone()).with_refresh(broadcaster);
    let result = client.get_updates(&RoomId::new("room-1"), None).await;

    assert_eq!(result.unwrap_err(), ApiError::Unauthorized);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(tokens.get(), Some(Token::new("renewed")));
}

#[tokio::test]
async fn test_rejection_of_replaced_token_skips_refresh() {
    let mut server = mockito::Server::new_async().await;
    let tokens = TokenHolder::new(Some(Token::new("expired")));
    let rotated_elsewhere = tokens.clone();
    let _mock = server
        .mock("GET", UPDATES_PATH)
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer expired")
        .with_status(401)
        .with_body_from_request(move |_| {
            // Another request refreshed the token while this one was in flight.
            rotated_elsewhere.set(Some(Token::new("rotated")));
            br#"{"kind":"api.result","message":"Unauthorized","code":401}"#.to_vec()
        })
        .create_async()
        .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let broadcaster = TokenRefreshBroadcaster::new(tokens.clone(), move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, chat_auth::AuthError>(Token::new("renewed")) }
    });

    let client = client_for(&server, tokens.clone()).with_refresh(broadcaster);
    let result = client.get_updates(&RoomId::new("room-1"), None).await;

    assert_eq!(result.unwrap_err(), ApiError::Unauthorized);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(tokens.get(), Some(Token::new("rotated")));
}

#[tokio::test]
async fn test_server_error_reports_envelope_message() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", UPDATES_PATH)
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body(r#"{"kind":"api.result","message":"Service under maintenance","code":503}"#)
        .create_async()
        .await;

    let client = client_for(&server, TokenHolder::default());
    let error = client
        .get_updates(&RoomId::new("room-1"), None)
        .await
        .unwrap_err();

    assert_eq!(
        error,
        ApiError::Http {
            status: 503,
            message: "Service under maintenance".to_string()
        }
    );
    assert!(error.is_transient());
}

#[tokio::test]
async fn test_malformed_body_is_a_decode_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", UPDATES_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>not json</html>")
        .create_async()
        .await;

    let client = client_for(&server, TokenHolder::default());
    let error = client
        .get_updates(&RoomId::new("room-1"), None)
        .await
        .unwrap_err();

    assert!(matches!(error, ApiError::Decode(_)));
}
