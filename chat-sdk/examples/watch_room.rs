//! Print the live events of one room until Ctrl-C.
//!
//! ```text
//! CHAT_ENDPOINT=https://api.example.com/api/v3 CHAT_APP_ID=my-app \
//! CHAT_API_TOKEN=... CHAT_USER_TOKEN=... \
//! cargo run -p chat-sdk --example watch_room -- match-day
//! ```

use std::time::Duration;

use chat_sdk::logging::{init_logging, LoggingMode};
use chat_sdk::{ChatSession, ClientConfig, EventHandlers, SessionError};

fn env(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| {
        eprintln!("{name} is not set");
        std::process::exit(2);
    })
}

#[tokio::main]
async fn main() -> Result<(), SessionError> {
    init_logging(LoggingMode::Development)?;

    let room = std::env::args().nth(1).unwrap_or_else(|| "lobby".to_string());
    let config = ClientConfig::new(env("CHAT_ENDPOINT"), env("CHAT_APP_ID"), env("CHAT_API_TOKEN"));

    let mut builder = ChatSession::builder(config);
    if let Ok(token) = std::env::var("CHAT_USER_TOKEN") {
        builder = builder.token(token);
    }
    let session = builder.build()?;

    session.start_updates_every(
        room.as_str(),
        Duration::from_millis(500),
        EventHandlers::new()
            .on_goal(|event| println!("⚽ GOAL {}", event.body))
            .on_reply(|event| println!("↪ {}", event.body))
            .on_purge(|event| println!("🗑 purged {}", event.replytoid.as_deref().unwrap_or("?")))
            .on_event(|event| println!("[{}] {}", event.eventtype, event.body))
            .on_error(|error| eprintln!("fetch failed: {error}")),
    )?;

    println!("Watching room {room}, press Ctrl-C to stop");
    let _ = tokio::signal::ctrl_c().await;

    println!("{}", session.stats());
    session.shutdown().await
}
