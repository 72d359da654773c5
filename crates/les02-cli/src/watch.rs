//! `les02 watch` – a debug subscriber that prints every broadcast.
//!
//! Reconnects two seconds after the connection drops, until the process is
//! interrupted.

use std::time::Duration;

use colored::Colorize;
use futures_util::StreamExt;
use les02_types::{EventEnvelope, Les02Error};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::warn;

/// Where `watch` connects when no URI is given.
pub const DEFAULT_URI: &str = "ws://localhost:8765";

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Connect, print, reconnect.  Never returns.
pub async fn run(uri: &str) {
    loop {
        match session(uri).await {
            Ok(()) => println!("{}", "Connection closed by server.".yellow()),
            Err(e) => warn!(uri, error = %e, "watch connection failed"),
        }
        println!("  Reconnecting in {} s …", RECONNECT_DELAY.as_secs());
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn session(uri: &str) -> Result<(), Les02Error> {
    let (ws_stream, _) = connect_async(uri)
        .await
        .map_err(|e| Les02Error::Connection(format!("connect {uri}: {e}")))?;
    println!("{} {}", "✓ Connected to".green(), uri.bold());

    let (_ws_tx, mut ws_rx) = ws_stream.split();
    while let Some(msg) = ws_rx.next().await {
        match msg.map_err(|e| Les02Error::Connection(e.to_string()))? {
            Message::Text(text) => println!("{}", render(text.as_str())),
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}

/// One console line per received message.  Envelopes get a compact summary;
/// anything else is printed verbatim.
pub(crate) fn render(text: &str) -> String {
    match serde_json::from_str::<EventEnvelope>(text) {
        Ok(env) => format!(
            "[{:.6}] {} {} position_raw={}",
            env.ts,
            env.event_type,
            env.payload.channel.as_str(),
            env.payload.position_raw
        ),
        Err(_) => format!("Received: {text}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_position_envelope() {
        let text = r#"{"proto":1,"type":"position_sample","ts":12.5,"source":"les02","payload":{"channel":"slave","position_raw":66051}}"#;
        assert_eq!(render(text), "[12.500000] position_sample slave position_raw=66051");
    }

    #[test]
    fn renders_unknown_text_verbatim() {
        assert_eq!(render("not json"), "Received: not json");
    }
}
