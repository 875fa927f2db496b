//! Server-sent events for the live notification stream.
//!
//! Each notification is written as `event: <name>\ndata: <json>\n\n`. While nothing happens, a `: keep-alive`
//! comment goes out every `keep_alive` so that proxies do not drop the connection.
use std::time::Duration;

use bytes::Bytes;
use drinks_pos_engine::{Notification, Subscription};
use futures::{stream, Stream, StreamExt};
use log::*;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(15);

const CONNECTED: &[u8] = b": connected\n\n";
const KEEP_ALIVE: &[u8] = b": keep-alive\n\n";

pub fn render_event(notification: &Notification) -> Bytes {
    match serde_json::to_string(notification) {
        Ok(json) => Bytes::from(format!("event: {}\ndata: {json}\n\n", notification.event_name())),
        Err(e) => {
            error!("📣️ Could not serialize notification. {e}");
            Bytes::from_static(KEEP_ALIVE)
        },
    }
}

/// Turns a subscription into an SSE body. The stream ends when the hub goes away; dropping it (i.e. the client
/// disconnecting) detaches the subscriber.
pub fn sse_stream(
    subscription: Subscription,
    keep_alive: Duration,
) -> impl Stream<Item = Result<Bytes, actix_web::Error>> {
    let mut ticker = interval_at(Instant::now() + keep_alive, keep_alive);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let events = stream::unfold((subscription, ticker), |(mut subscription, mut ticker)| async move {
        let chunk = tokio::select! {
            next = subscription.next() => render_event(&next?),
            _ = ticker.tick() => Bytes::from_static(KEEP_ALIVE),
        };
        Some((chunk, (subscription, ticker)))
    });
    stream::once(async { Bytes::from_static(CONNECTED) }).chain(events).map(Ok)
}
