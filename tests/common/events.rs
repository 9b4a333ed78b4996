//! Helpers for watching a reconnector's event channel

use live_updates::client::ClientEvent;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// Wait for the first event matching `predicate`; everything before it is returned too
pub async fn wait_for_event<F>(
    events: &mut UnboundedReceiver<ClientEvent>,
    mut predicate: F,
) -> Vec<ClientEvent>
where
    F: FnMut(&ClientEvent) -> bool,
{
    let mut seen = Vec::new();
    let deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => panic!("timed out waiting for event; saw {:?}", seen),
            event = events.recv() => {
                let event = event.unwrap_or_else(|| panic!("event channel closed; saw {:?}", seen));
                let matched = predicate(&event);
                seen.push(event);
                if matched {
                    return seen;
                }
            }
        }
    }
}

/// Everything still buffered in the channel
pub fn drain_events(events: &mut UnboundedReceiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}
