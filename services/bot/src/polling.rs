use hr_intake::integrations::telegram::{event_from_update, TelegramClient};
use hr_intake::workflows::intake::{
    CatalogSource, ChatId, ConversationDriver, IncomingEvent, ResponseSheet,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Next `getUpdates` offset after a batch: one past the highest id seen.
pub(crate) fn next_offset(
    current: Option<i64>,
    update_ids: impl IntoIterator<Item = i64>,
) -> Option<i64> {
    update_ids
        .into_iter()
        .map(|id| id + 1)
        .fold(current, |offset, candidate| {
            Some(offset.map_or(candidate, |offset| offset.max(candidate)))
        })
}

/// Splits a batch per chat, keeping each chat's arrival order.
pub(crate) fn group_by_chat(
    events: impl IntoIterator<Item = IncomingEvent>,
) -> BTreeMap<ChatId, Vec<IncomingEvent>> {
    let mut grouped: BTreeMap<ChatId, Vec<IncomingEvent>> = BTreeMap::new();
    for event in events {
        grouped.entry(event.chat).or_default().push(event);
    }
    grouped
}

/// Long-polls for updates forever. Chats in a batch are handled concurrently, each chat's
/// updates in arrival order; a failed poll is retried after a short pause.
pub(crate) async fn run<C, S>(
    client: Arc<TelegramClient>,
    driver: Arc<ConversationDriver<C, S, TelegramClient>>,
) where
    C: CatalogSource + 'static,
    S: ResponseSheet + 'static,
{
    info!("long polling for updates");
    let mut offset = None;
    loop {
        let updates = match client.get_updates(offset).await {
            Ok(updates) => updates,
            Err(err) => {
                warn!(error = %err, "getUpdates failed; retrying");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        offset = next_offset(offset, updates.iter().map(|update| update.update_id));
        let batches = group_by_chat(updates.into_iter().filter_map(event_from_update));
        let mut handles = Vec::with_capacity(batches.len());
        for (_, events) in batches {
            let driver = driver.clone();
            handles.push(tokio::spawn(async move {
                for event in events {
                    driver.process(event).await;
                }
            }));
        }
        // the next batch may carry later messages for the same chats
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "update handler task failed");
            }
        }
    }
}
