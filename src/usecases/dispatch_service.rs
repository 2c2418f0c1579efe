//! Dispatch pass: deliver one publication to every registered group.
//!
//! Destinations are attempted independently, at most `concurrency` at a time, each
//! bounded by `delivery_timeout`. One failure never aborts the others.

use crate::domain::{Content, DomainError, FireSummary, Group};
use crate::ports::{MessageSender, PublicationStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Telegram rejects media captions longer than this.
pub const CAPTION_LIMIT: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Failed(String),
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub group: Group,
    pub status: DeliveryStatus,
}

/// Per-group outcomes of one dispatch pass, in group registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == DeliveryStatus::Delivered)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }

    pub fn summary(&self) -> FireSummary {
        FireSummary {
            delivered: self.delivered(),
            failed: self.failed(),
        }
    }
}

pub struct DispatchService {
    sender: Arc<dyn MessageSender>,
    store: Arc<dyn PublicationStore>,
    concurrency: usize,
    delivery_timeout: Duration,
}

impl DispatchService {
    pub fn new(
        sender: Arc<dyn MessageSender>,
        store: Arc<dyn PublicationStore>,
        concurrency: usize,
        delivery_timeout: Duration,
    ) -> Self {
        Self {
            sender,
            store,
            concurrency: concurrency.max(1),
            delivery_timeout,
        }
    }

    /// Deliver `content` to the groups registered right now.
    ///
    /// Errors only when the group list cannot be read; delivery failures are
    /// reported per group in the returned report.
    pub async fn dispatch(&self, content: &Content) -> Result<DispatchReport, DomainError> {
        let groups = self.store.list_groups().await?;
        if groups.is_empty() {
            info!("no groups registered; nothing to dispatch");
            return Ok(DispatchReport::default());
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let content = Arc::new(content.clone());
        let mut handles = Vec::with_capacity(groups.len());

        for group in groups {
            let sem = Arc::clone(&semaphore);
            let sender = Arc::clone(&self.sender);
            let content = Arc::clone(&content);
            let timeout = self.delivery_timeout;
            let handle = group.handle.clone();

            let task = tokio::spawn(async move {
                let Ok(_permit) = sem.acquire().await else {
                    return DeliveryStatus::Failed("dispatch semaphore closed".into());
                };
                match tokio::time::timeout(timeout, deliver_content(&*sender, &handle, &content))
                    .await
                {
                    Ok(Ok(())) => DeliveryStatus::Delivered,
                    Ok(Err(e)) => DeliveryStatus::Failed(e.to_string()),
                    Err(_) => DeliveryStatus::TimedOut,
                }
            });
            handles.push((group, task));
        }

        let mut report = DispatchReport {
            outcomes: Vec::with_capacity(handles.len()),
        };
        for (group, task) in handles {
            let status = task
                .await
                .unwrap_or_else(|e| DeliveryStatus::Failed(format!("delivery task aborted: {}", e)));
            match &status {
                DeliveryStatus::Delivered => debug!(group = %group.handle, "delivered"),
                DeliveryStatus::Failed(reason) => {
                    warn!(group = %group.handle, label = %group.label, reason = %reason, "delivery failed")
                }
                DeliveryStatus::TimedOut => {
                    warn!(group = %group.handle, label = %group.label, "delivery timed out")
                }
            }
            report.outcomes.push(DeliveryOutcome { group, status });
        }

        info!(
            delivered = report.delivered(),
            failed = report.failed(),
            "dispatch pass complete"
        );
        Ok(report)
    }
}

/// Send one publication to one destination.
///
/// Text only: a single text message. With media: the first item carries the body as
/// caption, the rest follow without caption. A body too long for a caption is sent
/// as its own text message first.
pub async fn deliver_content(
    sender: &dyn MessageSender,
    destination: &str,
    content: &Content,
) -> Result<(), DomainError> {
    let Some((first, rest)) = content.media.split_first() else {
        return sender.send_text(destination, &content.body).await;
    };

    let body = content.body.trim();
    let caption = if body.is_empty() {
        None
    } else if content.body.chars().count() <= CAPTION_LIMIT {
        Some(content.body.as_str())
    } else {
        sender.send_text(destination, &content.body).await?;
        None
    };

    sender
        .send_media(destination, first.kind, &first.file_id, caption)
        .await?;
    for media in rest {
        sender
            .send_media(destination, media.kind, &media.file_id, None)
            .await?;
    }
    Ok(())
}
