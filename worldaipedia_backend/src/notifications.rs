//! Notification documents, the per-event writes, and the follower
//! fan-out worker for new publications.
//!
//! Engagement events (like/comment/reply/follow/save) are single
//! notification writes done inline by the social layer. New-publication
//! fan-out is different: it scales with the author's follower count, so
//! publishing only enqueues a job and a worker task writes the
//! notifications in bounded chunks off the request path.

use crate::models::{collections, Notification, NotificationKind, User};
use crate::store::{Direction, Query, Store, WriteBatch};
use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Notifications written per batch during follower fan-out.
pub const FANOUT_CHUNK: usize = 100;

const SNIPPET_CHARS: usize = 80;

/// Who did the thing: denormalized onto every notification so the list
/// renders without extra lookups.
#[derive(Debug, Clone)]
pub struct Actor {
    pub uid: String,
    pub name: String,
    pub avatar: Option<String>,
}

impl Actor {
    pub fn from_user(user: &User) -> Self {
        Self {
            uid: user.uid.clone(),
            name: user.username.clone(),
            avatar: user.photo_url.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FanoutJob {
    pub publication_id: String,
    pub author: Actor,
    pub snippet: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkReadOutcome {
    Marked,
    NotFound,
    Denied,
}

/// Cheap handle publishers hold; dropping a job on a dead worker is
/// logged, never an error on the publish path.
#[derive(Clone)]
pub struct NotificationQueue {
    sender: mpsc::UnboundedSender<FanoutJob>,
}

impl NotificationQueue {
    pub fn enqueue(&self, job: FanoutJob) {
        if self.sender.send(job).is_err() {
            tracing::warn!("fan-out worker is gone, dropping notification job");
        }
    }
}

/// Starts the fan-out worker on the current runtime and returns the
/// queue handle to publish into it.
pub fn spawn_fanout_worker(store: Store) -> NotificationQueue {
    let (sender, mut receiver) = mpsc::unbounded_channel::<FanoutJob>();
    tokio::spawn(async move {
        while let Some(job) = receiver.recv().await {
            run_fanout(&store, &job);
        }
        tracing::debug!("fan-out queue closed, worker exiting");
    });
    NotificationQueue { sender }
}

/// Writes one `new_post` notification per follower, in chunks, and
/// returns how many were written. A failed chunk is logged and skipped;
/// the remaining chunks still run.
pub fn run_fanout(store: &Store, job: &FanoutJob) -> usize {
    let followers = match load_followers(store, &job.author.uid) {
        Ok(followers) => followers,
        Err(err) => {
            tracing::warn!(
                author = %job.author.uid,
                error = %err,
                "fan-out could not load followers"
            );
            return 0;
        }
    };
    let mut delivered = 0usize;
    for chunk in followers.chunks(FANOUT_CHUNK) {
        let mut batch = WriteBatch::new();
        let mut recipients = 0usize;
        for follower in chunk {
            if follower == &job.author.uid {
                continue;
            }
            let notification = build_notification(
                follower,
                &job.author,
                NotificationKind::NewPost,
                Some(&job.publication_id),
                Some(&job.snippet),
            );
            match serde_json::to_value(&notification) {
                Ok(body) => {
                    batch.set(collections::NOTIFICATIONS, &notification.id, body);
                    recipients += 1;
                }
                Err(err) => {
                    tracing::warn!(recipient = %follower, error = %err, "fan-out skipped a recipient");
                }
            }
        }
        match store.commit(batch) {
            Ok(_) => delivered += recipients,
            Err(err) => {
                tracing::warn!(
                    author = %job.author.uid,
                    chunk = chunk.len(),
                    error = %err,
                    "fan-out chunk failed, continuing with the rest"
                );
            }
        }
    }
    tracing::info!(
        author = %job.author.uid,
        followers = followers.len(),
        delivered,
        publication = %job.publication_id,
        "publication fan-out finished"
    );
    delivered
}

fn load_followers(store: &Store, uid: &str) -> Result<Vec<String>> {
    let doc = store
        .get(collections::USERS, uid)?
        .context("author profile missing")?;
    let user: User = doc.decode()?;
    Ok(user.followers)
}

fn build_notification(
    recipient_id: &str,
    actor: &Actor,
    kind: NotificationKind,
    post_id: Option<&str>,
    snippet: Option<&str>,
) -> Notification {
    Notification {
        id: Uuid::new_v4().to_string(),
        recipient_id: recipient_id.to_string(),
        actor_id: actor.uid.clone(),
        actor_name: actor.name.clone(),
        actor_avatar: actor.avatar.clone(),
        kind,
        post_id: post_id.map(str::to_string),
        snippet: snippet.map(str::to_string),
        read: false,
        created_at: Utc::now(),
    }
}

/// Truncates publication/comment text for the notification list.
pub fn snippet_of(text: &str) -> String {
    let mut snippet: String = text.chars().take(SNIPPET_CHARS).collect();
    if text.chars().count() > SNIPPET_CHARS {
        snippet.push('…');
    }
    snippet
}

#[derive(Clone)]
pub struct NotificationService {
    store: Store,
}

impl NotificationService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Writes one engagement notification. Self-notification is skipped
    /// and reports `None`.
    pub fn notify(
        &self,
        recipient_id: &str,
        actor: &Actor,
        kind: NotificationKind,
        post_id: Option<&str>,
        snippet: Option<&str>,
    ) -> Result<Option<Notification>> {
        if recipient_id == actor.uid {
            return Ok(None);
        }
        let notification = build_notification(recipient_id, actor, kind, post_id, snippet);
        self.store.set(
            collections::NOTIFICATIONS,
            &notification.id,
            serde_json::to_value(&notification)?,
        )?;
        Ok(Some(notification))
    }

    pub fn list_for(&self, uid: &str) -> Result<Vec<Notification>> {
        let query = Query::collection(collections::NOTIFICATIONS)
            .filter("recipientId", uid)
            .order_by("createdAt", Direction::Descending);
        let mut notifications = Vec::new();
        for doc in self.store.query(query)? {
            notifications.push(doc.decode::<Notification>()?);
        }
        Ok(notifications)
    }

    pub fn unread_count(&self, uid: &str) -> Result<usize> {
        let query = Query::collection(collections::NOTIFICATIONS)
            .filter("recipientId", uid)
            .filter("read", false);
        Ok(self.store.query(query)?.len())
    }

    pub fn mark_read(&self, notification_id: &str, requester_uid: &str) -> Result<MarkReadOutcome> {
        let Some(doc) = self.store.get(collections::NOTIFICATIONS, notification_id)? else {
            return Ok(MarkReadOutcome::NotFound);
        };
        let notification: Notification = doc.decode()?;
        if notification.recipient_id != requester_uid {
            return Ok(MarkReadOutcome::Denied);
        }
        self.store.update(
            collections::NOTIFICATIONS,
            notification_id,
            serde_json::json!({ "read": true }),
        )?;
        Ok(MarkReadOutcome::Marked)
    }
}
