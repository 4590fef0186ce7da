//! Server-sent change streams, the stand-in for the document database's
//! real-time listeners. Clients get `{collection, id, kind}` change
//! events and refetch what they care about.

use super::AppState;
use crate::auth::AuthSession;
use crate::models::{collections, Notification};
use crate::store::{ChangeEvent, ChangeKind, Store};
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use std::convert::Infallible;
use tokio::sync::broadcast;

fn change_stream<F>(
    store: &Store,
    keep: F,
) -> impl Stream<Item = Result<Event, Infallible>>
where
    F: FnMut(&ChangeEvent) -> bool + Send + 'static,
{
    let receiver = store.subscribe();
    futures_util::stream::unfold((receiver, keep), |(mut receiver, mut keep)| async move {
        loop {
            match receiver.recv().await {
                Ok(change) => {
                    if !keep(&change) {
                        continue;
                    }
                    match Event::default().event("change").json_data(&change) {
                        Ok(event) => return Some((Ok(event), (receiver, keep))),
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to encode change event");
                            continue;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "live stream fell behind the change feed");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}

pub(crate) async fn feed(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = change_stream(&state.store, |change| {
        change.collection == collections::PRO_POSTS
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub(crate) async fn post_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let collection = collections::post_comments(&id);
    let stream = change_stream(&state.store, move |change| {
        change.collection == collection
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Only forwards changes whose notification document belongs to the
/// session user. Deletions carry no document to check, so they are
/// dropped; notifications are never deleted anyway, only marked read.
pub(crate) async fn notifications(
    State(state): State<AppState>,
    session: AuthSession,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let uid = session.user.uid;
    let store = state.store.clone();
    let stream = change_stream(&state.store, move |change| {
        if change.collection != collections::NOTIFICATIONS {
            return false;
        }
        if change.kind == ChangeKind::Deleted {
            return false;
        }
        match store.get(collections::NOTIFICATIONS, &change.id) {
            Ok(Some(doc)) => doc
                .decode::<Notification>()
                .map(|notification| notification.recipient_id == uid)
                .unwrap_or(false),
            _ => false,
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
