//! Unread counting and the process-wide user state it feeds.

use std::sync::Arc;

use agora_proto::{CommentView, PrivateMessageView, UserMentionView};
use tokio::sync::watch;
use tracing::debug;

/// Unread items across the three inbox collections. Private messages the
/// user sent themselves never count.
pub fn compute_unread(
    replies: &[CommentView],
    mentions: &[UserMentionView],
    messages: &[PrivateMessageView],
    self_id: i32,
) -> usize {
    replies.iter().filter(|r| !r.read).count()
        + mentions.iter().filter(|m| !m.read).count()
        + messages
            .iter()
            .filter(|m| !m.read && m.creator_id != self_id)
            .count()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSnapshot {
    pub id: i32,
    pub name: String,
    pub unread_count: usize,
}

/// One-way fan-out of the signed-in user. Writers publish, any number of
/// readers (a notification badge, the inbox) watch.
#[derive(Debug, Clone)]
pub struct UserState {
    tx: Arc<watch::Sender<Option<UserSnapshot>>>,
}

impl Default for UserState {
    fn default() -> Self {
        Self::new()
    }
}

impl UserState {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn login(&self, id: i32, name: impl Into<String>) {
        self.tx.send_replace(Some(UserSnapshot {
            id,
            name: name.into(),
            unread_count: 0,
        }));
    }

    pub fn logout(&self) {
        self.tx.send_replace(None);
    }

    pub fn current(&self) -> Option<UserSnapshot> {
        self.tx.borrow().clone()
    }

    pub fn self_id(&self) -> Option<i32> {
        self.tx.borrow().as_ref().map(|user| user.id)
    }

    /// Publishes a new unread count. Ignored while nobody is signed in.
    pub fn publish_unread(&self, count: usize) {
        let changed = self.tx.send_if_modified(|user| match user {
            Some(user) if user.unread_count != count => {
                user.unread_count = count;
                true
            }
            _ => false,
        });
        if changed {
            debug!(target = "agora::unread", count, "unread count published");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<UserSnapshot>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{comment, mention, message};

    #[test]
    fn counts_unread_and_skips_own_messages() {
        let me = 7;
        let replies = vec![comment(1, None), comment(2, None)];
        let mut read_mention = mention(3, 10);
        read_mention.read = true;
        let messages = vec![message(20, 1, me), message(21, 2, me), message(22, me, 1)];

        assert_eq!(compute_unread(&replies, &[read_mention], &messages, me), 4);
        assert_eq!(compute_unread(&[], &[], &[], me), 0);
    }

    #[tokio::test]
    async fn unread_count_fans_out_to_watchers() {
        let state = UserState::new();
        let mut badge = state.subscribe();
        state.publish_unread(3);
        assert_eq!(state.current(), None);

        state.login(7, "ann");
        let _ = badge.borrow_and_update();
        state.publish_unread(3);
        badge.changed().await.unwrap();
        assert_eq!(badge.borrow().as_ref().map(|u| u.unread_count), Some(3));

        state.publish_unread(3);
        assert!(!badge.has_changed().unwrap());
        assert_eq!(state.self_id(), Some(7));
    }
}
