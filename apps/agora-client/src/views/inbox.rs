//! Replies, mentions and private messages addressed to the signed-in user.

use agora_proto::{
    CommentForm, CommentResponse, CommentView, EditPrivateMessageForm, EditUserMentionForm,
    Envelope, GetPrivateMessagesForm, GetRepliesForm, GetRepliesResponse, GetUserMentionsForm,
    GetUserMentionsResponse, MarkAllAsReadForm, PrivateMessageResponse, PrivateMessageView,
    PrivateMessagesResponse, ProtocolError, Request, SaveCommentForm, SortType,
    UserMentionResponse, UserMentionView, UserOperation,
};
use tracing::debug;

use super::{
    FETCH_LIMIT, Reaction, View, ViewContext, comment_like, expect_payload, patch, step_page,
};
use crate::unread::compute_unread;
use crate::vote::{VoteAction, VoteTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnreadOrAll {
    #[default]
    Unread,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageType {
    #[default]
    All,
    Replies,
    Mentions,
    Messages,
}

#[derive(Debug, Clone)]
pub struct InboxView {
    unread_or_all: UnreadOrAll,
    message_type: MessageType,
    sort: SortType,
    page: i64,
    replies: Vec<CommentView>,
    mentions: Vec<UserMentionView>,
    messages: Vec<PrivateMessageView>,
    votes: VoteTracker,
}

impl Default for InboxView {
    fn default() -> Self {
        Self::new()
    }
}

impl InboxView {
    pub fn new() -> Self {
        Self {
            unread_or_all: UnreadOrAll::Unread,
            message_type: MessageType::All,
            sort: SortType::New,
            page: 1,
            replies: Vec::new(),
            mentions: Vec::new(),
            messages: Vec::new(),
            votes: VoteTracker::new(),
        }
    }

    pub fn replies(&self) -> &[CommentView] {
        &self.replies
    }

    pub fn mentions(&self) -> &[UserMentionView] {
        &self.mentions
    }

    pub fn messages(&self) -> &[PrivateMessageView] {
        &self.messages
    }

    pub fn unread_or_all(&self) -> UnreadOrAll {
        self.unread_or_all
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn sort(&self) -> SortType {
        self.sort
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn unread_count(&self, self_id: i32) -> usize {
        compute_unread(&self.replies, &self.mentions, &self.messages, self_id)
    }

    pub fn set_unread_or_all(&mut self, unread_or_all: UnreadOrAll) -> Result<Vec<Request>, ProtocolError> {
        self.unread_or_all = unread_or_all;
        self.page = 1;
        self.queries()
    }

    /// Only changes which collection is shown; nothing is refetched.
    pub fn set_message_type(&mut self, message_type: MessageType) {
        self.message_type = message_type;
    }

    pub fn set_sort(&mut self, sort: SortType) -> Result<Vec<Request>, ProtocolError> {
        self.sort = sort;
        self.page = 1;
        self.queries()
    }

    pub fn next_page(&mut self) -> Result<Vec<Request>, ProtocolError> {
        self.page = step_page(self.page, 1);
        self.queries()
    }

    pub fn prev_page(&mut self) -> Result<Vec<Request>, ProtocolError> {
        self.page = step_page(self.page, -1);
        self.queries()
    }

    pub fn mark_all_as_read(&self) -> Result<Vec<Request>, ProtocolError> {
        Ok(vec![Request::new(
            UserOperation::MarkAllAsRead,
            &MarkAllAsReadForm {},
        )?])
    }

    pub fn mark_reply_read(&self, comment_id: i32, read: bool) -> Result<Vec<Request>, ProtocolError> {
        let Some(reply) = self.replies.iter().find(|r| r.id == comment_id) else {
            return Ok(Vec::new());
        };
        let form = CommentForm {
            content: reply.content.clone(),
            post_id: reply.post_id,
            parent_id: reply.parent_id,
            edit_id: Some(reply.id),
            creator_id: Some(reply.creator_id),
            read: Some(read),
            ..CommentForm::default()
        };
        Ok(vec![Request::new(UserOperation::EditComment, &form)?])
    }

    pub fn mark_mention_read(&self, comment_id: i32, read: bool) -> Result<Vec<Request>, ProtocolError> {
        let Some(mention) = self.mentions.iter().find(|m| m.id == comment_id) else {
            return Ok(Vec::new());
        };
        let form = EditUserMentionForm {
            user_mention_id: mention.user_mention_id,
            read: Some(read),
        };
        Ok(vec![Request::new(UserOperation::EditUserMention, &form)?])
    }

    pub fn mark_message_read(&self, message_id: i32, read: bool) -> Result<Vec<Request>, ProtocolError> {
        let form = EditPrivateMessageForm {
            edit_id: message_id,
            content: None,
            deleted: None,
            read: Some(read),
        };
        Ok(vec![Request::new(UserOperation::EditPrivateMessage, &form)?])
    }

    pub fn save_reply(&self, comment_id: i32, save: bool) -> Result<Vec<Request>, ProtocolError> {
        Ok(vec![Request::new(
            UserOperation::SaveComment,
            &SaveCommentForm { comment_id, save },
        )?])
    }

    pub fn vote_reply(&mut self, comment_id: i32, action: VoteAction) -> Result<Vec<Request>, ProtocolError> {
        let Some(reply) = self.replies.iter_mut().find(|r| r.id == comment_id) else {
            return Ok(Vec::new());
        };
        let vote = self.votes.cast(reply, action);
        Ok(vec![comment_like(reply.id, reply.post_id, vote)?])
    }

    fn unread_only(&self) -> bool {
        self.unread_or_all == UnreadOrAll::Unread
    }

    fn queries(&self) -> Result<Vec<Request>, ProtocolError> {
        let unread_only = self.unread_only();
        Ok(vec![
            Request::new(
                UserOperation::GetReplies,
                &GetRepliesForm {
                    sort: self.sort,
                    page: Some(self.page),
                    limit: Some(FETCH_LIMIT),
                    unread_only,
                },
            )?,
            Request::new(
                UserOperation::GetUserMentions,
                &GetUserMentionsForm {
                    sort: self.sort,
                    page: Some(self.page),
                    limit: Some(FETCH_LIMIT),
                    unread_only,
                },
            )?,
            Request::new(
                UserOperation::GetPrivateMessages,
                &GetPrivateMessagesForm {
                    unread_only,
                    page: Some(self.page),
                    limit: Some(FETCH_LIMIT),
                },
            )?,
        ])
    }

    fn publish_unread(&self, cx: &ViewContext) {
        if let Some(self_id) = cx.self_id() {
            cx.user.publish_unread(self.unread_count(self_id));
        }
    }

    fn apply_private_message_edit(&mut self, edited: PrivateMessageView) {
        let Some(pos) = self.messages.iter().position(|m| m.id == edited.id) else {
            return;
        };
        if self.unread_only() && edited.read {
            self.messages.remove(pos);
            return;
        }
        let local = &mut self.messages[pos];
        local.content = edited.content;
        local.updated = edited.updated;
        local.deleted = edited.deleted;
        local.read = edited.read;
    }

    fn apply_reply_edit(&mut self, edited: &CommentView) {
        let Some(pos) = self.replies.iter().position(|r| r.id == edited.id) else {
            return;
        };
        if self.unread_only() && edited.read {
            self.replies.remove(pos);
            return;
        }
        let local = &mut self.replies[pos];
        patch::edit_comment(local, edited);
        local.read = edited.read;
    }

    fn apply_mention_edit(&mut self, edited: &UserMentionView) {
        let Some(pos) = self.mentions.iter().position(|m| m.id == edited.id) else {
            return;
        };
        if self.unread_only() && edited.read {
            self.mentions.remove(pos);
            return;
        }
        let local = &mut self.mentions[pos];
        patch::edit_mention(local, edited);
        local.read = edited.read;
    }
}

impl View for InboxView {
    fn name(&self) -> &'static str {
        "inbox"
    }

    fn handles(&self, op: UserOperation) -> bool {
        matches!(
            op,
            UserOperation::GetReplies
                | UserOperation::GetUserMentions
                | UserOperation::GetPrivateMessages
                | UserOperation::MarkAllAsRead
                | UserOperation::EditComment
                | UserOperation::EditUserMention
                | UserOperation::EditPrivateMessage
                | UserOperation::CreateComment
                | UserOperation::CreatePrivateMessage
                | UserOperation::SaveComment
                | UserOperation::CreateCommentLike
        )
    }

    fn replay_requests(&self, _cx: &ViewContext) -> Result<Vec<Request>, ProtocolError> {
        self.queries()
    }

    fn on_envelope(&mut self, envelope: &Envelope, cx: &ViewContext) -> Result<Reaction, ProtocolError> {
        let Some(op) = envelope.op else {
            return Ok(Reaction::none());
        };
        let mut reaction = Reaction::none();
        match op {
            UserOperation::GetReplies => {
                let data: GetRepliesResponse = expect_payload(envelope)?;
                self.votes.clear();
                self.replies = data.replies;
            }
            UserOperation::GetUserMentions => {
                let data: GetUserMentionsResponse = expect_payload(envelope)?;
                self.mentions = data.mentions;
            }
            UserOperation::GetPrivateMessages => {
                let data: PrivateMessagesResponse = expect_payload(envelope)?;
                self.messages = data.messages;
            }
            UserOperation::MarkAllAsRead => {
                self.replies.clear();
                self.mentions.clear();
                self.messages.clear();
            }
            UserOperation::EditPrivateMessage => {
                let data: PrivateMessageResponse = expect_payload(envelope)?;
                self.apply_private_message_edit(data.message);
            }
            UserOperation::EditComment => {
                let data: CommentResponse = expect_payload(envelope)?;
                self.apply_reply_edit(&data.comment);
            }
            UserOperation::EditUserMention => {
                let data: UserMentionResponse = expect_payload(envelope)?;
                self.apply_mention_edit(&data.mention);
            }
            UserOperation::CreateComment => {
                let data: CommentResponse = expect_payload(envelope)?;
                let Some(self_id) = cx.self_id() else {
                    return Ok(reaction);
                };
                if data.recipient_ids.contains(&self_id) {
                    self.replies.insert(0, data.comment);
                } else if data.comment.creator_id == self_id {
                    reaction = Reaction::toast("reply_sent");
                }
            }
            UserOperation::CreatePrivateMessage => {
                let data: PrivateMessageResponse = expect_payload(envelope)?;
                if cx.self_id() == Some(data.message.recipient_id) {
                    self.messages.insert(0, data.message);
                }
            }
            UserOperation::SaveComment => {
                let data: CommentResponse = expect_payload(envelope)?;
                if let Some(local) = self.replies.iter_mut().find(|r| r.id == data.comment.id) {
                    patch::save_comment(local, &data.comment);
                }
            }
            UserOperation::CreateCommentLike => {
                let data: CommentResponse = expect_payload(envelope)?;
                if let Some(local) = self.replies.iter_mut().find(|r| r.id == data.comment.id) {
                    self.votes.reconcile(local, &data.comment);
                }
            }
            _ => return Ok(reaction),
        }
        debug!(
            target = "agora::views",
            view = "inbox",
            %op,
            replies = self.replies.len(),
            mentions = self.mentions.len(),
            messages = self.messages.len(),
            "inbox updated"
        );
        self.publish_unread(cx);
        Ok(reaction)
    }

    fn summary(&self) -> String {
        format!(
            "inbox page {}: {} replies, {} mentions, {} messages",
            self.page,
            self.replies.len(),
            self.mentions.len(),
            self.messages.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{comment, mention, message};
    use crate::unread::UserState;

    fn signed_in(id: i32) -> ViewContext {
        let user = UserState::new();
        user.login(id, "ann");
        ViewContext::new(user, Some("token".into()))
    }

    fn feed(view: &mut InboxView, cx: &ViewContext, envelope: Envelope) -> Reaction {
        view.on_envelope(&envelope, cx).unwrap()
    }

    fn loaded(cx: &ViewContext) -> InboxView {
        let me = cx.self_id().unwrap();
        let mut view = InboxView::new();
        feed(
            &mut view,
            cx,
            Envelope::success(
                UserOperation::GetReplies,
                &GetRepliesResponse { replies: vec![comment(1, None), comment(2, None)] },
            )
            .unwrap(),
        );
        let mut read = mention(3, 30);
        read.read = true;
        feed(
            &mut view,
            cx,
            Envelope::success(
                UserOperation::GetUserMentions,
                &GetUserMentionsResponse { mentions: vec![read] },
            )
            .unwrap(),
        );
        feed(
            &mut view,
            cx,
            Envelope::success(
                UserOperation::GetPrivateMessages,
                &PrivateMessagesResponse {
                    messages: vec![message(20, 1, me), message(21, 2, me), message(22, me, 1)],
                },
            )
            .unwrap(),
        );
        view
    }

    #[test]
    fn replay_queries_unread_only_on_the_current_page() {
        let view = InboxView::new();
        let requests = view.replay_requests(&ViewContext::default()).unwrap();
        let ops: Vec<_> = requests.iter().map(|r| r.op()).collect();
        assert_eq!(
            ops,
            vec![
                UserOperation::GetReplies,
                UserOperation::GetUserMentions,
                UserOperation::GetPrivateMessages
            ]
        );
        assert_eq!(requests[0].data()["unread_only"], true);
        assert_eq!(requests[0].data()["page"], 1);
    }

    #[test]
    fn loads_publish_the_unread_count_and_mark_all_clears_it() {
        let cx = signed_in(7);
        let mut badge = cx.user.subscribe();
        let mut view = loaded(&cx);
        assert_eq!(view.unread_count(7), 4);
        assert_eq!(badge.borrow_and_update().as_ref().map(|u| u.unread_count), Some(4));

        feed(
            &mut view,
            &cx,
            Envelope::success(UserOperation::MarkAllAsRead, &GetRepliesResponse { replies: vec![] })
                .unwrap(),
        );
        assert!(view.replies().is_empty());
        assert!(view.mentions().is_empty());
        assert!(view.messages().is_empty());
        assert_eq!(cx.user.current().map(|u| u.unread_count), Some(0));
    }

    #[test]
    fn reading_a_reply_removes_it_from_the_unread_view() {
        let cx = signed_in(7);
        let mut view = loaded(&cx);
        let mut edited = comment(1, None);
        edited.read = true;
        feed(
            &mut view,
            &cx,
            Envelope::success(
                UserOperation::EditComment,
                &CommentResponse { comment: edited.clone(), recipient_ids: vec![] },
            )
            .unwrap(),
        );
        assert_eq!(view.replies().iter().map(|r| r.id).collect::<Vec<_>>(), vec![2]);
        assert_eq!(cx.user.current().map(|u| u.unread_count), Some(3));

        let mut all = loaded(&cx);
        all.set_unread_or_all(UnreadOrAll::All).unwrap();
        feed(
            &mut all,
            &cx,
            Envelope::success(
                UserOperation::EditComment,
                &CommentResponse { comment: edited, recipient_ids: vec![] },
            )
            .unwrap(),
        );
        assert_eq!(all.replies().len(), 2);
        assert!(all.replies()[0].read);
    }

    #[test]
    fn new_reply_to_me_is_prepended_and_my_own_reply_toasts() {
        let cx = signed_in(7);
        let mut view = loaded(&cx);
        let reaction = feed(
            &mut view,
            &cx,
            Envelope::success(
                UserOperation::CreateComment,
                &CommentResponse { comment: comment(9, Some(1)), recipient_ids: vec![7] },
            )
            .unwrap(),
        );
        assert_eq!(view.replies()[0].id, 9);
        assert_eq!(reaction, Reaction::none());
        assert_eq!(cx.user.current().map(|u| u.unread_count), Some(5));

        let mut mine = comment(10, Some(1));
        mine.creator_id = 7;
        let reaction = feed(
            &mut view,
            &cx,
            Envelope::success(
                UserOperation::CreateComment,
                &CommentResponse { comment: mine, recipient_ids: vec![3] },
            )
            .unwrap(),
        );
        assert_eq!(reaction, Reaction::toast("reply_sent"));
        assert_eq!(view.replies().len(), 3);
    }

    #[test]
    fn incoming_private_message_is_prepended() {
        let cx = signed_in(7);
        let mut view = loaded(&cx);
        feed(
            &mut view,
            &cx,
            Envelope::success(
                UserOperation::CreatePrivateMessage,
                &PrivateMessageResponse { message: message(30, 4, 7) },
            )
            .unwrap(),
        );
        feed(
            &mut view,
            &cx,
            Envelope::success(
                UserOperation::CreatePrivateMessage,
                &PrivateMessageResponse { message: message(31, 4, 8) },
            )
            .unwrap(),
        );
        assert_eq!(view.messages()[0].id, 30);
        assert_eq!(view.messages().len(), 4);
    }

    #[test]
    fn mark_mention_read_uses_the_mention_row_id() {
        let cx = signed_in(7);
        let view = loaded(&cx);
        let requests = view.mark_mention_read(3, true).unwrap();
        assert_eq!(requests[0].op(), UserOperation::EditUserMention);
        assert_eq!(requests[0].data()["user_mention_id"], 30);
        assert!(view.mark_mention_read(404, true).unwrap().is_empty());
    }

    #[test]
    fn paging_never_goes_below_one() {
        let mut view = InboxView::new();
        let requests = view.prev_page().unwrap();
        assert_eq!(view.page(), 1);
        assert_eq!(requests[2].data()["page"], 1);
        view.next_page().unwrap();
        assert_eq!(view.page(), 2);
    }
}
