//! A single post with its comment tree.

use agora_proto::{
    BanFromCommunityResponse, BanUserResponse, CommentForm, CommentResponse, CommentView,
    CommunityModeratorView, Envelope, GetPostForm, GetPostResponse, PostResponse, PostView,
    ProtocolError, Request, SaveCommentForm, SavePostForm, UserOperation,
};
use tracing::debug;

use super::{Reaction, View, ViewContext, comment_like, expect_payload, patch, post_like};
use crate::comment_tree::{CommentForest, CommentStore};
use crate::sort::{CommentSortType, sort_comments};
use crate::vote::{VoteAction, VoteTracker};

#[derive(Debug, Clone)]
pub struct ThreadView {
    post_id: i32,
    post: Option<PostView>,
    comments: CommentForest,
    comment_sort: CommentSortType,
    moderators: Vec<CommunityModeratorView>,
    online: usize,
    votes: VoteTracker,
}

impl ThreadView {
    pub fn new(post_id: i32) -> Self {
        Self {
            post_id,
            post: None,
            comments: CommentForest::default(),
            comment_sort: CommentSortType::default(),
            moderators: Vec::new(),
            online: 0,
            votes: VoteTracker::new(),
        }
    }

    pub fn post_id(&self) -> i32 {
        self.post_id
    }

    pub fn post(&self) -> Option<&PostView> {
        self.post.as_ref()
    }

    pub fn comments(&self) -> &CommentForest {
        &self.comments
    }

    pub fn comment(&self, id: i32) -> Option<&CommentView> {
        self.comments.find(id).map(|node| &node.record)
    }

    pub fn comment_sort(&self) -> CommentSortType {
        self.comment_sort
    }

    pub fn moderators(&self) -> &[CommunityModeratorView] {
        &self.moderators
    }

    pub fn online(&self) -> usize {
        self.online
    }

    /// Votes cast here that the server has not confirmed yet.
    pub fn votes(&self) -> &VoteTracker {
        &self.votes
    }

    /// Re-sorts the loaded comments locally; collapsed threads stay collapsed.
    pub fn set_comment_sort(&mut self, sort: CommentSortType) {
        self.comment_sort = sort;
        let mut records = self.comments.records();
        sort_comments(&mut records, sort);
        self.comments = self.comments.rebuild_preserving(&records);
    }

    pub fn toggle_collapsed(&mut self, comment_id: i32) -> bool {
        let Some(collapsed) = self.comments.find(comment_id).map(|node| node.collapsed) else {
            return false;
        };
        self.comments.set_collapsed(comment_id, !collapsed)
    }

    pub fn vote_post(&mut self, action: VoteAction) -> Result<Vec<Request>, ProtocolError> {
        let Some(post) = self.post.as_mut() else {
            return Ok(Vec::new());
        };
        let vote = self.votes.cast(post, action);
        Ok(vec![post_like(post.id, vote)?])
    }

    pub fn vote_comment(&mut self, comment_id: i32, action: VoteAction) -> Result<Vec<Request>, ProtocolError> {
        let Some(node) = self.comments.find_mut(comment_id) else {
            return Ok(Vec::new());
        };
        let vote = self.votes.cast(&mut node.record, action);
        Ok(vec![comment_like(comment_id, node.record.post_id, vote)?])
    }

    pub fn create_comment(
        &self,
        content: impl Into<String>,
        parent_id: Option<i32>,
    ) -> Result<Vec<Request>, ProtocolError> {
        let form = CommentForm {
            content: content.into(),
            post_id: self.post_id,
            parent_id,
            ..CommentForm::default()
        };
        Ok(vec![Request::new(UserOperation::CreateComment, &form)?])
    }

    pub fn edit_comment(&self, comment_id: i32, content: impl Into<String>) -> Result<Vec<Request>, ProtocolError> {
        let Some(local) = self.comment(comment_id) else {
            return Ok(Vec::new());
        };
        let form = CommentForm {
            content: content.into(),
            post_id: local.post_id,
            parent_id: local.parent_id,
            edit_id: Some(local.id),
            creator_id: Some(local.creator_id),
            ..CommentForm::default()
        };
        Ok(vec![Request::new(UserOperation::EditComment, &form)?])
    }

    pub fn save_comment(&self, comment_id: i32, save: bool) -> Result<Vec<Request>, ProtocolError> {
        Ok(vec![Request::new(
            UserOperation::SaveComment,
            &SaveCommentForm { comment_id, save },
        )?])
    }

    pub fn save_post(&self, save: bool) -> Result<Vec<Request>, ProtocolError> {
        Ok(vec![Request::new(
            UserOperation::SavePost,
            &SavePostForm {
                post_id: self.post_id,
                save,
            },
        )?])
    }

    fn load(&mut self, data: GetPostResponse) {
        self.votes.clear();
        self.post = Some(data.post);
        self.moderators = data.moderators;
        self.online = data.online;
        let mut records = data.comments;
        sort_comments(&mut records, self.comment_sort);
        self.comments = self.comments.rebuild_preserving(&records);
    }

    fn ban_from_community(&mut self, user_id: i32, banned: bool) {
        self.comments.for_each_mut(|record| {
            if record.creator_id == user_id {
                record.banned_from_community = banned;
            }
        });
        if let Some(post) = self.post.as_mut().filter(|p| p.creator_id == user_id) {
            post.banned_from_community = banned;
        }
    }

    fn ban_site_wide(&mut self, user_id: i32, banned: bool) {
        self.comments.for_each_mut(|record| {
            if record.creator_id == user_id {
                record.banned = banned;
            }
        });
        patch::ban_posts(self.post.as_mut(), user_id, banned);
    }
}

impl View for ThreadView {
    fn name(&self) -> &'static str {
        "thread"
    }

    fn handles(&self, op: UserOperation) -> bool {
        matches!(
            op,
            UserOperation::GetPost
                | UserOperation::CreateComment
                | UserOperation::EditComment
                | UserOperation::SaveComment
                | UserOperation::CreateCommentLike
                | UserOperation::CreatePostLike
                | UserOperation::EditPost
                | UserOperation::SavePost
                | UserOperation::BanFromCommunity
                | UserOperation::BanUser
        )
    }

    fn replay_requests(&self, _cx: &ViewContext) -> Result<Vec<Request>, ProtocolError> {
        Ok(vec![Request::new(
            UserOperation::GetPost,
            &GetPostForm { id: self.post_id },
        )?])
    }

    fn on_envelope(&mut self, envelope: &Envelope, _cx: &ViewContext) -> Result<Reaction, ProtocolError> {
        let Some(op) = envelope.op else {
            return Ok(Reaction::none());
        };
        match op {
            UserOperation::GetPost => {
                let data: GetPostResponse = expect_payload(envelope)?;
                if data.post.id != self.post_id {
                    debug!(
                        target = "agora::views",
                        view = "thread",
                        expected = self.post_id,
                        got = data.post.id,
                        "ignoring another post's data"
                    );
                    return Ok(Reaction::none());
                }
                self.load(data);
            }
            UserOperation::CreateComment => {
                let data: CommentResponse = expect_payload(envelope)?;
                if data.comment.post_id != self.post_id {
                    return Ok(Reaction::none());
                }
                let is_new = self.comments.find(data.comment.id).is_none();
                self.comments.insert(data.comment);
                if let Some(post) = self.post.as_mut().filter(|_| is_new) {
                    post.number_of_comments += 1;
                }
            }
            UserOperation::EditComment => {
                let data: CommentResponse = expect_payload(envelope)?;
                self.comments
                    .patch_comment(data.comment.id, |local| patch::edit_comment(local, &data.comment));
            }
            UserOperation::SaveComment => {
                let data: CommentResponse = expect_payload(envelope)?;
                self.comments
                    .patch_comment(data.comment.id, |local| patch::save_comment(local, &data.comment));
            }
            UserOperation::CreateCommentLike => {
                let data: CommentResponse = expect_payload(envelope)?;
                if let Some(node) = self.comments.find_mut(data.comment.id) {
                    self.votes.reconcile(&mut node.record, &data.comment);
                }
            }
            UserOperation::CreatePostLike => {
                let data: PostResponse = expect_payload(envelope)?;
                if let Some(post) = self.post.as_mut().filter(|p| p.id == data.post.id) {
                    self.votes.reconcile(post, &data.post);
                }
            }
            UserOperation::EditPost => {
                let data: PostResponse = expect_payload(envelope)?;
                if let Some(post) = self.post.as_mut().filter(|p| p.id == data.post.id) {
                    patch::edit_post(post, &data.post);
                }
            }
            UserOperation::SavePost => {
                let data: PostResponse = expect_payload(envelope)?;
                if let Some(post) = self.post.as_mut().filter(|p| p.id == data.post.id) {
                    post.saved = data.post.saved;
                }
            }
            UserOperation::BanFromCommunity => {
                let data: BanFromCommunityResponse = expect_payload(envelope)?;
                self.ban_from_community(data.user.id, data.banned);
            }
            UserOperation::BanUser => {
                let data: BanUserResponse = expect_payload(envelope)?;
                self.ban_site_wide(data.user.id, data.banned);
            }
            _ => return Ok(Reaction::none()),
        }
        Ok(Reaction::none())
    }

    fn summary(&self) -> String {
        match &self.post {
            Some(post) => format!(
                "post {} \"{}\": score {}, {} comments loaded, {} online",
                post.id,
                post.name,
                post.score,
                self.comments.len(),
                self.online
            ),
            None => format!("post {}: loading", self.post_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{at, comment, post, user};
    use crate::vote::VoteTarget;

    fn loaded(comments: Vec<CommentView>) -> ThreadView {
        let mut view = ThreadView::new(9);
        let envelope = Envelope::success(
            UserOperation::GetPost,
            &GetPostResponse {
                post: post(9),
                comments,
                moderators: Vec::new(),
                admins: Vec::new(),
                online: 3,
            },
        )
        .unwrap();
        view.on_envelope(&envelope, &ViewContext::default()).unwrap();
        view
    }

    fn feed(view: &mut ThreadView, op: UserOperation, comment: CommentView) {
        let envelope = Envelope::success(
            op,
            &CommentResponse {
                comment,
                recipient_ids: Vec::new(),
            },
        )
        .unwrap();
        view.on_envelope(&envelope, &ViewContext::default()).unwrap();
    }

    fn root_ids(view: &ThreadView) -> Vec<i32> {
        view.comments().roots().map(|n| n.record.id).collect()
    }

    #[test]
    fn replays_get_post_for_its_id() {
        let requests = ThreadView::new(9).replay_requests(&ViewContext::default()).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].op(), UserOperation::GetPost);
        assert_eq!(requests[0].data()["id"], 9);
    }

    #[test]
    fn ignores_another_posts_response() {
        let mut view = ThreadView::new(1);
        let envelope = Envelope::success(
            UserOperation::GetPost,
            &GetPostResponse {
                post: post(9),
                comments: vec![comment(1, None)],
                moderators: Vec::new(),
                admins: Vec::new(),
                online: 0,
            },
        )
        .unwrap();
        view.on_envelope(&envelope, &ViewContext::default()).unwrap();
        assert!(view.post().is_none());
        assert!(view.comments().is_empty());
    }

    #[test]
    fn new_comment_is_inserted_under_its_parent() {
        let mut view = loaded(vec![comment(1, None), comment(2, Some(1))]);
        feed(&mut view, UserOperation::CreateComment, comment(5, Some(1)));
        let parent = view.comments().find(1).unwrap();
        let newest = view.comments().children(parent).next().unwrap();
        assert_eq!(newest.record.id, 5);
        assert_eq!(view.post().unwrap().number_of_comments, 1);

        let mut elsewhere = comment(6, None);
        elsewhere.post_id = 77;
        feed(&mut view, UserOperation::CreateComment, elsewhere);
        assert!(view.comment(6).is_none());
    }

    #[test]
    fn edit_keeps_collapsed_state() {
        let mut view = loaded(vec![comment(1, None), comment(2, Some(1))]);
        assert!(view.toggle_collapsed(1));
        let mut edited = comment(1, None);
        edited.content = "edited".into();
        feed(&mut view, UserOperation::EditComment, edited);
        let node = view.comments().find(1).unwrap();
        assert!(node.collapsed);
        assert_eq!(node.record.content, "edited");
    }

    #[test]
    fn resorting_keeps_collapsed_threads() {
        let mut old = comment(1, None);
        old.published = at(1);
        let mut new = comment(2, None);
        new.published = at(50);
        let mut view = loaded(vec![old, new, comment(3, Some(1))]);
        view.toggle_collapsed(1);

        view.set_comment_sort(CommentSortType::New);
        assert_eq!(root_ids(&view), vec![2, 1]);
        view.set_comment_sort(CommentSortType::Old);
        assert_eq!(root_ids(&view), vec![1, 2]);
        assert!(view.comments().find(1).unwrap().collapsed);
        assert_eq!(view.comments().find(3).unwrap().depth, 1);
    }

    #[test]
    fn comment_vote_is_optimistic_then_confirmed() {
        let mut start = comment(1, None);
        start.upvotes = 5;
        start.score = 5;
        start.my_vote = Some(0);
        let mut view = loaded(vec![start.clone()]);

        let requests = view.vote_comment(1, VoteAction::Upvote).unwrap();
        assert_eq!(requests[0].op(), UserOperation::CreateCommentLike);
        assert_eq!(requests[0].data()["score"], 1);
        assert_eq!(view.comment(1).unwrap().score, 6);

        let mut confirmed = start;
        confirmed.upvotes = 7;
        confirmed.score = 7;
        confirmed.my_vote = Some(1);
        feed(&mut view, UserOperation::CreateCommentLike, confirmed);
        let local = view.comment(1).unwrap();
        assert_eq!((local.score, local.upvotes, local.my_vote), (7, 7, Some(1)));
    }

    #[test]
    fn reload_forgets_unconfirmed_votes() {
        let mut start = comment(1, None);
        start.my_vote = Some(0);
        let mut view = loaded(vec![start.clone()]);

        // Never confirmed: the frame was lost with the link.
        view.vote_comment(1, VoteAction::Upvote).unwrap();
        assert_eq!(view.votes().in_flight(VoteTarget::Comment(1)), 1);

        let envelope = Envelope::success(
            UserOperation::GetPost,
            &GetPostResponse {
                post: post(9),
                comments: vec![start.clone()],
                moderators: Vec::new(),
                admins: Vec::new(),
                online: 3,
            },
        )
        .unwrap();
        view.on_envelope(&envelope, &ViewContext::default()).unwrap();
        assert_eq!(view.votes().in_flight(VoteTarget::Comment(1)), 0);

        view.vote_comment(1, VoteAction::Downvote).unwrap();
        assert_eq!(view.comment(1).unwrap().my_vote, Some(-1));

        // The server settled on an upvote cast elsewhere; its answer wins.
        let mut confirmed = start;
        confirmed.upvotes = 1;
        confirmed.score = 1;
        confirmed.my_vote = Some(1);
        feed(&mut view, UserOperation::CreateCommentLike, confirmed);
        let local = view.comment(1).unwrap();
        assert_eq!((local.score, local.my_vote), (1, Some(1)));
        assert_eq!(view.votes().in_flight(VoteTarget::Comment(1)), 0);
    }

    #[test]
    fn ban_from_community_flags_the_creators_records() {
        let mut banned = comment(2, None);
        banned.creator_id = 42;
        let mut view = loaded(vec![comment(1, None), banned]);
        let envelope = Envelope::success(
            UserOperation::BanFromCommunity,
            &BanFromCommunityResponse {
                user: user(42, "troll"),
                banned: true,
            },
        )
        .unwrap();
        view.on_envelope(&envelope, &ViewContext::default()).unwrap();
        assert!(view.comment(2).unwrap().banned_from_community);
        assert!(!view.comment(1).unwrap().banned_from_community);
    }
}
