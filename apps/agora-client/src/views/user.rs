//! A user's profile: their posts, comments and community memberships.

use agora_proto::{
    BanUserResponse, CommentResponse, CommentView, CommunityFollowerView, CommunityModeratorView,
    Envelope, GetUserDetailsForm, GetUserDetailsResponse, PostResponse, PostView, ProtocolError,
    Request, SortType, UserOperation, UserView,
};
use tracing::debug;

use super::{
    FETCH_LIMIT, Reaction, View, ViewContext, comment_like, expect_payload, patch, post_like,
    step_page,
};
use crate::comment_tree::CommentStore;
use crate::vote::{VoteAction, VoteTracker};

#[derive(Debug, Clone)]
pub struct UserDetailsView {
    username: String,
    sort: SortType,
    page: i64,
    saved_only: bool,
    user: Option<UserView>,
    follows: Vec<CommunityFollowerView>,
    moderates: Vec<CommunityModeratorView>,
    comments: Vec<CommentView>,
    posts: Vec<PostView>,
    votes: VoteTracker,
}

impl UserDetailsView {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            sort: SortType::New,
            page: 1,
            saved_only: false,
            user: None,
            follows: Vec::new(),
            moderates: Vec::new(),
            comments: Vec::new(),
            posts: Vec::new(),
            votes: VoteTracker::new(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn user(&self) -> Option<&UserView> {
        self.user.as_ref()
    }

    pub fn follows(&self) -> &[CommunityFollowerView] {
        &self.follows
    }

    pub fn moderates(&self) -> &[CommunityModeratorView] {
        &self.moderates
    }

    pub fn comments(&self) -> &[CommentView] {
        &self.comments
    }

    pub fn posts(&self) -> &[PostView] {
        &self.posts
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn set_sort(&mut self, sort: SortType) -> Result<Vec<Request>, ProtocolError> {
        self.sort = sort;
        self.page = 1;
        Ok(vec![self.fetch()?])
    }

    pub fn set_saved_only(&mut self, saved_only: bool) -> Result<Vec<Request>, ProtocolError> {
        self.saved_only = saved_only;
        self.page = 1;
        Ok(vec![self.fetch()?])
    }

    pub fn next_page(&mut self) -> Result<Vec<Request>, ProtocolError> {
        self.page = step_page(self.page, 1);
        Ok(vec![self.fetch()?])
    }

    pub fn prev_page(&mut self) -> Result<Vec<Request>, ProtocolError> {
        self.page = step_page(self.page, -1);
        Ok(vec![self.fetch()?])
    }

    pub fn vote_post(&mut self, post_id: i32, action: VoteAction) -> Result<Vec<Request>, ProtocolError> {
        let Some(post) = self.posts.iter_mut().find(|p| p.id == post_id) else {
            return Ok(Vec::new());
        };
        let vote = self.votes.cast(post, action);
        Ok(vec![post_like(post_id, vote)?])
    }

    pub fn vote_comment(&mut self, comment_id: i32, action: VoteAction) -> Result<Vec<Request>, ProtocolError> {
        let Some(comment) = self.comments.iter_mut().find(|c| c.id == comment_id) else {
            return Ok(Vec::new());
        };
        let vote = self.votes.cast(comment, action);
        Ok(vec![comment_like(comment_id, comment.post_id, vote)?])
    }

    fn fetch(&self) -> Result<Request, ProtocolError> {
        Request::new(
            UserOperation::GetUserDetails,
            &GetUserDetailsForm {
                user_id: None,
                username: Some(self.username.clone()),
                sort: self.sort,
                page: Some(self.page),
                limit: Some(FETCH_LIMIT),
                community_id: None,
                saved_only: self.saved_only,
            },
        )
    }
}

impl View for UserDetailsView {
    fn name(&self) -> &'static str {
        "user"
    }

    fn handles(&self, op: UserOperation) -> bool {
        matches!(
            op,
            UserOperation::GetUserDetails
                | UserOperation::CreateComment
                | UserOperation::EditComment
                | UserOperation::SaveComment
                | UserOperation::CreateCommentLike
                | UserOperation::CreatePostLike
                | UserOperation::BanUser
        )
    }

    fn replay_requests(&self, _cx: &ViewContext) -> Result<Vec<Request>, ProtocolError> {
        Ok(vec![self.fetch()?])
    }

    fn on_envelope(&mut self, envelope: &Envelope, cx: &ViewContext) -> Result<Reaction, ProtocolError> {
        let Some(op) = envelope.op else {
            return Ok(Reaction::none());
        };
        match op {
            UserOperation::GetUserDetails => {
                let data: GetUserDetailsResponse = expect_payload(envelope)?;
                if data.user.name != self.username {
                    debug!(
                        target = "agora::views",
                        view = "user",
                        expected = %self.username,
                        got = %data.user.name,
                        "ignoring another user's details"
                    );
                    return Ok(Reaction::none());
                }
                self.votes.clear();
                self.user = Some(data.user);
                self.follows = data.follows;
                self.moderates = data.moderates;
                self.comments = data.comments;
                self.posts = data.posts;
            }
            UserOperation::CreateComment => {
                let data: CommentResponse = expect_payload(envelope)?;
                if cx.self_id() == Some(data.comment.creator_id) {
                    return Ok(Reaction::toast("reply_sent"));
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
                if let Some(local) = self.comments.iter_mut().find(|c| c.id == data.comment.id) {
                    self.votes.reconcile(local, &data.comment);
                }
            }
            UserOperation::CreatePostLike => {
                let data: PostResponse = expect_payload(envelope)?;
                if let Some(local) = self.posts.iter_mut().find(|p| p.id == data.post.id) {
                    self.votes.reconcile(local, &data.post);
                }
            }
            UserOperation::BanUser => {
                let data: BanUserResponse = expect_payload(envelope)?;
                if let Some(user) = self.user.as_mut().filter(|u| u.id == data.user.id) {
                    user.banned = data.banned;
                }
                patch::ban_posts(self.posts.iter_mut(), data.user.id, data.banned);
                patch::ban_comments(self.comments.iter_mut(), data.user.id, data.banned);
            }
            _ => {}
        }
        Ok(Reaction::none())
    }

    fn summary(&self) -> String {
        match &self.user {
            Some(user) => format!(
                "user {} ({} posts, {} comments on page {})",
                user.name,
                self.posts.len(),
                self.comments.len(),
                self.page
            ),
            None => format!("user {}: loading", self.username),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{comment, post, user};
    use crate::unread::UserState;

    fn details(name: &str) -> Envelope {
        let mut mine = post(1);
        mine.creator_id = 42;
        Envelope::success(
            UserOperation::GetUserDetails,
            &GetUserDetailsResponse {
                user: user(42, name),
                follows: Vec::new(),
                moderates: Vec::new(),
                comments: vec![comment(1, None)],
                posts: vec![mine],
                admins: Vec::new(),
            },
        )
        .unwrap()
    }

    #[test]
    fn queries_by_username() {
        let view = UserDetailsView::new("ann");
        let requests = view.replay_requests(&ViewContext::default()).unwrap();
        assert_eq!(requests[0].op(), UserOperation::GetUserDetails);
        assert_eq!(requests[0].data()["username"], "ann");
        assert_eq!(requests[0].data()["saved_only"], false);
    }

    #[test]
    fn loads_only_the_requested_user() {
        let mut view = UserDetailsView::new("ann");
        let cx = ViewContext::default();
        view.on_envelope(&details("bob"), &cx).unwrap();
        assert!(view.user().is_none());
        view.on_envelope(&details("ann"), &cx).unwrap();
        assert_eq!(view.user().map(|u| u.id), Some(42));
        assert_eq!(view.posts().len(), 1);
    }

    #[test]
    fn ban_flags_profile_and_posts() {
        let mut view = UserDetailsView::new("ann");
        let cx = ViewContext::default();
        view.on_envelope(&details("ann"), &cx).unwrap();
        let envelope = Envelope::success(
            UserOperation::BanUser,
            &BanUserResponse { user: user(42, "ann"), banned: true },
        )
        .unwrap();
        view.on_envelope(&envelope, &cx).unwrap();
        assert!(view.user().unwrap().banned);
        assert!(view.posts()[0].banned);
    }

    #[test]
    fn own_comment_elsewhere_toasts() {
        let state = UserState::new();
        state.login(7, "ann");
        let cx = ViewContext::new(state, None);
        let mut view = UserDetailsView::new("ann");
        let mut mine = comment(5, None);
        mine.creator_id = 7;
        let envelope = Envelope::success(
            UserOperation::CreateComment,
            &CommentResponse { comment: mine, recipient_ids: vec![] },
        )
        .unwrap();
        assert_eq!(view.on_envelope(&envelope, &cx).unwrap(), Reaction::toast("reply_sent"));
    }
}
