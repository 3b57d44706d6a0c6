//! Front page: posts or comments across communities.

use agora_proto::{
    BanUserResponse, CommentResponse, CommentView, CommunityFollowerView, Envelope,
    GetCommentsForm, GetCommentsResponse, GetFollowedCommunitiesResponse, GetPostsForm,
    GetPostsResponse, ListingType, PostResponse, PostView, ProtocolError, Request, SortType,
    UserOperation,
};
use serde_json::json;

use super::{
    FETCH_LIMIT, Reaction, View, ViewContext, comment_like, expect_payload, patch, post_like,
    step_page,
};
use crate::comment_tree::CommentStore;
use crate::vote::{VoteAction, VoteTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataType {
    #[default]
    Post,
    Comment,
}

#[derive(Debug, Clone)]
pub struct ListingView {
    listing_type: ListingType,
    data_type: DataType,
    sort: SortType,
    page: i64,
    show_nsfw: bool,
    posts: Vec<PostView>,
    comments: Vec<CommentView>,
    followed: Vec<CommunityFollowerView>,
    votes: VoteTracker,
}

impl Default for ListingView {
    fn default() -> Self {
        Self::new(ListingType::All)
    }
}

impl ListingView {
    pub fn new(listing_type: ListingType) -> Self {
        Self {
            listing_type,
            data_type: DataType::Post,
            sort: SortType::Hot,
            page: 1,
            show_nsfw: false,
            posts: Vec::new(),
            comments: Vec::new(),
            followed: Vec::new(),
            votes: VoteTracker::new(),
        }
    }

    pub fn posts(&self) -> &[PostView] {
        &self.posts
    }

    pub fn comments(&self) -> &[CommentView] {
        &self.comments
    }

    pub fn followed(&self) -> &[CommunityFollowerView] {
        &self.followed
    }

    pub fn listing_type(&self) -> ListingType {
        self.listing_type
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn sort(&self) -> SortType {
        self.sort
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn set_listing_type(&mut self, listing_type: ListingType) -> Result<Vec<Request>, ProtocolError> {
        self.listing_type = listing_type;
        self.page = 1;
        Ok(vec![self.fetch()?])
    }

    pub fn set_data_type(&mut self, data_type: DataType) -> Result<Vec<Request>, ProtocolError> {
        self.data_type = data_type;
        self.page = 1;
        Ok(vec![self.fetch()?])
    }

    pub fn set_sort(&mut self, sort: SortType) -> Result<Vec<Request>, ProtocolError> {
        self.sort = sort;
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

    /// Whether live nsfw posts are added to the listing.
    pub fn set_show_nsfw(&mut self, show_nsfw: bool) {
        self.show_nsfw = show_nsfw;
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
        match self.data_type {
            DataType::Post => Request::new(
                UserOperation::GetPosts,
                &GetPostsForm {
                    type_: self.listing_type,
                    sort: self.sort,
                    page: Some(self.page),
                    limit: Some(FETCH_LIMIT),
                    community_id: None,
                },
            ),
            DataType::Comment => Request::new(
                UserOperation::GetComments,
                &GetCommentsForm {
                    type_: self.listing_type,
                    sort: self.sort,
                    page: Some(self.page),
                    limit: Some(FETCH_LIMIT),
                    community_id: None,
                },
            ),
        }
    }

    fn follows(&self, community_id: i32) -> bool {
        self.followed.iter().any(|f| f.community_id == community_id)
    }

    /// Live records only join the listing when they would have been part of
    /// the query that built it.
    fn admits(&self, community_id: i32, nsfw: bool) -> bool {
        match self.listing_type {
            ListingType::Subscribed => self.follows(community_id),
            _ => self.show_nsfw || !nsfw,
        }
    }
}

impl View for ListingView {
    fn name(&self) -> &'static str {
        "listing"
    }

    fn handles(&self, op: UserOperation) -> bool {
        matches!(
            op,
            UserOperation::GetFollowedCommunities
                | UserOperation::GetPosts
                | UserOperation::CreatePost
                | UserOperation::EditPost
                | UserOperation::CreatePostLike
                | UserOperation::BanUser
                | UserOperation::GetComments
                | UserOperation::CreateComment
                | UserOperation::EditComment
                | UserOperation::SaveComment
                | UserOperation::CreateCommentLike
        )
    }

    fn replay_requests(&self, cx: &ViewContext) -> Result<Vec<Request>, ProtocolError> {
        let mut requests = Vec::with_capacity(2);
        if cx.self_id().is_some() {
            requests.push(Request::new(
                UserOperation::GetFollowedCommunities,
                &json!({}),
            )?);
        }
        requests.push(self.fetch()?);
        Ok(requests)
    }

    fn on_envelope(&mut self, envelope: &Envelope, _cx: &ViewContext) -> Result<Reaction, ProtocolError> {
        let Some(op) = envelope.op else {
            return Ok(Reaction::none());
        };
        match op {
            UserOperation::GetFollowedCommunities => {
                let data: GetFollowedCommunitiesResponse = expect_payload(envelope)?;
                self.followed = data.communities;
            }
            UserOperation::GetPosts => {
                let data: GetPostsResponse = expect_payload(envelope)?;
                self.votes.clear();
                self.posts = data.posts;
            }
            UserOperation::GetComments => {
                let data: GetCommentsResponse = expect_payload(envelope)?;
                self.votes.clear();
                self.comments = data.comments;
            }
            UserOperation::CreatePost => {
                let data: PostResponse = expect_payload(envelope)?;
                let post = data.post;
                if self.admits(post.community_id, post.nsfw) && !self.posts.iter().any(|p| p.id == post.id) {
                    self.posts.insert(0, post);
                }
            }
            UserOperation::EditPost => {
                let data: PostResponse = expect_payload(envelope)?;
                if let Some(local) = self.posts.iter_mut().find(|p| p.id == data.post.id) {
                    patch::edit_post(local, &data.post);
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
                patch::ban_posts(self.posts.iter_mut(), data.user.id, data.banned);
                patch::ban_comments(self.comments.iter_mut(), data.user.id, data.banned);
            }
            UserOperation::CreateComment => {
                let data: CommentResponse = expect_payload(envelope)?;
                // Reply fan-outs carry recipients and belong to the inbox.
                if !data.recipient_ids.is_empty() {
                    return Ok(Reaction::none());
                }
                let comment = data.comment;
                if self.admits(comment.community_id, false)
                    && !self.comments.iter().any(|c| c.id == comment.id)
                {
                    self.comments.insert(0, comment);
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
            _ => {}
        }
        Ok(Reaction::none())
    }

    fn summary(&self) -> String {
        format!(
            "{:?} listing page {} ({:?}): {} posts, {} comments",
            self.listing_type,
            self.page,
            self.sort,
            self.posts.len(),
            self.comments.len()
        )
    }
}
