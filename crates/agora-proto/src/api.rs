//! Request forms and response payloads, one pair per operation the client
//! drives. Credentials are not part of the forms; [`crate::Request::with_auth`]
//! attaches them.

use serde::{Deserialize, Serialize};

use crate::types::{
    CommentView, CommunityFollowerView, CommunityModeratorView, PostView, PrivateMessageView,
    UserMentionView, UserView,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortType {
    #[default]
    Hot,
    New,
    TopDay,
    TopWeek,
    TopMonth,
    TopYear,
    TopAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ListingType {
    #[default]
    All,
    Subscribed,
    Community,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPostsForm {
    pub type_: ListingType,
    pub sort: SortType,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub community_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPostsResponse {
    pub posts: Vec<PostView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPostForm {
    pub id: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPostResponse {
    pub post: PostView,
    pub comments: Vec<CommentView>,
    #[serde(default)]
    pub moderators: Vec<CommunityModeratorView>,
    #[serde(default)]
    pub admins: Vec<UserView>,
    #[serde(default)]
    pub online: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PostForm {
    pub name: String,
    pub url: Option<String>,
    pub body: Option<String>,
    pub community_id: i32,
    pub edit_id: Option<i32>,
    pub removed: Option<bool>,
    pub deleted: Option<bool>,
    pub locked: Option<bool>,
    pub stickied: Option<bool>,
    pub nsfw: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostResponse {
    pub post: PostView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePostLikeForm {
    pub post_id: i32,
    pub score: i16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavePostForm {
    pub post_id: i32,
    pub save: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetCommentsForm {
    pub type_: ListingType,
    pub sort: SortType,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub community_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetCommentsResponse {
    pub comments: Vec<CommentView>,
}

/// Used for both `CreateComment` and `EditComment`; the latter sets `edit_id`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommentForm {
    pub content: String,
    pub post_id: i32,
    pub parent_id: Option<i32>,
    pub edit_id: Option<i32>,
    pub creator_id: Option<i32>,
    pub removed: Option<bool>,
    pub deleted: Option<bool>,
    pub reason: Option<String>,
    pub read: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentResponse {
    pub comment: CommentView,
    /// Users the server notified about this comment. Non-empty means the frame
    /// is a reply or mention fan-out rather than a listing update.
    #[serde(default)]
    pub recipient_ids: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentLikeForm {
    pub comment_id: i32,
    pub post_id: i32,
    pub score: i16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveCommentForm {
    pub comment_id: i32,
    pub save: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetRepliesForm {
    pub sort: SortType,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub unread_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetRepliesResponse {
    pub replies: Vec<CommentView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetUserMentionsForm {
    pub sort: SortType,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub unread_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetUserMentionsResponse {
    pub mentions: Vec<UserMentionView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditUserMentionForm {
    pub user_mention_id: i32,
    pub read: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMentionResponse {
    pub mention: UserMentionView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPrivateMessagesForm {
    pub unread_only: bool,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateMessagesResponse {
    pub messages: Vec<PrivateMessageView>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EditPrivateMessageForm {
    pub edit_id: i32,
    pub content: Option<String>,
    pub deleted: Option<bool>,
    pub read: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateMessageResponse {
    pub message: PrivateMessageView,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarkAllAsReadForm {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetUserDetailsForm {
    pub user_id: Option<i32>,
    pub username: Option<String>,
    pub sort: SortType,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub community_id: Option<i32>,
    pub saved_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetUserDetailsResponse {
    pub user: UserView,
    #[serde(default)]
    pub follows: Vec<CommunityFollowerView>,
    #[serde(default)]
    pub moderates: Vec<CommunityModeratorView>,
    pub comments: Vec<CommentView>,
    pub posts: Vec<PostView>,
    #[serde(default)]
    pub admins: Vec<UserView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanUserResponse {
    pub user: UserView,
    pub banned: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanFromCommunityResponse {
    pub user: UserView,
    pub banned: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetFollowedCommunitiesResponse {
    pub communities: Vec<CommunityFollowerView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enums_use_server_spelling() {
        let form = GetPostsForm {
            type_: ListingType::Subscribed,
            sort: SortType::TopWeek,
            page: Some(2),
            limit: Some(20),
            community_id: None,
        };
        let value = serde_json::to_value(&form).unwrap();
        assert_eq!(value["type_"], "Subscribed");
        assert_eq!(value["sort"], "TopWeek");
    }

    #[test]
    fn comment_response_defaults_recipients() {
        let value = json!({
            "comment": {
                "id": 7, "creator_id": 2, "post_id": 1, "parent_id": null,
                "content": "hi", "removed": false, "read": false,
                "published": "2020-01-05T10:00:00.123456", "updated": null,
                "deleted": false, "community_id": 3, "community_name": "main",
                "banned": false, "banned_from_community": false,
                "creator_name": "ann", "creator_avatar": null,
                "score": 1, "upvotes": 1, "downvotes": 0,
                "user_id": null, "my_vote": null, "subscribed": null, "saved": null
            }
        });
        let resp: CommentResponse = serde_json::from_value(value).unwrap();
        assert_eq!(resp.comment.id, 7);
        assert!(resp.recipient_ids.is_empty());
        assert_eq!(resp.comment.hot_rank, 0);
    }
}
