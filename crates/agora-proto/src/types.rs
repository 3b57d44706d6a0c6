//! Records as the server serializes them inside payloads.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentView {
    pub id: i32,
    pub creator_id: i32,
    pub post_id: i32,
    pub parent_id: Option<i32>,
    pub content: String,
    pub removed: bool,
    pub read: bool,
    pub published: NaiveDateTime,
    pub updated: Option<NaiveDateTime>,
    pub deleted: bool,
    pub community_id: i32,
    pub community_name: String,
    pub banned: bool,
    pub banned_from_community: bool,
    pub creator_name: String,
    pub creator_avatar: Option<String>,
    pub score: i64,
    pub upvotes: i64,
    pub downvotes: i64,
    #[serde(default)]
    pub hot_rank: i32,
    pub user_id: Option<i32>,
    pub my_vote: Option<i32>,
    pub subscribed: Option<bool>,
    pub saved: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostView {
    pub id: i32,
    pub name: String,
    pub url: Option<String>,
    pub body: Option<String>,
    pub creator_id: i32,
    pub community_id: i32,
    pub removed: bool,
    pub locked: bool,
    pub published: NaiveDateTime,
    pub updated: Option<NaiveDateTime>,
    pub deleted: bool,
    pub nsfw: bool,
    pub stickied: bool,
    pub banned: bool,
    pub banned_from_community: bool,
    pub creator_name: String,
    pub creator_avatar: Option<String>,
    pub community_name: String,
    pub community_removed: bool,
    pub community_deleted: bool,
    pub community_nsfw: bool,
    pub number_of_comments: i64,
    pub score: i64,
    pub upvotes: i64,
    pub downvotes: i64,
    #[serde(default)]
    pub hot_rank: i32,
    pub newest_activity_time: Option<NaiveDateTime>,
    pub user_id: Option<i32>,
    pub my_vote: Option<i32>,
    pub subscribed: Option<bool>,
    pub read: Option<bool>,
    pub saved: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateMessageView {
    pub id: i32,
    pub creator_id: i32,
    pub recipient_id: i32,
    pub content: String,
    pub deleted: bool,
    pub read: bool,
    pub published: NaiveDateTime,
    pub updated: Option<NaiveDateTime>,
    pub creator_name: String,
    pub creator_avatar: Option<String>,
    pub recipient_name: String,
    pub recipient_avatar: Option<String>,
}

/// A comment in which the recipient was mentioned. `id` is the comment id;
/// `user_mention_id` is the id of the mention row, which is what
/// `EditUserMention` addresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMentionView {
    pub id: i32,
    pub user_mention_id: i32,
    pub creator_id: i32,
    pub post_id: i32,
    pub parent_id: Option<i32>,
    pub content: String,
    pub removed: bool,
    pub read: bool,
    pub published: NaiveDateTime,
    pub updated: Option<NaiveDateTime>,
    pub deleted: bool,
    pub community_id: i32,
    pub community_name: String,
    pub banned: bool,
    pub banned_from_community: bool,
    pub creator_name: String,
    pub creator_avatar: Option<String>,
    pub score: i64,
    pub upvotes: i64,
    pub downvotes: i64,
    pub user_id: Option<i32>,
    pub my_vote: Option<i32>,
    pub saved: Option<bool>,
    pub recipient_id: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub id: i32,
    pub name: String,
    pub avatar: Option<String>,
    pub email: Option<String>,
    pub admin: bool,
    pub banned: bool,
    pub published: NaiveDateTime,
    pub number_of_posts: i64,
    pub post_score: i64,
    pub number_of_comments: i64,
    pub comment_score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityFollowerView {
    pub community_id: i32,
    pub user_id: i32,
    pub community_name: String,
    pub user_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityModeratorView {
    pub community_id: i32,
    pub user_id: i32,
    pub community_name: String,
    pub user_name: String,
}
