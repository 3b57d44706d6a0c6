//! Page view-models driven by the shared channel.
//!
//! A [`View`] owns the records one page shows. It states which operations it
//! cares about, which queries rebuild it after a reconnect, and how each
//! confirmed envelope patches its state. [`ViewHost`] mounts views on the
//! dispatcher and turns their intents into outgoing requests.

use agora_proto::{
    CommentLikeForm, CreatePostLikeForm, Envelope, ProtocolError, Request, UserOperation,
};
use serde::de::DeserializeOwned;

use crate::unread::UserState;
use crate::vote::MyVote;

pub mod host;
pub mod inbox;
pub mod listing;
pub mod patch;
pub mod thread;
pub mod user;

pub use host::{Applied, MountedView, ViewHost};
pub use inbox::{InboxView, MessageType, UnreadOrAll};
pub use listing::{DataType, ListingView};
pub use thread::ThreadView;
pub use user::UserDetailsView;

/// Page size used by every paginated query.
pub const FETCH_LIMIT: i64 = 20;

/// Error keys that leave the current page.
pub const REDIRECT_KEYS: &[&str] = &[
    "couldnt_find_that_username_or_email",
    "couldnt_find_post",
    "couldnt_find_community",
];

/// What every view sees of the session.
#[derive(Debug, Clone, Default)]
pub struct ViewContext {
    pub user: UserState,
    pub auth: Option<String>,
}

impl ViewContext {
    pub fn new(user: UserState, auth: Option<String>) -> Self {
        Self { user, auth }
    }

    pub fn self_id(&self) -> Option<i32> {
        self.user.self_id()
    }

    /// Attaches the session credential, if any.
    pub fn authorize(&self, request: Request) -> Request {
        match &self.auth {
            Some(token) => request.with_auth(token.clone()),
            None => request,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Post(i32),
    User(String),
    Inbox,
}

/// Side effects a view asks the shell to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Localization key to show as a toast.
    Toast(String),
    Redirect(Route),
    ConnectionLost,
}

/// Result of handling one envelope: follow-up requests and notices.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Reaction {
    pub requests: Vec<Request>,
    pub notices: Vec<Notice>,
}

impl Reaction {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn toast(key: impl Into<String>) -> Self {
        Self {
            requests: Vec::new(),
            notices: vec![Notice::Toast(key.into())],
        }
    }

    pub fn request(request: Request) -> Self {
        Self {
            requests: vec![request],
            notices: Vec::new(),
        }
    }
}

pub trait View {
    fn name(&self) -> &'static str;

    /// Whether envelopes tagged `op` concern this view.
    fn handles(&self, op: UserOperation) -> bool;

    /// Queries that rebuild the view from scratch with its current
    /// parameters. Sent on mount and after every reconnect.
    fn replay_requests(&self, cx: &ViewContext) -> Result<Vec<Request>, ProtocolError>;

    /// Called for payload envelopes whose op passes [`View::handles`].
    fn on_envelope(
        &mut self,
        envelope: &Envelope,
        cx: &ViewContext,
    ) -> Result<Reaction, ProtocolError>;

    /// Called for error envelopes addressed to this view, after the toast has
    /// been raised.
    fn on_error(&mut self, _op: Option<UserOperation>, _key: &str, _cx: &ViewContext) -> Reaction {
        Reaction::none()
    }

    /// One-line description for logs.
    fn summary(&self) -> String;
}

/// Payload of a success envelope, decoded as `T`.
pub(crate) fn expect_payload<T: DeserializeOwned>(envelope: &Envelope) -> Result<T, ProtocolError> {
    envelope
        .payload_as::<T>()?
        .ok_or_else(|| ProtocolError::Malformed {
            reason: "success envelope without payload".to_string(),
        })
}

pub(crate) fn comment_like(
    comment_id: i32,
    post_id: i32,
    vote: MyVote,
) -> Result<Request, ProtocolError> {
    Request::new(
        UserOperation::CreateCommentLike,
        &CommentLikeForm {
            comment_id,
            post_id,
            score: vote.score(),
        },
    )
}

pub(crate) fn post_like(post_id: i32, vote: MyVote) -> Result<Request, ProtocolError> {
    Request::new(
        UserOperation::CreatePostLike,
        &CreatePostLikeForm {
            post_id,
            score: vote.score(),
        },
    )
}

/// Page number after stepping `delta`, never below 1.
pub(crate) fn step_page(page: i64, delta: i64) -> i64 {
    (page + delta).max(1)
}
