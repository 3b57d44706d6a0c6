use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Version of the operation tag enumeration below. Bump when a tag is added,
/// removed or renamed.
pub const PROTOCOL_VERSION: &str = "v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Query,
    Mutation,
}

macro_rules! operations {
    ($($name:ident => $kind:ident),+ $(,)?) => {
        /// Operation tag carried by every envelope. Serialized as the variant
        /// name (`"GetPosts"`, `"CreateCommentLike"`, ...).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum UserOperation {
            $($name),+
        }

        impl UserOperation {
            pub const ALL: &'static [UserOperation] = &[$(UserOperation::$name),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(UserOperation::$name => stringify!($name)),+
                }
            }

            pub fn kind(self) -> OperationKind {
                match self {
                    $(UserOperation::$name => OperationKind::$kind),+
                }
            }
        }
    };
}

operations! {
    Login => Mutation,
    Register => Mutation,
    UserJoin => Mutation,
    GetSite => Query,
    CreateSite => Mutation,
    EditSite => Mutation,
    GetSiteConfig => Query,
    SaveSiteConfig => Mutation,
    TransferSite => Mutation,
    Search => Query,
    GetModlog => Query,
    ListCategories => Query,
    ListCommunities => Query,
    GetCommunity => Query,
    CreateCommunity => Mutation,
    EditCommunity => Mutation,
    FollowCommunity => Mutation,
    GetFollowedCommunities => Query,
    TransferCommunity => Mutation,
    BanFromCommunity => Mutation,
    AddModToCommunity => Mutation,
    GetPosts => Query,
    GetPost => Query,
    CreatePost => Mutation,
    EditPost => Mutation,
    SavePost => Mutation,
    CreatePostLike => Mutation,
    GetComments => Query,
    CreateComment => Mutation,
    EditComment => Mutation,
    SaveComment => Mutation,
    CreateCommentLike => Mutation,
    GetUserDetails => Query,
    SaveUserSettings => Mutation,
    DeleteAccount => Mutation,
    PasswordReset => Mutation,
    PasswordChange => Mutation,
    BanUser => Mutation,
    AddAdmin => Mutation,
    GetReplies => Query,
    GetUserMentions => Query,
    EditUserMention => Mutation,
    MarkAllAsRead => Mutation,
    GetPrivateMessages => Query,
    CreatePrivateMessage => Mutation,
    EditPrivateMessage => Mutation,
}

impl UserOperation {
    pub fn is_mutation(self) -> bool {
        self.kind() == OperationKind::Mutation
    }
}

impl fmt::Display for UserOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOperation(pub String);

impl FromStr for UserOperation {
    type Err = UnknownOperation;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        UserOperation::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == tag)
            .ok_or_else(|| UnknownOperation(tag.to_string()))
    }
}

impl Serialize for UserOperation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UserOperation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        tag.parse()
            .map_err(|UnknownOperation(tag)| serde::de::Error::custom(format!("unknown operation {tag}")))
    }
}
