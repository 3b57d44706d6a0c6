use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::sort::CommentSortType;
use crate::telemetry::{LogConfig, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "agora-client",
    about = "Follow an agora server's live updates from the terminal",
    author,
    version
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "AGORA_SERVER_URL",
        help = "Websocket endpoint of the agora server"
    )]
    pub server: Option<String>,

    #[command(flatten)]
    pub session: SessionArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
    #[arg(
        long = "auth",
        global = true,
        env = "AGORA_AUTH",
        value_name = "TOKEN",
        help = "Session token attached to every request",
        hide_env_values = true
    )]
    pub auth: Option<String>,

    #[arg(
        long = "user-id",
        global = true,
        env = "AGORA_USER_ID",
        value_name = "ID",
        help = "Id of the signed-in user; enables inbox counts"
    )]
    pub user_id: Option<i32>,

    #[arg(
        long = "username",
        global = true,
        env = "AGORA_USERNAME",
        value_name = "NAME"
    )]
    pub username: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    #[arg(
        long = "log-level",
        value_enum,
        env = "AGORA_LOG_LEVEL",
        default_value_t = LogLevel::Warn,
        help = "Minimum log level (error, warn, info, debug, trace)"
    )]
    pub level: LogLevel,

    #[arg(
        long = "log-file",
        value_name = "PATH",
        env = "AGORA_LOG_FILE",
        help = "Write structured logs to the specified file"
    )]
    pub file: Option<PathBuf>,
}

impl LoggingArgs {
    pub fn to_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            file: self.file.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Follow the front page (default when no subcommand given)
    Listing(ListingArgs),
    /// Follow one post and its comment tree
    Thread(ThreadArgs),
    /// Follow the signed-in user's inbox
    Inbox(InboxArgs),
    /// Follow a user's profile
    User(UserArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListingArgs {
    #[arg(long, help = "Only communities the signed-in user follows")]
    pub subscribed: bool,

    #[arg(long, help = "List comments instead of posts")]
    pub comments: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ThreadArgs {
    pub post_id: i32,

    #[arg(long, value_enum, default_value_t = CommentSortType::Hot)]
    pub sort: CommentSortType,
}

#[derive(Args, Debug, Clone)]
pub struct InboxArgs {
    #[arg(long, value_enum, default_value_t = InboxFilter::Unread)]
    pub filter: InboxFilter,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboxFilter {
    Unread,
    All,
}

#[derive(Args, Debug, Clone)]
pub struct UserArgs {
    pub username: String,

    #[arg(long, help = "Only the user's saved posts and comments")]
    pub saved: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_thread_subcommand() {
        let cli = Cli::try_parse_from([
            "agora-client",
            "--log-level",
            "debug",
            "thread",
            "42",
            "--sort",
            "new",
        ])
        .unwrap();
        assert_eq!(cli.logging.level, LogLevel::Debug);
        match cli.command {
            Some(Command::Thread(args)) => {
                assert_eq!(args.post_id, 42);
                assert_eq!(args.sort, CommentSortType::New);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn no_subcommand_means_listing() {
        let cli = Cli::try_parse_from(["agora-client", "--user-id", "7"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.session.user_id, Some(7));
    }
}
