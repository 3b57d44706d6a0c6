use agora_bus::Dispatcher;
use agora_client::cli::{Cli, Command, InboxFilter, ListingArgs};
use agora_client::config::{Config, normalize_server_url};
use agora_client::connection::Connection;
use agora_client::connection::websocket::WebSocketConnector;
use agora_client::telemetry;
use agora_client::unread::UserState;
use agora_client::views::{
    Applied, DataType, InboxView, ListingView, MountedView, Notice, ThreadView, UnreadOrAll,
    UserDetailsView, View, ViewContext, ViewHost,
};
use agora_proto::{Envelope, ListingType};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    telemetry::init(&cli.logging.to_config()).context("initializing logging")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env();
    if let Some(server) = cli.server.as_deref() {
        config.server_url = normalize_server_url(server);
    }
    let url = config.websocket_url()?;
    info!(target = "agora::main", server = %url, "starting agora client");

    let user = UserState::new();
    if let Some(id) = cli.session.user_id {
        user.login(id, cli.session.username.clone().unwrap_or_default());
    }
    let context = ViewContext::new(user, cli.session.auth.clone());

    let dispatcher: Dispatcher<Envelope> = Dispatcher::new();
    let connection = Connection::spawn(
        WebSocketConnector::new(url),
        dispatcher.clone(),
        config.connection_options(),
    );
    let host = ViewHost::new(dispatcher, connection.handle(), context);

    let command = cli
        .command
        .unwrap_or(Command::Listing(ListingArgs::default()));
    let result = match command {
        Command::Listing(args) => {
            let listing_type = if args.subscribed {
                ListingType::Subscribed
            } else {
                ListingType::All
            };
            let mut view = ListingView::new(listing_type);
            if args.comments {
                // Replaced by the mount's own query below.
                let _ = view.set_data_type(DataType::Comment)?;
            }
            follow(host.mount(view)).await
        }
        Command::Thread(args) => {
            let mut view = ThreadView::new(args.post_id);
            view.set_comment_sort(args.sort);
            follow(host.mount(view)).await
        }
        Command::Inbox(args) => {
            let mut view = InboxView::new();
            if args.filter == InboxFilter::All {
                let _ = view.set_unread_or_all(UnreadOrAll::All)?;
            }
            follow(host.mount(view)).await
        }
        Command::User(args) => {
            let mut view = UserDetailsView::new(args.username);
            if args.saved {
                let _ = view.set_saved_only(true)?;
            }
            follow(host.mount(view)).await
        }
    };

    connection.shutdown().await;
    result
}

/// Logs every change to the view until ctrl-c or the channel gives up.
async fn follow<V: View>(mut mounted: MountedView<V>) -> Result<()> {
    let mut unread = mounted.context().user.subscribe();
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("waiting for ctrl-c")?;
                info!(target = "agora::main", "interrupted; shutting down");
                break;
            }
            changed = unread.changed() => {
                if changed.is_err() {
                    continue;
                }
                let count = unread.borrow_and_update().as_ref().map(|u| u.unread_count);
                if let Some(count) = count {
                    info!(target = "agora::main", count, "unread messages");
                }
            }
            applied = mounted.next() => {
                let Some(applied) = applied else { break };
                match &applied {
                    Applied::Updated(op) => {
                        info!(target = "agora::main", %op, summary = %mounted.view().summary(), "view updated");
                    }
                    Applied::Replayed { requests } => {
                        info!(target = "agora::main", requests, "reconnected; reloading");
                    }
                    Applied::OperationError { key, .. } => {
                        warn!(target = "agora::main", key = %key, "server error");
                    }
                    Applied::ConnectionLost(err) => {
                        warn!(target = "agora::main", error = %err, "connection lost");
                    }
                    Applied::Ignored => {}
                    Applied::Closed => break,
                }
                for notice in mounted.take_notices() {
                    match notice {
                        Notice::Toast(key) => info!(target = "agora::main", key = %key, "notice"),
                        Notice::Redirect(route) => info!(target = "agora::main", ?route, "redirect requested"),
                        Notice::ConnectionLost => {
                            anyhow::bail!("gave up reconnecting to the server");
                        }
                    }
                }
            }
        }
    }
    Ok(())
}
