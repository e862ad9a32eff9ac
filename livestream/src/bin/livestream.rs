use church_livestream::poller::fetch_status;
use church_livestream::youtube_api::BroadcastLifeCycleStatus;
use church_livestream::{Broadcaster, Settings, ensure_signed_in};
use clap::{Parser, Subcommand};
use eyre::Context;
use std::io::IsTerminal;
use tokio_stream::StreamExt;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Runs the church's YouTube service livestream.
#[derive(Parser, Debug)]
#[command(name = "livestream", version)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in to YouTube through the browser.
    Login,
    /// Forget stored YouTube credentials.
    Logout,
    /// Create a broadcast and ingest stream and record them as the current session.
    Provision {
        /// Title viewers will see.
        title: String,
    },
    /// Take the current session live.
    Start,
    /// End the current session and archive it as a sermon.
    Stop,
    /// Drop the current session without archiving it.
    Cancel,
    /// Show the current session's broadcast and stream status.
    Status {
        /// Keep polling until the session ends or is cleared.
        #[arg(long)]
        watch: bool,
    },
    /// List the channel's most recent broadcasts.
    List {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();

    let Cli { settings, command } = Cli::parse();
    let yt = settings.youtube_client()?;

    match command {
        Command::Login => {
            ensure_signed_in(yt.credentials(), async |msg| eprintln!("{msg}")).await?;
            eprintln!("signed in");
            return Ok(());
        }
        Command::Logout => {
            yt.credentials().clear().context("clear stored credentials")?;
            eprintln!("signed out");
            return Ok(());
        }
        _ => {}
    }

    ensure_signed_in(yt.credentials(), async |msg| eprintln!("{msg}")).await?;
    let broadcaster = Broadcaster::new(yt, settings.content_store()?, settings.live_config());

    match command {
        Command::Login | Command::Logout => {}
        Command::Provision { title } => {
            let session = broadcaster.provision(&title).await?;
            println!("broadcast : {}", session.broadcast_id);
            println!("stream    : {}", session.stream_id);
            println!("ingest url: {}", session.ingest_url);
            println!("ingest key: {}", session.ingest_key);
            println!("watch url : {}", session.watch_url);
        }
        Command::Start => {
            let session = broadcaster.start().await?;
            println!("{} is {}", session.title, session.lifecycle_status);
        }
        Command::Stop => {
            let item = broadcaster.stop().await?;
            println!("archived {} ({})", item.title, item.external_video_id);
        }
        Command::Cancel => match broadcaster.cancel().await? {
            Some(session) => println!("cancelled {} ({})", session.title, session.broadcast_id),
            None => println!("no session on record"),
        },
        Command::Status { watch: false } => {
            let Some(stored) = broadcaster.current_session().await? else {
                println!("no session on record");
                return Ok(());
            };
            let session = stored.session;
            let snapshot =
                fetch_status(broadcaster.youtube(), &session.broadcast_id, &session.stream_id)
                    .await;
            println!("{}: {snapshot}", session.title);
        }
        Command::Status { watch: true } => {
            let Some(stored) = broadcaster.current_session().await? else {
                println!("no session on record");
                return Ok(());
            };
            let broadcast_id = stored.session.broadcast_id;
            let poller = broadcaster.watch_status().await?;
            let mut updates = std::pin::pin!(poller.updates());
            loop {
                tokio::select! {
                    snapshot = updates.next() => {
                        let Some(snapshot) = snapshot else { break };
                        println!(
                            "{snapshot} [start {}, stop {}]",
                            if poller.can_start() { "available" } else { "unavailable" },
                            if poller.can_stop() { "available" } else { "unavailable" },
                        );
                        if snapshot.is_finished() {
                            println!("broadcast has ended");
                            break;
                        }
                        if !broadcaster.is_current(&broadcast_id).await? {
                            println!("session was cleared");
                            break;
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            poller.stop();
        }
        Command::List { limit } => {
            let broadcasts = broadcaster
                .youtube()
                .list_my_live_broadcasts(limit)
                .await
                .context("list broadcasts")?;
            for broadcast in broadcasts {
                let kind = match broadcast.status.life_cycle_status {
                    BroadcastLifeCycleStatus::Created | BroadcastLifeCycleStatus::Ready => "upcoming",
                    BroadcastLifeCycleStatus::Complete | BroadcastLifeCycleStatus::Revoked => "complete",
                    _ => "active",
                };
                println!("{kind:<9}: {} {}", broadcast.id, broadcast.snippet.title);
            }
        }
    }

    Ok(())
}
