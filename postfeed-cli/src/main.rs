//! postfeed terminal client
//!
//! Joins a shared post feed, prints the feed whenever it changes and reads
//! commands from stdin.
//!
//! Usage:
//!   postfeed --user alice --media-dir ./media
//!
//! Without a config file the feed runs against an in-process remote, which is
//! enough to watch mutations echo back through the event streams.

use anyhow::{Context, Result};
use clap::Parser;
use postfeed_cli::{build_backends, load_config, log_filter, render_view, Command, USAGE};
use postfeed_sync::PostFeed;
use postfeed_types::MediaBlob;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "postfeed")]
#[command(about = "Terminal client for a shared post feed")]
struct Args {
    /// Signed-in user. Without one, every mutation is refused.
    #[arg(short, long)]
    user: Option<String>,

    /// Directory for media attachments (overrides the config file)
    #[arg(short, long)]
    media_dir: Option<PathBuf>,

    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let directive = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    FmtSubscriber::builder()
        .with_env_filter(log_filter(args.verbose, directive.as_deref()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(dir) = args.media_dir {
        config.media.root = dir;
    }
    info!("Media folder: {:?}", config.media.root);

    let backends = build_backends(&config, args.user.as_deref())?;
    let feed = PostFeed::new(config.sync.clone(), backends);

    let user = feed.activate().await.context("Failed to join the feed")?;
    let phase = feed.wait_until_live().await;
    for warning in feed.warnings() {
        warn!("{:?}: {}", warning.source, warning.message);
    }
    info!("Feed is {} for {}", phase, user);

    let mut changes = feed.changes();
    let printer = tokio::spawn(async move {
        println!("{}", render_view(&changes.current()));
        while changes.changed().await {
            println!("--\n{}", render_view(&changes.current()));
        }
    });

    println!("{USAGE}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        match Command::parse(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => {
                if let Err(e) = run(&feed, command).await {
                    eprintln!("error: {e:#}");
                }
            }
            Err(e) => eprintln!("{e}"),
        }
    }

    feed.deactivate().await;
    printer.abort();
    info!("Left the feed");
    Ok(())
}

async fn run(feed: &PostFeed, command: Command) -> Result<()> {
    match command {
        Command::Post {
            title,
            description,
            attachment,
        } => {
            let blob = match attachment {
                Some(path) => Some(read_attachment(&path).await?),
                None => None,
            };
            feed.submit_new_post(&title, &description, blob).await?;
            debug!("Post submitted; waiting for the echo");
        }
        Command::Remove(id) => feed.remove_post(&id).await?,
        Command::List => println!("{}", render_view(&feed.current_view())),
        Command::Help => println!("{USAGE}"),
        Command::Quit => {}
    }
    Ok(())
}

async fn read_attachment(path: &Path) -> Result<MediaBlob> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read attachment {}", path.display()))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("Attachment path has no file name: {}", path.display()))?;
    Ok(MediaBlob::new(name, bytes))
}
