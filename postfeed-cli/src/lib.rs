//! Command parsing and backend wiring for the postfeed terminal client.

use anyhow::{Context, Result};
use postfeed_sync::media::FsBlobStore;
use postfeed_sync::remote::graphql::GraphqlRemote;
use postfeed_sync::remote::memory::InMemoryRemote;
use postfeed_sync::{FeedBackends, FeedConfig, LocalView, StaticIdentity};
use postfeed_types::PostId;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub const USAGE: &str = "\
commands:
  post <title> | <description> [| <file>]   publish a post, optionally with an attachment
  rm <id>                                    remove a post and its attachment
  ls                                         list the feed
  help                                       show this help
  quit                                       leave";

/// Builds the log filter.
///
/// A valid `RUST_LOG`-style directive wins; otherwise `--verbose` picks
/// between debug and info.
pub fn log_filter(verbose: bool, directive: Option<&str>) -> EnvFilter {
    let fallback = if verbose { "debug" } else { "info" };
    directive
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback))
}

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Post {
        title: String,
        description: String,
        attachment: Option<PathBuf>,
    },
    Remove(PostId),
    List,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid post id: {0:?}")]
    InvalidId(String),
}

impl Command {
    /// Parses one line of input.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandError::Empty);
        }
        let (verb, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(verb, rest)| (verb, rest.trim()));

        match verb {
            "post" => parse_post(rest),
            "rm" | "remove" => {
                if rest.is_empty() {
                    return Err(CommandError::Usage("rm <id>"));
                }
                PostId::parse(rest)
                    .map(Command::Remove)
                    .map_err(|_| CommandError::InvalidId(rest.to_string()))
            }
            "ls" | "list" => Ok(Command::List),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn parse_post(rest: &str) -> Result<Command, CommandError> {
    const POST_USAGE: &str = "post <title> | <description> [| <file>]";

    let parts: Vec<&str> = rest.split('|').map(str::trim).collect();
    match parts.as_slice() {
        [title, description] => Ok(Command::Post {
            title: title.to_string(),
            description: description.to_string(),
            attachment: None,
        }),
        [title, description, file] if !file.is_empty() => Ok(Command::Post {
            title: title.to_string(),
            description: description.to_string(),
            attachment: Some(PathBuf::from(file)),
        }),
        _ => Err(CommandError::Usage(POST_USAGE)),
    }
}

/// Renders the view, one post per line, newest first.
pub fn render_view(view: &LocalView) -> String {
    if view.is_empty() {
        return "(no posts)".to_string();
    }
    let mut out = String::new();
    for post in view.posts() {
        let _ = write!(out, "{}  {}: {}", post.id, post.title, post.description);
        if let Some(key) = &post.media_key {
            let _ = write!(out, " [{key}]");
        }
        if let Some(owner) = &post.owner {
            let _ = write!(out, " (by {owner})");
        }
        out.push('\n');
    }
    out.pop();
    out
}

/// Loads a JSON [`FeedConfig`], or the defaults without a path.
pub fn load_config(path: Option<&Path>) -> Result<FeedConfig> {
    let Some(path) = path else {
        return Ok(FeedConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Wires the adapters named by the config.
///
/// Without a GraphQL endpoint the feed runs against an in-process remote that
/// echoes every mutation back as an event.
pub fn build_backends(config: &FeedConfig, user: Option<&str>) -> Result<FeedBackends> {
    let blobs = Arc::new(FsBlobStore::new(config.media.clone()));
    let identity = Arc::new(match user {
        Some(user) => StaticIdentity::signed_in(user),
        None => StaticIdentity::anonymous(),
    });

    match &config.graphql {
        Some(graphql) => {
            info!("Using GraphQL endpoint {}", graphql.endpoint);
            let collection = GraphqlRemote::new(graphql.clone())
                .context("Failed to create GraphQL client")?;
            warn!("No live event source for the GraphQL endpoint; the feed shows the snapshot only");
            Ok(FeedBackends {
                collection: Arc::new(collection),
                events: Arc::new(InMemoryRemote::new()),
                blobs,
                identity,
            })
        }
        None => {
            info!("Using in-process remote");
            let mut remote = InMemoryRemote::new();
            if let Some(user) = user {
                remote = remote.with_owner(user);
            }
            let remote = Arc::new(remote);
            Ok(FeedBackends {
                collection: remote.clone(),
                events: remote,
                blobs,
                identity,
            })
        }
    }
}
