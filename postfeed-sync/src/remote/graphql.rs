//! GraphQL remote collection.
//!
//! Issues the `listPosts` query and the `createPost` / `deletePost`
//! mutations over HTTP. Event subscriptions are not carried by this adapter;
//! pair it with an [`EventSource`](super::EventSource) for live updates.

use super::{PostCollection, RemoteError, RemoteResult, Snapshot};
use async_trait::async_trait;
use postfeed_types::{NewPost, Post, PostId};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

const LIST_POSTS: &str = "query ListPosts($nextToken: String) {
  listPosts(nextToken: $nextToken) {
    items { id title description image owner }
    nextToken
  }
}";

const CREATE_POST: &str = "mutation CreatePost($input: CreatePostInput!) {
  createPost(input: $input) { id }
}";

const DELETE_POST: &str = "mutation DeletePost($input: DeletePostInput!) {
  deletePost(input: $input) { id }
}";

/// GraphQL endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphqlConfig {
    /// Full URL of the GraphQL endpoint.
    pub endpoint: String,
    /// Value for the `Authorization` header, issued by the identity provider.
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Upper bound on `listPosts` pages fetched for one snapshot.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

fn default_max_pages() -> usize {
    100
}

impl Default for GraphqlConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:20002/graphql".to_string(),
            auth_token: None,
            timeout_secs: 30,
            max_pages: default_max_pages(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorEntry {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostPage {
    #[serde(default)]
    items: Vec<Value>,
    next_token: Option<String>,
}

/// Remote collection backed by a GraphQL endpoint.
pub struct GraphqlRemote {
    config: GraphqlConfig,
    client: Client,
}

impl GraphqlRemote {
    /// Creates a client for the configured endpoint.
    pub fn new(config: GraphqlConfig) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RemoteError::new(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GraphqlConfig {
        &self.config
    }

    /// Runs one operation and returns its `data` object.
    async fn execute(&self, query: &str, variables: Value) -> RemoteResult<Value> {
        let mut request = self
            .client
            .post(&self.config.endpoint)
            .json(&json!({ "query": query, "variables": variables }));
        if let Some(token) = &self.config.auth_token {
            request = request.header(AUTHORIZATION, token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::new(format!("request failed: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::new(format!("failed to read response: {e}")))?;

        let parsed: GraphqlResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(RemoteError::new(format!("HTTP {status}")));
            }
            Err(e) => return Err(RemoteError::new(format!("malformed response: {e}"))),
        };

        if !parsed.errors.is_empty() {
            return Err(RemoteError::from_messages(
                parsed.errors.into_iter().map(|e| e.message),
            ));
        }
        if !status.is_success() {
            return Err(RemoteError::new(format!("HTTP {status}")));
        }
        parsed
            .data
            .ok_or_else(|| RemoteError::new("response carried no data"))
    }
}

#[async_trait]
impl PostCollection for GraphqlRemote {
    async fn list_posts(&self) -> RemoteResult<Snapshot> {
        let mut posts = Vec::new();
        let mut next_token: Option<String> = None;

        for _ in 0..self.config.max_pages {
            let mut data = self
                .execute(LIST_POSTS, json!({ "nextToken": next_token }))
                .await?;
            let page = data
                .get_mut("listPosts")
                .map(Value::take)
                .unwrap_or(Value::Null);
            let page: PostPage = serde_json::from_value(page)
                .map_err(|e| RemoteError::new(format!("malformed listPosts result: {e}")))?;

            for item in page.items {
                match Post::from_value(item) {
                    Ok(post) => posts.push(post),
                    Err(e) => warn!("Skipping malformed post in listPosts: {}", e),
                }
            }

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => {
                    debug!("listPosts returned {} posts", posts.len());
                    return Ok(Snapshot::complete(posts));
                }
            }
        }

        warn!(
            "listPosts still paginating after {} pages, truncating",
            self.config.max_pages
        );
        Ok(Snapshot::truncated(posts))
    }

    async fn create_post(&self, input: &NewPost) -> RemoteResult<()> {
        self.execute(CREATE_POST, json!({ "input": input })).await?;
        Ok(())
    }

    async fn delete_post(&self, id: &PostId) -> RemoteResult<()> {
        self.execute(DELETE_POST, json!({ "input": { "id": id } }))
            .await?;
        Ok(())
    }
}
