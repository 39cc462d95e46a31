use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Method};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};

use crate::api::{self, Backend, CommentId, CommentRow, NewComment, PostId, Profile, UserId};

const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Clone, Debug)]
pub struct RestConfig {
    /// Base url of the hosted backend, without the `/rest/v1` suffix
    pub url: String,

    /// Public key sent as `apikey` with every request, and as bearer token
    /// when there is no session
    pub anon_key: String,

    /// Retries of transient failures (network errors, 5xx, 429) for reads
    /// and deletes, comments are only ever posted once
    pub max_retries: u32,
}

impl RestConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> RestConfig {
        let mut url = url.into();
        while url.ends_with('/') {
            url.pop();
        }
        RestConfig {
            url,
            anon_key: anon_key.into(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// A logged-in user, as handed out by the backend's auth service
#[derive(Clone, Debug)]
pub struct RestSession {
    pub user: UserId,
    pub access_token: String,
}

/// [`Backend`] talking to a PostgREST endpoint
pub struct RestBackend {
    client: ClientWithMiddleware,

    /// Same connection pool without retries, for requests that are not
    /// idempotent
    once: ClientWithMiddleware,

    config: RestConfig,
    session: Option<RestSession>,
}

#[derive(serde::Deserialize)]
struct IdRow {
    id: CommentId,
}

/// PostgREST `in.(...)` filter, with every value quoted
fn in_filter<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    let values = values
        .into_iter()
        .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect::<Vec<_>>();
    format!("in.({})", values.join(","))
}

fn eq_filter(value: &str) -> String {
    format!("eq.{value}")
}

async fn check(resp: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.bytes().await.unwrap_or_default();
    Err(anyhow::Error::new(api::Error::from_response(status, &body)))
}

impl RestBackend {
    pub fn new(config: RestConfig, session: Option<RestSession>) -> RestBackend {
        let http = reqwest::Client::new();
        let policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(http.clone())
            .with(RetryTransientMiddleware::new_with_policy(policy))
            .build();
        let once = ClientBuilder::new(http).build();
        RestBackend {
            client,
            once,
            config,
            session,
        }
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let token = match &self.session {
            Some(s) => &s.access_token,
            None => &self.config.anon_key,
        };
        // a retried POST could store the comment twice
        let client = if method == Method::POST {
            &self.once
        } else {
            &self.client
        };
        client
            .request(method, format!("{}/rest/v1/{table}", self.config.url))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token)
    }

    fn comments_of(&self, post: &PostId) -> RequestBuilder {
        self.request(Method::GET, "comments").query(&[
            ("select", String::from("*")),
            ("post_id", eq_filter(&post.0)),
            ("order", String::from("created_at.desc")),
        ])
    }

    fn profiles_of(&self, ids: &[UserId]) -> RequestBuilder {
        self.request(Method::GET, "profiles").query(&[
            ("select", String::from("id,username,avatar_url")),
            ("id", in_filter(ids.iter().map(|id| &id.0 as &str))),
        ])
    }

    fn insert(&self, c: &NewComment) -> anyhow::Result<RequestBuilder> {
        let body = serde_json::to_vec(c).context("serializing new comment")?;
        Ok(self
            .request(Method::POST, "comments")
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", "return=representation")
            .body(body))
    }

    fn delete(&self, ids: &[CommentId]) -> RequestBuilder {
        self.request(Method::DELETE, "comments")
            .query(&[("id", in_filter(ids.iter().map(|id| &id.0 as &str)))])
    }
}

#[async_trait]
impl Backend for RestBackend {
    fn current_user(&self) -> Option<UserId> {
        self.session.as_ref().map(|s| s.user.clone())
    }

    async fn fetch_comments(&self, post: &PostId) -> anyhow::Result<Vec<CommentRow>> {
        let resp = self.comments_of(post).send().await?;
        check(resp)
            .await?
            .json()
            .await
            .context("parsing comment rows")
    }

    async fn fetch_profiles(&self, ids: &[UserId]) -> anyhow::Result<Vec<Profile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let resp = self.profiles_of(ids).send().await?;
        check(resp)
            .await?
            .json()
            .await
            .context("parsing profile rows")
    }

    async fn fetch_comment(&self, id: &CommentId) -> anyhow::Result<Option<CommentRow>> {
        let resp = self
            .request(Method::GET, "comments")
            .query(&[("select", String::from("*")), ("id", eq_filter(&id.0))])
            .send()
            .await?;
        let rows: Vec<CommentRow> = check(resp)
            .await?
            .json()
            .await
            .context("parsing comment row")?;
        Ok(rows.into_iter().next())
    }

    async fn fetch_reply_ids(&self, parents: &[CommentId]) -> anyhow::Result<Vec<CommentId>> {
        if parents.is_empty() {
            return Ok(Vec::new());
        }
        let resp = self
            .request(Method::GET, "comments")
            .query(&[
                ("select", String::from("id")),
                (
                    "parent_id",
                    in_filter(parents.iter().map(|id| &id.0 as &str)),
                ),
            ])
            .send()
            .await?;
        let rows: Vec<IdRow> = check(resp)
            .await?
            .json()
            .await
            .context("parsing reply ids")?;
        Ok(rows.into_iter().map(|r| r.id).collect())
    }

    async fn submit_comment(&self, c: NewComment) -> anyhow::Result<CommentRow> {
        let resp = self.insert(&c)?.send().await?;
        let rows: Vec<CommentRow> = check(resp)
            .await?
            .json()
            .await
            .context("parsing inserted comment")?;
        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("backend did not return the inserted comment"))
    }

    async fn delete_comments(&self, ids: &[CommentId]) -> anyhow::Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let resp = self.delete(ids).send().await?;
        check(resp).await?;
        Ok(())
    }
}
