//! HTTP client and configuration.

use crate::decode::{decode, Entity};
use crate::entities::Empty;
use crate::error::{ClientError, DecodeError, InvalidHeaderError};
use crate::page::{Page, Range};
use crate::sse::{consume_stream_with_buffer, CancelSignal, EventStream, DEFAULT_STREAM_BUFFER};
use http::header::{ACCEPT, LINK};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use std::time::Duration;
use tracing::{debug, warn};

/// Streaming endpoints
pub(crate) const PATH_USER_STREAM: &str = "/api/v1/streaming/user";
pub(crate) const PATH_PUBLIC_STREAM: &str = "/api/v1/streaming/public";
pub(crate) const PATH_HASHTAG_STREAM: &str = "/api/v1/streaming/hashtag";

const EVENT_STREAM: &str = "text/event-stream";

/// A client bound to one server and one access token.
///
/// The client is cloneable and can be shared across tasks; clones share
/// the connection pool. Host and token are fixed at construction.
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: reqwest::Client,
    pub(crate) base_url: String,
    stream_url: Option<String>,
    access_token: Option<String>,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
    stream_buffer: usize,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("stream_url", &self.stream_url)
            .field("has_access_token", &self.access_token.is_some())
            .field("default_headers", &self.default_headers)
            .field("timeout", &self.timeout)
            .field("stream_buffer", &self.stream_buffer)
            .finish()
    }
}

impl Client {
    /// Create a client for `https://{host}` authenticating with `access_token`.
    pub fn new(host: &str, access_token: impl Into<String>) -> Result<Self, ClientError> {
        ClientBuilder::new()
            .host(host)
            .access_token(access_token)
            .build()
    }

    /// Create a client builder for customization.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch a single object.
    pub async fn get<T: Entity>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self.send(self.request(Method::GET, path)).await?;
        entity_from_response(resp).await
    }

    /// Post a form and decode the single-object answer.
    pub async fn post<T: Entity>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let req = self.request(Method::POST, path).form(form);
        let resp = self.send(req).await?;
        entity_from_response(resp).await
    }

    /// Patch with a form and decode the single-object answer.
    pub async fn patch<T: Entity>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let req = self.request(Method::PATCH, path).form(form);
        let resp = self.send(req).await?;
        entity_from_response(resp).await
    }

    /// Upload `bytes` as the multipart `file` field, e.g. to `/api/v1/media`
    /// which answers with an [`Attachment`](crate::Attachment).
    pub async fn post_media<T: Entity>(
        &self,
        path: &str,
        bytes: impl Into<Vec<u8>>,
        file_name: &str,
    ) -> Result<T, ClientError> {
        let part = Part::bytes(bytes.into()).file_name(file_name.to_string());
        let form = Form::new().part("file", part);
        let req = self.request(Method::POST, path).multipart(form);
        let resp = self.send(req).await?;
        entity_from_response(resp).await
    }

    /// Delete a resource. Most such endpoints answer with `{}`, see [`Empty`].
    pub async fn delete<T: Entity>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self.send(self.request(Method::DELETE, path)).await?;
        entity_from_response(resp).await
    }

    /// Fetch one page of a list endpoint.
    ///
    /// The cursors come from the `Link` header; see [`Page::next_range`]
    /// to request the following page.
    pub async fn get_page<T: Entity>(
        &self,
        path: &str,
        range: &Range,
    ) -> Result<Page<T>, ClientError> {
        let req = self.request(Method::GET, path).query(&range.to_query());
        let resp = self.send(req).await?;

        let status = resp.status();
        let url = resp.url().to_string();
        let link = resp
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(rejection(status.as_u16(), url, &body));
        }

        Ok(Page::from_response(&body, link.as_deref())?)
    }

    /// Open a streaming connection and consume it.
    ///
    /// The connection goes to the streaming URL if one was configured, to
    /// the base URL otherwise. The returned stream yields events until the
    /// server closes the connection, `cancel` fires, or an error occurs.
    pub async fn stream(
        &self,
        path: &str,
        cancel: CancelSignal,
    ) -> Result<EventStream, ClientError> {
        self.stream_with_query(path, &[], cancel).await
    }

    /// Stream the authenticated user's home timeline and notifications.
    pub async fn user_stream(&self, cancel: CancelSignal) -> Result<EventStream, ClientError> {
        self.stream_with_query(PATH_USER_STREAM, &[], cancel).await
    }

    /// Stream the public timeline, optionally only this server's statuses.
    pub async fn public_stream(
        &self,
        local: bool,
        cancel: CancelSignal,
    ) -> Result<EventStream, ClientError> {
        let mut query = Vec::new();
        if local {
            query.push(("local", "true".to_string()));
        }
        self.stream_with_query(PATH_PUBLIC_STREAM, &query, cancel)
            .await
    }

    /// Stream statuses carrying `tag` (without the leading `#`).
    pub async fn hashtag_stream(
        &self,
        tag: &str,
        local: bool,
        cancel: CancelSignal,
    ) -> Result<EventStream, ClientError> {
        let mut query = vec![("tag", tag.trim_start_matches('#').to_string())];
        if local {
            query.push(("local", "true".to_string()));
        }
        self.stream_with_query(PATH_HASHTAG_STREAM, &query, cancel)
            .await
    }

    async fn stream_with_query(
        &self,
        path: &str,
        query: &[(&str, String)],
        cancel: CancelSignal,
    ) -> Result<EventStream, ClientError> {
        let url = join_url(self.stream_url(), path);
        let mut req = self
            .request_url(Method::GET, url)
            .header(ACCEPT, EVENT_STREAM);
        if !query.is_empty() {
            req = req.query(query);
        }

        // No timeout here: the connection is meant to stay open.
        let resp = req.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let url = resp.url().to_string();
            let body = resp.text().await?;
            return Err(rejection(status.as_u16(), url, &body));
        }

        debug!(url = %resp.url(), "stream opened");
        Ok(consume_stream_with_buffer(
            resp.bytes_stream(),
            cancel,
            self.stream_buffer,
        ))
    }

    /// Base URL streaming connections are opened against.
    pub fn stream_url(&self) -> &str {
        self.stream_url.as_deref().unwrap_or(&self.base_url)
    }

    /// Resolve a path against the base URL. Full URLs are kept as is.
    pub(crate) fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_url(method, self.url(path))
    }

    fn request_url(&self, method: Method, url: String) -> RequestBuilder {
        debug!(%method, %url, "request");

        let mut req = self
            .inner
            .request(method, &url)
            .headers(self.default_headers.clone());
        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn send(&self, mut req: RequestBuilder) -> Result<Response, ClientError> {
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        Ok(req.send().await?)
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        format!("{}{}", base.trim_end_matches('/'), path)
    }
}

async fn entity_from_response<T: Entity>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    let url = resp.url().to_string();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(rejection(status.as_u16(), url, &body));
    }

    Ok(decode(&body)?)
}

/// Error for a non-success response: the server's error object if the body
/// is one, the bare status otherwise.
fn rejection(status: u16, url: String, body: &str) -> ClientError {
    match decode::<Empty>(body) {
        Err(DecodeError::Api(err)) => ClientError::Decode(DecodeError::Api(err)),
        _ => ClientError::Http { status, url },
    }
}

/// Builder for configuring a Client.
#[must_use = "builders do nothing unless you call .build()"]
pub struct ClientBuilder {
    base_url: Option<String>,
    stream_url: Option<String>,
    access_token: Option<String>,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
    stream_buffer: usize,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self {
            base_url: None,
            stream_url: None,
            access_token: None,
            default_headers: HeaderMap::new(),
            timeout: None,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }

    /// Set the base URL, e.g. `https://mastodon.social`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the server host name; requests go to `https://{host}`.
    pub fn host(self, host: &str) -> Self {
        let host = host.trim_end_matches('/');
        self.base_url(format!("https://{}", host))
    }

    /// Set a separate base URL for streaming connections.
    ///
    /// Some servers serve the streaming API from its own subdomain. REST
    /// requests keep going to the base URL.
    pub fn stream_url(mut self, url: impl Into<String>) -> Self {
        self.stream_url = Some(url.into());
        self
    }

    /// Set the streaming host name; streams go to `https://{host}`.
    pub fn stream_host(self, host: &str) -> Self {
        let host = host.trim_end_matches('/');
        self.stream_url(format!("https://{}", host))
    }

    /// Set the access token sent as a bearer token.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Send a header with every request and stream, e.g. `user-agent`.
    ///
    /// A header that is not valid HTTP is dropped with a warning; see
    /// [`try_default_header`](Self::try_default_header).
    pub fn default_header(mut self, key: &str, value: &str) -> Self {
        match header_pair(key, value) {
            Ok((name, val)) => {
                self.default_headers.insert(name, val);
            }
            Err(err) => warn!(error = %err, "default header dropped"),
        }
        self
    }

    /// Like [`default_header`](Self::default_header), but an invalid
    /// header is an error.
    pub fn try_default_header(mut self, key: &str, value: &str) -> Result<Self, InvalidHeaderError> {
        let (name, val) = header_pair(key, value)?;
        self.default_headers.insert(name, val);
        Ok(self)
    }

    /// Replace every header added so far. The bearer token is not part of
    /// these and stays in place.
    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = headers;
        self
    }

    /// Set the timeout for REST requests. Streaming connections never time out.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set how many stream events may queue up before reading pauses.
    pub fn stream_buffer(mut self, events: usize) -> Self {
        self.stream_buffer = events.max(1);
        self
    }

    /// Build the client.
    ///
    /// Fails if no base URL or host was set, if it is not a valid URL, or
    /// if the underlying HTTP client fails to build.
    pub fn build(self) -> Result<Client, ClientError> {
        let base_url = self.base_url.unwrap_or_default();
        url::Url::parse(&base_url)?;
        if let Some(stream_url) = &self.stream_url {
            url::Url::parse(stream_url)?;
        }

        let inner = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Client {
            inner,
            base_url,
            stream_url: self.stream_url,
            access_token: self.access_token,
            default_headers: self.default_headers,
            timeout: self.timeout,
            stream_buffer: self.stream_buffer,
        })
    }
}

fn header_pair(key: &str, value: &str) -> Result<(HeaderName, HeaderValue), InvalidHeaderError> {
    let name = HeaderName::from_bytes(key.as_bytes())
        .map_err(|_| InvalidHeaderError::InvalidName(key.to_string()))?;
    let val = HeaderValue::from_str(value)
        .map_err(|_| InvalidHeaderError::InvalidValue(value.to_string()))?;
    Ok((name, val))
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
