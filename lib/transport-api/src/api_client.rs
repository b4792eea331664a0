//! Typed client for the transport API endpoints.
//!
//! [`TransportApiClient`] turns each endpoint call into exactly one [`Request`],
//! hands it to its [`Executor`] and decodes the reply into an [`ApiResponse`]. It never
//! retries; retries, logging or rate limiting belong to the executor's pipeline.

use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tower::Layer;
use tower_service::Service;
use url::Url;

use crate::api_response::ApiResponse;
use crate::client::{BoxedService, Pipeline, PipelineBuilder};
use crate::middleware::{Logger, RateLimiter};
use crate::models::{
    AckMessageRequest, ActivateResult, Channel, ChannelRequest, DeleteMessageRequest,
    EditMessageRequest, FileUrl, HistoryMessageRequest, ListChannelsParams, MarkReadRequest,
    MarkReadUntilRequest, MessageResult, ReactionRequest, RestoreMessageRequest,
    SendMessageRequest, SuccessResult, Template, TemplateRequest, UploadFileByUrlRequest,
    UploadFileResult,
};
use crate::{
    Error, Executor, Method, Request, RequestBuilder, RequestContext, Response, Result,
    to_query_string,
};

/// Client of the transport API.
///
/// Wraps any [`Executor`] (usually a [`Pipeline`]) with the API base URL. Cloning is
/// as cheap as cloning the executor.
///
/// # Example
///
/// ```ignore
/// use transport_api::{RequestContext, TransportApiClient};
/// use transport_api::models::SendMessageRequest;
///
/// let client = TransportApiClient::builder("https://mg.example.com/api/transport/v1")
///     .with_logging()
///     .with_rate_limit(10.0, 5)?
///     .with_transport_token("my-token")?
///     .build()?;
///
/// let reply = client
///     .send_message(RequestContext::new(), &SendMessageRequest::default())
///     .await?;
/// if let Some(err) = reply.error() {
///     eprintln!("rejected: {err}");
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TransportApiClient<E = Pipeline> {
    executor: E,
    base_url: Url,
}

impl TransportApiClient {
    /// Start building a client over a [`Pipeline`].
    #[must_use]
    pub fn builder(base_url: impl Into<String>) -> TransportApiClientBuilder {
        TransportApiClientBuilder {
            base_url: base_url.into(),
            pipeline: Pipeline::builder(),
        }
    }
}

impl<E> TransportApiClient<E> {
    /// Create a client with the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn new(executor: E, base_url: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            executor,
            base_url: Url::parse(base_url.as_ref()).map_err(Error::InvalidUrl)?,
        })
    }

    /// Create a client with a pre-parsed URL.
    #[must_use]
    pub const fn with_url(executor: E, base_url: Url) -> Self {
        Self { executor, base_url }
    }

    /// Get a reference to the executor.
    #[must_use]
    pub const fn executor(&self) -> &E {
        &self.executor
    }

    /// Get the base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Consume the client and return the executor.
    #[must_use]
    pub fn into_inner(self) -> E {
        self.executor
    }

    /// URL of an endpoint: the base URL followed by `segments`, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                Error::invalid_request(format!("{} cannot be a base URL", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
        ctx: RequestContext,
    ) -> Result<RequestBuilder> {
        Ok(Request::builder(method, self.endpoint(segments)?).context(ctx))
    }
}

impl<E: Executor> TransportApiClient<E> {
    async fn send<T: DeserializeOwned>(&self, request: Request) -> Result<ApiResponse<T>> {
        let response = self.executor.execute(request).await?;
        ApiResponse::from_response(response)
    }

    async fn send_json<B, T>(
        &self,
        method: Method,
        segments: &[&str],
        ctx: RequestContext,
        body: &B,
    ) -> Result<ApiResponse<T>>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let request = self.request(method, segments, ctx)?.json(body)?.build();
        self.send(request).await
    }

    async fn send_raw<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        ctx: RequestContext,
        content_type: &str,
        body: Bytes,
    ) -> Result<ApiResponse<T>> {
        let request = self
            .request(method, segments, ctx)?
            .typed_body(content_type, body)?
            .build();
        self.send(request).await
    }

    // ========================================================================
    // Channels
    // ========================================================================

    /// `GET /channels`: list channels matching `params`.
    pub async fn list_channels(
        &self,
        ctx: RequestContext,
        params: &ListChannelsParams,
    ) -> Result<ApiResponse<Vec<Channel>>> {
        let query = to_query_string(params)?;
        let request = self
            .request(Method::GET, &["channels"], ctx)?
            .raw_query(&query)
            .build();
        self.send(request).await
    }

    /// `POST /channels`: activate a channel.
    pub async fn activate_channel(
        &self,
        ctx: RequestContext,
        body: &ChannelRequest,
    ) -> Result<ApiResponse<ActivateResult>> {
        self.send_json(Method::POST, &["channels"], ctx, body).await
    }

    /// `POST /channels` with a pre-encoded body.
    pub async fn activate_channel_with_body(
        &self,
        ctx: RequestContext,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<ApiResponse<ActivateResult>> {
        self.send_raw(Method::POST, &["channels"], ctx, content_type, body.into())
            .await
    }

    /// `DELETE /channels/{id}`: deactivate a channel.
    pub async fn deactivate_channel(
        &self,
        ctx: RequestContext,
        channel_id: i64,
    ) -> Result<ApiResponse<SuccessResult>> {
        let id = channel_id.to_string();
        let request = self
            .request(Method::DELETE, &["channels", id.as_str()], ctx)?
            .build();
        self.send(request).await
    }

    /// `PUT /channels/{id}`: update a channel.
    pub async fn update_channel(
        &self,
        ctx: RequestContext,
        channel_id: i64,
        body: &ChannelRequest,
    ) -> Result<ApiResponse<SuccessResult>> {
        let id = channel_id.to_string();
        self.send_json(Method::PUT, &["channels", id.as_str()], ctx, body).await
    }

    /// `PUT /channels/{id}` with a pre-encoded body.
    pub async fn update_channel_with_body(
        &self,
        ctx: RequestContext,
        channel_id: i64,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<ApiResponse<SuccessResult>> {
        let id = channel_id.to_string();
        self.send_raw(Method::PUT, &["channels", id.as_str()], ctx, content_type, body.into())
            .await
    }

    // ========================================================================
    // Templates
    // ========================================================================

    /// `POST /channels/{id}/templates`: activate a template on a channel.
    pub async fn activate_template(
        &self,
        ctx: RequestContext,
        channel_id: i64,
        body: &TemplateRequest,
    ) -> Result<ApiResponse<SuccessResult>> {
        let id = channel_id.to_string();
        self.send_json(Method::POST, &["channels", id.as_str(), "templates"], ctx, body)
            .await
    }

    /// `POST /channels/{id}/templates` with a pre-encoded body.
    pub async fn activate_template_with_body(
        &self,
        ctx: RequestContext,
        channel_id: i64,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<ApiResponse<SuccessResult>> {
        let id = channel_id.to_string();
        let segments = ["channels", id.as_str(), "templates"];
        self.send_raw(Method::POST, &segments, ctx, content_type, body.into())
            .await
    }

    /// `DELETE /channels/{id}/templates/{code}`: deactivate a template.
    pub async fn deactivate_template(
        &self,
        ctx: RequestContext,
        channel_id: i64,
        code: &str,
    ) -> Result<ApiResponse<SuccessResult>> {
        let id = channel_id.to_string();
        let request = self
            .request(Method::DELETE, &["channels", id.as_str(), "templates", code], ctx)?
            .build();
        self.send(request).await
    }

    /// `PUT /channels/{id}/templates/{code}`: update a template.
    pub async fn update_template(
        &self,
        ctx: RequestContext,
        channel_id: i64,
        code: &str,
        body: &TemplateRequest,
    ) -> Result<ApiResponse<SuccessResult>> {
        let id = channel_id.to_string();
        let segments = ["channels", id.as_str(), "templates", code];
        self.send_json(Method::PUT, &segments, ctx, body).await
    }

    /// `PUT /channels/{id}/templates/{code}` with a pre-encoded body.
    pub async fn update_template_with_body(
        &self,
        ctx: RequestContext,
        channel_id: i64,
        code: &str,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<ApiResponse<SuccessResult>> {
        let id = channel_id.to_string();
        let segments = ["channels", id.as_str(), "templates", code];
        self.send_raw(Method::PUT, &segments, ctx, content_type, body.into())
            .await
    }

    /// `GET /templates`: list the templates of every channel.
    pub async fn get_templates(&self, ctx: RequestContext) -> Result<ApiResponse<Vec<Template>>> {
        let request = self.request(Method::GET, &["templates"], ctx)?.build();
        self.send(request).await
    }

    // ========================================================================
    // Files
    // ========================================================================

    /// `POST /files/upload`: upload file content, typically `multipart/form-data`.
    pub async fn upload_file_with_body(
        &self,
        ctx: RequestContext,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<ApiResponse<UploadFileResult>> {
        self.send_raw(Method::POST, &["files", "upload"], ctx, content_type, body.into())
            .await
    }

    /// `POST /files/upload_by_url`: have the server fetch a file.
    pub async fn upload_file_by_url(
        &self,
        ctx: RequestContext,
        body: &UploadFileByUrlRequest,
    ) -> Result<ApiResponse<UploadFileResult>> {
        self.send_json(Method::POST, &["files", "upload_by_url"], ctx, body)
            .await
    }

    /// `POST /files/upload_by_url` with a pre-encoded body.
    pub async fn upload_file_by_url_with_body(
        &self,
        ctx: RequestContext,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<ApiResponse<UploadFileResult>> {
        let segments = ["files", "upload_by_url"];
        self.send_raw(Method::POST, &segments, ctx, content_type, body.into())
            .await
    }

    /// `GET /files/{id}`: download URL of an uploaded file.
    pub async fn get_file_url(
        &self,
        ctx: RequestContext,
        file_id: &str,
    ) -> Result<ApiResponse<FileUrl>> {
        let request = self
            .request(Method::GET, &["files", file_id], ctx)?
            .build();
        self.send(request).await
    }

    // ========================================================================
    // Messages
    // ========================================================================

    /// `POST /messages`: send a message.
    pub async fn send_message(
        &self,
        ctx: RequestContext,
        body: &SendMessageRequest,
    ) -> Result<ApiResponse<MessageResult>> {
        self.send_json(Method::POST, &["messages"], ctx, body).await
    }

    /// `POST /messages` with a pre-encoded body.
    pub async fn send_message_with_body(
        &self,
        ctx: RequestContext,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<ApiResponse<MessageResult>> {
        self.send_raw(Method::POST, &["messages"], ctx, content_type, body.into())
            .await
    }

    /// `PUT /messages`: edit a message.
    pub async fn edit_message(
        &self,
        ctx: RequestContext,
        body: &EditMessageRequest,
    ) -> Result<ApiResponse<SuccessResult>> {
        self.send_json(Method::PUT, &["messages"], ctx, body).await
    }

    /// `PUT /messages` with a pre-encoded body.
    pub async fn edit_message_with_body(
        &self,
        ctx: RequestContext,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<ApiResponse<SuccessResult>> {
        self.send_raw(Method::PUT, &["messages"], ctx, content_type, body.into())
            .await
    }

    /// `DELETE /messages`: delete a message.
    pub async fn delete_message(
        &self,
        ctx: RequestContext,
        body: &DeleteMessageRequest,
    ) -> Result<ApiResponse<SuccessResult>> {
        self.send_json(Method::DELETE, &["messages"], ctx, body).await
    }

    /// `DELETE /messages` with a pre-encoded body.
    pub async fn delete_message_with_body(
        &self,
        ctx: RequestContext,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<ApiResponse<SuccessResult>> {
        self.send_raw(Method::DELETE, &["messages"], ctx, content_type, body.into())
            .await
    }

    /// `POST /messages/ack`: acknowledge delivery of a message.
    pub async fn ack_message(
        &self,
        ctx: RequestContext,
        body: &AckMessageRequest,
    ) -> Result<ApiResponse<SuccessResult>> {
        self.send_json(Method::POST, &["messages", "ack"], ctx, body).await
    }

    /// `POST /messages/ack` with a pre-encoded body.
    pub async fn ack_message_with_body(
        &self,
        ctx: RequestContext,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<ApiResponse<SuccessResult>> {
        let segments = ["messages", "ack"];
        self.send_raw(Method::POST, &segments, ctx, content_type, body.into())
            .await
    }

    /// `POST /messages/history`: import a past message.
    pub async fn send_history_message(
        &self,
        ctx: RequestContext,
        body: &HistoryMessageRequest,
    ) -> Result<ApiResponse<MessageResult>> {
        self.send_json(Method::POST, &["messages", "history"], ctx, body)
            .await
    }

    /// `POST /messages/history` with a pre-encoded body.
    pub async fn send_history_message_with_body(
        &self,
        ctx: RequestContext,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<ApiResponse<MessageResult>> {
        let segments = ["messages", "history"];
        self.send_raw(Method::POST, &segments, ctx, content_type, body.into())
            .await
    }

    /// `POST /messages/reaction`: react to a message.
    pub async fn add_message_reaction(
        &self,
        ctx: RequestContext,
        body: &ReactionRequest,
    ) -> Result<ApiResponse<SuccessResult>> {
        self.send_json(Method::POST, &["messages", "reaction"], ctx, body)
            .await
    }

    /// `POST /messages/reaction` with a pre-encoded body.
    pub async fn add_message_reaction_with_body(
        &self,
        ctx: RequestContext,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<ApiResponse<SuccessResult>> {
        let segments = ["messages", "reaction"];
        self.send_raw(Method::POST, &segments, ctx, content_type, body.into())
            .await
    }

    /// `DELETE /messages/reaction`: remove a reaction.
    pub async fn delete_message_reaction(
        &self,
        ctx: RequestContext,
        body: &ReactionRequest,
    ) -> Result<ApiResponse<SuccessResult>> {
        self.send_json(Method::DELETE, &["messages", "reaction"], ctx, body)
            .await
    }

    /// `DELETE /messages/reaction` with a pre-encoded body.
    pub async fn delete_message_reaction_with_body(
        &self,
        ctx: RequestContext,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<ApiResponse<SuccessResult>> {
        let segments = ["messages", "reaction"];
        self.send_raw(Method::DELETE, &segments, ctx, content_type, body.into())
            .await
    }

    /// `POST /messages/read`: mark a message read.
    pub async fn mark_message_read(
        &self,
        ctx: RequestContext,
        body: &MarkReadRequest,
    ) -> Result<ApiResponse<SuccessResult>> {
        self.send_json(Method::POST, &["messages", "read"], ctx, body).await
    }

    /// `POST /messages/read` with a pre-encoded body.
    pub async fn mark_message_read_with_body(
        &self,
        ctx: RequestContext,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<ApiResponse<SuccessResult>> {
        let segments = ["messages", "read"];
        self.send_raw(Method::POST, &segments, ctx, content_type, body.into())
            .await
    }

    /// `POST /messages/read_until`: mark a chat read up to a message.
    pub async fn mark_messages_read_until(
        &self,
        ctx: RequestContext,
        body: &MarkReadUntilRequest,
    ) -> Result<ApiResponse<SuccessResult>> {
        self.send_json(Method::POST, &["messages", "read_until"], ctx, body)
            .await
    }

    /// `POST /messages/read_until` with a pre-encoded body.
    pub async fn mark_messages_read_until_with_body(
        &self,
        ctx: RequestContext,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<ApiResponse<SuccessResult>> {
        let segments = ["messages", "read_until"];
        self.send_raw(Method::POST, &segments, ctx, content_type, body.into())
            .await
    }

    /// `POST /messages/restore`: restore a deleted message.
    pub async fn restore_message(
        &self,
        ctx: RequestContext,
        body: &RestoreMessageRequest,
    ) -> Result<ApiResponse<SuccessResult>> {
        self.send_json(Method::POST, &["messages", "restore"], ctx, body)
            .await
    }

    /// `POST /messages/restore` with a pre-encoded body.
    pub async fn restore_message_with_body(
        &self,
        ctx: RequestContext,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<ApiResponse<SuccessResult>> {
        let segments = ["messages", "restore"];
        self.send_raw(Method::POST, &segments, ctx, content_type, body.into())
            .await
    }
}

/// Builder of a [`TransportApiClient`] over a [`Pipeline`].
///
/// Decorators are added in order, the first one outermost, exactly as with
/// [`PipelineBuilder`].
#[derive(Debug)]
pub struct TransportApiClientBuilder {
    base_url: String,
    pipeline: PipelineBuilder,
}

impl TransportApiClientBuilder {
    /// Set the request timeout of the base transport.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.pipeline = self.pipeline.timeout(timeout);
        self
    }

    /// Set the connection timeout of the base transport.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.pipeline = self.pipeline.connect_timeout(timeout);
        self
    }

    /// Set the default `User-Agent`.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.pipeline = self.pipeline.user_agent(user_agent);
        self
    }

    /// Add a Tower layer.
    #[must_use]
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<BoxedService> + Send + Sync + 'static,
        L::Service: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
        <L::Service as Service<Request>>::Future: Send,
    {
        self.pipeline = self.pipeline.layer(layer);
        self
    }

    /// Set the `X-Transport-Token` header on every request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if the token is not a legal header value.
    pub fn with_transport_token(mut self, token: impl AsRef<str>) -> Result<Self> {
        self.pipeline = self.pipeline.with_transport_token(token)?;
        Ok(self)
    }

    /// Log requests through `tracing`.
    #[must_use]
    pub fn with_logging(mut self) -> Self {
        self.pipeline = self.pipeline.with_logging();
        self
    }

    /// Log requests through a custom [`Logger`].
    #[must_use]
    pub fn with_logger<G: Logger>(mut self, logger: G) -> Self {
        self.pipeline = self.pipeline.with_logger(logger);
        self
    }

    /// Limit requests to `rate` per second, in bursts of up to `burst`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] on invalid `rate` or `burst`.
    pub fn with_rate_limit(mut self, rate: f64, burst: u32) -> Result<Self> {
        self.pipeline = self.pipeline.with_rate_limit(rate, burst)?;
        Ok(self)
    }

    /// Limit requests through a custom [`RateLimiter`].
    #[must_use]
    pub fn with_rate_limiter<L: RateLimiter>(mut self, limiter: L) -> Self {
        self.pipeline = self.pipeline.with_rate_limiter(limiter);
        self
    }

    /// Build the client over the HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the base URL cannot be parsed.
    pub fn build(self) -> Result<TransportApiClient> {
        TransportApiClient::new(self.pipeline.build(), &self.base_url)
    }

    /// Build the client over a custom base executor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the base URL cannot be parsed.
    pub fn build_with<S>(self, base: S) -> Result<TransportApiClient>
    where
        S: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
        S::Future: Send,
    {
        TransportApiClient::new(self.pipeline.build_with(base), &self.base_url)
    }
}
