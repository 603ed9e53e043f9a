use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use sluice_core::Message;
use sluice_transport::{BusConnection, TransportError};
use sluice_wire::account::AccountInfo;
use sluice_wire::consumer::ConsumerInfo;
use sluice_wire::stream::{StreamNames, StreamNamesRequest};
use sluice_wire::subjects;
use sluice_wire::{decode, encode, Response, SuccessResponse};
use tracing::debug;

use crate::error::Error;
use crate::scope::CancelScope;

/// Default wait for management API exchanges.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// Configuration for a streaming [`Context`].
#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub(crate) api_prefix: String,
    pub(crate) wait: Duration,
    pub(crate) direct_only: bool,
    pub(crate) scope: Option<CancelScope>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            api_prefix: subjects::DEFAULT_API_PREFIX.to_string(),
            wait: DEFAULT_WAIT,
            direct_only: false,
            scope: None,
        }
    }
}

impl ContextConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the API subject prefix. A trailing dot is appended
    /// when missing.
    pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.ends_with('.') {
            prefix.push('.');
        }
        self.api_prefix = prefix;
        self
    }

    /// Default wait for API exchanges and publish acknowledgments.
    pub fn wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Avoids the management API altogether. Subscriptions must then
    /// carry an explicit stream binding or deliver subject.
    pub fn direct_only(mut self) -> Self {
        self.direct_only = true;
        self
    }

    /// Scope raced against every management API exchange.
    pub fn cancel_scope(mut self, scope: CancelScope) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// Long-lived handle binding a bus connection to a streaming
/// configuration. Cheap to clone; immutable after construction.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    conn: Arc<dyn BusConnection>,
    config: ContextConfig,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Context {
    /// Binds a connection with the default configuration and probes
    /// the server for streaming support.
    pub async fn connect(conn: Arc<dyn BusConnection>) -> Result<Self, Error> {
        Self::with_config(conn, ContextConfig::default()).await
    }

    /// Binds a connection. Unless the configuration is direct-only,
    /// construction probes the account-info API; a probe that finds
    /// no responder fails with [`Error::NotEnabled`].
    pub async fn with_config(
        conn: Arc<dyn BusConnection>,
        config: ContextConfig,
    ) -> Result<Self, Error> {
        let context = Self {
            inner: Arc::new(ContextInner { conn, config }),
        };
        if !context.inner.config.direct_only {
            context.account_info().await?;
        }
        Ok(context)
    }

    pub(crate) fn conn(&self) -> &Arc<dyn BusConnection> {
        &self.inner.conn
    }

    pub(crate) fn wait(&self) -> Duration {
        self.inner.config.wait
    }

    pub(crate) fn is_direct(&self) -> bool {
        self.inner.config.direct_only
    }

    pub(crate) fn api_subject(&self, verb: &str) -> String {
        format!("{}{verb}", self.inner.config.api_prefix)
    }

    /// One management API exchange, bounded by the default wait and
    /// the context's cancel scope.
    pub(crate) async fn api_request(&self, verb: &str, payload: Bytes) -> Result<Message, Error> {
        let subject = self.api_subject(verb);
        let request = self.inner.conn.request(Message::new(subject, payload));
        let wait = self.inner.config.wait;
        match &self.inner.config.scope {
            Some(scope) if scope.is_cancelled() => Err(scope.cause()),
            Some(scope) => tokio::select! {
                result = tokio::time::timeout(wait, request) => match result {
                    Ok(reply) => Ok(reply?),
                    Err(_) => Err(Error::Timeout),
                },
                () = scope.cancelled() => Err(scope.cause()),
            },
            None => match tokio::time::timeout(wait, request).await {
                Ok(reply) => Ok(reply?),
                Err(_) => Err(Error::Timeout),
            },
        }
    }

    /// Streaming usage and limits for the account.
    pub async fn account_info(&self) -> Result<AccountInfo, Error> {
        let reply = self
            .api_request(subjects::ACCOUNT_INFO, Bytes::new())
            .await
            .map_err(not_enabled_on_no_responders)?;
        decode::<Response<AccountInfo>>(&reply.payload)?
            .into_result()
            .map_err(Error::Server)
    }

    /// Resolves the single stream bound to `subject`.
    pub(crate) async fn lookup_stream_by_subject(&self, subject: &str) -> Result<String, Error> {
        let request = encode(&StreamNamesRequest {
            subject: subject.to_string(),
        })?;
        let reply = self
            .api_request(subjects::STREAM_NAMES, request)
            .await
            .map_err(not_enabled_on_no_responders)?;
        let names = match decode::<Response<StreamNames>>(&reply.payload)? {
            Response::Err { .. } => return Err(Error::NoMatchingStream),
            Response::Ok(names) => names,
        };
        let mut streams = names.streams.unwrap_or_default();
        if streams.len() == 1 {
            Ok(streams.remove(0))
        } else {
            Err(Error::NoMatchingStream)
        }
    }

    /// Server-side state of a consumer.
    pub async fn consumer_info(&self, stream: &str, consumer: &str) -> Result<ConsumerInfo, Error> {
        let reply = self
            .api_request(&subjects::consumer_info(stream, consumer), Bytes::new())
            .await
            .map_err(not_enabled_on_no_responders)?;
        decode::<Response<ConsumerInfo>>(&reply.payload)?
            .into_result()
            .map_err(Error::Server)
    }

    pub(crate) async fn delete_consumer(&self, stream: &str, consumer: &str) -> Result<(), Error> {
        debug!(stream, consumer, "deleting consumer");
        let reply = self
            .api_request(&subjects::consumer_delete(stream, consumer), Bytes::new())
            .await?;
        decode::<Response<SuccessResponse>>(&reply.payload)?
            .into_result()
            .map_err(Error::Server)?;
        Ok(())
    }
}

/// A transport no-responders outcome on a management call means the
/// streaming layer is absent.
pub(crate) fn not_enabled_on_no_responders(err: Error) -> Error {
    match err {
        Error::Transport(TransportError::NoResponders) => Error::NotEnabled,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_transport::MemoryBus;

    #[test]
    fn api_prefix_gets_a_trailing_dot() {
        let config = ContextConfig::new().api_prefix("$CUSTOM.API");
        assert_eq!(config.api_prefix, "$CUSTOM.API.");
        let config = ContextConfig::new().api_prefix("$CUSTOM.API.");
        assert_eq!(config.api_prefix, "$CUSTOM.API.");
    }

    #[test]
    fn defaults_are_conservative() {
        let config = ContextConfig::default();
        assert_eq!(config.api_prefix, "$JS.API.");
        assert_eq!(config.wait, DEFAULT_WAIT);
        assert!(!config.direct_only);
    }

    #[tokio::test]
    async fn probe_without_responder_reports_not_enabled() {
        let bus = Arc::new(MemoryBus::new());
        let err = Context::connect(bus).await.expect_err("no server");
        assert!(matches!(err, Error::NotEnabled));
    }

    #[tokio::test]
    async fn direct_only_skips_the_probe() {
        let bus = Arc::new(MemoryBus::new());
        let context = Context::with_config(bus, ContextConfig::new().direct_only())
            .await
            .expect("no probe in direct mode");
        assert!(context.is_direct());
    }

    #[tokio::test]
    async fn api_subject_prepends_the_prefix() {
        let bus = Arc::new(MemoryBus::new());
        let context = Context::with_config(bus, ContextConfig::new().direct_only())
            .await
            .expect("context");
        assert_eq!(context.api_subject("INFO"), "$JS.API.INFO");
    }
}
