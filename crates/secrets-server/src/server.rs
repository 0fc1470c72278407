use std::sync::Arc;

use async_nats::{HeaderMap, Message};
use bytes::Bytes;
use futures::StreamExt;
use nkeys::XKey;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    GetSecretError, SecretRequest, SecretResponse, SecretsHandler, ServerError, SubjectMapper,
    DEFAULT_SECRETS_BUS_PREFIX, DEFAULT_SECRETS_PROTOCOL_VERSION, RESPONSE_XKEY,
    WASMCLOUD_HOST_XKEY,
};

/// Callback invoked once for every request that fails, with the inbound
/// message and the error that was (or will be) reported to the caller.
pub type ErrorCallback = dyn Fn(&Message, &GetSecretError) + Send + Sync;

/// Produces the cancellation context handed to the handler for each request.
pub type ContextFactory = dyn Fn() -> CancellationToken + Send + Sync;

struct Shutdown {
    drain: bool,
    done: oneshot::Sender<()>,
}

/// Configuration record for a [`Server`].
///
/// A server needs a service name, a NATS connection, a handler, and a curve
/// key pair; everything else has defaults. [`ServerBuilder::build`] fails
/// with [`ServerError::InvalidServerConfig`] when a required piece is
/// missing.
#[derive(Default)]
pub struct ServerBuilder {
    name: Option<String>,
    client: Option<async_nats::Client>,
    handler: Option<Arc<dyn SecretsHandler>>,
    key: Option<XKey>,
    mapper: Option<SubjectMapper>,
    on_error: Option<Arc<ErrorCallback>>,
    context_factory: Option<Arc<ContextFactory>>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The service name, used as the last segment of the subject space.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn client(mut self, client: async_nats::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn handler(mut self, handler: impl SecretsHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Use an existing curve key pair. The key must be able to decrypt, so
    /// it has to carry its seed, not just the public half.
    pub fn key_pair(mut self, key: XKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Create a fresh curve key pair for the lifetime of this server.
    /// Callers lose access to previously sealed payloads on restart.
    pub fn ephemeral_key(mut self) -> Self {
        self.key = Some(XKey::new());
        self
    }

    /// Override the subject mapper, e.g. to run against a test prefix.
    pub fn subject_mapper(mut self, mapper: SubjectMapper) -> Self {
        self.mapper = Some(mapper);
        self
    }

    pub fn error_callback(
        mut self,
        callback: impl Fn(&Message, &GetSecretError) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn context_factory(
        mut self,
        factory: impl Fn() -> CancellationToken + Send + Sync + 'static,
    ) -> Self {
        self.context_factory = Some(Arc::new(factory));
        self
    }

    pub fn build(self) -> Result<Server, ServerError> {
        let name = match self.name {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(ServerError::InvalidServerConfig(
                    "missing service name".to_string(),
                ))
            }
        };
        let client = self.client.ok_or_else(|| {
            ServerError::InvalidServerConfig("missing nats connection".to_string())
        })?;
        let handler = self
            .handler
            .ok_or_else(|| ServerError::InvalidServerConfig("missing handler".to_string()))?;
        let key = self
            .key
            .ok_or_else(|| ServerError::InvalidServerConfig("missing key pair".to_string()))?;

        let mapper = self.mapper.unwrap_or_else(|| {
            SubjectMapper::new(
                DEFAULT_SECRETS_BUS_PREFIX,
                DEFAULT_SECRETS_PROTOCOL_VERSION,
                &name,
            )
        });

        Ok(Server {
            client,
            dispatcher: Arc::new(Dispatcher {
                public_key: key.public_key(),
                key,
                mapper,
                handler,
                on_error: self.on_error.unwrap_or_else(|| Arc::new(|_, _| {})),
                context_factory: self
                    .context_factory
                    .unwrap_or_else(|| Arc::new(CancellationToken::new)),
            }),
            control: Mutex::new(None),
        })
    }
}

/// A running (or startable) secrets protocol server.
///
/// The server joins the queue group for its service so that each request is
/// handled by exactly one replica, and processes the messages of one replica
/// concurrently on their own tasks.
pub struct Server {
    client: async_nats::Client,
    dispatcher: Arc<Dispatcher>,
    control: Mutex<Option<mpsc::Sender<Shutdown>>>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// The server's public curve key. Stable for the lifetime of the
    /// process; returned verbatim by the `server_xkey` operation.
    pub fn public_key(&self) -> &str {
        &self.dispatcher.public_key
    }

    /// Installs the queue subscription and starts consuming requests in the
    /// background. Calling `run` on a server that is already running is a
    /// no-op.
    pub async fn run(&self) -> Result<(), ServerError> {
        let mut control = self.control.lock().await;
        if control.is_some() {
            return Ok(());
        }

        let subject = self.dispatcher.mapper.secrets_wildcard_subject();
        let queue = self.dispatcher.mapper.queue_group_name();
        let mut sub = self
            .client
            .queue_subscribe(subject.clone(), queue.clone())
            .await?;
        info!(subject, queue, "starting secrets backend listener");

        let (tx, mut rx) = mpsc::channel::<Shutdown>(1);
        *control = Some(tx);

        let client = self.client.clone();
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            // Once draining (or with the server gone) only the subscription
            // side can end the loop.
            let mut detached = false;
            loop {
                tokio::select! {
                    cmd = rx.recv(), if !detached => match cmd {
                        Some(Shutdown { drain: false, done }) => {
                            if let Err(err) = sub.unsubscribe().await {
                                error!(%err, "failed to unsubscribe");
                            }
                            let _ = done.send(());
                            break;
                        }
                        Some(Shutdown { drain: true, done }) => {
                            if let Err(err) = sub.drain().await {
                                error!(%err, "failed to drain subscription");
                            }
                            detached = true;
                            let _ = done.send(());
                        }
                        None => detached = true,
                    },
                    msg = sub.next() => match msg {
                        Some(msg) => {
                            let client = client.clone();
                            let dispatcher = Arc::clone(&dispatcher);
                            tokio::spawn(async move {
                                dispatcher.process(&client, msg).await;
                            });
                        }
                        None => break,
                    },
                }
            }
            debug!("secrets backend listener stopped");
        });

        Ok(())
    }

    /// Stops consuming requests. With `drain` set, messages already
    /// delivered to this replica are still processed before the
    /// subscription closes; otherwise they are dropped immediately.
    /// Shutting down a server that is not running is a no-op.
    pub async fn shutdown(&self, drain: bool) {
        let Some(tx) = self.control.lock().await.take() else {
            return;
        };
        let (done, ack) = oneshot::channel();
        if tx.send(Shutdown { drain, done }).await.is_ok() {
            let _ = ack.await;
        }
    }
}

#[derive(Debug)]
struct Reply {
    headers: Option<HeaderMap>,
    payload: Bytes,
}

/// The per-message state machine, independent of the bus plumbing so it can
/// be exercised directly.
struct Dispatcher {
    key: XKey,
    public_key: String,
    mapper: SubjectMapper,
    handler: Arc<dyn SecretsHandler>,
    on_error: Arc<ErrorCallback>,
    context_factory: Arc<ContextFactory>,
}

impl Dispatcher {
    async fn process(&self, client: &async_nats::Client, msg: Message) {
        let Some(reply) = msg.reply.clone() else {
            debug!(subject = %msg.subject, "dropping message without reply subject");
            return;
        };

        match self
            .dispatch(&msg.subject, msg.headers.as_ref(), &msg.payload)
            .await
        {
            Ok(Reply { headers, payload }) => {
                let published = match headers {
                    Some(headers) => client.publish_with_headers(reply, headers, payload).await,
                    None => client.publish(reply, payload).await,
                };
                if let Err(err) = published {
                    (self.on_error)(
                        &msg,
                        &GetSecretError::Other(format!("failed to respond: {err}")),
                    );
                }
            }
            Err(err) => {
                (self.on_error)(&msg, &err);
                let body = match Bytes::try_from(SecretResponse::from(err)) {
                    Ok(body) => body,
                    Err(err) => {
                        error!(%err, "failed to encode error response");
                        return;
                    }
                };
                if let Err(err) = client.publish(reply, body).await {
                    error!(%err, "failed to publish error response");
                }
            }
        }
    }

    async fn dispatch(
        &self,
        subject: &str,
        headers: Option<&HeaderMap>,
        payload: &[u8],
    ) -> Result<Reply, GetSecretError> {
        match self.mapper.parse_operation(subject) {
            "get" => self.get(headers, payload).await,
            "server_xkey" => Ok(Reply {
                headers: None,
                payload: Bytes::from(self.public_key.clone()),
            }),
            _ => Err(GetSecretError::InvalidRequest),
        }
    }

    async fn get(
        &self,
        headers: Option<&HeaderMap>,
        payload: &[u8],
    ) -> Result<Reply, GetSecretError> {
        let host_key = headers
            .and_then(|headers| headers.get(WASMCLOUD_HOST_XKEY))
            .filter(|key| !key.as_str().is_empty())
            .ok_or(GetSecretError::InvalidHeaders)?;
        // A header that doesn't even parse as a public key can't have
        // sealed the payload.
        let host_key = XKey::from_public_key(host_key.as_str())
            .map_err(|_| GetSecretError::DecryptionError)?;

        let request = self
            .key
            .open(payload, &host_key)
            .map_err(|_| GetSecretError::DecryptionError)?;
        let request: SecretRequest =
            serde_json::from_slice(&request).map_err(|_| GetSecretError::InvalidPayload)?;

        request.context.valid_claims()?;

        let ctx = (self.context_factory)();
        let secret = tokio::select! {
            secret = self.handler.get(&ctx, &request) => {
                secret.map_err(|err| match err.downcast::<GetSecretError>() {
                    Ok(err) => err,
                    Err(err) => GetSecretError::UpstreamError(err.to_string()),
                })?
            }
            () = ctx.cancelled() => {
                return Err(GetSecretError::UpstreamError(
                    "request context cancelled".to_string(),
                ));
            }
        };

        // Fresh sender key per response: the reply stays confidential even
        // if the server's long-term key leaks later.
        let response_key = XKey::new();
        let body: Bytes = SecretResponse {
            secret: Some(secret),
            ..Default::default()
        }
        .try_into()
        .map_err(|_| GetSecretError::InvalidPayload)?;
        let sealed = response_key
            .seal(&body, &host_key)
            .map_err(|_| GetSecretError::EncryptionError)?;

        let mut headers = HeaderMap::new();
        headers.insert(RESPONSE_XKEY, response_key.public_key().as_str());
        Ok(Reply {
            headers: Some(headers),
            payload: sealed.into(),
        })
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use nkeys::KeyPair;
    use wascap::jwt::{ClaimsBuilder, Component, Host};

    use super::*;
    use crate::{Context, SecretValue};

    struct TestHandler<F>(F);

    #[async_trait::async_trait]
    impl<F> SecretsHandler for TestHandler<F>
    where
        F: Fn(&SecretRequest) -> anyhow::Result<SecretValue> + Send + Sync,
    {
        async fn get(
            &self,
            _ctx: &CancellationToken,
            request: &SecretRequest,
        ) -> anyhow::Result<SecretValue> {
            (self.0)(request)
        }
    }

    struct PendingHandler;

    #[async_trait::async_trait]
    impl SecretsHandler for PendingHandler {
        async fn get(
            &self,
            _ctx: &CancellationToken,
            _request: &SecretRequest,
        ) -> anyhow::Result<SecretValue> {
            std::future::pending().await
        }
    }

    fn dispatcher(handler: impl SecretsHandler + 'static) -> Dispatcher {
        let key = XKey::new();
        Dispatcher {
            public_key: key.public_key(),
            key,
            mapper: SubjectMapper::new(
                DEFAULT_SECRETS_BUS_PREFIX,
                DEFAULT_SECRETS_PROTOCOL_VERSION,
                "kube",
            ),
            handler: Arc::new(handler),
            on_error: Arc::new(|_, _| {}),
            context_factory: Arc::new(CancellationToken::new),
        }
    }

    fn request_context() -> Context {
        let account = KeyPair::new_account();
        let component_key = KeyPair::new_module();
        let host_key = KeyPair::new_server();

        let entity_jwt = ClaimsBuilder::new()
            .issuer(&account.public_key())
            .subject(&component_key.public_key())
            .with_metadata(Component::default())
            .build()
            .encode(&account)
            .unwrap();
        let host_jwt: String = ClaimsBuilder::new()
            .issuer(&account.public_key())
            .subject(&host_key.public_key())
            .with_metadata(Host::new("test".to_string(), HashMap::new()))
            .build()
            .encode(&account)
            .unwrap();

        Context {
            application: None,
            entity_jwt,
            host_jwt,
        }
    }

    fn sealed_get(
        dispatcher: &Dispatcher,
        caller: &XKey,
        request: &SecretRequest,
    ) -> (String, HeaderMap, Vec<u8>) {
        let raw = serde_json::to_vec(request).unwrap();
        let sealed = caller
            .seal(&raw, &XKey::from_public_key(&dispatcher.public_key).unwrap())
            .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(WASMCLOUD_HOST_XKEY, caller.public_key().as_str());
        let subject = format!("{}.get", dispatcher.mapper.secrets_subject());
        (subject, headers, sealed)
    }

    fn open_reply(caller: &XKey, reply: &Reply) -> SecretResponse {
        let headers = reply.headers.as_ref().expect("missing encryption header");
        let response_key =
            XKey::from_public_key(headers.get(RESPONSE_XKEY).unwrap().as_str()).unwrap();
        let opened = caller.open(&reply.payload, &response_key).unwrap();
        serde_json::from_slice(&opened).unwrap()
    }

    #[tokio::test]
    async fn get_happy_path() {
        let dispatcher = dispatcher(TestHandler(|_: &SecretRequest| {
            Ok(SecretValue {
                string_secret: Some("value".to_string()),
                ..Default::default()
            })
        }));
        let caller = XKey::new();
        let request = SecretRequest {
            key: "secret".to_string(),
            context: request_context(),
            ..Default::default()
        };

        let (subject, headers, sealed) = sealed_get(&dispatcher, &caller, &request);
        let reply = dispatcher
            .dispatch(&subject, Some(&headers), &sealed)
            .await
            .unwrap();

        let response = open_reply(&caller, &reply);
        assert!(response.error.is_none());
        assert_eq!(
            response.secret.unwrap().string_secret.unwrap(),
            "value".to_string()
        );
    }

    #[tokio::test]
    async fn get_without_header_is_rejected() {
        let dispatcher = dispatcher(TestHandler(|_: &SecretRequest| {
            Ok(SecretValue::default())
        }));
        let subject = format!("{}.get", dispatcher.mapper.secrets_subject());

        let err = dispatcher
            .dispatch(&subject, None, b"sealed")
            .await
            .unwrap_err();
        assert_eq!(err, GetSecretError::InvalidHeaders);

        let err = dispatcher
            .dispatch(&subject, Some(&HeaderMap::new()), b"sealed")
            .await
            .unwrap_err();
        assert_eq!(err, GetSecretError::InvalidHeaders);

        let mut empty = HeaderMap::new();
        empty.insert(WASMCLOUD_HOST_XKEY, "");
        let err = dispatcher
            .dispatch(&subject, Some(&empty), b"sealed")
            .await
            .unwrap_err();
        assert_eq!(err, GetSecretError::InvalidHeaders);
    }

    #[tokio::test]
    async fn get_with_bad_sender_key_is_rejected() {
        let dispatcher = dispatcher(TestHandler(|_: &SecretRequest| {
            Ok(SecretValue::default())
        }));
        let caller = XKey::new();
        let request = SecretRequest {
            key: "secret".to_string(),
            context: request_context(),
            ..Default::default()
        };
        let (subject, _, sealed) = sealed_get(&dispatcher, &caller, &request);

        // Not a key at all
        let mut headers = HeaderMap::new();
        headers.insert(WASMCLOUD_HOST_XKEY, "badkey");
        let err = dispatcher
            .dispatch(&subject, Some(&headers), &sealed)
            .await
            .unwrap_err();
        assert_eq!(err, GetSecretError::DecryptionError);

        // A valid key that didn't seal the payload
        let mut headers = HeaderMap::new();
        headers.insert(WASMCLOUD_HOST_XKEY, XKey::new().public_key().as_str());
        let err = dispatcher
            .dispatch(&subject, Some(&headers), &sealed)
            .await
            .unwrap_err();
        assert_eq!(err, GetSecretError::DecryptionError);
    }

    #[tokio::test]
    async fn get_with_undecryptable_body_is_rejected() {
        let dispatcher = dispatcher(TestHandler(|_: &SecretRequest| {
            Ok(SecretValue::default())
        }));
        let caller = XKey::new();
        let subject = format!("{}.get", dispatcher.mapper.secrets_subject());
        let mut headers = HeaderMap::new();
        headers.insert(WASMCLOUD_HOST_XKEY, caller.public_key().as_str());

        let err = dispatcher
            .dispatch(&subject, Some(&headers), b"plaintext")
            .await
            .unwrap_err();
        assert_eq!(err, GetSecretError::DecryptionError);
    }

    #[tokio::test]
    async fn get_with_non_json_plaintext_is_rejected() {
        let dispatcher = dispatcher(TestHandler(|_: &SecretRequest| {
            Ok(SecretValue::default())
        }));
        let caller = XKey::new();
        let subject = format!("{}.get", dispatcher.mapper.secrets_subject());
        let sealed = caller
            .seal(
                b"not json",
                &XKey::from_public_key(&dispatcher.public_key).unwrap(),
            )
            .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(WASMCLOUD_HOST_XKEY, caller.public_key().as_str());

        let err = dispatcher
            .dispatch(&subject, Some(&headers), &sealed)
            .await
            .unwrap_err();
        assert_eq!(err, GetSecretError::InvalidPayload);
    }

    #[tokio::test]
    async fn get_with_invalid_entity_jwt_is_rejected() {
        let dispatcher = dispatcher(TestHandler(|_: &SecretRequest| {
            Ok(SecretValue::default())
        }));
        let caller = XKey::new();
        let mut context = request_context();
        context.entity_jwt = "not.a.jwt".to_string();
        let request = SecretRequest {
            key: "secret".to_string(),
            context,
            ..Default::default()
        };

        let (subject, headers, sealed) = sealed_get(&dispatcher, &caller, &request);
        let err = dispatcher
            .dispatch(&subject, Some(&headers), &sealed)
            .await
            .unwrap_err();
        assert!(matches!(err, GetSecretError::InvalidEntityJWT(_)));
    }

    #[tokio::test]
    async fn handler_errors_keep_their_kind() {
        let dispatcher = dispatcher(TestHandler(|_: &SecretRequest| {
            Err(GetSecretError::SecretNotFound.into())
        }));
        let caller = XKey::new();
        let request = SecretRequest {
            key: "missing".to_string(),
            context: request_context(),
            ..Default::default()
        };

        let (subject, headers, sealed) = sealed_get(&dispatcher, &caller, &request);
        let err = dispatcher
            .dispatch(&subject, Some(&headers), &sealed)
            .await
            .unwrap_err();
        assert_eq!(err, GetSecretError::SecretNotFound);
    }

    #[tokio::test]
    async fn untagged_handler_errors_become_upstream_errors() {
        let dispatcher = dispatcher(TestHandler(|_: &SecretRequest| {
            Err(anyhow::anyhow!("boom"))
        }));
        let caller = XKey::new();
        let request = SecretRequest {
            key: "secret".to_string(),
            context: request_context(),
            ..Default::default()
        };

        let (subject, headers, sealed) = sealed_get(&dispatcher, &caller, &request);
        let err = dispatcher
            .dispatch(&subject, Some(&headers), &sealed)
            .await
            .unwrap_err();
        assert_eq!(err, GetSecretError::UpstreamError("boom".to_string()));
    }

    #[tokio::test]
    async fn cancelled_context_still_gets_a_reply() {
        let mut dispatcher = dispatcher(PendingHandler);
        dispatcher.context_factory = Arc::new(|| {
            let ctx = CancellationToken::new();
            ctx.cancel();
            ctx
        });
        let caller = XKey::new();
        let request = SecretRequest {
            key: "secret".to_string(),
            context: request_context(),
            ..Default::default()
        };

        let (subject, headers, sealed) = sealed_get(&dispatcher, &caller, &request);
        let err = dispatcher
            .dispatch(&subject, Some(&headers), &sealed)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GetSecretError::UpstreamError("request context cancelled".to_string())
        );
    }

    #[tokio::test]
    async fn server_xkey_is_stable() {
        let dispatcher = dispatcher(TestHandler(|_: &SecretRequest| {
            Ok(SecretValue::default())
        }));
        let subject = format!("{}.server_xkey", dispatcher.mapper.secrets_subject());

        let first = dispatcher.dispatch(&subject, None, b"").await.unwrap();
        let second = dispatcher.dispatch(&subject, None, b"").await.unwrap();

        assert!(first.headers.is_none());
        assert_eq!(first.payload, second.payload);
        assert_eq!(first.payload, Bytes::from(dispatcher.public_key.clone()));
    }

    #[tokio::test]
    async fn response_keys_are_fresh_per_reply() {
        let dispatcher = dispatcher(TestHandler(|_: &SecretRequest| {
            Ok(SecretValue {
                string_secret: Some("value".to_string()),
                ..Default::default()
            })
        }));
        let caller = XKey::new();
        let request = SecretRequest {
            key: "secret".to_string(),
            context: request_context(),
            ..Default::default()
        };

        let (subject, headers, sealed) = sealed_get(&dispatcher, &caller, &request);
        let first = dispatcher
            .dispatch(&subject, Some(&headers), &sealed)
            .await
            .unwrap();
        let second = dispatcher
            .dispatch(&subject, Some(&headers), &sealed)
            .await
            .unwrap();

        let key = |reply: &Reply| {
            reply
                .headers
                .as_ref()
                .unwrap()
                .get(RESPONSE_XKEY)
                .unwrap()
                .as_str()
                .to_string()
        };
        assert_ne!(key(&first), key(&second));

        // Both decrypt under their own header key
        assert_eq!(
            open_reply(&caller, &first).secret.unwrap().string_secret,
            Some("value".to_string())
        );
        assert_eq!(
            open_reply(&caller, &second).secret.unwrap().string_secret,
            Some("value".to_string())
        );
    }

    #[tokio::test]
    async fn unknown_operations_are_invalid_requests() {
        let dispatcher = dispatcher(TestHandler(|_: &SecretRequest| {
            Ok(SecretValue::default())
        }));
        let base = dispatcher.mapper.secrets_subject();

        for subject in [format!("{base}.put"), base.clone(), "other".to_string()] {
            let err = dispatcher.dispatch(&subject, None, b"").await.unwrap_err();
            assert_eq!(err, GetSecretError::InvalidRequest, "{subject}");
        }
    }

    /// A real client that hasn't connected to anything yet; builder
    /// validation never touches the wire.
    async fn disconnected_client() -> async_nats::Client {
        async_nats::ConnectOptions::new()
            .retry_on_initial_connect()
            .connect("nats://127.0.0.1:4222")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn builder_rejects_missing_pieces() {
        let missing_name = ServerBuilder::new()
            .handler(TestHandler(|_: &SecretRequest| Ok(SecretValue::default())))
            .ephemeral_key()
            .build();
        assert!(matches!(
            missing_name,
            Err(ServerError::InvalidServerConfig(_))
        ));

        let empty_name = ServerBuilder::new()
            .name("")
            .handler(TestHandler(|_: &SecretRequest| Ok(SecretValue::default())))
            .ephemeral_key()
            .build();
        assert!(matches!(
            empty_name,
            Err(ServerError::InvalidServerConfig(_))
        ));

        let missing_client = ServerBuilder::new()
            .name("kube")
            .handler(TestHandler(|_: &SecretRequest| Ok(SecretValue::default())))
            .ephemeral_key()
            .build();
        assert!(matches!(
            missing_client,
            Err(ServerError::InvalidServerConfig(_))
        ));

        let client = disconnected_client().await;

        let missing_handler = ServerBuilder::new()
            .name("kube")
            .client(client.clone())
            .ephemeral_key()
            .build();
        assert!(matches!(
            missing_handler,
            Err(ServerError::InvalidServerConfig(_))
        ));

        let missing_key = ServerBuilder::new()
            .name("kube")
            .client(client.clone())
            .handler(TestHandler(|_: &SecretRequest| Ok(SecretValue::default())))
            .build();
        assert!(matches!(
            missing_key,
            Err(ServerError::InvalidServerConfig(_))
        ));

        let complete = ServerBuilder::new()
            .name("kube")
            .client(client)
            .handler(TestHandler(|_: &SecretRequest| Ok(SecretValue::default())))
            .ephemeral_key()
            .build();
        assert!(complete.is_ok());
    }
}
