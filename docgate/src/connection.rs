//! The connection state machine.
//!
//! A [`Connection`] adapts a stateless, REST-based document store to a
//! stateful connection model. It tracks readiness, defers operations issued
//! while a connection attempt is in flight, and hands out collection handles.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected --open--> Connecting --ok--> Connected --close--> Disconnecting
//!                             |
//!                             +--error--> Disconnected
//! ```
//!
//! Operations issued while `Connecting` wait in the connection's
//! [`PendingQueue`] (when buffering is enabled). Once the client is attached
//! they resume one at a time, oldest first: each waiter holds a `Turn` and
//! the next one is woken only after it was polled. Operations issued while
//! that release is still running queue behind it. A failed attempt rejects
//! every waiter.
//!
//! # Example
//!
//! ```ignore
//! use docgate::{Connection, OpenOptions};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connection = Connection::builder().build();
//!     connection
//!         .open("https://db-region.apps.astra.datastax.com/ks1?applicationToken=tok1", OpenOptions::default())
//!         .await?;
//!
//!     let carts = connection.collection("carts");
//!     carts.insert_one(doc! { "name": "My Cart" }).await?;
//!
//!     connection.close().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use async_trait::async_trait;
use parking_lot::Mutex;

use docgate_core::{
    client::{ClientConnector, CollectionOptions, DocumentClient},
    descriptor::ConnectionDescriptor,
    error::{DocumentStoreError, DocumentStoreResult},
    executor::{Callback, execute_operation},
};
use docgate_rest::{CredentialResolver, Credentials, RestConnector};

use crate::{
    logging,
    registry::{CollectionHandle, CollectionRegistry},
    state::{ConnectionState, PendingQueue},
};


/// Per-call options of [`Connection::open`].
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    credentials: Option<Credentials>,
    init_logging: bool,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credentials to exchange for a token when the URI carries none.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Installs a console subscriber at the URI's `logLevel` once the URI is parsed.
    pub fn init_logging(mut self, init_logging: bool) -> Self {
        self.init_logging = init_logging;
        self
    }
}


#[derive(Debug, Default)]
struct Lifecycle {
    state: ConnectionState,
    pending: PendingQueue<Turn>,
    /// Set while queued waiters are being released after connecting.
    draining: bool,
    client: Option<Arc<dyn DocumentClient>>,
    descriptor: Option<Arc<ConnectionDescriptor>>,
}

/// A released waiter's place in the release order.
///
/// Dropping it wakes the next queued waiter, so waiters resume in the order
/// they were queued regardless of how the runtime schedules woken tasks.
#[derive(Debug)]
struct Turn {
    lifecycle: Option<Arc<Mutex<Lifecycle>>>,
}

impl Turn {
    /// Releases the oldest waiter that is still listening.
    fn pass(lifecycle: Arc<Mutex<Lifecycle>>) {
        loop {
            let waiter = {
                let mut guard = lifecycle.lock();
                match guard.pending.pop() {
                    Some(waiter) => waiter,
                    None => {
                        guard.draining = false;
                        return;
                    }
                }
            };

            let turn = Turn { lifecycle: Some(lifecycle.clone()) };
            match waiter.send(Ok(turn)) {
                Ok(()) => return,
                // The waiting operation was dropped; disarm its turn and move on.
                Err(returned) => {
                    if let Ok(mut turn) = returned {
                        turn.lifecycle = None;
                    }
                }
            }
        }
    }
}

impl Drop for Turn {
    fn drop(&mut self) {
        if let Some(lifecycle) = self.lifecycle.take() {
            Turn::pass(lifecycle);
        }
    }
}

/// State shared between a connection and its collection handles.
#[derive(Debug)]
pub(crate) struct ConnectionShared {
    connector: Arc<dyn ClientConnector>,
    resolver: CredentialResolver,
    buffer_commands: bool,
    lifecycle: Arc<Mutex<Lifecycle>>,
    registry: CollectionRegistry,
}

impl ConnectionShared {
    /// Waits until operations may run against this connection.
    pub(crate) async fn wait_until_ready(&self) -> DocumentStoreResult<()> {
        let receiver = {
            let mut lifecycle = self.lifecycle.lock();

            match lifecycle.state {
                ConnectionState::Connected if lifecycle.draining => lifecycle.pending.push(),
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Connecting if self.buffer_commands => lifecycle.pending.push(),
                ConnectionState::Disconnected if lifecycle.client.is_none() => {
                    return Err(DocumentStoreError::ConnectionUnavailable(
                        "connection is not open".into(),
                    ));
                }
                _ => return Ok(()),
            }
        };

        tracing::debug!("operation deferred until the connection is ready");

        let turn = receiver
            .await
            .map_err(|_| DocumentStoreError::ConnectionUnavailable("connection attempt was abandoned".into()))??;

        // Wakes the next waiter.
        drop(turn);

        Ok(())
    }

    /// Waits for readiness and returns the attached client.
    pub(crate) async fn ready_client(&self) -> DocumentStoreResult<Arc<dyn DocumentClient>> {
        self.wait_until_ready().await?;

        self.lifecycle
            .lock()
            .client
            .clone()
            .ok_or_else(|| DocumentStoreError::ConnectionUnavailable("no client is attached".into()))
    }

    fn begin_connecting(&self) -> DocumentStoreResult<()> {
        let mut lifecycle = self.lifecycle.lock();

        if lifecycle.state != ConnectionState::Disconnected {
            return Err(DocumentStoreError::invalid_state(
                ConnectionState::Disconnected,
                lifecycle.state,
            ));
        }

        lifecycle.state.transition(ConnectionState::Connecting)?;
        tracing::debug!(state = %lifecycle.state, "connection state changed");

        Ok(())
    }

    async fn resolve_client(
        &self,
        uri: &str,
        options: &OpenOptions,
    ) -> DocumentStoreResult<(ConnectionDescriptor, Arc<dyn DocumentClient>)> {
        let descriptor = self
            .resolver
            .resolve_descriptor(uri, options.credentials.as_ref())
            .await?;

        if options.init_logging {
            logging::init(descriptor.log_level_filter());
        }

        let client = self.connector.connect(&descriptor).await?;

        Ok((descriptor, client))
    }

    fn attach(&self, descriptor: ConnectionDescriptor, client: Arc<dyn DocumentClient>) -> DocumentStoreResult<()> {
        let keyspace = descriptor.keyspace().to_string();
        let waiting = {
            let mut lifecycle = self.lifecycle.lock();

            lifecycle.state.transition(ConnectionState::Connected)?;
            lifecycle.client = Some(client);
            lifecycle.descriptor = Some(Arc::new(descriptor));
            lifecycle.draining = !lifecycle.pending.is_empty();
            lifecycle.pending.len()
        };

        tracing::info!(keyspace = %keyspace, released = waiting, "connection established");
        if waiting > 0 {
            Turn::pass(self.lifecycle.clone());
        }

        Ok(())
    }

    fn fail(&self, reason: &str) {
        let waiters = {
            let mut lifecycle = self.lifecycle.lock();

            if lifecycle.state.transition(ConnectionState::Disconnected).is_err() {
                return;
            }
            lifecycle.pending.take()
        };

        tracing::debug!(reason, rejected = waiters.len(), "connection attempt failed");
        waiters.reject_all(reason);
    }
}

/// Falls back to `Disconnected` if a connection attempt ends without settling,
/// e.g. when the `open` future is dropped.
struct ConnectingGuard<'a> {
    shared: &'a ConnectionShared,
    settled: bool,
}

impl<'a> ConnectingGuard<'a> {
    fn new(shared: &'a ConnectionShared) -> Self {
        Self { shared, settled: false }
    }

    fn connected(mut self, descriptor: ConnectionDescriptor, client: Arc<dyn DocumentClient>) -> DocumentStoreResult<()> {
        self.settled = true;
        self.shared.attach(descriptor, client)
    }

    fn failed(mut self, err: &DocumentStoreError) {
        self.settled = true;
        self.shared.fail(&err.to_string());
    }
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.shared.fail("connection attempt was abandoned");
        }
    }
}


/// Capabilities of a stateful document connection.
#[async_trait]
pub trait DocumentConnection: Send + Sync {
    /// Opens the connection described by `uri`.
    async fn open(&self, uri: &str, options: OpenOptions) -> DocumentStoreResult<()>;

    /// Closes the connection.
    async fn close(&self) -> DocumentStoreResult<()>;

    /// Returns the handle of the collection called `name`.
    fn collection(&self, name: &str) -> Arc<CollectionHandle>;

    async fn create_collection(&self, name: &str, options: CollectionOptions) -> DocumentStoreResult<()>;

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Resolves once operations may run against the connection.
    async fn wait_until_ready(&self) -> DocumentStoreResult<()>;
}


/// A connection to a remote document store.
///
/// Cloning is cheap; clones share state, pending operations and collection
/// handles.
#[derive(Debug, Clone)]
pub struct Connection {
    inner: Arc<ConnectionShared>,
}

impl Connection {
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::default()
    }

    /// Opens the connection.
    ///
    /// Parses `uri`, exchanges credentials for a token when the URI has none,
    /// and attaches a client. Operations issued meanwhile are deferred and
    /// released once the connection is established.
    ///
    /// # Arguments
    ///
    /// * `uri` - `scheme://host[:port]/{keyspace}?applicationToken=..&baseApiPath=..&logLevel=..`
    /// * `options` - Credentials and logging bootstrap
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::InvalidState`] if the connection is not `Disconnected`.
    /// - [`DocumentStoreError::Validation`] for malformed URIs.
    /// - [`DocumentStoreError::AuthExchange`] if the credential exchange fails.
    ///
    /// On failure the connection returns to `Disconnected` and deferred
    /// operations fail with [`DocumentStoreError::ConnectionUnavailable`].
    pub async fn open(&self, uri: &str, options: OpenOptions) -> DocumentStoreResult<()> {
        execute_operation(self.open_connection(uri, options), None).await
    }

    /// [`open`](Self::open), settling through `callback`.
    pub async fn open_with(&self, uri: &str, options: OpenOptions, callback: Callback<()>) -> DocumentStoreResult<()> {
        execute_operation(self.open_connection(uri, options), Some(callback)).await
    }

    async fn open_connection(&self, uri: &str, options: OpenOptions) -> DocumentStoreResult<()> {
        self.inner.begin_connecting()?;
        let guard = ConnectingGuard::new(&self.inner);

        match self.inner.resolve_client(uri, &options).await {
            Ok((descriptor, client)) => guard.connected(descriptor, client),
            Err(err) => {
                guard.failed(&err);
                Err(err)
            }
        }
    }

    /// Closes the connection.
    ///
    /// A `Connected` connection moves to `Disconnecting`. There is nothing to
    /// tear down, so this always succeeds.
    pub async fn close(&self) -> DocumentStoreResult<()> {
        execute_operation(async { self.close_connection() }, None).await
    }

    /// [`close`](Self::close), settling through `callback`.
    pub async fn close_with(&self, callback: Callback<()>) -> DocumentStoreResult<()> {
        execute_operation(async { self.close_connection() }, Some(callback)).await
    }

    fn close_connection(&self) -> DocumentStoreResult<()> {
        let mut lifecycle = self.inner.lifecycle.lock();

        if lifecycle.state == ConnectionState::Connected {
            lifecycle.state.transition(ConnectionState::Disconnecting)?;
            tracing::info!("connection closed");
        }

        Ok(())
    }

    /// Returns the handle of the collection called `name`, creating it on
    /// first use. Does not wait for the connection.
    pub fn collection(&self, name: &str) -> Arc<CollectionHandle> {
        self.inner
            .registry
            .get_or_create(name, &Arc::downgrade(&self.inner))
    }

    /// Creates a collection once the connection is ready.
    pub async fn create_collection(&self, name: &str, options: CollectionOptions) -> DocumentStoreResult<()> {
        execute_operation(self.remote_create(name, &options), None).await
    }

    /// [`create_collection`](Self::create_collection), settling through `callback`.
    pub async fn create_collection_with(
        &self,
        name: &str,
        options: CollectionOptions,
        callback: Callback<()>,
    ) -> DocumentStoreResult<()> {
        execute_operation(self.remote_create(name, &options), Some(callback)).await
    }

    async fn remote_create(&self, name: &str, options: &CollectionOptions) -> DocumentStoreResult<()> {
        self.inner
            .ready_client()
            .await?
            .create_collection(name, options)
            .await
    }

    /// Drops a collection once the connection is ready.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::CollectionNotFound`] if there is no such collection.
    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        execute_operation(self.remote_drop(name), None).await
    }

    /// [`drop_collection`](Self::drop_collection), settling through `callback`.
    pub async fn drop_collection_with(&self, name: &str, callback: Callback<()>) -> DocumentStoreResult<()> {
        execute_operation(self.remote_drop(name), Some(callback)).await
    }

    async fn remote_drop(&self, name: &str) -> DocumentStoreResult<()> {
        self.inner
            .ready_client()
            .await?
            .drop_collection(name)
            .await
    }

    /// Lists the collections of the keyspace once the connection is ready.
    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        execute_operation(
            async { self.inner.ready_client().await?.list_collections().await },
            None,
        )
        .await
    }

    /// Resolves once operations may run against the connection.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ConnectionUnavailable`] if the connection
    /// was never opened, or if the attempt it waited on failed.
    pub async fn wait_until_ready(&self) -> DocumentStoreResult<()> {
        self.inner.wait_until_ready().await
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lifecycle.lock().state
    }

    /// The descriptor of the last successful `open`.
    pub fn descriptor(&self) -> Option<Arc<ConnectionDescriptor>> {
        self.inner.lifecycle.lock().descriptor.clone()
    }

    /// Number of operations waiting for the connection.
    pub fn pending_operations(&self) -> usize {
        self.inner.lifecycle.lock().pending.len()
    }

    pub fn registry(&self) -> &CollectionRegistry {
        &self.inner.registry
    }
}

#[async_trait]
impl DocumentConnection for Connection {
    async fn open(&self, uri: &str, options: OpenOptions) -> DocumentStoreResult<()> {
        Connection::open(self, uri, options).await
    }

    async fn close(&self) -> DocumentStoreResult<()> {
        Connection::close(self).await
    }

    fn collection(&self, name: &str) -> Arc<CollectionHandle> {
        Connection::collection(self, name)
    }

    async fn create_collection(&self, name: &str, options: CollectionOptions) -> DocumentStoreResult<()> {
        Connection::create_collection(self, name, options).await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        Connection::drop_collection(self, name).await
    }

    async fn wait_until_ready(&self) -> DocumentStoreResult<()> {
        Connection::wait_until_ready(self).await
    }
}


/// Builder for [`Connection`]s.
///
/// # Example
///
/// ```ignore
/// use docgate::{Connection, memory::InMemoryClient};
///
/// let connection = Connection::builder()
///     .connector(InMemoryClient::new().connector())
///     .buffer_commands(false)
///     .build();
/// ```
#[derive(Debug)]
pub struct ConnectionBuilder {
    connector: Arc<dyn ClientConnector>,
    resolver: CredentialResolver,
    buffer_commands: bool,
}

impl Default for ConnectionBuilder {
    fn default() -> Self {
        Self {
            connector: Arc::new(RestConnector::new()),
            resolver: CredentialResolver::new(),
            buffer_commands: true,
        }
    }
}

impl ConnectionBuilder {
    /// Sets the factory of the remote client. Defaults to [`RestConnector`].
    pub fn connector<C>(mut self, connector: C) -> Self
    where
        C: ClientConnector + 'static,
    {
        self.connector = Arc::new(connector);
        self
    }

    /// Whether operations issued while connecting wait for the connection
    /// (`true`, the default) or proceed immediately.
    pub fn buffer_commands(mut self, buffer_commands: bool) -> Self {
        self.buffer_commands = buffer_commands;
        self
    }

    pub fn credential_resolver(mut self, resolver: CredentialResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn build(self) -> Connection {
        Connection {
            inner: Arc::new(ConnectionShared {
                connector: self.connector,
                resolver: self.resolver,
                buffer_commands: self.buffer_commands,
                lifecycle: Arc::new(Mutex::new(Lifecycle::default())),
                registry: CollectionRegistry::default(),
            }),
        }
    }
}
