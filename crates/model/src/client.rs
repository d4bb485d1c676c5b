//! Client entry point
//!
//! A [`Client`] owns one transport and hands out one [`Database`] session
//! per database name. Asking twice for the same name returns the same
//! session, so identity holds across every handle an application obtains.

use crate::config::{ClientConfig, DEFAULT_CACHE_CAPACITY};
use crate::database::Database;
use dashmap::DashMap;
use settee_core::{DatabaseName, Result};
use settee_transport::{HttpOptions, HttpTransport, Transport};
use std::sync::Arc;

/// Connection to one server
pub struct Client {
    transport: Arc<dyn Transport>,
    databases: DashMap<DatabaseName, Database>,
    cache_capacity: usize,
}

impl Client {
    /// Client over any transport
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::from_shared(Arc::new(transport))
    }

    /// Client over a transport the caller keeps a handle to
    pub fn from_shared(transport: Arc<dyn Transport>) -> Self {
        Client {
            transport,
            databases: DashMap::new(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    /// HTTP client for `url` with default options
    pub fn connect(url: &str) -> Result<Self> {
        Self::from_config(&ClientConfig::with_url(url))
    }

    /// HTTP client described by a configuration
    ///
    /// # Errors
    ///
    /// `Error::Config` when the configuration does not validate.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(
            config.url.clone(),
            HttpOptions {
                timeout: config.timeout(),
                credentials: config.credentials(),
                headers: config.headers.clone(),
                ..HttpOptions::default()
            },
        );
        tracing::info!(target: "settee::client", url = %config.url, "client configured");
        Ok(Self::new(transport).with_cache_capacity(config.cache_capacity))
    }

    /// Bound the cached pool of every database session created from now on
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Cache bound given to new database sessions
    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity
    }

    /// Session for database `name`, created on first use
    ///
    /// No request is sent: the database is assumed to exist.
    pub fn database(&self, name: &str) -> Result<Database> {
        let name = DatabaseName::new(name)?;
        let session = self
            .databases
            .entry(name.clone())
            .or_insert_with(|| {
                tracing::debug!(target: "settee::client", db = %name, "database session opened");
                Database::new(name, Arc::clone(&self.transport), self.cache_capacity)
            })
            .value()
            .clone();
        Ok(session)
    }

    /// Underlying transport
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("databases", &self.databases.len())
            .field("cache_capacity", &self.cache_capacity)
            .finish()
    }
}
