//! Per-endpoint client lookup

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{ExecutionClient, WesClient};
use crate::config::{EndpointConfig, Proto};
use crate::mock::MockEndpoint;

/// One execution client per known endpoint id
#[derive(Clone, Default)]
pub struct EndpointClients {
    clients: BTreeMap<String, Arc<dyn ExecutionClient>>,
}

impl EndpointClients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build clients for configured endpoints, sharing one HTTP connection pool.
    ///
    /// Each call creates fresh mock endpoints with no runs.
    pub fn from_config(endpoints: &[EndpointConfig]) -> Self {
        let http = reqwest::Client::new();
        let mut clients = Self::new();
        for endpoint in endpoints {
            let client: Arc<dyn ExecutionClient> = match endpoint.proto {
                Proto::Mock => Arc::new(MockEndpoint::new()),
                Proto::Http | Proto::Https => Arc::new(WesClient::for_endpoint(http.clone(), endpoint)),
            };
            clients.insert(endpoint.id.clone(), client);
        }
        clients
    }

    /// Register (or replace) the client for an endpoint
    pub fn insert(&mut self, endpoint: impl Into<String>, client: Arc<dyn ExecutionClient>) {
        self.clients.insert(endpoint.into(), client);
    }

    pub fn with(mut self, endpoint: impl Into<String>, client: Arc<dyn ExecutionClient>) -> Self {
        self.insert(endpoint, client);
        self
    }

    pub fn get(&self, endpoint: &str) -> Option<Arc<dyn ExecutionClient>> {
        self.clients.get(endpoint).cloned()
    }

    pub fn contains(&self, endpoint: &str) -> bool {
        self.clients.contains_key(endpoint)
    }

    /// Known endpoint ids, sorted
    pub fn endpoint_ids(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
