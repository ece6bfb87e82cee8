//! In-memory form of the queue document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::id::SubmissionId;
use super::store::StoreError;
use crate::state::{Submission, SubmissionStatus, TerminalState};

/// Endpoint id → submission id → submission.
///
/// `BTreeMap` keeps both levels sorted, so iteration over an endpoint's
/// submissions is chronological.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueDocument {
    endpoints: BTreeMap<String, BTreeMap<SubmissionId, Submission>>,
}

/// A submission together with the keys it is stored under
#[derive(Debug, Clone, Copy)]
pub struct SubmissionEntry<'a> {
    pub endpoint: &'a str,
    pub id: &'a SubmissionId,
    pub submission: &'a Submission,
}

impl QueueDocument {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Endpoint ids present in the document
    pub fn endpoints(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    /// Look up one submission
    pub fn get(&self, endpoint: &str, id: &SubmissionId) -> Option<&Submission> {
        self.endpoints.get(endpoint)?.get(id)
    }

    pub(crate) fn get_mut(&mut self, endpoint: &str, id: &SubmissionId) -> Option<&mut Submission> {
        self.endpoints.get_mut(endpoint)?.get_mut(id)
    }

    /// Insert a new submission; never overwrites
    pub fn insert(
        &mut self,
        endpoint: &str,
        id: SubmissionId,
        submission: Submission,
    ) -> Result<(), StoreError> {
        let queue = self.endpoints.entry(endpoint.to_string()).or_default();
        if queue.contains_key(&id) {
            return Err(StoreError::DuplicateId {
                endpoint: endpoint.to_string(),
                id,
            });
        }
        queue.insert(id, submission);
        Ok(())
    }

    /// Largest id stored for an endpoint
    pub fn last_id(&self, endpoint: &str) -> Option<&SubmissionId> {
        self.endpoints.get(endpoint)?.keys().next_back()
    }

    /// Ids on an endpoint with the given status, ascending
    pub fn ids_with_status(&self, endpoint: &str, status: SubmissionStatus) -> Vec<SubmissionId> {
        self.endpoints
            .get(endpoint)
            .map(|queue| {
                queue
                    .iter()
                    .filter(|(_, submission)| submission.status() == status)
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every submission on one endpoint, in id order
    pub fn endpoint_entries<'a>(&'a self, endpoint: &'a str) -> impl Iterator<Item = SubmissionEntry<'a>> {
        self.endpoints
            .get_key_value(endpoint)
            .into_iter()
            .flat_map(|(endpoint, queue)| {
                queue.iter().map(move |(id, submission)| SubmissionEntry {
                    endpoint: endpoint.as_str(),
                    id,
                    submission,
                })
            })
    }

    /// Every submission, endpoint by endpoint, in id order
    pub fn entries(&self) -> impl Iterator<Item = SubmissionEntry<'_>> {
        self.endpoints.iter().flat_map(|(endpoint, queue)| {
            queue.iter().map(move |(id, submission)| SubmissionEntry {
                endpoint: endpoint.as_str(),
                id,
                submission,
            })
        })
    }

    /// Total number of submissions
    pub fn len(&self) -> usize {
        self.endpoints.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if every submission is COMPLETE or ERROR
    pub fn all_terminal(&self) -> bool {
        self.entries().all(|entry| entry.submission.status().is_terminal())
    }
}
