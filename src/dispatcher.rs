use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::issuer::{AttemptReport, RequestIssuer};

/// Paths hit when no other set is supplied.
pub const DEFAULT_ENDPOINTS: [&str; 4] = ["/", "/api/users", "/api/orders", "/health"];

#[derive(Error, Debug, PartialEq)]
pub enum EndpointError {
    #[error("endpoint set cannot be empty")]
    Empty,

    #[error("endpoint '{0}' must start with '/'")]
    MissingSlash(String),
}

/// Fixed, ordered set of request paths. Never changes after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSet {
    paths: Arc<[String]>,
}

impl Default for EndpointSet {
    fn default() -> Self {
        Self {
            paths: DEFAULT_ENDPOINTS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl EndpointSet {
    pub fn new<I, S>(paths: I) -> Result<Self, EndpointError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        if paths.is_empty() {
            return Err(EndpointError::Empty);
        }
        if let Some(bad) = paths.iter().find(|p| !p.starts_with('/')) {
            return Err(EndpointError::MissingSlash(bad.clone()));
        }
        Ok(Self {
            paths: paths.into(),
        })
    }

    /// Picks one path uniformly at random. Draws are independent.
    pub fn pick<R: Rng>(&self, rng: &mut R) -> &str {
        &self.paths[rng.gen_range(0..self.paths.len())]
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }
}

/// Fans out `concurrency` attempts per tick.
pub struct LoadDispatcher {
    issuer: Arc<RequestIssuer>,
    endpoints: EndpointSet,
    concurrency: usize,
}

impl LoadDispatcher {
    pub fn new(issuer: Arc<RequestIssuer>, endpoints: EndpointSet, concurrency: usize) -> Self {
        Self {
            issuer,
            endpoints,
            concurrency,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Issues one attempt per concurrency slot and returns without waiting.
    ///
    /// The returned handles may be dropped; the attempts keep running.
    pub fn tick(&self) -> Vec<JoinHandle<AttemptReport>> {
        let mut rng = rand::thread_rng();
        let handles: Vec<_> = (0..self.concurrency)
            .map(|_| self.issuer.issue(self.endpoints.pick(&mut rng)))
            .collect();
        debug!(attempts = handles.len(), "Dispatched tick");
        handles
    }
}
