//! Round-robin selection over equivalent Overpass mirrors.

use std::sync::atomic::{AtomicUsize, Ordering};

use url::Url;

use crate::domain::ports::define_port_error;

define_port_error! {
    /// Errors raised when building an [`EndpointRotator`].
    pub enum EndpointRotatorError {
        /// No mirror endpoints were configured.
        NoEndpoints => "at least one Overpass endpoint is required",
    }
}

/// Hands out endpoints in cyclic order.
///
/// There is no health tracking: a failing mirror is rotated back in and the
/// executor's retry loop supplies resilience.
#[derive(Debug)]
pub struct EndpointRotator {
    endpoints: Vec<Url>,
    counter: AtomicUsize,
}

impl EndpointRotator {
    /// Build a rotator over `endpoints`.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointRotatorError::NoEndpoints`] when `endpoints` is empty.
    pub fn new(endpoints: Vec<Url>) -> Result<Self, EndpointRotatorError> {
        if endpoints.is_empty() {
            return Err(EndpointRotatorError::no_endpoints());
        }
        Ok(Self {
            endpoints,
            counter: AtomicUsize::new(0),
        })
    }

    /// Next endpoint; advances the shared counter.
    pub fn next(&self) -> &Url {
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        &self.endpoints[index]
    }

    /// Configured endpoints, in rotation order.
    pub fn endpoints(&self) -> &[Url] {
        &self.endpoints
    }
}
