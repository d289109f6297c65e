//! Ordered fallback over redundant candidates.
//!
//! Candidates are tried strictly in order. Within one candidate only
//! transient failures are retried, with exponential backoff up to a fixed
//! budget. Any other failure moves on to the next candidate, except an
//! all-masked grid which ends the chain. The first success wins and no
//! later candidate is contacted.

use std::future::Future;
use std::time::Duration;

use sst_common::HttpConfig;
use tracing::{debug, warn};

use crate::error::FetchError;

/// Retry budget for transient failures within one candidate.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_http(http: &HttpConfig) -> Self {
        Self {
            max_retries: http.max_retries,
            initial_delay: http.initial_retry_delay(),
            max_delay: http.max_retry_delay(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_http(&HttpConfig::default())
    }
}

/// A successful chain run.
#[derive(Debug)]
pub struct Fallback<T> {
    pub value: T,
    /// Index of the candidate that answered.
    pub candidate: usize,
    /// Attempts made across all candidates, including the successful one.
    pub attempts: u32,
}

#[derive(Debug, Clone, Default)]
pub struct FallbackChain {
    policy: RetryPolicy,
}

impl FallbackChain {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `attempt` against each candidate until one succeeds.
    ///
    /// `what` names the unit of work in logs and in the exhaustion error.
    pub async fn run<'a, C, T, F, Fut>(
        &self,
        candidates: &'a [C],
        what: &str,
        mut attempt: F,
    ) -> Result<Fallback<T>, FetchError>
    where
        C: AsRef<str>,
        F: FnMut(&'a C) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempts = 0u32;
        let mut last_error = None;

        for (index, candidate) in candidates.iter().enumerate() {
            let mut retries = 0u32;
            let mut delay = self.policy.initial_delay;

            loop {
                attempts += 1;
                match attempt(candidate).await {
                    Ok(value) => {
                        debug!(what, candidate = candidate.as_ref(), attempts, "Candidate succeeded");
                        return Ok(Fallback {
                            value,
                            candidate: index,
                            attempts,
                        });
                    }
                    Err(e) if e.is_transient() && retries < self.policy.max_retries => {
                        retries += 1;
                        warn!(
                            what,
                            candidate = candidate.as_ref(),
                            attempt = retries,
                            max_retries = self.policy.max_retries,
                            error = %e,
                            "Transient failure, retrying in {:?}",
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        delay = std::cmp::min(delay * 2, self.policy.max_delay);
                    }
                    Err(e) => {
                        metrics::counter!("sst_candidate_failures_total", "kind" => e.kind()).increment(1);
                        if !e.escalates() {
                            debug!(what, candidate = candidate.as_ref(), error = %e, "Candidate failure ends the chain");
                            return Err(e);
                        }
                        warn!(what, candidate = candidate.as_ref(), error = %e, "Candidate failed, trying next");
                        last_error = Some(Box::new(e));
                        break;
                    }
                }
            }
        }

        Err(FetchError::AllSourcesExhausted {
            what: what.to_string(),
            candidates: candidates.len(),
            last: last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use std::cell::RefCell;

    fn chain(max_retries: u32) -> FallbackChain {
        FallbackChain::new(RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        })
    }

    fn server(status: u16) -> FetchError {
        FetchError::Server {
            status,
            url: String::new(),
        }
    }

    #[test]
    fn test_first_success_stops_chain() {
        let nodes = ["a", "b", "c", "d"];
        let seen = RefCell::new(Vec::new());

        let result = tokio_test::block_on(chain(2).run(&nodes, "grid", |node| {
            seen.borrow_mut().push(*node);
            let outcome = match *node {
                "a" => Err(server(500)),
                "b" => Err(server(404)),
                _ => Ok(node.to_uppercase()),
            };
            async move { outcome }
        }))
        .unwrap();

        assert_eq!(result.value, "C");
        assert_eq!(result.candidate, 2);
        assert_eq!(*seen.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_transient_retries_are_bounded() {
        let nodes = ["a", "b"];
        let seen = RefCell::new(Vec::new());

        let err = tokio_test::block_on(chain(2).run(&nodes, "axis", |node| {
            seen.borrow_mut().push(*node);
            async { Err::<(), _>(FetchError::Network(TransportError::Timeout("t".into()))) }
        }))
        .unwrap_err();

        assert_eq!(*seen.borrow(), vec!["a", "a", "a", "b", "b", "b"]);
        match err {
            FetchError::AllSourcesExhausted { candidates, last, .. } => {
                assert_eq!(candidates, 2);
                assert_eq!(last.map(|e| e.kind()), Some("network"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_no_valid_data_ends_chain() {
        let nodes = ["a", "b"];
        let seen = RefCell::new(Vec::new());

        let err = tokio_test::block_on(chain(0).run(&nodes, "grid", |node| {
            seen.borrow_mut().push(*node);
            async { Err::<(), _>(FetchError::NoValidData) }
        }))
        .unwrap_err();

        assert!(matches!(err, FetchError::NoValidData));
        assert_eq!(*seen.borrow(), vec!["a"]);
    }

    #[test]
    fn test_empty_candidate_list() {
        let nodes: [&str; 0] = [];
        let err = tokio_test::block_on(chain(1).run(&nodes, "grid", |_| async { Ok(()) })).unwrap_err();
        assert!(matches!(err, FetchError::AllSourcesExhausted { candidates: 0, last: None, .. }));
    }
}
