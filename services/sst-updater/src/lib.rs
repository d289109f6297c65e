//! SST updater: pulls sea surface temperature grids from redundant griddap
//! mirrors and keeps an artifact directory plus its manifest up to date.
//!
//! - [`transport`]: HTTP seam (`reqwest` in production, mocks in tests)
//! - [`client`]: griddap URLs and the time axis, metadata and grid queries
//! - [`fallback`]: ordered candidate chain with bounded transient retries
//! - [`selector`]: which axis timestamps a run processes
//! - [`pipeline`]: the run itself and its [`RunSummary`]

pub mod client;
pub mod error;
pub mod fallback;
pub mod pipeline;
pub mod selector;
pub mod transport;

pub use client::{ErddapClient, GridQuery};
pub use error::{FetchError, PipelineError, Result};
pub use fallback::{Fallback, FallbackChain, RetryPolicy};
pub use pipeline::{Pipeline, RunOptions, RunSummary, UnitFailure};
pub use selector::TimeSelector;
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport, TransportError};
