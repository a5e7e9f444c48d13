//! The segmented fetch-and-record loop.
//!
//! # Features
//!
//! - Segment URL templating (`segment` placeholder, first occurrence)
//! - GET/POST selection and `name: value; ...` header lists
//! - Status classification with a configurable redirect policy
//! - One output file per URL, named after the last path segment
//! - Byte and timing metrics for the whole run
//!
//! Requests are strictly sequential: one exchange is in flight at a time and
//! the first fatal outcome ends the run. Nothing is retried.

mod classify;
mod error;
mod fetch_loop;
mod metrics;
mod request;
mod sink;
mod template;

pub use classify::Outcome;
pub use error::FetchError;
pub use fetch_loop::{EXIT_COMMAND, FetchLoop, RunEnd, RunState, RunSummary};
pub use metrics::RunMetrics;
pub use request::{Headers, Method, RequestBuilder, RequestDescriptor, parse_header_spec};
pub use sink::FileSink;
pub use template::{SEGMENT_PLACEHOLDER, UrlTemplate, render};
