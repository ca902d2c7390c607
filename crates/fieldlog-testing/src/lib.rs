//! Testing utilities for fieldlog
//!
//! # Mock Sink
//!
//! [`MockSink`] stands in for an external log collector in integration
//! tests: it records every delivery and answers with a scripted sequence of
//! statuses, so retry and failure paths can be exercised over real HTTP.

pub mod sink;

pub use sink::{MockSink, RecordedRequest};
