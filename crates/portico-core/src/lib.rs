//! # Portico Core
//!
//! Core types shared by every stage of the Portico request pipeline.
//!
//! This crate provides the foundational types used throughout Portico:
//!
//! - [`Phase`] - The three ordered filter phases (`pre`, `route`, `post`)
//! - [`RequestContext`] - Per-request state threaded explicitly through filters
//! - [`RequestId`] - UUID v7 request identifier
//! - [`FailureCause`] - Structured record of which phase/filter failed and why
//! - [`FilterError`] - Errors a filter or fallback provider may return
//! - [`Request`] / [`Response`] - Buffered HTTP types used at the pipeline boundary

#![doc(html_root_url = "https://docs.rs/portico-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
mod failure;
mod phase;
mod types;

pub use context::{RequestContext, RequestId};
pub use error::{FilterError, FilterResult};
pub use failure::{FailureCause, FailureKind};
pub use phase::{ParsePhaseError, Phase};
pub use types::{Request, Response, ResponseExt};
