//! State module for tracking URL lifecycle
//!
//! Every URL known to the frontier lives in exactly one of four states:
//!
//! - `Ready`: waiting to be dispatched
//! - `Pending`: claimed by a fetch worker
//! - `Done`: fetched and parsed by every spider chain
//! - `Failed`: fetch, parse or extraction failed for this run

mod url_state;

pub use url_state::UrlState;
