//! Face template registry and nearest-centroid matching.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use facetriage_store::{Identity, MemoryStore};
//! use facetriage_template::{MatchOutcome, Matcher, MatcherConfig, TemplateStore};
//!
//! let store = Arc::new(TemplateStore::open(3, Arc::new(MemoryStore::new())).unwrap());
//! store
//!     .enroll(Identity::new("P1").unwrap(), vec![vec![1.0, 0.0, 0.0], vec![0.9, 0.1, 0.0]])
//!     .unwrap();
//!
//! let matcher = Matcher::new(store.clone(), MatcherConfig::default()).unwrap();
//! match matcher.identify(&[0.95, 0.05, 0.0]).unwrap() {
//!     MatchOutcome::Known { identity, .. } => assert_eq!(identity, "P1"),
//!     MatchOutcome::Unknown { .. } => unreachable!(),
//! }
//! ```
//!
//! # Design
//!
//! Each identity is represented at match time by the centroid (mean) of its
//! enrollment embeddings. [`TemplateStore`] publishes immutable
//! [`TemplateSnapshot`]s; writers build the next snapshot, persist it, then
//! swap it in, so a matcher never sees a half-written template.

mod codec;
mod distance;
mod error;
mod matcher;
mod store;
mod template;

pub use codec::{decode, encode, TEMPLATE_FILE, TEMPLATE_FILE_VERSION};
pub use distance::{cosine_distance, euclidean_distance, Metric};
pub use error::TemplateError;
pub use matcher::{nearest, MatchOutcome, Matcher, MatcherConfig, DEFAULT_THRESHOLD};
pub use store::{TemplateSnapshot, TemplateStore};
pub use template::{centroid, Template};
