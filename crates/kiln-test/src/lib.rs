//! Kiln Test - Shared test utilities for the kiln runtime.
//!
//! Mock host and platform nodes, native event fixtures and a logging
//! harness, meant to be used as a dev-dependency.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kiln_test::prelude::*;
//!
//! #[test]
//! fn test_click_commits_press() {
//!     init_test_logging();
//!     let node = Arc::new(MockNode::new());
//!     let host = Arc::new(MockHost::new("button").with_root_node(&node));
//!     let instance = mount(&button(), &host).unwrap();
//!     node.fire(click()).unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
