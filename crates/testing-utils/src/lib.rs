//! # Catalog Testing Utils
//!
//! Shared testing utilities for the catalogue synchronisation workspace:
//!
//! - **Mocks**: in-memory implementations of every repository, the cache
//!   store and the queue transport, with fault injection
//! - **Builders**: `JobBuilder`, `HostBuilder`, `PropertyBuilder`,
//!   `CalendarBuilder`
//! - **Helpers**: async polling for integration tests
//!
//! ```toml
//! [dev-dependencies]
//! catalog-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
