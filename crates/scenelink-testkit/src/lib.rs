//! # Scenelink Testkit
//!
//! Testing utilities for scenelink.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Harness**: a [`TestHarness`] owning an in-memory network and a set of
//!   participants, created per test and torn down explicitly
//! - **Recorders**: handlers and listeners that record every callback and
//!   signal an [`EventSignal`] so tests can wait with a bound
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use scenelink_core::SceneId;
//! use scenelink_testkit::{TestHarness, DEFAULT_TIMEOUT};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let harness = TestHarness::new(2)?;
//!     harness.connect_all().await?;
//!     harness.block_on_all_connected(DEFAULT_TIMEOUT).await?;
//!
//!     let (a, b) = (harness.participant(0), harness.participant(1));
//!     a.session.send_subscribe_scene(&b.id, SceneId::new(1))?;
//!     assert!(b.handler.signal.wait_for_events(1, DEFAULT_TIMEOUT).await);
//!
//!     harness.disconnect_all().await
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use scenelink_testkit::generators::{payload, chunk_limit};
//!
//! proptest! {
//!     #[test]
//!     fn split_never_exceeds_limit(data in payload(4096), limit in chunk_limit()) {
//!         // ...
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    init_tracing, EventSignal, HandlerCall, Participant, RecordingHandler, RecordingListener,
    TestHarness, DEFAULT_TIMEOUT, NEGATIVE_TIMEOUT,
};
