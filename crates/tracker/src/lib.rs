//! Issue-tracker integration: fetches a user's open work items.
//!
//! The only consumer-facing surface is the [`WorkItemSource`] trait plus the
//! HTTP client that implements it. The query contract is fixed: items
//! assigned to the given email whose status category is still open
//! (not-started or started), followed across page cursors until exhausted.

pub mod client;

pub use client::{HttpTrackerClient, TrackerError, WorkItemSource};
