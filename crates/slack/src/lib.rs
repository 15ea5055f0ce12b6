//! Slack integration for punchcard.
//!
//! - **Block Kit** (`blocks`) - typed payload model for modals and messages
//! - **Views** (`views`) - the pure builders behind the report dialogs/message
//! - **Payload** (`payload`) - typed submission-state schema with
//!   (block id, action id) lookups
//! - **Events** (`events`) - interaction model, router, and the parameterized
//!   check-in/check-out report flow
//! - **Web API** (`api`) - `SlackApi` trait + reqwest client
//! - **Transport** (`transport`) - delivery boundary and the ack-first runner
//!
//! # Architecture
//!
//! ```text
//! Slack events → EventTransport → InteractionRunner (ack first)
//!                                     ↓
//!                             InteractionRouter → ReportFlow
//!                                     ↓               ↓
//!                                  views ←──── tracker / profile lookups
//!                                     ↓
//!                                SlackApi (views.open/update, chat.postMessage)
//! ```

pub mod api;
pub mod blocks;
pub mod events;
pub mod payload;
pub mod transport;
pub mod views;
