//! Generic UPnP callback server for receiving GENA event notifications.
//!
//! This crate provides a lightweight HTTP server for handling UPnP NOTIFY
//! requests. It has no knowledge of any particular service; consumers map
//! callback keys back to their own subscriptions.
//!
//! # Overview
//!
//! - [`CallbackServer`]: binds a local port and accepts `NOTIFY` requests on
//!   `http://<local-ip>:<port>/<callback-key>`.
//! - [`EventRouter`]: keeps the set of live callback keys and forwards
//!   accepted notifications to a channel.
//! - [`NotificationPayload`]: callback key, SID and raw XML body.
//!
//! # Example
//!
//! ```no_run
//! use callback_server::{CallbackServer, NotificationPayload};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), callback_server::CallbackError> {
//!     let (tx, mut rx) = mpsc::unbounded_channel::<NotificationPayload>();
//!     let server = CallbackServer::new((3400, 3500), tx).await?;
//!
//!     // One key per subscription; pass the URL in the SUBSCRIBE CALLBACK header
//!     let key = server.router().register_new().await;
//!     println!("CALLBACK: <{}>", server.callback_url(&key));
//!
//!     tokio::spawn(async move {
//!         while let Some(notification) = rx.recv().await {
//!             println!("{} -> {}", notification.subscription_id, notification.event_xml);
//!         }
//!     });
//!
//!     server.shutdown().await
//! }
//! ```
//!
//! # Private Workspace Crate
//!
//! This crate is intended for internal use within the workspace and is not published
//! to crates.io.

mod error;
pub mod router;
mod server;

pub use error::{CallbackError, Result};
pub use router::{EventRouter, NotificationPayload};
pub use server::CallbackServer;
