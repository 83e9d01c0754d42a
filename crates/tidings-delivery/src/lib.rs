//! # tidings-delivery
//!
//! Receives relayed chat sends from the gateway and fans them out to
//! per-user mailboxes on a partitioned event log.
//!
//! - Event log: keyed, partitioned, append-only producer interface plus an in-memory log
//! - Chat service: server id and send time assignment, recipient then sender publish
//! - Dedupe: bounded window of `(mailbox, client message id)` pairs already published
//! - RPC: `chat.sendMessage`, `chat.getMaxAndMinSeq` over `POST /rpc`

#![deny(unsafe_code)]

pub mod config;
pub mod dedupe;
pub mod errors;
pub mod event_log;
pub mod group;
pub mod metrics;
pub mod rpc;
pub mod server;
pub mod service;

pub use config::DeliveryConfig;
pub use errors::{DeliveryError, PublishError};
pub use event_log::{EventLogProducer, MemoryEventLog, PublishedRecord};
pub use server::DeliveryServer;
pub use service::ChatService;
