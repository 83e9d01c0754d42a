//! Connection registry: who is online, on which platform, over which socket.
//!
//! Two indexes live under one lock and change together:
//! - forward: `user_id → platform_id → connection`
//! - reverse: `connection handle → (platform_id, user_id)`
//!
//! A connection is in both indexes or in neither. The lock is never held
//! across an `.await`, so transport closes happen after it is released.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use parking_lot::RwLock;
use tidings_settings::DuplicateLoginPolicy;
use tracing::{info, warn};

use crate::connection::{Connection, ConnectionInfo, FrameTransport};
use crate::metrics::{GATEWAY_CONNECTIONS_ACTIVE, GATEWAY_CONNECTIONS_TOTAL, GATEWAY_USERS_ONLINE};

#[derive(Default)]
struct Indexes {
    by_user: HashMap<String, HashMap<i32, Arc<Connection>>>,
    by_handle: HashMap<u64, (i32, String)>,
}

impl Indexes {
    fn connection_count(&self) -> usize {
        self.by_handle.len()
    }
}

/// Result of [`ConnectionRegistry::add`].
#[derive(Debug)]
pub struct Added {
    /// The newly registered connection.
    pub connection: Arc<Connection>,
    /// The connection previously holding the same `(user, platform)` slot.
    pub superseded: Option<Arc<Connection>>,
}

/// Online-user registry shared by every session loop.
pub struct ConnectionRegistry {
    indexes: RwLock<Indexes>,
    policy: DuplicateLoginPolicy,
    write_timeout: Duration,
}

impl ConnectionRegistry {
    /// Empty registry. New connections get `write_timeout` as their write deadline.
    pub fn new(policy: DuplicateLoginPolicy, write_timeout: Duration) -> Self {
        Self {
            indexes: RwLock::new(Indexes::default()),
            policy,
            write_timeout,
        }
    }

    /// Register a freshly upgraded socket under `(info.user_id, info.platform_id)`.
    ///
    /// A previous connection in the same slot leaves both indexes. Under
    /// [`DuplicateLoginPolicy::Kick`] its transport is closed as well; under
    /// `Replace` it stays open until its own session loop ends.
    pub async fn add(&self, info: ConnectionInfo, transport: Box<dyn FrameTransport>) -> Added {
        let connection = Arc::new(Connection::new(info, transport, self.write_timeout));
        let user_id = connection.user_id().to_owned();
        let platform_id = connection.platform_id();

        let (superseded, users, conns) = {
            let mut idx = self.indexes.write();
            let superseded = idx
                .by_user
                .entry(user_id.clone())
                .or_default()
                .insert(platform_id, connection.clone());
            if let Some(old) = &superseded {
                let _ = idx.by_handle.remove(&old.handle());
            }
            let _ = idx
                .by_handle
                .insert(connection.handle(), (platform_id, user_id.clone()));
            (superseded, idx.by_user.len(), idx.connection_count())
        };

        counter!(GATEWAY_CONNECTIONS_TOTAL).increment(1);
        record_counts(users, conns);
        info!(
            user_id,
            platform_id,
            conn_id = connection.conn_id(),
            online_user_num = users,
            online_conn_num = conns,
            "connection registered"
        );

        if let Some(old) = &superseded {
            info!(
                user_id,
                platform_id,
                old_conn_id = old.conn_id(),
                policy = ?self.policy,
                "previous connection superseded"
            );
            if self.policy == DuplicateLoginPolicy::Kick {
                if let Err(e) = old.close().await {
                    warn!(conn_id = old.conn_id(), error = %e, "failed to close superseded connection");
                }
            }
        }

        Added {
            connection,
            superseded,
        }
    }

    /// Drop `conn` from both indexes and close its transport.
    ///
    /// The forward slot is cleared only if it still holds this exact
    /// connection. A user with no remaining platforms disappears entirely.
    /// Safe to call more than once.
    pub async fn remove(&self, conn: &Arc<Connection>) {
        let removed = {
            let mut idx = self.indexes.write();
            idx.by_handle.remove(&conn.handle()).map(|(platform_id, user_id)| {
                if let Some(devices) = idx.by_user.get_mut(&user_id) {
                    if devices
                        .get(&platform_id)
                        .is_some_and(|held| held.handle() == conn.handle())
                    {
                        let _ = devices.remove(&platform_id);
                    }
                    if devices.is_empty() {
                        let _ = idx.by_user.remove(&user_id);
                    }
                }
                (idx.by_user.len(), idx.connection_count())
            })
        };

        if let Some((users, conns)) = removed {
            record_counts(users, conns);
            info!(
                user_id = conn.user_id(),
                platform_id = conn.platform_id(),
                conn_id = conn.conn_id(),
                online_user_num = users,
                online_conn_num = conns,
                "connection removed"
            );
        }

        if let Err(e) = conn.close().await {
            warn!(conn_id = conn.conn_id(), error = %e, "failed to close connection");
        }
    }

    /// Connection for `(user_id, platform_id)`, if any.
    pub fn get(&self, user_id: &str, platform_id: i32) -> Option<Arc<Connection>> {
        self.indexes
            .read()
            .by_user
            .get(user_id)
            .and_then(|devices| devices.get(&platform_id).cloned())
    }

    /// Snapshot of every platform connection for `user_id`.
    pub fn get_all(&self, user_id: &str) -> Option<HashMap<i32, Arc<Connection>>> {
        self.indexes.read().by_user.get(user_id).cloned()
    }

    /// Whether `conn` is currently registered.
    pub fn contains(&self, conn: &Connection) -> bool {
        self.indexes.read().by_handle.contains_key(&conn.handle())
    }

    /// Live connection count.
    pub fn connection_count(&self) -> usize {
        self.indexes.read().connection_count()
    }

    /// Users with at least one live connection.
    pub fn user_count(&self) -> usize {
        self.indexes.read().by_user.len()
    }

    /// Duplicate-login policy in force.
    pub fn policy(&self) -> DuplicateLoginPolicy {
        self.policy
    }
}

#[allow(clippy::cast_precision_loss)]
fn record_counts(users: usize, conns: usize) {
    gauge!(GATEWAY_CONNECTIONS_ACTIVE).set(conns as f64);
    gauge!(GATEWAY_USERS_ONLINE).set(users as f64);
}
