//! Player position resolution.
//!
//! Spawn binds need the triggering player's coordinates. The resolver issues a
//! `printpos` query and parks a waiter per server; when a position line later
//! comes back on that server's console stream, the oldest live waiter gets it.
//! Requests on the same server queue FIFO, so concurrent queries pair with
//! replies in issue order. A reply that arrives with no waiter parked is
//! dropped.

use crate::console::{ConsoleExecutor, ServerKey};
use crate::error::{ConsoleBindError, Result};
use crate::events::Position;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

const POSITION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
pub struct PositionResolver {
    pending: Mutex<HashMap<ServerKey, VecDeque<oneshot::Sender<Position>>>>,
}

impl PositionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<ServerKey, VecDeque<oneshot::Sender<Position>>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Query a player's position, waiting up to five seconds for the console
    /// to echo it back.
    pub async fn get_position(
        &self,
        console: &dyn ConsoleExecutor,
        server: &ServerKey,
        player: &str,
    ) -> Result<Position> {
        let (tx, rx) = oneshot::channel();
        self.lock().entry(server.clone()).or_default().push_back(tx);

        if let Err(err) = console.execute(server, &format!("printpos {}", player)).await {
            // Dropping rx closes the parked sender; resolve skips it.
            drop(rx);
            self.sweep(server);
            return Err(err);
        }

        match tokio::time::timeout(POSITION_TIMEOUT, rx).await {
            Ok(Ok(position)) => Ok(position),
            Ok(Err(_)) => Err(ConsoleBindError::Timeout(format!(
                "position request for {} was dropped",
                player
            ))),
            Err(_) => {
                self.sweep(server);
                warn!(server = %server, player, "position request timed out");
                Err(ConsoleBindError::Timeout(format!(
                    "timed out waiting for {}'s position",
                    player
                )))
            }
        }
    }

    /// Deliver a position line to the oldest live waiter on this server.
    /// Returns true when a waiter consumed it.
    pub fn resolve(&self, server: &ServerKey, position: Position) -> bool {
        let mut pending = self.lock();
        let Some(queue) = pending.get_mut(server) else {
            return false;
        };

        while let Some(sender) = queue.pop_front() {
            if sender.send(position).is_ok() {
                if queue.is_empty() {
                    pending.remove(server);
                }
                return true;
            }
        }
        pending.remove(server);
        debug!(server = %server, "position line had no live waiter");
        false
    }

    /// Drop waiters whose receiving side has gone away.
    fn sweep(&self, server: &ServerKey) {
        let mut pending = self.lock();
        if let Some(queue) = pending.get_mut(server) {
            queue.retain(|sender| !sender.is_closed());
            if queue.is_empty() {
                pending.remove(server);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::DisconnectedConsole;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct SilentConsole;

    #[async_trait]
    impl ConsoleExecutor for SilentConsole {
        async fn execute(&self, _server: &ServerKey, _command: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    fn server() -> ServerKey {
        ServerKey::new("g", "s")
    }

    fn position(x: f64) -> Position {
        Position { x, y: 2.0, z: 3.0 }
    }

    #[tokio::test]
    async fn test_resolve_delivers_to_waiter() {
        let resolver = Arc::new(PositionResolver::new());
        let console = SilentConsole;

        let waiter = {
            let resolver = Arc::clone(&resolver);
            tokio::spawn(async move {
                resolver.get_position(&console, &server(), "Bob").await
            })
        };
        tokio::task::yield_now().await;

        assert!(resolver.resolve(&server(), position(1.0)));
        let got = waiter.await.unwrap().unwrap();
        assert_eq!(got, position(1.0));
    }

    #[tokio::test]
    async fn test_concurrent_requests_pair_in_order() {
        let resolver = Arc::new(PositionResolver::new());

        let first = {
            let resolver = Arc::clone(&resolver);
            tokio::spawn(
                async move { resolver.get_position(&SilentConsole, &server(), "Alice").await },
            )
        };
        tokio::task::yield_now().await;
        let second = {
            let resolver = Arc::clone(&resolver);
            tokio::spawn(
                async move { resolver.get_position(&SilentConsole, &server(), "Bob").await },
            )
        };
        tokio::task::yield_now().await;

        assert!(resolver.resolve(&server(), position(1.0)));
        assert!(resolver.resolve(&server(), position(2.0)));

        assert_eq!(first.await.unwrap().unwrap(), position(1.0));
        assert_eq!(second.await.unwrap().unwrap(), position(2.0));
    }

    #[tokio::test]
    async fn test_unsolicited_position_is_dropped() {
        let resolver = PositionResolver::new();
        assert!(!resolver.resolve(&server(), position(1.0)));
    }

    #[tokio::test]
    async fn test_failed_query_cleans_up_waiter() {
        let resolver = PositionResolver::new();
        let console = DisconnectedConsole::new();

        let result = resolver.get_position(&console, &server(), "Bob").await;
        assert!(result.is_err());
        // No stale waiter left behind.
        assert!(!resolver.resolve(&server(), position(1.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_after_five_seconds() {
        let resolver = Arc::new(PositionResolver::new());

        let waiter = {
            let resolver = Arc::clone(&resolver);
            tokio::spawn(
                async move { resolver.get_position(&SilentConsole, &server(), "Bob").await },
            )
        };
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(6)).await;

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(ConsoleBindError::Timeout(_))));
        assert!(!resolver.resolve(&server(), position(1.0)));
    }
}
