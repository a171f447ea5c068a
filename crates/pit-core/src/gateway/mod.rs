//! Realtime messaging gateway.
//!
//! The gateway sits between a match and the realtime transport. It offers:
//! - **Listeners**: callbacks keyed by [`MessageCategory`]. An inbound
//!   message goes to every listener of its category in registration order
//!   until one returns `true` (handled).
//! - **Broadcast**: outbound messages fanned out to every subscriber over a
//!   `tokio::sync::broadcast` channel.
//! - **Requests**: a payload sent to the transport with a fresh correlation
//!   id, resolved by the first [`InboundMessage::Response`] carrying that id
//!   or failed after a timeout. The one-shot listener behind a request is
//!   removed however the request ends.
//!
//! # Example
//!
//! ```
//! use pit_core::gateway::{Gateway, InboundMessage, MessageCategory, OutboundMessage};
//! use pit_core::level::Phase;
//! use std::time::Duration;
//!
//! let (gateway, _requests) = Gateway::new(Duration::from_secs(5));
//! gateway.add_listener(MessageCategory::GameState, Box::new(|_, replies| {
//!     replies.push(OutboundMessage::GameState { phase: Phase::Fight });
//!     true
//! }));
//!
//! let dispatch = gateway.dispatch(&InboundMessage::GameState);
//! assert!(dispatch.handled);
//! assert_eq!(dispatch.replies.len(), 1);
//! ```

mod messages;

pub use messages::{
    GameStatus, InboundMessage, MessageCategory, OutboundMessage, OutboundRequest,
};

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::GatewayError;

/// Capacity of the outbound broadcast channel.
const BROADCAST_CAPACITY: usize = 64;

/// Capacity of the request channel to the transport.
const REQUEST_CAPACITY: usize = 256;

/// Callback for inbound messages. Pushes any replies and returns `true` if
/// it handled the message.
///
/// Listeners run with the registry locked and must not call back into the
/// gateway.
pub type Listener = Box<dyn FnMut(&InboundMessage, &mut Vec<OutboundMessage>) -> bool + Send>;

/// Handle of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Raw id value.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Result of dispatching one inbound message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dispatch {
    /// Replies pushed by the listeners that ran.
    pub replies: Vec<OutboundMessage>,
    /// Whether a listener handled the message.
    pub handled: bool,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(ListenerId, MessageCategory, Listener)>,
}

/// Removes a listener when dropped.
struct ListenerGuard {
    registry: Arc<Mutex<Registry>>,
    id: ListenerId,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry.listeners.retain(|(id, _, _)| *id != self.id);
    }
}

/// Message hub between matches and the realtime transport.
///
/// Cloning is cheap; clones share listeners and channels.
#[derive(Clone)]
pub struct Gateway {
    registry: Arc<Mutex<Registry>>,
    broadcast: broadcast::Sender<OutboundMessage>,
    requests: mpsc::Sender<OutboundRequest>,
    request_timeout: Duration,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("listeners", &self.listener_count())
            .field("subscribers", &self.broadcast.receiver_count())
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Creates a gateway and the receiving end of its request channel, which
    /// the transport drains.
    #[must_use]
    pub fn new(request_timeout: Duration) -> (Self, mpsc::Receiver<OutboundRequest>) {
        let (broadcast, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (requests, requests_rx) = mpsc::channel(REQUEST_CAPACITY);
        let gateway = Self {
            registry: Arc::default(),
            broadcast,
            requests,
            request_timeout,
        };
        (gateway, requests_rx)
    }

    /// Default request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Registers `listener` for messages of `category`.
    pub fn add_listener(&self, category: MessageCategory, listener: Listener) -> ListenerId {
        let mut registry = self.lock();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.listeners.push((id, category, listener));
        id
    }

    /// Removes a listener. Returns `false` if it was already gone.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut registry = self.lock();
        let before = registry.listeners.len();
        registry.listeners.retain(|(l, _, _)| *l != id);
        registry.listeners.len() != before
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Runs the listeners for `message`'s category in registration order,
    /// stopping after the first one that handles it.
    pub fn dispatch(&self, message: &InboundMessage) -> Dispatch {
        let category = message.category();
        let mut dispatch = Dispatch::default();
        let mut registry = self.lock();
        for (_, _, listener) in registry
            .listeners
            .iter_mut()
            .filter(|(_, c, _)| *c == category)
        {
            if listener(message, &mut dispatch.replies) {
                dispatch.handled = true;
                break;
            }
        }
        if !dispatch.handled {
            tracing::debug!(?category, "inbound message not handled");
        }
        dispatch
    }

    // =========================================================================
    // Broadcast
    // =========================================================================

    /// Sends `message` to every subscriber. Returns how many received it.
    pub fn broadcast(&self, message: OutboundMessage) -> usize {
        self.broadcast.send(message).unwrap_or(0)
    }

    /// Subscribes to broadcasts sent from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OutboundMessage> {
        self.broadcast.subscribe()
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Sends `payload` and waits for the matching response for the default
    /// timeout.
    ///
    /// # Errors
    ///
    /// See [`Gateway::request_with_timeout`].
    pub async fn request(&self, payload: serde_json::Value) -> Result<serde_json::Value, GatewayError> {
        self.request_with_timeout(payload, self.request_timeout).await
    }

    /// Sends `payload` and waits at most `after` for the matching response.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Timeout`] if no response arrived in time,
    /// including when the transport queue stayed full for the whole wait.
    /// Returns [`GatewayError::Disconnected`] if the transport is gone.
    pub async fn request_with_timeout(
        &self,
        payload: serde_json::Value,
        after: Duration,
    ) -> Result<serde_json::Value, GatewayError> {
        let correlation = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        let mut tx = Some(tx);

        let id = self.add_listener(
            MessageCategory::Response,
            Box::new(move |message, _| match message {
                InboundMessage::Response {
                    correlation: c,
                    payload: body,
                } if *c == correlation => {
                    if let Some(tx) = tx.take() {
                        let _ = tx.send(body.clone());
                    }
                    true
                }
                _ => false,
            }),
        );
        let _guard = ListenerGuard {
            registry: Arc::clone(&self.registry),
            id,
        };

        // The deadline covers queueing as well as the response.
        let exchange = async {
            self.requests
                .send(OutboundRequest {
                    correlation,
                    payload,
                })
                .await
                .map_err(|_| GatewayError::Disconnected)?;
            rx.await.map_err(|_| GatewayError::Disconnected)
        };

        match tokio::time::timeout_at(Instant::now() + after, exchange).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(%correlation, ?after, "request timed out");
                Err(GatewayError::Timeout { correlation, after })
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Phase;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn gateway() -> (Gateway, mpsc::Receiver<OutboundRequest>) {
        Gateway::new(Duration::from_millis(5_000))
    }

    fn counting(calls: &Arc<AtomicUsize>, handled: bool) -> Listener {
        let calls = Arc::clone(calls);
        Box::new(move |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            handled
        })
    }

    mod listener_tests {
        use super::*;

        #[test]
        fn first_handler_stops_dispatch() {
            let (gw, _rx) = gateway();
            let first = Arc::new(AtomicUsize::new(0));
            let second = Arc::new(AtomicUsize::new(0));
            let third = Arc::new(AtomicUsize::new(0));
            gw.add_listener(MessageCategory::GameStatus, counting(&first, false));
            gw.add_listener(MessageCategory::GameStatus, counting(&second, true));
            gw.add_listener(MessageCategory::GameStatus, counting(&third, true));

            let dispatch = gw.dispatch(&InboundMessage::GameStatus);

            assert!(dispatch.handled);
            assert_eq!(first.load(Ordering::SeqCst), 1);
            assert_eq!(second.load(Ordering::SeqCst), 1);
            assert_eq!(third.load(Ordering::SeqCst), 0);
        }

        #[test]
        fn other_categories_are_skipped() {
            let (gw, _rx) = gateway();
            let calls = Arc::new(AtomicUsize::new(0));
            gw.add_listener(MessageCategory::PlayerNames, counting(&calls, true));

            let dispatch = gw.dispatch(&InboundMessage::GameState);
            assert!(!dispatch.handled);
            assert_eq!(calls.load(Ordering::SeqCst), 0);
        }

        #[test]
        fn removal_is_immediate_and_idempotent() {
            let (gw, _rx) = gateway();
            let calls = Arc::new(AtomicUsize::new(0));
            let id = gw.add_listener(MessageCategory::GameState, counting(&calls, true));

            assert!(gw.remove_listener(id));
            assert!(!gw.remove_listener(id));
            gw.dispatch(&InboundMessage::GameState);
            assert_eq!(calls.load(Ordering::SeqCst), 0);
            assert_eq!(gw.listener_count(), 0);
        }

        #[test]
        fn replies_are_collected() {
            let (gw, _rx) = gateway();
            gw.add_listener(
                MessageCategory::ConnectionOpen,
                Box::new(|_, replies| {
                    replies.push(OutboundMessage::GameState { phase: Phase::Spawn });
                    false
                }),
            );
            let dispatch = gw.dispatch(&InboundMessage::ConnectionOpen { client: "c1".into() });
            assert!(!dispatch.handled);
            assert_eq!(dispatch.replies.len(), 1);
        }
    }

    mod broadcast_tests {
        use super::*;

        #[tokio::test]
        async fn subscribers_receive_broadcasts() {
            let (gw, _rx) = gateway();
            let mut sub = gw.subscribe();
            assert_eq!(gw.broadcast(OutboundMessage::GameState { phase: Phase::Fight }), 1);
            assert_eq!(
                sub.recv().await.unwrap(),
                OutboundMessage::GameState { phase: Phase::Fight }
            );
        }

        #[test]
        fn broadcast_without_subscribers_is_dropped() {
            let (gw, _rx) = gateway();
            assert_eq!(gw.broadcast(OutboundMessage::GameState { phase: Phase::Fight }), 0);
        }
    }

    mod request_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn response_resolves_request() {
            let (gw, mut rx) = gateway();
            let responder = gw.clone();
            tokio::spawn(async move {
                let request = rx.recv().await.unwrap();
                responder.dispatch(&InboundMessage::Response {
                    correlation: request.correlation,
                    payload: json!({ "echo": request.payload }),
                });
            });

            let response = gw.request(json!("ping")).await.unwrap();
            assert_eq!(response, json!({ "echo": "ping" }));
            assert_eq!(gw.listener_count(), 0);
        }

        #[tokio::test(start_paused = true)]
        async fn timeout_fails_and_removes_listener() {
            let (gw, mut rx) = gateway();
            let start = tokio::time::Instant::now();

            let err = gw.request(json!("ping")).await.unwrap_err();

            assert!(matches!(err, GatewayError::Timeout { after, .. } if after == Duration::from_millis(5_000)));
            assert!(start.elapsed() >= Duration::from_millis(5_000));
            assert_eq!(gw.listener_count(), 0);

            // A late response finds nobody listening.
            let request = rx.recv().await.unwrap();
            let late = gw.dispatch(&InboundMessage::Response {
                correlation: request.correlation,
                payload: json!("late"),
            });
            assert!(!late.handled);
            assert!(late.replies.is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn unrelated_response_is_ignored() {
            let (gw, mut rx) = gateway();
            let responder = gw.clone();
            tokio::spawn(async move {
                let request = rx.recv().await.unwrap();
                let stray = responder.dispatch(&InboundMessage::Response {
                    correlation: Uuid::new_v4(),
                    payload: json!("stray"),
                });
                assert!(!stray.handled);
                responder.dispatch(&InboundMessage::Response {
                    correlation: request.correlation,
                    payload: json!("mine"),
                });
            });

            assert_eq!(gw.request(json!(1)).await.unwrap(), json!("mine"));
        }

        #[tokio::test(start_paused = true)]
        async fn full_transport_queue_times_out() {
            let (gw, rx) = gateway();
            for n in 0..REQUEST_CAPACITY {
                gw.requests
                    .try_send(OutboundRequest {
                        correlation: Uuid::new_v4(),
                        payload: json!(n),
                    })
                    .unwrap();
            }
            let start = tokio::time::Instant::now();

            let outcome = tokio::time::timeout(Duration::from_secs(60), gw.request(json!("queued"))).await;

            assert!(matches!(outcome, Ok(Err(GatewayError::Timeout { .. }))));
            assert!(start.elapsed() >= Duration::from_millis(5_000));
            assert!(start.elapsed() < Duration::from_secs(60));
            assert_eq!(gw.listener_count(), 0);
            drop(rx);
        }

        #[tokio::test]
        async fn closed_transport_is_disconnected() {
            let (gw, rx) = gateway();
            drop(rx);
            assert_eq!(gw.request(json!(1)).await.unwrap_err(), GatewayError::Disconnected);
            assert_eq!(gw.listener_count(), 0);
        }

        #[tokio::test(start_paused = true)]
        async fn dropped_request_removes_listener() {
            let (gw, _rx) = gateway();
            let pending = gw.request(json!(1));
            let _ = tokio::time::timeout(Duration::from_millis(10), pending).await;
            assert_eq!(gw.listener_count(), 0);
        }
    }
}
