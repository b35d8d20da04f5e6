//! In-process cluster fabric
//!
//! Subject-addressed request/reply and pub/sub over typed channels. This is
//! the transport seam between slave proxies and the master endpoint: the
//! member hosting a device registers the device's request subject, remote
//! members send requests to it, and dropping the registration makes every
//! pending and future request fail fast instead of hanging.
//!
//! There is deliberately no request timeout here; callers that need one
//! wrap their own around the returned future.

use crate::{FabricError, Message, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Type alias for request handler channels
type RequestSender = mpsc::UnboundedSender<(Message, oneshot::Sender<Message>)>;

/// Incoming requests for a registered subject
pub struct HandlerRequests {
    receiver: mpsc::UnboundedReceiver<(Message, oneshot::Sender<Message>)>,
}

impl HandlerRequests {
    /// Receive the next request and its reply sender
    ///
    /// Returns `None` once the subject has been deregistered and all queued
    /// requests are drained.
    pub async fn recv(&mut self) -> Option<(Message, oneshot::Sender<Message>)> {
        self.receiver.recv().await
    }
}

/// Shared in-process fabric connecting cluster members
pub struct ClusterFabric {
    /// Request/reply handlers by subject
    handlers: Mutex<HashMap<String, RequestSender>>,

    /// Pub/sub subscriptions by subject
    subscriptions: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<Message>>>>,
}

impl ClusterFabric {
    /// Create a new fabric
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            handlers: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
        })
    }

    /// Register the request handler for a subject, replacing any previous one
    pub fn register_handler(&self, subject: &str) -> HandlerRequests {
        let (tx, rx) = mpsc::unbounded_channel();
        self.handlers.lock().insert(subject.to_string(), tx);
        HandlerRequests { receiver: rx }
    }

    /// Remove the request handler for a subject
    ///
    /// Queued requests fail with [`FabricError::HandlerGone`] once the
    /// handler side drops its receiver.
    pub fn deregister_handler(&self, subject: &str) {
        self.handlers.lock().remove(subject);
    }

    /// Whether a handler is currently registered for a subject
    pub fn has_handler(&self, subject: &str) -> bool {
        self.handlers
            .lock()
            .get(subject)
            .is_some_and(|h| !h.is_closed())
    }

    /// Send a request and wait for the reply
    pub async fn request(&self, subject: &str, message: Message) -> Result<Message> {
        let reply_rx = {
            let mut handlers = self.handlers.lock();
            let Some(handler) = handlers.get(subject) else {
                return Err(FabricError::HandlerGone(subject.to_string()));
            };

            let (reply_tx, reply_rx) = oneshot::channel();
            if handler.send((message, reply_tx)).is_err() {
                // Receiver dropped without deregistering; clean up the entry
                handlers.remove(subject);
                return Err(FabricError::HandlerGone(subject.to_string()));
            }
            reply_rx
        };

        reply_rx
            .await
            .map_err(|_| FabricError::HandlerGone(subject.to_string()))
    }

    /// Publish messages to a subject (fire and forget)
    pub fn publish(&self, subject: &str, messages: Vec<Message>) {
        let mut subs = self.subscriptions.lock();
        if let Some(subscribers) = subs.get_mut(subject) {
            subscribers.retain(|s| !s.is_closed());
            for sub in subscribers.iter() {
                for msg in &messages {
                    let _ = sub.send(msg.clone());
                }
            }
        }
    }

    /// Subscribe to a subject
    pub fn subscribe(&self, subject: &str) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscriptions
            .lock()
            .entry(subject.to_string())
            .or_default()
            .push(tx);
        rx
    }
}
