//! Per-member client handle onto the cluster fabric

use crate::{HandlerRequests, Message, Result, fabric::ClusterFabric};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Client for one cluster member
#[derive(Clone)]
pub struct FabricClient {
    /// Member node ID
    node_id: String,

    /// Reference to the shared fabric
    fabric: Arc<ClusterFabric>,
}

impl FabricClient {
    /// Create a new client
    pub fn new(node_id: impl Into<String>, fabric: Arc<ClusterFabric>) -> Self {
        Self {
            node_id: node_id.into(),
            fabric,
        }
    }

    /// Get the node ID of this client
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Send a request and wait for the reply
    pub async fn request(&self, subject: &str, message: impl Into<Message>) -> Result<Message> {
        self.fabric.request(subject, message.into()).await
    }

    /// Register the request handler for a subject
    pub fn register_handler(&self, subject: &str) -> HandlerRequests {
        self.fabric.register_handler(subject)
    }

    /// Remove the request handler for a subject
    pub fn deregister_handler(&self, subject: &str) {
        self.fabric.deregister_handler(subject)
    }

    /// Whether any member currently serves a subject
    pub fn has_responders(&self, subject: &str) -> bool {
        self.fabric.has_handler(subject)
    }

    /// Publish messages to a subject
    pub fn publish(&self, subject: &str, messages: Vec<Message>) {
        self.fabric.publish(subject, messages)
    }

    /// Subscribe to a subject
    pub fn subscribe(&self, subject: &str) -> SubscriptionStream {
        SubscriptionStream {
            receiver: self.fabric.subscribe(subject),
        }
    }
}

/// Stream of messages from a pub/sub subscription
pub struct SubscriptionStream {
    receiver: mpsc::UnboundedReceiver<Message>,
}

impl SubscriptionStream {
    /// Receive the next message
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    /// Try to receive without blocking
    pub fn try_recv(&mut self) -> Option<Message> {
        self.receiver.try_recv().ok()
    }
}

impl futures::Stream for SubscriptionStream {
    type Item = Message;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
