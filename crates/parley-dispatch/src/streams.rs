// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One bounded, unicast output stream per category.

use std::collections::HashMap;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use parley_core::{Category, RtmMessage, TenantId};

/// A classified event handed to category consumers, with the bot that
/// should answer it.
#[derive(Debug, Clone)]
pub struct Delivery<B> {
    pub tenant: TenantId,
    pub category: Category,
    pub message: RtmMessage,
    pub bot: B,
}

/// Category streams. Publishing never waits: when a stream's buffer is full
/// (or nobody subscribed and it filled up) the new event is dropped.
pub struct CategoryStreams<B> {
    senders: HashMap<Category, mpsc::Sender<Delivery<B>>>,
    receivers: DashMap<Category, mpsc::Receiver<Delivery<B>>>,
}

impl<B: Send + 'static> CategoryStreams<B> {
    pub fn new(capacity: usize) -> Self {
        let mut senders = HashMap::new();
        let receivers = DashMap::new();
        for category in Category::ALL {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            senders.insert(category, tx);
            receivers.insert(category, rx);
        }
        Self { senders, receivers }
    }

    /// Take the receiving end of `category`. Each stream has one consumer,
    /// so later calls return `None`.
    pub fn subscribe(&self, category: Category) -> Option<mpsc::Receiver<Delivery<B>>> {
        self.receivers.remove(&category).map(|(_, rx)| rx)
    }

    /// Returns false when the event was dropped.
    pub fn publish(&self, delivery: Delivery<B>) -> bool {
        let category = delivery.category;
        let Some(tx) = self.senders.get(&category) else {
            return false;
        };
        match tx.try_send(delivery) {
            Ok(()) => {
                debug!(category = %category, "event published");
                true
            }
            Err(TrySendError::Full(d)) => {
                warn!(
                    category = %category,
                    tenant = %d.tenant,
                    "category stream full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(d)) => {
                debug!(
                    category = %category,
                    tenant = %d.tenant,
                    "category consumer gone, dropping event"
                );
                false
            }
        }
    }
}
