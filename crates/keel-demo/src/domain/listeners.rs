//! Listeners over the inventory event stream.

use std::collections::{BTreeMap, BTreeSet};

use keel_core::error::DomainError;
use keel_core::identity::Identifier;
use keel_core::listener::EventListener;
use keel_core::object::{Capability, DomainObject};
use keel_core::repository::StoredEvent;
use keel_core::subscription::Subscription;

use super::events::{
    ITEM_REMOVED_EVENT_TYPE, ITEM_STOCKED_EVENT_TYPE, InventoryEventKind,
    STOCK_DEPLETED_EVENT_TYPE,
};

fn decode(event: &StoredEvent) -> Result<InventoryEventKind, DomainError> {
    InventoryEventKind::from_payload(&event.payload).map_err(|e| {
        DomainError::Infrastructure(format!(
            "event {} could not be decoded: {e}",
            event.event_id
        ))
    })
}

/// Read model of units on hand per `(warehouse, sku)` across all inventories.
#[derive(Debug)]
pub struct StockLevels {
    subscription: Subscription,
    levels: BTreeMap<(Identifier, String), u32>,
}

impl StockLevels {
    /// Creates an empty projection that has seen no events.
    #[must_use]
    pub fn new(listener_id: Identifier) -> Self {
        Self {
            subscription: Subscription::new(listener_id),
            levels: BTreeMap::new(),
        }
    }

    /// Units on hand for `sku` in `warehouse`.
    #[must_use]
    pub fn level(&self, warehouse: &Identifier, sku: &str) -> u32 {
        self.levels
            .get(&(warehouse.clone(), sku.to_owned()))
            .copied()
            .unwrap_or(0)
    }

    /// Units on hand for `sku` across every warehouse.
    #[must_use]
    pub fn total(&self, sku: &str) -> u32 {
        self.levels
            .iter()
            .filter(|((_, s), _)| s == sku)
            .map(|(_, quantity)| quantity)
            .sum()
    }
}

impl EventListener for StockLevels {
    fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    fn subscription_mut(&mut self) -> &mut Subscription {
        &mut self.subscription
    }

    fn interested_in(&self, event_type: &str) -> bool {
        event_type == ITEM_STOCKED_EVENT_TYPE || event_type == ITEM_REMOVED_EVENT_TYPE
    }

    fn handle(&mut self, event: &StoredEvent) -> Result<(), DomainError> {
        match decode(event)? {
            InventoryEventKind::ItemStocked(e) => {
                let key = (event.aggregate_id.clone(), e.sku);
                let level = self.levels.entry(key).or_insert(0);
                *level = level.saturating_add(e.quantity);
            }
            InventoryEventKind::ItemRemoved(e) => {
                let key = (event.aggregate_id.clone(), e.sku);
                let level = self.levels.entry(key).or_insert(0);
                *level = level.saturating_sub(e.quantity);
            }
            InventoryEventKind::StockDepleted(_) => {}
        }
        Ok(())
    }
}

impl DomainObject for StockLevels {
    fn into_capability(self: Box<Self>) -> Capability {
        Capability::Listener(self)
    }
}

/// Process manager that opens a restock request whenever a SKU runs out and
/// completes once every open request has been restocked.
///
/// It must be started by a `StockDepleted` event. Open requests live in
/// memory only, so an instance resumed from a recorded subscription tracks
/// the depletions it sees after resuming and completes only when one of those
/// is fulfilled.
#[derive(Debug)]
pub struct RestockProcess {
    subscription: Subscription,
    open: BTreeSet<(Identifier, String)>,
    fulfilled: Vec<(Identifier, String)>,
}

impl RestockProcess {
    /// Creates a process that has not started yet.
    #[must_use]
    pub fn new(listener_id: Identifier) -> Self {
        Self {
            subscription: Subscription::new(listener_id),
            open: BTreeSet::new(),
            fulfilled: Vec::new(),
        }
    }

    /// Restock requests not yet fulfilled.
    pub fn open_requests(&self) -> impl Iterator<Item = &(Identifier, String)> {
        self.open.iter()
    }

    /// Fulfilled requests, in fulfilment order.
    #[must_use]
    pub fn fulfilled(&self) -> &[(Identifier, String)] {
        &self.fulfilled
    }
}

impl EventListener for RestockProcess {
    fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    fn subscription_mut(&mut self) -> &mut Subscription {
        &mut self.subscription
    }

    fn interested_in(&self, event_type: &str) -> bool {
        // Restocks only matter once a request is open.
        event_type == STOCK_DEPLETED_EVENT_TYPE
            || (self.subscription.has_started() && event_type == ITEM_STOCKED_EVENT_TYPE)
    }

    fn starting_event_types(&self) -> Option<&'static [&'static str]> {
        Some(&[STOCK_DEPLETED_EVENT_TYPE])
    }

    fn handle(&mut self, event: &StoredEvent) -> Result<(), DomainError> {
        match decode(event)? {
            InventoryEventKind::StockDepleted(e) => {
                tracing::info!(warehouse = %event.aggregate_id, sku = %e.sku, "restock requested");
                self.open.insert((event.aggregate_id.clone(), e.sku));
            }
            InventoryEventKind::ItemStocked(e) => {
                let key = (event.aggregate_id.clone(), e.sku);
                if self.open.remove(&key) {
                    self.fulfilled.push(key);
                    if self.open.is_empty() {
                        self.subscription.complete();
                    }
                }
            }
            InventoryEventKind::ItemRemoved(_) => {}
        }
        Ok(())
    }
}

impl DomainObject for RestockProcess {
    fn into_capability(self: Box<Self>) -> Capability {
        Capability::Listener(self)
    }
}
