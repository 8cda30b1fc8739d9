//! The inventory aggregate.

use std::collections::BTreeMap;

use keel_core::aggregate::{AggregateRoot, SnapshotCodec};
use keel_core::clock::Clock;
use keel_core::error::DomainError;
use keel_core::event::EventMetadata;
use keel_core::identity::{Identifier, IdentifierFactory};
use keel_core::object::{Capability, DomainObject};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{
    ITEM_REMOVED_EVENT_TYPE, ITEM_STOCKED_EVENT_TYPE, InventoryEvent, InventoryEventKind,
    ItemRemoved, ItemStocked, STOCK_DEPLETED_EVENT_TYPE, StockDepleted,
};

/// Ambient inputs every command needs to mint events.
#[derive(Clone, Copy)]
pub struct CommandContext<'a> {
    /// Correlation ID shared by every event the command records.
    pub correlation_id: Uuid,
    /// Timestamps events.
    pub clock: &'a dyn Clock,
    /// Mints event IDs.
    pub ids: &'a dyn IdentifierFactory,
}

impl std::fmt::Debug for CommandContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("correlation_id", &self.correlation_id)
            .finish_non_exhaustive()
    }
}

/// Stock held in one warehouse, per SKU.
#[derive(Debug, Serialize, Deserialize)]
pub struct Inventory {
    /// Aggregate identifier.
    pub id: Identifier,
    /// Current version (event count).
    version: i64,
    /// Units on hand per SKU. SKUs with no stock are absent.
    stock: BTreeMap<String, u32>,
    /// Uncommitted events pending persistence.
    #[serde(skip)]
    uncommitted_events: Vec<InventoryEvent>,
}

impl Inventory {
    /// Creates an empty inventory.
    #[must_use]
    pub fn new(id: Identifier) -> Self {
        Self {
            id,
            version: 0,
            stock: BTreeMap::new(),
            uncommitted_events: Vec::new(),
        }
    }

    /// Committed units on hand for `sku`.
    #[must_use]
    pub fn quantity(&self, sku: &str) -> u32 {
        self.stock.get(sku).copied().unwrap_or(0)
    }

    /// Committed stock, per SKU.
    #[must_use]
    pub fn stock(&self) -> &BTreeMap<String, u32> {
        &self.stock
    }

    /// Units on hand once the uncommitted events are applied.
    fn projected_quantity(&self, sku: &str) -> u32 {
        self.uncommitted_events
            .iter()
            .fold(self.quantity(sku), |acc, event| match &event.kind {
                InventoryEventKind::ItemStocked(e) if e.sku == sku => acc.saturating_add(e.quantity),
                InventoryEventKind::ItemRemoved(e) if e.sku == sku => acc.saturating_sub(e.quantity),
                _ => acc,
            })
    }

    fn record(&mut self, event_type: &str, kind: InventoryEventKind, ctx: &CommandContext<'_>) {
        let pending = i64::try_from(self.uncommitted_events.len()).unwrap_or(i64::MAX);
        let event = InventoryEvent {
            metadata: EventMetadata {
                event_id: ctx.ids.new_uuid(),
                event_type: event_type.to_owned(),
                aggregate_id: self.id.clone(),
                sequence_number: self.version + pending + 1,
                correlation_id: ctx.correlation_id,
                causation_id: ctx.correlation_id,
                occurred_at: ctx.clock.now(),
            },
            kind,
        };
        self.uncommitted_events.push(event);
    }

    /// Adds units of a SKU, producing an `ItemStocked` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `quantity` is zero, the SKU is
    /// blank, or the units on hand would exceed `u32::MAX`.
    pub fn stock_item(
        &mut self,
        sku: &str,
        quantity: u32,
        ctx: &CommandContext<'_>,
    ) -> Result<(), DomainError> {
        if sku.trim().is_empty() {
            return Err(DomainError::Validation("sku must not be blank".into()));
        }
        if quantity == 0 {
            return Err(DomainError::Validation(format!(
                "cannot stock zero units of {sku}"
            )));
        }
        if self.projected_quantity(sku).checked_add(quantity).is_none() {
            return Err(DomainError::Validation(format!(
                "stocking {quantity} of {sku} would overflow inventory {}",
                self.id
            )));
        }
        self.record(
            ITEM_STOCKED_EVENT_TYPE,
            InventoryEventKind::ItemStocked(ItemStocked {
                sku: sku.to_owned(),
                quantity,
            }),
            ctx,
        );
        Ok(())
    }

    /// Takes units of a SKU out, producing an `ItemRemoved` event, followed by
    /// `StockDepleted` when nothing is left.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `quantity` is zero or exceeds the
    /// units on hand.
    pub fn remove_item(
        &mut self,
        sku: &str,
        quantity: u32,
        ctx: &CommandContext<'_>,
    ) -> Result<(), DomainError> {
        let available = self.projected_quantity(sku);
        if quantity == 0 || quantity > available {
            return Err(DomainError::Validation(format!(
                "cannot remove {quantity} of {sku} from inventory {}: {available} on hand",
                self.id
            )));
        }
        self.record(
            ITEM_REMOVED_EVENT_TYPE,
            InventoryEventKind::ItemRemoved(ItemRemoved {
                sku: sku.to_owned(),
                quantity,
            }),
            ctx,
        );
        if quantity == available {
            self.record(
                STOCK_DEPLETED_EVENT_TYPE,
                InventoryEventKind::StockDepleted(StockDepleted {
                    sku: sku.to_owned(),
                }),
                ctx,
            );
        }
        Ok(())
    }
}

impl AggregateRoot for Inventory {
    type Event = InventoryEvent;
    const AGGREGATE_TYPE: &'static str = "inventory";

    fn aggregate_id(&self) -> &Identifier {
        &self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        match &event.kind {
            InventoryEventKind::ItemStocked(payload) => {
                let on_hand = self.stock.entry(payload.sku.clone()).or_insert(0);
                *on_hand = on_hand.saturating_add(payload.quantity);
            }
            InventoryEventKind::ItemRemoved(payload) => {
                let remaining = self.quantity(&payload.sku).saturating_sub(payload.quantity);
                if remaining == 0 {
                    self.stock.remove(&payload.sku);
                } else {
                    self.stock.insert(payload.sku.clone(), remaining);
                }
            }
            InventoryEventKind::StockDepleted(_) => {}
        }
        self.version += 1;
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn clear_uncommitted_events(&mut self) {
        self.uncommitted_events.clear();
    }

    fn snapshot_codec() -> Option<SnapshotCodec<Self>> {
        Some(SnapshotCodec::json())
    }
}

impl DomainObject for Inventory {
    fn into_capability(self: Box<Self>) -> Capability {
        Capability::Aggregate(self)
    }
}
