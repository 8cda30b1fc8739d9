//! Domain events for the inventory context.
//!
//! Payloads are stored as flat records produced by [`JsonConverter`], so a
//! stored `ItemStocked` looks like `{"ItemStocked.sku": "..", "ItemStocked.quantity": 3}`.

use keel_core::convert::{Converter, JsonConverter, Record};
use keel_core::event::{DomainEvent, EventMetadata};
use keel_core::repository::StoredEvent;
use serde::{Deserialize, Serialize};

/// Event type of [`InventoryEventKind::ItemStocked`].
pub const ITEM_STOCKED_EVENT_TYPE: &str = "inventory.item_stocked";
/// Event type of [`InventoryEventKind::ItemRemoved`].
pub const ITEM_REMOVED_EVENT_TYPE: &str = "inventory.item_removed";
/// Event type of [`InventoryEventKind::StockDepleted`].
pub const STOCK_DEPLETED_EVENT_TYPE: &str = "inventory.stock_depleted";

/// Emitted when units of a SKU are added to an inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStocked {
    /// Stock keeping unit.
    pub sku: String,
    /// Units added.
    pub quantity: u32,
}

/// Emitted when units of a SKU are taken out of an inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRemoved {
    /// Stock keeping unit.
    pub sku: String,
    /// Units removed.
    pub quantity: u32,
}

/// Emitted when the last unit of a SKU has been removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDepleted {
    /// Stock keeping unit.
    pub sku: String,
}

/// Event payload variants for the inventory context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEventKind {
    /// Units were added.
    ItemStocked(ItemStocked),
    /// Units were removed.
    ItemRemoved(ItemRemoved),
    /// A SKU ran out.
    StockDepleted(StockDepleted),
}

impl InventoryEventKind {
    /// Decodes the payload of a stored inventory event.
    ///
    /// # Errors
    ///
    /// Returns the deserializer error if the payload is not an inventory
    /// event record.
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let serde_json::Value::Object(record) = payload else {
            return Err(serde::de::Error::custom("inventory payload must be a record"));
        };
        let record: Record = record.clone();
        Converter::<Self>::decode(&JsonConverter, record).map_err(serde::de::Error::custom)
    }
}

/// Domain event envelope for the inventory context.
#[derive(Debug, Clone)]
pub struct InventoryEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: InventoryEventKind,
}

impl DomainEvent for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match &self.kind {
            InventoryEventKind::ItemStocked(_) => ITEM_STOCKED_EVENT_TYPE,
            InventoryEventKind::ItemRemoved(_) => ITEM_REMOVED_EVENT_TYPE,
            InventoryEventKind::StockDepleted(_) => STOCK_DEPLETED_EVENT_TYPE,
        }
    }

    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        let record = Converter::<InventoryEventKind>::encode(&JsonConverter, &self.kind)
            .map_err(<serde_json::Error as serde::ser::Error>::custom)?;
        Ok(serde_json::Value::Object(record))
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn from_stored(stored: &StoredEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            metadata: EventMetadata::from_stored(stored),
            kind: InventoryEventKind::from_payload(&stored.payload)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use keel_core::identity::Identifier;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    fn stocked_event() -> InventoryEvent {
        InventoryEvent {
            metadata: EventMetadata {
                event_id: Uuid::from_u128(1),
                event_type: ITEM_STOCKED_EVENT_TYPE.into(),
                aggregate_id: Identifier::new("warehouse-1"),
                sequence_number: 1,
                correlation_id: Uuid::nil(),
                causation_id: Uuid::nil(),
                occurred_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            },
            kind: InventoryEventKind::ItemStocked(ItemStocked {
                sku: "widget".into(),
                quantity: 3,
            }),
        }
    }

    #[test]
    fn test_payload_is_a_flat_record() {
        // Act
        let payload = stocked_event().to_payload().unwrap();

        // Assert
        assert_eq!(
            payload,
            json!({ "ItemStocked.sku": "widget", "ItemStocked.quantity": 3 })
        );
    }

    #[test]
    fn test_from_stored_restores_kind_and_metadata() {
        let event = stocked_event();
        let stored = StoredEvent::from_event(&event).unwrap();

        let decoded = InventoryEvent::from_stored(&stored).unwrap();

        assert_eq!(decoded.kind, event.kind);
        assert_eq!(decoded.metadata, event.metadata);
    }

    #[test]
    fn test_from_payload_rejects_non_record() {
        let result = InventoryEventKind::from_payload(&json!(["ItemStocked"]));

        assert!(result.is_err());
    }
}
