use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tenderdesk_core::{Aggregate, AggregateId, AggregateRoot, DomainError, ValueObject};
use tenderdesk_events::Event;

/// Store identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(pub AggregateId);

impl StoreId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for StoreId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One ledger line of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreItem {
    pub name: String,
    pub quantity: i64,
}

impl ValueObject for StoreItem {}

/// Aggregate root: Store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Store {
    id: StoreId,
    name: String,
    items: Vec<StoreItem>,
    version: u64,
    created: bool,
}

impl Store {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: StoreId) -> Self {
        Self {
            id,
            name: String::new(),
            items: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> StoreId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn items(&self) -> &[StoreItem] {
        &self.items
    }

    pub fn quantity_of(&self, item_name: &str) -> i64 {
        self.items
            .iter()
            .find(|i| i.name == item_name)
            .map(|i| i.quantity)
            .unwrap_or(0)
    }
}

impl AggregateRoot for Store {
    type Id = StoreId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenStore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenStore {
    pub store_id: StoreId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustItem.
///
/// Additive delta against one item line; a line is appended on first mention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustItem {
    pub store_id: StoreId,
    pub item_name: String,
    pub delta: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreCommand {
    OpenStore(OpenStore),
    AdjustItem(AdjustItem),
}

/// Event: StoreOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOpened {
    pub store_id: StoreId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StoreItemAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreItemAdjusted {
    pub store_id: StoreId,
    pub item_name: String,
    pub delta: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreEvent {
    StoreOpened(StoreOpened),
    StoreItemAdjusted(StoreItemAdjusted),
}

impl Event for StoreEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StoreEvent::StoreOpened(_) => "stores.store.opened",
            StoreEvent::StoreItemAdjusted(_) => "stores.store.item_adjusted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StoreEvent::StoreOpened(e) => e.occurred_at,
            StoreEvent::StoreItemAdjusted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Store {
    type Command = StoreCommand;
    type Event = StoreEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StoreEvent::StoreOpened(e) => {
                self.id = e.store_id;
                self.name = e.name.clone();
                self.items.clear();
                self.created = true;
            }
            StoreEvent::StoreItemAdjusted(e) => {
                match self.items.iter_mut().find(|i| i.name == e.item_name) {
                    Some(item) => item.quantity += e.delta,
                    None => self.items.push(StoreItem {
                        name: e.item_name.clone(),
                        quantity: e.delta,
                    }),
                }
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StoreCommand::OpenStore(cmd) => self.handle_open(cmd),
            StoreCommand::AdjustItem(cmd) => self.handle_adjust(cmd),
        }
    }
}

impl Store {
    fn ensure_store_id(&self, store_id: StoreId) -> Result<(), DomainError> {
        if self.id != store_id {
            return Err(DomainError::validation("store_id mismatch"));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenStore) -> Result<Vec<StoreEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("store already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("store name cannot be empty"));
        }

        Ok(vec![StoreEvent::StoreOpened(StoreOpened {
            store_id: cmd.store_id,
            name: cmd.name.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustItem) -> Result<Vec<StoreEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_store_id(cmd.store_id)?;

        if cmd.item_name.trim().is_empty() {
            return Err(DomainError::validation("item name cannot be empty"));
        }
        if cmd.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        if self.quantity_of(&cmd.item_name) + cmd.delta < 0 {
            return Err(DomainError::invalid_transition(
                "item quantity cannot go negative",
            ));
        }

        Ok(vec![StoreEvent::StoreItemAdjusted(StoreItemAdjusted {
            store_id: cmd.store_id,
            item_name: cmd.item_name.clone(),
            delta: cmd.delta,
            occurred_at: cmd.occurred_at,
        })])
    }
}
