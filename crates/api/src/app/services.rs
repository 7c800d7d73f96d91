use std::sync::Arc;

use serde_json::Value as JsonValue;

use tenderdesk_events::{EventBus, EventEnvelope, InMemoryEventBus};
use tenderdesk_infra::event_store::InMemoryEventStore;
use tenderdesk_infra::procurement::ProcurementService;

/// Concrete in-memory wiring of the procurement service.
pub type Procurement =
    ProcurementService<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

pub struct AppServices {
    pub procurement: Procurement,
}

/// In-memory infra wiring (dev/test): event store + bus + procurement service.
pub fn build_in_memory_services() -> AppServices {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());

    // Background subscriber: every committed event ends up in the structured
    // log, independent of the request that produced it.
    {
        let sub = bus.subscribe();
        tokio::task::spawn_blocking(move || {
            loop {
                match sub.recv() {
                    Ok(env) => {
                        tracing::debug!(
                            aggregate_type = env.aggregate_type(),
                            aggregate_id = %env.aggregate_id(),
                            sequence_number = env.sequence_number(),
                            "event committed"
                        );
                    }
                    Err(_) => break,
                }
            }
        });
    }

    AppServices {
        procurement: ProcurementService::new(store, bus),
    }
}
