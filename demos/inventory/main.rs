//! Inventory service example
//!
//! This example demonstrates:
//! - Registering a resource type over the in-memory record store
//! - A global internal mutation rule (`color` projected from meta)
//! - A functional rule hiding `price` for red items
//! - An external rule resolving `vendor` through the `vendors` service
//! - Mutation presets copied into an account via `/equipment/mutations/setup`
//! - Lifecycle events logged from the event bus
//!
//! Run with `RUST_LOG=resource_mesh=debug,tower_http=debug cargo run --example inventory`.

use anyhow::Result;
use resource_mesh::prelude::*;
use tracing_subscriber::EnvFilter;

fn seed_item(body: Value) -> ResourceItem {
    match body {
        Value::Object(map) => ResourceItem::from_body(map),
        _ => ResourceItem::from_body(Default::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::var("API_CONFIG")
        .unwrap_or_else(|_| "demos/inventory/api.yaml".to_string());
    let config = ApiConfig::from_yaml_file(&config_path)?;
    tracing::info!(
        services = config.services.len(),
        max_results = config.max_results,
        "configuration loaded"
    );

    // Rules
    let rules = InMemoryMutationStore::new();
    rules
        .create(
            MutationRecord::internal("color").with_dependencies(vec![DependencyRecord {
                condition: "eq".to_string(),
                kind: "internal".to_string(),
                value: json!("red"),
                actions: vec![ActionRecord {
                    method: "hide".to_string(),
                    key: "price".to_string(),
                    params: None,
                }],
            }]),
        )
        .await?;
    rules
        .create(MutationRecord::external("vendor", "vendors"))
        .await?;
    rules.add_preset(MutationRecord::internal("warehouse"))?;
    rules.add_preset(MutationRecord::internal("serial_number"))?;

    // Records
    let equipment = InMemoryRecordStore::new();
    for (name, color, price) in [("Drill", "red", 120), ("Saw", "blue", 80), ("Ladder", "grey", 45)] {
        let item = equipment
            .create(seed_item(json!({
                "name": name,
                "price": price,
                "meta": { "color": color, "warehouse": "north" },
            })))
            .await?;
        println!("   - {}: {}", name, item.id);
    }

    let builder = ServerBuilder::new()
        .with_config(config.clone())
        .with_connection_service(InMemoryConnectionService::new())
        .with_mutation_store(rules)
        .with_event_bus(config.event_bus_capacity)
        .register_resource(
            ResourceDefinition::new("equipment", "equipment")
                .with_searchable(["id", "name", "price"]),
            equipment,
        );

    let host = std::sync::Arc::new(builder.build_host()?);
    if let Some(bus) = host.event_bus() {
        let mut events = bus.subscribe();
        tokio::spawn(async move {
            while let Ok(envelope) = events.recv().await {
                tracing::info!(
                    kind = envelope.event.event_kind(),
                    action = envelope.event.action(),
                    item_id = %envelope.event.item_id(),
                    "event"
                );
            }
        });
    }

    let app = RestExposure::build_router(host, vec![])?;
    let addr = "127.0.0.1:3000";
    let listener = tokio::net::TcpListener::bind(addr).await?;

    println!("\n🌐 Server running on http://{}", addr);
    println!("   GET    /equipment?name_like=dr");
    println!("   GET    /equipment?with_connections=1");
    println!("   GET    /equipment/{{id}}?columns=id,name,color");
    println!("   POST   /equipment/{{id}}/attach      {{\"service\":\"vendors\",\"service_id\":\"7\"}}");
    println!("   POST   /equipment/mutations/setup  {{\"account_id\":\"<uuid>\"}}");
    println!("   GET    /health\n");

    axum::serve(listener, app).await?;
    Ok(())
}
