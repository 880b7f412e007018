//! Shared fixtures for doppel workspace tests.
//!
//! The standard topology is three resources in one containment chain:
//! a resource group holding a virtual network holding a VM.

#![allow(missing_docs)]

use std::sync::Arc;

use doppel_abstract::{AbstractionSeed, IdAbstractor};
use doppel_graph::{GraphStore, LayerId, MemoryGraphStore, PropertyBag, TenantId};
use doppel_ingest::{
    DualNodeWriter, RelationshipDuplicator, RelationshipFact, ResourceDescriptor, ScanSession,
};
use serde_json::json;

pub const RG_ID: &str = "/subscriptions/abc/resourceGroups/prod-rg";
pub const VNET_ID: &str =
    "/subscriptions/abc/resourceGroups/prod-rg/providers/Microsoft.Network/virtualNetworks/corp";
pub const VM_ID: &str =
    "/subscriptions/abc/resourceGroups/prod-rg/providers/Microsoft.Compute/virtualMachines/web-01";

pub fn memory_store() -> Arc<dyn GraphStore> {
    Arc::new(MemoryGraphStore::new())
}

pub fn fixture_descriptors() -> Vec<ResourceDescriptor> {
    let mut vnet_props = PropertyBag::new();
    vnet_props.insert("addressSpace".into(), json!("10.0.0.0/16"));
    let mut vm_props = PropertyBag::new();
    vm_props.insert("name".into(), json!("web-01"));
    vm_props.insert("location".into(), json!("westeurope"));
    vec![
        ResourceDescriptor::new(
            RG_ID,
            "Microsoft.Resources/resourceGroups",
            PropertyBag::new(),
        ),
        ResourceDescriptor::new(VNET_ID, "Microsoft.Network/virtualNetworks", vnet_props),
        ResourceDescriptor::new(VM_ID, "Microsoft.Compute/virtualMachines", vm_props),
    ]
}

pub fn session_with_seed(tenant: TenantId, layer: LayerId, seed: [u8; 32]) -> Arc<ScanSession> {
    Arc::new(ScanSession::new(
        tenant,
        layer,
        IdAbstractor::new(AbstractionSeed::from_bytes(seed)),
    ))
}

/// Scan arbitrary descriptors into a layer, panicking on any rejection.
///
/// Returns the session so callers can keep linking relationships.
pub async fn scan_descriptors(
    store: &Arc<dyn GraphStore>,
    tenant: TenantId,
    layer: &LayerId,
    seed: [u8; 32],
    descriptors: Vec<ResourceDescriptor>,
) -> Arc<ScanSession> {
    let session = session_with_seed(tenant, layer.clone(), seed);
    let writer = DualNodeWriter::new(Arc::clone(store), Arc::clone(&session));
    let report = writer.write_batch(descriptors).await;
    assert!(report.is_clean(), "fixture scan failed: {report:?}");
    session
}

/// Scan the standard fixture plus its two containment edges.
pub async fn scan_fixture(
    store: &Arc<dyn GraphStore>,
    tenant: TenantId,
    layer: &LayerId,
    seed: [u8; 32],
) -> Arc<ScanSession> {
    let session = scan_descriptors(store, tenant, layer, seed, fixture_descriptors()).await;
    let links = RelationshipDuplicator::new(Arc::clone(store), Arc::clone(&session));
    links
        .link(RelationshipFact::new(RG_ID, VNET_ID, "CONTAINS"))
        .await
        .unwrap();
    links
        .link(RelationshipFact::new(VNET_ID, VM_ID, "CONTAINS"))
        .await
        .unwrap();
    session
}

/// Install a fmt subscriber for a test run. Safe to call repeatedly.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
