//! Resource-type taxonomy: cloud types to abstracted-id prefixes
//!
//! Lookup is two-stage: exact full type first (handles ambiguous final
//! segments like `servers`), then the final type segment, then
//! [`DEFAULT_PREFIX`]. Matching is case-insensitive; ARM type strings
//! arrive in mixed casings depending on which API produced them.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Prefix used when no taxonomy entry matches
pub const DEFAULT_PREFIX: &str = "resource";

static FULL_TYPE_PREFIXES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("microsoft.compute/virtualmachines", "vm"),
        ("microsoft.compute/disks", "disk"),
        ("microsoft.storage/storageaccounts", "storage"),
        ("microsoft.network/virtualnetworks", "vnet"),
        ("microsoft.network/virtualnetworks/subnets", "subnet"),
        ("microsoft.network/networkinterfaces", "nic"),
        ("microsoft.network/networksecuritygroups", "nsg"),
        ("microsoft.network/publicipaddresses", "pip"),
        ("microsoft.network/loadbalancers", "lb"),
        ("microsoft.network/dnszones", "dns"),
        ("microsoft.network/privatednszones", "dns"),
        ("microsoft.keyvault/vaults", "kv"),
        ("microsoft.managedidentity/userassignedidentities", "identity"),
        ("microsoft.sql/servers", "sql"),
        ("microsoft.sql/servers/databases", "sql"),
        ("microsoft.dbforpostgresql/flexibleservers", "sql"),
        ("microsoft.web/sites", "app"),
        ("microsoft.web/sites/functions", "func"),
        ("microsoft.resources/resourcegroups", "rg"),
        ("microsoft.resources/subscriptions", "sub"),
        ("microsoft.containerservice/managedclusters", "aks"),
        ("microsoft.containerregistry/registries", "acr"),
        ("microsoft.documentdb/databaseaccounts", "cosmos"),
    ])
});

static SEGMENT_PREFIXES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("virtualmachines", "vm"),
        ("disks", "disk"),
        ("storageaccounts", "storage"),
        ("virtualnetworks", "vnet"),
        ("subnets", "subnet"),
        ("networkinterfaces", "nic"),
        ("networksecuritygroups", "nsg"),
        ("publicipaddresses", "pip"),
        ("loadbalancers", "lb"),
        ("dnszones", "dns"),
        ("privatednszones", "dns"),
        ("vaults", "kv"),
        ("userassignedidentities", "identity"),
        ("servers", "sql"),
        ("flexibleservers", "sql"),
        ("databases", "sql"),
        ("sites", "app"),
        ("functions", "func"),
        ("resourcegroups", "rg"),
        ("subscriptions", "sub"),
        ("managedclusters", "aks"),
        ("registries", "acr"),
        ("databaseaccounts", "cosmos"),
    ])
});

/// Prefix for a cloud resource type
///
/// `resource_type` may be a full ARM type
/// (`Microsoft.Compute/virtualMachines`), a bare type segment
/// (`virtualMachines`) or anything else (falls back to
/// [`DEFAULT_PREFIX`]).
#[must_use]
pub fn type_prefix(resource_type: &str) -> &'static str {
    let lowered = resource_type.to_ascii_lowercase();
    if let Some(prefix) = FULL_TYPE_PREFIXES.get(lowered.as_str()) {
        return prefix;
    }
    let segment = lowered.rsplit('/').next().unwrap_or(lowered.as_str());
    SEGMENT_PREFIXES
        .get(segment)
        .copied()
        .unwrap_or(DEFAULT_PREFIX)
}
