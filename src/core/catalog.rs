//! AF-002: Type catalog: closed set of resource kinds and their matchers.
//!
//! Each [`ResourceKind`] variant knows the (module, type name) pair that
//! identifies it in source, the ARM provider type it synthesizes to, and the
//! API version stamped on its fragment. A [`TypeCatalog`] anchors the module
//! names under a crate path (default `armforge::azure`) and is passed
//! explicitly into discovery.

use std::fmt;

/// Default crate path that resource-kind modules live under.
pub const DEFAULT_CATALOG_ROOT: &str = "armforge::azure";

/// Resource kind enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    StorageAccount,
    BlobContainer,
    VirtualNetwork,
    Subnet,
    NetworkSecurityGroup,
    PublicIpAddress,
    NetworkInterface,
    VirtualMachine,
    AppServicePlan,
    WebSite,
    KeyVault,
    SqlServer,
    SqlDatabase,
    CosmosDbAccount,
    ContainerRegistry,
    ManagedCluster,
    LogAnalyticsWorkspace,
    ApplicationInsights,
    UserAssignedIdentity,
    RoleAssignment,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 20] = [
        Self::StorageAccount,
        Self::BlobContainer,
        Self::VirtualNetwork,
        Self::Subnet,
        Self::NetworkSecurityGroup,
        Self::PublicIpAddress,
        Self::NetworkInterface,
        Self::VirtualMachine,
        Self::AppServicePlan,
        Self::WebSite,
        Self::KeyVault,
        Self::SqlServer,
        Self::SqlDatabase,
        Self::CosmosDbAccount,
        Self::ContainerRegistry,
        Self::ManagedCluster,
        Self::LogAnalyticsWorkspace,
        Self::ApplicationInsights,
        Self::UserAssignedIdentity,
        Self::RoleAssignment,
    ];

    /// Source-side matcher: module under the catalog root, and type name.
    pub fn matcher(self) -> (&'static str, &'static str) {
        match self {
            Self::StorageAccount => ("storage", "Account"),
            Self::BlobContainer => ("storage", "BlobContainer"),
            Self::VirtualNetwork => ("network", "VirtualNetwork"),
            Self::Subnet => ("network", "Subnet"),
            Self::NetworkSecurityGroup => ("network", "SecurityGroup"),
            Self::PublicIpAddress => ("network", "PublicIpAddress"),
            Self::NetworkInterface => ("network", "Interface"),
            Self::VirtualMachine => ("compute", "VirtualMachine"),
            Self::AppServicePlan => ("web", "ServerFarm"),
            Self::WebSite => ("web", "Site"),
            Self::KeyVault => ("keyvault", "Vault"),
            Self::SqlServer => ("sql", "Server"),
            Self::SqlDatabase => ("sql", "Database"),
            Self::CosmosDbAccount => ("cosmosdb", "DatabaseAccount"),
            Self::ContainerRegistry => ("containerregistry", "Registry"),
            Self::ManagedCluster => ("containerservice", "ManagedCluster"),
            Self::LogAnalyticsWorkspace => ("operationalinsights", "Workspace"),
            Self::ApplicationInsights => ("insights", "Component"),
            Self::UserAssignedIdentity => ("identity", "UserAssignedIdentity"),
            Self::RoleAssignment => ("authorization", "RoleAssignment"),
        }
    }

    /// ARM provider type, e.g. `Microsoft.Storage/storageAccounts`.
    pub fn provider_type(self) -> &'static str {
        match self {
            Self::StorageAccount => "Microsoft.Storage/storageAccounts",
            Self::BlobContainer => "Microsoft.Storage/storageAccounts/blobServices/containers",
            Self::VirtualNetwork => "Microsoft.Network/virtualNetworks",
            Self::Subnet => "Microsoft.Network/virtualNetworks/subnets",
            Self::NetworkSecurityGroup => "Microsoft.Network/networkSecurityGroups",
            Self::PublicIpAddress => "Microsoft.Network/publicIPAddresses",
            Self::NetworkInterface => "Microsoft.Network/networkInterfaces",
            Self::VirtualMachine => "Microsoft.Compute/virtualMachines",
            Self::AppServicePlan => "Microsoft.Web/serverfarms",
            Self::WebSite => "Microsoft.Web/sites",
            Self::KeyVault => "Microsoft.KeyVault/vaults",
            Self::SqlServer => "Microsoft.Sql/servers",
            Self::SqlDatabase => "Microsoft.Sql/servers/databases",
            Self::CosmosDbAccount => "Microsoft.DocumentDB/databaseAccounts",
            Self::ContainerRegistry => "Microsoft.ContainerRegistry/registries",
            Self::ManagedCluster => "Microsoft.ContainerService/managedClusters",
            Self::LogAnalyticsWorkspace => "Microsoft.OperationalInsights/workspaces",
            Self::ApplicationInsights => "Microsoft.Insights/components",
            Self::UserAssignedIdentity => "Microsoft.ManagedIdentity/userAssignedIdentities",
            Self::RoleAssignment => "Microsoft.Authorization/roleAssignments",
        }
    }

    /// Nested under a parent resource, e.g. a subnet of a virtual network.
    pub fn is_child(self) -> bool {
        self.provider_type().matches('/').count() > 1
    }

    /// API version stamped on synthesized fragments.
    pub fn api_version(self) -> &'static str {
        match self {
            Self::StorageAccount | Self::BlobContainer => "2023-01-01",
            Self::VirtualNetwork
            | Self::Subnet
            | Self::NetworkSecurityGroup
            | Self::PublicIpAddress
            | Self::NetworkInterface => "2023-09-01",
            Self::VirtualMachine => "2023-09-01",
            Self::AppServicePlan | Self::WebSite => "2022-09-01",
            Self::KeyVault => "2023-07-01",
            Self::SqlServer | Self::SqlDatabase => "2022-05-01-preview",
            Self::CosmosDbAccount => "2023-11-15",
            Self::ContainerRegistry => "2023-07-01",
            Self::ManagedCluster => "2024-01-01",
            Self::LogAnalyticsWorkspace => "2022-10-01",
            Self::ApplicationInsights => "2020-02-02",
            Self::UserAssignedIdentity => "2023-01-31",
            Self::RoleAssignment => "2022-04-01",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.provider_type())
    }
}

/// One recognized (namespace, type name) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub namespace: String,
    pub type_name: &'static str,
    pub kind: ResourceKind,
}

/// Static table mapping (namespace, type name) to a resource kind.
#[derive(Debug, Clone)]
pub struct TypeCatalog {
    root: String,
    entries: Vec<CatalogEntry>,
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::azure()
    }
}

impl TypeCatalog {
    /// The built-in Azure catalog under [`DEFAULT_CATALOG_ROOT`].
    pub fn azure() -> Self {
        Self::with_root(DEFAULT_CATALOG_ROOT)
    }

    /// The built-in kinds anchored under a different crate path, for
    /// projects that re-export the resource types elsewhere.
    pub fn with_root(root: &str) -> Self {
        let root = normalize_path(root);
        let entries = ResourceKind::ALL
            .iter()
            .map(|&kind| {
                let (module, type_name) = kind.matcher();
                CatalogEntry {
                    namespace: join_path(&root, module),
                    type_name,
                    kind,
                }
            })
            .collect();
        Self { root, entries }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Look up a kind by its fully resolved namespace and type name.
    pub fn lookup(&self, namespace: &str, type_name: &str) -> Option<ResourceKind> {
        let namespace = normalize_path(namespace);
        self.entries
            .iter()
            .find(|e| e.type_name == type_name && e.namespace == namespace)
            .map(|e| e.kind)
    }

    /// Look up a kind by a fully qualified type path (`a::b::Type`).
    pub fn lookup_path(&self, full_path: &str) -> Option<ResourceKind> {
        let full_path = normalize_path(full_path);
        let (namespace, type_name) = full_path.rsplit_once("::")?;
        self.lookup(namespace, type_name)
    }
}

/// Strip a leading `::` or `crate::` so equivalent paths compare equal.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_start_matches("::");
    let trimmed = trimmed.strip_prefix("crate::").unwrap_or(trimmed);
    trimmed.replace(' ', "")
}

fn join_path(root: &str, module: &str) -> String {
    if root.is_empty() {
        module.to_string()
    } else {
        format!("{}::{}", root, module)
    }
}
