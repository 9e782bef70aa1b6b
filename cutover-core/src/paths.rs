//! Tenant-scoped storage paths and the migration-phase path policy.
//!
//! `CollectionPath` and `DocumentPath` have private inner data: the only way
//! to obtain one is through a constructor that takes an `OrgId`, so every
//! path the engine touches is rooted under exactly one tenant. The layouts
//! below are a compatibility contract with the live application and must not
//! change:
//!
//! - legacy:    `organisations/{orgId}/{collection}`
//! - module:    `organisations/{orgId}/modules/{moduleId}/{collection}`
//! - archive:   `organisations/{orgId}/modules/{moduleId}/_legacyArchive/{collection}/items/{docId}`
//! - ledger:    `organisations/{orgId}/modules/{moduleId}/_migrationOps/{idempotencyKey}`
//! - telemetry: `organisations/{orgId}/modules/{moduleId}/_migrationTelemetry/{autoId}`

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{CollectionName, DocumentId, IdempotencyKey, ModuleId, OrgId, PhaseFlags};

/// Root collection holding one document per tenant.
pub const ORGANISATIONS: &str = "organisations";

const MODULES: &str = "modules";
const LEGACY_ARCHIVE: &str = "_legacyArchive";
const ARCHIVE_ITEMS: &str = "items";
const MIGRATION_OPS: &str = "_migrationOps";
const MIGRATION_TELEMETRY: &str = "_migrationTelemetry";

/// Which layout a collection is read from or written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Pre-migration layout, `organisations/{orgId}/{collection}`.
    Legacy,
    /// Module-namespaced layout.
    Module,
}

impl StorageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMode::Legacy => "legacy",
            StorageMode::Module => "module",
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path of a collection. Cannot be constructed without a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath {
    inner: String,
}

impl CollectionPath {
    /// The root `organisations` collection used for tenant discovery.
    pub fn organisations() -> Self {
        Self {
            inner: ORGANISATIONS.to_string(),
        }
    }

    /// A collection directly under the tenant document. Pre-migration
    /// training collections and shared tenant data (schools, staff) live here.
    pub fn tenant_root(org: &OrgId, collection: &CollectionName) -> Self {
        Self {
            inner: format!("{}/{}/{}", ORGANISATIONS, org, collection),
        }
    }

    /// A collection owned by a module.
    pub fn module(org: &OrgId, module: &ModuleId, collection: &CollectionName) -> Self {
        Self {
            inner: format!("{}/{}/{}/{}/{}", ORGANISATIONS, org, MODULES, module, collection),
        }
    }

    /// Collection resolved for a given storage mode.
    pub fn for_mode(
        org: &OrgId,
        module: &ModuleId,
        collection: &CollectionName,
        mode: StorageMode,
    ) -> Self {
        match mode {
            StorageMode::Legacy => Self::tenant_root(org, collection),
            StorageMode::Module => Self::module(org, module, collection),
        }
    }

    /// Archive namespace for retired legacy documents of one collection.
    pub fn archive(org: &OrgId, module: &ModuleId, collection: &CollectionName) -> Self {
        Self {
            inner: format!(
                "{}/{}/{}/{}/{}/{}/{}",
                ORGANISATIONS, org, MODULES, module, LEGACY_ARCHIVE, collection, ARCHIVE_ITEMS
            ),
        }
    }

    /// Idempotency ledger collection.
    pub fn ledger(org: &OrgId, module: &ModuleId) -> Self {
        Self {
            inner: format!("{}/{}/{}/{}/{}", ORGANISATIONS, org, MODULES, module, MIGRATION_OPS),
        }
    }

    /// Append-only migration telemetry collection.
    pub fn telemetry(org: &OrgId, module: &ModuleId) -> Self {
        Self {
            inner: format!(
                "{}/{}/{}/{}/{}",
                ORGANISATIONS, org, MODULES, module, MIGRATION_TELEMETRY
            ),
        }
    }

    /// Address a document in this collection.
    pub fn doc(&self, id: &DocumentId) -> DocumentPath {
        DocumentPath {
            inner: format!("{}/{}", self.inner, id),
            id: id.clone(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

/// Path of a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    inner: String,
    id: DocumentId,
}

impl DocumentPath {
    /// The tenant document itself, `organisations/{orgId}`.
    pub fn organisation(org: &OrgId) -> Self {
        Self {
            inner: format!("{}/{}", ORGANISATIONS, org),
            id: DocumentId(org.as_str().to_string()),
        }
    }

    /// Last path segment.
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

/// Ordered, de-duplicated set of layouts a write fans out to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WriteTargets(Vec<StorageMode>);

impl WriteTargets {
    fn from_modes(modes: impl IntoIterator<Item = StorageMode>) -> Self {
        let mut modes: Vec<StorageMode> = modes.into_iter().collect();
        modes.sort();
        modes.dedup();
        Self(modes)
    }

    pub fn modes(&self) -> &[StorageMode] {
        &self.0
    }

    pub fn contains(&self, mode: StorageMode) -> bool {
        self.0.contains(&mode)
    }
}

/// Maps (tenant, collection, mode) to concrete paths and encodes the current
/// migration phase. Pure: it never touches the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    module_id: ModuleId,
    flags: PhaseFlags,
}

impl PathResolver {
    pub fn new(module_id: ModuleId, flags: PhaseFlags) -> Self {
        Self { module_id, flags }
    }

    pub fn module_id(&self) -> &ModuleId {
        &self.module_id
    }

    pub fn flags(&self) -> &PhaseFlags {
        &self.flags
    }

    /// Layouts a live write must reach in the current phase.
    ///
    /// - dual-write: `{legacy, module}`
    /// - legacy writes disabled: `{module}`
    /// - otherwise (pre-migration): `{legacy}`
    pub fn resolve_write_targets(&self) -> WriteTargets {
        if self.flags.dual_write() {
            WriteTargets::from_modes([StorageMode::Legacy, StorageMode::Module])
        } else if self.flags.legacy_write_disabled() {
            WriteTargets::from_modes([StorageMode::Module])
        } else {
            WriteTargets::from_modes([StorageMode::Legacy])
        }
    }

    /// The single source of truth for reads in the current phase.
    pub fn resolve_read_mode(&self) -> StorageMode {
        if self.flags.read_from_modules() {
            StorageMode::Module
        } else {
            StorageMode::Legacy
        }
    }

    pub fn collection_path(
        &self,
        org: &OrgId,
        collection: &CollectionName,
        mode: StorageMode,
    ) -> CollectionPath {
        CollectionPath::for_mode(org, &self.module_id, collection, mode)
    }

    pub fn document_path(
        &self,
        org: &OrgId,
        collection: &CollectionName,
        id: &DocumentId,
        mode: StorageMode,
    ) -> DocumentPath {
        self.collection_path(org, collection, mode).doc(id)
    }

    /// Ledger entry path for an idempotency key.
    pub fn ledger_path(&self, org: &OrgId, key: &IdempotencyKey) -> DocumentPath {
        let ledger = CollectionPath::ledger(org, &self.module_id);
        DocumentPath {
            inner: format!("{}/{}", ledger.as_str(), key),
            id: DocumentId(key.as_str().to_string()),
        }
    }

    pub fn telemetry_collection(&self, org: &OrgId) -> CollectionPath {
        CollectionPath::telemetry(org, &self.module_id)
    }

    pub fn archive_path(
        &self,
        org: &OrgId,
        collection: &CollectionName,
        id: &DocumentId,
    ) -> DocumentPath {
        CollectionPath::archive(org, &self.module_id, collection).doc(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org() -> OrgId {
        OrgId::parse("orgA").unwrap()
    }

    fn module() -> ModuleId {
        ModuleId::parse("trainingTrack").unwrap()
    }

    fn records() -> CollectionName {
        CollectionName::parse("trainingRecords").unwrap()
    }

    #[test]
    fn test_path_contract_layouts() {
        let id = DocumentId::parse("r1").unwrap();
        assert_eq!(
            CollectionPath::tenant_root(&org(), &records()).doc(&id).as_str(),
            "organisations/orgA/trainingRecords/r1"
        );
        assert_eq!(
            CollectionPath::module(&org(), &module(), &records()).doc(&id).as_str(),
            "organisations/orgA/modules/trainingTrack/trainingRecords/r1"
        );
        assert_eq!(
            CollectionPath::archive(&org(), &module(), &records()).doc(&id).as_str(),
            "organisations/orgA/modules/trainingTrack/_legacyArchive/trainingRecords/items/r1"
        );
        assert_eq!(
            CollectionPath::telemetry(&org(), &module()).as_str(),
            "organisations/orgA/modules/trainingTrack/_migrationTelemetry"
        );
        assert_eq!(DocumentPath::organisation(&org()).as_str(), "organisations/orgA");
        assert_eq!(DocumentPath::organisation(&org()).id().as_str(), "orgA");
    }

    #[test]
    fn test_ledger_path() {
        let resolver = PathResolver::new(module(), PhaseFlags::default());
        let key = IdempotencyKey::parse("k1").unwrap();
        let path = resolver.ledger_path(&org(), &key);
        assert_eq!(
            path.as_str(),
            "organisations/orgA/modules/trainingTrack/_migrationOps/k1"
        );
        assert_eq!(path.id().as_str(), "k1");
    }

    #[test]
    fn test_terminal_phase_is_module_only() {
        let resolver = PathResolver::new(module(), PhaseFlags::default());
        assert_eq!(resolver.resolve_write_targets().modes(), &[StorageMode::Module]);
        assert_eq!(resolver.resolve_read_mode(), StorageMode::Module);
    }

    #[test]
    fn test_dual_write_phase_fans_out() {
        let flags = PhaseFlags::new(true, false, false).unwrap();
        let resolver = PathResolver::new(module(), flags);
        assert_eq!(
            resolver.resolve_write_targets().modes(),
            &[StorageMode::Legacy, StorageMode::Module]
        );
        assert_eq!(resolver.resolve_read_mode(), StorageMode::Legacy);
    }

    #[test]
    fn test_legacy_only_phase() {
        let flags = PhaseFlags::new(false, false, false).unwrap();
        let resolver = PathResolver::new(module(), flags);
        assert_eq!(resolver.resolve_write_targets().modes(), &[StorageMode::Legacy]);
        assert_eq!(resolver.resolve_read_mode(), StorageMode::Legacy);
    }

    #[test]
    fn test_write_targets_serialize_lowercase() {
        let flags = PhaseFlags::new(true, true, false).unwrap();
        let resolver = PathResolver::new(module(), flags);
        let json = serde_json::to_value(resolver.resolve_write_targets()).unwrap();
        assert_eq!(json, serde_json::json!(["legacy", "module"]));
    }
}
