//! Export unit registry and YAML unit manifests.
//!
//! # Manifest layout
//!
//! ```yaml
//! units:
//!   - biz_type: ORDER_EXPORT
//!     target: order_service
//!     operation: query_orders
//!     param_shape: OrderParams
//!     authorizer: order_managers   # optional
//! ```
//!
//! Registration is last-write-wins: a later unit with the same `biz_type`
//! silently replaces the earlier one, whether it comes from code or from a
//! later manifest entry.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::types::{BizType, ExportUnit};

// ---------------------------------------------------------------------------
// 1. ConfigRegistry
// ---------------------------------------------------------------------------

/// Mapping from business type to its [`ExportUnit`].
///
/// Shared by reference (`Arc<ConfigRegistry>`); all synchronization is
/// internal and every insert replaces a whole entry at once.
#[derive(Debug, Default)]
pub struct ConfigRegistry {
    units: RwLock<HashMap<BizType, ExportUnit>>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `unit`, replacing any unit already registered for its key.
    pub fn register(&self, unit: ExportUnit) {
        let key = unit.biz_type.clone();
        if self.units.write().insert(key.clone(), unit).is_some() {
            tracing::debug!(biz_type = %key, "export unit re-registered, previous entry replaced");
        }
    }

    pub fn get(&self, biz_type: &BizType) -> Option<ExportUnit> {
        self.units.read().get(biz_type).cloned()
    }

    pub fn contains(&self, biz_type: &BizType) -> bool {
        self.units.read().contains_key(biz_type)
    }

    /// Point-in-time copy of every registered unit, ordered by key.
    pub fn list_all(&self) -> BTreeMap<BizType, ExportUnit> {
        self.units
            .read()
            .iter()
            .map(|(key, unit)| (key.clone(), unit.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.units.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.read().is_empty()
    }

    /// Register every unit of `manifest` in file order.
    pub fn register_manifest(&self, manifest: UnitManifest) {
        for unit in manifest.units {
            self.register(unit);
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Manifest load / save
// ---------------------------------------------------------------------------

/// On-disk list of export units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitManifest {
    #[serde(default)]
    pub units: Vec<ExportUnit>,
}

/// Load a unit manifest from `path`.
///
/// Returns `RegistryError::Io` if the file cannot be read and
/// `RegistryError::Parse` (with path + line context) if it is malformed.
pub fn load_manifest_at(path: &Path) -> Result<UnitManifest, RegistryError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let manifest: UnitManifest = serde_yaml::from_str(&contents).map_err(|e| {
        RegistryError::Parse {
            path: path.to_path_buf(),
            source: e,
        }
    })?;
    if manifest.units.iter().any(|u| u.biz_type.0.trim().is_empty()) {
        return Err(RegistryError::BlankBizType {
            path: path.to_path_buf(),
        });
    }
    Ok(manifest)
}

/// Atomically save a manifest: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_manifest_at(path: &Path, manifest: &UnitManifest) -> Result<(), RegistryError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let yaml = serde_yaml::to_string(manifest)?;
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

impl ConfigRegistry {
    /// Build a registry from the manifest at `path`.
    pub fn from_manifest_at(path: &Path) -> Result<Self, RegistryError> {
        let registry = Self::new();
        registry.register_manifest(load_manifest_at(path)?);
        Ok(registry)
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.into(),
        source,
    }
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParamShape;
    use tempfile::TempDir;

    fn unit(biz: &str, op: &str) -> ExportUnit {
        ExportUnit::new(biz, "order_service", op, ParamShape::from("OrderParams"))
    }

    #[test]
    fn register_then_get() {
        let registry = ConfigRegistry::new();
        registry.register(unit("ORDER_EXPORT", "query_orders"));
        assert!(registry.contains(&BizType::from("ORDER_EXPORT")));
        assert_eq!(
            registry.get(&BizType::from("ORDER_EXPORT")).map(|u| u.operation),
            Some("query_orders".to_string())
        );
        assert!(registry.get(&BizType::from("UNKNOWN")).is_none());
    }

    #[test]
    fn re_registration_overwrites() {
        let registry = ConfigRegistry::new();
        registry.register(unit("ORDER_EXPORT", "v1"));
        registry.register(unit("ORDER_EXPORT", "v2"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&BizType::from("ORDER_EXPORT")).unwrap().operation, "v2");
    }

    #[test]
    fn snapshot_is_unaffected_by_later_registration() {
        let registry = ConfigRegistry::new();
        registry.register(unit("A", "a"));
        let snapshot = registry.list_all();
        registry.register(unit("B", "b"));
        registry.register(unit("A", "changed"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[&BizType::from("A")].operation, "a");
        assert_eq!(registry.list_all().len(), 2);
    }

    #[test]
    fn save_and_load_manifest_roundtrip() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("units.yaml");
        let manifest = UnitManifest {
            units: vec![unit("A", "a"), unit("B", "b").with_authorizer("managers")],
        };
        save_manifest_at(&path, &manifest).expect("save");
        let loaded = load_manifest_at(&path).expect("load");
        assert_eq!(loaded, manifest);
        assert!(!path.with_extension("yaml.tmp").exists(), ".tmp must be gone after save");
    }

    #[test]
    fn missing_manifest_is_io_error() {
        let dir = TempDir::new().expect("tempdir");
        let err = load_manifest_at(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, RegistryError::Io { .. }));
    }
}
