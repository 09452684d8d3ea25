//! VM identity lookup.

use crate::error::{Result, TelemetryError};
use std::path::PathBuf;
use uuid::Uuid;

const PRODUCT_UUID_PATH: &str = "/sys/class/dmi/id/product_uuid";
const EFI_PATH: &str = "/sys/firmware/efi";

/// Source of the current VM identifier.
pub trait VmIdentity: Send + Sync {
    fn query_vm_id(&self) -> Result<String>;
}

impl<F> VmIdentity for F
where
    F: Fn() -> Result<String> + Send + Sync,
{
    fn query_vm_id(&self) -> Result<String> {
        self()
    }
}

/// Fixed identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticIdentity(pub String);

impl StaticIdentity {
    pub fn new(vm_id: impl Into<String>) -> Self {
        Self(vm_id.into())
    }
}

impl VmIdentity for StaticIdentity {
    fn query_vm_id(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Identifier derived from the SMBIOS system UUID.
///
/// Gen1 (BIOS) VMs expose the VM id with its first three fields
/// byte-swapped; Gen2 (UEFI) VMs expose it as-is.
#[derive(Debug, Clone)]
pub struct SmbiosIdentity {
    product_uuid_path: PathBuf,
    efi_path: PathBuf,
}

impl Default for SmbiosIdentity {
    fn default() -> Self {
        Self::new(PRODUCT_UUID_PATH, EFI_PATH)
    }
}

impl SmbiosIdentity {
    pub fn new(product_uuid_path: impl Into<PathBuf>, efi_path: impl Into<PathBuf>) -> Self {
        Self {
            product_uuid_path: product_uuid_path.into(),
            efi_path: efi_path.into(),
        }
    }

    /// Gen1 VMs boot without UEFI.
    pub fn is_gen1(&self) -> bool {
        !self.efi_path.exists()
    }

    fn system_uuid(&self) -> Result<Uuid> {
        let raw = std::fs::read_to_string(&self.product_uuid_path).map_err(|e| {
            TelemetryError::Identity(format!(
                "cannot read {}: {}",
                self.product_uuid_path.display(),
                e
            ))
        })?;
        Uuid::parse_str(raw.trim())
            .map_err(|e| TelemetryError::Identity(format!("invalid system UUID {:?}: {}", raw.trim(), e)))
    }
}

impl VmIdentity for SmbiosIdentity {
    fn query_vm_id(&self) -> Result<String> {
        let system = self.system_uuid()?;
        let vm_id = if self.is_gen1() {
            convert_system_uuid_to_vm_id(&system)
        } else {
            system
        };
        Ok(vm_id.hyphenated().to_string())
    }
}

/// Byte-swap the first three fields of a Gen1 system UUID.
pub fn convert_system_uuid_to_vm_id(system: &Uuid) -> Uuid {
    Uuid::from_bytes_le(*system.as_bytes())
}
