//! Trust store trait: the abstract interface for certificate lookup.
//!
//! This keeps the core testable without a real OS trust store.
//! Implementations index by normalized thumbprint and by subject
//! `SERIALNUMBER` once, instead of scanning every certificate per lookup.

use std::collections::HashMap;

use crate::certificate::{normalize_thumbprint, Certificate};
use crate::error::Result;

/// The trust store: certificate lookup by thumbprint or subject serial.
///
/// `find_by_thumbprint` receives an already-normalized thumbprint
/// (lowercase hex, no separators). Both methods return `Ok(None)` for a
/// clean miss; `Err` is reserved for store access failures.
pub trait TrustStore: Send + Sync {
    fn find_by_thumbprint(&self, thumbprint: &str) -> Result<Option<Certificate>>;
    fn find_by_serial(&self, serial: &str) -> Result<Option<Certificate>>;
}

/// In-memory trust store.
///
/// Indexes are built at construction; rebuild the store (and invalidate
/// the resolver cache) when the underlying certificate set changes.
pub struct MemoryTrustStore {
    by_thumbprint: HashMap<String, Certificate>,
    by_serial: HashMap<String, Certificate>,
}

impl MemoryTrustStore {
    pub fn new(certificates: impl IntoIterator<Item = Certificate>) -> Self {
        let mut by_thumbprint = HashMap::new();
        let mut by_serial = HashMap::new();
        for certificate in certificates {
            if let Some(serial) = certificate.subject_serial_number() {
                by_serial
                    .entry(serial.to_string())
                    .or_insert_with(|| certificate.clone());
            }
            by_thumbprint.insert(
                normalize_thumbprint(certificate.thumbprint()),
                certificate,
            );
        }
        Self {
            by_thumbprint,
            by_serial,
        }
    }

    pub fn len(&self) -> usize {
        self.by_thumbprint.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_thumbprint.is_empty()
    }
}

impl TrustStore for MemoryTrustStore {
    fn find_by_thumbprint(&self, thumbprint: &str) -> Result<Option<Certificate>> {
        Ok(self.by_thumbprint.get(thumbprint).cloned())
    }

    fn find_by_serial(&self, serial: &str) -> Result<Option<Certificate>> {
        Ok(self.by_serial.get(serial).cloned())
    }
}
