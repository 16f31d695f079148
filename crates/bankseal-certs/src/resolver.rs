//! Caching certificate resolver.
//!
//! Wraps a [`TrustStore`] with a read-optimized cache so repeated
//! resolutions of the same party never hit the store twice. The cache is
//! keyed by the normalized query string, so `AA:BB` and `aabb` share an
//! entry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::certificate::{normalize_thumbprint, Certificate};
use crate::error::{CertError, Result};
use crate::store::TrustStore;

/// Resolves certificates from a trust store with an in-process cache.
///
/// Concurrent resolutions of the same key are safe: the slow path
/// re-checks under the write lock, so at most one store hit wins and all
/// callers observe the same `Arc`.
pub struct CertificateResolver {
    store: Arc<dyn TrustStore>,
    cache: RwLock<HashMap<String, Arc<Certificate>>>,
}

impl CertificateResolver {
    pub fn new(store: Arc<dyn TrustStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve by SHA-1 thumbprint. Separators and case in the query are
    /// ignored.
    pub fn resolve_by_thumbprint(&self, thumbprint: &str) -> Result<Arc<Certificate>> {
        let key = normalize_thumbprint(thumbprint);
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let found = self.store.find_by_thumbprint(&key)?.ok_or_else(|| {
            CertError::NotFound {
                query: format!("thumbprint {key}"),
            }
        })?;
        tracing::debug!(thumbprint = %key, subject = ?found.common_name(), "resolved certificate");
        Ok(self.insert(key, found))
    }

    /// Resolve by subject `SERIALNUMBER`, optionally requiring the subject
    /// `CN` to match. A CN mismatch is reported as not-found rather than a
    /// distinct error: a certificate for the wrong party is no certificate
    /// at all.
    pub fn resolve_by_serial(
        &self,
        serial: &str,
        expected_cn: Option<&str>,
    ) -> Result<Arc<Certificate>> {
        let key = format!("serial:{serial}");
        if let Some(hit) = self.cached(&key) {
            return check_cn(hit, serial, expected_cn);
        }

        let found = self.store.find_by_serial(serial)?.ok_or_else(|| {
            CertError::NotFound {
                query: format!("subject serial {serial}"),
            }
        })?;
        tracing::debug!(serial = %serial, subject = ?found.common_name(), "resolved certificate");
        check_cn(self.insert(key, found), serial, expected_cn)
    }

    /// Drop all cached entries. Call after the underlying store changes.
    pub fn invalidate(&self) {
        self.cache.write().expect("resolver cache poisoned").clear();
    }

    fn cached(&self, key: &str) -> Option<Arc<Certificate>> {
        self.cache
            .read()
            .expect("resolver cache poisoned")
            .get(key)
            .cloned()
    }

    fn insert(&self, key: String, certificate: Certificate) -> Arc<Certificate> {
        let mut cache = self.cache.write().expect("resolver cache poisoned");
        cache
            .entry(key)
            .or_insert_with(|| Arc::new(certificate))
            .clone()
    }
}

fn check_cn(
    certificate: Arc<Certificate>,
    serial: &str,
    expected_cn: Option<&str>,
) -> Result<Arc<Certificate>> {
    match expected_cn {
        Some(cn) if certificate.common_name() != Some(cn) => Err(CertError::NotFound {
            query: format!("subject serial {serial} with CN {cn}"),
        }),
        _ => Ok(certificate),
    }
}
