//! Typed pipeline configuration.
//!
//! The hosting layer populates these structs from whatever it persists;
//! there is no reflection-based property loading here.

use serde::{Deserialize, Serialize};

/// How the verifier acquires the certificate it checks a signature with.
///
/// The two policies carry materially different security postures, so the
/// choice is explicit rather than inferred from the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustPolicy {
    /// Extract the certificate from the `X509Certificate` element embedded
    /// in the signed document itself. Proves the document was not altered
    /// after signing, but not that the signer is an authorized party — use
    /// only when the channel authenticates the sender by other means.
    #[default]
    Embedded,
    /// Require a certificate pre-provisioned in the local trust store,
    /// resolved by configured thumbprint, falling back to the previous
    /// thumbprint during a key-rotation cutover.
    Store,
}

/// Encode-side configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    /// Pass the message through untouched.
    pub disable: bool,
    pub customer_id: u64,
    pub environment: String,
    /// Party identifier written to `TargetId`; defaults to the signing
    /// certificate's subject serial number when unset.
    pub target_id: Option<String>,
    /// Substituted into the ExecutionSerial when `target_id` exceeds
    /// 12 digits.
    pub internal_target_id: Option<u64>,
    pub compress: bool,
    pub software_id: String,
    pub file_type: String,
    /// Fallback when the host supplies no `ReceivedFileName`.
    pub user_filename: Option<String>,
    pub certificate_thumbprint: Option<String>,
    /// Expected subject CN for serial-number certificate lookups.
    pub certificate_cn: Option<String>,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            disable: false,
            customer_id: 0,
            environment: String::new(),
            target_id: None,
            internal_target_id: None,
            compress: false,
            software_id: String::new(),
            file_type: String::new(),
            user_filename: None,
            certificate_thumbprint: None,
            certificate_cn: None,
        }
    }
}

/// Decode-side configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Pass the message through untouched.
    pub disable: bool,
    /// Verify the envelope signature before scanning fields.
    pub verify: bool,
    pub trust: TrustPolicy,
    /// Trust-store thumbprint for [`TrustPolicy::Store`].
    pub thumbprint: Option<String>,
    /// Rotation fallback for [`TrustPolicy::Store`].
    pub previous_thumbprint: Option<String>,
    /// On verification failure or a fault response, return the original
    /// message annotated with fault metadata instead of failing the call.
    pub pass_thru: bool,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            disable: false,
            verify: false,
            trust: TrustPolicy::Embedded,
            thumbprint: None,
            previous_thumbprint: None,
            pass_thru: false,
        }
    }
}
