// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Certificate repository collaborator.
//!
//! The subject-name uniqueness constraint looks up previously issued
//! certificates through [`CertificateRepository`]. Records are read-only;
//! their lifecycle belongs to the repository.
//!
//! Lookups may block on network I/O. Failures surface as
//! [`IssuanceError::RepositoryUnavailable`](crate::error::IssuanceError::RepositoryUnavailable)
//! and are never treated as "no conflict".

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use crate::error::{IssuanceError, Result};
use crate::template::BitArray;

/// Status of an issued certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertificateStatus {
    /// Certificate is valid.
    Valid,
    /// Certificate has expired.
    Expired,
    /// Certificate has been revoked.
    Revoked,
    /// Certificate was revoked and has since expired.
    RevokedExpired,
}

impl CertificateStatus {
    /// Returns true for statuses that include expiry.
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired | Self::RevokedExpired)
    }
}

impl FromStr for CertificateStatus {
    type Err = IssuanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "valid" => Ok(Self::Valid),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            "revoked_expired" | "revokedexpired" => Ok(Self::RevokedExpired),
            other => Err(IssuanceError::config(format!(
                "unknown certificate status '{}'",
                other
            ))),
        }
    }
}

/// CRL reason code (RFC 5280 section 5.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum RevocationReason {
    Unspecified,
    KeyCompromise,
    CaCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    CertificateHold,
    RemoveFromCrl,
    PrivilegeWithdrawn,
    AaCompromise,
}

impl RevocationReason {
    /// Reason from its CRL reason code.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Unspecified,
            1 => Self::KeyCompromise,
            2 => Self::CaCompromise,
            3 => Self::AffiliationChanged,
            4 => Self::Superseded,
            5 => Self::CessationOfOperation,
            6 => Self::CertificateHold,
            8 => Self::RemoveFromCrl,
            9 => Self::PrivilegeWithdrawn,
            10 => Self::AaCompromise,
            _ => return None,
        })
    }

    /// Returns true for a temporary suspension.
    pub fn is_hold(&self) -> bool {
        matches!(self, Self::CertificateHold)
    }
}

impl fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unspecified => "unspecified",
            Self::KeyCompromise => "keyCompromise",
            Self::CaCompromise => "cACompromise",
            Self::AffiliationChanged => "affiliationChanged",
            Self::Superseded => "superseded",
            Self::CessationOfOperation => "cessationOfOperation",
            Self::CertificateHold => "certificateHold",
            Self::RemoveFromCrl => "removeFromCRL",
            Self::PrivilegeWithdrawn => "privilegeWithdrawn",
            Self::AaCompromise => "aACompromise",
        };
        write!(f, "{}", name)
    }
}

/// A previously issued certificate, as seen by the uniqueness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRecord {
    /// Serial number, as hex.
    pub serial_number: String,
    /// Canonical subject string.
    pub subject: String,
    /// Current status.
    pub status: CertificateStatus,
    /// Revocation reason, for revoked certificates.
    pub revocation_reason: Option<RevocationReason>,
    /// Key Usage bits at issuance time, if the certificate carried the extension.
    pub key_usage: Option<BitArray>,
}

impl RepositoryRecord {
    /// Valid record without revocation data or key usage.
    pub fn new(serial_number: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            subject: subject.into(),
            status: CertificateStatus::Valid,
            revocation_reason: None,
            key_usage: None,
        }
    }

    /// Set the status.
    pub fn with_status(mut self, status: CertificateStatus) -> Self {
        self.status = status;
        self
    }

    /// Mark as revoked for `reason`.
    pub fn revoked(mut self, reason: RevocationReason) -> Self {
        self.status = CertificateStatus::Revoked;
        self.revocation_reason = Some(reason);
        self
    }

    /// Set the Key Usage snapshot.
    pub fn with_key_usage(mut self, key_usage: BitArray) -> Self {
        self.key_usage = Some(key_usage);
        self
    }
}

/// Lookup of issued certificates by subject.
///
/// Implementations may block. The iteration order of the returned records
/// is implementation-defined.
pub trait CertificateRepository: Send + Sync {
    /// Every record whose subject equals `subject`.
    fn find_by_subject(&self, subject: &str) -> Result<Vec<RepositoryRecord>>;
}

/// In-memory repository; returns records in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    records: Arc<RwLock<Vec<RepositoryRecord>>>,
}

impl InMemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository pre-loaded with `records`.
    pub fn with_records(records: Vec<RepositoryRecord>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }

    /// Add a record.
    pub fn insert(&self, record: RepositoryRecord) -> Result<()> {
        self.records
            .write()
            .map_err(|_| IssuanceError::repository("repository lock poisoned"))?
            .push(record);
        Ok(())
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Returns true if no records are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CertificateRepository for InMemoryRepository {
    fn find_by_subject(&self, subject: &str) -> Result<Vec<RepositoryRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| IssuanceError::repository("repository lock poisoned"))?;
        Ok(records
            .iter()
            .filter(|r| r.subject == subject)
            .cloned()
            .collect())
    }
}
