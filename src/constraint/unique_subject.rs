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

//! Subject name uniqueness against previously issued certificates.
//!
//! Every repository record with the template's subject is a candidate. A
//! candidate does not conflict when, checked in order:
//!
//! 1. it is expired (or revoked and expired);
//! 2. it is revoked for any reason other than certificate hold;
//! 3. key usage comparison is enabled and its key usage differs from the
//!    template's (length differences count; both absent is equal).
//!
//! The first remaining candidate rejects the template. Candidates are
//! visited in repository order.

use tracing::debug;

use super::{ConstraintParams, PolicyConstraint, ValidationContext};
use crate::error::{IssuanceError, Result};
use crate::repository::{CertificateStatus, RepositoryRecord};
use crate::template::BitArray;

/// Uniqueness configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueSubjectNameConstraint {
    /// Compare key usage before treating a record as a conflict.
    pub key_usage_checking: bool,
}

impl UniqueSubjectNameConstraint {
    fn skip_reason(
        &self,
        record: &RepositoryRecord,
        key_usage: Option<&BitArray>,
    ) -> Option<&'static str> {
        if record.status.is_expired() {
            return Some("expired");
        }
        if record.status == CertificateStatus::Revoked {
            if let Some(reason) = record.revocation_reason {
                if !reason.is_hold() {
                    return Some("revoked");
                }
            }
        }
        if self.key_usage_checking && record.key_usage.as_ref() != key_usage {
            return Some("key usage differs");
        }
        None
    }
}

impl PolicyConstraint for UniqueSubjectNameConstraint {
    const CONFIG_NAMES: &'static [&'static str] = &["enableKeyUsageExtensionChecking"];

    fn from_params(params: &ConstraintParams) -> Result<Self> {
        Ok(Self {
            key_usage_checking: params.bool_or("enableKeyUsageExtensionChecking", true)?,
        })
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Result<()> {
        let repository = ctx
            .repository
            .ok_or_else(|| IssuanceError::repository("no certificate repository configured"))?;

        let subject = ctx.template.subject_string();
        let key_usage = ctx.template.key_usage();

        for record in repository.find_by_subject(&subject)? {
            match self.skip_reason(&record, key_usage) {
                Some(reason) => {
                    debug!(serial = %record.serial_number, reason, "Skipping existing certificate");
                }
                None => {
                    return Err(IssuanceError::SubjectNotUnique {
                        subject: record.subject,
                    });
                }
            }
        }
        Ok(())
    }

    fn describe(&self) -> String {
        if self.key_usage_checking {
            "Subject name must be unique among certificates with the same key usage".to_string()
        } else {
            "Subject name must be unique".to_string()
        }
    }
}
