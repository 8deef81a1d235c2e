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

//! Integration tests for subject-name uniqueness against a repository

use std::sync::Arc;

use usg_ca_issuance::oids;
use usg_ca_issuance::template::BitArray;
use usg_ca_issuance::{
    CertificateRepository, CertificateStatus, CertificateTemplate, ConstraintChain,
    ConstraintKind, DefaultPolicyKind, ExtensionPayload, InMemoryRepository, IssuanceError,
    IssuancePipeline, RepositoryRecord, RequestParams, RevocationReason,
};

use crate::integration::{pkcs10_request, rule, template_with};

const SUBJECT: &str = "CN=device.example.com";

fn digital_signature() -> BitArray {
    BitArray::with_bits_set(9, &[0])
}

fn requested() -> CertificateTemplate {
    template_with(
        SUBJECT,
        oids::KEY_USAGE,
        true,
        ExtensionPayload::KeyUsage(digital_signature()),
    )
}

fn chain(records: Vec<RepositoryRecord>) -> ConstraintChain {
    ConstraintChain::new(vec![rule(
        "unique-subject",
        DefaultPolicyKind::SubjectName,
        ConstraintKind::UniqueSubjectName,
        &[],
    )])
    .with_repository(Arc::new(InMemoryRepository::with_records(records)))
}

/// Repository whose backing store is down.
struct OfflineRepository;

impl CertificateRepository for OfflineRepository {
    fn find_by_subject(&self, _subject: &str) -> usg_ca_issuance::Result<Vec<RepositoryRecord>> {
        Err(IssuanceError::repository("directory connection refused"))
    }
}

#[test]
fn test_certificate_hold_with_same_key_usage_rejects() {
    let record = RepositoryRecord::new("01", SUBJECT)
        .revoked(RevocationReason::CertificateHold)
        .with_key_usage(digital_signature());

    let err = chain(vec![record])
        .validate(&requested(), None)
        .expect_err("Held certificate still conflicts");
    assert!(matches!(
        err,
        IssuanceError::SubjectNotUnique { ref subject } if subject == SUBJECT
    ));
}

#[test]
fn test_expired_record_is_skipped() {
    let record = RepositoryRecord::new("02", SUBJECT)
        .with_status(CertificateStatus::Expired)
        .with_key_usage(digital_signature());

    assert!(chain(vec![record]).validate(&requested(), None).is_ok());
}

#[test]
fn test_revoked_for_key_compromise_is_skipped() {
    let record = RepositoryRecord::new("03", SUBJECT)
        .revoked(RevocationReason::KeyCompromise)
        .with_key_usage(digital_signature());

    assert!(chain(vec![record]).validate(&requested(), None).is_ok());
}

#[test]
fn test_first_conflicting_record_is_reported() {
    let records = vec![
        RepositoryRecord::new("10", SUBJECT).with_status(CertificateStatus::RevokedExpired),
        RepositoryRecord::new("11", SUBJECT)
            .revoked(RevocationReason::Superseded)
            .with_key_usage(digital_signature()),
        RepositoryRecord::new("12", SUBJECT).with_key_usage(digital_signature()),
    ];

    let result = chain(records).validate(&requested(), None);
    assert!(matches!(result, Err(IssuanceError::SubjectNotUnique { .. })));
}

#[test]
fn test_other_subjects_do_not_conflict() {
    let record =
        RepositoryRecord::new("20", "CN=other.example.com").with_key_usage(digital_signature());
    assert!(chain(vec![record]).validate(&requested(), None).is_ok());
}

#[test]
fn test_repository_failure_propagates() {
    let chain = ConstraintChain::new(vec![rule(
        "unique-subject",
        DefaultPolicyKind::SubjectName,
        ConstraintKind::UniqueSubjectName,
        &[],
    )])
    .with_repository(Arc::new(OfflineRepository));

    let err = chain
        .validate(&requested(), None)
        .expect_err("Repository errors must not be swallowed");
    assert!(err.is_infrastructure());
    assert!(!err.is_rejection());
}

#[test]
fn test_reissue_after_recording() {
    let repository = Arc::new(InMemoryRepository::new());
    let chain = ConstraintChain::new(vec![rule(
        "unique-subject",
        DefaultPolicyKind::SubjectName,
        ConstraintKind::UniqueSubjectName,
        &[],
    )])
    .with_repository(repository.clone());
    let pipeline = IssuancePipeline::new(RequestParams::default(), chain);

    // First request is approved and recorded as issued
    let approved = pipeline
        .process_pkcs10(&pkcs10_request("device.example.com"), None)
        .expect("First request should be approved");
    repository
        .insert(RepositoryRecord::new("30", approved.subject_string()))
        .expect("Insert should succeed");

    // Same subject again, no key usage on either side
    let err = pipeline
        .process_pkcs10(&pkcs10_request("device.example.com"), None)
        .expect_err("Duplicate subject");
    assert!(matches!(err, IssuanceError::SubjectNotUnique { .. }));
}
