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

//! Integration tests for the constraint chain and the issuance pipeline

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use spki::AlgorithmIdentifierOwned;
use usg_ca_issuance::oids;
use usg_ca_issuance::template::{BitArray, ValidityWindow};
use usg_ca_issuance::{
    CertificateTemplate, ConstraintChain, ConstraintInstance, ConstraintKind, ConstraintParams,
    DefaultPolicyKind, ExtensionPayload, IssuanceError, IssuancePipeline, RequestParams,
};

use crate::integration::{pkcs10_request, rule, template, template_with};

const NOW: u64 = 1_750_000_000;
const DAY: u64 = 86_400;

fn now() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(NOW)
}

fn path_len_chain() -> ConstraintChain {
    ConstraintChain::new(vec![rule(
        "ca-path-length",
        DefaultPolicyKind::BasicConstraintsExtension,
        ConstraintKind::BasicConstraints,
        &[
            ("basicConstraintsCritical", "-"),
            ("basicConstraintsIsCA", "true"),
            ("basicConstraintsMinPathLen", "2"),
            ("basicConstraintsMaxPathLen", "5"),
        ],
    )])
}

fn ca_template(path_len: u8) -> CertificateTemplate {
    template_with(
        "CN=Intermediate CA",
        oids::BASIC_CONSTRAINTS,
        true,
        ExtensionPayload::BasicConstraints {
            ca: true,
            path_len: Some(path_len),
        },
    )
}

#[test]
fn test_path_length_bounds() {
    let chain = path_len_chain();

    let result = chain.validate(&ca_template(1), None);
    assert!(matches!(
        result,
        Err(IssuanceError::PathLengthBelowMinimum { minimum: 2, .. })
    ));

    assert!(chain.validate(&ca_template(3), None).is_ok());

    let result = chain.validate(&ca_template(6), None);
    assert!(matches!(
        result,
        Err(IssuanceError::PathLengthAboveMaximum { maximum: 5, .. })
    ));
}

#[test]
fn test_max_path_len_edit_below_min_is_refused() {
    let mut instance = ConstraintInstance::new(
        "ca-path-length",
        ConstraintKind::BasicConstraints,
        ConstraintParams::new()
            .with("basicConstraintsMinPathLen", "3")
            .with("basicConstraintsMaxPathLen", "6"),
    )
    .expect("Valid configuration");

    let result = instance.set_param("basicConstraintsMaxPathLen", "1");
    assert!(matches!(result, Err(IssuanceError::Config(_))));

    // Previous value stays in force
    assert_eq!(instance.get_param("basicConstraintsMaxPathLen"), Some("6"));

    instance
        .set_param("basicConstraintsMaxPathLen", "4")
        .expect("Edit within bounds should be accepted");
    assert_eq!(instance.get_param("basicConstraintsMaxPathLen"), Some("4"));
}

#[test]
fn test_key_usage_all_unset_passes_any_bits() {
    let params: Vec<(&str, &str)> = ConstraintInstance::new(
        "ku-names",
        ConstraintKind::KeyUsage,
        ConstraintParams::new(),
    )
    .expect("Valid configuration")
    .config_names()
    .iter()
    .map(|name| (*name, "-"))
    .collect();
    let chain = ConstraintChain::new(vec![rule(
        "ku-any",
        DefaultPolicyKind::KeyUsageExtension,
        ConstraintKind::KeyUsage,
        &params,
    )]);

    for bits in [vec![], vec![0, 5, 6], (0..9).collect::<Vec<_>>()] {
        let t = template_with(
            "CN=any",
            oids::KEY_USAGE,
            false,
            ExtensionPayload::KeyUsage(BitArray::with_bits_set(9, &bits)),
        );
        assert!(chain.validate(&t, None).is_ok(), "bits {:?} rejected", bits);
    }
}

#[test]
fn test_extended_key_usage_outside_allow_list() {
    let chain = ConstraintChain::new(vec![rule(
        "server-only",
        DefaultPolicyKind::ExtendedKeyUsageExtension,
        ConstraintKind::ExtendedKeyUsage,
        &[("exKeyUsageOIDs", "1.3.6.1.5.5.7.3.1")],
    )]);
    let t = template_with(
        "CN=www.example.com",
        oids::EXTENDED_KEY_USAGE,
        false,
        ExtensionPayload::ExtendedKeyUsage(vec![
            const_oid::ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.1"),
            const_oid::ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.2"),
        ]),
    );

    let err = chain.validate(&t, None).expect_err("clientAuth is not allowed");
    assert!(err.is_rejection());
    assert_eq!(err.to_string(), "OID 1.3.6.1.5.5.7.3.2 is not allowed");
}

#[test]
fn test_chain_stops_at_first_rejection() {
    let key_usage = rule(
        "ku",
        DefaultPolicyKind::KeyUsageExtension,
        ConstraintKind::KeyUsage,
        &[("keyUsageDigitalSignature", "true")],
    );
    let subject = rule(
        "subject",
        DefaultPolicyKind::SubjectName,
        ConstraintKind::SubjectName,
        &[("pattern", "CN=.*\\.example\\.com")],
    );
    let t = template("CN=host.other.org");

    let chain = ConstraintChain::new(vec![key_usage.clone(), subject.clone()]);
    assert!(matches!(
        chain.validate(&t, None),
        Err(IssuanceError::ExtensionNotFound { .. })
    ));

    let chain = ConstraintChain::new(vec![subject, key_usage]);
    assert!(matches!(
        chain.validate(&t, None),
        Err(IssuanceError::SubjectPatternMismatch { .. })
    ));
}

#[test]
fn test_inapplicable_rule_never_runs() {
    // Key usage paired with a subject-name default is dropped at build time
    let chain = ConstraintChain::new(vec![rule(
        "misplaced",
        DefaultPolicyKind::SubjectName,
        ConstraintKind::KeyUsage,
        &[("keyUsageDigitalSignature", "true")],
    )]);

    assert!(chain.is_empty());
    assert_eq!(chain.skipped().len(), 1);
    assert!(chain.validate(&template("CN=no-ku"), None).is_ok());
}

#[test]
fn test_subject_field_check_is_stable() {
    let chain = ConstraintChain::new(vec![rule(
        "subject",
        DefaultPolicyKind::UserSubjectName,
        ConstraintKind::SubjectName,
        &[],
    )]);
    let long_cn = "x".repeat(65);
    let t = template(&format!("CN={},C=USA1", long_cn));

    let fields = |result: usg_ca_issuance::Result<()>| match result {
        Err(IssuanceError::InvalidSubjectFields { mut fields }) => {
            fields.sort();
            fields
        }
        other => panic!("unexpected result {:?}", other),
    };

    let first = fields(chain.validate(&t, None));
    let second = fields(chain.validate(&t, None));
    assert_eq!(first, vec!["C", "CN"]);
    assert_eq!(first, second);
}

#[test]
fn test_signing_algorithm_allow_list() {
    let chain = ConstraintChain::new(vec![rule(
        "rsa-only",
        DefaultPolicyKind::SigningAlgorithm,
        ConstraintKind::SigningAlgorithm,
        &[("signingAlgsAllowed", "SHA256withRSA,SHA384withRSA")],
    )]);
    let mut t = template("CN=signed");

    assert!(matches!(
        chain.validate(&t, None),
        Err(IssuanceError::AlgorithmNotFound(_))
    ));

    t.signature_algorithm = Some(AlgorithmIdentifierOwned {
        oid: oids::ECDSA_WITH_SHA256,
        parameters: None,
    });
    match chain.validate(&t, None) {
        Err(IssuanceError::AlgorithmNotAllowed { algorithm }) => {
            assert_eq!(algorithm, "SHA256withEC")
        }
        other => panic!("unexpected result {:?}", other),
    }

    t.signature_algorithm = Some(AlgorithmIdentifierOwned {
        oid: oids::SHA256_WITH_RSA,
        parameters: None,
    });
    assert!(chain.validate(&t, None).is_ok());
}

#[test]
fn test_validity_range_at_fixed_time() {
    let chain = ConstraintChain::new(vec![rule(
        "one-year",
        DefaultPolicyKind::Validity,
        ConstraintKind::Validity,
        &[("range", "365"), ("notBeforeCheck", "true")],
    )]);
    let mut t = template("CN=validity");

    let window = |start: u64, days: u64| {
        ValidityWindow::from_unix(
            Duration::from_secs(start),
            Duration::from_secs(start + days * DAY),
        )
        .expect("Valid window")
    };

    t.validity = Some(window(NOW, 365));
    assert!(chain.validate_at(&t, None, now()).is_ok());

    t.validity = Some(window(NOW, 400));
    assert!(matches!(
        chain.validate_at(&t, None, now()),
        Err(IssuanceError::ValidityOutOfRange(_))
    ));

    // Starts tomorrow, no grace period
    t.validity = Some(window(NOW + DAY, 30));
    assert!(matches!(
        chain.validate_at(&t, None, now()),
        Err(IssuanceError::ValidityOutOfRange(_))
    ));
}

#[test]
fn test_pipeline_with_key_constraint() {
    let chain = ConstraintChain::new(vec![
        rule(
            "p256-only",
            DefaultPolicyKind::UserKey,
            ConstraintKind::Key,
            &[("keyType", "EC"), ("keyParameters", "nistp256")],
        ),
        rule(
            "subject",
            DefaultPolicyKind::UserSubjectName,
            ConstraintKind::SubjectName,
            &[("pattern", "CN=[a-z0-9.-]+")],
        ),
    ]);
    let pipeline = IssuancePipeline::new(RequestParams::default(), chain.clone());

    // rcgen generates P-256 keys
    let approved = pipeline
        .process_pkcs10(&pkcs10_request("device-01.example.com"), None)
        .expect("Request should be approved");
    assert_eq!(approved.public_key.algorithm.oid, oids::EC_PUBLIC_KEY);

    // Ed25519 template fails the key rule
    let result = chain.validate(&template("CN=ed25519"), None);
    assert!(matches!(result, Err(IssuanceError::KeyNotAllowed(_))));

    let err = pipeline
        .process_pkcs10(&pkcs10_request("Not Lower Case"), None)
        .expect_err("Pattern mismatch");
    assert!(matches!(err, IssuanceError::SubjectPatternMismatch { .. }));
}

#[test]
fn test_no_constraint_accepts_everything() {
    let chain = ConstraintChain::new(vec![rule(
        "noop",
        DefaultPolicyKind::AuthTokenSubjectName,
        ConstraintKind::NoConstraint,
        &[],
    )]);
    assert_eq!(chain.len(), 1);
    assert!(chain.validate(&template("CN=anything"), None).is_ok());

    let noop = chain.iter().next().expect("One rule");
    assert_eq!(noop.constraint.describe("en"), "No constraint");
}
