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

//! Integration tests for loading issuance policy files

use std::io::Write;

use tempfile::NamedTempFile;
use usg_ca_issuance::oids;
use usg_ca_issuance::template::BitArray;
use usg_ca_issuance::{
    ConstraintKind, DefaultPolicyKind, ExtensionPayload, IssuanceConfig, IssuanceError,
    IssuancePipeline,
};

use crate::integration::{pkcs10_request, template_with};

const POLICY: &str = r#"
[request]
enforce_pop = true
verify_signature = true

[logging]
level = "debug"

[[policy]]
name = "no-op"
constraint = "no_constraint"

[[policy]]
name = "server-subject"
default = "subject_name"
constraint = "subject_name"

[policy.params]
pattern = "CN=[a-z0-9.-]+\\.example\\.com"

[[policy]]
name = "server-key-usage"
default = "key_usage_extension"
constraint = "key_usage"

[policy.params]
keyUsageCritical = "-"
keyUsageDigitalSignature = "true"
keyUsageKeyCertSign = "false"

[[policy]]
name = "misplaced-validity"
default = "key_usage_extension"
constraint = "validity"
"#;

fn write_policy(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write policy");
    file
}

#[test]
fn test_load_policy_file() {
    let file = write_policy(POLICY);

    let config = IssuanceConfig::from_file(file.path()).expect("Policy should load");
    config.validate().expect("Policy should be valid");

    assert_eq!(config.policies.len(), 4);
    assert_eq!(config.policies[0].default, DefaultPolicyKind::NoDefault);
    assert_eq!(config.policies[3].constraint, ConstraintKind::Validity);

    let chain = config.build_chain().expect("Chain should build");
    let active: Vec<&str> = chain.iter().map(|r| r.constraint.name()).collect();
    assert_eq!(active, vec!["no-op", "server-subject", "server-key-usage"]);
    assert_eq!(chain.skipped().len(), 1);
    assert_eq!(chain.skipped()[0].constraint.name(), "misplaced-validity");
}

#[test]
fn test_policy_file_drives_pipeline() {
    let file = write_policy(POLICY);
    let config = IssuanceConfig::from_file(file.path()).expect("Policy should load");
    let chain = config.build_chain().expect("Chain should build");

    let signing = template_with(
        "CN=www.example.com",
        oids::KEY_USAGE,
        true,
        ExtensionPayload::KeyUsage(BitArray::with_bits_set(9, &[0, 2])),
    );
    assert!(chain.validate(&signing, None).is_ok());

    let ca = template_with(
        "CN=www.example.com",
        oids::KEY_USAGE,
        true,
        ExtensionPayload::KeyUsage(BitArray::with_bits_set(9, &[0, 5])),
    );
    let err = chain.validate(&ca, None).expect_err("keyCertSign is forbidden");
    assert!(matches!(
        err,
        IssuanceError::BitMismatch {
            bit: "keyCertSign",
            expected: false,
            ..
        }
    ));

    // rcgen requests carry no key usage, so the key-usage rule rejects them
    let pipeline = IssuancePipeline::new(config.request_params(), chain);
    let err = pipeline
        .process_pkcs10(&pkcs10_request("www.example.com"), None)
        .expect_err("Key usage is required");
    assert!(matches!(err, IssuanceError::ExtensionNotFound { .. }));
}

#[test]
fn test_invalid_policy_file_reports_every_problem() {
    let file = write_policy(
        r#"
[[policy]]
name = "bad-pattern"
constraint = "subject_name"
[policy.params]
pattern = "CN=(unclosed"

[[policy]]
name = "bad-eku"
constraint = "extended_key_usage"
[policy.params]
exKeyUsageOIDs = "serverAuth"
"#,
    );

    let config = IssuanceConfig::from_file(file.path()).expect("Syntax is valid");
    let message = config
        .validate()
        .expect_err("Policy should be invalid")
        .to_string();
    assert!(message.contains("bad-pattern"), "{}", message);
    assert!(message.contains("bad-eku"), "{}", message);

    assert!(config.build_chain().is_err());
}

#[test]
fn test_missing_policy_file() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let result = IssuanceConfig::from_file(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(IssuanceError::Config(_))));
}

#[test]
fn test_written_policy_reloads() {
    let config = IssuanceConfig::from_toml(POLICY).expect("Policy should parse");
    let file = write_policy(&config.to_toml().expect("Policy should serialize"));

    let reloaded = IssuanceConfig::from_file(file.path()).expect("Policy should reload");
    assert_eq!(reloaded, config);
}
