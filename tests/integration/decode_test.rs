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

//! Integration tests for the PKCS#10, CRMF and KEYGEN decoders

use std::str::FromStr;
use std::time::Duration;

use base64::prelude::*;
use der::asn1::{BitString, Ia5String, Null};
use der::Encode;
use usg_ca_issuance::decode::crmf::{CertReqMessages, ProofOfPossession};
use usg_ca_issuance::decode::keygen::{PublicKeyAndChallenge, SignedPublicKeyAndChallenge};
use usg_ca_issuance::template::ValidityWindow;
use usg_ca_issuance::{
    AuthMechanism, AuthenticatedIdentity, CrmfDecoder, IssuanceError, KeygenDecoder,
    Pkcs10Decoder, RequestDecoder, RequestParams,
};
use x509_cert::name::Name;

use crate::integration::{
    crmf_request, crmf_signed, ed25519_algorithm, ed25519_key, pkcs10_request,
};

fn spkac() -> Vec<u8> {
    let (pair, spki) = ed25519_key();
    let pkac = PublicKeyAndChallenge {
        spki,
        challenge: Ia5String::new("integration").expect("Valid IA5 string"),
    };
    let signature = pair.sign(&pkac.to_der().expect("Encodable PKAC"));
    SignedPublicKeyAndChallenge {
        public_key_and_challenge: pkac,
        signature_algorithm: ed25519_algorithm(),
        signature: BitString::from_bytes(signature.as_ref()).expect("Valid signature"),
    }
    .to_der()
    .expect("Encodable SPKAC")
}

#[test]
fn test_pkcs10_base64_request() {
    let der = pkcs10_request("base64.example.com");
    let b64 = BASE64_STANDARD.encode(&der);

    let template = Pkcs10Decoder::new()
        .decode(b64.as_bytes(), None, &RequestParams::default())
        .expect("Decoding should succeed");

    assert_eq!(template.subject_string(), "CN=base64.example.com");
    assert!(!template.public_key.subject_public_key.raw_bytes().is_empty());
    assert!(template.validity.is_none());
}

#[test]
fn test_pkcs10_identity_overrides_subject_and_validity() {
    let der = pkcs10_request("requested.example.com");
    let window = ValidityWindow::from_unix(
        Duration::from_secs(1_750_000_000),
        Duration::from_secs(1_750_000_000 + 86_400 * 30),
    )
    .expect("Valid window");
    let identity = AuthenticatedIdentity::new(AuthMechanism::Renewal)
        .with_subject(Name::from_str("CN=approved.example.com,O=Example").expect("Valid DN"))
        .with_validity(window);

    let template = Pkcs10Decoder::new()
        .decode(&der, Some(&identity), &RequestParams::default())
        .expect("Decoding should succeed");

    assert_eq!(template.subject_string(), "CN=approved.example.com,O=Example");
    assert_eq!(template.validity, Some(window));
}

#[test]
fn test_pkcs10_garbage_is_rejected() {
    let result = Pkcs10Decoder::new().decode(b"not a request", None, &RequestParams::default());
    assert!(
        matches!(&result, Err(e) if e.is_decode_failure()),
        "Expected decode failure, got {:?}",
        result
    );

    let result = Pkcs10Decoder::new().decode(b"  \n", None, &RequestParams::default());
    assert!(matches!(result, Err(IssuanceError::MalformedRequest(_))));
}

#[test]
fn test_crmf_batch_mixed_proofs() {
    let (pair, spki) = ed25519_key();

    let signed = crmf_signed(&pair, crmf_request(10, "CN=signed", &spki));
    let mut ra_verified = crmf_signed(&pair, crmf_request(11, "CN=ra-verified", &spki));
    ra_verified.popo = Some(ProofOfPossession::RaVerified(Null));
    let second_signed = crmf_signed(&pair, crmf_request(12, "CN=third", &spki));

    let batch: CertReqMessages = vec![signed, ra_verified, second_signed];
    let der = batch.to_der().expect("Encodable batch");

    let decoded = CrmfDecoder::new()
        .decode(&der, None, &RequestParams::default())
        .expect("Decoding should succeed");

    let ids: Vec<i64> = decoded.iter().map(|r| r.request_id).collect();
    let subjects: Vec<String> = decoded.iter().map(|r| r.template.subject_string()).collect();
    assert_eq!(ids, vec![10, 11, 12]);
    assert_eq!(subjects, vec!["CN=signed", "CN=ra-verified", "CN=third"]);
}

#[test]
fn test_crmf_missing_pop_fails_whole_batch() {
    let (pair, spki) = ed25519_key();
    let good = crmf_signed(&pair, crmf_request(1, "CN=good", &spki));
    let mut unproven = crmf_signed(&pair, crmf_request(2, "CN=unproven", &spki));
    unproven.popo = None;

    let batch: CertReqMessages = vec![good, unproven];
    let der = batch.to_der().expect("Encodable batch");

    let err = CrmfDecoder::new()
        .decode(&der, None, &RequestParams::default())
        .expect_err("Missing POP must fail when enforced");
    assert!(matches!(
        err,
        IssuanceError::ProofOfPossessionMissing { request_id: 2 }
    ));

    // Accepted once enforcement is off
    let params = RequestParams {
        enforce_pop: false,
        ..Default::default()
    };
    let decoded = CrmfDecoder::new()
        .decode(&der, None, &params)
        .expect("Decoding should succeed");
    assert_eq!(decoded.len(), 2);
}

#[test]
fn test_crmf_empty_batch_is_protocol_violation() {
    let batch: CertReqMessages = Vec::new();
    let der = batch.to_der().expect("Encodable batch");

    let result = CrmfDecoder::new().decode(&der, None, &RequestParams::default());
    assert!(matches!(result, Err(IssuanceError::ProtocolViolation(_))));
}

#[test]
fn test_keygen_requires_identity() {
    let result = KeygenDecoder::new().decode(&spkac(), None, &RequestParams::default());
    assert!(matches!(
        result,
        Err(IssuanceError::MissingSubjectFromIdentity)
    ));
}

#[test]
fn test_keygen_base64_with_identity_subject() {
    let b64 = BASE64_STANDARD.encode(spkac());
    let identity = AuthenticatedIdentity::new(AuthMechanism::AgentCertificate)
        .with_subject(Name::from_str("CN=keygen.example.com").expect("Valid DN"));

    let template = KeygenDecoder::new()
        .decode(b64.as_bytes(), Some(&identity), &RequestParams::default())
        .expect("Decoding should succeed");
    assert_eq!(template.subject_string(), "CN=keygen.example.com");
}

#[test]
fn test_keygen_form_subject_string() {
    let params = RequestParams::default().with_form_field("subject", "CN=Form User,O=Example");
    let identity = AuthenticatedIdentity::new(AuthMechanism::CertificateDatabase);

    let template = KeygenDecoder::new()
        .decode(&spkac(), Some(&identity), &params)
        .expect("Decoding should succeed");
    assert_eq!(template.subject_string(), "CN=Form User,O=Example");

    // Client certificate auth may not take the subject from the form
    let identity = AuthenticatedIdentity::new(AuthMechanism::ClientCertificate);
    let result = KeygenDecoder::new().decode(&spkac(), Some(&identity), &params);
    assert!(matches!(
        result,
        Err(IssuanceError::MissingSubjectFromIdentity)
    ));
}
