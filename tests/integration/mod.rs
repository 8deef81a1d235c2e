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

//! Integration test utilities and helpers
//!
//! Request generators and template builders shared by the integration tests.

mod chain_test;
mod config_test;
mod decode_test;
mod uniqueness_test;

use std::str::FromStr;

use der::asn1::BitString;
use der::Encode;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair as _};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use usg_ca_issuance::decode::crmf::{
    CertReqMsg, CertRequest, CertTemplate, PopoSigningKey, ProofOfPossession,
};
use usg_ca_issuance::oids;
use usg_ca_issuance::{
    CertificateTemplate, ConstraintInstance, ConstraintKind, ConstraintParams, DefaultPolicyKind,
    ExtensionPayload, PolicyRule, TemplateExtension,
};
use x509_cert::name::Name;

/// Generate a DER PKCS#10 request for `cn` with a fresh P-256 key.
pub fn pkcs10_request(cn: &str) -> Vec<u8> {
    let key = KeyPair::generate().expect("Failed to generate key");
    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, cn);
    params.distinguished_name = dn;
    params
        .serialize_request(&key)
        .expect("Failed to serialize CSR")
        .der()
        .to_vec()
}

/// Ed25519 key pair with its SubjectPublicKeyInfo.
pub fn ed25519_key() -> (Ed25519KeyPair, SubjectPublicKeyInfoOwned) {
    let pkcs8 =
        Ed25519KeyPair::generate_pkcs8(&SystemRandom::new()).expect("Failed to generate key");
    let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).expect("Invalid PKCS#8");
    let public_key = BitString::from_bytes(pair.public_key().as_ref()).expect("Valid key");
    let spki = SubjectPublicKeyInfoOwned {
        algorithm: ed25519_algorithm(),
        subject_public_key: public_key,
    };
    (pair, spki)
}

pub fn ed25519_algorithm() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: oids::ED25519,
        parameters: None,
    }
}

/// CRMF certificate request with a subject and public key.
pub fn crmf_request(id: i64, subject: &str, spki: &SubjectPublicKeyInfoOwned) -> CertRequest {
    CertRequest {
        cert_req_id: id,
        cert_template: CertTemplate {
            subject: Some(Name::from_str(subject).expect("Valid DN")),
            public_key: Some(spki.clone()),
            ..Default::default()
        },
        controls: None,
    }
}

/// Wrap a request with a signature proof of possession over the DER `CertRequest`.
pub fn crmf_signed(pair: &Ed25519KeyPair, cert_req: CertRequest) -> CertReqMsg {
    let signature = pair.sign(&cert_req.to_der().expect("Encodable request"));
    CertReqMsg {
        cert_req,
        popo: Some(ProofOfPossession::Signature(PopoSigningKey {
            poposk_input: None,
            algorithm_identifier: ed25519_algorithm(),
            signature: BitString::from_bytes(signature.as_ref()).expect("Valid signature"),
        })),
        reg_info: None,
    }
}

/// Template with an Ed25519 key and no extensions.
pub fn template(subject: &str) -> CertificateTemplate {
    let (_, spki) = ed25519_key();
    CertificateTemplate::new(Name::from_str(subject).expect("Valid DN"), spki)
}

/// Template carrying a single extension.
pub fn template_with(
    subject: &str,
    oid: const_oid::ObjectIdentifier,
    critical: bool,
    payload: ExtensionPayload,
) -> CertificateTemplate {
    let mut t = template(subject);
    t.extensions.insert(oid, TemplateExtension::new(critical, payload));
    t
}

/// Policy rule built from `(name, value)` parameter pairs.
pub fn rule(
    name: &str,
    default: DefaultPolicyKind,
    kind: ConstraintKind,
    params: &[(&str, &str)],
) -> PolicyRule {
    let params = params
        .iter()
        .fold(ConstraintParams::new(), |p, (k, v)| p.with(*k, *v));
    PolicyRule::new(
        default,
        ConstraintInstance::new(name, kind, params).expect("Valid constraint configuration"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_requests_are_der_sequences() {
        assert_eq!(pkcs10_request("helper")[0], 0x30);

        let (pair, spki) = ed25519_key();
        let msg = crmf_signed(&pair, crmf_request(1, "CN=helper", &spki));
        assert_eq!(msg.to_der().expect("Encodable message")[0], 0x30);
    }
}
