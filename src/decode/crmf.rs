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

//! CRMF certificate request message decoder (RFC 4211).
//!
//! A CRMF request is a `SEQUENCE SIZE (1..MAX) OF CertReqMsg`; every
//! message yields one [`CrmfRequest`], index-aligned with the input.
//!
//! Proof of possession handling:
//!
//! | POP | Outcome |
//! |-----|---------|
//! | `signature` | must verify, else `ProofOfPossessionFailed` |
//! | `raVerified`, `keyEncipherment`, `keyAgreement` | accepted |
//! | absent | `ProofOfPossessionMissing` when enforced, else accepted |

use der::asn1::{Any, BitString, Null};
use der::{Choice, Decode, Encode, Sequence};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use tracing::{debug, warn};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Time;
use x509_cert::Version;

use super::{
    request_fingerprint, signature, subject_or_identity, unwrap_transport, RequestDecoder,
    RequestFormat, RequestParams,
};
use crate::error::{IssuanceError, Result};
use crate::identity::{apply_identity_overrides, AuthenticatedIdentity};
use crate::template::{CertificateTemplate, ExtensionMap, ValidityWindow};

// ============================================================================
// ASN.1 structures
// ============================================================================

/// `CertReqMessages ::= SEQUENCE SIZE (1..MAX) OF CertReqMsg`
pub type CertReqMessages = Vec<CertReqMsg>;

/// ```text
/// CertReqMsg ::= SEQUENCE {
///     certReq   CertRequest,
///     popo      ProofOfPossession  OPTIONAL,
///     regInfo   SEQUENCE SIZE(1..MAX) OF AttributeTypeAndValue OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct CertReqMsg {
    pub cert_req: CertRequest,
    pub popo: Option<ProofOfPossession>,
    pub reg_info: Option<Vec<AttributeTypeAndValue>>,
}

/// ```text
/// CertRequest ::= SEQUENCE {
///     certReqId     INTEGER,
///     certTemplate  CertTemplate,
///     controls      Controls OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct CertRequest {
    pub cert_req_id: i64,
    pub cert_template: CertTemplate,
    pub controls: Option<Vec<AttributeTypeAndValue>>,
}

/// Requested certificate fields. Every field is optional.
#[derive(Clone, Debug, Default, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct CertTemplate {
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub version: Option<Version>,
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    pub serial_number: Option<SerialNumber>,
    #[asn1(context_specific = "2", tag_mode = "IMPLICIT", optional = "true")]
    pub signing_alg: Option<AlgorithmIdentifierOwned>,
    #[asn1(context_specific = "3", tag_mode = "EXPLICIT", optional = "true")]
    pub issuer: Option<Name>,
    #[asn1(context_specific = "4", tag_mode = "IMPLICIT", optional = "true")]
    pub validity: Option<OptionalValidity>,
    #[asn1(context_specific = "5", tag_mode = "EXPLICIT", optional = "true")]
    pub subject: Option<Name>,
    #[asn1(context_specific = "6", tag_mode = "IMPLICIT", optional = "true")]
    pub public_key: Option<SubjectPublicKeyInfoOwned>,
    #[asn1(context_specific = "7", tag_mode = "IMPLICIT", optional = "true")]
    pub issuer_uid: Option<BitString>,
    #[asn1(context_specific = "8", tag_mode = "IMPLICIT", optional = "true")]
    pub subject_uid: Option<BitString>,
    #[asn1(context_specific = "9", tag_mode = "IMPLICIT", optional = "true")]
    pub extensions: Option<Vec<Extension>>,
}

/// ```text
/// OptionalValidity ::= SEQUENCE {
///     notBefore  [0] Time OPTIONAL,
///     notAfter   [1] Time OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct OptionalValidity {
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub not_before: Option<Time>,
    #[asn1(context_specific = "1", tag_mode = "EXPLICIT", optional = "true")]
    pub not_after: Option<Time>,
}

/// ```text
/// ProofOfPossession ::= CHOICE {
///     raVerified        [0] NULL,
///     signature         [1] POPOSigningKey,
///     keyEncipherment   [2] POPOPrivKey,
///     keyAgreement      [3] POPOPrivKey }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Choice)]
#[allow(missing_docs)]
pub enum ProofOfPossession {
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", constructed = "false")]
    RaVerified(Null),
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", constructed = "true")]
    Signature(PopoSigningKey),
    #[asn1(context_specific = "2", tag_mode = "EXPLICIT", constructed = "true")]
    KeyEncipherment(Any),
    #[asn1(context_specific = "3", tag_mode = "EXPLICIT", constructed = "true")]
    KeyAgreement(Any),
}

/// ```text
/// POPOSigningKey ::= SEQUENCE {
///     poposkInput           [0] POPOSigningKeyInput OPTIONAL,
///     algorithmIdentifier   AlgorithmIdentifier,
///     signature             BIT STRING }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct PopoSigningKey {
    #[asn1(
        context_specific = "0",
        tag_mode = "IMPLICIT",
        constructed = "true",
        optional = "true"
    )]
    pub poposk_input: Option<PopoSigningKeyInput>,
    pub algorithm_identifier: AlgorithmIdentifierOwned,
    pub signature: BitString,
}

/// ```text
/// POPOSigningKeyInput ::= SEQUENCE {
///     authInfo   CHOICE { sender [0] GeneralName, publicKeyMAC PKMACValue },
///     publicKey  SubjectPublicKeyInfo }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct PopoSigningKeyInput {
    pub auth_info: Any,
    pub public_key: SubjectPublicKeyInfoOwned,
}

// ============================================================================
// Decoder
// ============================================================================

/// One decoded CRMF message.
#[derive(Debug, Clone)]
pub struct CrmfRequest {
    /// `certReqId` of the message, for correlation with the response.
    pub request_id: i64,
    /// Decoded template.
    pub template: CertificateTemplate,
}

/// Decoder for CRMF request messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrmfDecoder;

impl CrmfDecoder {
    /// Create a decoder.
    pub fn new() -> Self {
        Self
    }

    fn decode_message(
        &self,
        msg: &CertReqMsg,
        identity: Option<&AuthenticatedIdentity>,
        params: &RequestParams,
    ) -> Result<CrmfRequest> {
        let request_id = msg.cert_req.cert_req_id;
        let requested = &msg.cert_req.cert_template;

        let public_key = requested
            .public_key
            .clone()
            .filter(|key| !key.subject_public_key.raw_bytes().is_empty())
            .ok_or(IssuanceError::MissingKey)?;

        verify_pop(msg, &public_key, params)?;

        let subject = subject_or_identity(requested.subject.clone(), identity)?;
        let mut template = CertificateTemplate::new(subject, public_key);

        if let Some(validity) = &requested.validity {
            template.validity = Some(ValidityWindow {
                not_before: validity.not_before,
                not_after: validity.not_after,
            });
        }
        if let Some(alg) = &requested.signing_alg {
            template.signature_algorithm = Some(alg.clone());
        }
        if let Some(extensions) = &requested.extensions {
            template.extensions = ExtensionMap::from_x509(extensions)?;
        }

        if let Some(identity) = identity {
            apply_identity_overrides(&mut template, identity, RequestFormat::Crmf);
        }

        debug!(
            request_id,
            subject = %template.subject_string(),
            extensions = template.extensions.len(),
            "Decoded CRMF message"
        );

        Ok(CrmfRequest {
            request_id,
            template,
        })
    }
}

/// Check the proof of possession of one message against its public key.
fn verify_pop(
    msg: &CertReqMsg,
    public_key: &SubjectPublicKeyInfoOwned,
    params: &RequestParams,
) -> Result<()> {
    let request_id = msg.cert_req.cert_req_id;
    let failed = |reason: String| IssuanceError::ProofOfPossessionFailed { request_id, reason };

    match &msg.popo {
        Some(ProofOfPossession::Signature(popo)) => {
            let signed = match &popo.poposk_input {
                Some(input) => {
                    if input.public_key != *public_key {
                        return Err(failed(
                            "POPOSigningKeyInput public key differs from template".into(),
                        ));
                    }
                    input.to_der()?
                }
                None => msg.cert_req.to_der()?,
            };

            signature::verify(
                public_key,
                &popo.algorithm_identifier,
                &signed,
                &popo.signature,
            )
            .map_err(|e| match e {
                IssuanceError::SignatureInvalid(reason) => failed(reason),
                other => other,
            })?;

            debug!(request_id, "Signature proof of possession verified");
            Ok(())
        }
        Some(ProofOfPossession::RaVerified(_)) => {
            debug!(request_id, "Proof of possession asserted by RA");
            Ok(())
        }
        Some(ProofOfPossession::KeyEncipherment(_) | ProofOfPossession::KeyAgreement(_)) => {
            debug!(request_id, "Accepting private key proof of possession");
            Ok(())
        }
        None if params.enforce_pop => Err(IssuanceError::ProofOfPossessionMissing { request_id }),
        None => {
            warn!(request_id, "Accepting CRMF request without proof of possession");
            Ok(())
        }
    }
}

impl RequestDecoder for CrmfDecoder {
    type Output = Vec<CrmfRequest>;

    fn format(&self) -> RequestFormat {
        RequestFormat::Crmf
    }

    fn decode(
        &self,
        raw: &[u8],
        identity: Option<&AuthenticatedIdentity>,
        params: &RequestParams,
    ) -> Result<Vec<CrmfRequest>> {
        let der = unwrap_transport(raw)?;
        let messages = CertReqMessages::from_der(&der)?;

        if messages.is_empty() {
            return Err(IssuanceError::protocol(
                "CertReqMessages must contain at least one message",
            ));
        }

        debug!(
            format = %RequestFormat::Crmf,
            fingerprint = %request_fingerprint(&der),
            messages = messages.len(),
            "Decoding certificate request"
        );

        messages
            .iter()
            .map(|msg| self.decode_message(msg, identity, params))
            .collect()
    }
}
