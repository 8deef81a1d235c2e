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

//! KEYGEN (signed public key and challenge) decoder.
//!
//! A KEYGEN request carries nothing but a public key, so the subject comes
//! from the authenticated identity. Two mechanisms may instead take it from
//! the submitted form, either as a full `subject` DN or as the individual
//! fields `uid`, `e`, `cn`, `ou`, `o`, `l`, `st`, `c`.

use std::collections::BTreeMap;
use std::str::FromStr;

use const_oid::ObjectIdentifier;
use der::asn1::{Any, BitString, Ia5String, SetOfVec};
use der::{Decode, Encode, Sequence, Tag};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use tracing::debug;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};

use super::{
    request_fingerprint, signature, unwrap_transport, RequestDecoder, RequestFormat, RequestParams,
};
use crate::error::{IssuanceError, Result};
use crate::identity::{apply_identity_overrides, AuthenticatedIdentity};
use crate::oids;
use crate::template::CertificateTemplate;

/// ```text
/// PublicKeyAndChallenge ::= SEQUENCE {
///     spki        SubjectPublicKeyInfo,
///     challenge   IA5STRING }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct PublicKeyAndChallenge {
    pub spki: SubjectPublicKeyInfoOwned,
    pub challenge: Ia5String,
}

/// ```text
/// SignedPublicKeyAndChallenge ::= SEQUENCE {
///     publicKeyAndChallenge   PublicKeyAndChallenge,
///     signatureAlgorithm      AlgorithmIdentifier,
///     signature               BIT STRING }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct SignedPublicKeyAndChallenge {
    pub public_key_and_challenge: PublicKeyAndChallenge,
    pub signature_algorithm: AlgorithmIdentifierOwned,
    pub signature: BitString,
}

/// Form fields in RFC 4514 display order, with their attribute type and string tag.
const FORM_FIELDS: [(&str, ObjectIdentifier, Tag); 8] = [
    ("uid", oids::UID, Tag::Utf8String),
    ("e", oids::EMAIL, Tag::Ia5String),
    ("cn", oids::CN, Tag::Utf8String),
    ("ou", oids::OU, Tag::Utf8String),
    ("o", oids::O, Tag::Utf8String),
    ("l", oids::L, Tag::Utf8String),
    ("st", oids::ST, Tag::Utf8String),
    ("c", oids::C, Tag::PrintableString),
];

/// Build a subject from submitted form fields, if the form carries any.
pub fn form_subject(form: &BTreeMap<String, String>) -> Result<Option<Name>> {
    if let Some(dn) = form.get("subject").filter(|s| !s.trim().is_empty()) {
        let name = Name::from_str(dn.trim())
            .map_err(|e| IssuanceError::malformed(format!("invalid subject '{}': {}", dn, e)))?;
        return Ok(Some(name));
    }

    let mut rdns = Vec::new();
    // Encoding order is the reverse of display order.
    for (field, oid, tag) in FORM_FIELDS.iter().rev() {
        let Some(value) = form.get(*field).map(|v| v.trim()).filter(|v| !v.is_empty()) else {
            continue;
        };
        let atv = AttributeTypeAndValue {
            oid: *oid,
            value: Any::new(*tag, value.as_bytes().to_vec())?,
        };
        rdns.push(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?));
    }

    if rdns.is_empty() {
        Ok(None)
    } else {
        Ok(Some(RdnSequence(rdns)))
    }
}

/// Decoder for signed public key and challenge requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeygenDecoder;

impl KeygenDecoder {
    /// Create a decoder.
    pub fn new() -> Self {
        Self
    }

    fn resolve_subject(
        identity: Option<&AuthenticatedIdentity>,
        params: &RequestParams,
    ) -> Result<Name> {
        let identity = identity.ok_or(IssuanceError::MissingSubjectFromIdentity)?;
        if let Some(subject) = &identity.subject {
            return Ok(subject.clone());
        }
        if !identity.mechanism.permits_form_subject() {
            return Err(IssuanceError::MissingSubjectFromIdentity);
        }

        debug!(
            mechanism = %identity.mechanism,
            "Building KEYGEN subject from form fields"
        );
        form_subject(&params.form)?.ok_or(IssuanceError::MissingSubject)
    }
}

impl RequestDecoder for KeygenDecoder {
    type Output = CertificateTemplate;

    fn format(&self) -> RequestFormat {
        RequestFormat::Keygen
    }

    fn decode(
        &self,
        raw: &[u8],
        identity: Option<&AuthenticatedIdentity>,
        params: &RequestParams,
    ) -> Result<CertificateTemplate> {
        let der = unwrap_transport(raw)?;
        let spkac = SignedPublicKeyAndChallenge::from_der(&der)?;

        debug!(
            format = %RequestFormat::Keygen,
            fingerprint = %request_fingerprint(&der),
            "Decoding certificate request"
        );

        let pkac = spkac.public_key_and_challenge;
        if pkac.spki.subject_public_key.raw_bytes().is_empty() {
            return Err(IssuanceError::MissingKey);
        }

        if params.verify_signature {
            signature::verify(
                &pkac.spki,
                &spkac.signature_algorithm,
                &pkac.to_der()?,
                &spkac.signature,
            )?;
        }

        let subject = Self::resolve_subject(identity, params)?;
        let mut template = CertificateTemplate::new(subject, pkac.spki);

        if let Some(identity) = identity {
            apply_identity_overrides(&mut template, identity, RequestFormat::Keygen);
        }

        debug!(subject = %template.subject_string(), "Decoded KEYGEN request");
        Ok(template)
    }
}
