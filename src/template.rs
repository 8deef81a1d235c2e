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

//! Certificate template: the canonical, pre-signing form of a request.
//!
//! Every request decoder produces a [`CertificateTemplate`]. The template is
//! owned by the request flow that created it and is only mutated by the
//! decoders and the identity override resolver; constraints read it.
//!
//! Extensions are held in an [`ExtensionMap`] keyed by OID, with the
//! payload of well-known extensions decoded into typed form:
//!
//! | Extension | Payload |
//! |-----------|---------|
//! | Key Usage (2.5.29.15) | [`BitArray`] |
//! | Netscape Cert Type (2.16.840.1.113730.1.1) | [`BitArray`] |
//! | Basic Constraints (2.5.29.19) | CA flag + optional path length |
//! | Extended Key Usage (2.5.29.37) | OID list |
//! | anything else | raw DER bytes |

use const_oid::ObjectIdentifier;
use der::asn1::{BitString, OctetString};
use der::{Decode, Encode, Tag, Tagged};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use std::time::Duration;
use x509_cert::ext::pkix::{BasicConstraints, ExtendedKeyUsage};
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::time::{Time, Validity};

use crate::error::{IssuanceError, Result};
use crate::oids;

/// A fixed-position boolean array, as carried by bit-field extensions.
///
/// Position 0 is the most significant bit of the first byte of the
/// underlying BIT STRING. Reading past the end yields `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BitArray(Vec<bool>);

impl BitArray {
    /// Create a bit array from explicit values.
    pub fn new(bits: Vec<bool>) -> Self {
        Self(bits)
    }

    /// Create a bit array with the given positions set.
    pub fn with_bits_set(len: usize, positions: &[usize]) -> Self {
        let mut bits = vec![false; len];
        for &pos in positions {
            if pos < len {
                bits[pos] = true;
            }
        }
        Self(bits)
    }

    /// Decode from a DER BIT STRING value.
    pub fn from_bit_string(bits: &BitString) -> Self {
        let raw = bits.raw_bytes();
        let values = (0..bits.bit_len())
            .map(|i| raw[i / 8] & (0x80 >> (i % 8)) != 0)
            .collect();
        Self(values)
    }

    /// Encode as a DER BIT STRING with trailing zero bits removed.
    pub fn to_bit_string(&self) -> Result<BitString> {
        let used = self.0.iter().rposition(|b| *b).map_or(0, |last| last + 1);
        let mut bytes = vec![0u8; used.div_ceil(8)];
        for (i, _) in self.0.iter().take(used).enumerate().filter(|(_, b)| **b) {
            bytes[i / 8] |= 0x80 >> (i % 8);
        }
        let unused = (bytes.len() * 8 - used) as u8;
        Ok(BitString::new(unused, bytes)?)
    }

    /// Value at `position`, `false` past the end of the array.
    pub fn get(&self, position: usize) -> bool {
        self.0.get(position).copied().unwrap_or(false)
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the array has no bits.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the bits.
    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }
}

/// Requested validity window; either bound may still be unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidityWindow {
    /// Start of validity.
    pub not_before: Option<Time>,
    /// End of validity.
    pub not_after: Option<Time>,
}

impl ValidityWindow {
    /// Window with both bounds set.
    pub fn new(not_before: Time, not_after: Time) -> Self {
        Self {
            not_before: Some(not_before),
            not_after: Some(not_after),
        }
    }

    /// Window expressed as seconds since the Unix epoch.
    pub fn from_unix(not_before: Duration, not_after: Duration) -> Result<Self> {
        Ok(Self::new(unix_time(not_before)?, unix_time(not_after)?))
    }

    /// Both bounds as a complete X.509 validity, if both are set.
    pub fn to_validity(&self) -> Option<Validity> {
        match (self.not_before, self.not_after) {
            (Some(not_before), Some(not_after)) => Some(Validity {
                not_before,
                not_after,
            }),
            _ => None,
        }
    }

    /// Length of the window, if both bounds are set and ordered.
    pub fn length(&self) -> Option<Duration> {
        let not_before = self.not_before?.to_unix_duration();
        let not_after = self.not_after?.to_unix_duration();
        not_after.checked_sub(not_before)
    }
}

impl From<Validity> for ValidityWindow {
    fn from(validity: Validity) -> Self {
        Self::new(validity.not_before, validity.not_after)
    }
}

/// Convert a Unix duration into an X.509 time value.
pub fn unix_time(since_epoch: Duration) -> Result<Time> {
    Ok(Time::GeneralTime(
        der::asn1::GeneralizedTime::from_unix_duration(since_epoch)?,
    ))
}

/// Typed payload of a template extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionPayload {
    /// Key Usage bits.
    KeyUsage(BitArray),
    /// Netscape certificate type bits.
    NsCertType(BitArray),
    /// Basic Constraints.
    BasicConstraints {
        /// cA flag.
        ca: bool,
        /// pathLenConstraint; `None` means unlimited.
        path_len: Option<u8>,
    },
    /// Extended Key Usage purposes.
    ExtendedKeyUsage(Vec<ObjectIdentifier>),
    /// Any other extension, as raw DER.
    Other(Vec<u8>),
}

impl ExtensionPayload {
    /// Decode the DER value of extension `oid` into typed form.
    pub fn decode(oid: &ObjectIdentifier, value: &[u8]) -> Result<Self> {
        let wrap = |e: der::Error| IssuanceError::extension_decode(format!("{}: {}", oid, e));

        let payload = if *oid == oids::KEY_USAGE {
            Self::KeyUsage(BitArray::from_bit_string(
                &BitString::from_der(value).map_err(wrap)?,
            ))
        } else if *oid == oids::NS_CERT_TYPE {
            Self::NsCertType(BitArray::from_bit_string(
                &BitString::from_der(value).map_err(wrap)?,
            ))
        } else if *oid == oids::BASIC_CONSTRAINTS {
            let bc = BasicConstraints::from_der(value).map_err(wrap)?;
            Self::BasicConstraints {
                ca: bc.ca,
                path_len: bc.path_len_constraint,
            }
        } else if *oid == oids::EXTENDED_KEY_USAGE {
            Self::ExtendedKeyUsage(ExtendedKeyUsage::from_der(value).map_err(wrap)?.0)
        } else {
            Self::Other(value.to_vec())
        };

        Ok(payload)
    }

    /// Encode the payload back to DER.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        let der = match self {
            Self::KeyUsage(bits) | Self::NsCertType(bits) => bits.to_bit_string()?.to_der()?,
            Self::BasicConstraints { ca, path_len } => BasicConstraints {
                ca: *ca,
                path_len_constraint: *path_len,
            }
            .to_der()?,
            Self::ExtendedKeyUsage(oids) => ExtendedKeyUsage(oids.clone()).to_der()?,
            Self::Other(bytes) => bytes.clone(),
        };
        Ok(der)
    }
}

/// One extension in the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateExtension {
    /// Criticality flag.
    pub critical: bool,
    /// Decoded value.
    pub payload: ExtensionPayload,
}

impl TemplateExtension {
    /// Create an extension value.
    pub fn new(critical: bool, payload: ExtensionPayload) -> Self {
        Self { critical, payload }
    }

    /// Convert into an X.509 extension with identifier `oid`.
    pub fn to_x509(&self, oid: ObjectIdentifier) -> Result<Extension> {
        Ok(Extension {
            extn_id: oid,
            critical: self.critical,
            extn_value: OctetString::new(self.payload.to_der()?)?,
        })
    }
}

/// Ordered extension map with unique OIDs.
///
/// Inserting an OID that is already present replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionMap {
    entries: Vec<(ObjectIdentifier, TemplateExtension)>,
}

impl ExtensionMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a list of X.509 extensions.
    ///
    /// Either every extension decodes or an error is returned; a partially
    /// decoded map is never produced.
    pub fn from_x509(extensions: &[Extension]) -> Result<Self> {
        let mut map = Self::new();
        for ext in extensions {
            let payload = ExtensionPayload::decode(&ext.extn_id, ext.extn_value.as_bytes())?;
            map.insert(ext.extn_id, TemplateExtension::new(ext.critical, payload));
        }
        Ok(map)
    }

    /// Insert or replace the extension with identifier `oid`.
    pub fn insert(&mut self, oid: ObjectIdentifier, ext: TemplateExtension) {
        match self.entries.iter_mut().find(|(id, _)| *id == oid) {
            Some(slot) => slot.1 = ext,
            None => self.entries.push((oid, ext)),
        }
    }

    /// Look up an extension.
    pub fn get(&self, oid: &ObjectIdentifier) -> Option<&TemplateExtension> {
        self.entries
            .iter()
            .find(|(id, _)| id == oid)
            .map(|(_, ext)| ext)
    }

    /// Remove an extension, returning its value.
    pub fn remove(&mut self, oid: &ObjectIdentifier) -> Option<TemplateExtension> {
        let pos = self.entries.iter().position(|(id, _)| id == oid)?;
        Some(self.entries.remove(pos).1)
    }

    /// Returns true if the extension is present.
    pub fn contains(&self, oid: &ObjectIdentifier) -> bool {
        self.get(oid).is_some()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&ObjectIdentifier, &TemplateExtension)> {
        self.entries.iter().map(|(id, ext)| (id, ext))
    }

    /// Number of extensions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode every extension back into X.509 form.
    pub fn to_x509(&self) -> Result<Vec<Extension>> {
        self.entries
            .iter()
            .map(|(oid, ext)| ext.to_x509(*oid))
            .collect()
    }
}

/// The mutable working structure for one certificate request.
#[derive(Debug, Clone)]
pub struct CertificateTemplate {
    /// Subject distinguished name.
    pub subject: Name,
    /// Subject public key.
    pub public_key: SubjectPublicKeyInfoOwned,
    /// Requested or assigned validity.
    pub validity: Option<ValidityWindow>,
    /// Algorithm that will sign the certificate; filled late.
    pub signature_algorithm: Option<AlgorithmIdentifierOwned>,
    /// Certificate extensions.
    pub extensions: ExtensionMap,
}

impl CertificateTemplate {
    /// Create a template from the two mandatory fields.
    pub fn new(subject: Name, public_key: SubjectPublicKeyInfoOwned) -> Self {
        Self {
            subject,
            public_key,
            validity: None,
            signature_algorithm: None,
            extensions: ExtensionMap::new(),
        }
    }

    /// Canonical string form of the subject (RFC 4514).
    pub fn subject_string(&self) -> String {
        self.subject.to_string()
    }

    /// Key Usage bits, if the template carries a Key Usage extension.
    pub fn key_usage(&self) -> Option<&BitArray> {
        match self.extensions.get(&oids::KEY_USAGE).map(|ext| &ext.payload) {
            Some(ExtensionPayload::KeyUsage(bits)) => Some(bits),
            _ => None,
        }
    }
}

/// Returns true if the name has no attributes at all.
pub fn name_is_empty(name: &Name) -> bool {
    name.0.iter().all(|rdn| rdn.0.is_empty())
}

/// Every attribute of a name as `(type, string value)`, in encoding order.
///
/// BMPString values are decoded from UTF-16BE, everything else is read as
/// UTF-8 lossily. UniversalString never gets here: der rejects tag 0x1C.
pub fn name_attributes(name: &Name) -> Vec<(ObjectIdentifier, String)> {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .map(|atv| (atv.oid, attribute_string(atv.value.tag(), atv.value.value())))
        .collect()
}

fn attribute_string(tag: Tag, bytes: &[u8]) -> String {
    match tag {
        Tag::BmpString => char::decode_utf16(
            bytes
                .chunks(2)
                .map(|c| u16::from_be_bytes([c[0], c.get(1).copied().unwrap_or(0)])),
        )
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}
