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

//! Request decoders.
//!
//! Each decoder turns an untrusted, protocol-specific request into a
//! [`CertificateTemplate`](crate::template::CertificateTemplate):
//!
//! - [`Pkcs10Decoder`]: PKCS#10 certification requests (RFC 2986)
//! - [`CrmfDecoder`]: CRMF certificate request messages (RFC 4211)
//! - [`KeygenDecoder`]: signed public key and challenge (HTML KEYGEN)
//!
//! All decoders accept raw DER, base64, or PEM-armoured base64 input.

pub mod crmf;
pub mod keygen;
pub mod pkcs10;
pub mod signature;

pub use crmf::{CrmfDecoder, CrmfRequest};
pub use keygen::KeygenDecoder;
pub use pkcs10::Pkcs10Decoder;

use std::collections::BTreeMap;
use std::fmt;

use base64::prelude::*;
use sha2::{Digest, Sha256};
use x509_cert::name::Name;

use crate::error::{IssuanceError, Result};
use crate::identity::AuthenticatedIdentity;
use crate::template::name_is_empty;

/// Wire format of a certificate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestFormat {
    /// PKCS#10 certification request.
    Pkcs10,
    /// CRMF certificate request messages.
    Crmf,
    /// Signed public key and challenge.
    Keygen,
}

impl fmt::Display for RequestFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pkcs10 => write!(f, "pkcs10"),
            Self::Crmf => write!(f, "crmf"),
            Self::Keygen => write!(f, "keygen"),
        }
    }
}

/// Request-scoped decoding parameters.
#[derive(Debug, Clone)]
pub struct RequestParams {
    /// Reject CRMF messages without proof of possession.
    pub enforce_pop: bool,
    /// Verify PKCS#10 and SPKAC self-signatures.
    pub verify_signature: bool,
    /// Submitted form fields (KEYGEN subject fallback).
    pub form: BTreeMap<String, String>,
}

impl Default for RequestParams {
    fn default() -> Self {
        Self {
            enforce_pop: true,
            verify_signature: true,
            form: BTreeMap::new(),
        }
    }
}

impl RequestParams {
    /// Add a form field.
    pub fn with_form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.insert(name.into(), value.into());
        self
    }
}

/// Decoder contract shared by every request format.
pub trait RequestDecoder {
    /// What one decoded request yields.
    type Output;

    /// Format handled by this decoder.
    fn format(&self) -> RequestFormat;

    /// Decode `raw`, falling back to `identity` for data the request omits.
    fn decode(
        &self,
        raw: &[u8],
        identity: Option<&AuthenticatedIdentity>,
        params: &RequestParams,
    ) -> Result<Self::Output>;
}

/// Strip transport encoding: DER passes through, base64 and PEM are decoded.
pub fn unwrap_transport(raw: &[u8]) -> Result<Vec<u8>> {
    if raw.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(IssuanceError::malformed("empty request"));
    }

    // Every supported request is a DER SEQUENCE.
    if raw[0] == 0x30 {
        return Ok(raw.to_vec());
    }

    let text = std::str::from_utf8(raw)
        .map_err(|_| IssuanceError::malformed("request is neither DER nor base64 text"))?;

    let cleaned: String = text
        .lines()
        .filter(|line| !line.trim_start().starts_with("-----"))
        .flat_map(|line| line.chars())
        .filter(|c| !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return Err(IssuanceError::malformed("request contains no data"));
    }

    Ok(BASE64_STANDARD.decode(cleaned)?)
}

/// Resolve the template subject from the request, else from the identity.
///
/// An empty name in the request counts as absent.
pub(crate) fn subject_or_identity(
    requested: Option<Name>,
    identity: Option<&AuthenticatedIdentity>,
) -> Result<Name> {
    match requested.filter(|name| !name_is_empty(name)) {
        Some(name) => Ok(name),
        None => identity
            .and_then(|id| id.subject.clone())
            .ok_or(IssuanceError::MissingSubject),
    }
}

/// Hex SHA-256 of the raw request, used to correlate log lines.
pub fn request_fingerprint(raw: &[u8]) -> String {
    Sha256::digest(raw)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
