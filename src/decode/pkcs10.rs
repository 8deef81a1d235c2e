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

//! PKCS#10 certification request decoder (RFC 2986).

use der::{Decode, Encode};
use tracing::debug;
use x509_cert::ext::Extension;
use x509_cert::request::{CertReq, CertReqInfo};

use super::{
    request_fingerprint, signature, subject_or_identity, unwrap_transport, RequestDecoder,
    RequestFormat, RequestParams,
};
use crate::error::{IssuanceError, Result};
use crate::identity::{apply_identity_overrides, AuthenticatedIdentity};
use crate::oids;
use crate::template::{CertificateTemplate, ExtensionMap};

/// Decoder for PKCS#10 requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pkcs10Decoder;

impl Pkcs10Decoder {
    /// Create a decoder.
    pub fn new() -> Self {
        Self
    }
}

/// Collect the extensions carried in the extension request attributes.
///
/// Both the PKCS#9 `extensionRequest` and the Microsoft certificate
/// extensions attribute are honoured. Any malformed value fails the whole
/// request.
fn requested_extensions(info: &CertReqInfo) -> Result<ExtensionMap> {
    let mut extensions = Vec::new();

    for attr in info.attributes.iter() {
        if attr.oid != oids::EXTENSION_REQUEST && attr.oid != oids::MS_CERT_EXTENSIONS {
            continue;
        }
        for value in attr.values.iter() {
            let der = value
                .to_der()
                .map_err(|e| IssuanceError::extension_decode(e.to_string()))?;
            let decoded = Vec::<Extension>::from_der(&der).map_err(|e| {
                IssuanceError::extension_decode(format!("attribute {}: {}", attr.oid, e))
            })?;
            extensions.extend(decoded);
        }
    }

    ExtensionMap::from_x509(&extensions)
}

impl RequestDecoder for Pkcs10Decoder {
    type Output = CertificateTemplate;

    fn format(&self) -> RequestFormat {
        RequestFormat::Pkcs10
    }

    fn decode(
        &self,
        raw: &[u8],
        identity: Option<&AuthenticatedIdentity>,
        params: &RequestParams,
    ) -> Result<CertificateTemplate> {
        let der = unwrap_transport(raw)?;
        let req = CertReq::from_der(&der)?;

        debug!(
            format = %RequestFormat::Pkcs10,
            fingerprint = %request_fingerprint(&der),
            "Decoding certificate request"
        );

        if req.info.public_key.subject_public_key.raw_bytes().is_empty() {
            return Err(IssuanceError::MissingKey);
        }

        if params.verify_signature {
            let tbs = req.info.to_der()?;
            signature::verify(&req.info.public_key, &req.algorithm, &tbs, &req.signature)?;
        }

        let extensions = requested_extensions(&req.info)?;
        let subject = subject_or_identity(Some(req.info.subject.clone()), identity)?;

        let mut template = CertificateTemplate::new(subject, req.info.public_key);
        template.extensions = extensions;

        if let Some(identity) = identity {
            apply_identity_overrides(&mut template, identity, RequestFormat::Pkcs10);
        }

        debug!(
            subject = %template.subject_string(),
            extensions = template.extensions.len(),
            "Decoded PKCS#10 request"
        );

        Ok(template)
    }
}
