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

//! End-to-end issuance flow.
//!
//! This module provides [`IssuancePipeline`], which runs one request through
//! decoding, identity overrides and the constraint chain.

use tracing::info;

use crate::constraint::ConstraintChain;
use crate::decode::{
    request_fingerprint, CrmfDecoder, CrmfRequest, KeygenDecoder, Pkcs10Decoder, RequestDecoder,
    RequestFormat, RequestParams,
};
use crate::error::Result;
use crate::identity::AuthenticatedIdentity;
use crate::template::CertificateTemplate;

/// Decodes requests and validates the resulting templates.
///
/// The pipeline holds only read-only configuration; one instance may serve
/// concurrent requests.
///
/// # Example
///
/// ```no_run
/// use usg_ca_issuance::{ConstraintChain, IssuancePipeline, RequestParams};
///
/// # fn example(csr: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
/// let pipeline = IssuancePipeline::new(RequestParams::default(), ConstraintChain::default());
///
/// let template = pipeline.process_pkcs10(csr, None)?;
/// println!("Approved {}", template.subject_string());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct IssuancePipeline {
    params: RequestParams,
    chain: ConstraintChain,
}

impl IssuancePipeline {
    /// Create a pipeline.
    pub fn new(params: RequestParams, chain: ConstraintChain) -> Self {
        Self { params, chain }
    }

    /// Decoder options.
    pub fn params(&self) -> &RequestParams {
        &self.params
    }

    /// Constraint chain.
    pub fn chain(&self) -> &ConstraintChain {
        &self.chain
    }

    // =========================================================================
    // Request formats
    // =========================================================================

    /// Decode and validate a PKCS#10 request.
    ///
    /// # RFC Reference
    ///
    /// RFC 2986: PKCS #10 Certification Request Syntax
    pub fn process_pkcs10(
        &self,
        raw: &[u8],
        identity: Option<&AuthenticatedIdentity>,
    ) -> Result<CertificateTemplate> {
        self.process_single(&Pkcs10Decoder::new(), raw, identity)
    }

    /// Decode and validate every message of a CRMF request.
    ///
    /// The batch fails as a whole on the first message that fails decoding
    /// or validation.
    ///
    /// # RFC Reference
    ///
    /// RFC 4211: Internet X.509 PKI Certificate Request Message Format
    pub fn process_crmf(
        &self,
        raw: &[u8],
        identity: Option<&AuthenticatedIdentity>,
    ) -> Result<Vec<CrmfRequest>> {
        let requests = CrmfDecoder::new().decode(raw, identity, &self.params)?;
        for request in &requests {
            self.chain.validate(&request.template, identity)?;
        }
        info!(
            format = %RequestFormat::Crmf,
            fingerprint = %request_fingerprint(raw),
            count = requests.len(),
            "Certificate requests approved"
        );
        Ok(requests)
    }

    /// Decode and validate a KEYGEN (signed public key and challenge) request.
    pub fn process_keygen(
        &self,
        raw: &[u8],
        identity: Option<&AuthenticatedIdentity>,
    ) -> Result<CertificateTemplate> {
        self.process_single(&KeygenDecoder::new(), raw, identity)
    }

    /// Dispatch on a format chosen at runtime.
    ///
    /// CRMF batches yield one template per message.
    pub fn process(
        &self,
        format: RequestFormat,
        raw: &[u8],
        identity: Option<&AuthenticatedIdentity>,
    ) -> Result<Vec<CertificateTemplate>> {
        match format {
            RequestFormat::Pkcs10 => Ok(vec![self.process_pkcs10(raw, identity)?]),
            RequestFormat::Crmf => Ok(self
                .process_crmf(raw, identity)?
                .into_iter()
                .map(|r| r.template)
                .collect()),
            RequestFormat::Keygen => Ok(vec![self.process_keygen(raw, identity)?]),
        }
    }

    fn process_single<D>(
        &self,
        decoder: &D,
        raw: &[u8],
        identity: Option<&AuthenticatedIdentity>,
    ) -> Result<CertificateTemplate>
    where
        D: RequestDecoder<Output = CertificateTemplate>,
    {
        let template = decoder.decode(raw, identity, &self.params)?;
        self.chain.validate(&template, identity)?;
        info!(
            format = %decoder.format(),
            fingerprint = %request_fingerprint(raw),
            subject = %template.subject_string(),
            "Certificate request approved"
        );
        Ok(template)
    }
}
