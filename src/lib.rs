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

//! # usg-ca-issuance
//!
//! Certificate request decoding and issuance policy enforcement for a
//! certificate authority.
//!
//! A request travels through three stages:
//!
//! 1. A **decoder** turns an untrusted PKCS#10, CRMF or KEYGEN request into a
//!    [`CertificateTemplate`].
//! 2. The **identity override resolver** replaces subject, validity and
//!    extensions with data asserted by the authentication mechanism.
//! 3. The **constraint chain** checks the template against an ordered list of
//!    policy rules and stops at the first rejection.
//!
//! The template is then handed to the signing step, which is not part of
//! this crate.
//!
//! ## Features
//!
//! - **Request formats**: PKCS#10 (RFC 2986), CRMF (RFC 4211), KEYGEN/SPKAC
//! - **Signature checks**: PKCS#10 and SPKAC self-signatures, CRMF proof of possession
//! - **Constraints**: extension presence, Basic Constraints, Key Usage,
//!   Netscape certificate type, Extended Key Usage, signing algorithm,
//!   subject name, subject uniqueness, validity, key type
//! - **TOML policy files** with per-rule parameters
//!
//! ## Quick Start
//!
//! ```no_run
//! use usg_ca_issuance::{IssuanceConfig, IssuancePipeline};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = IssuanceConfig::from_file("policy.toml")?;
//!     config.validate()?;
//!
//!     let pipeline = IssuancePipeline::new(config.request_params(), config.build_chain()?);
//!
//!     let csr = std::fs::read("request.der")?;
//!     let template = pipeline.process_pkcs10(&csr, None)?;
//!     println!("Approved {}", template.subject_string());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Subject Uniqueness
//!
//! The uniqueness constraint queries a [`CertificateRepository`]:
//!
//! ```no_run
//! use std::sync::Arc;
//! use usg_ca_issuance::{InMemoryRepository, IssuanceConfig, RepositoryRecord};
//!
//! # fn example(config: IssuanceConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let repository = InMemoryRepository::new();
//! repository.insert(RepositoryRecord::new("1a2b", "CN=device.example.com"))?;
//!
//! let chain = config.build_chain()?.with_repository(Arc::new(repository));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod constraint;
pub mod decode;
pub mod error;
pub mod identity;
pub mod logging;
pub mod oids;
pub mod pipeline;
pub mod repository;
pub mod template;

// Re-export main types at crate root for convenience
pub use config::{IssuanceConfig, PolicyConfig, RequestConfig};
pub use constraint::{
    ConstraintChain, ConstraintInstance, ConstraintKind, ConstraintParams, DefaultPolicyKind,
    PolicyRule,
};
pub use decode::{
    CrmfDecoder, CrmfRequest, KeygenDecoder, Pkcs10Decoder, RequestDecoder, RequestFormat,
    RequestParams,
};
pub use error::{IssuanceError, Result};
pub use identity::{apply_identity_overrides, AuthMechanism, AuthenticatedIdentity};
pub use pipeline::IssuancePipeline;
pub use repository::{
    CertificateRepository, CertificateStatus, InMemoryRepository, RepositoryRecord,
    RevocationReason,
};
pub use template::{CertificateTemplate, ExtensionMap, ExtensionPayload, TemplateExtension};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
