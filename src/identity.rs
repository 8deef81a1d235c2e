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

//! Authenticated identities and the identity override resolver.
//!
//! An authentication mechanism may assert subject, validity or extension
//! data that the requester must not be able to spoof through request
//! content (for example a renewal bound to a prior certificate). Once a
//! request has been decoded, [`apply_identity_overrides`] copies that data
//! over the template before any constraint sees it.
//!
//! Precedence rules by request format:
//!
//! | Format | Identity data applied |
//! |--------|-----------------------|
//! | PKCS#10 | yes, unless the mechanism is password-only |
//! | CRMF | yes |
//! | KEYGEN | yes |

use std::fmt;
use std::str::FromStr;

use tracing::debug;
use x509_cert::name::Name;

use crate::decode::RequestFormat;
use crate::template::{CertificateTemplate, ExtensionMap, ValidityWindow};

/// Mechanism that authenticated the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// Directory user id and password (`UidPwdDirAuth`).
    DirectoryPassword,
    /// Directory user id, password and one-time PIN (`UidPwdPinDirAuth`).
    DirectoryPasswordPin,
    /// Client certificate looked up in the internal user database (`CertUserDBAuth`).
    CertificateDatabase,
    /// Agent client certificate (`AgentCertAuth`).
    AgentCertificate,
    /// TLS client certificate of an existing subscriber (`SSLclientCertAuth`).
    ClientCertificate,
    /// Renewal bound to a previously issued certificate.
    Renewal,
    /// Any other plugin, by identifier.
    Other(String),
}

impl AuthMechanism {
    /// Plugin identifier of the mechanism.
    pub fn id(&self) -> &str {
        match self {
            Self::DirectoryPassword => "UidPwdDirAuth",
            Self::DirectoryPasswordPin => "UidPwdPinDirAuth",
            Self::CertificateDatabase => "CertUserDBAuth",
            Self::AgentCertificate => "AgentCertAuth",
            Self::ClientCertificate => "SSLclientCertAuth",
            Self::Renewal => "Renewal",
            Self::Other(id) => id,
        }
    }

    /// Returns true for mechanisms that authenticate with a password only.
    ///
    /// PKCS#10 requests authenticated this way keep their own subject,
    /// validity and extensions.
    pub fn is_password_only(&self) -> bool {
        matches!(self, Self::DirectoryPassword | Self::DirectoryPasswordPin)
    }

    /// Returns true if KEYGEN requests may take their subject from form fields.
    pub fn permits_form_subject(&self) -> bool {
        matches!(self, Self::DirectoryPassword | Self::CertificateDatabase)
    }
}

impl FromStr for AuthMechanism {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "UidPwdDirAuth" => Self::DirectoryPassword,
            "UidPwdPinDirAuth" => Self::DirectoryPasswordPin,
            "CertUserDBAuth" => Self::CertificateDatabase,
            "AgentCertAuth" => Self::AgentCertificate,
            "SSLclientCertAuth" => Self::ClientCertificate,
            "Renewal" => Self::Renewal,
            other => Self::Other(other.to_string()),
        })
    }
}

impl fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Identity established by the authentication collaborator.
#[derive(Debug, Clone)]
pub struct AuthenticatedIdentity {
    /// Mechanism that authenticated the request.
    pub mechanism: AuthMechanism,
    /// Authenticated user id, if any.
    pub user_id: Option<String>,
    /// Pre-approved subject name.
    pub subject: Option<Name>,
    /// Pre-approved validity window.
    pub validity: Option<ValidityWindow>,
    /// Pre-approved extension set.
    pub extensions: Option<ExtensionMap>,
}

impl AuthenticatedIdentity {
    /// Identity carrying no override data.
    pub fn new(mechanism: AuthMechanism) -> Self {
        Self {
            mechanism,
            user_id: None,
            subject: None,
            validity: None,
            extensions: None,
        }
    }

    /// Set the authenticated user id.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the pre-approved subject.
    pub fn with_subject(mut self, subject: Name) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Set the pre-approved validity.
    pub fn with_validity(mut self, validity: ValidityWindow) -> Self {
        self.validity = Some(validity);
        self
    }

    /// Set the pre-approved extensions.
    pub fn with_extensions(mut self, extensions: ExtensionMap) -> Self {
        self.extensions = Some(extensions);
        self
    }

    /// Returns true if the identity carries any override data.
    pub fn has_overrides(&self) -> bool {
        self.subject.is_some() || self.validity.is_some() || self.extensions.is_some()
    }
}

/// Fields replaced by [`apply_identity_overrides`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverrideOutcome {
    /// Subject was replaced.
    pub subject: bool,
    /// Validity was replaced.
    pub validity: bool,
    /// Extension map was replaced.
    pub extensions: bool,
}

impl OverrideOutcome {
    /// Returns true if nothing was replaced.
    pub fn is_empty(&self) -> bool {
        !(self.subject || self.validity || self.extensions)
    }
}

/// Overwrite template fields with the identity's pre-approved data.
///
/// Must run after decoding and before constraint validation. The extension
/// map is replaced as a whole.
pub fn apply_identity_overrides(
    template: &mut CertificateTemplate,
    identity: &AuthenticatedIdentity,
    format: RequestFormat,
) -> OverrideOutcome {
    let mut outcome = OverrideOutcome::default();

    if format == RequestFormat::Pkcs10 && identity.mechanism.is_password_only() {
        debug!(
            "Keeping PKCS#10 fields for password-only mechanism {}",
            identity.mechanism
        );
        return outcome;
    }

    if let Some(subject) = &identity.subject {
        template.subject = subject.clone();
        outcome.subject = true;
    }
    if let Some(validity) = identity.validity {
        template.validity = Some(validity);
        outcome.validity = true;
    }
    if let Some(extensions) = &identity.extensions {
        template.extensions = extensions.clone();
        outcome.extensions = true;
    }

    if !outcome.is_empty() {
        debug!(
            mechanism = %identity.mechanism,
            subject = outcome.subject,
            validity = outcome.validity,
            extensions = outcome.extensions,
            "Applied identity overrides"
        );
    }

    outcome
}
