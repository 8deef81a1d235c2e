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

//! Error types for certificate issuance.
//!
//! Errors fall into three groups:
//!
//! - **Decoding failures**, raised while turning a request into a template
//!   (malformed input, missing key or subject, failed proof of possession).
//! - **Constraint rejections**, raised by the policy chain when a template
//!   is not allowed to be issued.
//! - **Infrastructure and configuration failures**, such as an unreachable
//!   certificate repository or an invalid policy file.
//!
//! Every variant carries enough context (OID, bit name, subject string) for
//! a caller to render a protocol-appropriate response.

use const_oid::ObjectIdentifier;
use thiserror::Error;

/// Result type alias using [`IssuanceError`].
pub type Result<T> = std::result::Result<T, IssuanceError>;

/// Errors that can occur while decoding or validating a certificate request.
#[derive(Debug, Error)]
pub enum IssuanceError {
    /// The request could not be read at all (bad transport encoding, empty input).
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// The request is not valid ASN.1/DER for its protocol.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// The request carries no public key.
    #[error("Request does not contain a public key")]
    MissingKey,

    /// The request carries no subject and no authenticated subject is available.
    #[error("Request does not contain a subject name and no authenticated subject is available")]
    MissingSubject,

    /// The subject has to come from an authenticated identity but none is available.
    #[error("Subject name must be supplied by an authenticated identity")]
    MissingSubjectFromIdentity,

    /// The extension request attribute could not be decoded.
    #[error("Failed to decode requested extensions: {0}")]
    ExtensionDecode(String),

    /// The request's own signature does not verify.
    #[error("Request signature verification failed: {0}")]
    SignatureInvalid(String),

    /// A CRMF signature proof of possession did not verify.
    #[error("Proof of possession failed for request {request_id}: {reason}")]
    ProofOfPossessionFailed {
        /// CRMF certificate request identifier.
        request_id: i64,
        /// Why verification failed.
        reason: String,
    },

    /// A CRMF request has no proof of possession and the configuration requires one.
    #[error("Proof of possession missing for request {request_id}")]
    ProofOfPossessionMissing {
        /// CRMF certificate request identifier.
        request_id: i64,
    },

    /// A required extension is absent from the template.
    #[error("Extension {oid} not found")]
    ExtensionNotFound {
        /// Extension identifier.
        oid: ObjectIdentifier,
    },

    /// The extension criticality differs from the configured value.
    #[error("Extension {oid} criticality mismatch: expected critical={expected}")]
    CriticalityMismatch {
        /// Extension identifier.
        oid: ObjectIdentifier,
        /// Configured criticality.
        expected: bool,
    },

    /// The Basic Constraints CA flag differs from the configured value.
    #[error("Basic constraints CA flag mismatch: expected cA={expected}")]
    CaFlagMismatch {
        /// Configured CA flag.
        expected: bool,
    },

    /// The Basic Constraints path length is below the configured minimum.
    #[error("Basic constraints path length {actual} is below minimum {minimum}")]
    PathLengthBelowMinimum {
        /// Path length found in the template (`unlimited` when absent).
        actual: String,
        /// Configured minimum.
        minimum: i64,
    },

    /// The Basic Constraints path length is above the configured maximum.
    #[error("Basic constraints path length {actual} exceeds maximum {maximum}")]
    PathLengthAboveMaximum {
        /// Path length found in the template (`unlimited` when absent).
        actual: String,
        /// Configured maximum.
        maximum: i64,
    },

    /// A bit in a bit-field extension differs from the configured value.
    #[error("{extension} bit '{bit}' mismatch: expected {expected}")]
    BitMismatch {
        /// Extension name (`Key Usage` or `Netscape Certificate Type`).
        extension: &'static str,
        /// Name of the offending bit.
        bit: &'static str,
        /// Configured value.
        expected: bool,
    },

    /// An OID in the template is not in the configured allow-list.
    #[error("OID {oid} is not allowed")]
    OidNotAllowed {
        /// Offending OID.
        oid: ObjectIdentifier,
    },

    /// The signing algorithm could not be determined.
    #[error("Signing algorithm not found: {0}")]
    AlgorithmNotFound(String),

    /// The signing algorithm is not in the allow-list.
    #[error("Signing algorithm {algorithm} is not allowed")]
    AlgorithmNotAllowed {
        /// Algorithm name.
        algorithm: String,
    },

    /// The subject name does not match the configured pattern.
    #[error("Subject name '{subject}' does not match pattern '{pattern}'")]
    SubjectPatternMismatch {
        /// Canonical subject string.
        subject: String,
        /// Configured pattern.
        pattern: String,
    },

    /// One or more subject attributes exceed their length limit.
    #[error("Invalid subject name fields: {}", .fields.join(", "))]
    InvalidSubjectFields {
        /// Names of every offending attribute.
        fields: Vec<String>,
    },

    /// A certificate with the same subject name already exists.
    #[error("Subject name '{subject}' is not unique")]
    SubjectNotUnique {
        /// Conflicting subject.
        subject: String,
    },

    /// The validity window violates the validity constraint.
    #[error("Validity out of range: {0}")]
    ValidityOutOfRange(String),

    /// The public key type or size violates the key constraint.
    #[error("Key not allowed: {0}")]
    KeyNotAllowed(String),

    /// The certificate repository could not be queried.
    #[error("Certificate repository unavailable: {0}")]
    RepositoryUnavailable(String),

    /// Invalid configuration or a refused configuration edit.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<der::Error> for IssuanceError {
    fn from(err: der::Error) -> Self {
        Self::ProtocolViolation(err.to_string())
    }
}

impl From<base64::DecodeError> for IssuanceError {
    fn from(err: base64::DecodeError) -> Self {
        Self::MalformedRequest(format!("base64 decode error: {}", err))
    }
}

impl IssuanceError {
    /// Create a malformed request error with the given message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedRequest(msg.into())
    }

    /// Create a protocol violation error with the given message.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::ProtocolViolation(msg.into())
    }

    /// Create an extension decode error with the given message.
    pub fn extension_decode(msg: impl Into<String>) -> Self {
        Self::ExtensionDecode(msg.into())
    }

    /// Create a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a repository unavailable error with the given message.
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::RepositoryUnavailable(msg.into())
    }

    /// Returns true if this error was raised while decoding a request.
    pub fn is_decode_failure(&self) -> bool {
        matches!(
            self,
            Self::MalformedRequest(_)
                | Self::ProtocolViolation(_)
                | Self::MissingKey
                | Self::MissingSubject
                | Self::MissingSubjectFromIdentity
                | Self::ExtensionDecode(_)
                | Self::SignatureInvalid(_)
                | Self::ProofOfPossessionFailed { .. }
                | Self::ProofOfPossessionMissing { .. }
        )
    }

    /// Returns true if this error is a constraint rejection.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::ExtensionNotFound { .. }
                | Self::CriticalityMismatch { .. }
                | Self::CaFlagMismatch { .. }
                | Self::PathLengthBelowMinimum { .. }
                | Self::PathLengthAboveMaximum { .. }
                | Self::BitMismatch { .. }
                | Self::OidNotAllowed { .. }
                | Self::AlgorithmNotFound(_)
                | Self::AlgorithmNotAllowed { .. }
                | Self::SubjectPatternMismatch { .. }
                | Self::InvalidSubjectFields { .. }
                | Self::SubjectNotUnique { .. }
                | Self::ValidityOutOfRange(_)
                | Self::KeyNotAllowed(_)
        )
    }

    /// Returns true if this error comes from infrastructure rather than the request.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::RepositoryUnavailable(_) | Self::Io(_))
    }
}
