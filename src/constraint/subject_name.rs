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

//! Subject name pattern and attribute length constraint.
//!
//! The canonical (RFC 4514) subject string must match `pattern` in full.
//! Independently, well-known attributes are bounded in length; every
//! attribute over its bound is reported in one rejection.

use const_oid::ObjectIdentifier;
use regex::Regex;

use super::{ConstraintParams, PolicyConstraint, ValidationContext};
use crate::error::{IssuanceError, Result};
use crate::oids;
use crate::template::name_attributes;

/// Maximum length, in characters, of each bounded attribute.
pub const SUBJECT_FIELD_LIMITS: [(&str, ObjectIdentifier, usize); 8] = [
    ("CN", oids::CN, 64),
    ("L", oids::L, 128),
    ("ST", oids::ST, 128),
    ("O", oids::O, 64),
    ("OU", oids::OU, 64),
    ("E", oids::EMAIL, 255),
    ("C", oids::C, 3),
    ("UID", oids::UID, 64),
];

/// Subject name configuration.
#[derive(Debug, Clone)]
pub struct SubjectNameConstraint {
    /// Configured pattern as written.
    pub pattern: Option<String>,
    regex: Option<Regex>,
}

impl SubjectNameConstraint {
    /// Names of every attribute exceeding its length bound, in subject order.
    pub fn invalid_fields(&self, subject: &x509_cert::name::Name) -> Vec<String> {
        name_attributes(subject)
            .into_iter()
            .filter_map(|(oid, value)| {
                SUBJECT_FIELD_LIMITS
                    .iter()
                    .find(|(_, limit_oid, _)| *limit_oid == oid)
                    .filter(|(_, _, max)| value.chars().count() > *max)
                    .map(|(name, _, _)| name.to_string())
            })
            .collect()
    }
}

impl PolicyConstraint for SubjectNameConstraint {
    const CONFIG_NAMES: &'static [&'static str] = &["pattern"];

    fn from_params(params: &ConstraintParams) -> Result<Self> {
        let pattern = params.get("pattern").map(String::from);
        let regex = pattern
            .as_deref()
            .map(|p| {
                Regex::new(&format!("^(?:{})$", p)).map_err(|e| {
                    IssuanceError::config(format!("invalid subject pattern '{}': {}", p, e))
                })
            })
            .transpose()?;
        Ok(Self { pattern, regex })
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Result<()> {
        let subject = ctx.template.subject_string();

        if let (Some(regex), Some(pattern)) = (&self.regex, &self.pattern) {
            if !regex.is_match(&subject) {
                return Err(IssuanceError::SubjectPatternMismatch {
                    subject,
                    pattern: pattern.clone(),
                });
            }
        }

        let fields = self.invalid_fields(&ctx.template.subject);
        if !fields.is_empty() {
            return Err(IssuanceError::InvalidSubjectFields { fields });
        }
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.pattern {
            Some(pattern) => format!("Subject name must match pattern {}", pattern),
            None => "Subject name attributes must be within their length limits".to_string(),
        }
    }
}
