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

//! String-keyed constraint parameters.
//!
//! Parameters arrive as strings from the configuration store. A value that is
//! empty or the sentinel `-` means "no check for this field"; the typed
//! accessors return `None` for it.

use std::collections::BTreeMap;
use std::str::FromStr;

use const_oid::ObjectIdentifier;

use crate::error::{IssuanceError, Result};

/// Sentinel for an unset optional parameter.
pub const UNSET: &str = "-";

/// Returns true if `value` means "no check".
pub fn is_unset(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value == UNSET
}

/// Raw parameter values of one constraint instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintParams {
    values: BTreeMap<String, String>,
}

impl ConstraintParams {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a raw value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Raw value, including the sentinel.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Trimmed value, `None` if missing or unset.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.raw(name).filter(|v| !is_unset(v)).map(str::trim)
    }

    /// Names of every stored value.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Optional boolean.
    pub fn bool(&self, name: &str) -> Result<Option<bool>> {
        self.get(name)
            .map(|v| match v.to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(invalid(name, v, "expected true or false")),
            })
            .transpose()
    }

    /// Boolean with a default for unset values.
    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool> {
        Ok(self.bool(name)?.unwrap_or(default))
    }

    /// Optional integer.
    pub fn int(&self, name: &str) -> Result<Option<i64>> {
        self.get(name)
            .map(|v| {
                v.parse::<i64>()
                    .map_err(|_| invalid(name, v, "expected an integer"))
            })
            .transpose()
    }

    /// Optional object identifier.
    pub fn oid(&self, name: &str) -> Result<Option<ObjectIdentifier>> {
        self.get(name).map(|v| parse_oid(name, v)).transpose()
    }

    /// Optional comma-separated list; blank entries are dropped.
    pub fn list(&self, name: &str) -> Option<Vec<String>> {
        self.get(name).map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
    }

    /// Optional comma-separated OID list.
    pub fn oid_list(&self, name: &str) -> Result<Option<Vec<ObjectIdentifier>>> {
        self.list(name)
            .map(|items| items.iter().map(|v| parse_oid(name, v)).collect())
            .transpose()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConstraintParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}

fn parse_oid(name: &str, value: &str) -> Result<ObjectIdentifier> {
    ObjectIdentifier::from_str(value).map_err(|_| invalid(name, value, "expected a dotted OID"))
}

fn invalid(name: &str, value: &str, expected: &str) -> IssuanceError {
    IssuanceError::config(format!(
        "invalid value '{}' for parameter {}: {}",
        value, name, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_values_are_unset() {
        let params = ConstraintParams::new()
            .with("a", "")
            .with("b", "-")
            .with("c", " - ")
            .with("d", "true");
        assert_eq!(params.bool("a").unwrap(), None);
        assert_eq!(params.bool("b").unwrap(), None);
        assert_eq!(params.bool("c").unwrap(), None);
        assert_eq!(params.bool("d").unwrap(), Some(true));
        assert_eq!(params.bool("missing").unwrap(), None);
        assert_eq!(params.raw("b"), Some("-"));
    }

    #[test]
    fn test_typed_accessors() {
        let params = ConstraintParams::new()
            .with("flag", "FALSE")
            .with("n", "-1")
            .with("oids", "1.3.6.1.5.5.7.3.1, 1.3.6.1.5.5.7.3.2,");
        assert_eq!(params.bool("flag").unwrap(), Some(false));
        assert_eq!(params.int("n").unwrap(), Some(-1));
        assert_eq!(params.oid_list("oids").unwrap().unwrap().len(), 2);
        assert!(params.bool_or("missing", true).unwrap());
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let params = ConstraintParams::new()
            .with("flag", "yes")
            .with("n", "ten")
            .with("oid", "not.an.oid");
        assert!(matches!(params.bool("flag"), Err(IssuanceError::Config(_))));
        assert!(matches!(params.int("n"), Err(IssuanceError::Config(_))));
        assert!(matches!(params.oid("oid"), Err(IssuanceError::Config(_))));
    }
}
