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

//! Validity window constraint.

use std::time::{Duration, UNIX_EPOCH};

use tracing::debug;

use super::{ConstraintParams, PolicyConstraint, ValidationContext};
use crate::error::{IssuanceError, Result};

const SECONDS_PER_DAY: u64 = 86_400;

/// Validity configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidityConstraint {
    /// Maximum window length, in days.
    pub range_days: u64,
    /// Allowed clock skew for `notBefore`, in seconds.
    pub not_before_grace: u64,
    /// Reject a `notBefore` in the future (beyond the grace period).
    pub not_before_check: bool,
    /// Reject a `notAfter` in the past.
    pub not_after_check: bool,
}

impl Default for ValidityConstraint {
    fn default() -> Self {
        Self {
            range_days: 365,
            not_before_grace: 0,
            not_before_check: false,
            not_after_check: false,
        }
    }
}

fn non_negative(params: &ConstraintParams, name: &str, default: u64) -> Result<u64> {
    match params.int(name)? {
        None => Ok(default),
        Some(v) => u64::try_from(v)
            .map_err(|_| IssuanceError::config(format!("{} must not be negative", name))),
    }
}

impl PolicyConstraint for ValidityConstraint {
    const CONFIG_NAMES: &'static [&'static str] =
        &["range", "notBeforeGracePeriod", "notBeforeCheck", "notAfterCheck"];

    fn from_params(params: &ConstraintParams) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            range_days: non_negative(params, "range", defaults.range_days)?,
            not_before_grace: non_negative(
                params,
                "notBeforeGracePeriod",
                defaults.not_before_grace,
            )?,
            not_before_check: params.bool_or("notBeforeCheck", defaults.not_before_check)?,
            not_after_check: params.bool_or("notAfterCheck", defaults.not_after_check)?,
        })
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Result<()> {
        let Some(window) = ctx.template.validity else {
            debug!("Template has no validity window yet");
            return Ok(());
        };
        let not_before = window.not_before.map(|t| t.to_unix_duration());
        let not_after = window.not_after.map(|t| t.to_unix_duration());
        let now = ctx.now.duration_since(UNIX_EPOCH).unwrap_or_default();

        if let (Some(start), Some(end)) = (not_before, not_after) {
            if start > end {
                return Err(IssuanceError::ValidityOutOfRange(
                    "notBefore is after notAfter".to_string(),
                ));
            }
            let range = Duration::from_secs(self.range_days.saturating_mul(SECONDS_PER_DAY));
            if end - start > range {
                return Err(IssuanceError::ValidityOutOfRange(format!(
                    "validity of {} days exceeds {} days",
                    (end - start).as_secs() / SECONDS_PER_DAY,
                    self.range_days
                )));
            }
        }

        if self.not_before_check {
            if let Some(start) = not_before {
                if start > now + Duration::from_secs(self.not_before_grace) {
                    return Err(IssuanceError::ValidityOutOfRange(
                        "notBefore is in the future".to_string(),
                    ));
                }
            }
        }

        if self.not_after_check {
            if let Some(end) = not_after {
                if end < now {
                    return Err(IssuanceError::ValidityOutOfRange(
                        "notAfter is in the past".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "Validity must not exceed {} days (notBefore grace {}s)",
            self.range_days, self.not_before_grace
        )
    }
}
