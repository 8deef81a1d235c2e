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

//! Issuance Policy Command-Line Tool
//!
//! Dry-runs certificate requests against an issuance policy file.
//!
//! # Usage
//!
//! ```text
//! issuance-check [OPTIONS] --config <PATH> <COMMAND>
//!
//! Commands:
//!   check            Decode a request and run it through the policy chain
//!   describe         List the constraints of a policy file
//!   validate-config  Validate a policy file
//!
//! Options:
//!   -c, --config <PATH>   Path to policy file
//!   -v, --verbose         Enable verbose output
//!   -q, --quiet           Suppress non-error output
//!   -h, --help            Print help
//!   -V, --version         Print version
//! ```
//!
//! # Examples
//!
//! ```bash
//! # Check a PKCS#10 request
//! issuance-check -c policy.toml check --request device.csr
//!
//! # Check a KEYGEN request with form fields
//! issuance-check -c policy.toml check --format keygen --request spkac.b64 \
//!     --mechanism UidPwdDirAuth --form cn=alice --form o=Example
//!
//! # Show which constraints are active
//! issuance-check -c policy.toml describe
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use usg_ca_issuance::logging::{init_logging, LogLevel};
use usg_ca_issuance::{
    AuthMechanism, AuthenticatedIdentity, CertificateTemplate, IssuanceConfig, IssuancePipeline,
    RequestFormat,
};
use x509_cert::name::Name;

#[derive(Parser)]
#[command(name = "issuance-check")]
#[command(author = "U.S. Federal Government")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Dry-run certificate requests against an issuance policy", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to policy file
    #[arg(short, long, global = true, value_name = "PATH", default_value = "policy.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a request and run it through the policy chain
    Check {
        /// Request file (DER, base64 or PEM)
        #[arg(short, long, value_name = "PATH")]
        request: PathBuf,

        /// Request format
        #[arg(long, value_enum, default_value = "pkcs10")]
        format: FormatArg,

        /// Authentication mechanism of the requester
        #[arg(long, value_name = "ID")]
        mechanism: Option<String>,

        /// Subject asserted by the authentication mechanism
        #[arg(long, value_name = "DN")]
        identity_subject: Option<String>,

        /// KEYGEN form field, as name=value
        #[arg(long = "form", value_name = "NAME=VALUE")]
        form: Vec<String>,
    },

    /// List the constraints of a policy file
    Describe,

    /// Validate a policy file
    ValidateConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Pkcs10,
    Crmf,
    Keygen,
}

impl From<FormatArg> for RequestFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Pkcs10 => RequestFormat::Pkcs10,
            FormatArg::Crmf => RequestFormat::Crmf,
            FormatArg::Keygen => RequestFormat::Keygen,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        LogLevel::Error
    } else if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Warn
    };
    if let Err(e) = init_logging(log_level) {
        eprintln!("{}", e);
    }

    match run_command(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when a request was rejected.
fn run_command(cli: &Cli) -> Result<bool, Box<dyn std::error::Error>> {
    match &cli.command {
        Commands::Check {
            request,
            format,
            mechanism,
            identity_subject,
            form,
        } => cmd_check(
            cli,
            request,
            (*format).into(),
            mechanism.as_deref(),
            identity_subject.as_deref(),
            form,
        ),
        Commands::Describe => cmd_describe(cli).map(|()| true),
        Commands::ValidateConfig => cmd_validate_config(cli).map(|()| true),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

fn cmd_check(
    cli: &Cli,
    request: &Path,
    format: RequestFormat,
    mechanism: Option<&str>,
    identity_subject: Option<&str>,
    form: &[String],
) -> Result<bool, Box<dyn std::error::Error>> {
    let config = IssuanceConfig::from_file(&cli.config)?;
    config.validate()?;

    let mut params = config.request_params();
    for field in form {
        let (name, value) = field
            .split_once('=')
            .ok_or_else(|| format!("form field '{}' is not name=value", field))?;
        params = params.with_form_field(name.trim(), value);
    }

    let identity = match (mechanism, identity_subject) {
        (None, None) => None,
        (mechanism, subject) => {
            let mechanism = AuthMechanism::from_str(mechanism.unwrap_or("SSLclientCertAuth"))?;
            let mut identity = AuthenticatedIdentity::new(mechanism);
            if let Some(dn) = subject {
                identity = identity.with_subject(Name::from_str(dn)?);
            }
            Some(identity)
        }
    };

    let raw = std::fs::read(request)?;
    let pipeline = IssuancePipeline::new(params, config.build_chain()?);

    match pipeline.process(format, &raw, identity.as_ref()) {
        Ok(templates) => {
            if !cli.quiet {
                for template in &templates {
                    print_template(template);
                }
                println!("ACCEPTED ({} template(s))", templates.len());
            }
            Ok(true)
        }
        Err(e) if e.is_rejection() || e.is_decode_failure() => {
            println!("REJECTED: {}", e);
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_describe(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = IssuanceConfig::from_file(&cli.config)?;
    let chain = config.build_chain()?;

    println!("Active constraints ({}):", chain.len());
    for (i, rule) in chain.iter().enumerate() {
        println!(
            "  {}. {} [{} / {:?}]",
            i + 1,
            rule.constraint.name(),
            rule.constraint.kind(),
            rule.default
        );
        println!("     {}", rule.constraint.describe("en"));
    }

    if !chain.skipped().is_empty() {
        println!("Skipped (not applicable to their default):");
        for rule in chain.skipped() {
            println!(
                "  - {} [{} / {:?}]",
                rule.constraint.name(),
                rule.constraint.kind(),
                rule.default
            );
        }
    }
    Ok(())
}

fn cmd_validate_config(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = IssuanceConfig::from_file(&cli.config)?;
    config.validate()?;
    if !cli.quiet {
        println!(
            "Configuration is valid: {} ({} policy rule(s))",
            cli.config.display(),
            config.policies.len()
        );
    }
    Ok(())
}

fn print_template(template: &CertificateTemplate) {
    println!("Subject:    {}", template.subject_string());
    println!("Key:        {}", template.public_key.algorithm.oid);
    if let Some(alg) = &template.signature_algorithm {
        println!("Signing:    {}", alg.oid);
    }
    for (oid, ext) in template.extensions.iter() {
        println!(
            "Extension:  {}{}",
            oid,
            if ext.critical { " (critical)" } else { "" }
        );
    }
}
