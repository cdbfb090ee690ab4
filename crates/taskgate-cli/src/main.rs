//! taskgate CLI - Command-line interface
//!
//! Usage:
//!   taskgate hash-secret <secret>
//!   taskgate verify-secret <digest> <secret>
//!   taskgate issue-token --username <name> --role <role>
//!   taskgate inspect-token <token>
//!
//! Hashing parameters and the signing secret come from the same
//! configuration the API server loads.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use taskgate_api::auth::{Role, SecretHasher, TokenIssuer};
use taskgate_core::{AppConfig, SystemClock};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "taskgate")]
#[command(about = "taskgate secret and token tooling")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash a secret with the configured Argon2id parameters
    HashSecret {
        /// Plain-text secret
        secret: String,
    },
    /// Check a secret against a PHC digest
    VerifySecret {
        /// Digest produced by `hash-secret`
        digest: String,
        /// Candidate secret
        secret: String,
    },
    /// Issue a signed bearer token
    IssueToken {
        /// Identity id; a random one is used when omitted
        #[arg(long)]
        subject: Option<Uuid>,
        #[arg(long)]
        username: String,
        /// standard or privileged
        #[arg(long, default_value = "standard", value_parser = parse_role)]
        role: Role,
    },
    /// Verify a token and print its claims
    InspectToken { token: String },
}

fn parse_role(value: &str) -> Result<Role, String> {
    value.parse().map_err(|e| format!("{e}"))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("loading configuration")?;
    config.validate().context("validating configuration")?;

    match cli.command {
        Commands::HashSecret { secret } => {
            let hasher = SecretHasher::new(&config.auth.password)?;
            println!("{}", hasher.hash(&secret)?);
        }
        Commands::VerifySecret { digest, secret } => {
            let hasher = SecretHasher::new(&config.auth.password)?;
            if hasher.verify(&digest, &secret).is_err() {
                bail!("secret does not match digest");
            }
            println!("ok");
        }
        Commands::IssueToken {
            subject,
            username,
            role,
        } => {
            if config.uses_development_secret() {
                tracing::warn!("signing with the built-in development secret");
            }
            let issuer = TokenIssuer::from_config(&config.auth, Arc::new(SystemClock));
            let subject = subject.unwrap_or_else(Uuid::new_v4);
            println!("{}", issuer.issue_for(subject, &username, role)?);
        }
        Commands::InspectToken { token } => {
            let issuer = TokenIssuer::from_config(&config.auth, Arc::new(SystemClock));
            let claims = issuer.verify(&token).context("token rejected")?;
            println!("{}", serde_json::to_string_pretty(&claims)?);
        }
    }

    Ok(())
}
