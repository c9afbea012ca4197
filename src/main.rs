//! Turnstile - operator CLI for the onboarding trust core

use std::time::Duration;

use clap::Parser;
use hyper::StatusCode;
use serde_json::json;
use tracing::{debug, error, info};

use turnstile::{
    auth::{validate_strength, Expectation, PasswordHasher, Scope},
    config::{Args, Command},
    logging, TrustCore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    logging::init(&args.log_level, args.log_json)?;

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Turnstile - onboarding trust core");
    info!("======================================");
    info!("Request timeout: {}ms", args.request_timeout_ms);
    info!("Deadline policy: {}", args.deadline_policy);
    info!("Access TTL: {}s", args.tokens.access_ttl_secs);
    info!("Refresh TTL: {}s", args.tokens.refresh_ttl_secs);
    info!("Leeway: {}s", args.tokens.leeway_secs);
    info!("======================================");

    match args.command.clone() {
        Command::CheckKeys => {
            TrustCore::from_args(&args)?;
            info!("Token key pair is usable");
            println!("ok");
        }

        Command::HashPassword { password } => {
            validate_strength(&password)?;
            let encoded = PasswordHasher::default().hash(&password)?;
            println!("{}", encoded);
        }

        Command::VerifyPassword { encoded, password } => {
            if let Err(e) = PasswordHasher::default().verify(&password, &encoded) {
                error!("Password rejected: {}", e);
                std::process::exit(1);
            }
            println!("ok");
        }

        Command::IssueToken {
            subject,
            scope,
            ttl_secs,
        } => {
            let core = TrustCore::from_args(&args)?;
            let settings = core.tokens.settings();
            let ttl = match ttl_secs {
                Some(secs) => chrono::Duration::try_seconds(secs)
                    .ok_or_else(|| anyhow::anyhow!("--ttl-secs is out of range"))?,
                None => match scope {
                    Scope::Access => settings.access_ttl,
                    Scope::Refresh => settings.refresh_ttl,
                },
            };

            let signed = core.tokens.issue(subject, scope, ttl)?;
            let out = json!({
                "token": signed.token,
                "token_id": signed.claims.token_id,
                "scope": signed.claims.scope,
                "expires_at": signed.expires_at.to_rfc3339(),
                "scheme": signed.scheme,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }

        Command::VerifyToken { token, scope } => {
            let core = TrustCore::from_args(&args)?;
            let expectations: Vec<Expectation> = scope.into_iter().map(Expectation::Scope).collect();

            match core.tokens.verify(&token, &expectations) {
                Ok(claims) => println!("{}", serde_json::to_string_pretty(&claims)?),
                Err(e) => {
                    error!("Token rejected: {}", e);
                    println!("{}", json!({ "error": e.to_string(), "expired": e.is_expired() }));
                    std::process::exit(1);
                }
            }
        }

        Command::GateProbe { work_ms } => {
            let work = Duration::from_millis(work_ms);
            let response = args
                .gate()
                .handle(move |ctx, responder| async move {
                    tokio::select! {
                        _ = tokio::time::sleep(work) => {
                            responder.ok(
                                StatusCode::OK,
                                "probe finished",
                                Some(json!({ "work_ms": work_ms })),
                            );
                        }
                        reason = ctx.done() => {
                            debug!(?reason, "probe work stopped");
                        }
                    }
                })
                .await;

            info!("Gate answered with {}", response.status);
            println!("{} {}", response.status.as_u16(), response.to_json());
            if !response.is_success() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
