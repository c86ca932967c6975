// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # SmartPay CLI
//!
//! Entry point for the `smartpay` binary. Parses arguments, initializes
//! logging, runs one command and prints its result as JSON on stdout.
//!
//! - `keygen`, `address` — wallet identity
//! - `sign`, `verify`     — record signatures
//! - `qr-issue`, `qr-redeem` — payment authorizations
//! - `seal`, `unseal`     — secret storage
//! - `ledger`             — accounts and transfers on a local sled database
//! - `version`

mod cli;
mod logging;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::json;
use std::sync::Arc;

use smartpay_protocol::authorization::AuthorizationCodec;
use smartpay_protocol::config::{CoreConfig, ENV_ENCRYPTION_SECRET, ENV_QR_SIGNATURE_KEY};
use smartpay_protocol::crypto::{SealedSecret, SecretSealer, WalletKeypair, WalletPublicKey};
use smartpay_protocol::identity::{generate_wallet, Address};
use smartpay_protocol::ledger::LedgerEngine;
use smartpay_protocol::storage::LedgerDb;
use smartpay_protocol::transaction::{self, TransactionRecord};

use cli::{AddressCommand, Commands, LedgerCommand, SecretArgs, SmartPayCli};
use logging::LogFormat;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = SmartPayCli::parse();
    logging::init_logging(
        "smartpay=info,smartpay_protocol=info",
        LogFormat::from_str_lossy(&cli.log_format),
    );

    let output = match cli.command {
        Commands::Keygen(args) => keygen(&cli.secrets, args.seal)?,
        Commands::Address(cmd) => address(cmd)?,
        Commands::Sign(args) => sign(args)?,
        Commands::Verify(args) => verify(args)?,
        Commands::QrIssue(args) => {
            let codec = AuthorizationCodec::new(&load_config(&cli.secrets)?);
            let issued = codec.issue(
                args.merchant_id,
                &args.merchant_name,
                args.amount,
                args.currency,
            )?;
            json!({
                "payload": issued.rendering,
                "expires_at": issued.expires_at,
            })
        }
        Commands::QrRedeem(args) => {
            let codec = AuthorizationCodec::new(&load_config(&cli.secrets)?);
            let auth = codec.redeem(&args.payload)?;
            serde_json::to_value(&auth)?
        }
        Commands::Seal(args) => {
            let sealer = SecretSealer::from_config(&load_config(&cli.secrets)?);
            let secret = hex::decode(args.secret.trim()).context("secret is not valid hex")?;
            serde_json::to_value(sealer.seal(&secret)?)?
        }
        Commands::Unseal(args) => {
            let sealer = SecretSealer::from_config(&load_config(&cli.secrets)?);
            let sealed: SealedSecret =
                serde_json::from_str(&args.sealed).context("sealed secret is not valid JSON")?;
            let secret = sealer.unseal(&sealed)?;
            json!({ "secret": hex::encode(secret.as_slice()) })
        }
        Commands::Ledger(args) => ledger(&cli.secrets, args).await?,
        Commands::Version => json!({
            "smartpay": env!("CARGO_PKG_VERSION"),
            "signing": smartpay_protocol::config::SIGNING_ALGORITHM,
            "qr_protocol": smartpay_protocol::config::QR_PROTOCOL_VERSION,
        }),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Build the core config from `--qr-key`/`--encryption-secret`, or from the
/// environment when neither flag is given.
fn load_config(secrets: &SecretArgs) -> Result<CoreConfig> {
    match (&secrets.qr_key, &secrets.encryption_secret) {
        (Some(qr), Some(enc)) => Ok(CoreConfig::new(qr.as_bytes(), enc.as_bytes())?),
        _ => CoreConfig::from_env().with_context(|| {
            format!("set {ENV_QR_SIGNATURE_KEY} and {ENV_ENCRYPTION_SECRET}, or pass both secret flags")
        }),
    }
}

fn read_record(path: &std::path::Path) -> Result<TransactionRecord> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read record from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid record JSON in {}", path.display()))
}

fn keypair_from(secret_key: Option<&str>) -> Result<Option<WalletKeypair>> {
    secret_key
        .map(|hex| WalletKeypair::from_hex(hex.trim()).context("invalid secret key"))
        .transpose()
}

fn keygen(secrets: &SecretArgs, seal: bool) -> Result<serde_json::Value> {
    let wallet = generate_wallet()?;
    tracing::info!(address = %wallet.address, "generated wallet");

    let secret = if seal {
        let sealer = SecretSealer::from_config(&load_config(secrets)?);
        serde_json::to_value(sealer.seal(wallet.keypair.secret_key_bytes().as_slice())?)?
    } else {
        json!(wallet.keypair.secret_key_hex().as_str())
    };

    Ok(json!({
        "address": wallet.address,
        "public_key": wallet.keypair.public_key_hex(),
        "secret_key": secret,
    }))
}

fn address(cmd: AddressCommand) -> Result<serde_json::Value> {
    match cmd {
        AddressCommand::Derive { public_key } => {
            let pk = WalletPublicKey::from_hex(public_key.trim())?;
            Ok(json!({ "address": Address::derive(&pk) }))
        }
        AddressCommand::Validate { address } => match Address::parse(address.trim()) {
            Ok(addr) => Ok(json!({
                "valid": true,
                "key_hash": hex::encode(addr.key_hash()),
            })),
            Err(e) => Ok(json!({ "valid": false, "reason": e.to_string() })),
        },
    }
}

fn sign(args: cli::SignArgs) -> Result<serde_json::Value> {
    let mut record = read_record(&args.record)?;
    let keypair = WalletKeypair::from_hex(args.secret_key.trim()).context("invalid secret key")?;
    transaction::sign_record(&mut record, &keypair);
    Ok(serde_json::to_value(&record)?)
}

fn verify(args: cli::VerifyArgs) -> Result<serde_json::Value> {
    let record = read_record(&args.record)?;
    let signature = match args.signature {
        Some(sig) => sig,
        None => match &record.signature {
            Some(embedded) => embedded.signature.clone(),
            None => bail!("record carries no signature and --signature was not given"),
        },
    };
    let valid = transaction::verify(&record, signature.trim(), args.public_key.trim());
    Ok(json!({
        "valid": valid,
        "hash": hex::encode(transaction::canonical_hash(&record)),
    }))
}

async fn ledger(secrets: &SecretArgs, args: cli::LedgerArgs) -> Result<serde_json::Value> {
    let config = load_config(secrets)?.with_signed_debits(args.require_signatures);

    std::fs::create_dir_all(&args.data_dir).with_context(|| {
        format!("failed to create data directory: {}", args.data_dir.display())
    })?;
    let db = LedgerDb::open(&args.data_dir)
        .with_context(|| format!("failed to open ledger at {}", args.data_dir.display()))?;
    tracing::debug!(path = %args.data_dir.display(), "ledger opened");
    let engine = LedgerEngine::new(Arc::new(db.clone()), config);

    let output = match args.command {
        LedgerCommand::Open {
            kind,
            name,
            public_key,
        } => {
            let public_key = public_key
                .map(|pk| WalletPublicKey::from_hex(pk.trim()))
                .transpose()?;
            let opened = engine.open_account(kind, &name, public_key).await?;
            json!({
                "account": opened.account,
                "secret_key": opened.keypair.map(|kp| kp.secret_key_hex().to_string()),
            })
        }
        LedgerCommand::Deposit {
            account,
            amount,
            currency,
        } => serde_json::to_value(engine.deposit(account, amount, currency).await?)?,
        LedgerCommand::Withdraw {
            account,
            amount,
            currency,
            secret_key,
        } => {
            let signer = keypair_from(secret_key.as_deref())?;
            serde_json::to_value(
                engine
                    .withdraw(account, amount, currency, signer.as_ref())
                    .await?,
            )?
        }
        LedgerCommand::Transfer {
            from,
            to,
            amount,
            currency,
            secret_key,
        } => {
            let signer = keypair_from(secret_key.as_deref())?;
            serde_json::to_value(
                engine
                    .transfer(from, to, amount, currency, signer.as_ref())
                    .await?,
            )?
        }
        LedgerCommand::Redeem {
            payer,
            payload,
            secret_key,
        } => {
            let signer = keypair_from(secret_key.as_deref())?;
            serde_json::to_value(
                engine
                    .redeem_payment(payer, &payload, signer.as_ref())
                    .await?,
            )?
        }
        LedgerCommand::Balance { account } => {
            let balances = engine.balances(account).await?;
            json!({
                "account": account,
                "SMART_PAY": balances.smart_pay,
                "LOCAL_CURRENCY": balances.local_currency,
            })
        }
        LedgerCommand::History {
            account,
            page,
            limit,
        } => serde_json::to_value(engine.history(account, page, limit).await?)?,
        LedgerCommand::Sales { merchant, from, to } => {
            serde_json::to_value(engine.daily_sales(merchant, from, to).await?)?
        }
        LedgerCommand::Prune => {
            let pruned = engine
                .prune_expired_nonces(smartpay_protocol::config::now_millis())
                .await?;
            json!({ "pruned": pruned })
        }
    };

    db.flush().context("failed to flush ledger")?;
    Ok(output)
}
