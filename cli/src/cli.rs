//! # CLI Interface
//!
//! Command-line argument structure for `smartpay`, via `clap` derive.
//! Secrets can come from flags but are normally taken from the
//! environment so they stay out of shell history.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use smartpay_protocol::transaction::{AccountKind, Currency};

/// SmartPay wallet and ledger tools.
#[derive(Parser, Debug)]
#[command(
    name = "smartpay",
    about = "SmartPay wallet identity, QR authorization and ledger tools",
    version,
    propagate_version = true
)]
pub struct SmartPayCli {
    /// Log output format: `pretty` or `json`.
    #[arg(long, global = true, env = "SMARTPAY_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    #[command(flatten)]
    pub secrets: SecretArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Process secrets. Give both flags or neither; with neither, they are read
/// from `QR_SIGNATURE_KEY` and `ENCRYPTION_SECRET`.
#[derive(Args, Debug)]
pub struct SecretArgs {
    /// HMAC key for QR payment authorizations.
    #[arg(long, global = true, requires = "encryption_secret")]
    pub qr_key: Option<String>,

    /// Password material for sealing wallet secrets.
    #[arg(long, global = true, requires = "qr_key")]
    pub encryption_secret: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a wallet keypair and its address.
    Keygen(KeygenArgs),
    /// Derive or validate `SP` addresses.
    #[command(subcommand)]
    Address(AddressCommand),
    /// Sign a transaction record read from a JSON file.
    Sign(SignArgs),
    /// Verify a record signature against a public key.
    Verify(VerifyArgs),
    /// Issue a QR payment authorization for a merchant.
    QrIssue(QrIssueArgs),
    /// Check a scanned QR payment authorization.
    QrRedeem(QrRedeemArgs),
    /// Encrypt a hex secret with the encryption secret.
    Seal(SealArgs),
    /// Decrypt a sealed secret produced by `seal`.
    Unseal(UnsealArgs),
    /// Operate on the local ledger database.
    Ledger(LedgerArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Output the secret key sealed instead of as plain hex.
    #[arg(long)]
    pub seal: bool,
}

#[derive(Subcommand, Debug)]
pub enum AddressCommand {
    /// Derive the address for a compressed public key.
    Derive {
        /// 33-byte compressed secp256k1 key, hex.
        #[arg(long)]
        public_key: String,
    },
    /// Check an address's prefix, version and checksum.
    Validate { address: String },
}

#[derive(Args, Debug)]
pub struct SignArgs {
    /// Path to a JSON transaction record.
    #[arg(long)]
    pub record: PathBuf,

    /// Hex secret key of the sender.
    #[arg(long, env = "SMARTPAY_SECRET_KEY", hide_env_values = true)]
    pub secret_key: String,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Path to a JSON transaction record.
    #[arg(long)]
    pub record: PathBuf,

    /// 64-byte compact signature, hex. Defaults to the one embedded in the
    /// record.
    #[arg(long)]
    pub signature: Option<String>,

    /// Compressed public key, hex.
    #[arg(long)]
    pub public_key: String,
}

#[derive(Args, Debug)]
pub struct QrIssueArgs {
    #[arg(long)]
    pub merchant_id: uuid::Uuid,

    #[arg(long)]
    pub merchant_name: String,

    /// Amount in minor units.
    #[arg(long)]
    pub amount: u64,

    #[arg(long, default_value = "SMART_PAY")]
    pub currency: Currency,
}

#[derive(Args, Debug)]
pub struct QrRedeemArgs {
    /// The scanned payload text.
    pub payload: String,
}

#[derive(Args, Debug)]
pub struct SealArgs {
    /// Hex-encoded secret to seal.
    #[arg(long, env = "SMARTPAY_SECRET_KEY", hide_env_values = true)]
    pub secret: String,
}

#[derive(Args, Debug)]
pub struct UnsealArgs {
    /// Sealed secret JSON as printed by `seal`.
    pub sealed: String,
}

#[derive(Args, Debug)]
pub struct LedgerArgs {
    /// Ledger database directory. Created on first use.
    #[arg(long, short = 'd', env = "SMARTPAY_DATA_DIR", default_value = "./smartpay-data")]
    pub data_dir: PathBuf,

    /// Reject unsigned TRANSFER, PAYMENT and WITHDRAW records.
    #[arg(long)]
    pub require_signatures: bool,

    #[command(subcommand)]
    pub command: LedgerCommand,
}

#[derive(Subcommand, Debug)]
pub enum LedgerCommand {
    /// Open an account. Generates a key unless one is given.
    Open {
        #[arg(long, default_value = "user", value_parser = parse_kind)]
        kind: AccountKind,
        #[arg(long)]
        name: String,
        #[arg(long)]
        public_key: Option<String>,
    },
    Deposit {
        #[arg(long)]
        account: uuid::Uuid,
        #[arg(long)]
        amount: u64,
        #[arg(long, default_value = "SMART_PAY")]
        currency: Currency,
    },
    Withdraw {
        #[arg(long)]
        account: uuid::Uuid,
        #[arg(long)]
        amount: u64,
        #[arg(long, default_value = "SMART_PAY")]
        currency: Currency,
        #[arg(long, env = "SMARTPAY_SECRET_KEY", hide_env_values = true)]
        secret_key: Option<String>,
    },
    Transfer {
        #[arg(long)]
        from: uuid::Uuid,
        #[arg(long)]
        to: uuid::Uuid,
        #[arg(long)]
        amount: u64,
        #[arg(long, default_value = "SMART_PAY")]
        currency: Currency,
        #[arg(long, env = "SMARTPAY_SECRET_KEY", hide_env_values = true)]
        secret_key: Option<String>,
    },
    /// Redeem a QR authorization as a payment from `payer`.
    Redeem {
        #[arg(long)]
        payer: uuid::Uuid,
        payload: String,
        #[arg(long, env = "SMARTPAY_SECRET_KEY", hide_env_values = true)]
        secret_key: Option<String>,
    },
    Balance {
        account: uuid::Uuid,
    },
    History {
        account: uuid::Uuid,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Daily completed sales for a merchant.
    Sales {
        merchant: uuid::Uuid,
        /// Inclusive start date, YYYY-MM-DD.
        #[arg(long)]
        from: Option<chrono::NaiveDate>,
        /// Inclusive end date, YYYY-MM-DD.
        #[arg(long)]
        to: Option<chrono::NaiveDate>,
    },
    /// Forget consumed QR nonces that are past their TTL.
    Prune,
}

fn parse_kind(s: &str) -> Result<AccountKind, String> {
    match s.to_ascii_lowercase().as_str() {
        "user" => Ok(AccountKind::User),
        "merchant" => Ok(AccountKind::Merchant),
        other => Err(format!("unknown account kind: {other}")),
    }
}
