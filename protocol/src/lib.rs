// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # SmartPay Protocol — Core Library
//!
//! Wallet identity and money movement for SmartPay: who you are, how you
//! prove a transaction is yours, how a merchant's QR code authorizes a
//! payment, and how balances move when it is redeemed.
//!
//! ## Architecture
//!
//! - **crypto** — secp256k1 keys, hashing, HMAC and sealed secret storage.
//! - **identity** — wallet generation and the `SP` address codec.
//! - **transaction** — ledger records, their canonical hash and signatures.
//! - **authorization** — HMAC-signed QR payment authorizations with a TTL.
//! - **ledger** — accounts and the atomic transfer engine.
//! - **storage** — sled persistence for the ledger.
//! - **config** — protocol constants and runtime configuration.
//!
//! ## Ground Rules
//!
//! 1. Amounts are `u64` minor units. No floats anywhere money is involved.
//! 2. Secret material lives in `Zeroizing` buffers and never reaches a log.
//! 3. A balance change and its record land together or not at all.

pub mod authorization;
pub mod config;
pub mod crypto;
pub mod identity;
pub mod ledger;
pub mod storage;
pub mod transaction;
