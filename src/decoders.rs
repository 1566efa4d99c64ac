// src/decoders.rs
//
// One pure decoder per supported event type. Payloads arrive as an opaque
// JSON string inside the inbound event; each decoder maps a known flat
// shape into a typed record. Money/rate fields are Decimal, parsed from
// the raw JSON number token so 2.5 stays exactly 2.5.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::dispatch::EventType;
use crate::error::IngestError;

/// An NFT bid event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftBid {
    pub nft_address: String,
    pub bidder: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub amount: Decimal,
    pub timestamp: i64, // unix seconds
}

/// An NFT listing/sale price event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftPrice {
    pub nft_address: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub price: Decimal,
    pub market: String,
    pub timestamp: i64,
}

/// A token borrow event with its APY at borrow time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBorrow {
    pub token_address: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub apy: Decimal,
    pub platform: String,
    pub timestamp: i64,
}

/// A token price event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPrice {
    pub token_address: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub price: Decimal,
    pub platform: String,
    pub timestamp: i64,
}

/// A decoded event, ready to be written to the tenant's relation
#[derive(Debug, Clone, PartialEq)]
pub enum TypedRecord {
    NftBid(NftBid),
    NftPrice(NftPrice),
    TokenBorrow(TokenBorrow),
    TokenPrice(TokenPrice),
}

impl TypedRecord {
    pub fn event_type(&self) -> EventType {
        match self {
            TypedRecord::NftBid(_) => EventType::NftBid,
            TypedRecord::NftPrice(_) => EventType::NftPrice,
            TypedRecord::TokenBorrow(_) => EventType::TokenBorrow,
            TypedRecord::TokenPrice(_) => EventType::TokenPrice,
        }
    }
}

fn decode_as<T: for<'de> Deserialize<'de>>(payload: &str) -> Result<T, IngestError> {
    serde_json::from_str(payload).map_err(|e| IngestError::Decode(e.to_string()))
}

pub fn decode_nft_bid(payload: &str) -> Result<TypedRecord, IngestError> {
    decode_as::<NftBid>(payload).map(TypedRecord::NftBid)
}

pub fn decode_nft_price(payload: &str) -> Result<TypedRecord, IngestError> {
    decode_as::<NftPrice>(payload).map(TypedRecord::NftPrice)
}

pub fn decode_token_borrow(payload: &str) -> Result<TypedRecord, IngestError> {
    decode_as::<TokenBorrow>(payload).map(TypedRecord::TokenBorrow)
}

pub fn decode_token_price(payload: &str) -> Result<TypedRecord, IngestError> {
    decode_as::<TokenPrice>(payload).map(TypedRecord::TokenPrice)
}
