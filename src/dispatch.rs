// src/dispatch.rs
//
// Closed dispatch over the event taxonomy fixed by the provider's
// contract. Tags outside the set are rejected, not extended.

use std::collections::HashMap;

use crate::decoders::{self, TypedRecord};
use crate::error::IngestError;

/// The recognized event types. Parsing a wire tag into this enum is the
/// closed-set gate; everything downstream (decoders, table names) keys off
/// the enum, never off raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    NftBid,
    NftPrice,
    TokenBorrow,
    TokenPrice,
}

impl EventType {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "nft_bid" => Some(EventType::NftBid),
            "nft_price" => Some(EventType::NftPrice),
            "token_borrow" => Some(EventType::TokenBorrow),
            "token_price" => Some(EventType::TokenPrice),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            EventType::NftBid => "nft_bid",
            EventType::NftPrice => "nft_price",
            EventType::TokenBorrow => "token_borrow",
            EventType::TokenPrice => "token_price",
        }
    }

    /// Static table-name suffix for the tenant relation
    pub fn table_suffix(&self) -> &'static str {
        match self {
            EventType::NftBid => "nft_bids",
            EventType::NftPrice => "nft_prices",
            EventType::TokenBorrow => "token_borrows",
            EventType::TokenPrice => "token_prices",
        }
    }
}

type DecodeFn = fn(&str) -> Result<TypedRecord, IngestError>;

/// Tag -> decoder table, built once at startup
pub struct Dispatcher {
    table: HashMap<EventType, DecodeFn>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let mut table: HashMap<EventType, DecodeFn> = HashMap::new();
        table.insert(EventType::NftBid, decoders::decode_nft_bid);
        table.insert(EventType::NftPrice, decoders::decode_nft_price);
        table.insert(EventType::TokenBorrow, decoders::decode_token_borrow);
        table.insert(EventType::TokenPrice, decoders::decode_token_price);
        Dispatcher { table }
    }

    /// Resolve the tag and decode the payload in one step
    pub fn decode(&self, tag: &str, payload: &str) -> Result<(EventType, TypedRecord), IngestError> {
        let event_type = EventType::from_tag(tag)
            .ok_or_else(|| IngestError::UnsupportedEventType(tag.to_string()))?;
        let decode = self
            .table
            .get(&event_type)
            .ok_or_else(|| IngestError::UnsupportedEventType(tag.to_string()))?;
        let record = decode(payload)?;
        Ok((event_type, record))
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_parsing_covers_the_closed_set() {
        for tag in ["nft_bid", "nft_price", "token_borrow", "token_price"] {
            let ty = EventType::from_tag(tag).unwrap();
            assert_eq!(ty.as_tag(), tag);
        }
        assert!(EventType::from_tag("nft_sale").is_none());
        assert!(EventType::from_tag("").is_none());
    }

    #[test]
    fn unknown_tag_is_unsupported() {
        let dispatcher = Dispatcher::new();
        let err = dispatcher.decode("nft_sale", "{}").unwrap_err();
        match err {
            IngestError::UnsupportedEventType(tag) => assert_eq!(tag, "nft_sale"),
            other => panic!("expected UnsupportedEventType, got {other:?}"),
        }
    }

    #[test]
    fn known_tag_routes_to_its_decoder() {
        let dispatcher = Dispatcher::new();
        let payload =
            r#"{"token_address":"TOK1","price":1.25,"platform":"orca","timestamp":1700000000}"#;
        let (ty, record) = dispatcher.decode("token_price", payload).unwrap();
        assert_eq!(ty, EventType::TokenPrice);
        assert_eq!(record.event_type(), EventType::TokenPrice);
    }

    #[test]
    fn decoder_errors_pass_through() {
        let dispatcher = Dispatcher::new();
        assert!(matches!(
            dispatcher.decode("nft_bid", "{}"),
            Err(IngestError::Decode(_))
        ));
    }
}
