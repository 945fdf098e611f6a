//! Static catalog of trading-API endpoint templates.
//!
//! A pre-baked, read-only reference consumed by the prompt builder. The
//! catalog mirrors the platform's public surface: quotes, orderbooks,
//! candles, accounts, orders, and sessions.

use crate::parser::HttpMethod;
use std::fmt::Write as FmtWrite;

/// One endpoint template from the API surface
#[derive(Debug, Clone, Copy)]
pub struct Endpoint {
    /// HTTP verb
    pub method: HttpMethod,
    /// Path template, `{placeholders}` for path parameters
    pub template: &'static str,
    /// One-line description shown to the model
    pub description: &'static str,
}

/// The condensed API surface, one entry per operation
pub const ENDPOINTS: &[Endpoint] = &[
    Endpoint {
        method: HttpMethod::Get,
        template: "/v1/exchanges",
        description: "list available exchanges",
    },
    Endpoint {
        method: HttpMethod::Get,
        template: "/v1/assets",
        description: "search instruments",
    },
    Endpoint {
        method: HttpMethod::Get,
        template: "/v1/assets/{symbol}",
        description: "instrument details",
    },
    Endpoint {
        method: HttpMethod::Get,
        template: "/v1/assets/{symbol}/params",
        description: "instrument trading parameters for an account",
    },
    Endpoint {
        method: HttpMethod::Get,
        template: "/v1/assets/{symbol}/schedule",
        description: "trading schedule for an instrument",
    },
    Endpoint {
        method: HttpMethod::Get,
        template: "/v1/assets/{symbol}/options",
        description: "options on an underlying asset",
    },
    Endpoint {
        method: HttpMethod::Get,
        template: "/v1/instruments/{symbol}/quotes/latest",
        description: "latest quote",
    },
    Endpoint {
        method: HttpMethod::Get,
        template: "/v1/instruments/{symbol}/orderbook",
        description: "order book",
    },
    Endpoint {
        method: HttpMethod::Get,
        template: "/v1/instruments/{symbol}/trades/latest",
        description: "latest trades feed",
    },
    Endpoint {
        method: HttpMethod::Get,
        template: "/v1/instruments/{symbol}/bars",
        description: "historical candles (params: timeframe, interval.start_time, interval.end_time)",
    },
    Endpoint {
        method: HttpMethod::Get,
        template: "/v1/accounts/{account_id}",
        description: "account details",
    },
    Endpoint {
        method: HttpMethod::Get,
        template: "/v1/accounts/{account_id}/orders",
        description: "list orders for an account",
    },
    Endpoint {
        method: HttpMethod::Get,
        template: "/v1/accounts/{account_id}/orders/{order_id}",
        description: "order details",
    },
    Endpoint {
        method: HttpMethod::Get,
        template: "/v1/accounts/{account_id}/trades",
        description: "trade history for an account",
    },
    Endpoint {
        method: HttpMethod::Get,
        template: "/v1/accounts/{account_id}/transactions",
        description: "account transactions",
    },
    Endpoint {
        method: HttpMethod::Post,
        template: "/v1/sessions",
        description: "create a new session",
    },
    Endpoint {
        method: HttpMethod::Post,
        template: "/v1/sessions/details",
        description: "current session details",
    },
    Endpoint {
        method: HttpMethod::Post,
        template: "/v1/accounts/{account_id}/orders",
        description: "place an order",
    },
    Endpoint {
        method: HttpMethod::Delete,
        template: "/v1/accounts/{account_id}/orders/{order_id}",
        description: "cancel an order",
    },
];

/// Timeframe tokens accepted by the bars endpoint
pub const BAR_TIMEFRAMES: &[&str] = &[
    "TIME_FRAME_M1",
    "TIME_FRAME_M5",
    "TIME_FRAME_M15",
    "TIME_FRAME_M30",
    "TIME_FRAME_H1",
    "TIME_FRAME_H4",
    "TIME_FRAME_D",
    "TIME_FRAME_W",
    "TIME_FRAME_MN",
];

/// Render the catalog as the reference block embedded in prompts
///
/// One `- METHOD /path - description` line per endpoint, followed by the
/// timeframe token list. Deterministic: the catalog is a fixed constant.
#[must_use]
pub fn reference_block() -> String {
    let mut block = String::from("API reference:\n");
    for endpoint in ENDPOINTS {
        let _ = writeln!(
            block,
            "- {} {} - {}",
            endpoint.method, endpoint.template, endpoint.description
        );
    }
    let _ = writeln!(block, "\nTimeframes: {}", BAR_TIMEFRAMES.join(", "));
    block
}
