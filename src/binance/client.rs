// =============================================================================
// Binance REST API Client — public market-data endpoints
// =============================================================================
//
// Stateless request/response wrapper over the four read endpoints the
// dashboard polls: klines, 24h ticker, depth snapshot, recent trades. Every
// payload is validated and numerically coerced here — no unparsed provider
// values ever reach the series store. The client performs no retries; retry
// policy belongs to the poll scheduler (the next tick is the retry).
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::binance::rate_limit::RateLimitTracker;
use crate::error::{MarketError, Result};
use crate::market_data::{BookLevel, Candle, OrderBookSnapshot, TradeTick};
use crate::types::TickerStats;

/// Binance public REST client bound to a single symbol.
#[derive(Clone)]
pub struct MarketDataClient {
    symbol: String,
    base_url: String,
    client: reqwest::Client,
    limits: Arc<RateLimitTracker>,
}

impl MarketDataClient {
    /// Create a new client for `symbol` (e.g. "BTCUSDT").
    pub fn new(symbol: impl Into<String>, limits: Arc<RateLimitTracker>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        Self {
            symbol: symbol.into(),
            base_url: "https://api.binance.com".to_string(),
            client,
            limits,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Single GET round trip: status check, weight-header observation, JSON
    /// body decode. Transport and decode failures map to `DataUnavailable`.
    async fn get_json(&self, path_and_query: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path_and_query);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MarketError::DataUnavailable(format!("GET {path_and_query}: {e}")))?;

        self.limits.update_from_headers(resp.headers());

        let status = resp.status();
        if !status.is_success() {
            return Err(MarketError::DataUnavailable(format!(
                "GET {path_and_query} returned {status}"
            )));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| MarketError::DataUnavailable(format!("GET {path_and_query}: {e}")))
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /api/v3/klines — ordered candle history.
    #[instrument(skip(self), name = "binance::fetch_candles")]
    pub async fn fetch_candles(&self, interval: &str, limit: u32) -> Result<Vec<Candle>> {
        let body = self
            .get_json(&format!(
                "/api/v3/klines?symbol={}&interval={}&limit={}",
                self.symbol, interval, limit
            ))
            .await?;

        let candles = parse_klines(&body)?;
        debug!(interval, count = candles.len(), "klines fetched");
        Ok(candles)
    }

    /// GET /api/v3/ticker/24hr — last price and 24h percent change.
    #[instrument(skip(self), name = "binance::fetch_ticker")]
    pub async fn fetch_ticker(&self) -> Result<TickerStats> {
        let body = self
            .get_json(&format!("/api/v3/ticker/24hr?symbol={}", self.symbol))
            .await?;
        parse_ticker(&body)
    }

    /// GET /api/v3/depth — full order-book snapshot, `depth` levels per side.
    #[instrument(skip(self), name = "binance::fetch_order_book")]
    pub async fn fetch_order_book(&self, depth: u16) -> Result<OrderBookSnapshot> {
        let body = self
            .get_json(&format!(
                "/api/v3/depth?symbol={}&limit={}",
                self.symbol, depth
            ))
            .await?;
        parse_depth(&body, depth as usize)
    }

    /// GET /api/v3/trades — the most recent `limit` trades, oldest first.
    #[instrument(skip(self), name = "binance::fetch_recent_trades")]
    pub async fn fetch_recent_trades(&self, limit: u16) -> Result<Vec<TradeTick>> {
        let body = self
            .get_json(&format!(
                "/api/v3/trades?symbol={}&limit={}",
                self.symbol, limit
            ))
            .await?;
        parse_trades(&body)
    }
}

impl std::fmt::Debug for MarketDataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDataClient")
            .field("symbol", &self.symbol)
            .field("base_url", &self.base_url)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Payload parsing
// ---------------------------------------------------------------------------

/// Parse the klines array-of-arrays payload.
///
/// Array indices, in the provider's fixed field order:
///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume
/// (later elements — closeTime, quote volume, trade count — are unused).
fn parse_klines(body: &Value) -> Result<Vec<Candle>> {
    let rows = body
        .as_array()
        .ok_or_else(|| MarketError::MalformedResponse("klines payload is not an array".into()))?;

    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        let arr = row
            .as_array()
            .ok_or_else(|| MarketError::MalformedResponse("kline row is not an array".into()))?;
        if arr.len() < 6 {
            return Err(MarketError::MalformedResponse(format!(
                "kline row has {} elements, expected at least 6",
                arr.len()
            )));
        }

        candles.push(Candle {
            bucket_start: arr[0].as_i64().ok_or_else(|| {
                MarketError::MalformedResponse("kline open time is not an integer".into())
            })?,
            open: parse_str_f64(&arr[1], "kline open")?,
            high: parse_str_f64(&arr[2], "kline high")?,
            low: parse_str_f64(&arr[3], "kline low")?,
            close: parse_str_f64(&arr[4], "kline close")?,
            volume: parse_str_f64(&arr[5], "kline volume")?,
        });
    }

    Ok(candles)
}

/// Parse the 24h ticker payload.
fn parse_ticker(body: &Value) -> Result<TickerStats> {
    Ok(TickerStats {
        last_price: parse_str_f64(&body["lastPrice"], "ticker lastPrice")?,
        percent_change_24h: parse_str_f64(&body["priceChangePercent"], "ticker priceChangePercent")?,
    })
}

/// Parse the depth payload into a normalised snapshot.
///
/// Expected shape:
/// ```json
/// { "lastUpdateId": 12345, "bids": [["37000.00", "1.5"], ...], "asks": [...] }
/// ```
fn parse_depth(body: &Value, depth: usize) -> Result<OrderBookSnapshot> {
    let last_update_id = body["lastUpdateId"]
        .as_u64()
        .ok_or_else(|| MarketError::MalformedResponse("depth missing lastUpdateId".into()))?;

    let bids = parse_levels(&body["bids"], "bids")?;
    let asks = parse_levels(&body["asks"], "asks")?;

    Ok(OrderBookSnapshot::new(bids, asks, last_update_id, depth))
}

fn parse_levels(value: &Value, side: &str) -> Result<Vec<BookLevel>> {
    let rows = value
        .as_array()
        .ok_or_else(|| MarketError::MalformedResponse(format!("depth missing {side} array")))?;

    let mut levels = Vec::with_capacity(rows.len());
    for row in rows {
        let pair = row.as_array().filter(|a| a.len() >= 2).ok_or_else(|| {
            MarketError::MalformedResponse(format!("{side} level is not a [price, qty] pair"))
        })?;
        levels.push(BookLevel {
            price: parse_str_f64(&pair[0], "level price")?,
            quantity: parse_str_f64(&pair[1], "level quantity")?,
        });
    }
    Ok(levels)
}

/// Parse the recent-trades payload, preserving the provider's order.
fn parse_trades(body: &Value) -> Result<Vec<TradeTick>> {
    let rows = body
        .as_array()
        .ok_or_else(|| MarketError::MalformedResponse("trades payload is not an array".into()))?;

    let mut ticks = Vec::with_capacity(rows.len());
    for row in rows {
        ticks.push(TradeTick {
            timestamp: row["time"].as_i64().ok_or_else(|| {
                MarketError::MalformedResponse("trade missing time field".into())
            })?,
            price: parse_str_f64(&row["price"], "trade price")?,
            quantity: parse_str_f64(&row["qty"], "trade qty")?,
            // Buyer-is-maker means the taker sold.
            taker_is_seller: row["isBuyerMaker"].as_bool().ok_or_else(|| {
                MarketError::MalformedResponse("trade missing isBuyerMaker field".into())
            })?,
        });
    }
    Ok(ticks)
}

/// Parse a JSON value that may be either a string or a number into `f64`.
/// Binance sends most numeric fields as strings.
fn parse_str_f64(value: &Value, name: &str) -> Result<f64> {
    match value {
        Value::String(s) => s.parse::<f64>().map_err(|_| {
            MarketError::MalformedResponse(format!("failed to parse {name} as f64: {s}"))
        }),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| MarketError::MalformedResponse(format!("{name} is not a valid f64"))),
        _ => Err(MarketError::MalformedResponse(format!(
            "{name} has unexpected JSON type"
        ))),
    }
}
