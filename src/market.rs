//! Currency-rate and stock-price lookups for the summary.
//!
//! Both lookups are best-effort: every failure is logged and turned into
//! an empty or zero-priced answer so the summary still renders.

use crate::config::{ApiConfig, UserSettings};
use crate::errors::MarketError;
use crate::models::{CurrencyRate, StockPrice};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const CURRENCY_TIMEOUT: Duration = Duration::from_secs(10);
const STOCK_TIMEOUT: Duration = Duration::from_secs(20);
/// Pause after the stock provider answers 429.
const RATE_LIMIT_PAUSE: Duration = Duration::from_secs(1);

const NO_DATA: &str = "Данные не получены";
const RATE_LIMITED: &str = "Превышен лимит запросов API";

#[derive(Debug, Deserialize)]
struct RatesResponse {
    #[serde(default)]
    rates: HashMap<String, f64>,
}

/// RUB price of one unit of each wanted currency, in `wanted` order.
///
/// `rates` are quoted per rouble (`1 RUB = x USD`), so the price is
/// `1 / x`, rounded to 4 dp. Currencies missing from `rates` or quoted
/// at a non-positive rate are left out.
pub fn invert_rates(rates: &HashMap<String, f64>, wanted: &[String]) -> Vec<CurrencyRate> {
    wanted
        .iter()
        .filter_map(|code| {
            let rate = *rates.get(code)?;
            if !(rate.is_finite() && rate > 0.0) {
                warn!(currency = %code, rate, "unusable exchange rate");
                return None;
            }
            Some(CurrencyRate {
                currency: code.clone(),
                rate: round_to(1.0 / rate, 4),
            })
        })
        .collect()
}

/// Price entry for `stock` from a quote endpoint's JSON body.
///
/// The body is expected to be a non-empty list whose first element has
/// a `price`; anything else is reported as "no data".
pub fn stock_from_body(stock: &str, body: &Value) -> StockPrice {
    match body.as_array().and_then(|list| list.first()) {
        Some(quote) => StockPrice {
            stock: stock.to_owned(),
            price: round_to(quote.get("price").and_then(Value::as_f64).unwrap_or(0.0), 2),
            error: None,
        },
        None => {
            warn!(stock, "empty quote response");
            StockPrice {
                stock: stock.to_owned(),
                price: 0.0,
                error: Some(NO_DATA.into()),
            }
        }
    }
}

fn round_to(x: f64, dp: i32) -> f64 {
    let factor = 10f64.powi(dp);
    (x * factor).round() / factor
}

/// Thin HTTP client over the configured providers.
pub struct MarketClient {
    http: reqwest::Client,
    api: ApiConfig,
    settings: UserSettings,
}

impl MarketClient {
    pub fn new(api: ApiConfig, settings: UserSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            api,
            settings,
        }
    }

    /// `{currency, rate}` for each of the user's currencies.
    pub async fn currency_rates(&self) -> Vec<CurrencyRate> {
        match self.fetch_rates().await {
            Ok(rates) => {
                let found = invert_rates(&rates, &self.settings.user_currencies);
                info!(
                    "Currency rates received: {:?}",
                    found.iter().map(|r| r.currency.as_str()).collect::<Vec<_>>()
                );
                found
            }
            Err(e) => {
                error!(%e, "currency rates unavailable");
                Vec::new()
            }
        }
    }

    async fn fetch_rates(&self) -> Result<HashMap<String, f64>, MarketError> {
        let base = self
            .api
            .currency_api_url
            .as_deref()
            .ok_or(MarketError::NotConfigured("CURRENCY_API_URL"))?;
        let key = self
            .api
            .currency_api_key
            .as_deref()
            .ok_or(MarketError::NotConfigured("CURRENCY_API_KEY"))?;
        let url = format!("{base}{key}/latest/RUB");

        let resp = self.http.get(&url).timeout(CURRENCY_TIMEOUT).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(MarketError::Status(resp.status().as_u16()));
        }
        let body: RatesResponse = resp.json().await?;
        Ok(body.rates)
    }

    /// One entry per tracked ticker, requested one at a time.
    pub async fn stock_prices(&self) -> Vec<StockPrice> {
        let stocks = &self.settings.user_stocks;
        if stocks.is_empty() {
            warn!("no stocks to track in settings");
            return Vec::new();
        }

        let (base, key) = match (&self.api.stocks_api_url, &self.api.stocks_api_key) {
            (Some(b), Some(k)) => (b.as_str(), k.as_str()),
            _ => {
                error!(e = %MarketError::NotConfigured("STOCKS_API_URL/STOCKS_API_KEY"), "stock prices unavailable");
                return stocks
                    .iter()
                    .map(|stock| StockPrice {
                        stock: stock.clone(),
                        price: 0.0,
                        error: None,
                    })
                    .collect();
            }
        };

        let mut prices = Vec::with_capacity(stocks.len());
        for stock in stocks {
            let url = format!("{base}{stock}&apikey={key}");
            match self.fetch_quote(&url).await {
                Ok(body) => {
                    let price = stock_from_body(stock, &body);
                    debug!(stock = %stock, price = price.price, "stock price received");
                    prices.push(price);
                }
                Err(MarketError::Status(429)) => {
                    warn!(stock = %stock, "stock API rate limit hit");
                    prices.push(StockPrice {
                        stock: stock.clone(),
                        price: 0.0,
                        error: Some(RATE_LIMITED.into()),
                    });
                    tokio::time::sleep(RATE_LIMIT_PAUSE).await;
                }
                Err(MarketError::Status(code)) => {
                    warn!(stock = %stock, code, "stock quote refused");
                }
                Err(e) => {
                    error!(stock = %stock, %e, "stock quote failed");
                    prices.push(StockPrice {
                        stock: stock.clone(),
                        price: 0.0,
                        error: None,
                    });
                }
            }
        }

        let ok = prices.iter().filter(|p| p.price > 0.0).count();
        info!("Stock prices received for {ok} of {} tickers", stocks.len());
        prices
    }

    async fn fetch_quote(&self, url: &str) -> Result<Value, MarketError> {
        let resp = self.http.get(url).timeout(STOCK_TIMEOUT).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(MarketError::Status(resp.status().as_u16()));
        }
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rates_are_inverted_in_settings_order() {
        let rates: HashMap<String, f64> =
            [("EUR".to_string(), 0.0125), ("USD".to_string(), 0.0136), ("GBP".to_string(), 0.0)]
                .into_iter()
                .collect();
        let wanted = vec!["USD".to_string(), "EUR".into(), "CNY".into(), "GBP".into()];
        let got = invert_rates(&rates, &wanted);
        assert_eq!(
            got,
            vec![
                CurrencyRate { currency: "USD".into(), rate: 73.5294 },
                CurrencyRate { currency: "EUR".into(), rate: 80.0 },
            ]
        );
    }

    #[test]
    fn quote_body_first_price_wins() {
        let body = json!([{"symbol": "AAPL", "price": 150.1234}, {"price": 1.0}]);
        let p = stock_from_body("AAPL", &body);
        assert_eq!(p.price, 150.12);
        assert_eq!(p.error, None);

        let p = stock_from_body("AMZN", &json!([{"symbol": "AMZN"}]));
        assert_eq!(p.price, 0.0);
        assert_eq!(p.error, None);
    }

    #[test]
    fn empty_quote_body_is_no_data() {
        for body in [json!([]), json!({}), Value::Null] {
            let p = stock_from_body("MSFT", &body);
            assert_eq!(p.price, 0.0);
            assert_eq!(p.error.as_deref(), Some(NO_DATA));
        }
    }

    #[tokio::test]
    async fn unconfigured_client_degrades_without_requests() {
        let settings = UserSettings::default();
        let tracked = settings.user_stocks.clone();
        let client = MarketClient::new(ApiConfig::default(), settings);
        assert!(client.currency_rates().await.is_empty());

        let stocks = client.stock_prices().await;
        let names: Vec<_> = stocks.iter().map(|s| s.stock.clone()).collect();
        assert_eq!(names, tracked);
        assert!(stocks.iter().all(|s| s.price == 0.0 && s.error.is_none()));
    }

    #[tokio::test]
    async fn no_tracked_stocks_means_no_requests() {
        let settings = UserSettings {
            user_stocks: Vec::new(),
            ..UserSettings::default()
        };
        let api = ApiConfig {
            stocks_api_url: Some("http://127.0.0.1:9/quote?symbol=".into()),
            stocks_api_key: Some("k".into()),
            ..ApiConfig::default()
        };
        let client = MarketClient::new(api, settings);
        assert!(client.stock_prices().await.is_empty());
    }
}
