//! Common domain types: export rows and the shapes of the analytical views.

use crate::errors::DateError;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Layout of `Дата операции` in the export.
pub const OPERATION_DATE_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// `true` when `year` is exactly four ASCII digits, the only shape `%Y`
/// takes in the export.
pub fn is_four_digit_year(year: &str) -> bool {
    year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit())
}

/// Parse an operation date in the export's `DD.MM.YYYY HH:MM:SS` layout.
///
/// Stricter than chrono alone: surrounding blanks and years that are not
/// four digits are rejected.
pub fn parse_operation_date(s: &str) -> Result<NaiveDateTime, DateError> {
    let year = s
        .split(' ')
        .next()
        .and_then(|date| date.rsplit('.').next())
        .unwrap_or_default();
    if s != s.trim() || !is_four_digit_year(year) {
        return Err(DateError::Layout(s.to_owned()));
    }
    Ok(NaiveDateTime::parse_from_str(s, OPERATION_DATE_FORMAT)?)
}

/// A monetary cell as it arrived: already numeric, or text still to be
/// coerced.
///
/// Spreadsheet exports are loose about types, so the same column can
/// carry `-160.89`, `"-160.89"` or garbage. Nothing is rejected at
/// deserialization time; callers decide what a non-numeric value means
/// through [`RawAmount::coerce`].
#[derive(Debug, Clone, PartialEq)]
pub enum RawAmount {
    Number(Decimal),
    Text(String),
}

impl RawAmount {
    /// From a binary float, through its shortest round-trip text so
    /// `160.89` stays `160.89` instead of its binary expansion.
    pub fn from_f64(v: f64) -> Self {
        let text = v.to_string();
        match Decimal::from_str(&text) {
            Ok(d) => RawAmount::Number(d),
            Err(_) => RawAmount::Text(text),
        }
    }

    /// Numeric value, or `None` when the cell is not a number.
    pub fn coerce(&self) -> Option<Decimal> {
        match self {
            RawAmount::Number(d) => Some(*d),
            RawAmount::Text(s) => {
                let s = s.trim();
                Decimal::from_str(s)
                    .or_else(|_| Decimal::from_scientific(s))
                    .ok()
            }
        }
    }
}

impl From<Decimal> for RawAmount {
    fn from(d: Decimal) -> Self {
        RawAmount::Number(d)
    }
}

impl From<&str> for RawAmount {
    fn from(s: &str) -> Self {
        RawAmount::Text(s.to_owned())
    }
}

impl<'de> Deserialize<'de> for RawAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RawAmountVisitor;

        impl Visitor<'_> for RawAmountVisitor {
            type Value = RawAmount;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a number or a string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<RawAmount, E> {
                Ok(RawAmount::Number(Decimal::from(v)))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<RawAmount, E> {
                Ok(RawAmount::Number(Decimal::from(v)))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<RawAmount, E> {
                Ok(RawAmount::from_f64(v))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<RawAmount, E> {
                Ok(RawAmount::Text(v.to_string()))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<RawAmount, E> {
                Ok(RawAmount::Text(v.to_owned()))
            }
        }

        deserializer.deserialize_any(RawAmountVisitor)
    }
}

impl Serialize for RawAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.coerce().and_then(|d| d.to_f64()) {
            Some(f) => serializer.serialize_f64(f),
            None => match self {
                RawAmount::Text(s) => serializer.serialize_str(s),
                RawAmount::Number(d) => serializer.serialize_str(&d.to_string()),
            },
        }
    }
}

/// One row of the bank operations export.
///
/// *Every column is optional* – a row lacking a field still loads and is
/// skipped by whichever view needs that field. Unknown columns are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// `DD.MM.YYYY HH:MM:SS`.
    #[serde(rename = "Дата операции", alias = "operation_date", default)]
    pub operation_date: Option<String>,
    #[serde(rename = "Дата платежа", alias = "payment_date", default)]
    pub payment_date: Option<String>,
    #[serde(rename = "Номер карты", alias = "card_number", default)]
    pub card_number: Option<String>,
    #[serde(rename = "Статус", alias = "status", default)]
    pub status: Option<String>,
    /// Negative = debit (expense), non-negative = credit.
    #[serde(rename = "Сумма операции", alias = "operation_amount", default)]
    pub operation_amount: Option<RawAmount>,
    #[serde(rename = "Валюта операции", alias = "operation_currency", default)]
    pub operation_currency: Option<String>,
    #[serde(rename = "Сумма платежа", alias = "payment_amount", default)]
    pub payment_amount: Option<RawAmount>,
    #[serde(rename = "Валюта платежа", alias = "payment_currency", default)]
    pub payment_currency: Option<String>,
    #[serde(rename = "Кэшбэк", alias = "cashback", default)]
    pub cashback: Option<RawAmount>,
    #[serde(rename = "Категория", alias = "category", default)]
    pub category: Option<String>,
    #[serde(rename = "MCC", alias = "mcc", default)]
    pub mcc: Option<String>,
    #[serde(rename = "Описание", alias = "description", default)]
    pub description: Option<String>,
}

impl Operation {
    /// Minimal row carrying just the two fields the round-up needs.
    pub fn new(date: &str, amount: impl Into<RawAmount>) -> Self {
        Self {
            operation_date: Some(date.to_owned()),
            operation_amount: Some(amount.into()),
            ..Self::default()
        }
    }

    /// Parsed operation date; `None` when absent or malformed.
    pub fn operation_datetime(&self) -> Option<NaiveDateTime> {
        self.operation_date
            .as_deref()
            .and_then(|s| parse_operation_date(s.trim()).ok())
    }

    pub fn operation_value(&self) -> Option<Decimal> {
        self.operation_amount.as_ref().and_then(RawAmount::coerce)
    }

    pub fn payment_value(&self) -> Option<Decimal> {
        self.payment_amount.as_ref().and_then(RawAmount::coerce)
    }

    /// Card number with surrounding blanks removed; `None` when empty.
    pub fn card(&self) -> Option<&str> {
        self.card_number
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// Last four characters of a card number (the whole value if shorter).
pub fn last_digits(card: &str) -> String {
    let chars: Vec<char> = card.chars().collect();
    let start = chars.len().saturating_sub(4);
    chars[start..].iter().collect()
}

/// Per-card spend for the summary view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardSummary {
    pub last_digits: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_spent: Decimal,
    /// One unit per full hundred spent.
    pub cashback: u64,
}

/// One of the largest expenses for the summary view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopTransaction {
    pub date: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub category: Option<String>,
    pub description: Option<String>,
    pub card_last_digits: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencyRate {
    pub currency: String,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockPrice {
    pub stock: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The dated summary, serialised as the `summary` command's output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub greeting: Option<&'static str>,
    pub cards: Vec<CardSummary>,
    pub top_transactions: Vec<TopTransaction>,
    pub currency_rates: Vec<CurrencyRate>,
    pub stock_prices: Vec<StockPrice>,
}

/// A row of the category spending report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySpend {
    #[serde(rename = "Дата операции")]
    pub operation_date: NaiveDateTime,
    #[serde(rename = "Номер карты")]
    pub card_number: Option<String>,
    #[serde(rename = "Сумма операции", with = "rust_decimal::serde::float")]
    pub operation_amount: Decimal,
    #[serde(rename = "Сумма платежа")]
    pub payment_amount: Option<RawAmount>,
    #[serde(rename = "Категория")]
    pub category: String,
    #[serde(rename = "Описание")]
    pub description: Option<String>,
}
