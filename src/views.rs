//! The dated summary: greeting, per-card spend, top expenses, and the
//! market snapshot fetched by the caller.

use crate::models::{
    CardSummary, CurrencyRate, OPERATION_DATE_FORMAT, Operation, StockPrice, Summary,
    TopTransaction, is_four_digit_year, last_digits,
};
use chrono::{Datelike, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use tracing::error;

/// Layout of the summary's target date.
pub const TARGET_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Spend needed for one unit of cashback.
const CASHBACK_STEP: Decimal = dec!(100);

/// How many expenses the summary lists by default.
pub const DEFAULT_TOP_N: usize = 5;

/// Greeting for the hour of day (`0..=24`).
pub fn greeting(hour: u32) -> Option<&'static str> {
    match hour {
        0..=6 => Some("Доброй ночи"),
        7..=12 => Some("Доброе утро"),
        13..=18 => Some("Добрый день"),
        19..=24 => Some("Добрый вечер"),
        _ => None,
    }
}

/// Operations from the first day of `target`'s month up to `target`
/// inclusive.
///
/// `target` is `YYYY-MM-DD HH:MM:SS`. If it does not parse, nothing is
/// filtered out. Rows without a readable operation date are dropped.
pub fn filter_by_date<'a>(ops: &'a [Operation], target: &str) -> Vec<&'a Operation> {
    let year = target.split('-').next().unwrap_or_default();
    let end = match NaiveDateTime::parse_from_str(target, TARGET_DATE_FORMAT) {
        Ok(t) if is_four_digit_year(year) => t,
        Ok(_) => {
            error!(date = target, "year is not four digits, keeping every operation");
            return ops.iter().collect();
        }
        Err(e) => {
            error!(date = target, %e, "cannot filter by date, keeping every operation");
            return ops.iter().collect();
        }
    };
    // day 1 always exists
    let start = end.date().with_day(1).unwrap_or(end.date()).and_time(NaiveTime::MIN);

    ops.iter()
        .filter(|op| {
            op.operation_datetime()
                .is_some_and(|d| d >= start && d <= end)
        })
        .collect()
}

/// Expenses and cashback per card, cards in first-seen order.
pub fn card_summary(ops: &[&Operation]) -> Vec<CardSummary> {
    let mut cards: Vec<(&str, Decimal)> = Vec::new();

    for op in ops {
        let Some(card) = op.card() else { continue };
        let slot = match cards.iter().position(|(c, _)| *c == card) {
            Some(i) => i,
            None => {
                cards.push((card, Decimal::ZERO));
                cards.len() - 1
            }
        };
        if let Some(amount) = op.operation_value().filter(|a| *a < Decimal::ZERO) {
            cards[slot].1 = cards[slot].1.saturating_add(amount);
        }
    }

    cards
        .into_iter()
        .map(|(card, spent)| {
            let spent = spent.abs();
            CardSummary {
                last_digits: last_digits(card),
                total_spent: spent.round_dp(2),
                // whole hundreds of the exact total, not of the rounded one
                cashback: (spent / CASHBACK_STEP).floor().to_u64().unwrap_or(0),
            }
        })
        .collect()
}

/// The `n` largest expenses by payment amount, largest first.
pub fn top_transactions(ops: &[&Operation], n: usize) -> Vec<TopTransaction> {
    let mut expenses: Vec<(NaiveDateTime, Decimal, &Operation)> = ops
        .iter()
        .filter_map(|op| {
            let amount = op.payment_value().filter(|a| *a < Decimal::ZERO)?;
            Some((op.operation_datetime()?, amount.abs(), *op))
        })
        .collect();

    // stable: equal amounts keep their input order
    expenses.sort_by(|a, b| b.1.cmp(&a.1));

    expenses
        .into_iter()
        .take(n)
        .map(|(date, amount, op)| TopTransaction {
            date: date.format(OPERATION_DATE_FORMAT).to_string(),
            amount: amount.round_dp(2),
            category: op.category.clone(),
            description: op.description.clone(),
            card_last_digits: op.card().map(last_digits).unwrap_or_else(|| "N/A".into()),
        })
        .collect()
}

/// Assemble the summary for `target` (`YYYY-MM-DD HH:MM:SS`) at `hour`.
pub fn build_summary(
    ops: &[Operation],
    target: &str,
    hour: u32,
    currency_rates: Vec<CurrencyRate>,
    stock_prices: Vec<StockPrice>,
) -> Summary {
    let window = filter_by_date(ops, target);
    Summary {
        greeting: greeting(hour),
        cards: card_summary(&window),
        top_transactions: top_transactions(&window, DEFAULT_TOP_N),
        currency_rates,
        stock_prices,
    }
}
