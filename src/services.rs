//! Round-up savings ("investment bank") calculator.
//!
//! Every debit of the selected month is rounded up to the next multiple
//! of `limit`; the differences are what would have landed in the savings
//! pot. The calculator never fails: malformed requests yield `0.00` and
//! malformed rows contribute nothing.

use crate::models::{Operation, is_four_digit_year, parse_operation_date};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

/// A validated `YYYY-MM` month key.
///
/// Rows are matched by comparing their formatted year-month with the key
/// *as written*, so `"2021-1"` passes validation but never matches
/// `"2021-01"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthKey(String);

impl MonthKey {
    /// Accepts `YYYY-MM` only: four-digit year, no day, no time, month
    /// in `1..=12`.
    pub fn parse(month: &str) -> Option<Self> {
        let year = month.split('-').next().unwrap_or_default();
        if !is_four_digit_year(year) {
            return None;
        }
        NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
            .ok()
            .map(|_| MonthKey(month.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn matches(&self, year_month: &str) -> bool {
        self.0 == year_month
    }
}

/// Amount by which `abs_amount` falls short of the next multiple of
/// `limit`; zero for exact multiples, `None` on overflow.
fn round_up_delta(abs_amount: Decimal, limit: Decimal) -> Option<Decimal> {
    let rounded = abs_amount.checked_div(limit)?.ceil().checked_mul(limit)?;
    rounded.checked_sub(abs_amount)
}

/// Sum of round-up deltas for every debit in `month`, rounded to 2 dp.
///
/// * `month` must be `YYYY-MM`; anything else returns `0.00` without
///   looking at a single row.
/// * `limit <= 0` returns `0.00` the same way.
/// * Rows missing a date or amount, with a date not in
///   `DD.MM.YYYY HH:MM:SS`, or with a non-numeric amount are skipped.
/// * Credits (`amount >= 0`) never round up.
///
/// ```rust
/// use opsight::{Operation, investment_bank};
/// use rust_decimal_macros::dec;
///
/// let ops = [Operation::new("30.12.2021 17:50:30", dec!(-160.89))];
/// assert_eq!(investment_bank("2021-12", &ops, dec!(10)), dec!(9.11));
/// ```
pub fn investment_bank(month: &str, transactions: &[Operation], limit: Decimal) -> Decimal {
    let Some(key) = MonthKey::parse(month) else {
        error!(month, "invalid month, expected YYYY-MM");
        return Decimal::ZERO;
    };

    if limit <= Decimal::ZERO {
        warn!(%limit, "rounding limit must be positive");
        return Decimal::ZERO;
    }

    let mut total = Decimal::ZERO;

    for (idx, tx) in transactions.iter().enumerate() {
        let (Some(date), Some(raw_amount)) = (&tx.operation_date, &tx.operation_amount) else {
            warn!(row = idx, "operation lacks date or amount");
            continue;
        };

        let op_date = match parse_operation_date(date) {
            Ok(d) => d,
            Err(e) => {
                warn!(row = idx, date = %date, %e, "unparseable operation date");
                continue;
            }
        };

        if !key.matches(&op_date.format("%Y-%m").to_string()) {
            continue;
        }

        let Some(amount) = raw_amount.coerce() else {
            warn!(row = idx, amount = ?raw_amount, "non-numeric operation amount");
            continue;
        };
        if amount >= Decimal::ZERO {
            continue; // only debits round up
        }

        let abs_amount = amount.abs();
        let Some(delta) = round_up_delta(abs_amount, limit) else {
            warn!(row = idx, %abs_amount, %limit, "round-up overflowed");
            continue;
        };

        if delta > Decimal::ZERO {
            match total.checked_add(delta) {
                Some(t) => total = t,
                None => {
                    warn!(row = idx, %delta, "running total overflowed");
                    continue;
                }
            }
            debug!(date = %op_date.date(), %abs_amount, %delta, "rounded up");
        }
    }

    let total = total.round_dp(2);
    info!(month = key.as_str(), %limit, %total, "round-up savings computed");
    total
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawAmount;
    use rust_decimal_macros::dec;

    fn sample() -> Vec<Operation> {
        vec![
            Operation::new("30.12.2021 17:50:30", dec!(-160.89)),
            Operation::new("30.12.2021 17:50:17", dec!(-64.00)),
            Operation::new("15.12.2021 09:00:00", dec!(-349.00)),
            Operation::new("05.11.2021 10:00:00", dec!(-200.00)),
        ]
    }

    #[test]
    fn rounds_up_to_each_limit() {
        let ops = sample();
        assert_eq!(investment_bank("2021-12", &ops, dec!(10)), dec!(16.11));
        assert_eq!(investment_bank("2021-12", &ops, dec!(50)), dec!(76.11));
        assert_eq!(investment_bank("2021-12", &ops, dec!(100)), dec!(126.11));
        assert_eq!(investment_bank("2021-12", &ops, dec!(1000)), dec!(2426.11));
    }

    #[test]
    fn other_months_contribute_nothing() {
        let ops = sample();
        // the only November debit is an exact multiple of 10
        assert_eq!(investment_bank("2021-11", &ops, dec!(10)), dec!(0));
        assert_eq!(investment_bank("2021-11", &ops, dec!(300)), dec!(100));
        assert_eq!(investment_bank("2022-01", &ops, dec!(10)), dec!(0));
    }

    #[test]
    fn credits_never_round_up() {
        let ops = vec![
            Operation::new("30.12.2021 17:50:30", dec!(5046.00)),
            Operation::new("30.12.2021 17:50:17", dec!(174000.00)),
            Operation::new("30.12.2021 17:50:17", dec!(0)),
        ];
        assert_eq!(investment_bank("2021-12", &ops, dec!(10)), dec!(0));
    }

    #[test]
    fn exact_multiples_contribute_zero() {
        let ops = vec![Operation::new("01.12.2021 00:00:00", dec!(-350))];
        assert_eq!(investment_bank("2021-12", &ops, dec!(50)), dec!(0));
        assert_eq!(investment_bank("2021-12", &ops, dec!(7)), dec!(0));
    }

    #[test]
    fn fractional_limits_work() {
        let ops = vec![Operation::new("01.12.2021 12:00:00", dec!(-1.23))];
        assert_eq!(investment_bank("2021-12", &ops, dec!(0.5)), dec!(0.27));
    }

    #[test]
    fn invalid_months_short_circuit() {
        let ops = sample();
        for month in ["2021", "2021-13", "декабрь 2021", "2021/12", "", "2021-12-01", "12-2021"] {
            assert_eq!(investment_bank(month, &ops, dec!(10)), dec!(0), "{month:?}");
        }
    }

    #[test]
    fn non_positive_limits_short_circuit() {
        let ops = sample();
        assert_eq!(investment_bank("2021-12", &ops, dec!(0)), dec!(0));
        assert_eq!(investment_bank("2021-12", &ops, dec!(-10)), dec!(0));
    }

    #[test]
    fn empty_input_yields_zero() {
        assert_eq!(investment_bank("2021-12", &[], dec!(10)), dec!(0));
    }

    #[test]
    fn malformed_rows_are_skipped_not_fatal() {
        let mut ops = vec![
            Operation {
                operation_date: Some("30.12.2021 17:50:30".into()),
                ..Operation::default()
            },
            Operation {
                operation_amount: Some(dec!(-10.5).into()),
                ..Operation::default()
            },
            Operation::new("2021-12-30 17:50:30", dec!(-10.5)),
            Operation::new("30.12.2021", dec!(-10.5)),
            Operation::new("31.12.2021 10:00:00", "not a number"),
            Operation::new("31.12.2021 10:00:00", RawAmount::Text(String::new())),
        ];
        assert_eq!(investment_bank("2021-12", &ops, dec!(10)), dec!(0));

        ops.extend(sample());
        assert_eq!(investment_bank("2021-12", &ops, dec!(10)), dec!(16.11));
    }

    #[test]
    fn loosely_written_dates_are_skipped() {
        let ops = vec![
            Operation::new(" 30.12.2021 17:50:30", dec!(-160.89)),
            Operation::new("30.12.2021 17:50:30 ", dec!(-160.89)),
        ];
        assert_eq!(investment_bank("2021-12", &ops, dec!(10)), dec!(0));

        // a two-digit year would otherwise read as year 21
        let ops = vec![Operation::new("30.12.21 17:50:30", dec!(-160.89))];
        assert_eq!(investment_bank("0021-12", &ops, dec!(10)), dec!(0));
        assert_eq!(investment_bank("21-12", &ops, dec!(10)), dec!(0));
    }

    #[test]
    fn total_is_rounded_once_at_the_end() {
        // each delta is 0.005; rounding per row (half to even) would give 0.00
        let ops = vec![
            Operation::new("01.12.2021 10:00:00", dec!(-0.005)),
            Operation::new("02.12.2021 10:00:00", dec!(-0.005)),
        ];
        assert_eq!(investment_bank("2021-12", &ops, dec!(0.01)), dec!(0.01));
    }

    #[test]
    fn string_amounts_are_coerced() {
        let ops = vec![
            Operation::new("30.12.2021 17:50:30", "-160.89"),
            Operation::new("30.12.2021 17:50:17", " -64 "),
        ];
        assert_eq!(investment_bank("2021-12", &ops, dec!(10)), dec!(15.11));
    }

    #[test]
    fn huge_amounts_do_not_panic() {
        let ops = vec![
            Operation::new("01.12.2021 00:00:00", Decimal::MIN),
            Operation::new("01.12.2021 00:00:00", dec!(-1.5)),
        ];
        assert_eq!(investment_bank("2021-12", &ops, dec!(0.0000001)), dec!(0));
        let got = investment_bank("2021-12", &ops, Decimal::MAX);
        assert!(got >= Decimal::ZERO);
    }

    #[test]
    fn month_key_keeps_text_as_written() {
        assert!(MonthKey::parse("2021-12").is_some());
        assert!(MonthKey::parse("2021-12-01").is_none());
        assert!(MonthKey::parse("2021-00").is_none());
        assert!(MonthKey::parse("21-12").is_none());
        assert!(MonthKey::parse("+2021-12").is_none());
        let ops = vec![Operation::new("05.01.2021 10:00:00", dec!(-1))];
        // validates, but "2021-1" never equals a formatted "2021-01"
        assert_eq!(investment_bank("2021-1", &ops, dec!(10)), dec!(0));
        assert_eq!(investment_bank("2021-01", &ops, dec!(10)), dec!(9));
    }
}
