//! Category spending report and the step that renders any report to a
//! JSON file.

use crate::errors::Result;
use crate::models::{CategorySpend, Operation, is_four_digit_year};
use anyhow::{Context, bail};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Layout of the optional report end date.
pub const REPORT_DATE_FORMAT: &str = "%d.%m.%Y";

/// Length of the spending window.
pub const WINDOW_DAYS: i64 = 90;

/// End of the reporting window: midnight of `date` (`DD.MM.YYYY`), or
/// `now` when no date is given.
pub fn report_end(date: Option<&str>, now: NaiveDateTime) -> Result<NaiveDateTime> {
    match date {
        Some(d) => {
            let year = d.trim().rsplit('.').next().unwrap_or_default();
            if !is_four_digit_year(year) {
                bail!("report date {d:?} is not DD.MM.YYYY");
            }
            let day = NaiveDate::parse_from_str(d.trim(), REPORT_DATE_FORMAT)
                .with_context(|| format!("report date {d:?} is not DD.MM.YYYY"))?;
            Ok(day.and_time(chrono::NaiveTime::MIN))
        }
        None => Ok(now),
    }
}

/// Expenses in `category` during the [`WINDOW_DAYS`] days up to `end`,
/// newest first.
///
/// Rows with an unreadable date or amount never match.
pub fn spending_by_category(ops: &[Operation], category: &str, end: NaiveDateTime) -> Vec<CategorySpend> {
    let start = end
        .checked_sub_signed(Duration::days(WINDOW_DAYS))
        .unwrap_or(NaiveDateTime::MIN);

    let mut rows: Vec<CategorySpend> = ops
        .iter()
        .filter(|op| op.category.as_deref() == Some(category))
        .filter_map(|op| {
            let date = op.operation_datetime().filter(|d| *d >= start && *d <= end)?;
            let amount = op.operation_value().filter(|a| *a < Decimal::ZERO)?;
            Some(CategorySpend {
                operation_date: date,
                card_number: op.card_number.clone(),
                operation_amount: amount,
                payment_amount: op.payment_amount.clone(),
                category: category.to_owned(),
                description: op.description.clone(),
            })
        })
        .collect();

    rows.sort_by(|a, b| b.operation_date.cmp(&a.operation_date));

    if rows.is_empty() {
        info!("No spending in category '{category}' over the last 3 months");
    } else {
        let total: Decimal = rows.iter().map(|r| r.operation_amount).sum();
        info!(
            "Spent {:.2} RUB in category '{category}' over the last 3 months ({} operations)",
            total.abs(),
            rows.len()
        );
    }
    rows
}

/// How the report file is named.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportNaming {
    /// This path, with `.json` appended when missing.
    Fixed(PathBuf),
    /// `{report_name}_{YYYYmmdd_HHMMSS}.json` in the given directory.
    Generated(PathBuf),
}

impl ReportNaming {
    pub fn resolve(&self, report_name: &str, at: NaiveDateTime) -> PathBuf {
        match self {
            ReportNaming::Fixed(p) if p.extension().is_some_and(|e| e == "json") => p.clone(),
            ReportNaming::Fixed(p) => {
                let mut s = p.clone().into_os_string();
                s.push(".json");
                PathBuf::from(s)
            }
            ReportNaming::Generated(dir) => {
                dir.join(format!("{report_name}_{}.json", at.format("%Y%m%d_%H%M%S")))
            }
        }
    }
}

/// Wrap `data` with its report metadata.
///
/// Datetimes inside `data` come out as ISO-8601 strings through their
/// `Serialize` impls; a non-collection result is nested as `{"result": ..}`.
pub fn render_report<T: Serialize>(report_name: &str, data: &T, generated_at: NaiveDateTime) -> Result<Value> {
    let data = serde_json::to_value(data).context("serialize report data")?;
    let data = match data {
        Value::Array(_) | Value::Object(_) => data,
        other => json!({ "result": other }),
    };
    Ok(json!({
        "report_name": report_name,
        "generated_at": generated_at,
        "data": data,
    }))
}

/// Render and write a report, returning the path written.
pub fn write_report<T: Serialize>(
    report_name: &str,
    data: &T,
    naming: &ReportNaming,
    generated_at: NaiveDateTime,
) -> Result<PathBuf> {
    let path = naming.resolve(report_name, generated_at);
    let doc = render_report(report_name, data, generated_at)?;
    write_json(&path, &doc)?;
    info!("Report saved to {}", path.display());
    Ok(path)
}

fn write_json(path: &Path, doc: &Value) -> Result<()> {
    let text = serde_json::to_string_pretty(doc).context("serialize report")?;
    fs::write(path, text).with_context(|| format!("write {}", path.display()))
}
