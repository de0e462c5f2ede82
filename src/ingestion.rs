//! Turns the model's comma-separated transaction listing into typed rows.
//!
//! The model is asked for one transaction per line in the order
//! `Date, Description, Value, Deposit, Category`. Its output is parsed
//! tolerantly: lines with too many fields are skipped, and rows that are
//! missing a date, an amount, or the deposit flag are dropped.

use crate::schema::{Transaction, TransactionCategory};
use crate::utils::{parse_amount, parse_transaction_date};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::debug;

pub const EXPECTED_FIELDS: usize = 5;

/// One line of model output before any cleanup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTransactionRow {
    pub date: Option<String>,
    pub description: Option<String>,
    pub amount: Option<String>,
    pub deposit: Option<String>,
    pub category: Option<String>,
}

impl RawTransactionRow {
    fn from_record(record: &StringRecord) -> Self {
        let field = |idx: usize| {
            record
                .get(idx)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        Self {
            date: field(0),
            description: field(1),
            amount: field(2),
            deposit: field(3),
            category: field(4),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub lines_read: usize,
    /// Lines rejected by the reader (too many fields or malformed quoting).
    pub lines_skipped: usize,
    /// Rows parsed but dropped for a missing date, amount or deposit flag.
    pub rows_dropped: usize,
    pub transactions: usize,
}

pub fn parse_transaction_rows(text: &str) -> (Vec<RawTransactionRow>, ParseReport) {
    let mut report = ParseReport::default();

    let body: String = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(body.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        report.lines_read += 1;
        match record {
            Ok(record) if record.len() <= EXPECTED_FIELDS => {
                rows.push(RawTransactionRow::from_record(&record));
            }
            _ => report.lines_skipped += 1,
        }
    }

    (rows, report)
}

/// Cleans raw rows into signed, categorised transactions.
///
/// Deposits flagged `YES` become positive, any other flag negative. A missing
/// category becomes `Other`.
pub fn preprocess_rows(rows: &[RawTransactionRow]) -> (Vec<Transaction>, usize) {
    let mut dropped = 0;
    let mut transactions = Vec::with_capacity(rows.len());

    for row in rows {
        let date = row.date.as_deref().and_then(parse_transaction_date);
        let amount = row.amount.as_deref().and_then(parse_amount);
        let deposit = row.deposit.as_deref().map(is_deposit_flag);

        let (Some(date), Some(amount), Some(is_deposit)) = (date, amount, deposit) else {
            dropped += 1;
            continue;
        };

        let signed = if is_deposit { amount.abs() } else { -amount.abs() };
        let category = row
            .category
            .as_deref()
            .map(TransactionCategory::from_label)
            .unwrap_or(TransactionCategory::Other);

        transactions.push(Transaction {
            date: Some(date),
            description: row.description.clone(),
            amount: Some(signed),
            category: Some(category),
        });
    }

    (transactions, dropped)
}

fn is_deposit_flag(raw: &str) -> bool {
    raw.trim().trim_matches('"').eq_ignore_ascii_case("yes")
}

/// Parses and cleans model output in one step.
pub fn transactions_from_text(text: &str) -> (Vec<Transaction>, ParseReport) {
    let (rows, mut report) = parse_transaction_rows(text);
    let (transactions, dropped) = preprocess_rows(&rows);
    report.rows_dropped = dropped;
    report.transactions = transactions.len();

    debug!(
        "Parsed transaction text: {} lines, {} skipped, {} dropped, {} kept",
        report.lines_read, report.lines_skipped, report.rows_dropped, report.transactions
    );

    (transactions, report)
}
