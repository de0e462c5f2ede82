use crate::schema::{
    MonthlySummary, StatementAnalysis, StatementData, Transaction, TransactionCategory,
};
use crate::utils::{finite, first_day_of_month, mean, month_key};
use chrono::Datelike;
use log::debug;
use std::collections::BTreeMap;

/// Running totals for one calendar month.
#[derive(Debug, Default)]
struct MonthBucket {
    deposits: f64,
    withdrawals: f64,
    amount_sum: f64,
    count: usize,
    rent_mortgage: f64,
    utilities: f64,
    loans: f64,
}

impl MonthBucket {
    fn add(&mut self, amount: f64, category: TransactionCategory) {
        if amount > 0.0 {
            self.deposits += amount;
        } else if amount < 0.0 {
            self.withdrawals += amount;
        }
        self.amount_sum += amount;
        self.count += 1;

        match category {
            TransactionCategory::Rent | TransactionCategory::Mortgage => {
                self.rent_mortgage += amount
            }
            TransactionCategory::UtilityBills => self.utilities += amount,
            TransactionCategory::LoanPayments => self.loans += amount,
            _ => {}
        }
    }

    fn into_summary(self, year: i32, month: u32) -> MonthlySummary {
        let average = if self.count == 0 {
            None
        } else {
            finite(self.amount_sum / self.count as f64)
        };

        MonthlySummary {
            total_deposits: finite(self.deposits),
            total_withdrawals: finite(self.withdrawals),
            average_balance: average,
            net_savings: finite(self.deposits + self.withdrawals),
            rent_mortgage_payments: finite(self.rent_mortgage),
            utility_payments: finite(self.utilities),
            loan_payments: finite(self.loans),
            rent_mortgage_to_income_ratio: income_ratio(self.rent_mortgage, self.deposits),
            utilities_to_income_ratio: income_ratio(self.utilities, self.deposits),
            loan_to_income_ratio: income_ratio(self.loans, self.deposits),
            year_month: first_day_of_month(year, month).map(month_key),
        }
    }
}

/// |payments| / income, undefined when there is no positive income.
pub fn income_ratio(payments: f64, income: f64) -> Option<f64> {
    if income > 0.0 && income.is_finite() {
        finite(payments.abs() / income)
    } else {
        None
    }
}

/// Buckets transactions by calendar month, oldest first.
///
/// Transactions without a date or amount are ignored; a missing category
/// counts as `Other`.
pub fn summarize_months(transactions: &[Transaction]) -> Vec<MonthlySummary> {
    let mut buckets: BTreeMap<(i32, u32), MonthBucket> = BTreeMap::new();

    for tx in transactions {
        let (Some(date), Some(amount)) = (tx.date, tx.amount) else {
            continue;
        };
        if !amount.is_finite() {
            continue;
        }
        buckets
            .entry((date.year(), date.month()))
            .or_default()
            .add(amount, tx.category.unwrap_or(TransactionCategory::Other));
    }

    buckets
        .into_iter()
        .map(|((year, month), bucket)| bucket.into_summary(year, month))
        .collect()
}

/// Statement-level means across all months.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MonthlyMeans {
    pub deposit: Option<f64>,
    pub withdrawal: Option<f64>,
    pub rent: Option<f64>,
    pub utilities: Option<f64>,
    pub loan_payment: Option<f64>,
    pub balance: Option<f64>,
}

pub fn monthly_means(summaries: &[MonthlySummary]) -> MonthlyMeans {
    MonthlyMeans {
        deposit: mean(summaries.iter().map(|m| m.total_deposits)),
        withdrawal: mean(summaries.iter().map(|m| m.total_withdrawals)),
        rent: mean(summaries.iter().map(|m| m.rent_mortgage_payments)),
        utilities: mean(summaries.iter().map(|m| m.utility_payments)),
        loan_payment: mean(summaries.iter().map(|m| m.loan_payments)),
        balance: mean(summaries.iter().map(|m| m.average_balance)),
    }
}

/// Builds the analysis for a processed statement. The rationale and loan
/// decision are left empty for the caller to fill in.
pub fn build_statement_analysis(data: &StatementData) -> StatementAnalysis {
    let monthly_summary = summarize_months(&data.transactions);
    let means = monthly_means(&monthly_summary);

    debug!(
        "Aggregated {} transactions into {} months for {}",
        data.transactions.len(),
        monthly_summary.len(),
        data.statement_pdf_blob
    );

    StatementAnalysis {
        country_code: data.metadata.country_code.clone(),
        bank_name: data.metadata.bank_name.clone(),
        statement_year: data.metadata.statement_year,
        statement_pdf_blob: Some(data.statement_pdf_blob.clone()),
        monthly_deposit_mean: means.deposit,
        monthly_withdrawal_mean: means.withdrawal,
        monthly_rent_mean: means.rent,
        monthly_utilities_mean: means.utilities,
        monthly_loan_payment_mean: means.loan_payment,
        monthly_balance_mean: means.balance,
        monthly_summary,
        transactions: data.transactions.clone(),
        for_against: None,
        loan_decision: None,
    }
}

/// Month keys covered by a statement, in order.
pub fn covered_months(analysis: &StatementAnalysis) -> Vec<String> {
    let mut months: Vec<String> = analysis
        .transactions
        .iter()
        .filter_map(|tx| tx.date.map(month_key))
        .collect();
    months.sort();
    months.dedup();
    months
}
