use crate::utils::parse_transaction_date;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Category labels offered to the model when it classifies a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum TransactionCategory {
    #[serde(rename = "Deposits - Salary Paycheck")]
    SalaryPaycheck,
    #[serde(rename = "Deposits - Transfers In")]
    TransfersIn,
    #[serde(rename = "Withdrawals - Cash Withdrawals ATM")]
    CashWithdrawalsAtm,
    #[serde(rename = "Withdrawals - Transfers Out")]
    TransfersOut,
    #[serde(rename = "Payments - Mortgage")]
    Mortgage,
    #[serde(rename = "Payments - Rent")]
    Rent,
    #[serde(rename = "Payments - Utility Bills")]
    UtilityBills,
    #[serde(rename = "Payments - Loan Payments")]
    LoanPayments,
    #[serde(rename = "Payments - Credit Card Payments")]
    CreditCardPayments,
    #[serde(rename = "Payments - Insurance Premiums")]
    InsurancePremiums,
    #[serde(rename = "Purchases - Groceries Food")]
    Groceries,
    #[serde(rename = "Purchases - Dining Restaurants")]
    Dining,
    #[serde(rename = "Purchases - Retail Clothing")]
    RetailClothing,
    #[serde(rename = "Purchases - Gas Fuel")]
    GasFuel,
    #[serde(rename = "Investments - Stock Bond Purchases")]
    StockBondPurchases,
    #[serde(rename = "Investments - Retirement Account Contributions")]
    RetirementContributions,
    #[serde(rename = "Fees Charges - Account Maintenance Fees")]
    MaintenanceFees,
    #[serde(rename = "Fees Charges - Overdraft Fees")]
    OverdraftFees,
    #[serde(rename = "Other")]
    Other,
}

impl TransactionCategory {
    pub const ALL: [TransactionCategory; 19] = [
        Self::SalaryPaycheck,
        Self::TransfersIn,
        Self::CashWithdrawalsAtm,
        Self::TransfersOut,
        Self::Mortgage,
        Self::Rent,
        Self::UtilityBills,
        Self::LoanPayments,
        Self::CreditCardPayments,
        Self::InsurancePremiums,
        Self::Groceries,
        Self::Dining,
        Self::RetailClothing,
        Self::GasFuel,
        Self::StockBondPurchases,
        Self::RetirementContributions,
        Self::MaintenanceFees,
        Self::OverdraftFees,
        Self::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::SalaryPaycheck => "Deposits - Salary Paycheck",
            Self::TransfersIn => "Deposits - Transfers In",
            Self::CashWithdrawalsAtm => "Withdrawals - Cash Withdrawals ATM",
            Self::TransfersOut => "Withdrawals - Transfers Out",
            Self::Mortgage => "Payments - Mortgage",
            Self::Rent => "Payments - Rent",
            Self::UtilityBills => "Payments - Utility Bills",
            Self::LoanPayments => "Payments - Loan Payments",
            Self::CreditCardPayments => "Payments - Credit Card Payments",
            Self::InsurancePremiums => "Payments - Insurance Premiums",
            Self::Groceries => "Purchases - Groceries Food",
            Self::Dining => "Purchases - Dining Restaurants",
            Self::RetailClothing => "Purchases - Retail Clothing",
            Self::GasFuel => "Purchases - Gas Fuel",
            Self::StockBondPurchases => "Investments - Stock Bond Purchases",
            Self::RetirementContributions => "Investments - Retirement Account Contributions",
            Self::MaintenanceFees => "Fees Charges - Account Maintenance Fees",
            Self::OverdraftFees => "Fees Charges - Overdraft Fees",
            Self::Other => "Other",
        }
    }

    /// Maps a free-form label to a category. Matching ignores case, spacing
    /// and quotes; anything unrecognised becomes `Other`.
    pub fn from_label(raw: &str) -> Self {
        let wanted = normalize_label(raw);
        if wanted.is_empty() {
            return Self::Other;
        }
        Self::ALL
            .iter()
            .copied()
            .find(|c| normalize_label(c.label()) == wanted)
            .unwrap_or(Self::Other)
    }
}

fn normalize_label(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

impl From<String> for TransactionCategory {
    fn from(value: String) -> Self {
        Self::from_label(&value)
    }
}

impl fmt::Display for TransactionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single ledger line extracted from a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Older documents store the month only (`YYYY-MM`); it reads as the 1st.
    #[serde(rename = "Date", default, deserialize_with = "deserialize_lenient_date")]
    pub date: Option<NaiveDate>,

    #[serde(
        rename = "Description",
        alias = "Transaction Details",
        alias = "Transaction_Details",
        default
    )]
    pub description: Option<String>,

    /// Signed: deposits positive, withdrawals negative.
    #[serde(rename = "Amount", default)]
    pub amount: Option<f64>,

    #[serde(rename = "Category", default)]
    pub category: Option<TransactionCategory>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MonthlySummary {
    #[serde(default)]
    pub total_deposits: Option<f64>,
    #[serde(default)]
    pub total_withdrawals: Option<f64>,
    #[serde(default)]
    pub average_balance: Option<f64>,
    /// Deposits plus (negative) withdrawals.
    #[serde(default)]
    pub net_savings: Option<f64>,
    #[serde(default)]
    pub rent_mortgage_payments: Option<f64>,
    #[serde(default)]
    pub utility_payments: Option<f64>,
    #[serde(default)]
    pub loan_payments: Option<f64>,
    #[serde(default)]
    pub rent_mortgage_to_income_ratio: Option<f64>,
    #[serde(default)]
    pub utilities_to_income_ratio: Option<f64>,
    #[serde(default)]
    pub loan_to_income_ratio: Option<f64>,
    /// Calendar month in `YYYY-MM` form.
    #[serde(rename = "YearMonth", default)]
    pub year_month: Option<String>,
}

/// Statement-level facts the model reads off the extracted transactions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct StatementMetadata {
    #[serde(alias = "country_code_iso_3166_standard", default)]
    #[schemars(description = "Country of the issuing bank as an ISO 3166 alpha-2 code, e.g. 'US', 'GB', 'MX'")]
    pub country_code: Option<String>,

    #[serde(default)]
    #[schemars(description = "Name of the bank that issued the statement")]
    pub bank_name: Option<String>,

    #[serde(default, deserialize_with = "deserialize_lenient_year")]
    #[schemars(description = "Four digit calendar year the statement covers")]
    pub statement_year: Option<i32>,
}

impl StatementMetadata {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(StatementMetadata)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

/// Output of PDF processing: metadata plus the cleaned transaction table.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementData {
    pub metadata: StatementMetadata,
    pub statement_pdf_blob: String,
    pub transactions: Vec<Transaction>,
}

/// Aggregated financial profile of one statement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatementAnalysis {
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_year")]
    pub statement_year: Option<i32>,
    /// Object name of the statement PDF in blob storage.
    #[serde(default)]
    pub statement_pdf_blob: Option<String>,
    #[serde(default)]
    pub monthly_deposit_mean: Option<f64>,
    #[serde(default)]
    pub monthly_withdrawal_mean: Option<f64>,
    #[serde(default)]
    pub monthly_rent_mean: Option<f64>,
    #[serde(default)]
    pub monthly_utilities_mean: Option<f64>,
    #[serde(default)]
    pub monthly_loan_payment_mean: Option<f64>,
    #[serde(default)]
    pub monthly_balance_mean: Option<f64>,
    #[serde(default)]
    pub monthly_summary: Vec<MonthlySummary>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    /// Reasons for and against lending, written by the model.
    #[serde(default)]
    pub for_against: Option<String>,
    /// `true` grants the loan. Older documents store this as `1`/`0`.
    #[serde(default, deserialize_with = "deserialize_loan_decision")]
    pub loan_decision: Option<bool>,
}

/// Pointer document in the `training` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub statement_ref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanPredictionResponse {
    pub statement_analysis: StatementAnalysis,
    pub statement_analysis_ref: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

fn deserialize_loan_decision<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<FlagValue>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        FlagValue::Bool(b) => Some(b),
        FlagValue::Int(i) => Some(i != 0),
        FlagValue::Float(f) => Some(f != 0.0),
        FlagValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" | "approve" => Some(true),
            "false" | "no" | "0" | "deny" => Some(false),
            _ => None,
        },
    }))
}

fn deserialize_lenient_date<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<FlagValue>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        FlagValue::Text(s) => parse_transaction_date(&s),
        _ => None,
    }))
}

fn deserialize_lenient_year<'de, D>(deserializer: D) -> std::result::Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<FlagValue>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        FlagValue::Int(i) => i32::try_from(i).ok(),
        FlagValue::Float(f) if f.fract() == 0.0 => Some(f as i32),
        FlagValue::Text(s) => s.trim().parse().ok(),
        _ => None,
    }))
}
