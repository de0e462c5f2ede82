// Prompts for the three model calls made per statement

use crate::schema::TransactionCategory;

pub const SYSTEM_PROMPT_TRANSACTIONS: &str = r#"
You are an experienced loan originator and financial analyst.
You help extract structured information from bank statements.
"#;

pub const USER_PROMPT_TRANSACTIONS: &str = r#"
Below is the text of a bank statement. List EVERY transaction on its own line as
comma-separated values in this exact column order:

Date, Description, Value, Deposit, Category

## COLUMN RULES
- **Date**: the transaction month in `YYYY-MM` format.
- **Description**: the transaction description with ALL commas removed.
- **Value**: a positive number with at most one decimal point. No currency symbols, no thousands separators.
- **Deposit**: `YES` if money came into the account, `NO` if it went out.
- **Category**: exactly one label from this list:
{categories}

## OUTPUT RULES
- Respond ONLY with the comma-separated lines.
- No header row, no numbering, no commentary, no code fences.

## STATEMENT
{bank_statement}
"#;

pub const SYSTEM_PROMPT_METADATA: &str = r#"
You are a Bank Statement Metadata Extractor.

## YOUR MISSION
Identify which bank issued the statement, the country it operates in and the
calendar year the statement covers.

## RULES
- `country_code`: ISO 3166 alpha-2 code (e.g. "US", "GB", "MX").
- `bank_name`: the bank's name as printed, without branch details.
- `statement_year`: four digit year. If the statement spans two years, use the later one.
- Use `null` for anything you cannot determine. Do NOT guess.

## OUTPUT FORMAT
Return a single JSON object matching this JSON Schema and nothing else:
{schema}
"#;

pub const USER_PROMPT_METADATA: &str = r#"
Extract the statement metadata from the following content:

{content}
"#;

pub const SYSTEM_PROMPT_RATIONALE: &str = r#"
You are an experienced loan originator and financial analyst. You help decide
whether or not to grant a loan based on an analysis of the applicant's bank statement.
"#;

pub const USER_PROMPT_RATIONALE: &str = r#"
Here is the bank statement analysis for a client. Write a bullet-point list of
reasons to grant a loan, then a bullet-point list of reasons not to.

## RULES
- Only include relevant, strong and useful reasons.
- Back EVERY reason with numbers taken from the analysis.
- Use exactly two headers: "Reasons for:" and "Reasons against:".
- No other text. Do NOT invent facts that are not in the analysis.

## STATEMENT ANALYSIS
{statement_analysis}
"#;

/// Category labels rendered as a bullet list for the transaction prompt.
pub fn category_list() -> String {
    TransactionCategory::ALL
        .iter()
        .map(|c| format!("  - \"{}\"", c.label()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn transactions_prompt(statement_text: &str) -> String {
    USER_PROMPT_TRANSACTIONS
        .replace("{categories}", &category_list())
        .replace("{bank_statement}", statement_text)
}

pub fn metadata_system_prompt(schema_json: &str) -> String {
    SYSTEM_PROMPT_METADATA.replace("{schema}", schema_json)
}

pub fn metadata_prompt(content: &str) -> String {
    USER_PROMPT_METADATA.replace("{content}", content)
}

pub fn rationale_prompt(analysis_json: &str) -> String {
    USER_PROMPT_RATIONALE.replace("{statement_analysis}", analysis_json)
}
