//! Canonical feature schema and input field aliases.
//!
//! The scaler and every model candidate were fit on exactly
//! [`FEATURE_NAMES`] in this order. `Account_Status` and `Activity_Score` are
//! deliberately absent: the former leaks the label through
//! `Days_Since_Last_Transaction`, the latter is not produced by the serving
//! schema this crate targets.

/// Version tag of the feature contract. Bump whenever [`FEATURE_NAMES`] changes.
pub const SCHEMA_VERSION: &str = "churn-features/v2";

/// Suffix carried by categorical slots.
pub const ENCODED_SUFFIX: &str = "_encoded";

/// Ordered feature list expected by the scaler and the model.
pub const FEATURE_NAMES: [&str; 22] = [
    "Customer_Segment_encoded",
    "Gender_encoded",
    "Age",
    "Nationality_encoded",
    "Account_Type_encoded",
    "Branch_encoded",
    "Currency_encoded",
    "Balance",
    "Tenure_Months",
    "Num_Products",
    "Has_Credit_Card",
    "Transaction_Frequency",
    "Average_Transaction_Value",
    "Mobile_Banking_Usage",
    "Branch_Visits",
    "Complaint_History",
    "Account_Age_Months",
    "Days_Since_Last_Transaction",
    "Account_Open_Month",
    "Account_Open_Year",
    "Last_Transaction_Month",
    "Last_Transaction_Year",
];

/// Number of slots in a feature vector.
pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

/// Categorical columns encoded into `<name>_encoded` slots.
pub const CATEGORICAL_FIELDS: [&str; 6] = [
    "Customer_Segment",
    "Gender",
    "Nationality",
    "Account_Type",
    "Branch",
    "Currency",
];

/// Categorical column that is fitted by training but kept out of the vector.
pub const EXCLUDED_CATEGORICAL: &str = "Account_Status";

pub const BALANCE: &str = "Balance";
pub const AVERAGE_TRANSACTION_VALUE: &str = "Average_Transaction_Value";
pub const ACCOUNT_OPEN_DATE: &str = "Account_Open_Date";
pub const LAST_TRANSACTION_DATE: &str = "Last_Transaction_Date";
pub const ACCOUNT_TYPE: &str = "Account_Type";
pub const DAYS_SINCE_LAST_TRANSACTION: &str = "Days_Since_Last_Transaction";

/// Date fields and the `(month, year)` slots derived from each.
pub const DATE_FIELDS: [(&str, &str, &str); 2] = [
    (ACCOUNT_OPEN_DATE, "Account_Open_Month", "Account_Open_Year"),
    (
        LAST_TRANSACTION_DATE,
        "Last_Transaction_Month",
        "Last_Transaction_Year",
    ),
];

/// Canonical field name → accepted input aliases, in priority order.
pub const FIELD_ALIASES: &[(&str, &[&str])] = &[
    ("Age", &["age"]),
    ("Balance", &["balance", " Balance "]),
    (
        "Average_Transaction_Value",
        &[
            "average_transaction_value",
            "averageTransactionValue",
            " Average_Transaction_Value ",
        ],
    ),
    ("Tenure_Months", &["tenure_months", "tenureMonths"]),
    ("Num_Products", &["num_products", "numProducts"]),
    ("Has_Credit_Card", &["has_credit_card", "hasCreditCard"]),
    (
        "Transaction_Frequency",
        &["transaction_frequency", "transactionFrequency"],
    ),
    (
        "Mobile_Banking_Usage",
        &["mobile_banking_usage", "mobileBankingUsage"],
    ),
    ("Branch_Visits", &["branch_visits", "branchVisits"]),
    ("Complaint_History", &["complaint_history", "complaintHistory"]),
    ("Account_Age_Months", &["account_age_months", "accountAgeMonths"]),
    (
        "Days_Since_Last_Transaction",
        &["days_since_last_transaction", "daysSinceLastTransaction"],
    ),
    ("Account_Open_Date", &["account_open_date", "accountOpenDate"]),
    (
        "Last_Transaction_Date",
        &["last_transaction_date", "lastTransactionDate"],
    ),
    ("Customer_Segment", &["customer_segment", "customerSegment", "segment"]),
    ("Gender", &["gender"]),
    ("Nationality", &["nationality"]),
    ("Account_Type", &["account_type", "accountType", "product_type"]),
    ("Branch", &["branch"]),
    ("Currency", &["currency"]),
];

/// Aliases accepted for a canonical field; empty when the field has none.
pub fn aliases_for(canonical: &str) -> &'static [&'static str] {
    FIELD_ALIASES
        .iter()
        .find(|(name, _)| *name == canonical)
        .map(|(_, aliases)| *aliases)
        .unwrap_or(&[])
}

/// Typed default used when an input omits a feature entirely.
pub fn default_value(feature: &str) -> f64 {
    match feature {
        "Age" => 50.0,
        // counts, encodings and monetary fields
        _ => 0.0,
    }
}

/// Base column of a slot: `Gender_encoded` → `Gender`, `Age` → `Age`.
pub fn base_name(feature: &str) -> &str {
    feature.strip_suffix(ENCODED_SUFFIX).unwrap_or(feature)
}

/// Human-readable label: suffix stripped, underscores to spaces, title case.
pub fn display_name(feature: &str) -> String {
    base_name(feature)
        .split('_')
        .filter(|word| !word.is_empty())
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
