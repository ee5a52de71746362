use crate::error::{ConfigurationError, Result};
use crate::utils::column_index;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum StatementType {
    #[serde(rename = "cashflow", alias = "CashFlow")]
    #[schemars(description = "Cash flow statement: inflows, outflows and the opening/closing cash balance")]
    CashFlow,

    #[serde(rename = "pnl", alias = "ProfitAndLoss")]
    #[schemars(description = "Profit & loss statement: revenue, cost of goods sold, operating expenses and results")]
    ProfitAndLoss,
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementType::CashFlow => write!(f, "cash flow"),
            StatementType::ProfitAndLoss => write!(f, "profit & loss"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    #[schemars(description = "Values in the sheet are stated as-is")]
    Normal,

    #[schemars(description = "Values in the sheet are stated in thousands")]
    Thousands,

    #[schemars(description = "Values in the sheet are stated in millions")]
    Millions,
}

impl Units {
    pub fn multiplier(self) -> f64 {
        match self {
            Units::Normal => 1.0,
            Units::Thousands => 1_000.0,
            Units::Millions => 1_000_000.0,
        }
    }
}

/// Named single-row fields a configuration can map.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub enum DataRowField {
    TotalRevenue,
    Cogs,
    GrossProfit,
    TotalOpex,
    Ebitda,
    Depreciation,
    OperatingIncome,
    TotalOtherIncome,
    TotalOtherExpenses,
    InterestExpense,
    TotalTaxes,
    NetIncome,
    InitialBalance,
    TotalInflows,
    TotalOutflows,
    NetCashFlow,
    FinalBalance,
    LowestBalance,
}

impl DataRowField {
    /// Display label. Fixed per field, never read from the sheet.
    pub fn label(self) -> &'static str {
        match self {
            DataRowField::TotalRevenue => "Total Revenue",
            DataRowField::Cogs => "Cost of Goods Sold",
            DataRowField::GrossProfit => "Gross Profit",
            DataRowField::TotalOpex => "Total Operating Expenses",
            DataRowField::Ebitda => "EBITDA",
            DataRowField::Depreciation => "Depreciation & Amortization",
            DataRowField::OperatingIncome => "Operating Income",
            DataRowField::TotalOtherIncome => "Other Income",
            DataRowField::TotalOtherExpenses => "Other Expenses",
            DataRowField::InterestExpense => "Interest Expense",
            DataRowField::TotalTaxes => "Taxes",
            DataRowField::NetIncome => "Net Income",
            DataRowField::InitialBalance => "Initial Balance",
            DataRowField::TotalInflows => "Total Inflows",
            DataRowField::TotalOutflows => "Total Outflows",
            DataRowField::NetCashFlow => "Net Cash Flow",
            DataRowField::FinalBalance => "Final Balance",
            DataRowField::LowestBalance => "Lowest Balance",
        }
    }

    /// Key used in JSON documents and diagnostics (`totalRevenue`, `cogs`, ...).
    pub fn key(self) -> &'static str {
        match self {
            DataRowField::TotalRevenue => "totalRevenue",
            DataRowField::Cogs => "cogs",
            DataRowField::GrossProfit => "grossProfit",
            DataRowField::TotalOpex => "totalOpex",
            DataRowField::Ebitda => "ebitda",
            DataRowField::Depreciation => "depreciation",
            DataRowField::OperatingIncome => "operatingIncome",
            DataRowField::TotalOtherIncome => "totalOtherIncome",
            DataRowField::TotalOtherExpenses => "totalOtherExpenses",
            DataRowField::InterestExpense => "interestExpense",
            DataRowField::TotalTaxes => "totalTaxes",
            DataRowField::NetIncome => "netIncome",
            DataRowField::InitialBalance => "initialBalance",
            DataRowField::TotalInflows => "totalInflows",
            DataRowField::TotalOutflows => "totalOutflows",
            DataRowField::NetCashFlow => "netCashFlow",
            DataRowField::FinalBalance => "finalBalance",
            DataRowField::LowestBalance => "lowestBalance",
        }
    }

    pub fn statement_type(self) -> StatementType {
        match self {
            DataRowField::InitialBalance
            | DataRowField::TotalInflows
            | DataRowField::TotalOutflows
            | DataRowField::NetCashFlow
            | DataRowField::FinalBalance
            | DataRowField::LowestBalance => StatementType::CashFlow,
            _ => StatementType::ProfitAndLoss,
        }
    }
}

impl fmt::Display for DataRowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub enum CategoryGroupName {
    Inflows,
    Outflows,
    Revenue,
    Cogs,
    Opex,
    OtherIncome,
    OtherExpenses,
    Taxes,
}

impl CategoryGroupName {
    pub fn key(self) -> &'static str {
        match self {
            CategoryGroupName::Inflows => "inflows",
            CategoryGroupName::Outflows => "outflows",
            CategoryGroupName::Revenue => "revenue",
            CategoryGroupName::Cogs => "cogs",
            CategoryGroupName::Opex => "opex",
            CategoryGroupName::OtherIncome => "otherIncome",
            CategoryGroupName::OtherExpenses => "otherExpenses",
            CategoryGroupName::Taxes => "taxes",
        }
    }

    /// The data row that states this group's total.
    pub fn total_field(self) -> DataRowField {
        match self {
            CategoryGroupName::Inflows => DataRowField::TotalInflows,
            CategoryGroupName::Outflows => DataRowField::TotalOutflows,
            CategoryGroupName::Revenue => DataRowField::TotalRevenue,
            CategoryGroupName::Cogs => DataRowField::Cogs,
            CategoryGroupName::Opex => DataRowField::TotalOpex,
            CategoryGroupName::OtherIncome => DataRowField::TotalOtherIncome,
            CategoryGroupName::OtherExpenses => DataRowField::TotalOtherExpenses,
            CategoryGroupName::Taxes => DataRowField::TotalTaxes,
        }
    }

    /// P&L groups a configuration may leave out entirely.
    pub fn is_optional(self) -> bool {
        matches!(
            self,
            CategoryGroupName::OtherIncome
                | CategoryGroupName::OtherExpenses
                | CategoryGroupName::Taxes
        )
    }

    /// Groups whose total row must be mapped as soon as they hold categories.
    pub fn requires_total(self) -> bool {
        matches!(
            self,
            CategoryGroupName::Inflows
                | CategoryGroupName::Outflows
                | CategoryGroupName::Revenue
                | CategoryGroupName::Cogs
                | CategoryGroupName::Opex
        )
    }
}

impl fmt::Display for CategoryGroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Spreadsheet column letters (`"A"`, `"B"`, ..., `"AA"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ColumnRef(String);

impl ColumnRef {
    pub fn new(letters: impl Into<String>) -> Self {
        Self(letters.into())
    }

    pub fn from_index(index: u32) -> Self {
        Self(crate::utils::column_letters(index))
    }

    /// Zero-based column index.
    pub fn index(&self) -> Result<u32> {
        column_index(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ColumnRef {
    fn from(letters: &str) -> Self {
        Self::new(letters)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PeriodMappingEntry {
    #[schemars(description = "Column holding this period's values, e.g. 'B'")]
    pub column: ColumnRef,

    #[schemars(description = "Human readable period label, e.g. 'Jan 2024'")]
    pub period_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CategoryLabel {
    #[schemars(description = "A single display label")]
    Plain(String),

    #[schemars(description = "Display labels keyed by locale, e.g. {\"en\": \"Salaries\", \"es\": \"Sueldos\"}")]
    Localized(BTreeMap<String, String>),
}

impl CategoryLabel {
    pub fn resolve(&self, locale: Option<&str>) -> Option<&str> {
        match self {
            CategoryLabel::Plain(label) => Some(label.as_str()),
            CategoryLabel::Localized(labels) => locale
                .and_then(|l| labels.get(l))
                .or_else(|| labels.get("en"))
                .map(String::as_str),
        }
    }
}

/// Leaf line item beneath a category. Has no further nesting.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Subcategory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "1-based sheet row holding this subcategory. Absent or <= 0 means unmapped.")]
    pub row: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<CategoryLabel>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Category {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "1-based sheet row holding this category. Absent or <= 0 means unmapped.")]
    pub row: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<CategoryLabel>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    #[schemars(description = "Optional detail rows, exactly one level deep")]
    pub subcategories: BTreeMap<String, Subcategory>,
}

pub type CategoryGroup = BTreeMap<String, Category>;

/// Row reference as a sheet row number, if it points at a real row.
pub fn mapped_row(row: Option<i64>) -> Option<u32> {
    row.filter(|r| *r > 0).and_then(|r| u32::try_from(r).ok())
}

impl Category {
    pub fn mapped_row(&self) -> Option<u32> {
        mapped_row(self.row)
    }
}

impl Subcategory {
    pub fn mapped_row(&self) -> Option<u32> {
        mapped_row(self.row)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct CashFlowCategories {
    #[serde(default)]
    pub inflows: CategoryGroup,
    #[serde(default)]
    pub outflows: CategoryGroup,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfitAndLossCategories {
    #[serde(default)]
    pub revenue: CategoryGroup,
    #[serde(default)]
    pub cogs: CategoryGroup,
    #[serde(default)]
    pub opex: CategoryGroup,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_income: Option<CategoryGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_expenses: Option<CategoryGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxes: Option<CategoryGroup>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementCategories {
    CashFlow(CashFlowCategories),
    ProfitAndLoss(ProfitAndLossCategories),
}

impl StatementCategories {
    pub fn empty(statement_type: StatementType) -> Self {
        match statement_type {
            StatementType::CashFlow => StatementCategories::CashFlow(CashFlowCategories::default()),
            StatementType::ProfitAndLoss => {
                StatementCategories::ProfitAndLoss(ProfitAndLossCategories::default())
            }
        }
    }

    /// Every group present for this statement type, in presentation order.
    pub fn groups(&self) -> Vec<(CategoryGroupName, &CategoryGroup)> {
        match self {
            StatementCategories::CashFlow(c) => vec![
                (CategoryGroupName::Inflows, &c.inflows),
                (CategoryGroupName::Outflows, &c.outflows),
            ],
            StatementCategories::ProfitAndLoss(c) => {
                let mut groups = vec![
                    (CategoryGroupName::Revenue, &c.revenue),
                    (CategoryGroupName::Cogs, &c.cogs),
                    (CategoryGroupName::Opex, &c.opex),
                ];
                if let Some(g) = &c.other_income {
                    groups.push((CategoryGroupName::OtherIncome, g));
                }
                if let Some(g) = &c.other_expenses {
                    groups.push((CategoryGroupName::OtherExpenses, g));
                }
                if let Some(g) = &c.taxes {
                    groups.push((CategoryGroupName::Taxes, g));
                }
                groups
            }
        }
    }

    pub fn group(&self, name: CategoryGroupName) -> Option<&CategoryGroup> {
        self.groups()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, g)| g)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "ISO currency code of the statement, e.g. 'USD'")]
    pub currency: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Locale used to pick localized category labels, e.g. 'es'")]
    pub locale: Option<String>,

    #[serde(default)]
    #[schemars(description = "Scale the sheet's numbers are stated in")]
    pub units: Units,
}

/// Resolved layout of a statement inside the sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub period_mapping: Vec<PeriodMappingEntry>,
    pub periods_row: Option<i64>,
    pub periods_range: Option<String>,
    pub data_rows: BTreeMap<DataRowField, i64>,
    pub categories: StatementCategories,
    pub categories_column: Option<ColumnRef>,
}

impl Structure {
    pub fn empty(statement_type: StatementType) -> Self {
        Self {
            period_mapping: Vec::new(),
            periods_row: None,
            periods_range: None,
            data_rows: BTreeMap::new(),
            categories: StatementCategories::empty(statement_type),
            categories_column: None,
        }
    }

    pub fn data_row(&self, field: DataRowField) -> Option<u32> {
        mapped_row(self.data_rows.get(&field).copied())
    }

    pub fn uses_legacy_periods(&self) -> bool {
        self.period_mapping.is_empty()
            && (self.periods_row.is_some() || self.periods_range.is_some())
    }
}

/// A user-authored statement mapping, validated against its statement type.
///
/// Serialized through [`ConfigurationDocument`]; category groups that do not
/// belong to the statement type are rejected when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConfigurationDocument", into = "ConfigurationDocument")]
pub struct Configuration {
    pub statement_type: StatementType,
    pub structure: Option<Structure>,
    pub metadata: Metadata,
}

impl Configuration {
    pub fn new(statement_type: StatementType, structure: Structure) -> Self {
        Self {
            statement_type,
            structure: Some(structure),
            metadata: Metadata::default(),
        }
    }

    pub fn structure(&self) -> Result<&Structure> {
        self.structure
            .as_ref()
            .ok_or(ConfigurationError::MissingStructure)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ConfigurationDocument)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::json_schema())
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConfigurationDocument {
    #[serde(rename = "type")]
    #[schemars(description = "Which statement the sheet holds")]
    pub statement_type: StatementType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Where the statement lives in the sheet")]
    pub structure: Option<StructureDocument>,

    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StructureDocument {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(description = "Explicit column to period label mapping. Preferred over periodsRow/periodsRange.")]
    pub period_mapping: Vec<PeriodMappingEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Legacy: 1-based row holding period headers")]
    pub periods_row: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Legacy: single-row range of period headers, e.g. 'B3:N3'")]
    pub periods_range: Option<String>,

    #[serde(default)]
    #[schemars(description = "Named total/result rows mapped to 1-based sheet rows")]
    pub data_rows: BTreeMap<DataRowField, i64>,

    #[serde(default)]
    pub categories: CategoryGroupsDocument,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Column holding category label text (P&L only)")]
    pub categories_column: Option<ColumnRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryGroupsDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inflows: Option<CategoryGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outflows: Option<CategoryGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue: Option<CategoryGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cogs: Option<CategoryGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opex: Option<CategoryGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_income: Option<CategoryGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_expenses: Option<CategoryGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxes: Option<CategoryGroup>,
}

fn reject_group(
    group: &Option<CategoryGroup>,
    name: CategoryGroupName,
    statement_type: StatementType,
) -> Result<()> {
    match group {
        Some(_) => Err(ConfigurationError::UnexpectedCategoryGroup {
            group: name.key().to_string(),
            statement_type: statement_type.to_string(),
        }),
        None => Ok(()),
    }
}

impl CategoryGroupsDocument {
    fn into_categories(self, statement_type: StatementType) -> Result<StatementCategories> {
        match statement_type {
            StatementType::CashFlow => {
                reject_group(&self.revenue, CategoryGroupName::Revenue, statement_type)?;
                reject_group(&self.cogs, CategoryGroupName::Cogs, statement_type)?;
                reject_group(&self.opex, CategoryGroupName::Opex, statement_type)?;
                reject_group(&self.other_income, CategoryGroupName::OtherIncome, statement_type)?;
                reject_group(&self.other_expenses, CategoryGroupName::OtherExpenses, statement_type)?;
                reject_group(&self.taxes, CategoryGroupName::Taxes, statement_type)?;

                Ok(StatementCategories::CashFlow(CashFlowCategories {
                    inflows: self.inflows.unwrap_or_default(),
                    outflows: self.outflows.unwrap_or_default(),
                }))
            }
            StatementType::ProfitAndLoss => {
                reject_group(&self.inflows, CategoryGroupName::Inflows, statement_type)?;
                reject_group(&self.outflows, CategoryGroupName::Outflows, statement_type)?;

                Ok(StatementCategories::ProfitAndLoss(ProfitAndLossCategories {
                    revenue: self.revenue.unwrap_or_default(),
                    cogs: self.cogs.unwrap_or_default(),
                    opex: self.opex.unwrap_or_default(),
                    other_income: self.other_income,
                    other_expenses: self.other_expenses,
                    taxes: self.taxes,
                }))
            }
        }
    }

    fn from_categories(categories: StatementCategories) -> Self {
        match categories {
            StatementCategories::CashFlow(c) => Self {
                inflows: Some(c.inflows),
                outflows: Some(c.outflows),
                ..Self::default()
            },
            StatementCategories::ProfitAndLoss(c) => Self {
                revenue: Some(c.revenue),
                cogs: Some(c.cogs),
                opex: Some(c.opex),
                other_income: c.other_income,
                other_expenses: c.other_expenses,
                taxes: c.taxes,
                ..Self::default()
            },
        }
    }
}

impl TryFrom<ConfigurationDocument> for Configuration {
    type Error = ConfigurationError;

    fn try_from(doc: ConfigurationDocument) -> Result<Self> {
        let statement_type = doc.statement_type;
        let structure = match doc.structure {
            Some(s) => Some(Structure {
                period_mapping: s.period_mapping,
                periods_row: s.periods_row,
                periods_range: s.periods_range,
                data_rows: s.data_rows,
                categories: s.categories.into_categories(statement_type)?,
                categories_column: s.categories_column,
            }),
            None => None,
        };

        Ok(Self {
            statement_type,
            structure,
            metadata: doc.metadata,
        })
    }
}

impl From<Configuration> for ConfigurationDocument {
    fn from(config: Configuration) -> Self {
        Self {
            statement_type: config.statement_type,
            structure: config.structure.map(|s| StructureDocument {
                period_mapping: s.period_mapping,
                periods_row: s.periods_row,
                periods_range: s.periods_range,
                data_rows: s.data_rows,
                categories: CategoryGroupsDocument::from_categories(s.categories),
                categories_column: s.categories_column,
            }),
            metadata: config.metadata,
        }
    }
}
