use crate::schema::{CategoryGroupName, DataRowField};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks activating the configuration.
    Error,
    /// Advisory only.
    Warning,
}

/// What a diagnostic is about, with the figures that triggered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DiagnosticKind {
    CategorySumMismatch {
        group: CategoryGroupName,
        expected: f64,
        calculated: f64,
        difference: f64,
    },
    BalanceMismatch {
        expected: f64,
        calculated: f64,
        difference: f64,
    },
    FormulaMismatch {
        formula: String,
        expected: f64,
        actual: f64,
    },
    UnmappedCategory {
        group: CategoryGroupName,
        category: String,
        subcategory: Option<String>,
    },
    AllUnmapped {
        group: CategoryGroupName,
    },
    MissingRequiredRow {
        field: DataRowField,
    },
    MissingStructure,
    InvalidPeriodSpecification {
        reason: String,
    },
    InvalidRowReference {
        field: DataRowField,
        row: i64,
    },
    EmptyDataRows,
    /// An optional category group is declared but holds no categories.
    EmptySection {
        group: CategoryGroupName,
    },
    NoCategories,
    /// A mapped period cell holds text where a number was expected.
    NonNumericCell {
        cell: String,
        text: String,
    },
    FieldNotApplicable {
        field: DataRowField,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<i64>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MappedField {
    /// Row total across all periods; `None` when the row is unmapped or has no numbers.
    pub value: Option<f64>,
    /// Address of the first period cell, e.g. `"B5"`.
    pub cell_address: Option<String>,
    pub is_mapped: bool,
    pub is_valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryShare {
    pub name: String,
    pub value: f64,
    pub row: u32,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotalCheck {
    pub expected_total: f64,
    pub calculated_total: f64,
    pub difference: f64,
    pub difference_percent: f64,
    pub is_valid: bool,
    pub categories: Vec<CategoryShare>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormulaCheck {
    pub formula: String,
    pub expected: f64,
    pub actual: f64,
    pub difference: f64,
    pub difference_percent: f64,
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceValidation {
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_inflows: f64,
    pub total_outflows: f64,
    pub calculated_final_balance: f64,
    pub is_valid: bool,
    pub difference: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MathValidation {
    pub category_totals: BTreeMap<CategoryGroupName, CategoryTotalCheck>,
    pub formula_checks: Vec<FormulaCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_validation: Option<BalanceValidation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub total_fields: usize,
    pub valid_fields: usize,
    pub invalid_fields: usize,
    pub missing_fields: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub mapped_data: BTreeMap<String, MappedField>,
    pub math_validation: MathValidation,
    pub summary: ValidationSummary,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            ..Self::default()
        }
    }

    pub fn error(
        &mut self,
        kind: DiagnosticKind,
        field: impl Into<String>,
        row: Option<i64>,
        message: impl Into<String>,
    ) {
        self.push(Severity::Error, kind, field.into(), row, message.into());
    }

    pub fn warning(
        &mut self,
        kind: DiagnosticKind,
        field: impl Into<String>,
        row: Option<i64>,
        message: impl Into<String>,
    ) {
        self.push(Severity::Warning, kind, field.into(), row, message.into());
    }

    fn push(
        &mut self,
        severity: Severity,
        kind: DiagnosticKind,
        field: String,
        row: Option<i64>,
        message: String,
    ) {
        let diagnostic = Diagnostic {
            kind,
            severity,
            field,
            row,
            message,
        };
        match severity {
            Severity::Error => self.errors.push(diagnostic),
            Severity::Warning => self.warnings.push(diagnostic),
        }
    }

    /// Recomputes `is_valid` and the summary counts.
    pub fn finish(mut self) -> Self {
        self.is_valid = self.errors.is_empty();

        let mut summary = ValidationSummary {
            total_fields: self.mapped_data.len(),
            ..ValidationSummary::default()
        };
        for field in self.mapped_data.values() {
            if !field.is_mapped {
                summary.missing_fields += 1;
            } else if field.is_valid {
                summary.valid_fields += 1;
            } else {
                summary.invalid_fields += 1;
            }
        }
        self.summary = summary;

        self
    }

    pub fn has_error(&self, predicate: impl Fn(&DiagnosticKind) -> bool) -> bool {
        self.errors.iter().any(|d| predicate(&d.kind))
    }

    pub fn has_warning(&self, predicate: impl Fn(&DiagnosticKind) -> bool) -> bool {
        self.warnings.iter().any(|d| predicate(&d.kind))
    }
}

/// `difference` as a percentage of `base`, zero when the base is zero.
pub fn percent_of(difference: f64, base: f64) -> f64 {
    if base == 0.0 {
        0.0
    } else {
        difference.abs() / base.abs() * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_counts() {
        let mut result = ValidationResult::new();
        result.mapped_data.insert(
            "totalRevenue".to_string(),
            MappedField {
                value: Some(10.0),
                cell_address: Some("B4".to_string()),
                is_valid: true,
                is_mapped: true,
            },
        );
        result.mapped_data.insert(
            "revenue.other".to_string(),
            MappedField {
                value: None,
                cell_address: None,
                is_valid: false,
                is_mapped: false,
            },
        );
        result.mapped_data.insert(
            "cogs".to_string(),
            MappedField {
                value: None,
                cell_address: Some("B9".to_string()),
                is_valid: false,
                is_mapped: true,
            },
        );
        result.warning(DiagnosticKind::EmptyDataRows, "dataRows", None, "empty");

        let result = result.finish();
        assert!(result.is_valid);
        assert_eq!(
            result.summary,
            ValidationSummary {
                total_fields: 3,
                valid_fields: 1,
                invalid_fields: 1,
                missing_fields: 1,
            }
        );

        let mut failing = ValidationResult::new();
        failing.error(DiagnosticKind::NoCategories, "categories", None, "none");
        let failing = failing.finish();
        assert!(!failing.is_valid);
        assert!(failing.has_error(|k| matches!(k, DiagnosticKind::NoCategories)));
        assert_eq!(failing.errors[0].severity, Severity::Error);
    }

    #[test]
    fn test_serialized_shape() {
        let mut result = ValidationResult::new();
        result.error(
            DiagnosticKind::MissingRequiredRow {
                field: DataRowField::TotalRevenue,
            },
            "totalRevenue",
            None,
            "missing",
        );
        let json = serde_json::to_value(result.finish()).unwrap();

        assert_eq!(json["isValid"], false);
        assert_eq!(json["errors"][0]["severity"], "error");
        assert_eq!(json["errors"][0]["kind"]["type"], "missingRequiredRow");
        assert_eq!(json["errors"][0]["kind"]["field"], "totalRevenue");
        assert!(json["mathValidation"]["categoryTotals"].is_object());
    }

    #[test]
    fn test_percent_of() {
        assert!((percent_of(1000.0, 6000.0) - 16.666).abs() < 0.01);
        assert_eq!(percent_of(5.0, 0.0), 0.0);
    }
}
