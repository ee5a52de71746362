//! Shape checks that need only the configuration, not the sheet.

use crate::periods::parse_periods_range;
use crate::report::{DiagnosticKind, ValidationResult};
use crate::schema::{
    CategoryGroup, CategoryGroupName, Configuration, StatementCategories, Structure,
};
use log::debug;

pub struct StructuralValidator<'a> {
    config: &'a Configuration,
}

impl<'a> StructuralValidator<'a> {
    pub fn new(config: &'a Configuration) -> Self {
        Self { config }
    }

    /// Runs every structural check. Arithmetic checks are left out, so
    /// `mathValidation` stays empty.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        let structure = match self.config.structure.as_ref() {
            Some(s) => s,
            None => {
                result.error(
                    DiagnosticKind::MissingStructure,
                    "structure",
                    None,
                    "Configuration has no structure section",
                );
                return result.finish();
            }
        };

        self.check_periods(structure, &mut result);
        self.check_data_rows(structure, &mut result);
        check_category_mapping(structure, &mut result);

        debug!(
            "Structural validation finished with {} errors and {} warnings",
            result.errors.len(),
            result.warnings.len()
        );

        result.finish()
    }

    fn check_periods(&self, structure: &Structure, result: &mut ValidationResult) {
        if !structure.period_mapping.is_empty() {
            for entry in &structure.period_mapping {
                if let Err(e) = entry.column.index() {
                    result.error(
                        DiagnosticKind::InvalidPeriodSpecification {
                            reason: e.to_string(),
                        },
                        "periodMapping",
                        None,
                        format!("Period '{}' has an invalid column: {}", entry.period_label, e),
                    );
                }
            }
            return;
        }

        match (structure.periods_row, structure.periods_range.as_deref()) {
            (Some(row), Some(range)) => {
                if row <= 0 {
                    result.error(
                        DiagnosticKind::InvalidPeriodSpecification {
                            reason: format!("periodsRow must be positive, got {}", row),
                        },
                        "periodsRow",
                        Some(row),
                        format!("Periods row {} is not a valid sheet row", row),
                    );
                }
                if let Err(e) = parse_periods_range(range) {
                    result.error(
                        DiagnosticKind::InvalidPeriodSpecification {
                            reason: e.to_string(),
                        },
                        "periodsRange",
                        None,
                        e.to_string(),
                    );
                }
            }
            _ => result.error(
                DiagnosticKind::InvalidPeriodSpecification {
                    reason: "no period specification".to_string(),
                },
                "periodMapping",
                None,
                "No periods configured: add a period mapping or a periods row and range",
            ),
        }
    }

    fn check_data_rows(&self, structure: &Structure, result: &mut ValidationResult) {
        if structure.data_rows.is_empty() {
            result.warning(
                DiagnosticKind::EmptyDataRows,
                "dataRows",
                None,
                "No data rows are mapped",
            );
            return;
        }

        for (&field, &row) in &structure.data_rows {
            if row <= 0 {
                result.error(
                    DiagnosticKind::InvalidRowReference { field, row },
                    field.key(),
                    Some(row),
                    format!("'{}' points at row {}, rows start at 1", field.label(), row),
                );
            }

            if field.statement_type() != self.config.statement_type {
                result.warning(
                    DiagnosticKind::FieldNotApplicable { field },
                    field.key(),
                    Some(row),
                    format!(
                        "'{}' is not part of a {} statement and will not be validated",
                        field.label(),
                        self.config.statement_type
                    ),
                );
            }
        }
    }
}

fn check_category_mapping(structure: &Structure, result: &mut ValidationResult) {
    let groups = structure.categories.groups();

    if groups.iter().all(|(_, g)| g.is_empty()) {
        result.error(
            DiagnosticKind::NoCategories,
            "categories",
            None,
            "No categories are configured in any group",
        );
        return;
    }

    check_unmapped_categories(&structure.categories, result);
}

/// Flags unmapped categories: a warning each, or a single error when a
/// whole group is unmapped.
pub fn check_unmapped_categories(categories: &StatementCategories, result: &mut ValidationResult) {
    for (name, group) in categories.groups() {
        check_group_mapping(name, group, result);
    }
}

fn check_group_mapping(
    name: CategoryGroupName,
    group: &CategoryGroup,
    result: &mut ValidationResult,
) {
    if group.is_empty() {
        if name.is_optional() {
            result.warning(
                DiagnosticKind::EmptySection { group: name },
                name.key(),
                None,
                format!(
                    "Optional group '{}' is declared but holds no categories; remove it or map its rows",
                    name
                ),
            );
        }
        return;
    }

    let all_unmapped = group.values().all(|c| c.mapped_row().is_none());
    if all_unmapped {
        result.error(
            DiagnosticKind::AllUnmapped { group: name },
            name.key(),
            None,
            format!(
                "All categories in '{}' are unmapped; mathematical validation is impossible",
                name
            ),
        );
    }

    for (key, category) in group {
        if !all_unmapped && category.mapped_row().is_none() {
            result.warning(
                DiagnosticKind::UnmappedCategory {
                    group: name,
                    category: key.clone(),
                    subcategory: None,
                },
                format!("{}.{}", name, key),
                category.row,
                format!("Category '{}' in '{}' has no row assigned", key, name),
            );
        }

        for (sub_key, sub) in &category.subcategories {
            if sub.mapped_row().is_none() {
                result.warning(
                    DiagnosticKind::UnmappedCategory {
                        group: name,
                        category: key.clone(),
                        subcategory: Some(sub_key.clone()),
                    },
                    format!("{}.{}.{}", name, key, sub_key),
                    sub.row,
                    format!(
                        "Subcategory '{}' of '{}' in '{}' has no row assigned",
                        sub_key, key, name
                    ),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Category, DataRowField, StatementType};
    use crate::validate_structure;
    use serde_json::json;

    fn config(value: serde_json::Value) -> Configuration {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_valid_profit_and_loss_structure() {
        let result = validate_structure(&config(json!({
            "type": "pnl",
            "structure": {
                "periodMapping": [{ "column": "B", "periodLabel": "Jan" }],
                "dataRows": { "totalRevenue": 4 },
                "categories": {
                    "revenue": { "sales": { "row": 2 }, "services": { "row": 3 } }
                }
            }
        })));

        assert!(result.is_valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty());
        assert!(result.math_validation.category_totals.is_empty());
        assert!(result.math_validation.balance_validation.is_none());
    }

    #[test]
    fn test_missing_structure() {
        let result = validate_structure(&config(json!({ "type": "cashflow" })));
        assert!(!result.is_valid);
        assert!(result.has_error(|k| matches!(k, DiagnosticKind::MissingStructure)));
    }

    #[test]
    fn test_some_unmapped_is_warning_all_unmapped_is_error() {
        let result = validate_structure(&config(json!({
            "type": "cashflow",
            "structure": {
                "periodsRow": 3,
                "periodsRange": "B3:M3",
                "dataRows": { "totalInflows": 5 },
                "categories": {
                    "inflows": { "sales": { "row": 2 }, "loans": { "row": 0 } },
                    "outflows": { "rent": {}, "payroll": { "row": -1 } }
                }
            }
        })));

        assert!(!result.is_valid);
        assert!(result.has_error(|k| matches!(
            k,
            DiagnosticKind::AllUnmapped { group: CategoryGroupName::Outflows }
        )));
        assert!(!result.has_error(|k| matches!(
            k,
            DiagnosticKind::AllUnmapped { group: CategoryGroupName::Inflows }
        )));
        assert!(result.has_warning(|k| matches!(
            k,
            DiagnosticKind::UnmappedCategory { category, .. } if category == "loans"
        )));
        assert!(!result.has_warning(|k| matches!(
            k,
            DiagnosticKind::UnmappedCategory { category, .. } if category == "rent"
        )));
    }

    #[test]
    fn test_no_categories_and_empty_data_rows() {
        let result = validate_structure(&config(json!({
            "type": "pnl",
            "structure": { "periodMapping": [{ "column": "B", "periodLabel": "Jan" }] }
        })));

        assert!(result.has_error(|k| matches!(k, DiagnosticKind::NoCategories)));
        assert!(result.has_warning(|k| matches!(k, DiagnosticKind::EmptyDataRows)));
    }

    #[test]
    fn test_period_and_row_problems() {
        let result = validate_structure(&config(json!({
            "type": "cashflow",
            "structure": {
                "periodsRow": 0,
                "periodsRange": "B3-M3",
                "dataRows": { "finalBalance": 0, "grossProfit": 7 },
                "categories": { "inflows": { "sales": { "row": 2 } } }
            }
        })));

        let period_errors = result
            .errors
            .iter()
            .filter(|d| matches!(d.kind, DiagnosticKind::InvalidPeriodSpecification { .. }))
            .count();
        assert_eq!(period_errors, 2);
        assert!(result.has_error(|k| matches!(
            k,
            DiagnosticKind::InvalidRowReference { field: DataRowField::FinalBalance, row: 0 }
        )));
        assert!(result.has_warning(|k| matches!(
            k,
            DiagnosticKind::FieldNotApplicable { field: DataRowField::GrossProfit }
        )));
    }

    #[test]
    fn test_unmapped_subcategory_warns() {
        let mut structure = Structure::empty(StatementType::ProfitAndLoss);
        structure.period_mapping = vec![crate::schema::PeriodMappingEntry {
            column: "B".into(),
            period_label: "Jan".to_string(),
        }];
        structure.data_rows.insert(DataRowField::TotalOpex, 9);
        if let StatementCategories::ProfitAndLoss(c) = &mut structure.categories {
            let mut admin = Category {
                row: Some(7),
                ..Category::default()
            };
            admin
                .subcategories
                .insert("legal".to_string(), Default::default());
            c.opex.insert("admin".to_string(), admin);
        }

        let config = Configuration::new(StatementType::ProfitAndLoss, structure);
        let result = validate_structure(&config);
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].field, "opex.admin.legal");
    }

    #[test]
    fn test_empty_optional_group_warns() {
        let result = validate_structure(&config(json!({
            "type": "pnl",
            "structure": {
                "periodMapping": [{ "column": "B", "periodLabel": "Jan" }],
                "dataRows": { "totalRevenue": 4 },
                "categories": {
                    "revenue": { "sales": { "row": 2 } },
                    "cogs": {},
                    "otherIncome": {}
                }
            }
        })));

        assert!(result.is_valid, "{:?}", result.errors);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].field, "otherIncome");
        assert!(result.has_warning(|k| matches!(
            k,
            DiagnosticKind::EmptySection { group: CategoryGroupName::OtherIncome }
        )));
    }
}
