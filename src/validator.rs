use crate::error::Result;
use crate::grid::{CellValue, GridAccessor};
use crate::periods::{PeriodColumn, PeriodMapper};
use crate::report::{
    percent_of, BalanceValidation, CategoryShare, CategoryTotalCheck, DiagnosticKind, FormulaCheck,
    MappedField, ValidationResult,
};
use crate::schema::{
    mapped_row, CategoryGroup, Configuration, DataRowField, StatementType, Structure,
};
use crate::settings::EngineSettings;
use crate::structural::check_unmapped_categories;
use crate::utils::cell_address;
use log::{debug, info};
use std::collections::BTreeSet;

const GROSS_PROFIT_FORMULA: &str = "Gross Profit = Total Revenue - COGS";

/// Re-derives a statement's totals from the sheet and checks them against
/// the rows the configuration declares.
///
/// Figures are row totals over every resolved period, except the balance
/// equation which opens on the first period and closes on the last.
pub struct ConsistencyValidator<'a, G: GridAccessor + ?Sized> {
    config: &'a Configuration,
    structure: &'a Structure,
    grid: &'a G,
    periods: Vec<PeriodColumn>,
    tolerance: f64,
}

impl<'a, G: GridAccessor + ?Sized> ConsistencyValidator<'a, G> {
    pub fn new(config: &'a Configuration, grid: &'a G, settings: &EngineSettings) -> Result<Self> {
        let structure = config.structure()?;
        let periods = PeriodMapper::new(settings).resolve(structure, grid)?;

        Ok(Self {
            config,
            structure,
            grid,
            periods,
            tolerance: settings.tolerance,
        })
    }

    pub fn validate(&self) -> ValidationResult {
        info!(
            "Validating {} statement across {} periods",
            self.config.statement_type,
            self.periods.len()
        );

        let mut result = ValidationResult::new();

        self.map_fields(&mut result);
        check_unmapped_categories(&self.structure.categories, &mut result);
        self.check_required_rows(&mut result);
        self.check_category_totals(&mut result);

        match self.config.statement_type {
            StatementType::CashFlow => self.check_balance(&mut result),
            StatementType::ProfitAndLoss => self.check_gross_profit(&mut result),
        }

        let result = result.finish();
        debug!(
            "Consistency validation finished: {} errors, {} warnings",
            result.errors.len(),
            result.warnings.len()
        );
        result
    }

    fn row_values(&self, row: u32) -> Vec<Option<f64>> {
        self.periods
            .iter()
            .map(|p| self.grid.cell_value(row, p.index).as_number())
            .collect()
    }

    /// Sum over all periods, or `None` when the row holds no numbers.
    fn row_total(&self, row: u32) -> Option<f64> {
        let values = self.row_values(row);
        if values.iter().all(Option::is_none) {
            return None;
        }
        Some(values.iter().flatten().sum())
    }

    fn stated_total(&self, field: DataRowField) -> Option<(u32, f64)> {
        self.structure
            .data_row(field)
            .map(|row| (row, self.row_total(row).unwrap_or(0.0)))
    }

    fn mapped_field(&self, row: Option<u32>) -> MappedField {
        match row {
            Some(r) => {
                let value = self.row_total(r);
                MappedField {
                    value,
                    cell_address: self.periods.first().map(|p| cell_address(r, p.index)),
                    is_mapped: true,
                    is_valid: value.is_some(),
                }
            }
            None => MappedField {
                value: None,
                cell_address: None,
                is_mapped: false,
                is_valid: false,
            },
        }
    }

    fn map_fields(&self, result: &mut ValidationResult) {
        for (&field, &row) in &self.structure.data_rows {
            let row = mapped_row(Some(row));
            self.check_numeric_cells(field.key(), row, result);
            result
                .mapped_data
                .insert(field.key().to_string(), self.mapped_field(row));
        }

        for (group, categories) in self.structure.categories.groups() {
            for (key, category) in categories {
                let category_key = format!("{}.{}", group, key);
                self.check_numeric_cells(&category_key, category.mapped_row(), result);
                result
                    .mapped_data
                    .insert(category_key, self.mapped_field(category.mapped_row()));

                for (sub_key, sub) in &category.subcategories {
                    let sub_key = format!("{}.{}.{}", group, key, sub_key);
                    self.check_numeric_cells(&sub_key, sub.mapped_row(), result);
                    result
                        .mapped_data
                        .insert(sub_key, self.mapped_field(sub.mapped_row()));
                }
            }
        }
    }

    /// Warns for every period cell of `row` holding non-blank text. Such
    /// cells are read as missing and count as zero in every sum.
    fn check_numeric_cells(&self, key: &str, row: Option<u32>, result: &mut ValidationResult) {
        let Some(row) = row else {
            return;
        };

        for period in &self.periods {
            let value = self.grid.cell_value(row, period.index);
            if value.is_blank() {
                continue;
            }
            if let CellValue::Text(text) = value {
                let cell = cell_address(row, period.index);
                result.warning(
                    DiagnosticKind::NonNumericCell {
                        cell: cell.clone(),
                        text: text.clone(),
                    },
                    key,
                    Some(row as i64),
                    format!(
                        "Cell {} of '{}' ({}) holds '{}' instead of a number; it counts as 0",
                        cell, key, period.label, text
                    ),
                );
            }
        }
    }

    fn check_required_rows(&self, result: &mut ValidationResult) {
        let mut reported = BTreeSet::new();

        match self.config.statement_type {
            StatementType::CashFlow => {
                let balances = [DataRowField::InitialBalance, DataRowField::FinalBalance];
                if balances.iter().any(|f| self.structure.data_row(*f).is_some()) {
                    for field in [
                        DataRowField::InitialBalance,
                        DataRowField::FinalBalance,
                        DataRowField::TotalInflows,
                        DataRowField::TotalOutflows,
                    ] {
                        self.require_row(field, "the cash balance equation", &mut reported, result);
                    }
                }
            }
            StatementType::ProfitAndLoss => {
                if self.structure.data_row(DataRowField::GrossProfit).is_some() {
                    for field in [DataRowField::TotalRevenue, DataRowField::Cogs] {
                        self.require_row(field, GROSS_PROFIT_FORMULA, &mut reported, result);
                    }
                }
            }
        }

        for (group, categories) in self.structure.categories.groups() {
            let field = group.total_field();
            let has_mapped = categories.values().any(|c| c.mapped_row().is_some());
            if !group.requires_total() || !has_mapped || self.structure.data_row(field).is_some() {
                continue;
            }

            match self.config.statement_type {
                StatementType::ProfitAndLoss => self.require_row(
                    field,
                    &format!("the '{}' category sum check", group),
                    &mut reported,
                    result,
                ),
                StatementType::CashFlow if !reported.contains(&field) => result.warning(
                    DiagnosticKind::MissingRequiredRow { field },
                    field.key(),
                    None,
                    format!(
                        "'{}' has no row assigned; it is derived from the '{}' categories during extraction and cannot be cross-checked",
                        field.label(),
                        group
                    ),
                ),
                StatementType::CashFlow => {}
            }
        }
    }

    /// Reports `field` once if it has no row.
    fn require_row(
        &self,
        field: DataRowField,
        purpose: &str,
        reported: &mut BTreeSet<DataRowField>,
        result: &mut ValidationResult,
    ) {
        if self.structure.data_row(field).is_none() && reported.insert(field) {
            result.error(
                DiagnosticKind::MissingRequiredRow { field },
                field.key(),
                None,
                format!(
                    "'{}' has no row assigned but is needed for {}",
                    field.label(),
                    purpose
                ),
            );
        }
    }

    fn check_category_totals(&self, result: &mut ValidationResult) {
        for (group, categories) in self.structure.categories.groups() {
            let field = group.total_field();
            let (total_row, expected) = match self.stated_total(field) {
                Some(stated) => stated,
                None => continue,
            };

            let check = match self.category_total_check(expected, categories) {
                Some(check) => check,
                None => continue,
            };

            if !check.is_valid {
                result.error(
                    DiagnosticKind::CategorySumMismatch {
                        group,
                        expected,
                        calculated: check.calculated_total,
                        difference: check.difference,
                    },
                    field.key(),
                    Some(total_row as i64),
                    format!(
                        "Categories in '{}' sum to {:.2} but {} (row {}) states {:.2}: difference {:.2} ({:.2}%)",
                        group,
                        check.calculated_total,
                        field.label(),
                        total_row,
                        expected,
                        check.difference,
                        check.difference_percent
                    ),
                );
            }

            result.math_validation.category_totals.insert(group, check);
        }
    }

    fn category_total_check(&self, expected: f64, categories: &CategoryGroup) -> Option<CategoryTotalCheck> {
        let shares: Vec<CategoryShare> = categories
            .iter()
            .filter_map(|(key, category)| {
                let row = category.mapped_row()?;
                let value = self.row_total(row).unwrap_or(0.0);
                Some(CategoryShare {
                    name: key.clone(),
                    value,
                    row,
                    percentage: percent_of(value, expected),
                })
            })
            .collect();

        if shares.is_empty() {
            return None;
        }

        // Sign conventions vary between sheets, so compare magnitudes.
        let calculated: f64 = shares.iter().map(|s| s.value.abs()).sum();
        let difference = expected.abs() - calculated;

        Some(CategoryTotalCheck {
            expected_total: expected,
            calculated_total: calculated,
            difference,
            difference_percent: percent_of(difference, expected),
            is_valid: difference.abs() < self.tolerance,
            categories: shares,
        })
    }

    fn check_balance(&self, result: &mut ValidationResult) {
        let initial_row = self.structure.data_row(DataRowField::InitialBalance);
        let final_row = self.structure.data_row(DataRowField::FinalBalance);
        let inflows = self.stated_total(DataRowField::TotalInflows);
        let outflows = self.stated_total(DataRowField::TotalOutflows);

        let (initial_row, final_row, (_, total_inflows), (_, total_outflows)) =
            match (initial_row, final_row, inflows, outflows) {
                (Some(i), Some(f), Some(inf), Some(out)) => (i, f, inf, out),
                _ => return,
            };

        let initial_balance = self
            .row_values(initial_row)
            .into_iter()
            .flatten()
            .next()
            .unwrap_or(0.0);
        let final_balance = self
            .row_values(final_row)
            .into_iter()
            .flatten()
            .last()
            .unwrap_or(0.0);

        let calculated = initial_balance + total_inflows.abs() - total_outflows.abs();
        let difference = final_balance - calculated;
        let is_valid = difference.abs() < self.tolerance;

        if !is_valid {
            result.error(
                DiagnosticKind::BalanceMismatch {
                    expected: final_balance,
                    calculated,
                    difference,
                },
                DataRowField::FinalBalance.key(),
                Some(final_row as i64),
                format!(
                    "Final balance {:.2} does not match initial balance {:.2} + inflows {:.2} - outflows {:.2} = {:.2} (difference {:.2})",
                    final_balance,
                    initial_balance,
                    total_inflows.abs(),
                    total_outflows.abs(),
                    calculated,
                    difference
                ),
            );
        }

        result.math_validation.balance_validation = Some(BalanceValidation {
            initial_balance,
            final_balance,
            total_inflows,
            total_outflows,
            calculated_final_balance: calculated,
            is_valid,
            difference,
        });
    }

    fn check_gross_profit(&self, result: &mut ValidationResult) {
        let (revenue, cogs, (gross_row, stated)) = match (
            self.stated_total(DataRowField::TotalRevenue),
            self.stated_total(DataRowField::Cogs),
            self.stated_total(DataRowField::GrossProfit),
        ) {
            (Some((_, r)), Some((_, c)), Some(g)) => (r, c, g),
            _ => return,
        };

        let expected = revenue - cogs.abs();
        let difference = stated - expected;
        let is_valid = difference.abs() < self.tolerance;

        let error_message = if is_valid {
            None
        } else {
            let message = format!(
                "Gross Profit mismatch: Total Revenue {:.2} - COGS {:.2} = {:.2}, but row {} states {:.2}",
                revenue,
                cogs.abs(),
                expected,
                gross_row,
                stated
            );
            result.error(
                DiagnosticKind::FormulaMismatch {
                    formula: GROSS_PROFIT_FORMULA.to_string(),
                    expected,
                    actual: stated,
                },
                DataRowField::GrossProfit.key(),
                Some(gross_row as i64),
                message.clone(),
            );
            Some(message)
        };

        result.math_validation.formula_checks.push(FormulaCheck {
            formula: GROSS_PROFIT_FORMULA.to_string(),
            expected,
            actual: stated,
            difference,
            difference_percent: percent_of(difference, expected),
            is_valid,
            error_message,
        });
    }
}
