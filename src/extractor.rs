use crate::error::Result;
use crate::grid::GridAccessor;
use crate::periods::PeriodColumn;
use crate::schema::{
    Category, CategoryGroupName, CategoryLabel, Configuration, DataRowField, StatementType,
    Structure,
};
use crate::utils::series_total;
use crate::{CategorySeries, ProcessedData, RowSeries};
use log::{debug, warn};
use std::collections::BTreeMap;

/// Pulls the mapped rows of a statement out of a grid.
///
/// Every row read comes from an explicit configuration field. Cells that are
/// not numeric become `None` and count as zero in totals.
pub struct Extractor<'a, G: GridAccessor + ?Sized> {
    config: &'a Configuration,
    grid: &'a G,
}

impl<'a, G: GridAccessor + ?Sized> Extractor<'a, G> {
    pub fn new(config: &'a Configuration, grid: &'a G) -> Self {
        Self { config, grid }
    }

    pub fn extract(&self, periods: &[PeriodColumn]) -> Result<ProcessedData> {
        let structure = self.config.structure()?;

        let mut data = ProcessedData {
            statement_type: self.config.statement_type,
            currency: self.config.metadata.currency.clone(),
            periods: periods.iter().map(|p| p.label.clone()).collect(),
            data_rows: BTreeMap::new(),
            categories: BTreeMap::new(),
        };

        for (&field, &row) in &structure.data_rows {
            if row <= 0 {
                warn!("Data row '{}' has non-positive row {}; values left empty", field, row);
            }
            let values = self.read_row(crate::schema::mapped_row(Some(row)), periods);
            data.data_rows
                .insert(field, RowSeries::new(field.label().to_string(), values));
        }

        for (group, categories) in structure.categories.groups() {
            let mut extracted = BTreeMap::new();
            for (key, category) in categories {
                extracted.insert(
                    key.clone(),
                    self.extract_category(structure, key, category, periods),
                );
            }
            data.categories.insert(group, extracted);
        }

        if self.config.statement_type == StatementType::CashFlow {
            derive_flow_total(
                &mut data,
                CategoryGroupName::Inflows,
                DataRowField::TotalInflows,
                false,
            );
            derive_flow_total(
                &mut data,
                CategoryGroupName::Outflows,
                DataRowField::TotalOutflows,
                true,
            );
        }

        Ok(data)
    }

    fn extract_category(
        &self,
        structure: &Structure,
        key: &str,
        category: &Category,
        periods: &[PeriodColumn],
    ) -> CategorySeries {
        let row = category.mapped_row();
        let values = self.read_row(row, periods);
        let total = series_total(&values);

        // A category's total is its own row; subcategories are detail only.
        let subcategories = category
            .subcategories
            .iter()
            .map(|(sub_key, sub)| {
                let sub_row = sub.mapped_row();
                let label = self.label_for(structure, sub_key, sub.label.as_ref(), sub_row);
                (
                    sub_key.clone(),
                    RowSeries::new(label, self.read_row(sub_row, periods)),
                )
            })
            .collect();

        CategorySeries {
            label: self.label_for(structure, key, category.label.as_ref(), row),
            values,
            total,
            subcategories,
        }
    }

    fn read_row(&self, row: Option<u32>, periods: &[PeriodColumn]) -> Vec<Option<f64>> {
        match row {
            Some(r) => periods
                .iter()
                .map(|p| self.grid.cell_value(r, p.index).as_number())
                .collect(),
            None => vec![None; periods.len()],
        }
    }

    /// Configured label (locale, then English), then the sheet's category
    /// column for P&L statements, then the key itself.
    fn label_for(
        &self,
        structure: &Structure,
        key: &str,
        label: Option<&CategoryLabel>,
        row: Option<u32>,
    ) -> String {
        let locale = self.config.metadata.locale.as_deref();
        if let Some(resolved) = label.and_then(|l| l.resolve(locale)) {
            return resolved.to_string();
        }

        if self.config.statement_type == StatementType::ProfitAndLoss {
            let column = structure
                .categories_column
                .as_ref()
                .and_then(|c| c.index().ok());
            if let (Some(column), Some(row)) = (column, row) {
                if let crate::grid::CellValue::Text(text) = self.grid.cell_value(row, column) {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        return trimmed.to_string();
                    }
                }
            }
        }

        key.to_string()
    }
}

/// Rebuilds a cash flow total from its categories when the sheet does not
/// state one (absent row, or a row that is all zero/empty).
fn derive_flow_total(
    data: &mut ProcessedData,
    group: CategoryGroupName,
    field: DataRowField,
    absolute: bool,
) {
    let stated = data
        .data_rows
        .get(&field)
        .map(|series| series.values.iter().any(|v| matches!(v, Some(x) if *x != 0.0)))
        .unwrap_or(false);
    if stated {
        return;
    }

    let categories = match data.categories.get(&group) {
        Some(c) if !c.is_empty() => c,
        _ => return,
    };

    let mut sums = vec![0.0; data.periods.len()];
    for category in categories.values() {
        for (slot, value) in sums.iter_mut().zip(&category.values) {
            if let Some(v) = value {
                *slot += if absolute { v.abs() } else { *v };
            }
        }
    }

    debug!(
        "Derived {} from {} {} categories",
        field,
        categories.len(),
        group
    );

    let values = sums.into_iter().map(Some).collect();
    data.data_rows
        .insert(field, RowSeries::new(field.label().to_string(), values));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::schema::{
        CashFlowCategories, ColumnRef, ProfitAndLossCategories, StatementCategories, Subcategory,
    };

    fn periods(n: u32) -> Vec<PeriodColumn> {
        (1..=n)
            .map(|i| PeriodColumn {
                column: ColumnRef::from_index(i),
                index: i,
                label: format!("P{}", i),
            })
            .collect()
    }

    fn extract(
        config: &Configuration,
        grid: &Grid,
        periods: &[PeriodColumn],
    ) -> Result<ProcessedData> {
        Extractor::new(config, grid).extract(periods)
    }

    fn category(row: i64) -> Category {
        Category {
            row: Some(row),
            ..Category::default()
        }
    }

    #[test]
    fn test_data_rows_and_coercion() {
        let grid = Grid::from_text_rows(vec![
            vec!["Line", "Jan", "Feb", "Mar"],
            vec!["Revenue", "100", "n/a", "300"],
        ]);

        let mut structure = Structure::empty(StatementType::ProfitAndLoss);
        structure.data_rows.insert(DataRowField::TotalRevenue, 2);
        let config = Configuration::new(StatementType::ProfitAndLoss, structure);

        let data = extract(&config, &grid, &periods(3)).unwrap();
        let revenue = &data.data_rows[&DataRowField::TotalRevenue];

        assert_eq!(revenue.label, "Total Revenue");
        assert_eq!(revenue.values, vec![Some(100.0), None, Some(300.0)]);
        assert_eq!(revenue.total, 400.0);
        assert_eq!(data.periods, vec!["P1", "P2", "P3"]);
    }

    #[test]
    fn test_category_total_ignores_subcategories() {
        let grid = Grid::from_text_rows(vec![
            vec!["Line", "Jan", "Feb"],
            vec!["Services", "100", "100"],
            vec!["Consulting", "30", "40"],
            vec!["Training", "5", "5"],
        ]);

        let mut services = category(2);
        services
            .subcategories
            .insert("consulting".to_string(), Subcategory { row: Some(3), label: None });
        services
            .subcategories
            .insert("training".to_string(), Subcategory { row: Some(4), label: None });

        let mut categories = ProfitAndLossCategories::default();
        categories.revenue.insert("services".to_string(), services);

        let mut structure = Structure::empty(StatementType::ProfitAndLoss);
        structure.categories = StatementCategories::ProfitAndLoss(categories);
        let config = Configuration::new(StatementType::ProfitAndLoss, structure);

        let data = extract(&config, &grid, &periods(2)).unwrap();
        let services = &data.categories[&CategoryGroupName::Revenue]["services"];

        assert_eq!(services.total, 200.0);
        assert_eq!(services.subcategories["consulting"].total, 70.0);
        assert_eq!(services.subcategories["training"].total, 10.0);
        assert_eq!(services.label, "services");
    }

    #[test]
    fn test_labels_prefer_locale_then_sheet_column() {
        let grid = Grid::from_text_rows(vec![vec!["Line", "Jan"], vec!["Sueldos y Cargas", "10"]]);

        let mut labelled = category(2);
        labelled.label = Some(CategoryLabel::Localized(
            [("es".to_string(), "Sueldos".to_string())].into_iter().collect(),
        ));

        let mut categories = ProfitAndLossCategories::default();
        categories.opex.insert("payroll".to_string(), labelled);
        categories.opex.insert("salaries".to_string(), category(2));
        categories.opex.insert("unmapped".to_string(), Category::default());

        let mut structure = Structure::empty(StatementType::ProfitAndLoss);
        structure.categories = StatementCategories::ProfitAndLoss(categories);
        structure.categories_column = Some(ColumnRef::new("A"));
        let mut config = Configuration::new(StatementType::ProfitAndLoss, structure);
        config.metadata.locale = Some("es".to_string());

        let data = extract(&config, &grid, &periods(1)).unwrap();
        let opex = &data.categories[&CategoryGroupName::Opex];

        assert_eq!(opex["payroll"].label, "Sueldos");
        assert_eq!(opex["salaries"].label, "Sueldos y Cargas");
        assert_eq!(opex["unmapped"].label, "unmapped");
        assert_eq!(opex["unmapped"].values, vec![None]);
        assert_eq!(opex["unmapped"].total, 0.0);
    }

    #[test]
    fn test_cash_flow_totals_are_derived() {
        let grid = Grid::from_text_rows(vec![
            vec!["Line", "Jan", "Feb"],
            vec!["A", "100", "200"],
            vec!["B", "50", "0"],
            vec!["Suppliers", "-80", "-20"],
            vec!["Total out", "0", ""],
        ]);

        let mut categories = CashFlowCategories::default();
        categories.inflows.insert("A".to_string(), category(2));
        categories.inflows.insert("B".to_string(), category(3));
        categories.outflows.insert("suppliers".to_string(), category(4));

        let mut structure = Structure::empty(StatementType::CashFlow);
        structure.categories = StatementCategories::CashFlow(categories);
        structure.data_rows.insert(DataRowField::TotalOutflows, 5);
        let config = Configuration::new(StatementType::CashFlow, structure);

        let data = extract(&config, &grid, &periods(2)).unwrap();

        let inflows = &data.data_rows[&DataRowField::TotalInflows];
        assert_eq!(inflows.values, vec![Some(150.0), Some(200.0)]);
        assert_eq!(inflows.total, 350.0);

        let outflows = &data.data_rows[&DataRowField::TotalOutflows];
        assert_eq!(outflows.values, vec![Some(80.0), Some(20.0)]);
        assert_eq!(outflows.total, 100.0);
    }

    #[test]
    fn test_stated_cash_flow_total_is_kept() {
        let grid = Grid::from_text_rows(vec![
            vec!["Line", "Jan"],
            vec!["A", "100"],
            vec!["Total in", "90"],
        ]);

        let mut categories = CashFlowCategories::default();
        categories.inflows.insert("A".to_string(), category(2));

        let mut structure = Structure::empty(StatementType::CashFlow);
        structure.categories = StatementCategories::CashFlow(categories);
        structure.data_rows.insert(DataRowField::TotalInflows, 3);
        let config = Configuration::new(StatementType::CashFlow, structure);

        let data = extract(&config, &grid, &periods(1)).unwrap();
        assert_eq!(data.data_rows[&DataRowField::TotalInflows].total, 90.0);
    }

    #[test]
    fn test_profit_and_loss_totals_are_never_derived() {
        let grid = Grid::from_text_rows(vec![vec!["Line", "Jan"], vec!["Sales", "100"]]);

        let mut categories = ProfitAndLossCategories::default();
        categories.revenue.insert("sales".to_string(), category(2));

        let mut structure = Structure::empty(StatementType::ProfitAndLoss);
        structure.categories = StatementCategories::ProfitAndLoss(categories);
        let config = Configuration::new(StatementType::ProfitAndLoss, structure);

        let data = extract(&config, &grid, &periods(1)).unwrap();
        assert!(data.data_rows.is_empty());
    }
}
