use crate::schema::Units;
use crate::{ProcessedData, RowSeries};
use log::debug;

/// Scales every extracted figure to base units. Missing values stay missing.
pub fn rescale(mut data: ProcessedData, units: Units) -> ProcessedData {
    let factor = units.multiplier();
    if factor == 1.0 {
        return data;
    }

    debug!("Rescaling extracted values by {}", factor);

    for series in data.data_rows.values_mut() {
        scale_series(series, factor);
    }

    for group in data.categories.values_mut() {
        for category in group.values_mut() {
            for v in category.values.iter_mut().flatten() {
                *v *= factor;
            }
            category.total *= factor;

            for sub in category.subcategories.values_mut() {
                scale_series(sub, factor);
            }
        }
    }

    data
}

fn scale_series(series: &mut RowSeries, factor: f64) {
    for v in series.values.iter_mut().flatten() {
        *v *= factor;
    }
    series.total *= factor;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CategoryGroupName, DataRowField, StatementType};
    use crate::CategorySeries;
    use std::collections::BTreeMap;

    fn sample() -> ProcessedData {
        let mut data_rows = BTreeMap::new();
        data_rows.insert(
            DataRowField::TotalRevenue,
            RowSeries::new("Total Revenue".to_string(), vec![Some(1.5), None, Some(2.0)]),
        );

        let mut subcategories = BTreeMap::new();
        subcategories.insert(
            "online".to_string(),
            RowSeries::new("online".to_string(), vec![Some(0.5), None, None]),
        );

        let mut revenue = BTreeMap::new();
        revenue.insert(
            "sales".to_string(),
            CategorySeries {
                label: "sales".to_string(),
                values: vec![Some(1.0), None, Some(-2.0)],
                total: -1.0,
                subcategories,
            },
        );

        let mut categories = BTreeMap::new();
        categories.insert(CategoryGroupName::Revenue, revenue);

        ProcessedData {
            statement_type: StatementType::ProfitAndLoss,
            currency: None,
            periods: vec!["Jan".into(), "Feb".into(), "Mar".into()],
            data_rows,
            categories,
        }
    }

    #[test]
    fn test_thousands() {
        let original = sample();
        let scaled = rescale(original.clone(), Units::Thousands);

        let revenue = &scaled.data_rows[&DataRowField::TotalRevenue];
        assert_eq!(revenue.values, vec![Some(1500.0), None, Some(2000.0)]);
        assert_eq!(
            revenue.total,
            1000.0 * original.data_rows[&DataRowField::TotalRevenue].total
        );

        let sales = &scaled.categories[&CategoryGroupName::Revenue]["sales"];
        assert_eq!(sales.values, vec![Some(1000.0), None, Some(-2000.0)]);
        assert_eq!(sales.total, -1000.0);
        assert_eq!(
            sales.subcategories["online"].values,
            vec![Some(500.0), None, None]
        );
    }

    #[test]
    fn test_millions_and_normal() {
        let scaled = rescale(sample(), Units::Millions);
        assert_eq!(
            scaled.data_rows[&DataRowField::TotalRevenue].total,
            3_500_000.0
        );

        assert_eq!(rescale(sample(), Units::Normal), sample());
    }
}
