//! Period resolution: which sheet columns hold which reporting periods.
//!
//! Only explicit addressing is supported. A configuration either lists its
//! columns in `periodMapping`, or names a header row and range
//! (`periodsRow`/`periodsRange`) that is converted deterministically.

use crate::error::{ConfigurationError, Result};
use crate::grid::{CellValue, GridAccessor};
use crate::schema::{ColumnRef, Configuration, PeriodMappingEntry, Structure};
use crate::settings::{EngineSettings, SerialDateWindow};
use crate::utils::{column_index, parse_numeric_text, serial_period_label};
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const PERIODS_RANGE_PATTERN: &str = r"^([A-Z]+)(\d+):([A-Z]+)(\d+)$";

/// One reporting column, in ascending column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodColumn {
    pub column: ColumnRef,
    pub index: u32,
    pub label: String,
}

impl From<&PeriodColumn> for PeriodMappingEntry {
    fn from(period: &PeriodColumn) -> Self {
        PeriodMappingEntry {
            column: period.column.clone(),
            period_label: period.label.clone(),
        }
    }
}

pub struct PeriodMapper {
    serial_window: SerialDateWindow,
}

impl PeriodMapper {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            serial_window: settings.serial_date_window,
        }
    }

    pub fn resolve<G: GridAccessor + ?Sized>(
        &self,
        structure: &Structure,
        grid: &G,
    ) -> Result<Vec<PeriodColumn>> {
        if !structure.period_mapping.is_empty() {
            return self.resolve_explicit(&structure.period_mapping);
        }

        match (structure.periods_row, structure.periods_range.as_deref()) {
            (Some(row), Some(range)) => self.convert_legacy(row, range, grid),
            _ => Err(ConfigurationError::MissingPeriodSpecification),
        }
    }

    /// Sorts an explicit mapping by column index.
    pub fn resolve_explicit(&self, mapping: &[PeriodMappingEntry]) -> Result<Vec<PeriodColumn>> {
        let mut periods = mapping
            .iter()
            .map(|entry| {
                Ok(PeriodColumn {
                    column: entry.column.clone(),
                    index: entry.column.index()?,
                    label: entry.period_label.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        periods.sort_by_key(|p| p.index);
        Ok(periods)
    }

    /// Reads period labels from a legacy header row, skipping blank columns.
    pub fn convert_legacy<G: GridAccessor + ?Sized>(
        &self,
        periods_row: i64,
        periods_range: &str,
        grid: &G,
    ) -> Result<Vec<PeriodColumn>> {
        let row = u32::try_from(periods_row)
            .ok()
            .filter(|r| *r > 0)
            .ok_or(ConfigurationError::InvalidPeriodsRow(periods_row))?;
        let (start, end, range_row) = parse_periods_range(periods_range)?;

        if range_row != row {
            debug!(
                "Periods range '{}' names row {} but periodsRow is {}; reading row {}",
                periods_range, range_row, row, row
            );
        }

        let mut periods = Vec::new();
        for index in start..=end {
            let cell = grid.cell_value(row, index);
            match self.header_label(&cell) {
                Some(label) => periods.push(PeriodColumn {
                    column: ColumnRef::from_index(index),
                    index,
                    label,
                }),
                None => debug!("Skipping blank period header at column {}", index),
            }
        }

        if periods.is_empty() {
            warn!(
                "No period headers found in row {} range {}",
                row, periods_range
            );
        }

        Ok(periods)
    }

    fn header_label(&self, cell: &CellValue) -> Option<String> {
        match cell {
            CellValue::Empty => None,
            CellValue::Text(text) if text.trim().is_empty() => None,
            CellValue::Number(value) => Some(self.numeric_label(*value, &value.to_string())),
            CellValue::Text(text) => match parse_numeric_text(text) {
                Some(value) => Some(self.numeric_label(value, text)),
                None => Some(text.clone()),
            },
        }
    }

    fn numeric_label(&self, value: f64, raw: &str) -> String {
        if self.serial_window.contains(value) {
            if let Some(label) = serial_period_label(value) {
                return label;
            }
        }
        raw.to_string()
    }
}

fn periods_range_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PERIODS_RANGE_PATTERN).expect("invalid periods range regex"))
}

/// Parses `"B3:N3"` into `(start_column, end_column, row)`.
pub fn parse_periods_range(range: &str) -> Result<(u32, u32, u32)> {
    let invalid = || ConfigurationError::InvalidPeriodsRange(range.to_string());

    let caps = periods_range_regex()
        .captures(range)
        .ok_or_else(invalid)?;

    let start = column_index(&caps[1])?;
    let end = column_index(&caps[3])?;
    let row: u32 = caps[2].parse().map_err(|_| invalid())?;

    if start > end {
        return Err(invalid());
    }

    Ok((start, end, row))
}

pub fn resolve_periods<G: GridAccessor + ?Sized>(
    config: &Configuration,
    grid: &G,
) -> Result<Vec<PeriodColumn>> {
    PeriodMapper::new(&EngineSettings::default()).resolve(config.structure()?, grid)
}

/// Returns a copy of the configuration with legacy period fields replaced by
/// an explicit `periodMapping`. Explicit configurations come back unchanged.
pub fn migrate_legacy_periods<G: GridAccessor + ?Sized>(
    config: &Configuration,
    grid: &G,
    settings: &EngineSettings,
) -> Result<Configuration> {
    let structure = config.structure()?;
    if !structure.period_mapping.is_empty() {
        return Ok(config.clone());
    }

    let periods = PeriodMapper::new(settings).resolve(structure, grid)?;
    info!(
        "Converted legacy period specification into {} explicit period columns",
        periods.len()
    );

    let mut migrated = config.clone();
    if let Some(s) = migrated.structure.as_mut() {
        s.period_mapping = periods.iter().map(PeriodMappingEntry::from).collect();
        s.periods_row = None;
        s.periods_range = None;
    }

    Ok(migrated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::schema::StatementType;

    fn legacy_structure(row: i64, range: &str) -> Structure {
        let mut structure = Structure::empty(StatementType::CashFlow);
        structure.periods_row = Some(row);
        structure.periods_range = Some(range.to_string());
        structure
    }

    fn header_grid() -> Grid {
        let mut grid = Grid::default();
        grid.set(3, 0, "Concept");
        grid.set(3, 1, 45292.0);
        grid.set(3, 2, "Custom Label");
        grid.set(3, 3, 45323.0);
        grid
    }

    #[test]
    fn test_legacy_conversion_labels() {
        let mapper = PeriodMapper::new(&EngineSettings::default());
        let periods = mapper
            .resolve(&legacy_structure(3, "B3:D3"), &header_grid())
            .unwrap();

        let labels: Vec<&str> = periods.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["Jan 2024", "Custom Label", "Feb 2024"]);
        let columns: Vec<&str> = periods.iter().map(|p| p.column.as_str()).collect();
        assert_eq!(columns, vec!["B", "C", "D"]);

        let again = mapper
            .resolve(&legacy_structure(3, "B3:D3"), &header_grid())
            .unwrap();
        assert_eq!(periods, again);
    }

    #[test]
    fn test_legacy_conversion_skips_blank_and_keeps_raw_numbers() {
        let mut grid = Grid::default();
        grid.set(1, 1, "Q1");
        grid.set(1, 2, "   ");
        grid.set(1, 4, 2024.0);
        grid.set(1, 5, "45323");

        let mapper = PeriodMapper::new(&EngineSettings::default());
        let periods = mapper.convert_legacy(1, "B1:F1", &grid).unwrap();

        let labels: Vec<&str> = periods.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["Q1", "2024", "Feb 2024"]);
        assert_eq!(periods[1].index, 4);
    }

    #[test]
    fn test_explicit_mapping_is_sorted() {
        let mut structure = Structure::empty(StatementType::ProfitAndLoss);
        structure.period_mapping = vec![
            PeriodMappingEntry {
                column: ColumnRef::new("AA"),
                period_label: "Later".to_string(),
            },
            PeriodMappingEntry {
                column: ColumnRef::new("C"),
                period_label: "Earlier".to_string(),
            },
        ];

        let periods = PeriodMapper::new(&EngineSettings::default())
            .resolve(&structure, &Grid::default())
            .unwrap();

        assert_eq!(periods[0].label, "Earlier");
        assert_eq!(periods[0].index, 2);
        assert_eq!(periods[1].index, 26);
    }

    #[test]
    fn test_parse_periods_range_repeated_calls() {
        for _ in 0..3 {
            assert_eq!(parse_periods_range("B3:N3").unwrap(), (1, 13, 3));
            assert_eq!(parse_periods_range("AA10:AC10").unwrap(), (26, 28, 10));
            assert!(matches!(
                parse_periods_range("B3-N3"),
                Err(ConfigurationError::InvalidPeriodsRange(_))
            ));
        }
    }

    #[test]
    fn test_missing_and_malformed_specifications() {
        let mapper = PeriodMapper::new(&EngineSettings::default());
        let grid = Grid::default();

        let bare = Structure::empty(StatementType::CashFlow);
        assert!(matches!(
            mapper.resolve(&bare, &grid),
            Err(ConfigurationError::MissingPeriodSpecification)
        ));

        for bad in ["B3-N3", "b3:n3", "B:N", "B3:N3 ", "N3:B3"] {
            assert!(
                matches!(
                    mapper.resolve(&legacy_structure(3, bad), &grid),
                    Err(ConfigurationError::InvalidPeriodsRange(_))
                ),
                "{bad} should be rejected"
            );
        }

        assert!(matches!(
            mapper.resolve(&legacy_structure(0, "B3:N3"), &grid),
            Err(ConfigurationError::InvalidPeriodsRow(0))
        ));
    }

    #[test]
    fn test_migrate_legacy_periods() {
        let config = Configuration::new(StatementType::CashFlow, legacy_structure(3, "B3:D3"));
        let migrated =
            migrate_legacy_periods(&config, &header_grid(), &EngineSettings::default()).unwrap();

        let structure = migrated.structure().unwrap();
        assert!(structure.periods_row.is_none());
        assert!(structure.periods_range.is_none());
        assert_eq!(structure.period_mapping.len(), 3);
        assert_eq!(structure.period_mapping[0].period_label, "Jan 2024");
        assert_eq!(structure.period_mapping[2].column, ColumnRef::new("D"));

        // The source configuration is left untouched.
        assert!(config.structure().unwrap().period_mapping.is_empty());

        let again =
            migrate_legacy_periods(&migrated, &Grid::default(), &EngineSettings::default())
                .unwrap();
        assert_eq!(again, migrated);
    }
}
