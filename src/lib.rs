//! # Statement Mapper
//!
//! A library for pulling financial statements out of spreadsheet grids using
//! an explicit, per-template mapping configuration, and for checking that the
//! mapped figures are arithmetically consistent before the configuration is
//! trusted in production.
//!
//! ## Core Concepts
//!
//! - **Configuration**: says which column holds which period, which row holds
//!   which total, and which rows make up each category group
//! - **Grid**: anything implementing [`GridAccessor`] (1-based rows, 0-based columns)
//! - **Extraction**: reads every mapped row into a [`ProcessedData`] tree, then
//!   rescales it to base units
//! - **Validation**: recomputes category sums, the cash balance equation and
//!   gross profit from the sheet and reports mismatches as diagnostics
//!
//! ## Example
//!
//! ```rust,ignore
//! use statement_mapper::*;
//!
//! let config = Configuration::from_json(r#"{
//!     "type": "cashflow",
//!     "structure": {
//!         "periodMapping": [{ "column": "B", "periodLabel": "Jan 2024" }],
//!         "dataRows": { "initialBalance": 2, "finalBalance": 6 },
//!         "categories": { "inflows": { "sales": { "row": 3 } } }
//!     },
//!     "metadata": { "currency": "ARS", "units": "thousands" }
//! }"#)?;
//!
//! let grid = Grid::from_text_rows(records);
//! let report = validate(&config, &grid)?;
//! if report.is_valid {
//!     let data = extract_and_normalize(&config, &grid)?;
//!     println!("{}", data.to_markdown());
//! }
//! ```

pub mod error;
pub mod export;
pub mod extractor;
pub mod grid;
pub mod periods;
pub mod report;
pub mod schema;
pub mod settings;
pub mod structural;
pub mod units;
pub mod utils;
pub mod validator;

pub use error::{ConfigurationError, Result};
pub use extractor::Extractor;
pub use grid::{CellValue, Grid, GridAccessor};
pub use periods::{migrate_legacy_periods, resolve_periods, PeriodColumn, PeriodMapper};
pub use report::*;
pub use schema::*;
pub use settings::{EngineSettings, SerialDateWindow};
pub use structural::StructuralValidator;
pub use units::rescale;
pub use validator::ConsistencyValidator;

use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One extracted row: a value per period plus their sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RowSeries {
    pub label: String,
    /// Aligned with [`ProcessedData::periods`]; `None` where the cell was not numeric.
    pub values: Vec<Option<f64>>,
    /// Missing values count as zero.
    pub total: f64,
}

impl RowSeries {
    pub fn new(label: String, values: Vec<Option<f64>>) -> Self {
        let total = utils::series_total(&values);
        Self {
            label,
            values,
            total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategorySeries {
    pub label: String,
    pub values: Vec<Option<f64>>,
    /// Sum of the category's own row. Subcategories never feed into it.
    pub total: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subcategories: BTreeMap<String, RowSeries>,
}

/// The engine's output for one (configuration, grid) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedData {
    pub statement_type: StatementType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Period labels in ascending source column order.
    pub periods: Vec<String>,
    pub data_rows: BTreeMap<DataRowField, RowSeries>,
    pub categories: BTreeMap<CategoryGroupName, BTreeMap<String, CategorySeries>>,
}

impl ProcessedData {
    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = schemars::schema_for!(ProcessedData);
        serde_json::to_string_pretty(&schema)
    }
}

pub struct StatementEngine {
    settings: EngineSettings,
}

impl Default for StatementEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementEngine {
    pub fn new() -> Self {
        Self {
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(settings: EngineSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Resolves periods, extracts every mapped row and rescales to base units.
    pub fn extract_and_normalize<G: GridAccessor + ?Sized>(
        &self,
        config: &Configuration,
        grid: &G,
    ) -> Result<ProcessedData> {
        let structure = config.structure()?;
        let periods = PeriodMapper::new(&self.settings).resolve(structure, grid)?;

        info!(
            "Extracting {} statement over {} periods",
            config.statement_type,
            periods.len()
        );
        debug!(
            "Configuration maps {} data rows and {} category groups",
            structure.data_rows.len(),
            structure.categories.groups().len()
        );

        let data = Extractor::new(config, grid).extract(&periods)?;
        Ok(rescale(data, config.metadata.units))
    }

    pub fn validate<G: GridAccessor + ?Sized>(
        &self,
        config: &Configuration,
        grid: &G,
    ) -> Result<ValidationResult> {
        Ok(ConsistencyValidator::new(config, grid, &self.settings)?.validate())
    }

    pub fn validate_structure(&self, config: &Configuration) -> ValidationResult {
        info!("Checking {} configuration structure", config.statement_type);
        StructuralValidator::new(config).validate()
    }
}

pub fn extract_and_normalize<G: GridAccessor + ?Sized>(
    config: &Configuration,
    grid: &G,
) -> Result<ProcessedData> {
    StatementEngine::new().extract_and_normalize(config, grid)
}

pub fn validate<G: GridAccessor + ?Sized>(
    config: &Configuration,
    grid: &G,
) -> Result<ValidationResult> {
    StatementEngine::new().validate(config, grid)
}

pub fn validate_structure(config: &Configuration) -> ValidationResult {
    StatementEngine::new().validate_structure(config)
}
