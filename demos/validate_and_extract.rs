use statement_mapper::{
    extract_and_normalize, validate, validate_structure, Configuration, Grid, Severity,
};

const SHEET: &str = "\
Concepto,Ene-24,Feb-24,Mar-24
Ventas Contado,50000,52000,48000
Cobros a Crédito,40000,38000,n/a
TOTAL INGRESOS,90000,90000,48000
Proveedores,-40000,-41000,-39000
Sueldos,-27000,-27000,-28000
TOTAL EGRESOS,-67000,-68000,-67000
SALDO INICIAL,75000,98000,120000
SALDO FINAL,98000,120000,101000
";

const CONFIG: &str = r#"{
    "type": "cashflow",
    "structure": {
        "periodMapping": [
            { "column": "B", "periodLabel": "Jan 2024" },
            { "column": "C", "periodLabel": "Feb 2024" },
            { "column": "D", "periodLabel": "Mar 2024" }
        ],
        "dataRows": {
            "totalInflows": 4,
            "totalOutflows": 7,
            "initialBalance": 8,
            "finalBalance": 9
        },
        "categories": {
            "inflows": {
                "cashSales": { "row": 2, "label": { "en": "Cash sales", "es": "Ventas contado" } },
                "creditCollections": { "row": 3 }
            },
            "outflows": {
                "suppliers": { "row": 5 },
                "payroll": { "row": 6 }
            }
        }
    },
    "metadata": { "currency": "ARS", "locale": "es", "units": "thousands" }
}"#;

fn main() -> anyhow::Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(SHEET.as_bytes());
    let mut records = Vec::new();
    for record in reader.records() {
        records.push(record?.iter().map(str::to_string).collect::<Vec<_>>());
    }
    let grid = Grid::from_text_rows(records);

    let config = Configuration::from_json(CONFIG)?;

    let structural = validate_structure(&config);
    println!(
        "Structure: {} ({} errors, {} warnings)",
        if structural.is_valid { "ok" } else { "invalid" },
        structural.errors.len(),
        structural.warnings.len()
    );

    let report = validate(&config, &grid)?;
    println!(
        "\nConsistency: {}/{} mapped fields valid",
        report.summary.valid_fields, report.summary.total_fields
    );
    for diagnostic in report.errors.iter().chain(&report.warnings) {
        let marker = match diagnostic.severity {
            Severity::Error => "✗",
            Severity::Warning => "!",
        };
        println!("  {} [{}] {}", marker, diagnostic.field, diagnostic.message);
    }
    if let Some(balance) = &report.math_validation.balance_validation {
        println!(
            "  Balance: {:.2} + flows -> {:.2} (sheet says {:.2})",
            balance.initial_balance, balance.calculated_final_balance, balance.final_balance
        );
    }

    if !report.is_valid {
        println!("\nConfiguration would not be activated; extracting anyway for inspection.");
    }

    let data = extract_and_normalize(&config, &grid)?;
    println!("\n{}", data.to_markdown());

    Ok(())
}
