use crate::{ProcessedData, RowSeries};

impl ProcessedData {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// One line per extracted row: data rows first, then each category
    /// followed by its subcategories. Missing values are left blank.
    pub fn to_csv(&self) -> String {
        let mut output = String::new();

        let mut header = vec!["Section".to_string(), "Key".to_string(), "Label".to_string()];
        header.extend(self.periods.iter().map(|p| csv_field(p)));
        header.push("Total".to_string());
        output.push_str(&header.join(","));
        output.push('\n');

        for (field, series) in &self.data_rows {
            push_csv_row(
                &mut output,
                "Data Rows",
                field.key(),
                &series.label,
                &series.values,
                series.total,
            );
        }

        for (group, categories) in &self.categories {
            for (key, category) in categories {
                push_csv_row(
                    &mut output,
                    group.key(),
                    key,
                    &category.label,
                    &category.values,
                    category.total,
                );

                for (sub_key, sub) in &category.subcategories {
                    push_csv_row(
                        &mut output,
                        group.key(),
                        &format!("{}.{}", key, sub_key),
                        &sub.label,
                        &sub.values,
                        sub.total,
                    );
                }
            }
        }

        output
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "# {} Statement\n\n",
            title_case(&self.statement_type.to_string())
        ));
        if let Some(currency) = &self.currency {
            output.push_str(&format!("**Currency:** {}\n\n", currency));
        }
        output.push_str(&format!("**Periods:** {}\n\n", self.periods.len()));

        if !self.data_rows.is_empty() {
            output.push_str("## Totals\n\n");
            self.push_table_header(&mut output);
            for series in self.data_rows.values() {
                push_table_row(&mut output, &series.label, series);
            }
            output.push('\n');
        }

        for (group, categories) in &self.categories {
            output.push_str(&format!("## {}\n\n", title_case(group.key())));
            if categories.is_empty() {
                output.push_str("_No categories_\n\n");
                continue;
            }

            self.push_table_header(&mut output);
            for category in categories.values() {
                let series = RowSeries {
                    label: category.label.clone(),
                    values: category.values.clone(),
                    total: category.total,
                };
                push_table_row(&mut output, &format!("**{}**", category.label), &series);

                for sub in category.subcategories.values() {
                    push_table_row(&mut output, &format!("&nbsp;&nbsp;{}", sub.label), sub);
                }
            }
            output.push('\n');
        }

        output
    }

    fn push_table_header(&self, output: &mut String) {
        output.push_str("| Line |");
        for period in &self.periods {
            output.push_str(&format!(" {} |", period));
        }
        output.push_str(" Total |\n|---|");
        for _ in &self.periods {
            output.push_str("---:|");
        }
        output.push_str("---:|\n");
    }
}

fn push_csv_row(
    output: &mut String,
    section: &str,
    key: &str,
    label: &str,
    values: &[Option<f64>],
    total: f64,
) {
    let mut fields = vec![csv_field(section), csv_field(key), csv_field(label)];
    fields.extend(
        values
            .iter()
            .map(|v| v.map(|x| x.to_string()).unwrap_or_default()),
    );
    fields.push(total.to_string());
    output.push_str(&fields.join(","));
    output.push('\n');
}

fn push_table_row(output: &mut String, line: &str, series: &RowSeries) {
    output.push_str(&format!("| {} |", line));
    for value in &series.values {
        match value {
            Some(v) => output.push_str(&format!(" {:.2} |", v)),
            None => output.push_str(" - |"),
        }
    }
    output.push_str(&format!(" {:.2} |\n", series.total));
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
