use bephookgen::pipeline::{FileOutcome, PipelineReport};
use comfy_table::{presets, CellAlignment, ContentArrangement, Table};

/// Column alignment for tabular output.
#[derive(Clone, Copy)]
pub enum Align {
    Left,
    Right,
}

/// Whitespace-aligned table backed by `comfy-table`.
pub struct TabWriter {
    table: Table,
}

impl TabWriter {
    /// Create a new `TabWriter` from `(header, alignment)` column definitions.
    pub fn new(columns: &[(&str, Align)]) -> Self {
        let mut table = Table::new();
        table
            .load_preset(presets::NOTHING)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(columns.iter().map(|(name, _)| *name));

        let last = columns.len().saturating_sub(1);
        for (i, (_, align)) in columns.iter().enumerate() {
            if let Some(col) = table.column_mut(i) {
                col.set_cell_alignment(match align {
                    Align::Left => CellAlignment::Left,
                    Align::Right => CellAlignment::Right,
                });
                let pad_left = if i == 0 { 0 } else { 1 };
                let pad_right = if i == last { 0 } else { 1 };
                col.set_padding((pad_left, pad_right));
            }
        }

        Self { table }
    }

    /// Add a row. Values are given in column order.
    pub fn row(&mut self, values: Vec<String>) {
        self.table.add_row(values);
    }

    /// Render the table with trailing whitespace removed.
    pub fn render(&self) -> String {
        self.table
            .to_string()
            .lines()
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Print the table to stdout.
    pub fn print(&self) {
        println!("{}", self.render());
    }
}

/// One line per input: what happened and why.
pub fn summary(report: &PipelineReport) -> TabWriter {
    let mut writer = TabWriter::new(&[
        ("File", Align::Left),
        ("Result", Align::Left),
        ("Hash", Align::Left),
        ("Hooks", Align::Right),
        ("Skipped", Align::Right),
    ]);

    for (input, outcome) in &report.files {
        let file = input
            .file_name()
            .map_or_else(|| input.display().to_string(), |name| name.to_string_lossy().into_owned());

        let row = match outcome {
            FileOutcome::Skipped { hash } => vec![
                file,
                "up to date".to_string(),
                hash.to_string(),
                "-".to_string(),
                "-".to_string(),
            ],
            FileOutcome::Processed {
                hash,
                reason,
                stats,
            } => vec![
                file,
                format!("processed ({reason})"),
                hash.to_string(),
                stats.hooks.to_string(),
                stats.skipped.to_string(),
            ],
        };
        writer.row(row);
    }

    writer
}
