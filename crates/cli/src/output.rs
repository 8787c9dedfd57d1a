//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

use odata_compliance_harness::session::TestFilter;
use odata_compliance_harness::{RunResult, Status, SuiteRegistry, TestCaseResult};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

impl TableDisplay for TestCaseResult {
    fn headers() -> Vec<&'static str> {
        vec!["Suite", "Test", "Status", "Time", "Reason"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.suite.clone(),
            self.name.clone(),
            self.status().to_string(),
            format!("{} ms", self.duration_ms),
            self.outcome.reason().unwrap_or_default().to_string(),
        ]
    }
}

/// One registered test, as shown by `--list`
#[derive(Debug, Serialize)]
pub struct ListedTest {
    pub suite: String,
    pub name: String,
    pub description: String,
    pub selected: bool,
}

impl TableDisplay for ListedTest {
    fn headers() -> Vec<&'static str> {
        vec!["Suite", "Test", "Description", "Selected"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.suite.clone(),
            self.name.clone(),
            self.description.clone(),
            if self.selected { "yes" } else { "no" }.to_string(),
        ]
    }
}

pub fn listing(registry: &SuiteRegistry, filter: &TestFilter) -> Vec<ListedTest> {
    registry
        .suites()
        .iter()
        .flat_map(|suite| {
            suite.tests().iter().map(move |test| ListedTest {
                suite: suite.title().to_string(),
                name: test.name().to_string(),
                description: test.description().to_string(),
                selected: filter.selects(suite.title(), test.name()),
            })
        })
        .collect()
}

fn status_color(status: Status) -> Color {
    match status {
        Status::Passed => Color::Green,
        Status::Failed => Color::Red,
        Status::Skipped => Color::Yellow,
    }
}

fn render<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            table.to_string()
        }
        OutputFormat::Json => serde_json::to_string_pretty(items).unwrap_or_default(),
        OutputFormat::Yaml => serde_yaml::to_string(items).unwrap_or_default(),
        OutputFormat::Plain => items
            .iter()
            .map(|item| {
                T::headers()
                    .iter()
                    .zip(item.row())
                    .map(|(header, value)| format!("{}: {}", header, value))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect::<Vec<_>>()
            .join("\n---\n"),
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }
    println!("{}", render(items, format));
}

/// Render a finished run. Structured formats carry the whole result.
pub fn render_run(run: &RunResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(run).unwrap_or_default(),
        OutputFormat::Yaml => serde_yaml::to_string(run).unwrap_or_default(),
        OutputFormat::Plain => run
            .tests()
            .map(|t| match t.outcome.reason() {
                Some(reason) => format!("{} {}/{}: {}", t.status(), t.suite, t.name, reason),
                None => format!("{} {}/{}", t.status(), t.suite, t.name),
            })
            .chain(std::iter::once(run.summary().to_string()))
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(TestCaseResult::headers());

            for test in run.tests() {
                let mut row = test.row().into_iter().map(Cell::new).collect::<Vec<_>>();
                row[2] = Cell::new(test.status().to_string()).fg(status_color(test.status()));
                table.add_row(row);
            }

            table.to_string()
        }
    }
}

pub fn print_run(run: &RunResult, format: OutputFormat) {
    println!("{}", render_run(run, format));

    if format == OutputFormat::Table {
        let summary = run.summary();
        let line = format!("Run {}: {}", run.run_id, summary);
        if run.is_success() {
            print_success(&line);
        } else {
            print_error(&line);
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message.green());
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message.red());
}

/// Print warning message
pub fn print_warning(message: &str) {
    eprintln!("⚠️  {}", message.yellow());
}
