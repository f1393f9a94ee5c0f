//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output: colored messages,
//! the copy progress bar and the tables printed by `inspect` and `preview`.

use crate::association::FieldSummary;
use crate::file_organizer::CopyPlan;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bars for copy runs
/// - Field summaries and copy plans
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use runfiler::output::OutputFormatter;
    /// OutputFormatter::success("All runs copied");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a regular message without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for a copy run of `total` files.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use runfiler::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.set_position(1);
    /// pb.finish_with_message("done");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb
    }

    /// Prints the tokens of a representative filename with their indices.
    pub fn token_table(tokens: &[&str]) {
        let width = tokens.len().saturating_sub(1).to_string().len().max(5);
        println!("{:>width$} | {}", "Index".bold(), "Token".bold(), width = width);
        println!("{}", "-".repeat(width + 20));
        for (index, token) in tokens.iter().enumerate() {
            println!("{:>width$} | {}", index, token, width = width);
        }
    }

    /// Prints the distinct values of every field.
    ///
    /// Each field is shown as `Name (n elements)` followed by its values
    /// and the number of runs carrying each of them.
    ///
    /// ```no_run
    /// use runfiler::association::FieldSummary;
    /// use runfiler::output::OutputFormatter;
    ///
    /// OutputFormatter::field_summary_table(&[FieldSummary {
    ///     name: "Group".to_string(),
    ///     values: vec![("WT".to_string(), 3), ("MU".to_string(), 2)],
    /// }]);
    /// ```
    pub fn field_summary_table(summary: &[FieldSummary]) {
        Self::header("FIELDS");

        for field in summary {
            let label = format!("{} ({} elements)", field.name, field.len());
            println!("{}", label.bold());

            if field.is_empty() {
                println!("  {}", "No element found".dimmed());
                continue;
            }

            let width = field.values.iter().map(|(v, _)| v.len()).max().unwrap_or(0);
            for (value, count) in &field.values {
                let run_word = if *count == 1 { "run" } else { "runs" };
                println!(
                    "  {:<width$} | {} {}",
                    value,
                    count.to_string().green(),
                    run_word,
                    width = width
                );
            }
        }
    }

    /// Prints every directory and copy of a plan.
    pub fn plan_listing(plan: &CopyPlan) {
        Self::header("DIRECTORIES");
        for dir in plan.directories() {
            println!("  {}", dir.display());
        }

        Self::header("COPIES");
        for copy in plan.copies() {
            println!(
                "  [{}] {} -> {}",
                copy.class.to_string().cyan(),
                copy.source.display(),
                copy.destination.display()
            );
        }
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}
