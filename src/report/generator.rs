//! Dashboard report generation.
//!
//! This module builds a [`Dashboard`] from the live aggregator and renders
//! it as Markdown or JSON.

use crate::analysis::IndicatorAggregator;
use crate::models::{
    AnalysisLog, Category, CategoryPanel, Dashboard, DashboardMetadata, Indicator,
    IndicatorReading, ThreatLevel,
};
use crate::scheduler::format_countdown;
use anyhow::Result;
use chrono::Utc;

/// Width of the indicator bars, in cells.
const BAR_WIDTH: usize = 20;

/// Capture the aggregator's current state as a dashboard.
pub fn build_dashboard(
    aggregator: &IndicatorAggregator,
    model_used: &str,
    log: &AnalysisLog,
) -> Dashboard {
    let score = aggregator.escalation_score();
    let level = aggregator.threshold_label(score);
    let weights = aggregator.model().weights;

    let categories = Category::ALL
        .iter()
        .map(|category| CategoryPanel {
            category: *category,
            title: category.title().to_string(),
            weight: weights.weight(*category),
            average: aggregator.category_average(*category),
            indicators: category
                .indicators()
                .iter()
                .map(|indicator| reading(aggregator, *indicator))
                .collect(),
        })
        .collect();

    Dashboard {
        metadata: DashboardMetadata {
            generated_at: Utc::now(),
            model_used: model_used.to_string(),
            escalation_score: score,
            threat_level: level,
            headline: level.headline().to_string(),
            revision: aggregator.revision(),
            next_scan_in: None,
        },
        categories,
        sitrep: None,
        analysis_report: None,
        analysis_log: log.entries().cloned().collect(),
    }
}

fn reading(aggregator: &IndicatorAggregator, indicator: Indicator) -> IndicatorReading {
    let value = aggregator.value(indicator);
    IndicatorReading {
        key: indicator.key().to_string(),
        label: indicator.label().to_string(),
        value,
        hot: Indicator::is_hot(value),
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(dashboard: &Dashboard) -> String {
    let mut output = String::new();

    output.push_str("# Defcon Tracker\n\n");
    output.push_str(&generate_probability_section(&dashboard.metadata));
    output.push_str(&generate_category_summary(&dashboard.categories));

    for panel in &dashboard.categories {
        output.push_str(&generate_panel_section(panel));
    }

    if let Some(ref sitrep) = dashboard.sitrep {
        output.push_str("## Strategic SITREP\n\n");
        output.push_str(sitrep.trim());
        output.push_str("\n\n");
    }

    if let Some(ref text) = dashboard.analysis_report {
        output.push_str("## Analysis Report\n\n");
        output.push_str("```text\n");
        output.push_str(text.trim());
        output.push_str("\n```\n\n");
    }

    if !dashboard.analysis_log.is_empty() {
        output.push_str("## Analysis Log\n\n");
        for entry in &dashboard.analysis_log {
            output.push_str(&format!("- `{}`\n", entry));
        }
        output.push('\n');
    }

    output.push_str(&generate_footer(&dashboard.metadata));
    output
}

/// Generate the escalation probability section.
fn generate_probability_section(metadata: &DashboardMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Escalation Probability\n\n");
    section.push_str(&format!(
        "**{}%** {} {} | `{}`\n\n",
        metadata.escalation_score,
        metadata.threat_level.emoji(),
        metadata.threat_level,
        metadata.headline
    ));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(seconds) = metadata.next_scan_in {
        section.push_str(&format!("- **Next Scan:** {}\n", format_countdown(seconds)));
    }
    section.push_str(&format!("- **Revision:** {}\n\n", metadata.revision));

    section
}

/// Generate the per-category summary table.
fn generate_category_summary(panels: &[CategoryPanel]) -> String {
    let mut section = String::new();

    section.push_str("## Categories\n\n");
    section.push_str("| Category | Weight | Average |\n");
    section.push_str("|:---|:---:|:---:|\n");
    for panel in panels {
        section.push_str(&format!(
            "| {} | {:.2} | {:.1} |\n",
            panel.title, panel.weight, panel.average
        ));
    }
    section.push('\n');

    section
}

/// Generate the indicator table for one category.
fn generate_panel_section(panel: &CategoryPanel) -> String {
    let mut section = String::new();

    section.push_str(&format!("### {} (`{}`)\n\n", panel.title, panel.category));
    section.push_str("| Indicator | Key | Value | |\n");
    section.push_str("|:---|:---|---:|:---|\n");

    for reading in &panel.indicators {
        let marker = if reading.hot { " 🔥" } else { "" };
        section.push_str(&format!(
            "| {} | `{}` | {}%{} | `{}` |\n",
            reading.label,
            reading.key,
            format_value(reading.value),
            marker,
            value_bar(reading.value)
        ));
    }
    section.push('\n');

    section
}

/// Render a value as a fixed-width bar.
pub fn value_bar(value: f64) -> String {
    let filled = ((value.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

fn generate_footer(metadata: &DashboardMetadata) -> String {
    format!(
        "---\n\n*Model: `{}` | Generated by defcon-tracker v{}*\n",
        metadata.model_used,
        env!("CARGO_PKG_VERSION")
    )
}

/// Generate a JSON report.
pub fn generate_json_report(dashboard: &Dashboard) -> Result<String> {
    serde_json::to_string_pretty(dashboard).map_err(Into::into)
}

/// Short multi-line summary for the console.
pub fn generate_console_summary(dashboard: &Dashboard) -> String {
    let meta = &dashboard.metadata;
    let mut lines = Vec::new();

    lines.push(format!(
        "Escalation probability: {}% {} {} ({})",
        meta.escalation_score,
        meta.threat_level.emoji(),
        meta.threat_level,
        meta.headline
    ));

    for panel in &dashboard.categories {
        let hot = panel.indicators.iter().filter(|r| r.hot).count();
        let hot_note = if hot > 0 {
            format!("  [{} hot]", hot)
        } else {
            String::new()
        };
        lines.push(format!(
            "  - {:<24} avg {:>5.1}  x{:.2}{}",
            panel.title, panel.average, panel.weight, hot_note
        ));
    }

    if meta.threat_level == ThreatLevel::Critical {
        lines.push("  ⛔ Critical threshold exceeded".to_string());
    }

    lines.join("\n")
}
