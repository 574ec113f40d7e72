//! HTML run reports.
//!
//! A report shows the run settings, the accuracy curve (Plotly) and the most
//! recent label events. Plots are small helpers in [`plots`]; the page itself
//! is rendered with `maud`.
pub mod plots;

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use maud::{html, Markup, PreEscaped, DOCTYPE};

use crate::config::LearnerConfig;
use crate::shared::SessionSnapshot;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.12.1.min.js";

/// Render the report page for a session snapshot.
pub fn render_report(snapshot: &SessionSnapshot, config: &LearnerConfig) -> Markup {
    let plot = plots::plot_accuracy_curve(&snapshot.accuracy, "Model Accuracy");
    let recent = snapshot.recent_events(config.history_limit);
    let status = &snapshot.status;

    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { "Active Learning Report" }
                script src=(PLOTLY_CDN) {}
            }
            body {
                h1 { "Active Learning Report" }
                p { "Generated " (Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()) }

                h2 { "Session" }
                table {
                    tr { th { "State" } td { (status.state.to_string()) } }
                    tr { th { "Queries" } td { (status.queries_completed) " / " (status.budget) } }
                    tr { th { "Pool size" } td { (status.pool_size) } }
                    tr { th { "Strategy" } td { (config.strategy.as_str()) } }
                    tr { th { "Model" } td { (config.model.model_type.name()) } }
                    @if let (Some(first), Some(last)) = (snapshot.accuracy.first(), snapshot.accuracy.last()) {
                        tr { th { "Accuracy" } td { (format!("{:.4} \u{2192} {:.4}", first, last)) } }
                    }
                }

                h2 { "Accuracy" }
                (PreEscaped(plot.to_inline_html(Some("accuracy-curve"))))

                h2 { "Recent labels" }
                @if recent.is_empty() {
                    p { "No labels yet." }
                } @else {
                    table {
                        tr { th { "Step" } th { "Sample" } th { "Label" } th { "Accuracy" } th { "Labeled at" } }
                        @for event in recent {
                            tr {
                                td { (event.step) }
                                td { (event.sample_id.to_string()) }
                                td { (event.label) }
                                td { (format!("{:.4}", event.accuracy)) }
                                td { (event.labeled_at.format("%H:%M:%S").to_string()) }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Render and write the report to `path`.
pub fn write_report<P: AsRef<Path>>(
    path: P,
    snapshot: &SessionSnapshot,
    config: &LearnerConfig,
) -> Result<()> {
    let page = render_report(snapshot, config).into_string();
    std::fs::write(&path, page)
        .with_context(|| format!("Failed to write report: {}", path.as_ref().display()))?;
    log::info!("Report saved to {}", path.as_ref().display());
    Ok(())
}
