pub mod enforce;
pub mod keywords;
pub mod render;

pub use enforce::{ChartValidation, enforce_chart_dimensions, validate_chart_dimensions};
pub use keywords::{CHART_KEYWORDS, is_chart_request};
pub use render::{error_html, render_figure_html};

use anyhow::Result;

/// Enforce layout rules on a generated chart and render it.
pub fn build_chart_html(generated: &str) -> Result<String> {
    let compliant = enforce_chart_dimensions(generated);

    let validation = validate_chart_dimensions(&compliant);
    if !validation.is_valid {
        tracing::warn!(issues = ?validation.issues, "Chart still violates layout rules after enforcement");
    }

    render_figure_html(&compliant)
}
