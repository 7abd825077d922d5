use anyhow::{Context, Result};
use serde_json::{Value, json};

use crate::enforce::{CHART_HEIGHT, CHART_WIDTH};

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.27.0.min.js";

/// JSON for inline `<script>` use; `</` would otherwise end the script early.
fn script_json(value: &Value) -> String {
    value.to_string().replace("</", "<\\/")
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render a Plotly figure spec as a self-contained HTML fragment.
///
/// The figure is data only: a `data` array of traces and an optional `layout`.
/// Nothing in it is evaluated.
pub fn render_figure_html(spec: &str) -> Result<String> {
    let figure: Value = serde_json::from_str(spec).context("Chart is not a valid figure spec")?;

    let data = figure
        .get("data")
        .filter(|d| d.is_array())
        .context("Figure spec has no data array")?;
    let layout = figure.get("layout").cloned().unwrap_or_else(|| json!({}));
    let config = json!({ "displaylogo": false, "responsive": false });

    let element_id = format!("chart-{}", uuid::Uuid::new_v4().simple());

    Ok(format!(
        r#"<script src="{PLOTLY_CDN}" charset="utf-8"></script>
<div id="{element_id}" class="plotly-chart" style="height:{CHART_HEIGHT}px;width:{CHART_WIDTH}px;"></div>
<script type="text/javascript">Plotly.newPlot("{element_id}", {}, {}, {});</script>"#,
        script_json(data),
        script_json(&layout),
        script_json(&config),
    ))
}

/// Fragment shown in place of a chart that could not be produced
pub fn error_html(message: &str) -> String {
    format!(
        r#"<div class="chart-error">Error generating chart: {}</div>"#,
        escape_html(message)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_div_and_plot_call() {
        let html = render_figure_html(
            r#"{"data": [{"type": "pie", "labels": ["a</script>"], "values": [1]}], "layout": {"height": 350}}"#,
        )
        .unwrap();

        assert!(html.contains(r#"class="plotly-chart""#));
        assert!(html.contains("Plotly.newPlot(\"chart-"));
        assert!(html.contains(r#""height":350"#));
        assert!(!html.contains("a</script>"));
    }

    #[test]
    fn each_render_gets_its_own_element() {
        let spec = r#"{"data": []}"#;
        assert_ne!(render_figure_html(spec).unwrap(), render_figure_html(spec).unwrap());
    }

    #[test]
    fn code_is_not_a_figure() {
        assert!(render_figure_html("fig = px.bar(df)").is_err());
        assert!(render_figure_html(r#"{"layout": {}}"#).is_err());
    }

    #[test]
    fn error_fragment_is_escaped() {
        assert_eq!(
            error_html("bad <data>"),
            r#"<div class="chart-error">Error generating chart: bad &lt;data&gt;</div>"#
        );
    }
}
