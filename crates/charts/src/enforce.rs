use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::LazyLock;

pub const CHART_HEIGHT: u32 = 350;
pub const CHART_WIDTH: u32 = 580;
pub const CHART_TEMPLATE: &str = "plotly_white";

static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)\r?\n?```\s*$").expect("valid regex")
});
static HEIGHT: LazyLock<Regex> = LazyLock::new(|| dimension_regex("height"));
static WIDTH: LazyLock<Regex> = LazyLock::new(|| dimension_regex("width"));
static AUTOSIZE_TRUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\bautosize\b["']?\s*[:=]\s*)(true|True)\b"#).expect("valid regex")
});
static AUTOSIZE_FALSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bautosize\b["']?\s*[:=]\s*(false|False)\b"#).expect("valid regex")
});
static MARGIN: LazyLock<Regex> = LazyLock::new(|| setting_regex("margin"));
static TEMPLATE: LazyLock<Regex> = LazyLock::new(|| setting_regex("template"));
static DISPLAY_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.show\s*\(|\bwebbrowser\.open\s*\(|\bwindow\.open\s*\(").expect("valid regex")
});

fn dimension_regex(key: &str) -> Regex {
    Regex::new(&format!(
        r#"(\b{key}\b["']?\s*[:=]\s*)(-?\d+(?:\.\d+)?|null|None)"#
    ))
    .expect("valid regex")
}

/// Captures the first token of the assigned value.
fn setting_regex(key: &str) -> Regex {
    Regex::new(&format!(r#"\b{key}\b["']?\s*[:=]\s*([^\s,)]*)"#)).expect("valid regex")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartValidation {
    pub is_valid: bool,
    pub issues: Vec<String>,
}

fn strip_fences(code: &str) -> String {
    let trimmed = code.trim();
    match FENCE.captures(trimmed) {
        Some(caps) => caps[1].trim().to_string(),
        None => trimmed.to_string(),
    }
}

fn remove_display_calls(code: &str) -> String {
    code.lines()
        .filter(|line| !DISPLAY_CALL.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn rewrite_dimensions(code: &str) -> String {
    let code = HEIGHT.replace_all(code, format!("${{1}}{CHART_HEIGHT}"));
    let code = WIDTH.replace_all(&code, format!("${{1}}{CHART_WIDTH}"));
    AUTOSIZE_TRUE
        .replace_all(&code, |caps: &Captures| {
            let value = if &caps[2] == "True" { "False" } else { "false" };
            format!("{}{}", &caps[1], value)
        })
        .into_owned()
}

fn declared_values(pattern: &Regex, code: &str) -> Vec<String> {
    pattern
        .captures_iter(code)
        .map(|caps| caps[2].to_string())
        .collect()
}

fn has_declared(pattern: &Regex, code: &str, expected: u32) -> bool {
    declared_values(pattern, code)
        .iter()
        .any(|value| value.parse::<f64>().ok() == Some(f64::from(expected)))
}

/// A margin or template assigned `null`/`None` does not count.
fn declares_setting(pattern: &Regex, code: &str) -> bool {
    pattern
        .captures_iter(code)
        .any(|caps| !matches!(&caps[1], "" | "null" | "None"))
}

fn has_margin(layout: &Map<String, Value>) -> bool {
    layout.get("margin").is_some_and(Value::is_object)
}

fn has_template(layout: &Map<String, Value>) -> bool {
    match layout.get("template") {
        Some(Value::String(name)) => !name.trim().is_empty(),
        Some(Value::Object(_)) => true,
        _ => false,
    }
}

/// Only the figure's `layout` is touched; trace-level keys such as a bar
/// `width` keep their values.
fn enforce_layout(figure: &mut Map<String, Value>) {
    let layout = figure.entry("layout").or_insert_with(|| json!({}));
    if !layout.is_object() {
        *layout = json!({});
    }

    if let Some(layout) = layout.as_object_mut() {
        layout.insert("height".into(), json!(CHART_HEIGHT));
        layout.insert("width".into(), json!(CHART_WIDTH));
        layout.insert("autosize".into(), json!(false));
        if !has_margin(layout) {
            layout.insert("margin".into(), json!({"l": 50, "r": 50, "t": 50, "b": 50}));
        }
        if !has_template(layout) {
            layout.insert("template".into(), json!(CHART_TEMPLATE));
        }
    }
}

fn layout_issues(figure: &Map<String, Value>) -> Vec<String> {
    let empty = Map::new();
    let layout = figure.get("layout").and_then(Value::as_object).unwrap_or(&empty);
    let mut issues = Vec::new();

    for (label, expected) in [("height", CHART_HEIGHT), ("width", CHART_WIDTH)] {
        match layout.get(label) {
            None | Some(Value::Null) => issues.push(format!("Missing {label}={expected}")),
            Some(value) if value.as_f64() != Some(f64::from(expected)) => {
                issues.push(format!("{label} must be {expected}, found {value}"));
            }
            Some(_) => {}
        }
    }

    match layout.get("autosize") {
        Some(Value::Bool(false)) => {}
        Some(Value::Bool(true)) => issues.push("autosize must be False".to_string()),
        _ => issues.push("Missing autosize=False".to_string()),
    }

    if !has_margin(layout) {
        issues.push("Missing margin settings".to_string());
    }
    if !has_template(layout) {
        issues.push("Missing template setting".to_string());
    }

    issues
}

fn append_missing_settings(code: String) -> String {
    let mut missing = Vec::new();

    if !has_declared(&HEIGHT, &code, CHART_HEIGHT) {
        missing.push(format!("height={CHART_HEIGHT}"));
    }
    if !has_declared(&WIDTH, &code, CHART_WIDTH) {
        missing.push(format!("width={CHART_WIDTH}"));
    }
    if !AUTOSIZE_FALSE.is_match(&code) {
        missing.push("autosize=False".to_string());
    }
    if !declares_setting(&MARGIN, &code) {
        missing.push("margin=dict(l=50, r=50, t=50, b=50)".to_string());
    }
    if !declares_setting(&TEMPLATE, &code) {
        missing.push(format!("template=\"{CHART_TEMPLATE}\""));
    }

    if missing.is_empty() {
        return code;
    }

    let update = format!("fig.update_layout({})", missing.join(", "));
    if code.is_empty() {
        update
    } else {
        format!("{code}\n{update}")
    }
}

/// Force every chart to 350x580 with autosize off, a margin and a template,
/// and drop anything that would open a display window.
///
/// Figure specs (`{"data": [...], "layout": {...}}`) get their layout fixed in
/// place; any other text gets a trailing `fig.update_layout(...)` for whatever
/// is still missing. Applying this twice gives the same result as once.
pub fn enforce_chart_dimensions(code: &str) -> String {
    let code = strip_fences(code);

    if let Ok(Value::Object(mut figure)) = serde_json::from_str::<Value>(&code) {
        enforce_layout(&mut figure);
        return serde_json::to_string_pretty(&Value::Object(figure)).unwrap_or(code);
    }

    let code = remove_display_calls(&code);
    append_missing_settings(rewrite_dimensions(&code))
}

/// Report every setting that would make the chart render at the wrong size.
pub fn validate_chart_dimensions(code: &str) -> ChartValidation {
    if let Ok(Value::Object(figure)) = serde_json::from_str::<Value>(code.trim()) {
        let issues = layout_issues(&figure);
        return ChartValidation {
            is_valid: issues.is_empty(),
            issues,
        };
    }

    let mut issues = Vec::new();

    for (label, pattern, expected) in [("height", &*HEIGHT, CHART_HEIGHT), ("width", &*WIDTH, CHART_WIDTH)] {
        let values = declared_values(pattern, code);
        if values.is_empty() {
            issues.push(format!("Missing {label}={expected}"));
        }
        for value in values {
            if value.parse::<f64>().ok() != Some(f64::from(expected)) {
                issues.push(format!("{label} must be {expected}, found {value}"));
            }
        }
    }

    if AUTOSIZE_TRUE.is_match(code) {
        issues.push("autosize must be False".to_string());
    } else if !AUTOSIZE_FALSE.is_match(code) {
        issues.push("Missing autosize=False".to_string());
    }

    if !declares_setting(&MARGIN, code) {
        issues.push("Missing margin settings".to_string());
    }
    if !declares_setting(&TEMPLATE, code) {
        issues.push("Missing template setting".to_string());
    }

    for line in code.lines().filter(|line| DISPLAY_CALL.is_match(line)) {
        issues.push(format!("Remove display call: {}", line.trim()));
    }

    ChartValidation {
        is_valid: issues.is_empty(),
        issues,
    }
}
