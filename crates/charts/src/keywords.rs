/// Words that mark a request as asking for a visual.
pub const CHART_KEYWORDS: &[&str] = &[
    "chart", "graph", "plot", "visual", "pie", "bar", "barh", "line", "scatter",
    "histogram", "heatmap", "boxplot", "distribution", "trend", "time series",
    "dashboard", "visualization", "map", "bubble", "treemap", "funnel", "gauge",
    "area", "donut", "violin", "pareto", "tile", "scorecard", "calendar", "heat",
    "flow", "network", "cohort", "forecast", "seasonal", "trendline", "comparison",
    "summary", "overview", "slice", "breakdown", "distribution chart",
    "performance chart", "kpi", "metric", "speedometer", "traffic light",
    "waterfall", "stacked", "multi-line", "multi-bar", "interactive", "real-time",
    "live",
];

/// Substring match against [`CHART_KEYWORDS`], case-insensitive.
pub fn is_chart_request(user_input: &str) -> bool {
    let lowered = user_input.to_lowercase();
    CHART_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}
