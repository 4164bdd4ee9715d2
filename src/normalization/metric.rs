use serde_json::Value;

/// How a metric value is rounded before storage.
///
/// Keeping the precision rules in one table keeps storage stable and
/// comparisons deterministic; adding a benchmark field is a one-line change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rounding {
    /// Index-style scores (0-100), stored to 1 decimal.
    Score,
    /// Ratios/percentages expressed as 0-1, stored to 3 decimals.
    Ratio,
    /// USD amounts, stored to 3 decimals.
    Currency,
    /// Durations in seconds, stored to 1 decimal.
    Seconds,
}

impl Rounding {
    pub const fn decimals(self) -> u32 {
        match self {
            Rounding::Score => 1,
            Rounding::Ratio => 3,
            Rounding::Currency => 3,
            Rounding::Seconds => 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricSpec {
    pub key: &'static str,
    pub rounding: Rounding,
    pub min: f64,
    pub max: f64,
}

impl MetricSpec {
    const fn new(key: &'static str, rounding: Rounding, min: f64, max: f64) -> Self {
        Self {
            key,
            rounding,
            min,
            max,
        }
    }
}

/// Every benchmark field the leaderboard persists, with its precision and
/// accepted range. Values outside the range are treated as absent.
pub const METRIC_SPECS: &[MetricSpec] = &[
    MetricSpec::new("overall_intelligence", Rounding::Score, 0.0, 100.0),
    MetricSpec::new("coding", Rounding::Score, 0.0, 100.0),
    MetricSpec::new("math", Rounding::Score, 0.0, 100.0),
    MetricSpec::new("reasoning", Rounding::Score, 0.0, 100.0),
    MetricSpec::new("mmlu_pro", Rounding::Ratio, 0.0, 1.0),
    MetricSpec::new("gpqa", Rounding::Ratio, 0.0, 1.0),
    MetricSpec::new("hle", Rounding::Ratio, 0.0, 1.0),
    MetricSpec::new("livecodebench", Rounding::Ratio, 0.0, 1.0),
    MetricSpec::new("scicode", Rounding::Ratio, 0.0, 1.0),
    MetricSpec::new("math_500", Rounding::Ratio, 0.0, 1.0),
    MetricSpec::new("aime", Rounding::Ratio, 0.0, 1.0),
    MetricSpec::new("speed", Rounding::Score, 0.0, 100_000.0),
    MetricSpec::new("latency", Rounding::Seconds, 0.0, 3_600.0),
    MetricSpec::new(
        "time_to_first_answer_token",
        Rounding::Seconds,
        0.0,
        3_600.0,
    ),
    MetricSpec::new("price", Rounding::Currency, 0.0, 1_000_000.0),
    MetricSpec::new("cost_efficiency", Rounding::Currency, 0.0, 1_000_000.0),
];

pub fn metric_spec(key: &str) -> Option<&'static MetricSpec> {
    METRIC_SPECS.iter().find(|s| s.key == key)
}

/// Half-up rounding to a fixed number of decimals.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Coerce a raw JSON value to f64 without inventing data: numbers pass
/// through, numeric strings parse, everything else (incl. null) is absent.
pub fn value_as_f64(v: &Value) -> Option<f64> {
    if let Some(n) = v.as_f64() {
        return Some(n);
    }
    if let Some(n) = v.as_i64() {
        return Some(n as f64);
    }
    if let Some(s) = v.as_str() {
        return s.trim().parse::<f64>().ok();
    }
    None
}

/// Normalize a raw metric value through the metric table: finite, in range,
/// rounded. Returns None for unknown keys or unusable values so the caller
/// omits the field rather than storing a bogus zero.
pub fn normalize_metric(key: &str, raw: &Value) -> Option<f64> {
    let spec = metric_spec(key)?;
    let value = value_as_f64(raw)?;
    if !value.is_finite() || value < spec.min || value > spec.max {
        return None;
    }
    Some(round_to(value, spec.rounding.decimals()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rounds_per_field_class() {
        assert_eq!(normalize_metric("coding", &json!(71.248)), Some(71.2));
        assert_eq!(normalize_metric("mmlu_pro", &json!(0.81267)), Some(0.813));
        assert_eq!(normalize_metric("price", &json!(2.49961)), Some(2.5));
        assert_eq!(normalize_metric("latency", &json!(0.4449)), Some(0.4));
    }

    #[test]
    fn parses_numeric_strings() {
        assert_eq!(normalize_metric("speed", &json!("153.2")), Some(153.2));
    }

    #[test]
    fn rejects_null_and_non_numeric() {
        assert_eq!(normalize_metric("speed", &Value::Null), None);
        assert_eq!(normalize_metric("speed", &json!("not-a-number")), None);
        assert_eq!(normalize_metric("speed", &json!({})), None);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert_eq!(normalize_metric("mmlu_pro", &json!(1.5)), None);
        assert_eq!(normalize_metric("coding", &json!(-3.0)), None);
        assert_eq!(normalize_metric("overall_intelligence", &json!(120.0)), None);
    }

    #[test]
    fn unknown_keys_are_dropped() {
        assert_eq!(normalize_metric("elo_rating", &json!(1500)), None);
    }
}
