use crate::stats::{ConditionSummary, TrialResult};
use std::borrow::Cow;
use std::fmt::Write;

pub const TRIALS_HEADER: &str = "trial,proto,path,latency_s,bytes";
pub const CONDITIONS_HEADER: &str = "loss,delay_ms,quic_avg,tcp_avg";

/// Seconds with microsecond precision, `inf` for the timeout sentinel.
pub fn format_latency(secs: f64) -> String {
    if secs.is_finite() {
        format!("{secs:.6}")
    } else {
        "inf".to_string()
    }
}

/// Quote a field holding a separator, quote or line break (RFC 4180).
fn quote_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Rows for `benchmark_results.csv`.
pub fn trials_csv(results: &[TrialResult]) -> String {
    let mut out = String::with_capacity(64 * (results.len() + 1));
    out.push_str(TRIALS_HEADER);
    out.push('\n');
    for r in results {
        let _ = writeln!(
            out,
            "{},{},{},{},{}",
            r.trial_index,
            r.protocol.label(),
            quote_field(&r.path),
            format_latency(r.latency_secs),
            r.bytes
        );
    }
    out
}

/// Rows for `loss_results.csv`, one per condition.
pub fn conditions_csv(summaries: &[ConditionSummary]) -> String {
    let mut out = String::from(CONDITIONS_HEADER);
    out.push('\n');
    for s in summaries {
        let _ = writeln!(
            out,
            "{},{},{},{}",
            s.loss_percent,
            s.delay_ms,
            format_latency(s.mean_latency_multiplexed),
            format_latency(s.mean_latency_baseline)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Protocol;
    use std::time::Duration;

    #[test]
    fn test_trials_csv() {
        let rows = vec![
            TrialResult::completed(
                Protocol::Multiplexed,
                1,
                "/index.html",
                Duration::from_millis(12),
                1024,
                Some(200),
            ),
            TrialResult::timed_out(Protocol::Baseline, 1, "/index.html", 300, None),
        ];

        let csv = trials_csv(&rows);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], TRIALS_HEADER);
        assert_eq!(lines[1], "1,QUIC,/index.html,0.012000,1024");
        assert_eq!(lines[2], "1,TCP,/index.html,inf,300");
    }

    #[test]
    fn test_path_with_separator_is_quoted() {
        let rows = vec![TrialResult::timed_out(
            Protocol::Baseline,
            2,
            "/a,b \"c\".bin",
            0,
            None,
        )];

        let csv = trials_csv(&rows);
        assert_eq!(
            csv.lines().nth(1).unwrap(),
            "2,TCP,\"/a,b \"\"c\"\".bin\",inf,0"
        );
        assert_eq!(quote_field("/plain.html"), "/plain.html");
    }

    #[test]
    fn test_conditions_csv() {
        let summary = ConditionSummary {
            loss_percent: 5.0,
            delay_ms: 50,
            trials: 5,
            mean_latency_multiplexed: 0.25,
            mean_latency_baseline: f64::INFINITY,
            timeouts_multiplexed: 0,
            timeouts_baseline: 1,
        };

        let csv = conditions_csv(&[summary]);
        assert_eq!(csv, format!("{CONDITIONS_HEADER}\n5,50,0.250000,inf\n"));
    }
}
