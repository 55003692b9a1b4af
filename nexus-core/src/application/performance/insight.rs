use std::fmt::Write;

use crate::domain::PerformanceStat;

const MIN_TOOL_CALLS: u32 = 3;

/// Short, human-readable summary of a scope's track record. `None` until the
/// scope has at least one recorded task.
pub fn render_insight(stat: &PerformanceStat) -> Option<String> {
    if stat.total_tasks == 0 {
        return None;
    }
    let mut out = String::from("## Performance insight\n");
    let _ = writeln!(
        out,
        "- {} tasks, {:.0}% succeeded, {:.1} turns and {:.1}s on average",
        stat.total_tasks,
        stat.success_rate() * 100.0,
        stat.average_turns(),
        stat.average_duration_ms() as f64 / 1000.0
    );

    let mut shaky: Vec<_> = stat
        .tool_usage
        .iter()
        .filter(|(_, usage)| usage.calls >= MIN_TOOL_CALLS && usage.error_rate() > 0.3)
        .collect();
    shaky.sort_by(|a, b| b.1.error_rate().total_cmp(&a.1.error_rate()));
    for (name, usage) in shaky.iter().take(3) {
        let _ = writeln!(
            out,
            "- `{name}` fails often ({:.0}% of {} calls)",
            usage.error_rate() * 100.0,
            usage.calls
        );
    }

    let reliable: Vec<&str> = stat
        .tool_usage
        .iter()
        .filter(|(_, usage)| usage.calls >= MIN_TOOL_CALLS && usage.success_rate() >= 0.9)
        .map(|(name, _)| name.as_str())
        .take(5)
        .collect();
    if !reliable.is_empty() {
        let _ = writeln!(out, "- Reliable tools: {}", reliable.join(", "));
    }

    for snippet in stat.recent_errors.iter().filter(|s| s.count > 1).take(3) {
        let _ = writeln!(out, "- Recurring error (x{}): {}", snippet.count, snippet.text);
    }
    Some(out.trim_end().to_string())
}
