use crate::domain::{PerformanceStat, RuleTrigger, RuleType, ToolUsage};
use crate::text;

const TOOL_MIN_CALLS: u32 = 5;
const TOOL_ERROR_RATE_LIMIT: f64 = 0.4;
const SUCCESS_DECLINE_MIN_TASKS: u32 = 10;
const SUCCESS_DECLINE_LIMIT: f64 = 0.5;
const EFFICIENCY_TURN_LIMIT: f64 = 20.0;
const POSITIVE_HINT_RATE: f64 = 0.8;
const DECOMPOSITION_FAILURE_LIMIT: f64 = 0.6;
const DECOMPOSITION_TURN_LIMIT: f64 = 15.0;
const ERROR_PATTERN_MIN_COUNT: u32 = 3;

/// A rule proposal before the engine decides whether to activate it.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub rule_type: RuleType,
    pub text: String,
    pub trigger: RuleTrigger,
}

/// Runs every generator; each contributes at most one candidate.
pub fn generate_all(stat: &PerformanceStat) -> Vec<Candidate> {
    [
        tool_error_rate(stat),
        success_decline(stat),
        efficiency_degradation(stat),
        positive_tool_hint(stat),
        task_decomposition(stat),
        error_pattern_memory(stat),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn eligible_tools(stat: &PerformanceStat) -> impl Iterator<Item = (&String, &ToolUsage)> {
    stat.tool_usage
        .iter()
        .filter(|(_, usage)| usage.calls >= TOOL_MIN_CALLS)
}

pub fn tool_error_rate(stat: &PerformanceStat) -> Option<Candidate> {
    let (tool, usage) = eligible_tools(stat)
        .filter(|(_, usage)| usage.error_rate() > TOOL_ERROR_RATE_LIMIT)
        .max_by(|a, b| a.1.error_rate().total_cmp(&b.1.error_rate()))?;
    let rate = usage.error_rate();
    Some(Candidate {
        rule_type: RuleType::ToolErrorRate,
        text: format!(
            "Tool `{tool}` failed {:.0}% of {} recent calls. Check its arguments against the schema before calling it, or prefer an alternative.",
            rate * 100.0,
            usage.calls
        ),
        trigger: RuleTrigger {
            tool: Some(tool.clone()),
            value: rate,
            threshold: TOOL_ERROR_RATE_LIMIT,
            samples: usage.calls,
        },
    })
}

pub fn success_decline(stat: &PerformanceStat) -> Option<Candidate> {
    let rate = stat.success_rate();
    if stat.total_tasks < SUCCESS_DECLINE_MIN_TASKS || rate >= SUCCESS_DECLINE_LIMIT {
        return None;
    }
    Some(Candidate {
        rule_type: RuleType::SuccessDecline,
        text: format!(
            "Only {:.0}% of recent tasks here succeeded. Restate the goal and outline the steps before the first tool call.",
            rate * 100.0
        ),
        trigger: RuleTrigger {
            tool: None,
            value: rate,
            threshold: SUCCESS_DECLINE_LIMIT,
            samples: stat.total_tasks,
        },
    })
}

pub fn efficiency_degradation(stat: &PerformanceStat) -> Option<Candidate> {
    let average = stat.average_turns();
    if average <= EFFICIENCY_TURN_LIMIT {
        return None;
    }
    Some(Candidate {
        rule_type: RuleType::EfficiencyDegradation,
        text: format!(
            "Tasks here take {average:.1} turns on average. Combine related steps and skip calls whose result you already have."
        ),
        trigger: RuleTrigger {
            tool: None,
            value: average,
            threshold: EFFICIENCY_TURN_LIMIT,
            samples: stat.total_tasks,
        },
    })
}

pub fn positive_tool_hint(stat: &PerformanceStat) -> Option<Candidate> {
    let (tool, usage) = eligible_tools(stat)
        .filter(|(_, usage)| usage.success_rate() > POSITIVE_HINT_RATE)
        .max_by(|a, b| {
            a.1.success_rate()
                .total_cmp(&b.1.success_rate())
                .then(a.1.calls.cmp(&b.1.calls))
        })?;
    let rate = usage.success_rate();
    Some(Candidate {
        rule_type: RuleType::PositiveToolHint,
        text: format!(
            "Tool `{tool}` succeeded {:.0}% of {} calls here. Prefer it when it fits the step.",
            rate * 100.0,
            usage.calls
        ),
        trigger: RuleTrigger {
            tool: Some(tool.clone()),
            value: rate,
            threshold: POSITIVE_HINT_RATE,
            samples: usage.calls,
        },
    })
}

pub fn task_decomposition(stat: &PerformanceStat) -> Option<Candidate> {
    let failure = stat.failure_rate();
    let average = stat.average_turns();
    if failure <= DECOMPOSITION_FAILURE_LIMIT || average <= DECOMPOSITION_TURN_LIMIT {
        return None;
    }
    Some(Candidate {
        rule_type: RuleType::TaskDecomposition,
        text: format!(
            "{:.0}% of tasks fail after {average:.1} turns on average. Split the request into small steps and verify each one before moving on.",
            failure * 100.0
        ),
        trigger: RuleTrigger {
            tool: None,
            value: failure,
            threshold: DECOMPOSITION_FAILURE_LIMIT,
            samples: stat.total_tasks,
        },
    })
}

pub fn error_pattern_memory(stat: &PerformanceStat) -> Option<Candidate> {
    let snippet = stat
        .recent_errors
        .iter()
        .filter(|snippet| snippet.count >= ERROR_PATTERN_MIN_COUNT)
        .max_by_key(|snippet| snippet.count)?;
    let tool = snippet
        .text
        .split_once(": ")
        .map(|(tool, _)| tool.to_string());
    Some(Candidate {
        rule_type: RuleType::ErrorPatternMemory,
        text: format!(
            "This error has occurred {} times: \"{}\". Do not repeat the call pattern that produces it.",
            snippet.count,
            text::truncate(&snippet.text, 120)
        ),
        trigger: RuleTrigger {
            tool,
            value: f64::from(snippet.count),
            threshold: f64::from(ERROR_PATTERN_MIN_COUNT),
            samples: snippet.count,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorSnippet;

    fn stat_with_tool(name: &str, calls: u32, errors: u32) -> PerformanceStat {
        let mut stat = PerformanceStat::new("scope");
        stat.tool_usage
            .insert(name.to_string(), ToolUsage { calls, errors });
        stat
    }

    #[test]
    fn six_calls_three_errors_trips_error_rate() {
        let candidate = tool_error_rate(&stat_with_tool("X", 6, 3)).expect("candidate");
        assert_eq!(candidate.rule_type, RuleType::ToolErrorRate);
        assert_eq!(candidate.trigger.tool.as_deref(), Some("X"));
        assert_eq!(candidate.trigger.samples, 6);
        assert!((candidate.trigger.value - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn thresholds_are_strict() {
        assert!(tool_error_rate(&stat_with_tool("X", 5, 2)).is_none());
        assert!(tool_error_rate(&stat_with_tool("X", 4, 4)).is_none());
        assert!(positive_tool_hint(&stat_with_tool("X", 5, 1)).is_none());
        assert!(positive_tool_hint(&stat_with_tool("X", 10, 1)).is_some());
    }

    #[test]
    fn task_level_generators() {
        let mut stat = PerformanceStat::new("scope");
        stat.total_tasks = 10;
        stat.success_count = 3;
        stat.failure_count = 7;
        stat.total_turns = 210;

        assert!(success_decline(&stat).is_some());
        assert!(efficiency_degradation(&stat).is_some());
        assert!(task_decomposition(&stat).is_some());

        stat.total_turns = 160;
        assert!(efficiency_degradation(&stat).is_none());
        assert!(task_decomposition(&stat).is_some());
    }

    #[test]
    fn recurring_snippet_names_its_tool() {
        let mut stat = PerformanceStat::new("scope");
        stat.recent_errors = vec![
            ErrorSnippet { text: "runCmd: permission denied".into(), count: 3 },
            ErrorSnippet { text: "readFile: missing".into(), count: 2 },
        ];
        let candidate = error_pattern_memory(&stat).expect("candidate");
        assert_eq!(candidate.trigger.tool.as_deref(), Some("runCmd"));
    }
}
