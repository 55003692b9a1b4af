use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    ToolErrorRate,
    SuccessDecline,
    EfficiencyDegradation,
    PositiveToolHint,
    TaskDecomposition,
    ErrorPatternMemory,
}

impl RuleType {
    /// Activation order when more candidates fire than the scope cap allows.
    /// Lower wins.
    pub fn priority(self) -> u8 {
        match self {
            RuleType::ToolErrorRate => 0,
            RuleType::ErrorPatternMemory => 1,
            RuleType::SuccessDecline => 2,
            RuleType::TaskDecomposition => 3,
            RuleType::EfficiencyDegradation => 4,
            RuleType::PositiveToolHint => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RuleType::ToolErrorRate => "TOOL_ERROR_RATE",
            RuleType::SuccessDecline => "SUCCESS_DECLINE",
            RuleType::EfficiencyDegradation => "EFFICIENCY_DEGRADATION",
            RuleType::PositiveToolHint => "POSITIVE_TOOL_HINT",
            RuleType::TaskDecomposition => "TASK_DECOMPOSITION",
            RuleType::ErrorPatternMemory => "ERROR_PATTERN_MEMORY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTrigger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    pub value: f64,
    pub threshold: f64,
    pub samples: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorRule {
    pub id: String,
    pub scope_id: String,
    pub rule_type: RuleType,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub cooldown_until: DateTime<Utc>,
    pub trigger: RuleTrigger,
    pub active: bool,
}

impl BehaviorRule {
    /// Identity used for deduplication and cooldown: type plus tool.
    pub fn key(&self) -> (RuleType, Option<&str>) {
        (self.rule_type, self.trigger.tool.as_deref())
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at > now
    }

    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until > now
    }
}
