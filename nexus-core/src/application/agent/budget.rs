use crate::config::AgentConfig;
use crate::text;

const SIMPLE_MAX_CHARS: usize = 20;
const HEAVY_MIN_CHARS: usize = 80;

const TASK_VERBS: &[&str] = &[
    "create", "write", "build", "analyze", "analyse", "generate", "fix", "implement", "deploy",
    "refactor", "创建", "编写", "生成", "分析", "修改", "部署", "实现", "开发",
];

const CONNECTIVES: &[&str] = &[
    "then", "after that", "afterwards", "first", "finally", "step", "然后", "接着", "之后",
    "首先", "最后", "并且", "同时",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetTier {
    Simple,
    Normal,
    Heavy,
}

impl BudgetTier {
    /// Over 80 characters or containing a connective is heavy; under 20
    /// characters with neither a task verb nor a connective is simple.
    pub fn classify(task: &str) -> Self {
        let task = task.trim();
        let chars = task.chars().count();
        let lowered = task.to_lowercase();
        let tokens = text::tokens(&lowered);

        if chars > HEAVY_MIN_CHARS || contains_any(&lowered, &tokens, CONNECTIVES) {
            BudgetTier::Heavy
        } else if chars < SIMPLE_MAX_CHARS && !contains_any(&lowered, &tokens, TASK_VERBS) {
            BudgetTier::Simple
        } else {
            BudgetTier::Normal
        }
    }

    pub fn turns(self, config: &AgentConfig) -> u32 {
        match self {
            BudgetTier::Simple => config.simple_turns,
            BudgetTier::Normal => config.normal_turns,
            BudgetTier::Heavy => config.heavy_turns,
        }
    }
}

pub fn turn_budget(task: &str, config: &AgentConfig) -> u32 {
    BudgetTier::classify(task).turns(config)
}

/// CJK and multi-word keywords match as substrings; single Latin words
/// match whole tokens, allowing a plural or -ing/-ed ending.
fn contains_any(lowered: &str, tokens: &[String], keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| {
        if keyword.contains(' ') || keyword.chars().any(text::is_cjk) {
            lowered.contains(keyword)
        } else {
            tokens.iter().any(|token| inflects(token, keyword))
        }
    })
}

fn inflects(token: &str, word: &str) -> bool {
    let Some(suffix) = token.strip_prefix(word.trim_end_matches('e')) else {
        return false;
    };
    let full = token.strip_prefix(word).unwrap_or(suffix);
    matches!(full, "" | "s" | "es" | "ed" | "d") || matches!(suffix, "ing" | "ed")
}
