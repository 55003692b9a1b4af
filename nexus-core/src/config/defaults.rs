pub const SIMPLE_TURNS: u32 = 5;
pub const NORMAL_TURNS: u32 = 15;
pub const HEAVY_TURNS: u32 = 30;
pub const ESCALATION_TURNS: u32 = 10;
pub const MAX_ESCALATIONS: u32 = 3;
pub const ESCALATION_SKIP_THRESHOLD: u8 = 80;
pub const MODEL_TIMEOUT_SECS: u64 = 120;

pub const TOOL_GATEWAY_ENDPOINT: &str = "http://127.0.0.1:3001";
pub const TOOL_TIMEOUT_SECS: u64 = 60;
pub const TOOL_MAX_RETRIES: u32 = 3;
pub const TOOL_BASE_DELAY_MS: u64 = 500;

pub const MODEL_ENDPOINT: &str = "http://127.0.0.1:11434";
pub const MODEL_NAME: &str = "qwen2.5:14b";
pub const MODEL_API_PATH: &str = "/v1/chat/completions";

pub const RULE_MIN_SAMPLES: u32 = 5;
pub const RULE_MAX_ACTIVE: usize = 3;
pub const RULE_EXPIRY_DAYS: i64 = 7;
pub const RULE_COOLDOWN_HOURS: i64 = 24;

pub const PLANNER_MAX_PARALLEL: usize = 3;
pub const PLANNER_MAX_RETRIES: u32 = 1;
pub const PLANNER_MIN_SUBTASKS: usize = 3;
pub const PLANNER_MAX_SUBTASKS: usize = 10;

pub const MEMORY_DATA_DIR: &str = "~/.nexus";
pub const CONSOLIDATE_EVERY: usize = 20;
pub const SKILL_THRESHOLD: f32 = 0.3;

pub const HIGH_RISK_TOOLS: &[&str] = &["runCmd", "run_command", "shell"];

pub const DANGER_PATTERNS: &[&str] = &[
    "rm -rf",
    "rm -r /",
    "rmdir /s",
    "del /f",
    "del /s",
    "format c:",
    "mkfs",
    "dd if=",
    "> /dev/sd",
    ":(){",
    "chmod -r 777",
    "chown -r",
    "shutdown",
    "reboot",
    "drop table",
    "drop database",
    "git push --force",
    "curl | sh",
    "| bash",
];

/// Substrings of tool names whose successful calls deserve a verification pass.
pub const MUTATING_TOOL_MARKERS: &[&str] = &[
    "write", "edit", "create", "delete", "remove", "move", "rename", "cmd", "command", "exec",
    "shell", "install", "file", "patch", "update",
];
