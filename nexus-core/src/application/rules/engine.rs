use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::generators::{Candidate, generate_all};
use crate::config::RuleConfig;
use crate::domain::{BehaviorRule, PerformanceStat};
use crate::infrastructure::store::JsonFile;

/// On-disk shape of `nexus_rules.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleBook {
    /// Bumped on every persisted change.
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rules: BTreeMap<String, Vec<BehaviorRule>>,
}

/// Turns performance statistics into time-boxed prompt rules.
///
/// Expired rules are kept, inactive, until their cooldown lapses so the same
/// type and tool cannot fire again straight away.
pub struct RuleEngine {
    config: RuleConfig,
    book: RwLock<RuleBook>,
    file: JsonFile,
}

impl RuleEngine {
    pub fn load(path: impl Into<PathBuf>, config: RuleConfig) -> Self {
        let file = JsonFile::new(path);
        let book: RuleBook = file.load_or_default();
        debug!(scopes = book.rules.len(), "Loaded behavior rules");
        Self {
            config,
            book: RwLock::new(book),
            file,
        }
    }

    /// Re-evaluates a scope after a new trace and returns the rules that were
    /// activated by this call.
    pub fn evaluate(&self, scope_id: &str, stats: &PerformanceStat) -> Vec<BehaviorRule> {
        self.evaluate_at(scope_id, stats, Utc::now())
    }

    pub fn evaluate_at(
        &self,
        scope_id: &str,
        stats: &PerformanceStat,
        now: DateTime<Utc>,
    ) -> Vec<BehaviorRule> {
        let Ok(mut book) = self.book.write() else {
            return Vec::new();
        };
        let rules = book.rules.entry(scope_id.to_string()).or_default();
        let mut changed = retire(rules, now);

        let mut activated = Vec::new();
        if stats.total_tasks >= self.config.min_samples {
            let mut candidates: Vec<Candidate> = generate_all(stats)
                .into_iter()
                .filter(|candidate| admissible(rules, candidate, now))
                .collect();
            candidates.sort_by_key(|candidate| candidate.rule_type.priority());

            let live = rules.iter().filter(|rule| rule.is_live(now)).count();
            let room = self.config.max_active.saturating_sub(live);
            for candidate in candidates.into_iter().take(room) {
                let rule = self.activate(scope_id, candidate, now);
                info!(
                    scope = scope_id,
                    rule_type = rule.rule_type.as_str(),
                    tool = rule.trigger.tool.as_deref().unwrap_or("-"),
                    "Behavior rule activated"
                );
                rules.push(rule.clone());
                activated.push(rule);
            }
            changed |= !activated.is_empty();
        }

        if changed {
            book.version += 1;
            book.last_updated = Some(now);
            self.file.save_detached(&*book);
        }
        activated
    }

    pub fn active_rules(&self, scope_id: &str) -> Vec<BehaviorRule> {
        self.active_rules_at(scope_id, Utc::now())
    }

    pub fn active_rules_at(&self, scope_id: &str, now: DateTime<Utc>) -> Vec<BehaviorRule> {
        self.book
            .read()
            .ok()
            .and_then(|book| {
                book.rules.get(scope_id).map(|rules| {
                    rules
                        .iter()
                        .filter(|rule| rule.is_live(now))
                        .cloned()
                        .collect()
                })
            })
            .unwrap_or_default()
    }

    /// Prompt section listing the scope's live rules.
    pub fn render_rules(&self, scope_id: &str) -> Option<String> {
        let rules = self.active_rules(scope_id);
        if rules.is_empty() {
            return None;
        }
        let lines: Vec<String> = rules.iter().map(|rule| format!("- {}", rule.text)).collect();
        Some(format!("## Learned rules\n{}", lines.join("\n")))
    }

    pub fn snapshot(&self) -> RuleBook {
        self.book
            .read()
            .map(|book| book.clone())
            .unwrap_or_default()
    }

    fn activate(&self, scope_id: &str, candidate: Candidate, now: DateTime<Utc>) -> BehaviorRule {
        let expires_at = now + self.config.expiry;
        BehaviorRule {
            id: Uuid::new_v4().to_string(),
            scope_id: scope_id.to_string(),
            rule_type: candidate.rule_type,
            text: candidate.text,
            created_at: now,
            expires_at,
            cooldown_until: expires_at + self.config.cooldown,
            trigger: candidate.trigger,
            active: true,
        }
    }
}

/// Deactivates expired rules and forgets those past their cooldown.
fn retire(rules: &mut Vec<BehaviorRule>, now: DateTime<Utc>) -> bool {
    let mut changed = false;
    for rule in rules.iter_mut() {
        if rule.active && rule.expires_at <= now {
            rule.active = false;
            changed = true;
        }
    }
    let before = rules.len();
    rules.retain(|rule| rule.active || rule.in_cooldown(now));
    changed || rules.len() != before
}

fn admissible(rules: &[BehaviorRule], candidate: &Candidate, now: DateTime<Utc>) -> bool {
    let key = (candidate.rule_type, candidate.trigger.tool.as_deref());
    !rules
        .iter()
        .any(|rule| rule.key() == key && (rule.is_live(now) || rule.in_cooldown(now)))
}
