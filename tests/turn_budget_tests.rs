// Turn budget tests - tier classification and configured budgets

use nexus_core::application::agent::{BudgetTier, turn_budget};
use nexus_core::config::AgentConfig;
use nexus_core::config::loader::parse_config;

#[test]
fn short_chinese_search_gets_the_simple_tier() {
    let config = AgentConfig::default();
    assert_eq!(BudgetTier::classify("搜索今天的新闻"), BudgetTier::Simple);
    assert_eq!(turn_budget("搜索今天的新闻", &config), config.simple_turns);
}

#[test]
fn task_verbs_lift_short_requests_to_normal() {
    assert_eq!(BudgetTier::classify("write a poem"), BudgetTier::Normal);
    assert_eq!(BudgetTier::classify("创建一个文件"), BudgetTier::Normal);
}

#[test]
fn medium_requests_are_normal() {
    assert_eq!(
        BudgetTier::classify("summarize the quarterly sales figures"),
        BudgetTier::Normal
    );
}

#[test]
fn long_or_multi_step_requests_are_heavy() {
    assert_eq!(
        BudgetTier::classify("fetch the report then email it"),
        BudgetTier::Heavy
    );
    assert_eq!(BudgetTier::classify("先查天气然后订票"), BudgetTier::Heavy);
    let long = "please look through every document in the shared archive folder and tell me which ones mention budgets";
    assert!(long.chars().count() > 80);
    assert_eq!(BudgetTier::classify(long), BudgetTier::Heavy);
}

#[test]
fn budgets_follow_configuration() {
    let config = parse_config("[agent]\nsimple_turns = 2\nnormal_turns = 4\nheavy_turns = 8\n")
        .expect("config parses");
    assert_eq!(turn_budget("hi", &config.agent), 2);
    assert_eq!(turn_budget("write a poem", &config.agent), 4);
    assert_eq!(turn_budget("first plan, then act", &config.agent), 8);
}
