use tracing::debug;

use crate::domain::Scope;
use crate::text;

pub const TRIGGER_WEIGHT: u32 = 3;
pub const TOOL_FRAGMENT_WEIGHT: u32 = 2;
pub const DESCRIPTION_WEIGHT: u32 = 1;
pub const MIN_ROUTE_SCORE: u32 = 3;

/// Filler words that never count as a trigger token hit.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "of", "to", "in", "on", "at", "for", "and", "or", "with", "from", "this",
    "that", "is", "it", "my", "me",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    Pinned,
    Trigger,
    Scored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScopeMatch {
    pub scope: Scope,
    pub reason: MatchReason,
    pub score: u32,
}

/// Picks a scope for a request: the pinned scope, then an exact trigger
/// phrase, then the best weighted score at or above `MIN_ROUTE_SCORE`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScopeRouter;

impl ScopeRouter {
    pub fn route(&self, scopes: &[Scope], request: &str, pinned: Option<&str>) -> Option<ScopeMatch> {
        let routable = || scopes.iter().filter(|scope| scope.is_routable());

        if let Some(pinned) = pinned
            && let Some(scope) = routable().find(|scope| scope.id == pinned)
        {
            return Some(ScopeMatch {
                scope: scope.clone(),
                reason: MatchReason::Pinned,
                score: 0,
            });
        }

        let lowered = request.to_lowercase();
        let exact = routable()
            .filter_map(|scope| {
                scope
                    .triggers
                    .iter()
                    .map(|trigger| trigger.trim().to_lowercase())
                    .filter(|trigger| !trigger.is_empty() && lowered.contains(trigger.as_str()))
                    .map(|trigger| trigger.chars().count())
                    .max()
                    .map(|len| (len, scope))
            })
            .max_by_key(|(len, _)| *len);
        if let Some((_, scope)) = exact {
            debug!(scope = %scope.id, "Scope matched by trigger phrase");
            return Some(ScopeMatch {
                scope: scope.clone(),
                reason: MatchReason::Trigger,
                score: score_scope(scope, request),
            });
        }

        let (best, score) = routable()
            .map(|scope| (scope, score_scope(scope, request)))
            .max_by_key(|(_, score)| *score)?;
        if score < MIN_ROUTE_SCORE {
            return None;
        }
        debug!(scope = %best.id, score, "Scope matched by score");
        Some(ScopeMatch {
            scope: best.clone(),
            reason: MatchReason::Scored,
            score,
        })
    }
}

/// `3 x trigger hits + 2 x tool-name fragment hits + 1 x description word hits`.
///
/// A trigger hits when it appears in the request or shares a token with it.
pub fn score_scope(scope: &Scope, request: &str) -> u32 {
    let lowered = request.to_lowercase();
    let request_tokens = text::tokens(request);

    let trigger_hits = scope
        .triggers
        .iter()
        .filter(|trigger| {
            let trigger = trigger.trim().to_lowercase();
            if trigger.is_empty() {
                return false;
            }
            let tokens: Vec<String> = text::tokens(&trigger)
                .into_iter()
                .filter(|token| !STOPWORDS.contains(&token.as_str()))
                .collect();
            lowered.contains(&trigger) || text::overlap(&tokens, &request_tokens) > 0
        })
        .count() as u32;

    let fragments: Vec<String> = scope
        .tools
        .iter()
        .flat_map(|tool| text::name_fragments(tool))
        .filter(|fragment| fragment.chars().count() >= 3)
        .collect();
    let fragment_hits = text::overlap(&fragments, &request_tokens) as u32;

    let description: Vec<String> = text::tokens(&scope.description)
        .into_iter()
        .filter(|word| word.chars().count() >= 3 || word.chars().any(text::is_cjk))
        .collect();
    let description_hits = text::overlap(&description, &request_tokens) as u32;

    TRIGGER_WEIGHT * trigger_hits
        + TOOL_FRAGMENT_WEIGHT * fragment_hits
        + DESCRIPTION_WEIGHT * description_hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes() -> Vec<Scope> {
        vec![
            Scope::new("web", "Web research")
                .with_triggers(["search the web", "news"])
                .with_tools(["webSearch", "fetch_page"])
                .with_description("Research topics online and summarize pages"),
            Scope::new("files", "File work")
                .with_triggers(["edit file"])
                .with_tools(["readFile", "writeFile"])
                .with_description("Read and write local files"),
            Scope::new("draft", "Unfinished")
                .with_triggers(["deploy"])
                .with_progress(0.5),
        ]
    }

    #[test]
    fn pinned_scope_wins() {
        let hit = ScopeRouter
            .route(&scopes(), "search the web for rust news", Some("files"))
            .expect("match");
        assert_eq!(hit.scope.id, "files");
        assert_eq!(hit.reason, MatchReason::Pinned);
    }

    #[test]
    fn exact_trigger_beats_scoring() {
        let hit = ScopeRouter
            .route(&scopes(), "Please EDIT FILE notes.md", None)
            .expect("match");
        assert_eq!(hit.scope.id, "files");
        assert_eq!(hit.reason, MatchReason::Trigger);
    }

    #[test]
    fn weighted_score_needs_threshold() {
        let hit = ScopeRouter
            .route(&scopes(), "summarize this page online", None)
            .expect("match");
        assert_eq!(hit.scope.id, "web");
        assert_eq!(hit.reason, MatchReason::Scored);
        assert!(hit.score >= MIN_ROUTE_SCORE);

        assert!(ScopeRouter.route(&scopes(), "hello there", None).is_none());
    }

    #[test]
    fn unroutable_scopes_are_ignored() {
        assert!(ScopeRouter.route(&scopes(), "deploy now", None).is_none());
        assert!(ScopeRouter.route(&scopes(), "x", Some("draft")).is_none());
    }

    #[test]
    fn adding_a_trigger_hit_never_lowers_the_score() {
        let scope = &scopes()[0];
        let base = score_scope(scope, "read the page");
        let more = score_scope(scope, "read the page with news");
        assert!(more >= base + TRIGGER_WEIGHT);
    }
}
