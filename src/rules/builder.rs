use super::hash::rule_id;
use super::{CompiledRule, HeaderModification, ModifyHeaders, RuleAction, RuleCondition};
use crate::profile::{dedup_matchers, effective_url_filter, HeaderEdit, Matcher, Profile};
use tracing::debug;

/// Priority given to every compiled rule
pub const RULE_PRIORITY: u32 = 1;

/// Compile a profile into one rule per distinct matcher.
///
/// No profile, or a profile without active header edits, compiles to
/// nothing. A profile without matchers gets one implicit match-all matcher.
pub fn build_rules(profile: Option<&Profile>) -> Vec<CompiledRule> {
    let Some(profile) = profile else {
        return Vec::new();
    };

    let Some(modify) = ModifyHeaders::new(
        header_modifications(&profile.request_headers),
        header_modifications(&profile.response_headers),
    ) else {
        debug!("Profile {} has no active header edits", profile.id);
        return Vec::new();
    };

    effective_matchers(profile)
        .iter()
        .map(|matcher| {
            let rule = CompiledRule {
                id: rule_id(&profile.id, &matcher.id),
                priority: RULE_PRIORITY,
                action: RuleAction::ModifyHeaders(modify.clone()),
                condition: RuleCondition {
                    url_filter: effective_url_filter(&matcher.url_filter).to_string(),
                    resource_types: matcher.effective_resource_types(),
                },
            };
            debug!(
                "Compiled rule {} for matcher {} ({})",
                rule.id, matcher.id, rule.condition.url_filter
            );
            rule
        })
        .collect()
}

/// Active edits as upserts, in their original order
fn header_modifications(edits: &[HeaderEdit]) -> Vec<HeaderModification> {
    edits
        .iter()
        .filter(|edit| edit.is_active())
        .map(|edit| HeaderModification::set(&edit.header, &edit.value))
        .collect()
}

fn effective_matchers(profile: &Profile) -> Vec<Matcher> {
    if profile.matchers.is_empty() {
        vec![Matcher::match_all()]
    } else {
        dedup_matchers(&profile.matchers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{ResourceType, DEFAULT_RESOURCE_TYPES};
    use crate::rules::HeaderOperation;

    fn create_test_profile(matchers: Vec<Matcher>, request: Vec<HeaderEdit>) -> Profile {
        let mut profile = Profile::new("test-profile", "Test Profile");
        profile.enabled = true;
        profile.matchers = matchers;
        profile.request_headers = request;
        profile
    }

    fn modify_headers(rule: &CompiledRule) -> &ModifyHeaders {
        match &rule.action {
            RuleAction::ModifyHeaders(modify) => modify,
        }
    }

    #[test]
    fn test_no_profile() {
        assert!(build_rules(None).is_empty());
    }

    #[test]
    fn test_request_headers() {
        let profile = create_test_profile(
            vec![Matcher::new("match-1", "example.com")],
            vec![HeaderEdit::new("header-1", "X-Custom", "test-value")],
        );

        let rules = build_rules(Some(&profile));
        assert_eq!(rules.len(), 1);

        let modify = modify_headers(&rules[0]);
        assert_eq!(modify.request_headers().len(), 1);
        assert_eq!(modify.request_headers()[0].header, "X-Custom");
        assert_eq!(modify.request_headers()[0].operation, HeaderOperation::Set);
        assert_eq!(modify.request_headers()[0].value.as_deref(), Some("test-value"));
        assert!(modify.response_headers().is_empty());
    }

    #[test]
    fn test_response_headers() {
        let mut profile = create_test_profile(vec![Matcher::new("match-1", "api.example.com")], vec![]);
        profile.response_headers = vec![HeaderEdit::new("header-1", "X-Response", "custom-value")];

        let rules = build_rules(Some(&profile));
        assert_eq!(rules.len(), 1);

        let modify = modify_headers(&rules[0]);
        assert!(modify.request_headers().is_empty());
        assert_eq!(
            modify.response_headers(),
            &[HeaderModification::set("X-Response", "custom-value")]
        );
    }

    #[test]
    fn test_no_header_ops_no_rules() {
        let profile = create_test_profile(
            vec![
                Matcher::new("match-1", "example.com"),
                Matcher::new("match-2", "other.com"),
            ],
            vec![],
        );
        assert!(build_rules(Some(&profile)).is_empty());
    }

    #[test]
    fn test_inactive_edits_are_dropped() {
        let mut disabled = HeaderEdit::new("h2", "X-Disabled", "v");
        disabled.enabled = false;
        let profile = create_test_profile(
            vec![Matcher::new("m1", "example.com")],
            vec![
                HeaderEdit::new("h1", "  ", "blank"),
                disabled,
                HeaderEdit::new("h3", "X-Kept", "v"),
            ],
        );

        let rules = build_rules(Some(&profile));
        assert_eq!(
            modify_headers(&rules[0]).request_headers(),
            &[HeaderModification::set("X-Kept", "v")]
        );

        let only_inactive = create_test_profile(
            vec![Matcher::new("m1", "example.com")],
            vec![HeaderEdit::new("h1", "", "v")],
        );
        assert!(build_rules(Some(&only_inactive)).is_empty());
    }

    #[test]
    fn test_header_order_preserved() {
        let profile = create_test_profile(
            vec![],
            vec![
                HeaderEdit::new("h1", "X-First", "1"),
                HeaderEdit::new("h2", "X-Second", "2"),
                HeaderEdit::new("h3", "X-Third", "3"),
            ],
        );

        let rules = build_rules(Some(&profile));
        let names: Vec<_> = modify_headers(&rules[0])
            .request_headers()
            .iter()
            .map(|h| h.header.as_str())
            .collect();
        assert_eq!(names, vec!["X-First", "X-Second", "X-Third"]);
    }

    #[test]
    fn test_default_matcher() {
        let profile = create_test_profile(vec![], vec![HeaderEdit::new("header-1", "X-Test", "value")]);

        let rules = build_rules(Some(&profile));
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].condition.url_filter, "*");
        assert_eq!(rules[0].condition.resource_types, DEFAULT_RESOURCE_TYPES.to_vec());
        assert_eq!(rules[0].id, rule_id("test-profile", "__all__"));
    }

    #[test]
    fn test_matcher_dedup() {
        let profile = create_test_profile(
            vec![
                Matcher::new("match-1", "example.com"),
                Matcher::new("match-1", "other.com"),
            ],
            vec![HeaderEdit::new("h1", "X-Test", "value")],
        );

        let rules = build_rules(Some(&profile));
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].condition.url_filter, "example.com");
    }

    #[test]
    fn test_one_rule_per_matcher() {
        let profile = create_test_profile(
            vec![
                Matcher::new("match-1", "example.com"),
                Matcher::new("match-2", "api.example.com"),
                Matcher::new("match-3", ""),
            ],
            vec![HeaderEdit::new("h1", "X-Test", "value")],
        );

        let rules = build_rules(Some(&profile));
        assert_eq!(rules.len(), 3);
        assert_ne!(rules[0].id, rules[1].id);
        assert_eq!(rules[0].condition.url_filter, "example.com");
        assert_eq!(rules[1].condition.url_filter, "api.example.com");
        assert_eq!(rules[2].condition.url_filter, "*");
        assert!(rules.iter().all(|r| r.priority == RULE_PRIORITY));
    }

    #[test]
    fn test_resource_types_passthrough() {
        let profile = create_test_profile(
            vec![Matcher::new("m1", "example.com").with_resource_types([ResourceType::Xmlhttprequest])],
            vec![HeaderEdit::new("h1", "X-Test", "value")],
        );

        let rules = build_rules(Some(&profile));
        assert_eq!(rules[0].condition.resource_types, vec![ResourceType::Xmlhttprequest]);
    }

    #[test]
    fn test_end_to_end_profile() {
        let mut profile = Profile::new("p1", "Staging");
        profile.matchers = vec![Matcher::new("m1", "example.com")];
        profile.request_headers = vec![HeaderEdit::new("h1", "X-Env", "staging")];

        let rules = build_rules(Some(&profile));
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, 1_312_422_879);
        assert_eq!(rules[0].condition.url_filter, "example.com");
        assert_eq!(
            modify_headers(&rules[0]).request_headers(),
            &[HeaderModification::set("X-Env", "staging")]
        );
        assert_eq!(build_rules(Some(&profile)), rules);
    }
}
