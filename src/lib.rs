pub mod config;
pub mod pattern;
pub mod profile;
pub mod rules;
pub mod store;

pub use config::Config;
pub use pattern::{detect_format, evaluate, validate_pattern, PatternFormat, UrlPattern};
pub use profile::{HeaderEdit, Matcher, Profile, ProfileSet, ResourceType};
pub use rules::{
    apply_rules, build_rules, installable_profile, sync_profile, ApplyReport, CompiledRule,
    RuleError,
};
pub use store::{FileRuleStore, MemoryRuleStore, RuleStore, StoreError};
