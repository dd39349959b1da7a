//! Property-based tests for the filter chain, exit-code aggregation and the
//! naming contract.
//!
//! Uses `proptest` to verify invariants across many random inputs.

#![allow(clippy::expect_used)]

use proptest::prelude::*;

use ephemeral_common::naming::{extract_task_id, validate_execution_id};
use ephemeral_common::{Container, TaskStatus};
use ephemeral_runner::domain::filter::{FilterChain, FilterPattern, PatternSet};
use ephemeral_runner::domain::task_definition::chain_script;
use ephemeral_runner::domain::aggregate_exit_code;

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,5}(/[a-z]{1,5}){0,3}"
}

fn compile(patterns: &[String], is_dir: bool) -> PatternSet {
    PatternSet::compile(
        patterns
            .iter()
            .map(|p| FilterPattern::classify(p, is_dir))
            .collect(),
    )
    .expect("generated patterns are valid globs")
}

// ============================================================================
// FilterChain property tests
// ============================================================================

proptest! {
    /// A key matched by an exclude pattern is rejected whatever the includes.
    #[test]
    fn prop_exclude_always_wins(
        key in key_strategy(),
        includes in prop::collection::vec("[a-z]{1,4}\\*?", 0..4),
    ) {
        let chain = FilterChain::new(compile(&[key.clone()], false), compile(&includes, false));
        prop_assert!(!chain.allows(&key), "excluded key allowed: {key}");
    }

    /// Without filters every key is transferred up, and everything outside
    /// `.git/` is transferred down.
    #[test]
    fn prop_empty_chain_allows_everything_but_vcs_metadata(key in key_strategy()) {
        let up = FilterChain::new(PatternSet::empty(), PatternSet::empty());
        let down = up.clone().protect_vcs_metadata();
        prop_assert!(up.allows(&key));
        prop_assert!(down.allows(&key));
        let git_key = format!(".git/{key}");
        prop_assert!(up.allows(&git_key));
        prop_assert!(!down.allows(&git_key), "vcs metadata downloaded: {git_key}");
    }

    /// A directory entry matches everything below it but not the directory
    /// key itself.
    #[test]
    fn prop_directory_pattern_covers_subtree(
        dir in "[a-z]{1,5}(/[a-z]{1,5}){0,2}",
        rest in key_strategy(),
    ) {
        let set = compile(&[dir.clone()], true);
        let below = format!("{dir}/{rest}");
        prop_assert!(set.matches(&below), "{below} not under {dir}");
        prop_assert!(!set.matches(&dir));
        let sibling = format!("{dir}x/{rest}");
        prop_assert!(!set.matches(&sibling), "{sibling} matched {dir}");
    }

    /// A non-empty include list admits only matching keys.
    #[test]
    fn prop_includes_whitelist(key in key_strategy(), other in "[0-9]{1,4}") {
        let chain = FilterChain::new(PatternSet::empty(), compile(&[other], false));
        prop_assert!(!chain.allows(&key));
    }
}

// ============================================================================
// aggregate_exit_code() property tests
// ============================================================================

fn container(exit_code: Option<i32>) -> Container {
    Container {
        name: "c".to_string(),
        last_status: TaskStatus::Stopped,
        exit_code,
    }
}

proptest! {
    /// The aggregate is 0 exactly when every container exited with 0.
    #[test]
    fn prop_exit_code_zero_iff_all_zero(
        codes in prop::collection::vec(prop::option::of(0i32..3), 0..6),
    ) {
        let containers: Vec<Container> = codes.iter().copied().map(container).collect();
        let expected = i32::from(!codes.iter().all(|c| *c == Some(0)));
        prop_assert_eq!(aggregate_exit_code(&containers), expected);
        prop_assert!(matches!(aggregate_exit_code(&containers), 0 | 1));
    }
}

// ============================================================================
// chain_script() property tests
// ============================================================================

proptest! {
    /// Non-blank lines are joined in order; blank lines vanish.
    #[test]
    fn prop_chain_script_joins_non_blank_lines(
        lines in prop::collection::vec("[a-z]{1,8}( [a-z]{1,8})?", 0..6),
        blanks in 0usize..3,
    ) {
        let mut script = lines.join("\n");
        script.push_str(&"\n  ".repeat(blanks));
        prop_assert_eq!(chain_script(&script), lines.join(" && "));
    }
}

// ============================================================================
// Naming contract property tests
// ============================================================================

proptest! {
    /// The task id is recovered from any ARN of the cluster.
    #[test]
    fn prop_task_id_round_trips(
        cluster in "[a-zA-Z0-9_-]{1,20}",
        task_id in "[a-f0-9]{32}",
    ) {
        let arn = format!("arn:aws:ecs:eu-west-1:123456789012:task/{cluster}/{task_id}");
        prop_assert_eq!(extract_task_id(&cluster, &arn), Some(task_id.as_str()));
    }

    /// Ids built from the allowed alphabet are accepted.
    #[test]
    fn prop_valid_execution_ids_accepted(id in "[a-z0-9][a-z0-9-]{1,40}[a-z0-9]") {
        prop_assert!(validate_execution_id(&id).is_ok(), "rejected {id}");
    }

    /// Uppercase letters are always rejected.
    #[test]
    fn prop_uppercase_execution_ids_rejected(
        prefix in "[a-z0-9]{1,10}",
        upper in "[A-Z]",
    ) {
        let id = format!("{prefix}{upper}x");
        prop_assert!(validate_execution_id(&id).is_err(), "accepted {id}");
    }
}
