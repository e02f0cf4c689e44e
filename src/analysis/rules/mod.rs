//! The seven rule families
//!
//! Each family declares the IDs it may emit and one entry point the engine
//! dispatches. Families walk only the node kinds they care about.

pub mod api;
pub mod attributes;
pub mod language;
pub mod network;
pub mod runtime;
pub mod structure;
pub mod sync;

use super::engine::RegisteredRule;

/// The full registered rule set, in dispatch order
pub fn registered_rules() -> Vec<RegisteredRule> {
    vec![
        RegisteredRule {
            name: "network-events",
            ids: network::IDS,
            run: network::run,
        },
        RegisteredRule {
            name: "synchronization",
            ids: sync::IDS,
            run: sync::run,
        },
        RegisteredRule {
            name: "api-exposure",
            ids: api::IDS,
            run: api::run,
        },
        RegisteredRule {
            name: "runtime-restrictions",
            ids: runtime::IDS,
            run: runtime::run,
        },
        RegisteredRule {
            name: "language-constraints",
            ids: language::IDS,
            run: language::run,
        },
        RegisteredRule {
            name: "field-change-callbacks",
            ids: attributes::IDS,
            run: attributes::run,
        },
        RegisteredRule {
            name: "structure",
            ids: structure::IDS,
            run: structure::run,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_catalogue_id_has_an_owner() {
        let owned: Vec<&str> = registered_rules()
            .iter()
            .flat_map(|r| r.ids.iter().copied())
            .collect();
        for descriptor in crate::descriptors::builtin_descriptors() {
            assert!(
                owned.contains(&descriptor.id.as_str()),
                "no rule family owns {}",
                descriptor.id
            );
        }
        assert_eq!(owned.len(), 45);
    }
}
