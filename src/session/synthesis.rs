//! Result synthesis
//!
//! Merges the results log, in order, into one response. Aborted sessions use
//! the same merge over whatever completed before the stop.

use crate::protocol::DelegationResult;
use crate::registry::ProfileRegistry;

/// Merge results in log order; `None` when nothing completed
pub fn synthesize(results: &[DelegationResult], registry: &ProfileRegistry) -> Option<String> {
    if results.is_empty() {
        return None;
    }

    let sections: Vec<String> = results
        .iter()
        .map(|result| {
            let name = registry
                .get(&result.profile_id)
                .map(|p| p.display_name.as_str())
                .unwrap_or(result.profile_id.as_str());
            let mut section = format!("## {}\n{}", name, result.output.trim());
            if !result.verified {
                section.push_str("\n\n_Unverified: ");
                section.push_str(&result.verifier_notes.join("; "));
                section.push('_');
            }
            section
        })
        .collect();

    Some(sections.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn result(profile: &str, output: &str, verified: bool) -> DelegationResult {
        DelegationResult {
            profile_id: profile.to_string(),
            output: output.to_string(),
            verified,
            verifier_notes: if verified {
                Vec::new()
            } else {
                vec!["Missing required term 'schema'".to_string()]
            },
            attempts: 1,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_log_has_no_synthesis() {
        assert!(synthesize(&[], &ProfileRegistry::builtin()).is_none());
    }

    #[test]
    fn test_sections_follow_log_order() {
        let registry = ProfileRegistry::builtin();
        let merged = synthesize(
            &[
                result("data-architect", "Import plan ", true),
                result("developer", "Migration code", true),
            ],
            &registry,
        )
        .unwrap();

        assert_eq!(
            merged,
            "## Data Architect\nImport plan\n\n## Developer\nMigration code"
        );
    }

    #[test]
    fn test_unverified_results_flagged() {
        let registry = ProfileRegistry::builtin();
        let merged = synthesize(&[result("custom", "Draft", false)], &registry).unwrap();

        assert!(merged.starts_with("## custom\nDraft"));
        assert!(merged.contains("_Unverified: Missing required term 'schema'_"));
    }
}
