//! Delegation step construction
//!
//! Role, subtask, success criteria, constraints and return format are
//! mandatory. A step missing any of them is a construction error raised at
//! plan time, never a runtime failure.

use crate::error::{RoutingError, RoutingResult};
use crate::protocol::{DelegationStep, SuccessCriteria};

#[derive(Debug, Clone, Default)]
pub struct DelegationStepBuilder {
    profile_id: String,
    role: String,
    subtask: String,
    success_criteria: SuccessCriteria,
    constraints: Vec<String>,
    return_format: String,
    reset: bool,
}

impl DelegationStepBuilder {
    pub fn new(profile_id: impl Into<String>) -> Self {
        Self {
            profile_id: profile_id.into(),
            ..Self::default()
        }
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn subtask(mut self, subtask: impl Into<String>) -> Self {
        self.subtask = subtask.into();
        self
    }

    pub fn success_criteria(mut self, criteria: SuccessCriteria) -> Self {
        self.success_criteria = criteria;
        self
    }

    pub fn constraints(mut self, constraints: Vec<String>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn return_format(mut self, format: impl Into<String>) -> Self {
        self.return_format = format.into();
        self
    }

    pub fn reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    /// Validate mandatory fields and produce the step
    pub fn build(self) -> RoutingResult<DelegationStep> {
        let missing = if self.profile_id.trim().is_empty() {
            Some("profile")
        } else if self.role.trim().is_empty() {
            Some("role")
        } else if self.subtask.trim().is_empty() {
            Some("subtask")
        } else if self.success_criteria.is_blank() {
            Some("success_criteria")
        } else if self.constraints.iter().all(|c| c.trim().is_empty()) {
            Some("constraints")
        } else if self.return_format.trim().is_empty() {
            Some("return_format")
        } else {
            None
        };

        if let Some(field) = missing {
            return Err(RoutingError::planning_violation(format!(
                "missing mandatory field '{}' for profile '{}'",
                field, self.profile_id
            )));
        }

        Ok(DelegationStep {
            profile_id: self.profile_id,
            role: self.role,
            subtask: self.subtask,
            success_criteria: self.success_criteria,
            constraints: self.constraints,
            return_format: self.return_format,
            reset: self.reset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> DelegationStepBuilder {
        DelegationStepBuilder::new("developer")
            .role("Developer")
            .subtask("Write the parser")
            .success_criteria(SuccessCriteria::new("Parser compiles"))
            .constraints(vec!["Stay in scope".to_string()])
            .return_format("Code block")
            .reset(true)
    }

    #[test]
    fn test_complete_step_builds() {
        let step = complete().build().unwrap();
        assert_eq!(step.profile_id, "developer");
        assert!(step.reset);
    }

    #[test]
    fn test_missing_fields_are_violations() {
        let cases = [
            (complete().role(" "), "role"),
            (complete().subtask(""), "subtask"),
            (complete().success_criteria(SuccessCriteria::default()), "success_criteria"),
            (complete().constraints(Vec::new()), "constraints"),
            (complete().return_format(""), "return_format"),
        ];

        for (builder, field) in cases {
            let err = builder.build().unwrap_err();
            assert!(matches!(err, RoutingError::PlanningConstraintViolation { .. }));
            assert!(err.to_string().contains(field), "{} not reported", field);
        }
    }
}
