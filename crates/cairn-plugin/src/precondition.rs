//! Authorization and label-state gates for plugins and handlers.
//!
//! A [`Precondition`] is a conjunction of checks; a list of them is a
//! disjunction. An empty list is always satisfied.

use std::collections::BTreeMap;

use cairn_events::CapabilityObject;
use serde::{Deserialize, Serialize};

pub const ROLE_OWNER: &str = "owner";
pub const ROLE_QA: &str = "qa";

/// Role name to member handles.
pub type RoleOptions = BTreeMap<String, Vec<String>>;

/// Label to per-role member handles, scoped to issues carrying that label.
pub type LabelRoles = BTreeMap<String, RoleOptions>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precondition {
    #[serde(default)]
    pub is_author: bool,
    #[serde(default)]
    pub is_owner: bool,
    #[serde(default)]
    pub is_qa: bool,
    #[serde(default)]
    pub required_roles: Vec<String>,
    #[serde(default)]
    pub required_labels: Vec<String>,
    #[serde(default)]
    pub required_label_prefix: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionError {
    #[error("check is author failed, author [{author}], sender [{sender}]")]
    NotAuthor { author: String, sender: String },
    #[error("check required roles failed: sender unavailable")]
    MissingSender,
    #[error("check required roles failed: {user} not in roles [{}]", .roles.join(", "))]
    NotInRoles { user: String, roles: Vec<String> },
    #[error("check required labels failed: labels unavailable")]
    MissingLabels,
    #[error("check required labels failed: {0} doesn't exist")]
    MissingLabel(String),
    #[error("check required label prefix failed: {0} prefix label not found")]
    MissingLabelPrefix(String),
    #[error("{}", render_alternatives(.0))]
    NoneSatisfied(Vec<PreconditionError>),
}

fn render_alternatives(failures: &[PreconditionError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Precondition {
    /// `required_roles` plus the `owner` / `qa` shorthands, deduplicated.
    pub fn role_requirement(&self) -> Vec<String> {
        let mut roles = Vec::with_capacity(self.required_roles.len() + 2);
        let shorthands = [(self.is_owner, ROLE_OWNER), (self.is_qa, ROLE_QA)];
        for role in shorthands
            .into_iter()
            .filter_map(|(enabled, role)| enabled.then_some(role))
            .chain(self.required_roles.iter().map(String::as_str))
        {
            if !roles.iter().any(|known| known == role) {
                roles.push(role.to_string());
            }
        }
        roles
    }
}

/// Returns true when `user` is listed under `role`.
pub fn user_has_role(roles: &RoleOptions, user: &str, role: &str) -> bool {
    roles
        .get(role)
        .is_some_and(|members| members.iter().any(|member| member == user))
}

/// Evaluates preconditions against one event and a repository role table.
pub struct PreconditionEvaluator<'a> {
    object: &'a CapabilityObject,
    roles: &'a RoleOptions,
}

impl<'a> PreconditionEvaluator<'a> {
    pub fn new(object: &'a CapabilityObject, roles: &'a RoleOptions) -> Self {
        Self { object, roles }
    }

    /// Runs every declared check in order; the first failure wins.
    pub fn check_one(&self, precondition: &Precondition) -> Result<(), PreconditionError> {
        if precondition.is_author {
            self.check_is_author()?;
        }
        let roles = precondition.role_requirement();
        if !roles.is_empty() {
            self.check_roles(&roles)?;
        }
        if !precondition.required_labels.is_empty() {
            self.check_required_labels(&precondition.required_labels)?;
        }
        if !precondition.required_label_prefix.is_empty() {
            self.check_required_label_prefix(&precondition.required_label_prefix)?;
        }
        Ok(())
    }

    /// Succeeds on the first satisfied precondition, or when the list is empty.
    pub fn check_any(&self, preconditions: &[Precondition]) -> Result<(), PreconditionError> {
        if preconditions.is_empty() {
            return Ok(());
        }
        let mut failures = Vec::with_capacity(preconditions.len());
        for precondition in preconditions {
            match self.check_one(precondition) {
                Ok(()) => return Ok(()),
                Err(error) => failures.push(error),
            }
        }
        Err(PreconditionError::NoneSatisfied(failures))
    }

    fn check_is_author(&self) -> Result<(), PreconditionError> {
        match (self.object.author(), self.object.sender_user()) {
            (Some(author), Some(sender)) if author == sender => Ok(()),
            (author, sender) => Err(PreconditionError::NotAuthor {
                author: author.unwrap_or_default().to_string(),
                sender: sender.unwrap_or_default().to_string(),
            }),
        }
    }

    /// Sender must hold at least one of `roles`.
    fn check_roles(&self, roles: &[String]) -> Result<(), PreconditionError> {
        let sender = self
            .object
            .sender_user()
            .ok_or(PreconditionError::MissingSender)?;
        if roles
            .iter()
            .any(|role| user_has_role(self.roles, sender, role))
        {
            return Ok(());
        }
        Err(PreconditionError::NotInRoles {
            user: sender.to_string(),
            roles: roles.to_vec(),
        })
    }

    fn check_required_labels(&self, required: &[String]) -> Result<(), PreconditionError> {
        let labels = self.object.labels().ok_or(PreconditionError::MissingLabels)?;
        match required
            .iter()
            .find(|label| !labels.iter().any(|present| present == *label))
        {
            Some(missing) => Err(PreconditionError::MissingLabel(missing.clone())),
            None => Ok(()),
        }
    }

    fn check_required_label_prefix(&self, prefixes: &[String]) -> Result<(), PreconditionError> {
        let labels = self.object.labels().ok_or(PreconditionError::MissingLabels)?;
        match prefixes.iter().find(|prefix| {
            !labels
                .iter()
                .any(|label| label.starts_with(prefix.as_str()))
        }) {
            Some(missing) => Err(PreconditionError::MissingLabelPrefix(missing.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use cairn_events::{CapabilityObject, RawEvent};
    use serde_json::json;

    use super::{Precondition, PreconditionError, PreconditionEvaluator, RoleOptions};

    fn comment_object(sender: &str, author: &str, labels: &[&str]) -> CapabilityObject {
        let payload = json!({
            "action": "created",
            "issue": {
                "number": 1,
                "user": {"login": author},
                "labels": labels.iter().map(|name| json!({"name": name})).collect::<Vec<_>>()
            },
            "comment": {"body": "/status approved", "user": {"login": sender}},
            "repository": {"name": "frp", "owner": {"login": "fatedier"}},
            "sender": {"login": sender}
        });
        let raw = serde_json::to_vec(&payload).expect("encode");
        CapabilityObject::new(RawEvent::decode("issue_comment", &raw).expect("decode"))
    }

    fn roles() -> RoleOptions {
        [
            ("owner".to_string(), vec!["alice".to_string()]),
            ("qa".to_string(), vec!["quinn".to_string()]),
            ("reviewer".to_string(), vec!["rita".to_string(), "alice".to_string()]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn unit_empty_precondition_list_is_vacuously_satisfied() {
        let object = comment_object("bob", "carol", &[]);
        let roles = roles();
        let evaluator = PreconditionEvaluator::new(&object, &roles);
        assert_eq!(evaluator.check_any(&[]), Ok(()));
        assert_eq!(evaluator.check_one(&Precondition::default()), Ok(()));
    }

    #[test]
    fn unit_single_precondition_list_matches_check_one() {
        let roles = roles();
        let owner_only = Precondition {
            is_owner: true,
            ..Precondition::default()
        };
        for sender in ["alice", "bob"] {
            let object = comment_object(sender, "carol", &[]);
            let evaluator = PreconditionEvaluator::new(&object, &roles);
            assert_eq!(
                evaluator.check_any(std::slice::from_ref(&owner_only)).is_ok(),
                evaluator.check_one(&owner_only).is_ok(),
                "sender {sender}"
            );
        }
    }

    #[test]
    fn functional_disjunction_succeeds_on_any_and_reports_every_failure() {
        let roles = roles();
        let is_author = Precondition {
            is_author: true,
            ..Precondition::default()
        };
        let is_qa = Precondition {
            is_qa: true,
            ..Precondition::default()
        };

        let author = comment_object("carol", "carol", &[]);
        assert_eq!(
            PreconditionEvaluator::new(&author, &roles).check_any(&[is_qa.clone(), is_author.clone()]),
            Ok(())
        );

        let stranger = comment_object("bob", "carol", &[]);
        let error = PreconditionEvaluator::new(&stranger, &roles)
            .check_any(&[is_author, is_qa])
            .expect_err("bob satisfies nothing");
        assert_eq!(
            error.to_string(),
            "check is author failed, author [carol], sender [bob]; \
             check required roles failed: bob not in roles [qa]"
        );
        match error {
            PreconditionError::NoneSatisfied(failures) => assert_eq!(failures.len(), 2),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unit_required_roles_accept_membership_in_any_listed_role() {
        let roles = roles();
        let object = comment_object("rita", "carol", &[]);
        let evaluator = PreconditionEvaluator::new(&object, &roles);
        let reviewer_or_owner = Precondition {
            required_roles: vec!["owner".to_string(), "reviewer".to_string()],
            ..Precondition::default()
        };
        assert_eq!(evaluator.check_one(&reviewer_or_owner), Ok(()));
        let unknown_role = Precondition {
            required_roles: vec!["maintainer".to_string()],
            ..Precondition::default()
        };
        assert_eq!(
            evaluator.check_one(&unknown_role),
            Err(PreconditionError::NotInRoles {
                user: "rita".to_string(),
                roles: vec!["maintainer".to_string()],
            })
        );
    }

    #[test]
    fn regression_role_shorthands_join_one_any_of_requirement() {
        let roles: RoleOptions = [
            ("owner".to_string(), vec!["alice".to_string()]),
            ("qa".to_string(), vec!["quinn".to_string()]),
            ("reviewer".to_string(), vec!["rita".to_string()]),
        ]
        .into_iter()
        .collect();
        let object = comment_object("alice", "carol", &[]);
        let evaluator = PreconditionEvaluator::new(&object, &roles);

        let owner_or_qa = Precondition {
            is_owner: true,
            is_qa: true,
            ..Precondition::default()
        };
        assert_eq!(evaluator.check_one(&owner_or_qa), Ok(()));

        let owner_or_reviewer = Precondition {
            is_owner: true,
            required_roles: vec!["reviewer".to_string(), "owner".to_string()],
            ..Precondition::default()
        };
        assert_eq!(
            owner_or_reviewer.role_requirement(),
            vec!["owner".to_string(), "reviewer".to_string()]
        );
        assert_eq!(evaluator.check_one(&owner_or_reviewer), Ok(()));

        let stranger = comment_object("bob", "carol", &[]);
        assert_eq!(
            PreconditionEvaluator::new(&stranger, &roles).check_one(&owner_or_qa),
            Err(PreconditionError::NotInRoles {
                user: "bob".to_string(),
                roles: vec!["owner".to_string(), "qa".to_string()],
            })
        );
    }

    #[test]
    fn functional_label_checks_run_in_declared_order() {
        let roles = roles();
        let object = comment_object("alice", "carol", &["kind/bug", "module/core"]);
        let evaluator = PreconditionEvaluator::new(&object, &roles);

        let satisfied = Precondition {
            is_owner: true,
            required_labels: vec!["kind/bug".to_string()],
            required_label_prefix: vec!["module/".to_string()],
            ..Precondition::default()
        };
        assert_eq!(evaluator.check_one(&satisfied), Ok(()));

        let missing_label = Precondition {
            required_labels: vec!["kind/bug".to_string(), "priority/high".to_string()],
            required_label_prefix: vec!["size/".to_string()],
            ..Precondition::default()
        };
        assert_eq!(
            evaluator.check_one(&missing_label),
            Err(PreconditionError::MissingLabel("priority/high".to_string()))
        );

        let missing_prefix = Precondition {
            required_label_prefix: vec!["module/".to_string(), "size/".to_string()],
            ..Precondition::default()
        };
        assert_eq!(
            evaluator.check_one(&missing_prefix),
            Err(PreconditionError::MissingLabelPrefix("size/".to_string()))
        );
    }

    #[test]
    fn regression_precondition_decodes_from_partial_json() {
        let precondition: Precondition =
            serde_json::from_value(json!({"is_owner": true})).expect("decode");
        assert!(precondition.is_owner);
        assert!(precondition.required_roles.is_empty());
    }
}
