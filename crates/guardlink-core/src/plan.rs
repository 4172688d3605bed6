use crate::classify::classify;
use crate::types::{Account, AccountDetail, AccountId, RelationshipState, Snapshot};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Plan data
// ---------------------------------------------------------------------------

/// Member-side work for one account, executed under that account's delegated
/// session. Every step begins by find-or-creating the member detector; the
/// variants differ in what follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStep {
    /// Detector exists but the member disabled it: switch it back on.
    Enable,
    /// Membership is being recreated; make sure the detector is there.
    EnsureDetector,
    /// An invitation should be pending: find the administrator's invitation
    /// and accept it with the member detector.
    AcceptInvitation,
}

impl MemberStep {
    pub fn as_str(self) -> &'static str {
        match self {
            MemberStep::Enable => "enable",
            MemberStep::EnsureDetector => "ensure_detector",
            MemberStep::AcceptInvitation => "accept_invitation",
        }
    }
}

impl fmt::Display for MemberStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberAction {
    pub account: AccountId,
    pub step: MemberStep,
}

/// Everything one region's pass should do, derived up front from a single
/// snapshot and applied by the execution layer in field order: deletions,
/// then one batched create, then one batched invite, then per-account member
/// steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionPlan {
    pub delete: Vec<AccountId>,
    pub create: Vec<AccountDetail>,
    pub invite: Vec<AccountId>,
    pub member_actions: Vec<MemberAction>,
}

impl RegionPlan {
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty()
            && self.create.is_empty()
            && self.invite.is_empty()
            && self.member_actions.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Derive one region's plan from the eligible roster and the live snapshot.
///
/// Fixed order: EMAILVERIFICATIONFAILED memberships are deleted first (a
/// terminal dead end; recreation happens on a later run, never in the same
/// pass), absent or REMOVED accounts are created, CREATED or RESIGNED
/// accounts are invited, and each account gets at most one member-side step.
/// The whole plan comes from one snapshot taken before any mutation, so an
/// account created by this plan is invited on the next run; the provider is
/// never assumed to reflect transitions synchronously.
///
/// The administrator-side sets (delete, create, invite) are pairwise
/// disjoint because their classifying states are. Only the roster is ever
/// acted on: accounts outside it are invisible here no matter what state
/// the snapshot reports for them.
pub fn derive(eligible: &[Account], snapshot: &Snapshot) -> RegionPlan {
    let delete = classify(
        snapshot,
        eligible,
        &[RelationshipState::EmailVerificationFailed],
    );

    let create: Vec<AccountDetail> = eligible
        .iter()
        .filter(|account| match snapshot.get(&account.id) {
            None => true,
            Some(raw) => RelationshipState::parse(raw) == Some(RelationshipState::Removed),
        })
        .map(AccountDetail::from)
        .collect();

    let invite = classify(
        snapshot,
        eligible,
        &[RelationshipState::Created, RelationshipState::Resigned],
    );

    let member_actions = eligible
        .iter()
        .filter_map(|account| {
            let state = snapshot
                .get(&account.id)
                .and_then(|raw| RelationshipState::parse(raw))?;
            let step = match state {
                RelationshipState::Disabled => MemberStep::Enable,
                RelationshipState::Removed => MemberStep::EnsureDetector,
                RelationshipState::Resigned
                | RelationshipState::Invited
                | RelationshipState::EmailVerificationInProgress => MemberStep::AcceptInvitation,
                RelationshipState::Created
                | RelationshipState::Enabled
                | RelationshipState::EmailVerificationFailed => return None,
            };
            Some(MemberAction {
                account: account.id.clone(),
                step,
            })
        })
        .collect();

    RegionPlan {
        delete,
        create,
        invite,
        member_actions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RoleRef;

    fn account(id: &str) -> Account {
        Account {
            id: AccountId::from(id),
            email: format!("{id}@example.com"),
            role: RoleRef::from("role"),
        }
    }

    fn snapshot(entries: &[(&str, &str)]) -> Snapshot {
        entries
            .iter()
            .map(|(id, state)| (AccountId::from(*id), state.to_string()))
            .collect()
    }

    fn ids(ids: &[&str]) -> Vec<AccountId> {
        ids.iter().map(|id| AccountId::from(*id)).collect()
    }

    #[test]
    fn fresh_roster_is_created_not_invited() {
        let eligible = vec![account("111"), account("222")];
        let plan = derive(&eligible, &snapshot(&[]));

        assert!(plan.delete.is_empty());
        assert_eq!(
            plan.create,
            vec![
                AccountDetail {
                    id: AccountId::from("111"),
                    email: "111@example.com".to_string()
                },
                AccountDetail {
                    id: AccountId::from("222"),
                    email: "222@example.com".to_string()
                },
            ]
        );
        // Created this pass, invited next pass: never both in one.
        assert!(plan.invite.is_empty());
        assert!(plan.member_actions.is_empty());
    }

    #[test]
    fn created_accounts_are_invited_on_the_following_pass() {
        let eligible = vec![account("111"), account("222")];
        let plan = derive(
            &eligible,
            &snapshot(&[("111", "CREATED"), ("222", "CREATED")]),
        );

        assert!(plan.create.is_empty());
        assert_eq!(plan.invite, ids(&["111", "222"]));
        assert!(plan.member_actions.is_empty());
    }

    #[test]
    fn disabled_member_gets_enable_step_only() {
        let eligible = vec![account("111")];
        let plan = derive(&eligible, &snapshot(&[("111", "DISABLED")]));

        assert!(plan.delete.is_empty());
        assert!(plan.create.is_empty());
        assert!(plan.invite.is_empty());
        assert_eq!(
            plan.member_actions,
            vec![MemberAction {
                account: AccountId::from("111"),
                step: MemberStep::Enable,
            }]
        );
    }

    #[test]
    fn failed_verification_is_deleted_and_not_recreated_this_pass() {
        let eligible = vec![account("111")];
        let plan = derive(&eligible, &snapshot(&[("111", "EMAILVERIFICATIONFAILED")]));

        assert_eq!(plan.delete, ids(&["111"]));
        assert!(plan.create.is_empty());
        assert!(plan.invite.is_empty());
        assert!(plan.member_actions.is_empty());
    }

    #[test]
    fn removed_member_is_recreated_with_detector_ensured() {
        let eligible = vec![account("111")];
        let plan = derive(&eligible, &snapshot(&[("111", "REMOVED")]));

        assert_eq!(plan.create.len(), 1);
        assert!(plan.invite.is_empty());
        assert_eq!(
            plan.member_actions,
            vec![MemberAction {
                account: AccountId::from("111"),
                step: MemberStep::EnsureDetector,
            }]
        );
    }

    #[test]
    fn resigned_member_is_reinvited_and_accepts() {
        let eligible = vec![account("111")];
        let plan = derive(&eligible, &snapshot(&[("111", "RESIGNED")]));

        assert_eq!(plan.invite, ids(&["111"]));
        assert_eq!(
            plan.member_actions,
            vec![MemberAction {
                account: AccountId::from("111"),
                step: MemberStep::AcceptInvitation,
            }]
        );
        assert!(plan.create.is_empty());
    }

    #[test]
    fn invited_and_verification_in_progress_accept() {
        let eligible = vec![account("111"), account("222")];
        let plan = derive(
            &eligible,
            &snapshot(&[("111", "INVITED"), ("222", "EMAILVERIFICATIONINPROGRESS")]),
        );

        assert!(plan.invite.is_empty());
        let steps: Vec<MemberStep> = plan.member_actions.iter().map(|a| a.step).collect();
        assert_eq!(
            steps,
            vec![MemberStep::AcceptInvitation, MemberStep::AcceptInvitation]
        );
    }

    #[test]
    fn enabled_fleet_is_quiescent() {
        let eligible = vec![account("111"), account("222")];
        let plan = derive(
            &eligible,
            &snapshot(&[("111", "ENABLED"), ("222", "Enabled")]),
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn accounts_outside_the_roster_are_never_touched() {
        let eligible = vec![account("111")];
        let plan = derive(
            &eligible,
            &snapshot(&[
                ("111", "ENABLED"),
                ("888", "EMAILVERIFICATIONFAILED"),
                ("999", "DISABLED"),
            ]),
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn unknown_state_strings_are_left_alone() {
        let eligible = vec![account("111")];
        let plan = derive(&eligible, &snapshot(&[("111", "SUSPENDED")]));
        // Present but unrecognized: not absent, so not recreated either.
        assert!(plan.is_empty());
    }

    #[test]
    fn full_state_table() {
        let eligible = vec![
            account("100"), // absent
            account("101"), // CREATED
            account("102"), // INVITED
            account("103"), // DISABLED
            account("104"), // ENABLED
            account("105"), // REMOVED
            account("106"), // RESIGNED
            account("107"), // EMAILVERIFICATIONINPROGRESS
            account("108"), // EMAILVERIFICATIONFAILED
        ];
        let snap = snapshot(&[
            ("101", "CREATED"),
            ("102", "INVITED"),
            ("103", "DISABLED"),
            ("104", "ENABLED"),
            ("105", "REMOVED"),
            ("106", "RESIGNED"),
            ("107", "EMAILVERIFICATIONINPROGRESS"),
            ("108", "EMAILVERIFICATIONFAILED"),
        ]);

        let plan = derive(&eligible, &snap);

        assert_eq!(plan.delete, ids(&["108"]));
        let created: Vec<&str> = plan.create.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(created, vec!["100", "105"]);
        assert_eq!(plan.invite, ids(&["101", "106"]));
        let steps: Vec<(&str, MemberStep)> = plan
            .member_actions
            .iter()
            .map(|a| (a.account.as_str(), a.step))
            .collect();
        assert_eq!(
            steps,
            vec![
                ("102", MemberStep::AcceptInvitation),
                ("103", MemberStep::Enable),
                ("105", MemberStep::EnsureDetector),
                ("106", MemberStep::AcceptInvitation),
                ("107", MemberStep::AcceptInvitation),
            ]
        );
    }

    #[test]
    fn admin_side_sets_are_pairwise_disjoint() {
        let eligible: Vec<Account> = (100..109).map(|n| account(&n.to_string())).collect();
        let snap = snapshot(&[
            ("101", "CREATED"),
            ("102", "INVITED"),
            ("103", "DISABLED"),
            ("104", "ENABLED"),
            ("105", "REMOVED"),
            ("106", "RESIGNED"),
            ("107", "EMAILVERIFICATIONINPROGRESS"),
            ("108", "EMAILVERIFICATIONFAILED"),
        ]);
        let plan = derive(&eligible, &snap);

        let created: Vec<AccountId> = plan.create.iter().map(|d| d.id.clone()).collect();
        for id in &plan.delete {
            assert!(!created.contains(id));
            assert!(!plan.invite.contains(id));
        }
        for id in &created {
            assert!(!plan.invite.contains(id));
        }
        // At most one member step per account.
        let mut seen: Vec<&AccountId> = Vec::new();
        for action in &plan.member_actions {
            assert!(!seen.contains(&&action.account));
            seen.push(&action.account);
        }
    }
}
