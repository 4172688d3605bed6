use crate::types::{Account, AccountId, RelationshipState, Snapshot};

/// Filter the eligible roster down to the accounts whose live relationship
/// state matches one of the target states.
///
/// Pure function over the snapshot: no side effects, no captured state. An
/// account absent from the snapshot matches none of the named states, and a
/// state string the provider reports that parses to no known state matches
/// nothing either. Comparison is case-insensitive (see
/// [`RelationshipState::parse`]). Output preserves roster order.
pub fn classify(
    snapshot: &Snapshot,
    eligible: &[Account],
    targets: &[RelationshipState],
) -> Vec<AccountId> {
    eligible
        .iter()
        .filter(|account| {
            snapshot
                .get(&account.id)
                .and_then(|raw| RelationshipState::parse(raw))
                .is_some_and(|state| targets.contains(&state))
        })
        .map(|account| account.id.clone())
        .collect()
}
