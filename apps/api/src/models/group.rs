//! User groups and collaborative-editing state.
//!
//! A group tracks its members, its admins, the signals it works on and a
//! per-signal collaborator map. The map is held as `BTreeMap<i32, BTreeSet<i32>>`
//! in memory; JSON object keys only become strings at the storage and wire
//! boundaries. All consistency cascades live here as pure methods so the
//! store can run them inside a transaction and tests can run them without a
//! database.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::signal::Signal;
use crate::models::user::User;

/// signal id -> ids of members who may edit that signal.
pub type CollaboratorMap = BTreeMap<i32, BTreeSet<i32>>;

/// The user group entity model used in the database and API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserGroup {
    #[serde(default)]
    pub id: i32,
    pub name: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub signal_ids: Vec<i32>,
    #[serde(default)]
    pub user_ids: Vec<i32>,
    #[serde(default)]
    pub admin_ids: Vec<i32>,
    #[serde(default)]
    pub collaborator_map: CollaboratorMap,
}

impl Default for UserGroup {
    fn default() -> Self {
        UserGroup {
            id: 0,
            name: String::new(),
            created_at: Utc::now(),
            signal_ids: Vec::new(),
            user_ids: Vec::new(),
            admin_ids: Vec::new(),
            collaborator_map: CollaboratorMap::new(),
        }
    }
}

impl UserGroup {
    pub fn is_member(&self, user_id: i32) -> bool {
        self.user_ids.contains(&user_id) || self.admin_ids.contains(&user_id)
    }

    pub fn is_admin(&self, user_id: i32) -> bool {
        self.admin_ids.contains(&user_id)
    }

    pub fn has_signal(&self, signal_id: i32) -> bool {
        self.signal_ids.contains(&signal_id)
    }

    /// Idempotently adds a member. Returns true as long as the user ends up
    /// a member, whether newly added or already present.
    pub fn add_member(&mut self, user_id: i32) -> bool {
        if !self.user_ids.contains(&user_id) {
            self.user_ids.push(user_id);
        }
        true
    }

    /// Grants group admin rights, implying membership.
    pub fn add_admin(&mut self, user_id: i32) {
        self.add_member(user_id);
        if !self.admin_ids.contains(&user_id) {
            self.admin_ids.push(user_id);
        }
    }

    /// Removes a member, cascading into the collaborator map: the user is
    /// stripped from every per-signal list and entries left empty are pruned.
    /// Returns false if the user was not a member.
    pub fn remove_member(&mut self, user_id: i32) -> bool {
        if !self.is_member(user_id) {
            return false;
        }
        self.user_ids.retain(|id| *id != user_id);
        self.admin_ids.retain(|id| *id != user_id);
        for editors in self.collaborator_map.values_mut() {
            editors.remove(&user_id);
        }
        self.collaborator_map.retain(|_, editors| !editors.is_empty());
        true
    }

    /// Idempotently associates a signal with the group.
    pub fn add_signal(&mut self, signal_id: i32) -> bool {
        if !self.signal_ids.contains(&signal_id) {
            self.signal_ids.push(signal_id);
        }
        true
    }

    /// Dissociates a signal, deleting its collaborator-map entry entirely.
    /// Returns false if the signal was not associated.
    pub fn remove_signal(&mut self, signal_id: i32) -> bool {
        if !self.signal_ids.contains(&signal_id) {
            return false;
        }
        self.signal_ids.retain(|id| *id != signal_id);
        self.collaborator_map.remove(&signal_id);
        true
    }

    /// Marks a member as a collaborator on one of the group's signals.
    /// Fails if the signal is not associated with the group or the user is
    /// not a member.
    pub fn add_collaborator(&mut self, signal_id: i32, user_id: i32) -> bool {
        if !self.has_signal(signal_id) || !self.is_member(user_id) {
            return false;
        }
        self.collaborator_map
            .entry(signal_id)
            .or_default()
            .insert(user_id);
        true
    }

    /// Removes a collaborator entry, pruning the per-signal list when it
    /// becomes empty. Returns false if no such entry existed.
    pub fn remove_collaborator(&mut self, signal_id: i32, user_id: i32) -> bool {
        let Some(editors) = self.collaborator_map.get_mut(&signal_id) else {
            return false;
        };
        if !editors.remove(&user_id) {
            return false;
        }
        if editors.is_empty() {
            self.collaborator_map.remove(&signal_id);
        }
        true
    }

    pub fn collaborators_for(&self, signal_id: i32) -> Option<&BTreeSet<i32>> {
        self.collaborator_map.get(&signal_id)
    }

    /// Whether a member may edit a signal through this group.
    pub fn grants_edit(&self, signal_id: i32, user_id: i32) -> bool {
        self.has_signal(signal_id)
            && self
                .collaborators_for(signal_id)
                .is_some_and(|editors| editors.contains(&user_id))
    }

    /// Re-establishes the intended invariants after a wholesale update:
    /// admins are members, map keys correspond to associated signals, map
    /// values only reference members, and no entry is left empty.
    pub fn normalise(&mut self) {
        for admin in self.admin_ids.clone() {
            self.add_member(admin);
        }
        let signals: BTreeSet<i32> = self.signal_ids.iter().copied().collect();
        let members: BTreeSet<i32> = self.user_ids.iter().copied().collect();
        self.collaborator_map.retain(|signal_id, editors| {
            if !signals.contains(signal_id) {
                return false;
            }
            editors.retain(|id| members.contains(id));
            !editors.is_empty()
        });
    }
}

/// Deserializes a stored collaborator map, tolerating string-typed keys and
/// values left behind by older writers.
pub fn collaborator_map_from_json(value: &Value) -> CollaboratorMap {
    let mut map = CollaboratorMap::new();
    let Some(object) = value.as_object() else {
        return map;
    };
    for (key, editors) in object {
        let Ok(signal_id) = key.trim().parse::<i32>() else {
            continue;
        };
        let Some(items) = editors.as_array() else {
            continue;
        };
        let ids: BTreeSet<i32> = items.iter().filter_map(coerce_id).collect();
        if !ids.is_empty() {
            map.insert(signal_id, ids);
        }
    }
    map
}

/// Serializes a collaborator map with string keys for the jsonb column.
pub fn collaborator_map_to_json(map: &CollaboratorMap) -> Value {
    let object: serde_json::Map<String, Value> = map
        .iter()
        .map(|(signal_id, editors)| {
            (
                signal_id.to_string(),
                Value::Array(editors.iter().map(|id| Value::from(*id)).collect()),
            )
        })
        .collect();
    Value::Object(object)
}

fn coerce_id(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|id| i32::try_from(id).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A collaborator reference on a signal: either an individual user (by
/// email) or a whole user group. Rendered as the user email or a
/// `group:{id}` token on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collaborator {
    User(String),
    Group(i32),
}

impl FromStr for Collaborator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix("group:") {
            Some(id) => id
                .parse()
                .map(Collaborator::Group)
                .map_err(|_| format!("invalid group collaborator token '{s}'")),
            None => Ok(Collaborator::User(s.to_string())),
        }
    }
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collaborator::User(email) => f.write_str(email),
            Collaborator::Group(id) => write!(f, "group:{id}"),
        }
    }
}

impl Serialize for Collaborator {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Collaborator {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        token.parse().map_err(serde::de::Error::custom)
    }
}

/// A member's view of a group: its signals carry a per-viewer edit flag.
#[derive(Debug, Clone, Serialize)]
pub struct GroupSignalView {
    #[serde(flatten)]
    pub signal: Signal,
    pub can_edit: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupWithSignals {
    #[serde(flatten)]
    pub group: UserGroup,
    pub signals: Vec<GroupSignalView>,
    pub users: Vec<User>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn group() -> UserGroup {
        let mut g = UserGroup {
            id: 1,
            name: "Scanning team".to_string(),
            ..UserGroup::default()
        };
        g.add_member(10);
        g.add_member(11);
        g.add_signal(100);
        g.add_signal(101);
        g
    }

    #[test]
    fn add_member_is_idempotent() {
        let mut g = group();
        assert!(g.add_member(10));
        assert!(g.add_member(10));
        assert_eq!(g.user_ids.iter().filter(|id| **id == 10).count(), 1);
    }

    #[test]
    fn removing_member_strips_collaborator_entries() {
        let mut g = group();
        assert!(g.add_collaborator(100, 10));
        assert!(g.add_collaborator(100, 11));
        assert!(g.add_collaborator(101, 10));

        assert!(g.remove_member(10));

        // stripped from every list, and the entry left empty is pruned
        assert_eq!(
            g.collaborators_for(100),
            Some(&BTreeSet::from([11])),
        );
        assert!(g.collaborators_for(101).is_none());
        assert!(!g.is_member(10));
    }

    #[test]
    fn removing_unknown_member_fails() {
        let mut g = group();
        assert!(!g.remove_member(99));
    }

    #[test]
    fn removing_signal_deletes_map_entry() {
        let mut g = group();
        g.add_collaborator(100, 10);
        assert!(g.remove_signal(100));
        assert!(g.collaborators_for(100).is_none());
        assert!(!g.has_signal(100));
        assert!(!g.remove_signal(100));
    }

    #[test]
    fn collaborator_requires_signal_and_membership() {
        let mut g = group();
        assert!(!g.add_collaborator(999, 10), "signal not in group");
        assert!(!g.add_collaborator(100, 99), "user not a member");
        assert!(g.add_collaborator(100, 10));
        // idempotent
        assert!(g.add_collaborator(100, 10));
        assert_eq!(g.collaborators_for(100).unwrap().len(), 1);
    }

    #[test]
    fn remove_collaborator_prunes_empty_entries() {
        let mut g = group();
        g.add_collaborator(100, 10);
        assert!(g.remove_collaborator(100, 10));
        assert!(g.collaborators_for(100).is_none());
        assert!(!g.remove_collaborator(100, 10));
    }

    #[test]
    fn no_operation_leaves_an_empty_entry() {
        let mut g = group();
        g.add_collaborator(100, 10);
        g.add_collaborator(101, 10);
        g.remove_member(10);
        assert!(g.collaborator_map.values().all(|e| !e.is_empty()));
        assert!(g.collaborator_map.is_empty());
    }

    #[test]
    fn grants_edit_only_via_map_entry() {
        let mut g = group();
        assert!(!g.grants_edit(100, 10));
        g.add_collaborator(100, 10);
        assert!(g.grants_edit(100, 10));
        assert!(!g.grants_edit(101, 10));
        g.remove_member(10);
        assert!(!g.grants_edit(100, 10));
    }

    #[test]
    fn normalise_restores_invariants() {
        let mut g = group();
        g.admin_ids.push(42); // admin not in user_ids
        g.collaborator_map.insert(999, BTreeSet::from([10])); // unknown signal
        g.collaborator_map.insert(100, BTreeSet::from([10, 77])); // 77 not a member
        g.normalise();

        assert!(g.user_ids.contains(&42));
        assert!(g.collaborators_for(999).is_none());
        assert_eq!(g.collaborators_for(100), Some(&BTreeSet::from([10])));
    }

    #[test]
    fn map_json_round_trip_uses_string_keys() {
        let mut map = CollaboratorMap::new();
        map.insert(100, BTreeSet::from([10, 11]));
        let json = collaborator_map_to_json(&map);
        assert_eq!(json, json!({"100": [10, 11]}));
        assert_eq!(collaborator_map_from_json(&json), map);
    }

    #[test]
    fn map_decoding_coerces_mismatched_types() {
        let stored = json!({
            "100": ["10", 11],
            " 101 ": [12],
            "bogus": [13],
            "102": "not-a-list",
            "103": [],
        });
        let map = collaborator_map_from_json(&stored);
        assert_eq!(map.get(&100), Some(&BTreeSet::from([10, 11])));
        assert_eq!(map.get(&101), Some(&BTreeSet::from([12])));
        assert!(!map.contains_key(&102));
        assert!(!map.contains_key(&103));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn collaborator_token_round_trip() {
        assert_eq!(
            "group:7".parse::<Collaborator>().unwrap(),
            Collaborator::Group(7)
        );
        assert_eq!(
            "jane.doe@undp.org".parse::<Collaborator>().unwrap(),
            Collaborator::User("jane.doe@undp.org".to_string())
        );
        assert_eq!(Collaborator::Group(7).to_string(), "group:7");
        assert!("group:xyz".parse::<Collaborator>().is_err());
    }
}
