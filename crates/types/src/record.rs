//! Activity records produced by resolving a description against a traced call.
//!
//! An [`ActivityRecord`] is the only thing handed to the logging / graph-building collaborator:
//! a flat, role-keyed view of what the description asked for, with every declared reference
//! either resolved to a JSON value or marked [`Resolution::Unresolved`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::description::{CollectionRelation, EntityType};

/// Outcome of evaluating one value reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Resolution {
    /// The reference could not be evaluated. Recorded instead of failing the activity.
    Unresolved(Unresolved),
    Resolved(JsonValue),
}

/// Sentinel describing a reference that could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Unresolved {
    /// Reference text as authored.
    pub unresolved: String,
    /// Human-readable reason.
    pub reason: String,
}

impl Resolution {
    pub fn unresolved(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Resolution::Unresolved(Unresolved {
            unresolved: reference.into(),
            reason: reason.into(),
        })
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    /// Resolved value, if any.
    pub fn value(&self) -> Option<&JsonValue> {
        match self {
            Resolution::Resolved(value) => Some(value),
            Resolution::Unresolved(_) => None,
        }
    }
}

impl From<JsonValue> for Resolution {
    fn from(value: JsonValue) -> Self {
        Resolution::Resolved(value)
    }
}

/// Resolved fields of a single usage or generation role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Resolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Resolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Resolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,
    #[serde(default, rename = "contentType", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// One element of a collection role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Role of the collection entity this element belongs to.
    pub role: String,
    pub relation: CollectionRelation,
    /// Position of the element in the resolved sequence.
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Resolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Resolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Resolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,
    #[serde(default, rename = "contentType", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Everything resolved for one traced call of an activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Activity name the record was resolved for.
    pub activity: String,
    /// Parameters keyed by their reported name, in declaration order.
    #[serde(default)]
    pub parameters: IndexMap<String, Resolution>,
    /// Usage roles keyed by role name.
    #[serde(default)]
    pub used: IndexMap<String, RoleRecord>,
    /// Generation roles keyed by role name.
    #[serde(default)]
    pub generated: IndexMap<String, RoleRecord>,
    /// Elements of collection roles, in role then element order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<MemberRecord>,
}

impl ActivityRecord {
    pub fn new(activity: impl Into<String>) -> Self {
        Self {
            activity: activity.into(),
            ..Default::default()
        }
    }

    /// Members recorded for the given parent role.
    pub fn members_of<'a>(&'a self, role: &'a str) -> impl Iterator<Item = &'a MemberRecord> + 'a {
        self.members.iter().filter(move |member| member.role == role)
    }

    /// Number of declared references that could not be evaluated.
    pub fn unresolved_count(&self) -> usize {
        let role_fields = self
            .used
            .values()
            .chain(self.generated.values())
            .flat_map(|role| [&role.value, &role.location, &role.id]);
        let member_fields = self.members.iter().flat_map(|member| [&member.value, &member.location, &member.id]);

        let fields_unresolved = role_fields
            .chain(member_fields)
            .filter(|field| matches!(field, Some(Resolution::Unresolved(_))))
            .count();
        let parameters_unresolved = self.parameters.values().filter(|parameter| !parameter.is_resolved()).count();
        fields_unresolved + parameters_unresolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_record_serializes_only_present_fields() {
        let record = RoleRecord {
            value: Some(Resolution::Resolved(json!(1))),
            entity_type: Some(EntityType::PythonObject),
            ..Default::default()
        };

        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json, json!({"value": 1, "entity_type": "PythonObject"}));
    }

    #[test]
    fn member_record_names_its_content_type() {
        let member = MemberRecord {
            role: "datasets".into(),
            relation: CollectionRelation::HasMembers,
            index: 0,
            value: Some(Resolution::Resolved(json!("obs.fits"))),
            location: None,
            id: None,
            namespace: None,
            entity_type: Some(EntityType::File),
            content_type: Some("application/fits".into()),
        };

        let json = serde_json::to_value(&member).expect("serialize");
        assert_eq!(json["contentType"], json!("application/fits"));
        assert!(json.get("content_type").is_none());
        assert!(json.get("location").is_none());
    }

    #[test]
    fn unresolved_sentinel_survives_json() {
        let resolution = Resolution::unresolved("kwargs.value", "no keyword argument 'value'");
        let json = serde_json::to_value(&resolution).expect("serialize");
        assert_eq!(json["unresolved"], "kwargs.value");

        let back: Resolution = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, resolution);

        let plain: Resolution = serde_json::from_value(json!({"unresolved": 1, "other": true})).expect("deserialize");
        assert!(plain.is_resolved());
    }

    #[test]
    fn counts_unresolved_fields() {
        let mut record = ActivityRecord::new("run");
        record.parameters.insert("value".into(), Resolution::unresolved("kwargs.value", "missing"));
        record.used.insert(
            "input".into(),
            RoleRecord {
                value: Some(Resolution::Resolved(json!("a"))),
                location: Some(Resolution::unresolved("path", "missing")),
                ..Default::default()
            },
        );
        assert_eq!(record.unresolved_count(), 2);
    }
}
