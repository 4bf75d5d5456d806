//! Strongly typed description schema shared by the engine and the command line front end.
//!
//! A description document tells a provenance tracer what to record when a traced call happens:
//! which parameters to capture and which entities the call uses and generates. The models
//! preserve authoring order (via `IndexMap`) and keep any field they do not interpret in an
//! `extra` map so newer documents still load.
//!
//! Field names follow the document vocabulary verbatim (`entity_description`, `has_members`,
//! `contentType`, ...), so existing documents deserialize without translation.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

/// Top-level description document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptionDocument {
    /// Activity descriptions keyed by activity (traced function) name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub activity_descriptions: IndexMap<String, ActivityDescription>,
    /// Entity descriptions keyed by entity description name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub entity_descriptions: IndexMap<String, EntityDescription>,
    /// Agent descriptions. Kept opaque: documents have never defined their shape.
    #[serde(default, deserialize_with = "null_as_default")]
    pub agents: IndexMap<String, JsonValue>,
    /// Namespace prefixes mapped to their URI.
    #[serde(default, deserialize_with = "null_as_default")]
    pub namespaces: IndexMap<String, String>,
    /// Unrecognized top-level keys, preserved verbatim.
    #[serde(flatten)]
    pub extra: IndexMap<String, JsonValue>,
}

/// Declares what to record for one traced activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityDescription {
    /// Human-readable summary of the activity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordered parameter declarations.
    #[serde(default, deserialize_with = "null_as_default")]
    pub parameters: Vec<ParameterSpec>,
    /// Entities read by the activity.
    #[serde(default, deserialize_with = "null_as_default")]
    pub usage: Vec<EntityRoleSpec>,
    /// Entities produced by the activity.
    #[serde(default, deserialize_with = "null_as_default")]
    pub generation: Vec<EntityRoleSpec>,
    #[serde(flatten)]
    pub extra: IndexMap<String, JsonValue>,
}

impl ActivityDescription {
    /// Iterates over every role declared in either the usage or the generation list.
    pub fn roles(&self) -> impl Iterator<Item = (RoleDirection, &EntityRoleSpec)> {
        self.usage
            .iter()
            .map(|spec| (RoleDirection::Used, spec))
            .chain(self.generation.iter().map(|spec| (RoleDirection::Generated, spec)))
    }
}

/// Whether a role appears in the usage or the generation list of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleDirection {
    Used,
    Generated,
}

impl RoleDirection {
    /// Name of the document list the role was declared in.
    pub fn list_name(self) -> &'static str {
        match self {
            RoleDirection::Used => "usage",
            RoleDirection::Generated => "generation",
        }
    }
}

impl fmt::Display for RoleDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.list_name())
    }
}

/// A single parameter captured when the activity runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Name reported in the activity record. Falls back to the value reference when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Value reference evaluated against the call context.
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<JsonValue>>,
    #[serde(flatten)]
    pub extra: IndexMap<String, JsonValue>,
}

impl ParameterSpec {
    /// Key under which the parameter is reported.
    pub fn record_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.value)
    }
}

/// An entity used or generated by an activity, together with the references that locate it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRoleSpec {
    /// Role name; becomes the edge label in the provenance graph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Name of the [`EntityDescription`] this role refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Namespace prefix used to qualify a resolved identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_members: Option<CollectionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_progenitors: Option<CollectionSpec>,
    #[serde(flatten)]
    pub extra: IndexMap<String, JsonValue>,
}

impl EntityRoleSpec {
    /// Key under which the role is reported.
    ///
    /// Authored documents usually name every role; when they do not, the first declared
    /// reference (`value`, then `location`, then `id`) stands in for it.
    pub fn role_key(&self) -> &str {
        self.role
            .as_deref()
            .or(self.value.as_deref())
            .or(self.location.as_deref())
            .or(self.id.as_deref())
            .unwrap_or_default()
    }

    /// Collection specs declared on this role, tagged with their relation.
    pub fn collections(&self) -> impl Iterator<Item = (CollectionRelation, &CollectionSpec)> {
        [
            (CollectionRelation::HasMembers, self.has_members.as_ref()),
            (CollectionRelation::HasProgenitors, self.has_progenitors.as_ref()),
        ]
        .into_iter()
        .filter_map(|(relation, spec)| spec.map(|spec| (relation, spec)))
    }
}

/// Describes the elements of a collection role (members or progenitors).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Reference to the sequence of elements. When absent the collection has one member, rooted at
    /// the call (its receiver, when there is one).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_description: Option<String>,
    /// Templates evaluated with each element as their implicit root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: IndexMap<String, JsonValue>,
}

/// Relation between a collection entity and its elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionRelation {
    HasMembers,
    HasProgenitors,
}

impl fmt::Display for CollectionRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionRelation::HasMembers => f.write_str("has_members"),
            CollectionRelation::HasProgenitors => f.write_str("has_progenitors"),
        }
    }
}

/// Describes a kind of entity and how it is addressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub r#type: EntityType,
    /// Link to external documentation of the entity format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docurl: Option<String>,
    /// MIME type of file entities.
    #[serde(default, rename = "contentType", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Index file naming convention inside a `FileCollection` directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(flatten)]
    pub extra: IndexMap<String, JsonValue>,
}

/// Entity type tag.
///
/// Unrecognized tags deserialize into [`EntityType::Other`] so the validator can report the
/// offending entity by name instead of failing inside the deserializer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityType {
    /// In-memory value, identified by identity.
    PythonObject,
    /// File on disk, addressed by location.
    File,
    /// Directory of files, optionally with an index file.
    FileCollection,
    Other(String),
}

impl EntityType {
    pub fn as_str(&self) -> &str {
        match self {
            EntityType::PythonObject => "PythonObject",
            EntityType::File => "File",
            EntityType::FileCollection => "FileCollection",
            EntityType::Other(tag) => tag,
        }
    }

    /// True for the tags the schema recognizes.
    pub fn is_known(&self) -> bool {
        !matches!(self, EntityType::Other(_))
    }

    /// True for disk-addressed entities, which are expected to declare a `location`.
    pub fn is_file_like(&self) -> bool {
        matches!(self, EntityType::File | EntityType::FileCollection)
    }
}

impl From<String> for EntityType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "PythonObject" => EntityType::PythonObject,
            "File" => EntityType::File,
            "FileCollection" => EntityType::FileCollection,
            _ => EntityType::Other(tag),
        }
    }
}

impl From<EntityType> for String {
    fn from(entity_type: EntityType) -> Self {
        entity_type.as_str().to_string()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Treats an explicit `null` (an empty YAML key such as `agents:`) like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
