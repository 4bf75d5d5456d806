//! Loading and validation of description documents.
//!
//! [`parse_description_str`] and [`parse_description_value`] turn a document into an immutable
//! [`DescriptionSet`]. Every value reference is parsed here, once, so resolution never re-parses
//! text on the tracing hot path.
//!
//! Problems that do not stop a document from loading are logged and kept as [`Diagnostic`]s on
//! the set, so callers can report them.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use provdesc_types::{ActivityDescription, DescriptionDocument, EntityDescription, EntityRoleSpec, RoleDirection};
use regex::Regex;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::reference::{ReferenceParseError, ValueReference};

static NAMESPACE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.-]*$").expect("valid namespace prefix pattern"));

/// Errors raised while loading a description document. All of them are fatal.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("malformed description document: {message}")]
    Structure { message: String },

    #[error("activity '{activity}' role '{role}' references undefined entity description '{entity}'")]
    UnknownEntityDescription { activity: String, role: String, entity: String },

    #[error("entity description '{entity}' has unknown type '{type_tag}' (expected PythonObject, File or FileCollection)")]
    UnknownEntityType { entity: String, type_tag: String },

    #[error("activity '{activity}' declares role '{role}' more than once in its {list} list")]
    DuplicateRole { activity: String, list: RoleDirection, role: String },

    #[error("invalid value reference '{reference}' at {location}: {source}")]
    InvalidReference {
        location: String,
        reference: String,
        #[source]
        source: ReferenceParseError,
    },

    #[error("invalid namespace '{prefix}': {reason}")]
    InvalidNamespace { prefix: String, reason: String },
}

/// A non-fatal finding from validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Diagnostic {
    #[error("unknown top-level key '{key}' is ignored")]
    UnknownTopLevelKey { key: String },

    #[error("activity '{activity}' role '{role}' uses undeclared namespace prefix '{prefix}'")]
    UndeclaredNamespace { activity: String, role: String, prefix: String },

    #[error("activity '{activity}' role '{role}' is a {entity} file entity but declares no location")]
    FileRoleWithoutLocation { activity: String, role: String, entity: String },

    #[error("activity '{activity}' role '{role}' is a {entity} object entity but declares no value")]
    ObjectRoleWithoutValue { activity: String, role: String, entity: String },
}

impl Diagnostic {
    fn log(&self) {
        match self {
            Diagnostic::UnknownTopLevelKey { key } => {
                warn!(key = %key, "ignoring unknown top-level key in description document");
            }
            Diagnostic::UndeclaredNamespace { activity, role, prefix } => {
                warn!(activity = %activity, role = %role, namespace = %prefix, "role uses an undeclared namespace prefix");
            }
            Diagnostic::FileRoleWithoutLocation { activity, role, entity } => {
                debug!(activity = %activity, role = %role, entity = %entity, "file entity role declares no location");
            }
            Diagnostic::ObjectRoleWithoutValue { activity, role, entity } => {
                debug!(activity = %activity, role = %role, entity = %entity, "object entity role declares no value");
            }
        }
    }
}

/// A validated description document.
///
/// Immutable once built; share it behind an `Arc` across tracing threads.
#[derive(Debug, Clone, Default)]
pub struct DescriptionSet {
    document: DescriptionDocument,
    references: HashMap<String, ValueReference>,
    diagnostics: Vec<Diagnostic>,
}

impl DescriptionSet {
    pub fn activity(&self, name: &str) -> Option<&ActivityDescription> {
        self.document.activity_descriptions.get(name)
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDescription> {
        self.document.entity_descriptions.get(name)
    }

    /// URI declared for a namespace prefix.
    pub fn namespace_uri(&self, prefix: &str) -> Option<&str> {
        self.document.namespaces.get(prefix).map(String::as_str)
    }

    pub fn activities(&self) -> &IndexMap<String, ActivityDescription> {
        &self.document.activity_descriptions
    }

    pub fn entities(&self) -> &IndexMap<String, EntityDescription> {
        &self.document.entity_descriptions
    }

    pub fn namespaces(&self) -> &IndexMap<String, String> {
        &self.document.namespaces
    }

    /// Agent metadata, preserved as authored.
    pub fn agents(&self) -> &IndexMap<String, JsonValue> {
        &self.document.agents
    }

    pub fn document(&self) -> &DescriptionDocument {
        &self.document
    }

    /// Non-fatal findings from validation, in document order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Parsed form of a reference that appears in the document.
    pub(crate) fn reference(&self, text: &str) -> Option<&ValueReference> {
        self.references.get(text.trim())
    }
}

/// Parses and validates a YAML (or JSON) description document.
pub fn parse_description_str(text: &str) -> Result<DescriptionSet, SchemaError> {
    let value: serde_yaml::Value = serde_yaml::from_str(text)?;
    parse_description_value(value)
}

/// Validates an already-parsed document tree. An empty document yields an empty set.
pub fn parse_description_value(value: serde_yaml::Value) -> Result<DescriptionSet, SchemaError> {
    match value {
        serde_yaml::Value::Null => return Ok(DescriptionSet::default()),
        serde_yaml::Value::Mapping(_) => {}
        other => {
            return Err(SchemaError::Structure {
                message: format!("expected a mapping at the top level, found {}", yaml_kind(&other)),
            });
        }
    }

    let document: DescriptionDocument = serde_yaml::from_value(value).map_err(|error| SchemaError::Structure {
        message: error.to_string(),
    })?;
    let set = Validator::default().validate(document)?;

    debug!(
        activities = set.activities().len(),
        entities = set.entities().len(),
        namespaces = set.namespaces().len(),
        diagnostics = set.diagnostics().len(),
        "loaded description document"
    );
    Ok(set)
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a sequence",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}

#[derive(Default)]
struct Validator {
    references: HashMap<String, ValueReference>,
    diagnostics: Vec<Diagnostic>,
}

impl Validator {
    fn validate(mut self, document: DescriptionDocument) -> Result<DescriptionSet, SchemaError> {
        for key in document.extra.keys() {
            self.note(Diagnostic::UnknownTopLevelKey { key: key.clone() });
        }

        for (name, entity) in &document.entity_descriptions {
            if !entity.r#type.is_known() {
                return Err(SchemaError::UnknownEntityType {
                    entity: name.clone(),
                    type_tag: entity.r#type.as_str().to_string(),
                });
            }
        }

        for (prefix, uri) in &document.namespaces {
            validate_namespace(prefix, uri)?;
        }

        for (name, activity) in &document.activity_descriptions {
            self.validate_activity(&document, name, activity)?;
        }

        Ok(DescriptionSet {
            document,
            references: self.references,
            diagnostics: self.diagnostics,
        })
    }

    fn validate_activity(&mut self, document: &DescriptionDocument, name: &str, activity: &ActivityDescription) -> Result<(), SchemaError> {
        for (position, parameter) in activity.parameters.iter().enumerate() {
            self.record_reference(format!("activity_descriptions.{name}.parameters[{position}].value"), &parameter.value)?;
        }

        for direction in [RoleDirection::Used, RoleDirection::Generated] {
            let roles = match direction {
                RoleDirection::Used => &activity.usage,
                RoleDirection::Generated => &activity.generation,
            };
            let mut seen = HashSet::new();
            for (position, role) in roles.iter().enumerate() {
                let key = role.role_key();
                if !seen.insert(key) {
                    return Err(SchemaError::DuplicateRole {
                        activity: name.to_string(),
                        list: direction,
                        role: key.to_string(),
                    });
                }
                let path = format!("activity_descriptions.{name}.{}[{position}]", direction.list_name());
                self.validate_role(document, name, &path, role)?;
            }
        }

        debug!(activity = %name, "validated activity description");
        Ok(())
    }

    fn validate_role(&mut self, document: &DescriptionDocument, activity: &str, path: &str, role: &EntityRoleSpec) -> Result<(), SchemaError> {
        let role_key = role.role_key();

        if let Some(entity) = &role.entity_description {
            let description = document
                .entity_descriptions
                .get(entity)
                .ok_or_else(|| SchemaError::UnknownEntityDescription {
                    activity: activity.to_string(),
                    role: role_key.to_string(),
                    entity: entity.clone(),
                })?;

            if description.r#type.is_file_like() && role.location.is_none() {
                self.note(Diagnostic::FileRoleWithoutLocation {
                    activity: activity.to_string(),
                    role: role_key.to_string(),
                    entity: entity.clone(),
                });
            }
            if !description.r#type.is_file_like() && role.value.is_none() {
                self.note(Diagnostic::ObjectRoleWithoutValue {
                    activity: activity.to_string(),
                    role: role_key.to_string(),
                    entity: entity.clone(),
                });
            }
        }

        for (field, reference) in [("value", &role.value), ("location", &role.location), ("id", &role.id)] {
            if let Some(reference) = reference {
                self.record_reference(format!("{path}.{field}"), reference)?;
            }
        }
        self.check_namespace(document, activity, role_key, role.namespace.as_deref());

        for (relation, collection) in role.collections() {
            let collection_path = format!("{path}.{relation}");
            if let Some(entity) = &collection.entity_description
                && !document.entity_descriptions.contains_key(entity)
            {
                return Err(SchemaError::UnknownEntityDescription {
                    activity: activity.to_string(),
                    role: format!("{role_key}.{relation}"),
                    entity: entity.clone(),
                });
            }
            for (field, reference) in [
                ("list", &collection.list),
                ("value", &collection.value),
                ("location", &collection.location),
                ("id", &collection.id),
            ] {
                if let Some(reference) = reference {
                    self.record_reference(format!("{collection_path}.{field}"), reference)?;
                }
            }
            self.check_namespace(document, activity, role_key, collection.namespace.as_deref());
        }
        Ok(())
    }

    fn check_namespace(&mut self, document: &DescriptionDocument, activity: &str, role: &str, namespace: Option<&str>) {
        if let Some(prefix) = namespace
            && !document.namespaces.contains_key(prefix)
        {
            self.note(Diagnostic::UndeclaredNamespace {
                activity: activity.to_string(),
                role: role.to_string(),
                prefix: prefix.to_string(),
            });
        }
    }

    fn note(&mut self, diagnostic: Diagnostic) {
        diagnostic.log();
        self.diagnostics.push(diagnostic);
    }

    fn record_reference(&mut self, location: String, text: &str) -> Result<(), SchemaError> {
        let trimmed = text.trim();
        if self.references.contains_key(trimmed) {
            return Ok(());
        }
        let reference = ValueReference::parse(trimmed).map_err(|source| SchemaError::InvalidReference {
            location,
            reference: text.to_string(),
            source,
        })?;
        self.references.insert(trimmed.to_string(), reference);
        Ok(())
    }
}

fn validate_namespace(prefix: &str, uri: &str) -> Result<(), SchemaError> {
    if !NAMESPACE_PREFIX.is_match(prefix) {
        return Err(SchemaError::InvalidNamespace {
            prefix: prefix.to_string(),
            reason: "prefix must start with a letter or underscore and contain only letters, digits, '_', '.' or '-'".into(),
        });
    }
    Url::parse(uri).map_err(|error| SchemaError::InvalidNamespace {
        prefix: prefix.to_string(),
        reason: format!("'{uri}' is not an absolute URI: {error}"),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOY: &str = r#"
activity_descriptions:
  set_var1:
    description: "set var1"
    parameters:
      - name: value
        value: kwargs.value
    usage:
    generation:
      - role: var1
        entity_description: MyObject
        value: var1
entity_descriptions:
  MyObject:
    description: "A Python variable in memory"
    type: PythonObject
agents:
"#;

    #[test]
    fn parses_toy_document() {
        let set = parse_description_str(TOY).expect("document is valid");
        let activity = set.activity("set_var1").expect("activity present");
        assert_eq!(activity.generation[0].role.as_deref(), Some("var1"));
        assert!(set.entity("MyObject").is_some());
        assert!(set.agents().is_empty());
        assert!(set.reference("kwargs.value").is_some());
        assert!(set.reference("var1").is_some());
    }

    #[test]
    fn empty_document_is_an_empty_set() {
        let set = parse_description_str("").expect("empty is valid");
        assert!(set.activities().is_empty());
        assert!(set.entities().is_empty());
    }

    #[test]
    fn rejects_non_mapping_documents() {
        let error = parse_description_str("- a\n- b\n").unwrap_err();
        assert!(matches!(error, SchemaError::Structure { .. }));
        assert!(error.to_string().contains("a sequence"));
    }

    #[test]
    fn rejects_unknown_entity_type() {
        let yaml = TOY.replace("type: PythonObject", "type: Database");
        match parse_description_str(&yaml).unwrap_err() {
            SchemaError::UnknownEntityType { entity, type_tag } => {
                assert_eq!(entity, "MyObject");
                assert_eq!(type_tag, "Database");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_malformed_reference() {
        let yaml = TOY.replace("value: kwargs.value", "value: kwargs..value");
        match parse_description_str(&yaml).unwrap_err() {
            SchemaError::InvalidReference { location, reference, .. } => {
                assert_eq!(location, "activity_descriptions.set_var1.parameters[0].value");
                assert_eq!(reference, "kwargs..value");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn clean_document_has_no_diagnostics() {
        let set = parse_description_str(TOY).expect("document is valid");
        assert!(set.diagnostics().is_empty());
    }

    #[test]
    fn undeclared_namespace_is_reported() {
        let yaml = r#"
activity_descriptions:
  get_observations:
    generation:
      - role: observations
        value: observations
        namespace: hess
        has_members:
          list: observations.list
          namespace: cta
namespaces:
  hess: https://www.mpi-hd.mpg.de/hfm/HESS/
"#;
        let set = parse_description_str(yaml).expect("undeclared prefixes do not fail loading");
        assert_eq!(
            set.diagnostics(),
            &[Diagnostic::UndeclaredNamespace {
                activity: "get_observations".into(),
                role: "observations".into(),
                prefix: "cta".into(),
            }]
        );
        assert!(set.diagnostics()[0].to_string().contains("'cta'"));
    }

    #[test]
    fn lints_roles_missing_their_natural_field() {
        let yaml = r#"
activity_descriptions:
  write:
    usage:
      - role: table
        entity_description: Table
        location: args.path
    generation:
      - role: output
        entity_description: Output
        value: result
entity_descriptions:
  Table:
    type: PythonObject
  Output:
    type: File
"#;
        let set = parse_description_str(yaml).expect("lints do not fail loading");
        assert_eq!(
            set.diagnostics(),
            &[
                Diagnostic::ObjectRoleWithoutValue {
                    activity: "write".into(),
                    role: "table".into(),
                    entity: "Table".into(),
                },
                Diagnostic::FileRoleWithoutLocation {
                    activity: "write".into(),
                    role: "output".into(),
                    entity: "Output".into(),
                },
            ]
        );
    }

    #[test]
    fn unknown_top_level_keys_are_reported() {
        let yaml = format!("{TOY}\nprefixes:\n  hess: https://example.org/\n");
        let set = parse_description_str(&yaml).expect("unknown keys do not fail loading");
        assert_eq!(set.diagnostics(), &[Diagnostic::UnknownTopLevelKey { key: "prefixes".into() }]);
    }

    #[test]
    fn validates_namespaces() {
        assert!(validate_namespace("hess", "https://www.mpi-hd.mpg.de/hfm/HESS/").is_ok());
        assert!(matches!(
            validate_namespace("1bad", "https://example.org/"),
            Err(SchemaError::InvalidNamespace { .. })
        ));
        assert!(matches!(
            validate_namespace("gammapy", "not a uri"),
            Err(SchemaError::InvalidNamespace { .. })
        ));
    }
}
