//! # Activity resolution
//!
//! Evaluates every reference an activity description declares against the state of one traced
//! call and assembles the [`ActivityRecord`] handed to the provenance log.
//!
//! Resolution is best-effort per field: a reference that cannot be evaluated becomes an
//! `Unresolved` sentinel carrying the reason, and the remaining parameters and roles are still
//! evaluated. It is also pure: the same description and context always produce equal records.
//!
//! ## Role post-processing
//!
//! - when `value` is absent or unresolved but `location` resolved, the location is the value;
//! - a resolved `id` is recorded as a string, qualified as `<namespace>:<id>` when the role
//!   declares a namespace and the id has no `:` yet;
//! - the entity description's `type` and `contentType` are copied onto the record.
//!
//! ## Collections
//!
//! With a `list` reference, every element of the resolved sequence becomes one member and is the
//! implicit root of the member templates. Without one, the collection has a single member
//! evaluated in the call scope, rooted at the receiver when the call has one.
//!
//! ## Implicit capture
//!
//! Keyword arguments (and defaults of keyword parameters the call did not pass) are recorded as
//! `kwargs.<name>` parameters. Positional arguments are recorded as used entities keyed by their
//! parameter name, or as `args.<name>` parameters when `log_args_as_entities` is off.
//!
//! ## Usage
//!
//! ```rust
//! use provdesc_engine::{CallContext, ResolverConfig, parse_description_str};
//! use serde_json::json;
//!
//! let descriptions = parse_description_str(r#"
//! activity_descriptions:
//!   set_var1:
//!     parameters:
//!       - name: value
//!         value: kwargs.value
//! "#)?;
//!
//! let context = CallContext::new().with_kwarg("value", json!(1));
//! let config = ResolverConfig::default();
//! let record = descriptions.resolver(&config).resolve_call("set_var1", &context)?;
//! assert_eq!(record.parameters["value"].value(), Some(&json!(1)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::borrow::Cow;
use std::collections::HashSet;

use provdesc_types::{
    ActivityDescription, ActivityRecord, CollectionRelation, CollectionSpec, EntityDescription, EntityRoleSpec, MemberRecord, Resolution,
    RoleDirection, RoleRecord,
};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ResolverConfig;
use crate::context::{Binding, CallContext};
use crate::evaluate::{Scope, elements, evaluate};
use crate::reference::{ReferenceParseError, Segment, ValueReference};
use crate::schema::DescriptionSet;

/// Errors raised when a traced call names an activity the description does not know.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("no description for activity '{name}'")]
    UnknownActivity { name: String },
}

/// Resolves activity descriptions against call contexts.
///
/// Borrows the loaded descriptions and the configuration; cheap to create per call.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    descriptions: &'a DescriptionSet,
    config: &'a ResolverConfig,
}

/// Where a field lives, for diagnostics.
#[derive(Clone, Copy)]
struct Site<'s> {
    activity: &'s str,
    role: &'s str,
}

/// A collection spec together with what its members share.
struct Collection<'s> {
    site: Site<'s>,
    relation: CollectionRelation,
    spec: &'s CollectionSpec,
    namespace: Option<&'s str>,
    entity: Option<&'s EntityDescription>,
}

/// Call arguments a declared reference already reads.
#[derive(Default)]
struct Covered {
    kwargs: HashSet<String>,
    args: HashSet<usize>,
}

impl Covered {
    fn note(&mut self, reference: &ValueReference, context: &CallContext) {
        match reference.segments() {
            [Segment::Attribute(root), Segment::Attribute(key), ..] if root == "kwargs" => {
                self.kwargs.insert(key.clone());
            }
            [Segment::Attribute(root), Segment::Attribute(arg), ..] if root == "args" => {
                if let Some(position) = context.arg_position(arg) {
                    self.args.insert(position);
                }
            }
            [Segment::Attribute(root), Segment::Index(position), ..] if root == "args" => {
                self.args.insert(*position);
            }
            _ => {}
        }
    }
}

impl DescriptionSet {
    /// Creates a resolver bound to this description set.
    pub fn resolver<'a>(&'a self, config: &'a ResolverConfig) -> Resolver<'a> {
        Resolver::new(self, config)
    }

    /// Looks up an activity by name and resolves it with the default configuration.
    pub fn resolve_call(&self, name: &str, context: &CallContext) -> Result<ActivityRecord, LookupError> {
        let config = ResolverConfig::default();
        self.resolver(&config).resolve_call(name, context)
    }
}

impl<'a> Resolver<'a> {
    pub fn new(descriptions: &'a DescriptionSet, config: &'a ResolverConfig) -> Self {
        Self { descriptions, config }
    }

    /// Looks up an activity by name and resolves it.
    pub fn resolve_call(&self, name: &str, context: &CallContext) -> Result<ActivityRecord, LookupError> {
        let Some(activity) = self.descriptions.activity(name) else {
            warn!(activity = %name, "no description for traced activity, skipping capture");
            return Err(LookupError::UnknownActivity { name: name.to_string() });
        };
        Ok(self.resolve(name, activity, context))
    }

    /// Resolves one activity description against a call context.
    pub fn resolve(&self, name: &str, activity: &ActivityDescription, context: &CallContext) -> ActivityRecord {
        let mut record = ActivityRecord::new(name);
        if !self.config.capture {
            debug!(activity = %name, "capture disabled, returning empty record");
            return record;
        }

        let by_parameters = self.resolve_parameters(name, activity, context, &mut record);
        let mut by_roles = Covered::default();

        for (direction, spec) in activity.roles() {
            let role = spec.role_key();
            let site = Site { activity: name, role };
            let role_record = self.resolve_role(site, spec, context);

            for text in [&spec.value, &spec.location, &spec.id].into_iter().flatten() {
                if let Ok(reference) = self.reference(text) {
                    by_roles.note(&reference, context);
                }
            }

            for (relation, collection) in spec.collections() {
                let members = self.resolve_members(site, spec, relation, collection, context);
                record.members.extend(members);
            }

            let roles = match direction {
                RoleDirection::Used => &mut record.used,
                RoleDirection::Generated => &mut record.generated,
            };
            roles.insert(role.to_string(), role_record);
        }

        if self.config.log_kwargs {
            capture_kwargs(context, &by_parameters, &mut record);
        }
        if self.config.log_args {
            self.capture_args(context, &by_parameters, &by_roles, &mut record);
        }

        debug!(
            activity = %name,
            parameters = record.parameters.len(),
            used = record.used.len(),
            generated = record.generated.len(),
            members = record.members.len(),
            unresolved = record.unresolved_count(),
            "resolved activity"
        );
        record
    }

    /// Resolves the declared parameters and reports which call arguments they read.
    fn resolve_parameters(&self, name: &str, activity: &ActivityDescription, context: &CallContext, record: &mut ActivityRecord) -> Covered {
        let site = Site { activity: name, role: "" };
        let mut covered = Covered::default();

        for parameter in &activity.parameters {
            let resolution = self.resolve_field(site, "parameter", &parameter.value, Scope::Call(context), false);
            record.parameters.insert(parameter.record_name().to_string(), resolution);

            if let Ok(reference) = self.reference(&parameter.value) {
                covered.note(&reference, context);
            }
        }
        covered
    }

    fn capture_args(&self, context: &CallContext, by_parameters: &Covered, by_roles: &Covered, record: &mut ActivityRecord) {
        for (position, value) in context.args.iter().enumerate() {
            let arg_name = context.arg_names.get(position).filter(|arg_name| !arg_name.is_empty());
            if arg_name.is_some_and(|arg_name| arg_name == "self") || by_parameters.args.contains(&position) {
                continue;
            }
            let value = value.to_json();

            if self.config.log_args_as_entities {
                if by_roles.args.contains(&position) {
                    continue;
                }
                let role = arg_name.cloned().unwrap_or_else(|| format!("args[{position}]"));
                let already_used = record.used.contains_key(&role)
                    || record
                        .used
                        .values()
                        .any(|used| used.value.as_ref().and_then(Resolution::value) == Some(&value));
                if !already_used {
                    record.used.insert(
                        role,
                        RoleRecord {
                            value: Some(Resolution::Resolved(value)),
                            ..Default::default()
                        },
                    );
                }
            } else {
                let implicit = match arg_name {
                    Some(arg_name) => format!("args.{arg_name}"),
                    None => format!("args[{position}]"),
                };
                record.parameters.entry(implicit).or_insert(Resolution::Resolved(value));
            }
        }
    }

    fn resolve_role(&self, site: Site<'_>, spec: &EntityRoleSpec, context: &CallContext) -> RoleRecord {
        let scope = Scope::Call(context);
        let mut value = spec
            .value
            .as_deref()
            .map(|text| self.resolve_field(site, "value", text, scope, false));
        let location = spec
            .location
            .as_deref()
            .map(|text| self.resolve_field(site, "location", text, scope, true));
        let id = spec.id.as_deref().map(|text| self.resolve_field(site, "id", text, scope, false));

        fall_back_to_location(&mut value, location.as_ref());

        let entity = spec.entity_description.as_deref().and_then(|name| self.descriptions.entity(name));
        RoleRecord {
            value,
            location,
            id: id.map(|id| qualify_id(id, spec.namespace.as_deref())),
            namespace: spec.namespace.clone(),
            entity_type: entity.map(|entity| entity.r#type.clone()),
            content_type: entity.and_then(|entity| entity.content_type.clone()),
        }
    }

    /// Resolves the members of a collection role.
    fn resolve_members(
        &self,
        site: Site<'_>,
        spec: &EntityRoleSpec,
        relation: CollectionRelation,
        collection: &CollectionSpec,
        context: &CallContext,
    ) -> Vec<MemberRecord> {
        let shared = Collection {
            site,
            relation,
            spec: collection,
            namespace: collection.namespace.as_deref().or(spec.namespace.as_deref()),
            entity: collection
                .entity_description
                .as_deref()
                .and_then(|name| self.descriptions.entity(name)),
        };

        let Some(list) = collection.list.as_deref() else {
            return vec![self.resolve_member(&shared, 0, context.receiver.as_ref(), context)];
        };

        let items = self
            .lookup(list, Scope::Call(context))
            .and_then(|binding| elements(&binding).map_err(|warning| warning.to_string()));
        match items {
            Ok(items) => items
                .iter()
                .enumerate()
                .map(|(index, element)| self.resolve_member(&shared, index, Some(element), context))
                .collect(),
            Err(reason) => {
                if self.config.warn_on_unresolved {
                    warn!(activity = site.activity, role = site.role, relation = %relation, reason = %reason, "collection could not be resolved, no members recorded");
                }
                Vec::new()
            }
        }
    }

    /// Resolves one member. Templates are rooted at `element`, or at the call itself when absent.
    fn resolve_member(&self, collection: &Collection<'_>, index: usize, element: Option<&Binding>, context: &CallContext) -> MemberRecord {
        let site = collection.site;
        let scope = match element {
            Some(element) => Scope::Member { element, context },
            None => Scope::Call(context),
        };
        let mut value = collection
            .spec
            .value
            .as_deref()
            .map(|text| self.resolve_field(site, "member value", text, scope, false));
        let location = collection
            .spec
            .location
            .as_deref()
            .map(|text| self.resolve_field(site, "member location", text, scope, true));
        let id = collection
            .spec
            .id
            .as_deref()
            .map(|text| self.resolve_field(site, "member id", text, scope, false));

        if value.is_none() && location.is_none() {
            value = element.map(|element| Resolution::Resolved(element.to_json()));
        }
        fall_back_to_location(&mut value, location.as_ref());

        MemberRecord {
            role: site.role.to_string(),
            relation: collection.relation,
            index,
            value,
            location,
            id: id.map(|id| qualify_id(id, collection.namespace)),
            namespace: collection.namespace.map(str::to_string),
            entity_type: collection.entity.map(|entity| entity.r#type.clone()),
            content_type: collection.entity.and_then(|entity| entity.content_type.clone()),
        }
    }

    fn resolve_field(&self, site: Site<'_>, field: &str, text: &str, scope: Scope<'_>, optional: bool) -> Resolution {
        match self.lookup(text, scope) {
            Ok(binding) => Resolution::Resolved(binding.to_json()),
            Err(reason) => {
                if self.config.warn_on_unresolved {
                    if optional {
                        debug!(activity = site.activity, role = site.role, field, reference = text, reason = %reason, "reference unresolved");
                    } else {
                        warn!(activity = site.activity, role = site.role, field, reference = text, reason = %reason, "reference unresolved");
                    }
                }
                Resolution::unresolved(text.trim(), reason)
            }
        }
    }

    fn lookup(&self, text: &str, scope: Scope<'_>) -> Result<Binding, String> {
        let reference = self.reference(text).map_err(|error| error.to_string())?;
        evaluate(&reference, scope).map_err(|warning| warning.to_string())
    }

    /// Parsed reference, from the load-time cache when the text came from the loaded document.
    fn reference(&self, text: &str) -> Result<Cow<'a, ValueReference>, ReferenceParseError> {
        match self.descriptions.reference(text) {
            Some(reference) => Ok(Cow::Borrowed(reference)),
            None => ValueReference::parse(text).map(Cow::Owned),
        }
    }
}

/// Records keyword arguments, and defaults of keyword parameters not passed, as `kwargs.<name>`.
fn capture_kwargs(context: &CallContext, by_parameters: &Covered, record: &mut ActivityRecord) {
    let defaults = context
        .kwarg_defaults
        .iter()
        .filter(|(key, _)| !context.kwargs.contains_key(*key));
    for (key, value) in context.kwargs.iter().chain(defaults) {
        let implicit = format!("kwargs.{key}");
        if by_parameters.kwargs.contains(key) || record.parameters.contains_key(key) || record.parameters.contains_key(&implicit) {
            continue;
        }
        record.parameters.insert(implicit, Resolution::Resolved(value.to_json()));
    }
}

fn fall_back_to_location(value: &mut Option<Resolution>, location: Option<&Resolution>) {
    let value_missing = value.as_ref().is_none_or(|value| !value.is_resolved());
    if value_missing && let Some(location) = location.filter(|location| location.is_resolved()) {
        *value = Some(location.clone());
    }
}

/// Records a resolved identifier as a string, prefixed with its namespace unless already qualified.
///
/// `null` stays `null`: there is nothing to identify.
fn qualify_id(id: Resolution, namespace: Option<&str>) -> Resolution {
    let local = match id {
        Resolution::Resolved(Value::String(text)) => text,
        Resolution::Resolved(Value::Null) | Resolution::Unresolved(_) => return id,
        Resolution::Resolved(other) => other.to_string(),
    };
    match namespace {
        Some(namespace) if !local.contains(':') => Resolution::Resolved(Value::String(format!("{namespace}:{local}"))),
        _ => Resolution::Resolved(Value::String(local)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_description_str;
    use serde_json::json;

    const PIPELINE: &str = r#"
activity_descriptions:
  stack:
    parameters:
      - name: method
        value: kwargs.method
    usage:
      - role: observations
        entity_description: Observations
        value: observations
        namespace: hess
        id: observations.name
    generation:
      - role: stacked
        entity_description: Dataset
        location: result.path
        has_members:
          list: observations.ids
          entity_description: Observation
entity_descriptions:
  Observations:
    type: PythonObject
  Observation:
    type: PythonObject
  Dataset:
    type: File
    contentType: application/fits
namespaces:
  hess: https://www.mpi-hd.mpg.de/hfm/HESS/
"#;

    fn pipeline() -> DescriptionSet {
        parse_description_str(PIPELINE).expect("pipeline parses")
    }

    #[test]
    fn location_doubles_as_value() {
        let set = pipeline();
        let context = CallContext::new()
            .with_local("observations", json!({"name": "crab", "ids": [1, 2]}))
            .with_result(json!({"path": "stacked.fits"}));

        let record = set.resolve_call("stack", &context).expect("activity known");
        let stacked = &record.generated["stacked"];
        assert_eq!(stacked.value, Some(Resolution::Resolved(json!("stacked.fits"))));
        assert_eq!(stacked.location, Some(Resolution::Resolved(json!("stacked.fits"))));
        assert_eq!(stacked.content_type.as_deref(), Some("application/fits"));
    }

    #[test]
    fn qualifies_ids_with_namespace() {
        let set = pipeline();
        let context = CallContext::new().with_local("observations", json!({"name": "crab", "ids": [1]}));

        let record = set.resolve_call("stack", &context).expect("activity known");
        assert_eq!(record.used["observations"].id, Some(Resolution::Resolved(json!("hess:crab"))));
        assert_eq!(record.used["observations"].namespace.as_deref(), Some("hess"));

        assert_eq!(qualify_id(Resolution::Resolved(json!("ivo:crab")), Some("hess")), Resolution::Resolved(json!("ivo:crab")));
        assert_eq!(qualify_id(Resolution::Resolved(json!(42)), Some("hess")), Resolution::Resolved(json!("hess:42")));
        assert_eq!(qualify_id(Resolution::Resolved(json!("crab")), None), Resolution::Resolved(json!("crab")));
    }

    #[test]
    fn ids_are_always_strings() {
        assert_eq!(qualify_id(Resolution::Resolved(json!(23523)), None), Resolution::Resolved(json!("23523")));
        assert_eq!(qualify_id(Resolution::Resolved(json!(true)), None), Resolution::Resolved(json!("true")));
        assert_eq!(qualify_id(Resolution::Resolved(json!(1.5)), Some("hess")), Resolution::Resolved(json!("hess:1.5")));
        assert_eq!(qualify_id(Resolution::Resolved(json!(null)), Some("hess")), Resolution::Resolved(json!(null)));

        let unresolved = Resolution::unresolved("obs_id", "missing");
        assert_eq!(qualify_id(unresolved.clone(), Some("hess")), unresolved);
    }

    #[test]
    fn members_follow_the_list() {
        let set = pipeline();
        let context = CallContext::new().with_local("observations", json!({"name": "crab", "ids": [23523, 23526]}));

        let record = set.resolve_call("stack", &context).expect("activity known");
        let members: Vec<_> = record.members_of("stacked").collect();
        assert_eq!(members.len(), 2);
        assert_eq!(members[1].value, Some(Resolution::Resolved(json!(23526))));
        assert_eq!(members[1].relation, CollectionRelation::HasMembers);
        assert_eq!(members[1].entity_type, Some(provdesc_types::EntityType::PythonObject));
    }

    #[test]
    fn unresolvable_list_records_no_members() {
        let set = pipeline();
        let record = set.resolve_call("stack", &CallContext::new()).expect("activity known");
        assert!(record.members.is_empty());
        assert!(!record.used["observations"].value.as_ref().is_some_and(Resolution::is_resolved));
    }

    #[test]
    fn implicit_arguments_are_captured() {
        let set = pipeline();
        let context = CallContext::new()
            .with_named_arg("self", json!({}))
            .with_named_arg("datasets", json!(["a", "b"]))
            .with_arg(json!(3))
            .with_kwarg("method", json!("stack"))
            .with_kwarg("overwrite", json!(true));

        let record = set.resolve_call("stack", &context).expect("activity known");
        let keys: Vec<_> = record.parameters.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["method", "kwargs.overwrite"]);
        let used: Vec<_> = record.used.keys().map(String::as_str).collect();
        assert_eq!(used, vec!["observations", "datasets", "args[2]"]);
        assert_eq!(record.used["datasets"].value, Some(Resolution::Resolved(json!(["a", "b"]))));
        assert_eq!(record.used["datasets"].entity_type, None);

        let as_parameters = ResolverConfig {
            log_args_as_entities: false,
            ..ResolverConfig::default()
        };
        let record = set.resolver(&as_parameters).resolve_call("stack", &context).expect("activity known");
        let keys: Vec<_> = record.parameters.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["method", "kwargs.overwrite", "args.datasets", "args[2]"]);
        assert_eq!(record.used.len(), 1);

        let config = ResolverConfig {
            log_args: false,
            log_kwargs: false,
            ..ResolverConfig::default()
        };
        let record = set.resolver(&config).resolve_call("stack", &context).expect("activity known");
        assert_eq!(record.parameters.len(), 1);
        assert_eq!(record.used.len(), 1);
    }

    #[test]
    fn keyword_defaults_are_captured_when_not_passed() {
        let set = pipeline();
        let context = CallContext::new()
            .with_kwarg("method", json!("stack"))
            .with_kwarg("overwrite", json!(true))
            .with_kwarg_default("overwrite", json!(false))
            .with_kwarg_default("method", json!("mean"))
            .with_kwarg_default("n_jobs", json!(1));

        let record = set.resolve_call("stack", &context).expect("activity known");
        let keys: Vec<_> = record.parameters.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["method", "kwargs.overwrite", "kwargs.n_jobs"]);
        assert_eq!(record.parameters["method"], Resolution::Resolved(json!("stack")));
        assert_eq!(record.parameters["kwargs.overwrite"], Resolution::Resolved(json!(true)));
        assert_eq!(record.parameters["kwargs.n_jobs"], Resolution::Resolved(json!(1)));
    }

    #[test]
    fn declared_parameters_read_keyword_defaults() {
        let set = pipeline();
        let context = CallContext::new().with_kwarg_default("method", json!("mean"));

        let record = set.resolve_call("stack", &context).expect("activity known");
        assert_eq!(record.parameters["method"], Resolution::Resolved(json!("mean")));
        assert!(!record.parameters.contains_key("kwargs.method"));
    }

    #[test]
    fn args_read_by_roles_are_not_captured_again() {
        let set = parse_description_str(
            r#"
activity_descriptions:
  write:
    usage:
      - role: table
        value: args.table
    generation:
      - role: output
        location: args.filename
"#,
        )
        .expect("description parses");
        let context = CallContext::new()
            .with_named_arg("self", json!({}))
            .with_named_arg("table", json!([1, 2]))
            .with_named_arg("filename", json!("out.fits"))
            .with_named_arg("copy", json!([1, 2]));

        let record = set.resolve_call("write", &context).expect("activity known");
        let used: Vec<_> = record.used.keys().map(String::as_str).collect();
        assert_eq!(used, vec!["table"]);
        assert!(record.parameters.is_empty());
    }

    #[test]
    fn collection_without_list_has_one_member_in_call_scope() {
        let set = parse_description_str(
            r#"
activity_descriptions:
  reduce:
    generation:
      - role: dataset
        value: result
        has_progenitors:
          entity_description: Observation
          id: obs_id
          location: path
          namespace: hess
entity_descriptions:
  Observation:
    type: File
    contentType: application/fits
namespaces:
  hess: https://www.mpi-hd.mpg.de/hfm/HESS/
"#,
        )
        .expect("description parses");

        let context = CallContext::new()
            .with_result(json!(["a", "b", "c"]))
            .with_local("obs_id", json!(23523))
            .with_local("path", json!("run023523.fits"));
        let record = set.resolve_call("reduce", &context).expect("activity known");
        let members: Vec<_> = record.members_of("dataset").collect();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, Some(Resolution::Resolved(json!("hess:23523"))));
        assert_eq!(members[0].value, Some(Resolution::Resolved(json!("run023523.fits"))));
        assert_eq!(members[0].content_type.as_deref(), Some("application/fits"));

        let receiver = CallContext::new()
            .with_receiver(json!({"obs_id": 23526, "path": "run023526.fits"}))
            .with_local("obs_id", json!(23523));
        let record = set.resolve_call("reduce", &receiver).expect("activity known");
        let members: Vec<_> = record.members_of("dataset").collect();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, Some(Resolution::Resolved(json!("hess:23526"))));
        assert_eq!(members[0].location, Some(Resolution::Resolved(json!("run023526.fits"))));
    }

    #[test]
    fn capture_disabled_yields_empty_record() {
        let set = pipeline();
        let config = ResolverConfig {
            capture: false,
            ..ResolverConfig::default()
        };
        let record = set
            .resolver(&config)
            .resolve_call("stack", &CallContext::new().with_kwarg("method", json!("stack")))
            .expect("activity known");
        assert_eq!(record, ActivityRecord::new("stack"));
    }

    #[test]
    fn unknown_activity_is_a_lookup_error() {
        assert_eq!(
            pipeline().resolve_call("fit", &CallContext::new()),
            Err(LookupError::UnknownActivity { name: "fit".into() })
        );
    }

    #[test]
    fn resolves_descriptions_built_outside_the_set() {
        let set = DescriptionSet::default();
        let config = ResolverConfig::default();
        let activity = ActivityDescription {
            parameters: vec![provdesc_types::ParameterSpec {
                value: "kwargs.bins".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let record = set
            .resolver(&config)
            .resolve("ad_hoc", &activity, &CallContext::new().with_kwarg("bins", json!(10)));
        assert_eq!(record.parameters["kwargs.bins"], Resolution::Resolved(json!(10)));
    }
}
