//! Shared type definitions for provenance descriptions.
//!
//! - [`description`]: the declarative description document (activities, entities, namespaces).
//! - [`record`]: the activity records produced when a description is resolved against a call.

pub mod description;
pub mod record;

pub use description::{
    ActivityDescription, CollectionRelation, CollectionSpec, DescriptionDocument, EntityDescription, EntityRoleSpec, EntityType,
    ParameterSpec, RoleDirection,
};
pub use record::{ActivityRecord, MemberRecord, Resolution, RoleRecord, Unresolved};
