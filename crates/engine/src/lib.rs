//! # Provdesc Engine
//!
//! Loads declarative provenance descriptions and resolves them against traced calls.
//!
//! A description document says, per activity (a traced function or method), which parameters
//! to record and which entities the call uses and generates. The engine validates the document
//! once and then, for every traced call, evaluates the declared value references against the
//! call's arguments, return value, configuration and local scope.
//!
//! ## Usage
//!
//! ```rust
//! use provdesc_engine::{CallContext, parse_description_file};
//! use serde_json::json;
//!
//! let temp_dir = tempfile::tempdir()?;
//! let path = temp_dir.path().join("definition.yaml");
//! std::fs::write(&path, r#"
//! activity_descriptions:
//!   set_var1:
//!     parameters:
//!       - name: value
//!         value: kwargs.value
//!     generation:
//!       - role: var1
//!         entity_description: MyObject
//!         value: var1
//! entity_descriptions:
//!   MyObject:
//!     type: PythonObject
//! "#)?;
//!
//! let descriptions = parse_description_file(&path)?;
//! let context = CallContext::new().with_kwarg("value", json!(1)).with_local("var1", json!(1));
//! let record = descriptions.resolve_call("set_var1", &context)?;
//! println!("{}", serde_json::to_string_pretty(&record)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`reference`**: the value-reference grammar, parsed once at load time
//! - **`context`**: the call context and host-object trait references are evaluated over
//! - **`evaluate`**: walking a reference over a context
//! - **`schema`**: document loading and validation into a [`DescriptionSet`]
//! - **`resolve`**: building [`ActivityRecord`]s
//! - **`config`**: resolver switches loaded from YAML

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

pub mod config;
pub mod context;
pub mod evaluate;
pub mod reference;
pub mod resolve;
pub mod schema;

pub use config::{ConfigError, ResolverConfig, default_config_path};
pub use context::{Binding, CallContext, ContextError, TracedObject};
pub use evaluate::{ResolutionWarning, Scope};
pub use provdesc_types::{ActivityRecord, MemberRecord, Resolution, RoleRecord};
pub use reference::{CallArguments, ReferenceParseError, ValueReference};
pub use resolve::{LookupError, Resolver};
pub use schema::{DescriptionSet, Diagnostic, SchemaError, parse_description_str, parse_description_value};

/// Loads and validates a description document from the filesystem.
///
/// YAML and JSON are both accepted. The returned error names the file.
pub fn parse_description_file(file_path: impl AsRef<Path>) -> Result<DescriptionSet> {
    let file_path = file_path.as_ref();
    let content = fs::read_to_string(file_path).with_context(|| format!("Failed to read description file: {}", file_path.display()))?;

    parse_description_str(&content).with_context(|| format!("Invalid description file: {}", file_path.display()))
}
