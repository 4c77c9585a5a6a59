// Built-in rules for each pipeline stage
pub mod access;
pub mod hooks;
pub mod redact;
pub mod restrict;
pub mod sanitize;

pub use access::{AllowAll, RequireAuthenticated, RoleRule};
pub use hooks::{AuditHook, TimestampHook};
pub use redact::{FieldRedaction, RedactionMode};
pub use restrict::OwnershipRestriction;
pub use sanitize::{SchemaFieldSanitizer, SystemFieldSanitizer, SYSTEM_FIELDS};
