/// Call metadata key carrying the tenant identifier.
pub const TENANT_METADATA_KEY: &str = "x-tenant-id";

/// Call metadata key carrying the authoring staff member id.
pub const STAFF_ID_METADATA_KEY: &str = "x-staff-id";

/// Call metadata key carrying the authoring staff member display name.
pub const STAFF_NAME_METADATA_KEY: &str = "x-staff-name";

/// Call metadata key carrying an upstream request id.
pub const REQUEST_ID_METADATA_KEY: &str = "x-request-id";

/// Postgres session variable consulted by the row-level security policies.
pub const TENANT_SESSION_VARIABLE: &str = "app.current_tenant_id";

/// Staff identity used when a caller does not identify the author of a note.
pub const SYSTEM_STAFF_ID: &str = "system";
pub const SYSTEM_STAFF_NAME: &str = "System User";
