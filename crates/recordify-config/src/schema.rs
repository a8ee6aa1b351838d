use schemars::schema::RootSchema;
use schemars::schema_for;

use crate::RecordifyConfig;

/// JSON schema for `recordify.toml`, for editor integration and CI checks.
#[must_use]
pub fn json_schema() -> RootSchema {
    schema_for!(RecordifyConfig)
}
