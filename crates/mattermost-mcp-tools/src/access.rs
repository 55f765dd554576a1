//! Per-field access table.
//!
//! Every argument struct declares its fields once, in a static
//! [`FieldSpec`] table. The same table drives two independent checks:
//!
//! 1. [`schema_for`] derives the advertised JSON schema for an access mode,
//!    dropping fields that mode may not use. This is advisory only.
//! 2. [`bind`] rejects any raw payload that names such a field, before the
//!    handler ever sees it. This is the enforcement point.

use crate::error::{ToolError, ToolResult};
use mattermost_mcp_core::AccessMode;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

/// JSON type of an argument field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Boolean,
    StringArray,
    /// A string restricted to the listed values.
    Enum(&'static [&'static str]),
}

impl FieldKind {
    fn schema(&self) -> Value {
        match self {
            FieldKind::String => json!({"type": "string"}),
            FieldKind::Integer => json!({"type": "integer"}),
            FieldKind::Boolean => json!({"type": "boolean"}),
            FieldKind::StringArray => json!({"type": "array", "items": {"type": "string"}}),
            FieldKind::Enum(values) => json!({"type": "string", "enum": values}),
        }
    }
}

/// One argument field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Name on the wire.
    pub name: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
    pub required: bool,
    /// Access modes the field is usable under. `None` means every mode.
    pub modes: Option<&'static [AccessMode]>,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: true,
            modes: None,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: false,
            modes: None,
        }
    }

    /// Restrict the field to the given access modes.
    pub const fn only_in(self, modes: &'static [AccessMode]) -> Self {
        Self {
            modes: Some(modes),
            ..self
        }
    }

    pub fn allowed_in(&self, mode: AccessMode) -> bool {
        self.modes.map_or(true, |modes| modes.contains(&mode))
    }
}

/// Modes for fields that can read local files or fetch arbitrary URLs.
pub const LOCAL_ONLY: &[AccessMode] = &[AccessMode::Local];

/// Argument structs with a declared field table.
pub trait ToolArgs: DeserializeOwned + Send {
    const FIELDS: &'static [FieldSpec];
}

/// The JSON schema a caller under `mode` is shown.
pub fn schema_for(fields: &[FieldSpec], mode: AccessMode) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for field in fields.iter().filter(|f| f.allowed_in(mode)) {
        let mut schema = field.kind.schema();
        if let Some(obj) = schema.as_object_mut() {
            obj.insert("description".to_string(), json!(field.description));
        }
        properties.insert(field.name.to_string(), schema);
        if field.required {
            required.push(json!(field.name));
        }
    }

    let mut schema = json!({
        "type": "object",
        "properties": properties,
    });
    if !required.is_empty() {
        schema["required"] = Value::Array(required);
    }
    schema
}

/// Reject payloads naming a field `mode` may not use.
///
/// Looks at field names only; the value does not matter, so an explicit
/// `null` is refused as well.
pub fn check_access(fields: &[FieldSpec], payload: &Map<String, Value>, mode: AccessMode) -> ToolResult<()> {
    for field in fields {
        if !field.allowed_in(mode) && payload.contains_key(field.name) {
            return Err(ToolError::AccessDenied {
                field: field.name.to_string(),
                mode,
            });
        }
    }
    Ok(())
}

/// Validate a raw payload and deserialize it into `A`.
///
/// Order: object shape, access check, required fields, then typing. Unknown
/// fields are ignored.
pub fn bind<A: ToolArgs>(tool: &str, raw: Option<Value>, mode: AccessMode) -> ToolResult<A> {
    let payload = match raw {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(ToolError::invalid_arguments(tool, "expected a JSON object")),
    };

    check_access(A::FIELDS, &payload, mode)?;

    for field in A::FIELDS.iter().filter(|f| f.required && f.allowed_in(mode)) {
        if payload.get(field.name).map_or(true, Value::is_null) {
            return Err(ToolError::invalid_arguments(
                tool,
                format!("missing required field '{}'", field.name),
            ));
        }
    }

    serde_json::from_value(Value::Object(payload)).map_err(|e| ToolError::invalid_arguments(tool, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Sample {
        channel_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<u32>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<String>,
    }

    impl ToolArgs for Sample {
        const FIELDS: &'static [FieldSpec] = &[
            FieldSpec::required("channel_id", FieldKind::String, "Channel"),
            FieldSpec::optional("limit", FieldKind::Integer, "Limit"),
            FieldSpec::optional("attachments", FieldKind::StringArray, "Files")
                .only_in(LOCAL_ONLY),
        ];
    }

    fn property_names(schema: &Value) -> Vec<String> {
        let mut names: Vec<String> = schema["properties"]
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_schema_and_bind_agree_for_every_mode() {
        for mode in AccessMode::ALL {
            let schema = schema_for(Sample::FIELDS, mode);
            let advertised = property_names(&schema);

            for field in Sample::FIELDS {
                let mut payload = json!({"channel_id": "c1"});
                payload[field.name] = match field.kind {
                    FieldKind::StringArray => json!(["a"]),
                    FieldKind::Integer => json!(1),
                    _ => json!("c2"),
                };

                let bound = bind::<Sample>("sample", Some(payload), mode);
                let in_schema = advertised.contains(&field.name.to_string());
                assert_eq!(
                    in_schema,
                    field.allowed_in(mode),
                    "{} schema mismatch in {}",
                    field.name,
                    mode
                );
                assert_eq!(
                    bound.is_ok(),
                    in_schema,
                    "{} bind mismatch in {}",
                    field.name,
                    mode
                );
            }
        }
    }

    #[test]
    fn test_remote_rejects_local_field_by_name() {
        let err = bind::<Sample>(
            "sample",
            Some(json!({"channel_id": "c1", "attachments": null})),
            AccessMode::Remote,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "field 'attachments' is not available in remote access mode"
        );
    }

    #[test]
    fn test_schema_shape() {
        let schema = schema_for(Sample::FIELDS, AccessMode::Local);
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["channel_id"]));
        assert_eq!(schema["properties"]["attachments"]["type"], "array");
        assert_eq!(schema["properties"]["limit"]["description"], "Limit");
    }

    #[test]
    fn test_schema_without_required_omits_key() {
        const FIELDS: &[FieldSpec] = &[FieldSpec::optional("q", FieldKind::String, "Query")];
        let schema = schema_for(FIELDS, AccessMode::Remote);
        assert!(schema.get("required").is_none());
    }

    #[test]
    fn test_enum_schema() {
        const FIELDS: &[FieldSpec] =
            &[FieldSpec::required("type", FieldKind::Enum(&["O", "P"]), "Kind")];
        let schema = schema_for(FIELDS, AccessMode::Remote);
        assert_eq!(schema["properties"]["type"]["enum"], json!(["O", "P"]));
    }

    #[test]
    fn test_missing_required_and_type_errors() {
        let err = bind::<Sample>("sample", Some(json!({})), AccessMode::Local).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid arguments for tool 'sample': missing required field 'channel_id'"
        );

        let err = bind::<Sample>(
            "sample",
            Some(json!({"channel_id": "c1", "limit": "ten"})),
            AccessMode::Local,
        )
        .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("invalid arguments for tool 'sample': "));

        let err = bind::<Sample>("sample", Some(json!(["c1"])), AccessMode::Local).unwrap_err();
        assert!(err.to_string().contains("expected a JSON object"));
    }

    #[test]
    fn test_bound_value_reencodes_to_covered_subset() {
        let input = json!({"channel_id": "c1", "limit": 5, "extra": true});
        let bound: Sample = bind("sample", Some(input), AccessMode::Remote).unwrap();
        assert_eq!(
            serde_json::to_value(&bound).unwrap(),
            json!({"channel_id": "c1", "limit": 5})
        );
    }
}
