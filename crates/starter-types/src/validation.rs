//! Configuration validation for backend implementation tables.
//!
//! Storage and chain-query backends are configured with free-form TOML tables
//! (`[storage.implementations.file]`, `[chain.implementations.alloy]`, ...).
//! Each backend describes the table it expects as a [`Schema`] and validates it
//! before construction, so a typo in the node configuration surfaces as a
//! field-level error instead of a failure deep inside a backend.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	/// A required field is missing.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// A field has a value that fails validation.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// A field has the wrong TOML type.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
}

/// Type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// Integer with optional inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
}

impl FieldType {
	fn name(&self) -> &'static str {
		match self {
			FieldType::String => "string",
			FieldType::Integer { .. } => "integer",
		}
	}
}

/// Custom check run after type validation; returns a message on failure.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named field in a [`Schema`].
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Adds a custom validator to this field.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		let type_matches = match &self.field_type {
			FieldType::String => value.is_str(),
			FieldType::Integer { .. } => value.is_integer(),
		};
		if !type_matches {
			return Err(ValidationError::TypeMismatch {
				field: self.name.clone(),
				expected: self.field_type.name().to_string(),
				actual: value.type_str().to_string(),
			});
		}

		if let (FieldType::Integer { min, max }, Some(int_val)) =
			(&self.field_type, value.as_integer())
		{
			if min.is_some_and(|min| int_val < min) || max.is_some_and(|max| int_val > max) {
				return Err(ValidationError::InvalidValue {
					field: self.name.clone(),
					message: format!(
						"Value {} is outside the allowed range [{}, {}]",
						int_val,
						min.map_or("-inf".to_string(), |v| v.to_string()),
						max.map_or("inf".to_string(), |v| v.to_string()),
					),
				});
			}
		}

		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}

		Ok(())
	}
}

/// Required and optional fields of a configuration table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML table against this schema.
	///
	/// Unknown keys are ignored.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table".to_string(),
				actual: config.type_str().to_string(),
			})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		Ok(())
	}
}

/// Implemented by every backend to validate its configuration table.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn schema() -> Schema {
		Schema::new(
			vec![Field::new("rpc_url", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(s) if s.starts_with("http") => Ok(()),
					_ => Err("must be an http(s) URL".to_string()),
				}
			})],
			vec![
				Field::new(
					"activation_round",
					FieldType::Integer {
						min: Some(0),
						max: None,
					},
				),
				Field::new("label", FieldType::String),
			],
		)
	}

	#[test]
	fn test_valid_table() {
		let config: toml::Value = toml::from_str(
			r#"
			rpc_url = "http://localhost:8545"
			activation_round = 5
			label = "primary"
			extra = "ignored"
		"#,
		)
		.unwrap();
		assert!(schema().validate(&config).is_ok());
	}

	#[test]
	fn test_missing_required_field() {
		let config: toml::Value = toml::from_str(r#"activation_round = 5"#).unwrap();
		match schema().validate(&config) {
			Err(ValidationError::MissingField(field)) => assert_eq!(field, "rpc_url"),
			other => panic!("Expected MissingField, got {:?}", other),
		}
	}

	#[test]
	fn test_type_mismatch() {
		let config: toml::Value = toml::from_str(
			r#"
			rpc_url = "http://localhost:8545"
			activation_round = "five"
		"#,
		)
		.unwrap();
		let err = schema().validate(&config).unwrap_err();
		assert_eq!(
			err.to_string(),
			"Type mismatch for field 'activation_round': expected integer, got string"
		);
	}

	#[test]
	fn test_integer_bounds() {
		let config: toml::Value = toml::from_str(
			r#"
			rpc_url = "http://localhost:8545"
			activation_round = -1
		"#,
		)
		.unwrap();
		assert!(matches!(
			schema().validate(&config),
			Err(ValidationError::InvalidValue { .. })
		));
	}

	#[test]
	fn test_custom_validator_message() {
		let config: toml::Value = toml::from_str(r#"rpc_url = "ws://localhost:8546""#).unwrap();
		match schema().validate(&config) {
			Err(ValidationError::InvalidValue { field, message }) => {
				assert_eq!(field, "rpc_url");
				assert_eq!(message, "must be an http(s) URL");
			},
			other => panic!("Expected InvalidValue, got {:?}", other),
		}
	}

	#[test]
	fn test_non_table_root() {
		let config = toml::Value::String("not a table".to_string());
		assert!(matches!(
			schema().validate(&config),
			Err(ValidationError::TypeMismatch { .. })
		));
	}
}
