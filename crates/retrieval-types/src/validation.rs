//! Validation of backend-specific configuration tables.
//!
//! Backends receive their `[storage.implementations.<name>]` table as a raw
//! `toml::Value`. Each one describes the keys it understands with a
//! [`Schema`] and rejects anything malformed before it is constructed.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
	#[error("Unknown field: {0}")]
	UnknownField(String),
}

/// Expected type of a configuration value.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// Integer with optional inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
}

/// Extra check run after the type check passes.
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

	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		check_type(&self.name, value, &self.field_type)?;
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
///
/// Keys that are neither required nor optional are rejected so that typos
/// in a backend table surface at startup.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates `config` against this schema.
	///
	/// # Errors
	///
	/// Returns the first problem found: a non-table root, a missing required
	/// field, a type or range violation, a failing custom validator, or an
	/// unknown key.
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

		for key in table.keys() {
			let known = self
				.required
				.iter()
				.chain(self.optional.iter())
				.any(|f| &f.name == key);
			if !known {
				return Err(ValidationError::UnknownField(key.clone()));
			}
		}

		Ok(())
	}
}

fn check_type(
	field_name: &str,
	value: &toml::Value,
	expected_type: &FieldType,
) -> Result<(), ValidationError> {
	let mismatch = |expected: &str| ValidationError::TypeMismatch {
		field: field_name.to_string(),
		expected: expected.to_string(),
		actual: value.type_str().to_string(),
	};

	match expected_type {
		FieldType::String => {
			if !value.is_str() {
				return Err(mismatch("string"));
			}
		},
		FieldType::Integer { min, max } => {
			let int_val = value.as_integer().ok_or_else(|| mismatch("integer"))?;
			if let Some(min_val) = min {
				if int_val < *min_val {
					return Err(ValidationError::InvalidValue {
						field: field_name.to_string(),
						message: format!("Value {} is less than minimum {}", int_val, min_val),
					});
				}
			}
			if let Some(max_val) = max {
				if int_val > *max_val {
					return Err(ValidationError::InvalidValue {
						field: field_name.to_string(),
						message: format!("Value {} is greater than maximum {}", int_val, max_val),
					});
				}
			}
		},
	}

	Ok(())
}

/// A configuration schema that a backend exposes for its own table.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn schema() -> Schema {
		Schema::new(
			vec![Field::new("path", FieldType::String).with_validator(|v| {
				match v.as_str() {
					Some(s) if !s.trim().is_empty() => Ok(()),
					_ => Err("must not be empty".into()),
				}
			})],
			vec![Field::new(
				"ttl",
				FieldType::Integer {
					min: Some(0),
					max: Some(3600),
				},
			)],
		)
	}

	#[test]
	fn test_valid_table() {
		let config: toml::Value = toml::from_str("path = \"/tmp/x\"\nttl = 60").unwrap();
		assert!(schema().validate(&config).is_ok());
	}

	#[test]
	fn test_missing_required() {
		let config: toml::Value = toml::from_str("ttl = 60").unwrap();
		assert!(matches!(
			schema().validate(&config),
			Err(ValidationError::MissingField(f)) if f == "path"
		));
	}

	#[test]
	fn test_out_of_range() {
		let config: toml::Value = toml::from_str("path = \"a\"\nttl = 7200").unwrap();
		assert!(matches!(
			schema().validate(&config),
			Err(ValidationError::InvalidValue { field, .. }) if field == "ttl"
		));
	}

	#[test]
	fn test_custom_validator() {
		let config: toml::Value = toml::from_str("path = \"  \"").unwrap();
		let err = schema().validate(&config).unwrap_err();
		assert!(err.to_string().contains("must not be empty"));
	}

	#[test]
	fn test_unknown_field() {
		let config: toml::Value = toml::from_str("path = \"a\"\ntll = 5").unwrap();
		assert!(matches!(
			schema().validate(&config),
			Err(ValidationError::UnknownField(f)) if f == "tll"
		));
	}

	#[test]
	fn test_type_mismatch() {
		let config: toml::Value = toml::from_str("path = 5").unwrap();
		assert!(matches!(
			schema().validate(&config),
			Err(ValidationError::TypeMismatch { .. })
		));
	}
}
