//! Loader for configurations split across several files.
//!
//! The main file may name other files in `include`; their top-level sections
//! are merged into the main table. A section may be defined in one file only.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Configuration loader that handles multi-file configurations with includes.
pub struct ConfigLoader {
	/// Base path for resolving relative includes
	base_path: PathBuf,
	/// Files already read, to catch circular includes
	loaded_files: HashSet<PathBuf>,
	/// Which file each top-level section came from
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads a configuration file and all its includes, then validates the result.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let config_path = self.resolve_path(config_path)?;

		let main_content = self.load_file(&config_path).await?;
		let main_toml: toml::Value = toml::from_str(&main_content)?;

		let includes = self.extract_includes(&main_toml)?;
		if includes.is_empty() {
			return main_content.parse();
		}

		let combined_toml = self
			.load_and_combine(main_toml, includes, config_path)
			.await?;

		let config_str = toml::to_string(&combined_toml).map_err(|e| {
			ConfigError::Parse(format!("Failed to serialize combined config: {}", e))
		})?;
		config_str.parse()
	}

	/// Reads a file and resolves environment variables in it.
	async fn load_file(&mut self, path: &Path) -> Result<String, ConfigError> {
		let canonical_path = path.canonicalize().map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical_path.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical_path.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		resolve_env_vars(&content)
	}

	fn extract_includes(&self, toml: &toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
		let mut includes = Vec::new();

		match toml.get("include") {
			None => {},
			Some(toml::Value::String(path_str)) => includes.push(PathBuf::from(path_str)),
			Some(toml::Value::Array(items)) => {
				for item in items {
					let path_str = item.as_str().ok_or_else(|| {
						ConfigError::Validation("Include array must contain only strings".into())
					})?;
					includes.push(PathBuf::from(path_str));
				}
			},
			Some(_) => {
				return Err(ConfigError::Validation(
					"Include must be a string or array of strings".into(),
				))
			},
		}

		Ok(includes)
	}

	/// Merges every included file into `main_toml`, rejecting duplicate sections.
	async fn load_and_combine(
		&mut self,
		mut main_toml: toml::Value,
		includes: Vec<PathBuf>,
		main_file_path: PathBuf,
	) -> Result<toml::Value, ConfigError> {
		if let Some(table) = main_toml.as_table_mut() {
			table.remove("include");
			for key in table.keys() {
				self.section_sources
					.insert(key.clone(), main_file_path.clone());
			}
		}

		for include_path in includes {
			let resolved_path = self.resolve_path(&include_path)?;
			let include_content = self.load_file(&resolved_path).await?;
			let include_toml: toml::Value = toml::from_str(&include_content)?;

			let Some(include_table) = include_toml.as_table() else {
				continue;
			};

			for key in include_table.keys() {
				if key == "include" {
					return Err(ConfigError::Validation(format!(
						"Nested include in {} is not supported",
						resolved_path.display()
					)));
				}
				if let Some(existing_source) = self.section_sources.get(key) {
					return Err(ConfigError::Validation(format!(
						"Duplicate section '{}' found in {} and {}. \
						Each top-level section must be unique across all configuration files.",
						key,
						existing_source.display(),
						resolved_path.display()
					)));
				}
				self.section_sources
					.insert(key.clone(), resolved_path.clone());
			}

			if let Some(main_table) = main_toml.as_table_mut() {
				for (key, value) in include_table {
					main_table.insert(key.clone(), value.clone());
				}
			}
		}

		Ok(main_toml)
	}

	/// Resolves a path relative to the base path.
	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();

		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}

		Ok(resolved)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	const STORAGE_SECTION: &str = r#"
[storage]
primary = "memory"
cleanup_interval_seconds = 3600
[storage.implementations.memory]
"#;

	#[tokio::test]
	async fn test_single_file_config() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("config.toml");
		fs::write(
			&config_path,
			format!("[service]\nid = \"records-east\"\n{}", STORAGE_SECTION),
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config(&config_path).await.unwrap();

		assert_eq!(config.service.id, "records-east");
	}

	#[tokio::test]
	async fn test_config_with_includes() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = r#"
include = ["storage.toml", "customers.toml"]
[service]
id = "records-east"
"#;
		let customers_config = r#"
[[customers]]
id = "acme"
name = "Acme Holdings"

[rates.default]
document_retrieval_rate = "4.00"
scanning_rate_per_page = "0.05"
"#;

		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("storage.toml"), STORAGE_SECTION).unwrap();
		fs::write(temp_dir.path().join("customers.toml"), customers_config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("main.toml").await.unwrap();

		assert_eq!(config.service.id, "records-east");
		assert_eq!(config.storage.primary, "memory");
		assert_eq!(config.customers[0].id, "acme");
		assert!(config.rates.default.is_some());
	}

	#[tokio::test]
	async fn test_duplicate_section_error() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = r#"
include = ["duplicate.toml"]

[service]
id = "records-east"
"#;
		let duplicate_config = r#"
[service]
id = "records-west"
"#;

		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("duplicate.toml"), duplicate_config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let result = loader.load_config("main.toml").await;

		let error_msg = result.unwrap_err().to_string();
		assert!(error_msg.contains("Duplicate section 'service'"));
	}

	#[tokio::test]
	async fn test_self_include_detection() {
		let temp_dir = TempDir::new().unwrap();

		let config = r#"
include = ["self.toml"]

[service]
id = "records-east"
"#;
		fs::write(temp_dir.path().join("self.toml"), config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let result = loader.load_config("self.toml").await;

		let error_msg = result.unwrap_err().to_string();
		assert!(error_msg.contains("already loaded"));
	}

	#[tokio::test]
	async fn test_missing_include_is_io_error() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("main.toml"),
			"include = \"nope.toml\"\n[service]\nid = \"x\"\n",
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let result = loader.load_config("main.toml").await;
		assert!(matches!(result, Err(ConfigError::Io(_))));
	}
}
