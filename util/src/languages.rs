//! Language Registry.
//!
//! Maps a language identifier to the recipe the sandbox needs to run it: which
//! image, what to call the source file, how to compile it (if at all) and how to
//! run it. The table is data, not code: the built-in set can be replaced by a
//! JSON file at start-up and nothing outside this module branches on a language.
//!
//! Command templates understand two placeholders:
//! - `{source}`: absolute in-sandbox path of the submitted source file.
//! - `{build}`: in-sandbox directory for compiler output.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Directory the source file is mounted under inside the sandbox.
pub const SOURCE_MOUNT: &str = "/workspace";
/// Directory compiler output is written to inside the sandbox.
pub const BUILD_MOUNT: &str = "/build";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("language '{0}' is not supported")]
pub struct UnsupportedLanguage(pub String);

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read language file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid language file {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("language '{0}' is defined more than once")]
    Duplicate(String),
    #[error("language '{0}' has an empty run command")]
    EmptyRunCommand(String),
}

/// Everything the sandbox needs to execute one language.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LanguageRecipe {
    pub id: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub container_image: String,
    /// Extension including the leading dot, e.g. `.py`.
    pub file_extension: String,
    /// File name without extension. Java needs `Main` to match the public class.
    #[serde(default = "default_file_stem")]
    pub file_stem: String,
    #[serde(default)]
    pub compile_command: Option<String>,
    pub run_command: String,
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default = "default_memory_limit_mb")]
    pub default_memory_limit_mb: u64,
}

fn default_file_stem() -> String {
    "main".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_memory_limit_mb() -> u64 {
    128
}

impl LanguageRecipe {
    /// e.g. `main.py`, `Main.java`.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.file_stem, self.file_extension)
    }

    /// In-sandbox path of the source file.
    pub fn source_path(&self) -> String {
        format!("{}/{}", SOURCE_MOUNT, self.file_name())
    }

    pub fn is_compiled(&self) -> bool {
        self.compile_command.is_some()
    }

    /// Compile command with placeholders filled in, if this language compiles.
    pub fn render_compile(&self) -> Option<String> {
        self.compile_command.as_deref().map(|t| self.render(t))
    }

    pub fn render_run(&self) -> String {
        self.render(&self.run_command)
    }

    fn render(&self, template: &str) -> String {
        template
            .replace("{source}", &self.source_path())
            .replace("{build}", BUILD_MOUNT)
    }
}

/// Read-only table of recipes, keyed by lower-case id and alias.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    recipes: Vec<LanguageRecipe>,
    index: HashMap<String, usize>,
}

impl LanguageRegistry {
    /// Builds a registry, rejecting duplicate ids/aliases and empty run commands.
    pub fn new(recipes: Vec<LanguageRecipe>) -> Result<Self, RegistryError> {
        let mut index = HashMap::new();
        for (i, recipe) in recipes.iter().enumerate() {
            if recipe.run_command.trim().is_empty() {
                return Err(RegistryError::EmptyRunCommand(recipe.id.clone()));
            }
            for key in std::iter::once(&recipe.id).chain(recipe.aliases.iter()) {
                if index.insert(key.to_lowercase(), i).is_some() {
                    return Err(RegistryError::Duplicate(key.clone()));
                }
            }
        }
        Ok(Self { recipes, index })
    }

    /// The languages supported out of the box.
    pub fn builtin() -> Self {
        let recipes = vec![
            LanguageRecipe {
                id: "python".into(),
                aliases: vec!["py".into(), "python3".into()],
                container_image: "python:3.10-slim".into(),
                file_extension: ".py".into(),
                file_stem: default_file_stem(),
                compile_command: None,
                run_command: "python3 -u {source}".into(),
                default_timeout_ms: 10_000,
                default_memory_limit_mb: 128,
            },
            LanguageRecipe {
                id: "javascript".into(),
                aliases: vec!["js".into(), "node".into()],
                container_image: "node:18-slim".into(),
                file_extension: ".js".into(),
                file_stem: default_file_stem(),
                compile_command: None,
                run_command: "node {source}".into(),
                default_timeout_ms: 10_000,
                default_memory_limit_mb: 128,
            },
            LanguageRecipe {
                id: "java".into(),
                aliases: vec![],
                container_image: "eclipse-temurin:17-jdk".into(),
                file_extension: ".java".into(),
                file_stem: "Main".into(),
                compile_command: Some("javac -d {build} {source}".into()),
                run_command: "java -cp {build} Main".into(),
                default_timeout_ms: 15_000,
                default_memory_limit_mb: 256,
            },
            LanguageRecipe {
                id: "cpp".into(),
                aliases: vec!["c++".into(), "cc".into()],
                container_image: "gcc:13".into(),
                file_extension: ".cpp".into(),
                file_stem: default_file_stem(),
                compile_command: Some("g++ -O2 -std=c++17 -o {build}/program {source}".into()),
                run_command: "{build}/program".into(),
                default_timeout_ms: 15_000,
                default_memory_limit_mb: 128,
            },
            LanguageRecipe {
                id: "c".into(),
                aliases: vec![],
                container_image: "gcc:13".into(),
                file_extension: ".c".into(),
                file_stem: default_file_stem(),
                compile_command: Some("gcc -O2 -o {build}/program {source} -lm".into()),
                run_command: "{build}/program".into(),
                default_timeout_ms: 15_000,
                default_memory_limit_mb: 128,
            },
        ];
        // The built-in table is static and known to be valid.
        match Self::new(recipes) {
            Ok(registry) => registry,
            Err(e) => unreachable!("built-in language table is invalid: {e}"),
        }
    }

    /// Loads a JSON array of [`LanguageRecipe`]s.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let path_ref = path.as_ref();
        let display = path_ref.display().to_string();
        let content = fs::read_to_string(path_ref).map_err(|source| RegistryError::Io {
            path: display.clone(),
            source,
        })?;
        let recipes: Vec<LanguageRecipe> =
            serde_json::from_str(&content).map_err(|source| RegistryError::Json {
                path: display,
                source,
            })?;
        let registry = Self::new(recipes)?;
        tracing::info!(path = %path_ref.display(), languages = ?registry.ids(), "loaded language table");
        Ok(registry)
    }

    /// Looks up a recipe by id or alias, ignoring case.
    pub fn resolve(&self, language_id: &str) -> Result<&LanguageRecipe, UnsupportedLanguage> {
        self.index
            .get(&language_id.trim().to_lowercase())
            .map(|&i| &self.recipes[i])
            .ok_or_else(|| UnsupportedLanguage(language_id.to_string()))
    }

    /// Sorted canonical identifiers (aliases excluded).
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.recipes.iter().map(|r| r.id.clone()).collect();
        ids.sort();
        ids
    }

    /// Distinct container images referenced by the table.
    pub fn images(&self) -> Vec<String> {
        self.recipes
            .iter()
            .map(|r| r.container_image.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn recipes(&self) -> &[LanguageRecipe] {
        &self.recipes
    }
}
