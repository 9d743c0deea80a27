use std::path::Path;

use core_schema::SchemaSpec;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, ensure};

use crate::entities::{ExpectedAnswer, VerificationOptions};
use crate::errors::{self as verifier_error, CatalogResult};

/// One practice question: a schema, an expected answer and grading options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Name of a schema declared in the same catalog
    pub schema: String,
    /// Written as `{referenceQuery: ...}` or `{resultSet: ...}`
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub expected: ExpectedAnswer,
    #[serde(default)]
    pub options: VerificationOptions,
}

#[derive(Debug, Deserialize)]
struct CatalogDef {
    #[serde(default)]
    schemas: Vec<SchemaSpec>,
    #[serde(default)]
    challenges: Vec<Challenge>,
}

/// Schemas and challenges loaded from YAML, kept in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ChallengeCatalog {
    schemas: IndexMap<String, SchemaSpec>,
    challenges: IndexMap<String, Challenge>,
}

impl ChallengeCatalog {
    #[tracing::instrument(name = "ChallengeCatalog::from_yaml_str", level = "debug", skip_all, err)]
    pub fn from_yaml_str(yaml: &str) -> CatalogResult<Self> {
        let def: CatalogDef = serde_yaml::from_str(yaml).context(verifier_error::ParseSnafu)?;
        Self::try_from_def(def)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> CatalogResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).context(verifier_error::ReadSnafu {
            path: path.display().to_string(),
        })?;
        Self::from_yaml_str(&yaml)
    }

    fn try_from_def(def: CatalogDef) -> CatalogResult<Self> {
        let mut catalog = Self::default();
        for schema in def.schemas {
            schema
                .validate_spec()
                .context(verifier_error::InvalidSchemaSnafu {
                    name: schema.name.clone(),
                })?;
            ensure!(
                !catalog.schemas.contains_key(&schema.name),
                verifier_error::DuplicateSchemaSnafu {
                    name: schema.name.clone(),
                }
            );
            catalog.schemas.insert(schema.name.clone(), schema);
        }
        for challenge in def.challenges {
            ensure!(
                catalog.schemas.contains_key(&challenge.schema),
                verifier_error::UnknownSchemaSnafu {
                    id: challenge.id.clone(),
                    schema: challenge.schema.clone(),
                }
            );
            ensure!(
                !catalog.challenges.contains_key(&challenge.id),
                verifier_error::DuplicateChallengeSnafu {
                    id: challenge.id.clone(),
                }
            );
            catalog.challenges.insert(challenge.id.clone(), challenge);
        }
        tracing::debug!(
            schemas = catalog.schemas.len(),
            challenges = catalog.challenges.len(),
            "Loaded challenge catalog"
        );
        Ok(catalog)
    }

    pub fn get(&self, id: &str) -> CatalogResult<&Challenge> {
        self.challenges
            .get(id)
            .context(verifier_error::ChallengeNotFoundSnafu { id })
    }

    #[must_use]
    pub fn schema(&self, name: &str) -> Option<&SchemaSpec> {
        self.schemas.get(name)
    }

    /// The schema a challenge runs against. Always present once loaded.
    pub fn schema_for(&self, challenge: &Challenge) -> CatalogResult<&SchemaSpec> {
        self.schemas
            .get(&challenge.schema)
            .context(verifier_error::UnknownSchemaSnafu {
                id: challenge.id.as_str(),
                schema: challenge.schema.as_str(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Challenge> {
        self.challenges.values()
    }

    pub fn schemas(&self) -> impl Iterator<Item = &SchemaSpec> {
        self.schemas.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }
}
