//! Registry of event schemas, keyed by `(event, year)`.

mod summer_2025;

use sift_extract::{ExtractError, ScalarType, SchemaFieldMap, SemanticType};
use thiserror::Error;

/// A registered schema plus the crawl-level facts attached to it.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Record name used as the top-level key of a submission.
    pub name: String,
    pub fields: SchemaFieldMap,
    /// Link field whose target is rehosted before submission.
    pub media_field: Option<String>,
}

impl Schema {
    /// Authoring checks: the field map itself, then the media field, which
    /// must name a declared `Link` or optional `Link`.
    pub fn validate(&self) -> Result<(), ExtractError> {
        self.fields.validate()?;
        if let Some(media) = &self.media_field {
            check_media_field(&self.fields, media)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No schema registered for event `{event}` {year}")]
    SchemaNotFound { event: String, year: u16 },

    #[error("Registered schema is invalid: {0}")]
    Invalid(#[from] ExtractError),
}

const REGISTERED: &[(&str, u16)] = &[("summer", 2025)];

/// Every `(event, year)` pair with a schema.
pub fn registered() -> &'static [(&'static str, u16)] {
    REGISTERED
}

/// Look up and validate the schema for `(event, year)`. Event names are
/// case-insensitive.
pub fn resolve(event: &str, year: u16) -> Result<Schema, RegistryError> {
    let schema = match (event.to_ascii_lowercase().as_str(), year) {
        ("summer", 2025) => summer_2025::schema(),
        _ => {
            return Err(RegistryError::SchemaNotFound {
                event: event.to_string(),
                year,
            })
        }
    };

    schema.validate()?;
    Ok(schema)
}

fn check_media_field(fields: &SchemaFieldMap, media: &str) -> Result<(), ExtractError> {
    let spec = fields.get(media).ok_or_else(|| {
        ExtractError::Authoring(format!("media field `{media}` is not declared"))
    })?;
    let is_link = match &spec.ty {
        SemanticType::Scalar(ScalarType::Link) => true,
        SemanticType::Optional(inner) => matches!(**inner, SemanticType::Scalar(ScalarType::Link)),
        _ => false,
    };
    if is_link {
        Ok(())
    } else {
        Err(ExtractError::Authoring(format!(
            "media field `{media}` must be a Link"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_registered_schema_resolves() {
        for (event, year) in registered() {
            let schema = resolve(event, *year).unwrap();
            assert!(!schema.fields.is_empty());
        }
    }

    #[test]
    fn event_lookup_ignores_case() {
        assert_eq!(resolve("Summer", 2025).unwrap().name, "Summer2025");
    }

    #[test]
    fn unknown_event_is_not_found() {
        let err = resolve("winter", 2025).unwrap_err();
        assert!(matches!(err, RegistryError::SchemaNotFound { year: 2025, .. }));
        assert!(matches!(
            resolve("summer", 2024),
            Err(RegistryError::SchemaNotFound { .. })
        ));
    }

    #[test]
    fn media_field_must_be_a_declared_link() {
        let fields = SchemaFieldMap::new("T")
            .field("cover", SemanticType::link(), "img")
            .field("title", SemanticType::text(), "h1")
            .field("thumb", SemanticType::optional(SemanticType::link()), "img.t");

        check_media_field(&fields, "cover").unwrap();
        check_media_field(&fields, "thumb").unwrap();
        assert!(check_media_field(&fields, "title").unwrap_err().is_fatal());
        assert!(check_media_field(&fields, "missing").unwrap_err().is_fatal());
    }

    #[test]
    fn validate_checks_fields_and_media() {
        let nested_optional = Schema {
            name: "T".to_string(),
            fields: SchemaFieldMap::new("T").field(
                "t",
                SemanticType::optional(SemanticType::optional(SemanticType::text())),
                "h1",
            ),
            media_field: None,
        };
        assert!(nested_optional.validate().unwrap_err().is_fatal());

        let undeclared_media = Schema {
            name: "T".to_string(),
            fields: SchemaFieldMap::new("T").field("t", SemanticType::text(), "h1"),
            media_field: Some("nope".to_string()),
        };
        assert!(undeclared_media.validate().unwrap_err().is_fatal());

        let fine = Schema {
            media_field: None,
            ..undeclared_media
        };
        fine.validate().unwrap();
    }
}
