use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{ExtractError, Result};

/// Leaf decode rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    /// Trimmed text content of the node.
    Text,
    /// First non-empty of `href`, `src`, `data-url`, made absolute.
    Link,
    /// Relative-time text converted to seconds.
    Time,
    /// The document's current location. The selector is not evaluated.
    Url,
    /// First digit run of the text, separators removed. `0` when absent.
    Integer,
}

/// Declared meaning of a field.
#[derive(Debug, Clone)]
pub enum SemanticType {
    Scalar(ScalarType),
    Optional(Box<SemanticType>),
    Sequence(Box<SemanticType>),
    Nested(Arc<SchemaFieldMap>),
}

impl SemanticType {
    pub fn text() -> Self {
        SemanticType::Scalar(ScalarType::Text)
    }

    pub fn link() -> Self {
        SemanticType::Scalar(ScalarType::Link)
    }

    pub fn time() -> Self {
        SemanticType::Scalar(ScalarType::Time)
    }

    pub fn url() -> Self {
        SemanticType::Scalar(ScalarType::Url)
    }

    pub fn integer() -> Self {
        SemanticType::Scalar(ScalarType::Integer)
    }

    pub fn optional(inner: SemanticType) -> Self {
        SemanticType::Optional(Box::new(inner))
    }

    pub fn sequence(inner: SemanticType) -> Self {
        SemanticType::Sequence(Box::new(inner))
    }

    pub fn nested(schema: SchemaFieldMap) -> Self {
        SemanticType::Nested(Arc::new(schema))
    }
}

/// A CSS location expression evaluated relative to a context node.
///
/// `"."` is the context node itself. `nth` picks the n-th (0-based) match in
/// document order instead of the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    css: String,
    nth: Option<usize>,
}

impl Selector {
    pub const CONTEXT: &'static str = ".";

    pub fn css(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            nth: None,
        }
    }

    pub fn context() -> Self {
        Self::css(Self::CONTEXT)
    }

    pub fn nth(mut self, index: usize) -> Self {
        self.nth = Some(index);
        self
    }

    pub fn as_css(&self) -> &str {
        &self.css
    }

    pub fn index(&self) -> Option<usize> {
        self.nth
    }

    pub fn is_context(&self) -> bool {
        self.css == Self::CONTEXT
    }

    /// Parse the CSS once so malformed selectors surface at schema-load time.
    pub(crate) fn compile(&self) -> Result<scraper::Selector> {
        scraper::Selector::parse(&self.css)
            .map_err(|e| ExtractError::Authoring(format!("invalid selector `{}`: {e:?}", self.css)))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.nth {
            Some(n) => write!(f, "{} [{n}]", self.css),
            None => f.write_str(&self.css),
        }
    }
}

impl From<&str> for Selector {
    fn from(css: &str) -> Self {
        Selector::css(css)
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub ty: SemanticType,
    pub selector: Selector,
}

/// Named, ordered field declarations. Output records keep this order.
#[derive(Debug, Clone)]
pub struct SchemaFieldMap {
    name: String,
    fields: IndexMap<String, FieldSpec>,
    duplicates: Vec<String>,
}

impl SchemaFieldMap {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            duplicates: Vec::new(),
        }
    }

    /// Declare a field. Redeclaring a name is reported by [`validate`](Self::validate).
    pub fn field(
        mut self,
        name: impl Into<String>,
        ty: SemanticType,
        selector: impl Into<Selector>,
    ) -> Self {
        let name = name.into();
        let spec = FieldSpec {
            ty,
            selector: selector.into(),
        };
        if self.fields.insert(name.clone(), spec).is_some() {
            self.duplicates.push(name);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check every declaration, recursing into nested schemas.
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = self.duplicates.first() {
            return Err(ExtractError::Authoring(format!(
                "field `{name}` declared twice in `{}`",
                self.name
            )));
        }
        for (name, spec) in &self.fields {
            validate_type(&spec.ty, false).map_err(|reason| {
                ExtractError::Authoring(format!("field `{}.{name}`: {reason}", self.name))
            })?;
            if !spec.selector.is_context() {
                spec.selector.compile()?;
            }
        }
        Ok(())
    }
}

fn validate_type(ty: &SemanticType, inside_optional: bool) -> std::result::Result<(), String> {
    match ty {
        SemanticType::Scalar(_) => Ok(()),
        SemanticType::Optional(_) if inside_optional => {
            Err("optional types cannot be nested directly".to_string())
        }
        SemanticType::Optional(inner) => validate_type(inner, true),
        SemanticType::Sequence(inner) => validate_type(inner, false),
        SemanticType::Nested(schema) => schema.validate().map_err(|e| e.to_string()),
    }
}
