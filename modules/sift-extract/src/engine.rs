//! Type-directed walk of a schema over a document backend.

use futures::future::{FutureExt, LocalBoxFuture};
use tracing::trace;
use url::Url;

use crate::backend::DocumentBackend;
use crate::duration::parse_duration;
use crate::error::{ExtractError, Result};
use crate::record::{ExtractedRecord, Value};
use crate::schema::{ScalarType, SchemaFieldMap, SemanticType, Selector};

/// Attributes tried, in order, when decoding a `Link`.
pub(crate) const LINK_ATTRIBUTES: [&str; 3] = ["href", "src", "data-url"];

pub struct Extractor<'b, B: DocumentBackend> {
    backend: &'b B,
}

impl<'b, B: DocumentBackend> Extractor<'b, B> {
    pub fn new(backend: &'b B) -> Self {
        Self { backend }
    }

    /// Extract `schema` from the whole document.
    pub async fn extract(&self, schema: &SchemaFieldMap) -> Result<ExtractedRecord> {
        let root = self.backend.root().await?;
        self.extract_at(schema, &root).await
    }

    /// Extract `schema` with `context` as the root. A required field that
    /// matches nothing aborts the whole record.
    pub async fn extract_at(
        &self,
        schema: &SchemaFieldMap,
        context: &B::Node,
    ) -> Result<ExtractedRecord> {
        let mut record = ExtractedRecord::new(schema.name());
        for (name, spec) in schema.fields() {
            let value = self
                .extract_field(&spec.ty, &spec.selector, context)
                .await?;
            record.set_field(name, value);
        }
        Ok(record)
    }

    pub fn extract_field<'a>(
        &'a self,
        ty: &'a SemanticType,
        selector: &'a Selector,
        context: &'a B::Node,
    ) -> LocalBoxFuture<'a, Result<Value>> {
        async move {
            match ty {
                SemanticType::Optional(inner) => {
                    match self.extract_field(inner, selector, context).await {
                        Err(ExtractError::NotFound(what)) => {
                            trace!(selector = %selector, missing = %what, "Optional field absent");
                            Ok(Value::Null)
                        }
                        other => other,
                    }
                }
                SemanticType::Sequence(inner) => {
                    let nodes = self.backend.locate_all(selector, context).await?;
                    let here = Selector::context();
                    let mut items = Vec::with_capacity(nodes.len());
                    for node in &nodes {
                        items.push(self.extract_field(inner, &here, node).await?);
                    }
                    Ok(Value::Sequence(items))
                }
                SemanticType::Nested(schema) => {
                    let node = self.backend.locate_one(selector, context).await?;
                    Ok(Value::Record(self.extract_at(schema, &node).await?))
                }
                SemanticType::Scalar(scalar) => self.decode_scalar(*scalar, selector, context).await,
            }
        }
        .boxed_local()
    }

    async fn decode_scalar(
        &self,
        scalar: ScalarType,
        selector: &Selector,
        context: &B::Node,
    ) -> Result<Value> {
        match scalar {
            ScalarType::Url => Ok(Value::Text(self.backend.current_location().await?)),
            ScalarType::Text => {
                let node = self.backend.locate_one(selector, context).await?;
                Ok(Value::Text(self.backend.text_of(&node).await?))
            }
            ScalarType::Link => {
                let node = self.backend.locate_one(selector, context).await?;
                self.decode_link(&node).await
            }
            ScalarType::Time => {
                let node = self.backend.locate_one(selector, context).await?;
                let seconds = parse_duration(&self.backend.text_of(&node).await?);
                Ok(Value::Integer(i64::try_from(seconds).unwrap_or(i64::MAX)))
            }
            ScalarType::Integer => {
                let node = self.backend.locate_one(selector, context).await?;
                Ok(Value::Integer(decode_integer(&self.backend.text_of(&node).await?)))
            }
        }
    }

    async fn decode_link(&self, node: &B::Node) -> Result<Value> {
        for attr in LINK_ATTRIBUTES {
            let Some(raw) = self.backend.attribute_of(node, attr).await? else {
                continue;
            };
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            if self.backend.links_are_absolute() {
                return Ok(Value::Text(raw.to_string()));
            }
            let base = self.backend.current_location().await?;
            return Ok(Value::Text(absolutize(raw, &base)));
        }
        Ok(Value::Null)
    }
}

/// Resolve `raw` against `base` when it is relative. Absolute values and
/// values that cannot be resolved are returned unchanged.
pub fn absolutize(raw: &str, base: &str) -> String {
    match Url::parse(raw) {
        Ok(_) => raw.to_string(),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(base)
            .and_then(|b| b.join(raw))
            .map(String::from)
            .unwrap_or_else(|_| raw.to_string()),
        Err(_) => raw.to_string(),
    }
}

/// First digit run after dropping `,` and whitespace; `0` when there is none.
/// Rendered counters are noisy, so absence is not an error.
pub fn decode_integer(text: &str) -> i64 {
    let compact: String = text
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    let digits: String = compact
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StaticBackend;
    use serde_json::json;

    async fn run(html: &str, location: &str, schema: &SchemaFieldMap) -> Result<ExtractedRecord> {
        let backend = StaticBackend::from_html(html, location)?;
        Extractor::new(&backend).extract(schema).await
    }

    #[test]
    fn integer_decode_strips_separators() {
        assert_eq!(decode_integer("1,234 followers"), 1234);
        assert_eq!(decode_integer("  12 345 "), 12345);
        assert_eq!(decode_integer("v2 has 10"), 2);
        assert_eq!(decode_integer("no digits"), 0);
        assert_eq!(decode_integer(""), 0);
    }

    #[test]
    fn relative_links_resolve_against_location() {
        assert_eq!(
            absolutize("/img/x.png", "https://site/p/7"),
            "https://site/img/x.png"
        );
        assert_eq!(absolutize("y.png", "https://site/p/7"), "https://site/p/y.png");
        assert_eq!(
            absolutize("https://cdn.test/a.png", "https://site/p/7"),
            "https://cdn.test/a.png"
        );
    }

    #[tokio::test]
    async fn optional_link_absent_yields_null() {
        let schema = SchemaFieldMap::new("Post")
            .field("title", SemanticType::text(), "h1")
            .field("link", SemanticType::optional(SemanticType::link()), "a.more");

        let record = run("<h1> Hello </h1>", "https://site/p/1", &schema)
            .await
            .unwrap();

        assert_eq!(record.to_plain_value(), json!({ "title": "Hello", "link": null }));
    }

    #[tokio::test]
    async fn required_field_missing_aborts_record() {
        let schema = SchemaFieldMap::new("Post")
            .field("title", SemanticType::text(), "h1")
            .field("body", SemanticType::text(), "article");

        let err = run("<h1>Hello</h1>", "https://site/p/1", &schema)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::NotFound(_)));
    }

    #[tokio::test]
    async fn sequence_counts_match_nodes_in_order() {
        let schema = SchemaFieldMap::new("List")
            .field("items", SemanticType::sequence(SemanticType::integer()), "li")
            .field("none", SemanticType::sequence(SemanticType::text()), "dt");

        let record = run(
            "<ul><li>3</li><li>1</li><li>2</li></ul>",
            "https://site/",
            &schema,
        )
        .await
        .unwrap();

        assert_eq!(record.to_plain_value(), json!({ "items": [3, 1, 2], "none": [] }));
    }

    #[tokio::test]
    async fn nested_schema_runs_at_narrowed_context() {
        let author = SchemaFieldMap::new("Author")
            .field("name", SemanticType::text(), "span.name")
            .field("profile", SemanticType::link(), "a");
        let schema = SchemaFieldMap::new("Post")
            .field("author", SemanticType::nested(author), "div.author")
            .field("name", SemanticType::text(), "span.name");

        let html = r#"
            <span class="name">outside</span>
            <div class="author"><span class="name">Ada</span><a href="/u/ada">p</a></div>
        "#;
        let record = run(html, "https://site/p/1", &schema).await.unwrap();

        assert_eq!(
            record.to_plain_value(),
            json!({
                "author": { "name": "Ada", "profile": "https://site/u/ada" },
                "name": "outside"
            })
        );
    }

    #[tokio::test]
    async fn sequence_of_nested_records() {
        let update = SchemaFieldMap::new("Update")
            .field("time", SemanticType::time(), "time")
            .field("image", SemanticType::optional(SemanticType::link()), "img");
        let schema = SchemaFieldMap::new("Project")
            .field("updates", SemanticType::sequence(SemanticType::nested(update)), "div.card");

        let html = r#"
            <div class="card"><time>2 hours ago</time><img src="a.png"></div>
            <div class="card"><time>1 day ago</time></div>
        "#;
        let record = run(html, "https://site/projects/9", &schema).await.unwrap();

        assert_eq!(
            record.to_plain_value(),
            json!({
                "updates": [
                    { "time": 7200, "image": "https://site/projects/a.png" },
                    { "time": 86400, "image": null }
                ]
            })
        );
    }

    #[tokio::test]
    async fn url_field_ignores_selector() {
        let schema = SchemaFieldMap::new("Page").field("url", SemanticType::url(), "does-not-exist");
        let record = run("<p></p>", "https://site/projects/3", &schema).await.unwrap();
        assert_eq!(
            record.get("url").and_then(Value::as_text),
            Some("https://site/projects/3")
        );
    }

    #[tokio::test]
    async fn link_prefers_href_then_src_then_data_url() {
        let schema = SchemaFieldMap::new("Links")
            .field("a", SemanticType::link(), "#a")
            .field("b", SemanticType::link(), "#b")
            .field("c", SemanticType::link(), "#c")
            .field("d", SemanticType::link(), "#d");

        let html = r#"
            <a id="a" href="/h" src="/s">a</a>
            <img id="b" href="" src="/s">
            <div id="c" data-url="https://other.test/x">c</div>
            <div id="d">d</div>
        "#;
        let record = run(html, "https://site/p/7", &schema).await.unwrap();

        assert_eq!(
            record.to_plain_value(),
            json!({
                "a": "https://site/h",
                "b": "https://site/s",
                "c": "https://other.test/x",
                "d": null
            })
        );
    }

    #[tokio::test]
    async fn optional_does_not_absorb_authoring_errors() {
        let schema = SchemaFieldMap::new("Bad")
            .field("x", SemanticType::optional(SemanticType::text()), "p[[");
        let err = run("<p>x</p>", "https://site/", &schema).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn optional_nested_absent_yields_null() {
        let inner = SchemaFieldMap::new("Inner").field("x", SemanticType::text(), "b");
        let schema = SchemaFieldMap::new("Outer")
            .field("inner", SemanticType::optional(SemanticType::nested(inner)), "section");

        let record = run("<section><i>no bold</i></section>", "https://site/", &schema)
            .await
            .unwrap();
        assert!(record.get("inner").unwrap().is_null());
    }
}
