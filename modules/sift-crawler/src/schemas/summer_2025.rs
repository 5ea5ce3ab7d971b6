// Project pages of the 2025 summer event, `{site}/projects/{id}`.
//
// The site styles with utility classes only, so selectors match the full
// class attribute exactly. A class change on the site surfaces as NotFound.

use sift_extract::{SchemaFieldMap, Selector, SemanticType};

use super::Schema;

const STAT: &str = r#"span[class="text-gray-800"]"#;

const BUTTON_TAIL: &str = "hover:scale-[1.05] text-white transition-transform duration-300 flex-1 text-center btn-pixel text-base md:text-lg 2xl:text-2xl";

fn button(color: &str) -> Selector {
    Selector::css(format!(
        r#"a[class="px-3 md:px-4 py-3 md:py-2 {color} {BUTTON_TAIL}"]"#
    ))
}

fn individual_update() -> SchemaFieldMap {
    SchemaFieldMap::new("IndividualUpdate")
        .field(
            "time",
            SemanticType::time(),
            r#"div[class="text-[#B89576]"] > span:first-of-type"#,
        )
        .field(
            "message",
            SemanticType::text(),
            r#"div[class="prose max-w-[32em] text-[#4a2d24] mb-2 sm:mb-3 text-base sm:text-lg 2xl:text-xl break-words overflow-wrap-anywhere"]"#,
        )
        .field(
            "image",
            SemanticType::optional(SemanticType::link()),
            r#"img[class="w-full object-contain cursor-pointer hover:opacity-90 transition-opacity rounded-lg max-h-96"]"#,
        )
}

pub(super) fn schema() -> Schema {
    let fields = SchemaFieldMap::new("Summer2025")
        .field("url", SemanticType::url(), Selector::context())
        .field(
            "main_image",
            SemanticType::link(),
            r#"img[class="object-contain w-full h-full max-h-full max-w-full"]"#,
        )
        .field(
            "name",
            SemanticType::text(),
            r#"h1[class="text-2xl md:text-3xl 2xl:text-4xl text-black md:flex-grow"]"#,
        )
        .field(
            "description",
            SemanticType::text(),
            r#"div[class="text-black mb-3 md:mb-4 text-base md:text-lg 2xl:text-xl [p]:text-inherit"] > p"#,
        )
        .field(
            "author",
            SemanticType::text(),
            r#"div[class="flex items-center space-x-2 mb-3 md:mb-4 text-sm md:text-base 2xl:text-lg text-gray-600"] > a > span > span"#,
        )
        .field("followers", SemanticType::integer(), Selector::css(STAT).nth(0))
        .field("time", SemanticType::time(), Selector::css(STAT).nth(2))
        .field("readme", SemanticType::optional(SemanticType::link()), button("bg-saddle-taupe"))
        .field("repo", SemanticType::optional(SemanticType::link()), button("bg-nice-blue"))
        .field("demo", SemanticType::optional(SemanticType::link()), button("bg-forest"))
        .field(
            "updates",
            SemanticType::sequence(SemanticType::nested(individual_update())),
            r#"div[class="card-content"]"#,
        );

    Schema {
        name: fields.name().to_string(),
        fields,
        media_field: Some("main_image".to_string()),
    }
}
