//! Template expansion seam.
//!
//! String values flowing through a tree are treated as templates and handed
//! to a `TemplateEngine` together with the current scope. The full template
//! language is a host concern; the runtime only needs the pure
//! text-plus-scope-to-text function. `BasicTemplate` is the built-in
//! default and supports bare `{{ identifier }}` substitution.

use crate::items::DataMap;

/// Pure template expansion over the current scope.
pub trait TemplateEngine: Send + Sync {
    /// Expand `template` with the values of `scope`. Returns the rendered
    /// text or a message describing why expansion failed.
    fn render(&self, template: &str, scope: &DataMap) -> Result<String, String>;
}

/// Built-in engine: replaces `{{ name }}` with the stringified scope value.
///
/// Anything beyond bare identifiers (filters, expressions) has to come from
/// a host-provided engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicTemplate;

impl TemplateEngine for BasicTemplate {
    fn render(&self, template: &str, scope: &DataMap) -> Result<String, String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                return Err(format!("unterminated expression in template: {template}"));
            };
            let name = after[..end].trim();
            if name.is_empty() {
                return Err("empty expression in template".to_string());
            }
            match scope.get(name) {
                Some(value) => out.push_str(&value.to_string()),
                None => return Err(format!("unknown identifier in template: {name}")),
            }
            rest = &after[end + 2..];
        }
        out.push_str(rest);

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::DataItem;

    fn scope() -> DataMap {
        let mut map = DataMap::new();
        map.insert("name".to_string(), DataItem::String("sakura".into()));
        map.insert("count".to_string(), DataItem::Int(3));
        map
    }

    #[test]
    fn plain_text_passes_through() {
        let rendered = BasicTemplate.render("this is a test", &scope()).unwrap();
        assert_eq!(rendered, "this is a test");
    }

    #[test]
    fn identifiers_substitute() {
        let rendered = BasicTemplate
            .render("{{ name }}: {{count}} trees", &scope())
            .unwrap();
        assert_eq!(rendered, "sakura: 3 trees");
    }

    #[test]
    fn unknown_identifier_fails() {
        assert!(BasicTemplate.render("{{ missing }}", &scope()).is_err());
    }

    #[test]
    fn unterminated_and_empty_expressions_fail() {
        assert!(BasicTemplate.render("{{ name", &scope()).is_err());
        assert!(BasicTemplate.render("{{}}", &scope()).is_err());
    }
}
