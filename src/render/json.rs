//! JSON dump for tooling. Output is deterministic: nodes appear in key
//! order, diagnostics in the order they were reported.

use crate::error::Diagnostic;
use crate::model::Node;
use crate::render::Renderer;
use crate::store::Store;
use anyhow::{Context, Result};
use serde::Serialize;

pub struct JsonRenderer;

#[derive(Serialize)]
struct Dump<'a> {
    roots: Vec<&'a Node>,
    unresolved: Vec<&'a Node>,
    diagnostics: &'a [Diagnostic],
}

impl Renderer for JsonRenderer {
    fn render(&self, store: &Store) -> Result<String> {
        let dump = Dump {
            roots: store.roots().collect(),
            unresolved: store.unresolved().collect(),
            diagnostics: store.diagnostics(),
        };
        let mut out = serde_json::to_string_pretty(&dump).context("failed to serialize model")?;
        out.push('\n');
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SourceParser;
    use crate::settings::Settings;

    fn render(source: &str) -> serde_json::Value {
        let parser = SourceParser::new(Settings::default());
        let mut store = Store::new();
        parser.parse(source, "Foo.h", &mut store).unwrap();
        parser.finish(&mut store);
        let text = JsonRenderer.render(&store).unwrap();
        serde_json::from_str(&text).unwrap()
    }

    #[test]
    fn nodes_and_children() {
        let value = render("/** A foo. */\n@interface Foo : NSObject\n- (void)bar;\n@end\n");
        let foo = &value["roots"][0];
        assert_eq!(foo["kind"], "interface");
        assert_eq!(foo["name"], "Foo");
        assert_eq!(foo["superclass"], "NSObject");
        assert_eq!(foo["comment"]["short_description"], "A foo.");
        assert_eq!(foo["children"][0]["name"], "bar");
        assert_eq!(foo["children"][0]["flavor"], "instance");
        assert_eq!(foo["children"][0]["signature"][0]["role"], "return");
    }

    #[test]
    fn unresolved_categories_and_diagnostics() {
        let value = render("@interface Missing (Extras)\n@end\n");
        assert_eq!(value["roots"].as_array().unwrap().len(), 0);
        assert_eq!(value["unresolved"][0]["resolution"], "unresolved");
        assert_eq!(value["diagnostics"][0]["severity"], "warning");
    }
}
