//! Indented plain-text outline of the model, one node per line.

use crate::model::{EntityKind, Node, Resolution};
use crate::render::Renderer;
use crate::store::Store;
use anyhow::Result;

pub struct OutlineRenderer;

impl Renderer for OutlineRenderer {
    fn render(&self, store: &Store) -> Result<String> {
        let mut out = String::new();
        let mut roots: Vec<&Node> = store.roots().collect();
        roots.sort_by(|a, b| a.location.cmp(&b.location));
        for node in roots {
            render_node(&mut out, node, 0);
        }

        let unresolved: Vec<&Node> = store.unresolved().collect();
        if !unresolved.is_empty() {
            out.push_str("\nunresolved:\n");
            for node in unresolved {
                render_node(&mut out, node, 1);
            }
        }
        Ok(out)
    }
}

fn render_node(out: &mut String, node: &Node, depth: usize) {
    let indent = "  ".repeat(depth);
    let mut line = format!("{}{} {}", indent, node.kind, label(node));

    if let Some(ref superclass) = node.superclass {
        line.push_str(&format!(" : {}", superclass));
    }
    if !node.protocols.is_empty() {
        let protocols: Vec<&str> = node.protocols.iter().map(String::as_str).collect();
        line.push_str(&format!(" <{}>", protocols.join(", ")));
    }
    if let Some(ref type_name) = node.type_name {
        line.push_str(&format!(" [{}]", type_name));
    }
    if node.resolution == Some(Resolution::Unresolved) {
        line.push_str(" (unresolved)");
    }
    if let Some(short) = node.comment.as_ref().and_then(|c| c.short_description.as_ref()) {
        line.push_str(&format!("  // {}", short));
    }
    out.push_str(&line);
    out.push('\n');

    let mut group: Option<&str> = None;
    for child in node.children_in_source_order() {
        if child.group.is_some() && child.group.as_deref() != group {
            group = child.group.as_deref();
            out.push_str(&format!("{}  @name {}\n", indent, group.unwrap_or_default()));
        }
        render_node(out, child, depth + 1);
    }
}

/// Category nodes show their base class; methods their flavor.
fn label(node: &Node) -> String {
    match node.kind {
        EntityKind::Category | EntityKind::ClassExtension | EntityKind::Method => {
            node.display_name()
        }
        _ => node.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SourceParser;
    use crate::settings::Settings;

    fn outline(files: &[(&str, &str)]) -> String {
        let parser = SourceParser::new(Settings::default());
        let mut store = Store::new();
        for (name, source) in files {
            parser.parse(source, name, &mut store).unwrap();
        }
        parser.finish(&mut store);
        OutlineRenderer.render(&store).unwrap()
    }

    #[test]
    fn nested_outline() {
        let text = outline(&[
            ("Foo.h", "/** A foo. */\n@interface Foo : NSObject\n@end\n"),
            ("Foo+Bar.m", "@interface Foo (Bar) - (void)baz; @end"),
        ]);
        assert_eq!(
            text,
            "interface Foo : NSObject  // A foo.\n  category Foo(Bar)\n    method -baz\n"
        );
    }

    #[test]
    fn groups_and_unresolved() {
        let text = outline(&[(
            "S.h",
            "@interface S\n/// @name Tasks\n+ (void)run;\n@end\n@interface Gone (More)\n@end\n",
        )]);
        assert!(text.contains("interface S\n  @name Tasks\n  method +run\n"));
        assert!(text.contains("unresolved:\n  category Gone(More) (unresolved)\n"));
    }
}
