use objcdoc::model::{Resolution, SignatureFragment};
use objcdoc::render::create_renderer;
use objcdoc::{EntityKind, Settings, SourceParser, Store, Tokenizer};

fn fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name);
    std::fs::read_to_string(path).unwrap()
}

fn run(files: &[(&str, &str)]) -> Store {
    let parser = SourceParser::new(Settings::default());
    let mut store = Store::new();
    for (name, source) in files {
        parser.parse(source, name, &mut store).unwrap();
    }
    parser.finish(&mut store);
    store
}

fn dump(store: &Store) -> String {
    create_renderer("json").unwrap().render(store).unwrap()
}

#[test]
fn one_entity_per_declaration() {
    let source = fixture("Systemator.h");
    let tokenizer = Tokenizer::new(
        &source,
        "Systemator.h",
        &[],
        &objcdoc::frontend::scan::ScanFrontend,
    )
    .unwrap();
    let names: Vec<(EntityKind, String)> = tokenizer.map(|e| (e.kind, e.name)).collect();
    assert_eq!(
        names,
        vec![
            (EntityKind::Constant, "SystematorTaskDidFinishNotification".to_string()),
            (EntityKind::Interface, "Systemator".to_string()),
            (EntityKind::Method, "runTask:".to_string()),
            (EntityKind::Method, "outputOfTask:arguments:".to_string()),
            (EntityKind::Property, "workingDirectory".to_string()),
            (EntityKind::Method, "reset".to_string()),
        ]
    );
}

#[test]
fn groups_come_from_name_markers() {
    let store = run(&[("Systemator.h", &fixture("Systemator.h"))]);
    let systemator = store.root(EntityKind::Interface, "Systemator").unwrap();
    let groups: Vec<(String, Option<String>)> = systemator
        .children_in_source_order()
        .into_iter()
        .map(|c| (c.display_name(), c.group.clone()))
        .collect();
    let tasks = Some("Task execution".to_string());
    let paths = Some("Paths".to_string());
    assert_eq!(
        groups,
        vec![
            ("+runTask:".to_string(), tasks.clone()),
            ("+outputOfTask:arguments:".to_string(), tasks),
            ("workingDirectory".to_string(), paths.clone()),
            ("-reset".to_string(), paths),
        ]
    );
}

#[test]
fn structured_comments() {
    let store = run(&[("Systemator.h", &fixture("Systemator.h"))]);
    let systemator = store.root(EntityKind::Interface, "Systemator").unwrap();

    let comment = systemator.comment.as_ref().unwrap();
    assert_eq!(
        comment.long_description.as_deref(),
        Some("Systemator wraps NSTask behind a small synchronous API.")
    );

    let run_task = systemator.child(EntityKind::Method, "runTask:").unwrap();
    let comment = run_task.comment.as_ref().unwrap();
    assert_eq!(comment.parameters.len(), 1);
    assert_eq!(comment.parameters[0].name, "command");
    assert_eq!(comment.warnings, vec!["Blocks until the task exits.".to_string()]);

    let output = systemator
        .child(EntityKind::Method, "outputOfTask:arguments:")
        .unwrap();
    let comment = output.comment.as_ref().unwrap();
    assert_eq!(comment.parameters.len(), 2);
    assert_eq!(comment.returns.as_deref(), Some("The captured output."));
}

#[test]
fn output_does_not_depend_on_file_order() {
    let files = [
        ("Systemator.h", fixture("Systemator.h")),
        ("Systemator.m", fixture("Systemator.m")),
        ("NSString+Shell.m", fixture("NSString+Shell.m")),
        ("Geometry.h", fixture("Geometry.h")),
    ];
    let forward: Vec<(&str, &str)> = files.iter().map(|(n, s)| (*n, s.as_str())).collect();
    let backward: Vec<(&str, &str)> = forward.iter().rev().copied().collect();

    let a = run(&forward);
    let b = run(&backward);
    assert_eq!(a.roots().collect::<Vec<_>>(), b.roots().collect::<Vec<_>>());
    assert_eq!(
        a.unresolved().collect::<Vec<_>>(),
        b.unresolved().collect::<Vec<_>>()
    );
}

#[test]
fn repeated_runs_are_identical() {
    let files = [
        ("Systemator.h", fixture("Systemator.h")),
        ("Systemator.m", fixture("Systemator.m")),
    ];
    let files: Vec<(&str, &str)> = files.iter().map(|(n, s)| (*n, s.as_str())).collect();
    assert_eq!(dump(&run(&files)), dump(&run(&files)));
}

#[test]
fn blank_line_detaches_a_comment() {
    let store = run(&[(
        "Foo.h",
        "@interface Foo\n/** Attached. */\n- (void)a;\n/** Detached. */\n\n- (void)b;\n@end\n",
    )]);
    let foo = store.root(EntityKind::Interface, "Foo").unwrap();
    assert!(foo.child(EntityKind::Method, "a").unwrap().is_documented());
    assert!(!foo.child(EntityKind::Method, "b").unwrap().is_documented());
}

#[test]
fn first_non_empty_comment_wins() {
    let store = run(&[
        ("Foo.h", "@interface Foo\n- (void)bar;\n@end\n"),
        ("Foo.m", "@implementation Foo\n/** From the implementation. */\n- (void)bar {}\n@end\n"),
        ("Foo+Again.m", "@implementation Foo\n/** Ignored. */\n- (void)bar {}\n@end\n"),
    ]);
    let bar = store
        .root(EntityKind::Interface, "Foo")
        .unwrap()
        .child(EntityKind::Method, "bar")
        .unwrap();
    assert_eq!(
        bar.comment.as_ref().unwrap().short_description.as_deref(),
        Some("From the implementation.")
    );
    assert_eq!(bar.declared_in.len(), 3);
}

#[test]
fn categories_resolve_across_files() {
    let store = run(&[
        ("Foo+Bar.m", "@interface Foo (Bar)\n- (void)baz;\n@end\n"),
        ("Foo.h", "@interface Foo\n@end\n"),
        ("NSString+Shell.m", &fixture("NSString+Shell.m")),
    ]);
    assert_eq!(store.roots().count(), 1);
    let foo = store.root(EntityKind::Interface, "Foo").unwrap();
    let bar = foo.child(EntityKind::Category, "Bar").unwrap();
    assert_eq!(bar.resolution, Some(Resolution::Resolved));
    assert!(bar.child(EntityKind::Method, "baz").is_some());

    let unresolved: Vec<_> = store.unresolved().collect();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].display_name(), "NSString(Shell)");
    assert_eq!(unresolved[0].resolution, Some(Resolution::Unresolved));
}

#[test]
fn c_declarations() {
    let store = run(&[("Geometry.h", &fixture("Geometry.h"))]);
    let axis = store.root(EntityKind::Enum, "Axis").unwrap();
    assert_eq!(axis.children.len(), 2);
    assert!(axis
        .child(EntityKind::EnumValue, "AxisHorizontal")
        .unwrap()
        .is_documented());
    assert!(store.root(EntityKind::Struct, "Point").unwrap().is_documented());
    let distance = store.root(EntityKind::Function, "distance").unwrap();
    assert_eq!(distance.signature.len(), 5);
    assert!(store.root(EntityKind::Macro, "GEOMETRY_VERSION").is_some());
}

#[test]
fn mixed_header_cardinality() {
    let store = run(&[("Archive.h", &fixture("Archive.h"))]);
    let mut roots: Vec<(EntityKind, String)> =
        store.roots().map(|n| (n.kind, n.name.clone())).collect();
    roots.sort();
    let mut expected = vec![
        (EntityKind::Constant, "ArchiveErrorDomain".to_string()),
        (EntityKind::Constant, "ArchiveDefaultLevel".to_string()),
        (EntityKind::Constant, "ArchiveMaxLevel".to_string()),
        (EntityKind::Enum, "ArchiveOptions".to_string()),
        (EntityKind::Interface, "ArchiveReader".to_string()),
        (EntityKind::Macro, "ARCHIVE_READER_BUFFER".to_string()),
        (EntityKind::Function, "ArchiveChecksum".to_string()),
        (EntityKind::Function, "ArchiveVersion".to_string()),
    ];
    expected.sort();
    assert_eq!(roots, expected);

    let reader = store.root(EntityKind::Interface, "ArchiveReader").unwrap();
    let methods: Vec<String> = reader
        .children_in_source_order()
        .into_iter()
        .map(|c| c.display_name())
        .collect();
    assert_eq!(methods, vec!["-initWithPath:", "-read:count:", "-close"]);
    assert!(reader.is_documented());
    for method in reader.children.values() {
        assert!(method.is_documented(), "{}", method.display_name());
    }
    let read = reader.child(EntityKind::Method, "read:count:").unwrap();
    let comment = read.comment.as_ref().unwrap();
    assert_eq!(
        comment.short_description.as_deref(),
        Some("Copies @c count bytes into the buffer @c *ptr points to.")
    );
    assert_eq!(comment.parameters.len(), 2);

    let options = store.root(EntityKind::Enum, "ArchiveOptions").unwrap();
    assert_eq!(options.children.len(), 2);
    assert!(options.children.values().all(|v| v.is_documented()));

    assert!(store.root(EntityKind::Constant, "ArchiveDefaultLevel").unwrap().is_documented());
    assert!(!store.root(EntityKind::Constant, "ArchiveMaxLevel").unwrap().is_documented());

    let checksum = store.root(EntityKind::Function, "ArchiveChecksum").unwrap();
    assert!(checksum.is_documented());
    assert_eq!(
        checksum.signature[0],
        SignatureFragment::Return {
            type_name: "uint32_t".to_string()
        }
    );
    let version = store.root(EntityKind::Function, "ArchiveVersion").unwrap();
    assert_eq!(
        version.signature,
        vec![SignatureFragment::Return {
            type_name: "NSString *".to_string()
        }]
    );

    // `Sources/*.zip` opens a nested comment; the class keeps its comment
    let warnings: Vec<&str> = store
        .diagnostics()
        .iter()
        .map(|d| d.message.as_str())
        .collect();
    assert_eq!(warnings, vec!["`/*` inside a block comment"]);
}
