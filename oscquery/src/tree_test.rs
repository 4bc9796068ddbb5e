use super::*;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn test_normalize_path() -> Result<()> {
    let tests = vec![
        ("/", "/"),
        ("//", "/"),
        ("/foo", "/foo"),
        ("/foo/", "/foo"),
        ("/foo//bar", "/foo/bar"),
        ("/a/b/c///", "/a/b/c"),
    ];
    for (input, want) in tests {
        assert_eq!(normalize_path(input)?, want, "normalizing {input:?}");
    }

    assert_eq!(
        normalize_path("foo/bar"),
        Err(Error::ErrInvalidPath("foo/bar".to_owned()))
    );
    assert!(normalize_path("").is_err());
    Ok(())
}

#[test]
fn test_new_tree_has_root() {
    let tree = OscQueryTree::new();
    assert!(tree.is_empty());
    assert_eq!(tree.len(), 1);
    assert!(tree.contains("/"));

    let root = tree.root();
    assert_eq!(root.full_path, "/");
    assert_eq!(root.access, AccessValues::NoValue);
    assert_eq!(root.contents, Some(BTreeMap::new()));
}

#[test]
fn test_add_node_creates_ancestors() -> Result<()> {
    let mut tree = OscQueryTree::new();
    let node = tree.add_node(
        "/foo/bar/baz",
        AccessValues::ReadWrite,
        Some("f"),
        Some(vec![OscValue::Float(0.5)]),
        Some("a knob"),
    )?;
    assert_eq!(node.full_path, "/foo/bar/baz");
    assert_eq!(node.name(), "baz");
    assert_eq!(node.parent_path(), "/foo/bar");
    assert_eq!(node.description.as_deref(), Some("a knob"));
    assert!(node.contents.is_none());

    assert_eq!(tree.len(), 4);
    for ancestor in ["/foo", "/foo/bar"] {
        let container = tree
            .get_node_with_path(ancestor)
            .ok_or(Error::ErrPathNotFound(ancestor.to_owned()))?;
        assert_eq!(container.access, AccessValues::NoValue);
        assert!(container.osc_type.is_none());
        assert!(container.value.is_none());
        assert!(container.contents.is_some());
    }

    let root = tree.root();
    let baz = root
        .child("foo")
        .and_then(|n| n.child("bar"))
        .and_then(|n| n.child("baz"));
    assert_eq!(baz, Some(&node));
    Ok(())
}

#[test]
fn test_add_node_rejects_bad_and_duplicate_paths() -> Result<()> {
    let mut tree = OscQueryTree::new();
    assert!(matches!(
        tree.add_node("nope", AccessValues::ReadOnly, Some("i"), None, None),
        Err(Error::ErrInvalidPath(_))
    ));

    tree.add_node(
        "/x",
        AccessValues::ReadOnly,
        Some("i"),
        Some(vec![OscValue::Int(1)]),
        None,
    )?;
    assert_eq!(
        tree.add_node("/x/", AccessValues::WriteOnly, Some("s"), None, None),
        Err(Error::ErrPathExists("/x".to_owned()))
    );
    assert_eq!(
        tree.add_node("/", AccessValues::WriteOnly, None, None, None),
        Err(Error::ErrPathExists("/".to_owned()))
    );

    let x = tree.get_node_with_path("/x");
    assert_eq!(x.as_ref().map(|n| n.access), Some(AccessValues::ReadOnly));
    assert_eq!(
        x.and_then(|n| n.value),
        Some(vec![OscValue::Int(1)])
    );
    Ok(())
}

#[test]
fn test_add_below_existing_leaf() -> Result<()> {
    let mut tree = OscQueryTree::new();
    tree.add_node("/synth", AccessValues::ReadWrite, Some("T"), None, None)?;
    tree.add_node("/synth/gain", AccessValues::ReadWrite, Some("f"), None, None)?;

    let synth = tree
        .get_node_with_path("/synth")
        .ok_or(Error::ErrPathNotFound("/synth".to_owned()))?;
    assert_eq!(synth.osc_type.as_deref(), Some("T"));
    assert!(synth.child("gain").is_some());
    Ok(())
}

#[test]
fn test_remove_node_keeps_ancestors() -> Result<()> {
    let mut tree = OscQueryTree::new();
    tree.add_node("/foo/bar/baz", AccessValues::ReadOnly, Some("i"), None, None)?;
    tree.add_node("/foo/bar/baz/deep", AccessValues::ReadOnly, Some("i"), None, None)?;
    tree.add_node("/foo/other", AccessValues::ReadOnly, Some("s"), None, None)?;

    assert!(tree.remove_node("/foo/bar/baz"));
    assert!(!tree.contains("/foo/bar/baz"));
    assert!(!tree.contains("/foo/bar/baz/deep"));
    assert!(tree.contains("/foo/bar"));
    assert!(tree.contains("/foo/other"));
    assert_eq!(tree.paths(), vec!["/", "/foo", "/foo/bar", "/foo/other"]);

    let bar = tree
        .get_node_with_path("/foo/bar")
        .ok_or(Error::ErrPathNotFound("/foo/bar".to_owned()))?;
    assert!(bar.contents.is_none());
    Ok(())
}

#[test]
fn test_remove_unknown_is_noop() -> Result<()> {
    let mut tree = OscQueryTree::new();
    tree.add_node("/a", AccessValues::ReadOnly, Some("i"), None, None)?;
    let before = tree.to_json()?;

    assert!(!tree.remove_node("/b"));
    assert!(!tree.remove_node("a"));
    assert!(!tree.remove_node("/"));
    assert_eq!(tree.to_json()?, before);
    Ok(())
}

#[test]
fn test_set_value_creates_bare_node() -> Result<()> {
    let mut tree = OscQueryTree::new();
    tree.add_node("/level", AccessValues::ReadWrite, Some("i"), None, None)?;
    tree.set_value("/level", vec![OscValue::Int(3)])?;
    assert_eq!(
        tree.get_node_with_path("/level").and_then(|n| n.value),
        Some(vec![OscValue::Int(3)])
    );

    tree.set_value("/late/bound", vec![OscValue::String("hi".to_owned())])?;
    let late = tree
        .get_node_with_path("/late/bound")
        .ok_or(Error::ErrPathNotFound("/late/bound".to_owned()))?;
    assert!(late.osc_type.is_none());
    assert_eq!(late.access, AccessValues::NoValue);
    assert_eq!(late.value, Some(vec![OscValue::String("hi".to_owned())]));
    assert!(tree.contains("/late"));

    assert!(tree.set_value("late", vec![]).is_err());
    Ok(())
}

#[test]
fn test_getter_runs_on_render_only() -> Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let mut tree = OscQueryTree::new();
    tree.add_node("/sensors/temp", AccessValues::ReadOnly, Some("f"), None, None)?;
    tree.set_getter(
        "/sensors/temp",
        ValueProvider::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            vec![OscValue::Float(21.5)]
        }),
    )?;
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let temp = tree.get_node_with_path("/sensors/temp");
    assert_eq!(temp.and_then(|n| n.value), Some(vec![OscValue::Float(21.5)]));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Serving a container renders its descendants too.
    let json = tree.to_json()?;
    assert!(json.contains("21.5"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    assert_eq!(
        tree.set_getter("/missing", ValueProvider::new(Vec::new)),
        Err(Error::ErrPathNotFound("/missing".to_owned()))
    );
    Ok(())
}

#[test]
fn test_json_omits_absent_fields() -> Result<()> {
    let mut tree = OscQueryTree::new();
    let node = tree.add_node("/x", AccessValues::ReadOnly, Some("i"), None, None)?;
    assert_eq!(
        serde_json::to_string(&node)?,
        r#"{"FULL_PATH":"/x","ACCESS":1,"TYPE":"i"}"#
    );

    let node = tree.add_node(
        "/y",
        AccessValues::ReadWrite,
        Some("i"),
        Some(vec![OscValue::Int(42)]),
        Some("answer"),
    )?;
    assert_eq!(
        node.to_string(),
        r#"{"DESCRIPTION":"answer","FULL_PATH":"/y","ACCESS":3,"TYPE":"i","VALUE":[42]}"#
    );
    Ok(())
}

#[test]
fn test_round_trip_rebuilds_index() -> Result<()> {
    let mut tree = OscQueryTree::new();
    tree.add_node(
        "/test/int",
        AccessValues::ReadOnly,
        Some("i"),
        Some(vec![OscValue::Int(7)]),
        None,
    )?;
    tree.add_node(
        "/test/pair",
        AccessValues::ReadWrite,
        Some("fs"),
        Some(vec![OscValue::Float(0.25), OscValue::String("x".to_owned())]),
        Some("two values"),
    )?;
    tree.add_node("/test/flag", AccessValues::WriteOnly, Some("T"), None, None)?;

    let rebuilt = OscQueryTree::from_json(&tree.to_json()?)?;
    assert_eq!(rebuilt.paths(), tree.paths());
    for path in tree.paths() {
        let want = tree.get_node_with_path(&path);
        let got = rebuilt.get_node_with_path(&path);
        assert_eq!(got, want, "node {path}");
    }

    let int = rebuilt
        .get_node_with_path("/test/int")
        .ok_or(Error::ErrPathNotFound("/test/int".to_owned()))?;
    assert_eq!(int.osc_type.as_deref(), Some("i"));
    assert_eq!(int.access, AccessValues::ReadOnly);
    assert_eq!(int.value, Some(vec![OscValue::Int(7)]));
    Ok(())
}

#[test]
fn test_from_json_derives_paths_from_keys() -> Result<()> {
    let json = r#"{
        "FULL_PATH": "/",
        "ACCESS": 0,
        "CONTENTS": {
            "mixer": {
                "FULL_PATH": "/wrong/place",
                "ACCESS": 0,
                "CONTENTS": {
                    "volume": {"FULL_PATH": "/mixer/volume", "ACCESS": 3, "TYPE": "f", "VALUE": [0.8]}
                }
            }
        }
    }"#;
    let tree = OscQueryTree::from_json(json)?;
    assert!(tree.contains("/mixer"));
    assert!(!tree.contains("/wrong/place"));

    let volume = tree
        .get_node_with_path("/mixer/volume")
        .ok_or(Error::ErrPathNotFound("/mixer/volume".to_owned()))?;
    assert_eq!(volume.value, Some(vec![OscValue::Float(0.8)]));
    assert_eq!(volume.access, AccessValues::ReadWrite);
    Ok(())
}

#[test]
fn test_from_json_rejects_non_root() {
    let json = r#"{"FULL_PATH": "/not/root", "ACCESS": 0}"#;
    assert_eq!(
        OscQueryTree::from_json(json).err(),
        Some(Error::ErrInvalidPath("/not/root".to_owned()))
    );
    assert!(matches!(
        OscQueryTree::from_json("{not json"),
        Err(Error::Json(_))
    ));
}
