//! Tests for response document generation
//!
//! These tests verify:
//! - A realistic response description renders line for line
//! - Documents parse as XML with the expected structure
//! - Leaf, empty-collection and deferred-value rules

use iminstall::markup::{render_document, serialize, ConfigNode, ConfigValue, MarkupError, RESPONSE_ROOT};
use std::cell::Cell;
use std::rc::Rc;

fn was_response() -> ConfigNode {
    ConfigNode::new()
        .with("clean", true)
        .with("temporary", false)
        .with(
            "server",
            ConfigNode::new().with(
                "repository",
                ConfigValue::list([
                    ConfigNode::new().with("location", "/mnt/was/repository.config"),
                    ConfigNode::new().with("location", "/mnt/was-fp/repository.config"),
                ]),
            ),
        )
        .with(
            "profile",
            ConfigNode::new()
                .with("id", "IBM WebSphere Application Server V8.5")
                .with("installLocation", "/opt/IBM/WebSphere/AppServer")
                .with(
                    "data",
                    ConfigValue::list([ConfigNode::new()
                        .with("key", "eclipseLocation")
                        .with("value", "/opt/IBM/WebSphere/AppServer")]),
                ),
        )
        .with(
            "install",
            ConfigNode::new().with("modify", false).with(
                "offering",
                ConfigValue::list([ConfigNode::new()
                    .with("id", "com.ibm.websphere.ND.v85")
                    .with("profile", "IBM WebSphere Application Server V8.5")
                    .with("features", "core.feature,ejbdeploy")]),
            ),
        )
        .with(
            "preference",
            ConfigValue::list([ConfigNode::new()
                .with("name", "com.ibm.cic.common.core.preferences.eclipseCache")
                .with("value", "/opt/IBM/IMShared")]),
        )
}

#[test]
fn test_response_document_renders_line_for_line() {
    let doc = render_document(RESPONSE_ROOT, &was_response()).unwrap();
    let expected = [
        r#"  <agent-input clean="true" temporary="false">"#,
        r#"    <server>"#,
        r#"      <repository location="/mnt/was/repository.config"/>"#,
        r#"      <repository location="/mnt/was-fp/repository.config"/>"#,
        r#"    </server>"#,
        r#"    <profile id="IBM WebSphere Application Server V8.5" installLocation="/opt/IBM/WebSphere/AppServer">"#,
        r#"      <data key="eclipseLocation" value="/opt/IBM/WebSphere/AppServer"/>"#,
        r#"    </profile>"#,
        r#"    <install modify="false">"#,
        r#"      <offering id="com.ibm.websphere.ND.v85" profile="IBM WebSphere Application Server V8.5" features="core.feature,ejbdeploy"/>"#,
        r#"    </install>"#,
        r#"    <preference name="com.ibm.cic.common.core.preferences.eclipseCache" value="/opt/IBM/IMShared"/>"#,
        r#"  </agent-input>"#,
    ];
    assert_eq!(doc.lines().collect::<Vec<_>>(), expected);
}

#[test]
fn test_response_document_is_well_formed() {
    let doc = render_document(RESPONSE_ROOT, &was_response()).unwrap();
    let parsed = roxmltree::Document::parse(&doc).expect("generated document should parse");
    let root = parsed.root_element();

    assert_eq!(root.tag_name().name(), "agent-input");
    assert_eq!(root.attribute("clean"), Some("true"));

    let children: Vec<&str> = root
        .children()
        .filter(|n| n.is_element())
        .map(|n| n.tag_name().name())
        .collect();
    assert_eq!(children, vec!["server", "profile", "install", "preference"]);

    let repositories = root
        .descendants()
        .filter(|n| n.has_tag_name("repository"))
        .count();
    assert_eq!(repositories, 2);
}

#[test]
fn test_leaf_with_no_attributes_is_single_self_terminating_line() {
    let lines = serialize("    ", "server", &ConfigNode::new()).unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].as_str(), "    <server/>");
}

#[test]
fn test_empty_collection_is_never_omitted() {
    let node = ConfigNode::new()
        .with("repository", ConfigValue::List(Vec::new()))
        .with("offering", ConfigValue::list([ConfigNode::new().with("id", "x")]));
    let lines: Vec<String> = serialize("", "install", &node)
        .unwrap()
        .into_iter()
        .map(|l| l.into_string())
        .collect();
    assert_eq!(
        lines,
        vec!["<install>", "  <repository/>", r#"  <offering id="x"/>"#, "</install>"]
    );
}

#[test]
fn test_each_serialization_evaluates_deferred_once() {
    let calls = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&calls);
    let node = ConfigNode::new()
        .with(
            "eclipseLocation",
            ConfigValue::deferred(move || {
                counter.set(counter.get() + 1);
                format!("/opt/IBM/{}", counter.get())
            }),
        )
        .with("nested", ConfigNode::new().with("a", 1));

    assert_eq!(calls.get(), 0);
    let first = serialize("", "profile", &node).unwrap();
    assert_eq!(calls.get(), 1);
    assert_eq!(first[0].as_str(), r#"<profile eclipseLocation="/opt/IBM/1">"#);

    serialize("", "profile", &node).unwrap();
    assert_eq!(calls.get(), 2);
}

#[test]
fn test_invalid_tree_produces_no_output() {
    let node = ConfigNode::new()
        .with("ok", ConfigNode::new().with("a", 1))
        .with(
            "bad",
            ConfigValue::List(vec![ConfigValue::from("text"), ConfigValue::Node(ConfigNode::new())]),
        );
    match serialize("", "root", &node) {
        Err(MarkupError::InvalidNode { path, .. }) => assert_eq!(path, "root.bad[1]"),
        other => panic!("expected InvalidNode, got {:?}", other),
    }
}

#[test]
fn test_json_description_renders_in_authored_order() {
    let json: serde_json::Value = serde_json::from_str(
        r#"{
            "server": {"repository": [{"location": "/repo"}]},
            "acceptLicense": true,
            "install": {"offering": [{"id": "com.ibm.was", "features": "core"}]},
            "clean": false,
            "preference": []
        }"#,
    )
    .unwrap();
    let node = ConfigNode::try_from(&json).unwrap();
    let doc = render_document(RESPONSE_ROOT, &node).unwrap();
    assert_eq!(
        doc,
        concat!(
            "  <agent-input acceptLicense=\"true\" clean=\"false\">\n",
            "    <server>\n",
            "      <repository location=\"/repo\"/>\n",
            "    </server>\n",
            "    <install>\n",
            "      <offering id=\"com.ibm.was\" features=\"core\"/>\n",
            "    </install>\n",
            "    <preference/>\n",
            "  </agent-input>\n",
        )
    );
}
