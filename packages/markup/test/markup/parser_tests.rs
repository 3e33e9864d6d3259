//! Abstract tree parser tests.

#[cfg(test)]
mod tests {
    use stencil_markup::markup::ast::{AttrValue, Child, Element};
    use stencil_markup::markup::parse;

    fn parse_ok(source: &str) -> Element {
        parse(source).expect("parse")
    }

    mod structure {
        use super::*;

        #[test]
        fn parses_root_with_attributes_and_children() {
            let root = parse_ok(r#"<Window Caption="Main"><Label Caption="hi"/></Window>"#);
            assert_eq!(root.tag, "Window");
            assert_eq!(root.attributes.len(), 1);
            assert_eq!(root.attributes[0].name, "Caption");
            assert_eq!(
                root.attributes[0].value,
                AttrValue::Literal("Main".to_string())
            );
            assert_eq!(root.child_elements().count(), 1);
        }

        #[test]
        fn drops_whitespace_only_text() {
            let root = parse_ok("<Group>\n  <Label/>\n  <Label/>\n</Group>");
            assert_eq!(root.children.len(), 2);
            assert!(root.children.iter().all(|c| matches!(c, Child::Element(_))));
        }

        #[test]
        fn keeps_text_in_leaf_tags() {
            let root = parse_ok("<Label> hello </Label>");
            assert_eq!(root.children.len(), 1);
            match &root.children[0] {
                Child::Text(t) => assert_eq!(t.value, " hello "),
                other => panic!("expected text child, got {other:?}"),
            }
        }

        #[test]
        fn whitespace_variants_parse_to_same_shape() {
            let a = parse_ok("<Window><Label/></Window>");
            let b = parse_ok("<Window>\n\t<Label/>\n</Window>");
            assert_eq!(a.tag, b.tag);
            assert_eq!(a.children.len(), b.children.len());
        }
    }

    mod binding_classification {
        use super::*;

        #[test]
        fn brace_wrapped_value_is_a_binding() {
            let root = parse_ok(r#"<Label Caption="{Name}"/>"#);
            assert_eq!(
                root.attributes[0].value,
                AttrValue::Binding { path: "Name".to_string(), two_way: false }
            );
        }

        #[test]
        fn two_way_marker_sets_the_flag_and_is_stripped() {
            let root = parse_ok("<Slider Value=\"{\u{00B2}../y.Value}\"/>");
            assert_eq!(
                root.attributes[0].value,
                AttrValue::Binding { path: "../y.Value".to_string(), two_way: true }
            );
        }

        #[test]
        fn empty_braces_bind_to_the_data_source() {
            let root = parse_ok(r#"<ListBox Data="{}"/>"#);
            assert_eq!(
                root.attributes[0].value,
                AttrValue::Binding { path: String::new(), two_way: false }
            );
        }

        #[test]
        fn partially_braced_values_stay_literal() {
            let root = parse_ok(r#"<Label Caption="a{b}"/>"#);
            assert_eq!(root.attributes[0].value, AttrValue::Literal("a{b}".to_string()));
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn rejects_mismatched_closing_tag() {
            let err = parse("<Window></Label>").expect_err("mismatch");
            assert!(err.msg.contains("mismatched"));
        }

        #[test]
        fn rejects_unclosed_element() {
            let err = parse("<Window>").expect_err("unclosed");
            assert!(err.msg.contains("unclosed"));
        }

        #[test]
        fn rejects_two_root_elements() {
            let err = parse("<Label/><Label/>").expect_err("two roots");
            assert!(err.msg.contains("single root"));
        }

        #[test]
        fn rejects_duplicate_attributes() {
            let err = parse(r#"<Label Caption="a" Caption="b"/>"#).expect_err("duplicate");
            assert!(err.msg.contains("duplicate attribute"));
        }

        #[test]
        fn rejects_empty_document() {
            assert!(parse("   \n  ").is_err());
        }

        #[test]
        fn rejects_text_outside_root() {
            assert!(parse("junk <Label/>").is_err());
        }
    }

    mod serialization {
        use super::*;

        #[test]
        fn tree_round_trips_through_serde() {
            let root = parse_ok(r#"<Window Caption="{Title}"><Label>hi</Label></Window>"#);
            let json = serde_json::to_string(&root).expect("serialize");
            let back: Element = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(root, back);
        }
    }
}
