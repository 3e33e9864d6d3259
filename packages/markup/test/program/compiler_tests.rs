//! Instantiation compiler and program cache tests.

#[path = "../util/mod.rs"]
mod util;

#[cfg(test)]
mod tests {
    use super::util::test_registry;
    use stencil_markup::markup::parse;
    use stencil_markup::program::{compile, CompileError, ProgramCache, Step};
    use stencil_markup::reflect::Literal;

    fn compile_ok(source: &str) -> stencil_markup::Program {
        let registry = test_registry();
        compile(&parse(source).expect("parse"), &registry).expect("compile")
    }

    fn compile_err(source: &str) -> CompileError {
        let registry = test_registry();
        compile(&parse(source).expect("parse"), &registry).expect_err("compile error")
    }

    mod step_emission {
        use super::*;

        #[test]
        fn emits_create_set_attach_pop() {
            let program = compile_ok(r#"<Window Caption="Main"><Label Caption="hi"/></Window>"#);
            let steps = program.steps();
            assert_eq!(steps.len(), 6);
            assert!(matches!(&steps[0], Step::CreateNode(c) if c.name == "Window"));
            assert!(matches!(
                &steps[1],
                Step::SetLiteral { property, value: Literal::Str(v) }
                    if property == "Caption" && v == "Main"
            ));
            assert!(matches!(&steps[2], Step::CreateNode(c) if c.name == "Label"));
            assert!(matches!(&steps[3], Step::SetLiteral { property, .. } if property == "Caption"));
            assert!(matches!(&steps[4], Step::AttachChild));
            assert!(matches!(&steps[5], Step::PopScope));
        }

        #[test]
        fn converts_literals_to_declared_kinds() {
            let program = compile_ok(r#"<Slider Value="2.5" Maximum="10"/>"#);
            assert!(matches!(
                &program.steps()[1],
                Step::SetLiteral { value: Literal::Float(v), .. } if *v == 2.5
            ));
            assert!(matches!(
                &program.steps()[2],
                Step::SetLiteral { value: Literal::Float(v), .. } if *v == 10.0
            ));
        }

        #[test]
        fn emits_register_binding_without_resolving() {
            let program = compile_ok(r#"<Slider Value="{../y.Value}"/>"#);
            assert!(matches!(
                &program.steps()[1],
                Step::RegisterBinding { property, expression, two_way: false }
                    if property == "Value" && expression == "../y.Value"
            ));
        }

        #[test]
        fn two_way_marker_reaches_the_step() {
            let program = compile_ok("<Slider Value=\"{\u{00B2}Level}\"/>");
            assert!(matches!(
                &program.steps()[1],
                Step::RegisterBinding { two_way: true, .. }
            ));
        }

        #[test]
        fn name_attribute_becomes_register_name() {
            let program = compile_ok(r#"<Label Name="title"/>"#);
            assert!(matches!(&program.steps()[1], Step::RegisterName(n) if n == "title"));
        }

        #[test]
        fn text_content_fills_the_declared_text_slot() {
            let program = compile_ok("<Label>hello</Label>");
            assert!(matches!(
                &program.steps()[1],
                Step::SetLiteral { property, value: Literal::Str(v) }
                    if property == "Caption" && v == "hello"
            ));
        }
    }

    mod determinism {
        use super::*;

        #[test]
        fn identical_sources_compile_to_identical_programs() {
            let registry = test_registry();
            let source = r#"<Window Caption="x"><Label Name="l" Caption="{T}"/></Window>"#;
            let a = compile(&parse(source).expect("parse"), &registry).expect("compile");
            let b = compile(&parse(source).expect("parse"), &registry).expect("compile");
            assert_eq!(a, b);
        }

        #[test]
        fn whitespace_variants_compile_to_identical_programs() {
            let registry = test_registry();
            let a = compile(
                &parse("<Window><Label Caption=\"hi\"/></Window>").expect("parse"),
                &registry,
            )
            .expect("compile");
            let b = compile(
                &parse("<Window>\n    <Label Caption=\"hi\"/>\n</Window>").expect("parse"),
                &registry,
            )
            .expect("compile");
            assert_eq!(a, b);
        }
    }

    mod validation {
        use super::*;

        #[test]
        fn unknown_tag_is_an_unknown_type_error() {
            assert!(matches!(
                compile_err("<Blimp/>"),
                CompileError::UnknownType { tag, .. } if tag == "Blimp"
            ));
        }

        #[test]
        fn unknown_attribute_is_an_unknown_property_error() {
            assert!(matches!(
                compile_err(r#"<Label Flavor="mint"/>"#),
                CompileError::UnknownProperty { property, .. } if property == "Flavor"
            ));
        }

        #[test]
        fn bad_literal_is_a_conversion_error() {
            assert!(matches!(
                compile_err(r#"<Window Width="wide"/>"#),
                CompileError::Conversion { property, value, .. }
                    if property == "Width" && value == "wide"
            ));
        }

        #[test]
        fn duplicate_names_are_rejected() {
            assert!(matches!(
                compile_err(r#"<Group><Label Name="a"/><Label Name="a"/></Group>"#),
                CompileError::DuplicateName { name, .. } if name == "a"
            ));
        }

        #[test]
        fn children_on_a_childless_class_are_rejected() {
            assert!(matches!(
                compile_err("<Label><Label/></Label>"),
                CompileError::UnknownProperty { property, .. } if property == "Content"
            ));
        }

        #[test]
        fn second_child_of_a_single_child_class_is_rejected() {
            assert!(matches!(
                compile_err("<Window><Label/><Label/></Window>"),
                CompileError::UnknownProperty { property, class, .. }
                    if property == "Content" && class == "Window"
            ));
        }

        #[test]
        fn text_on_a_class_without_text_slot_is_rejected() {
            assert!(matches!(
                compile_err("<Group>stray</Group>"),
                CompileError::UnknownProperty { property, .. } if property == "Text"
            ));
        }
    }

    mod cache {
        use super::*;

        #[test]
        fn cache_hit_returns_the_same_program() {
            let registry = test_registry();
            let cache = ProgramCache::new();
            let source = r#"<Label Caption="hi"/>"#;
            let a = cache.compile(source, &registry).expect("compile");
            let b = cache.compile(source, &registry).expect("compile");
            assert!(std::sync::Arc::ptr_eq(&a, &b));
            assert_eq!(cache.len(), 1);
        }

        #[test]
        fn failed_compiles_never_touch_the_cache() {
            let registry = test_registry();
            let cache = ProgramCache::new();
            let good = r#"<Label Caption="hi"/>"#;
            cache.compile(good, &registry).expect("compile");

            assert!(cache.compile("<Blimp/>", &registry).is_err());
            assert!(cache.compile("<Label Caption=", &registry).is_err());

            assert_eq!(cache.len(), 1);
            assert!(cache.get(good).is_some());
            assert!(cache.get("<Blimp/>").is_none());
        }
    }

    mod sharing {
        use super::*;

        #[test]
        fn programs_are_send_and_sync() {
            fn assert_send_sync<T: Send + Sync>() {}
            assert_send_sync::<stencil_markup::Program>();
        }
    }
}
