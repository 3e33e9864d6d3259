//! Item template engine tests: compilation, expansion, counting.

#[path = "../util/mod.rs"]
mod util;

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::util::{register_data_types, test_registry, Bag, Contact, Folder};
    use stencil_markup::graph::{execute, find_by_name, get_property, resolve_bindings, NodeRef};
    use stencil_markup::binding::BindingOptions;
    use stencil_markup::markup::parse;
    use stencil_markup::program::compile;
    use stencil_markup::reflect::{DataRef, Value};
    use stencil_markup::template::{
        FetchPath, ItemTemplate, TemplateError, TemplateSet, DATA_PROPERTY,
    };

    const ITEM: &str = r#"<Label Caption="{Name}"/>"#;
    const HOST: &str = r#"<Expander Caption="Files"><ListBox Name="List"/></Expander>"#;

    fn host_with(data: DataRef) -> NodeRef {
        let registry = test_registry();
        let program = compile(&parse(HOST).expect("parse"), &registry).expect("compile");
        execute(&program, Some(data))
    }

    fn folder_of(names: &[&str]) -> Rc<Folder> {
        let items = names
            .iter()
            .map(|n| Value::Object(Folder::new(n, Vec::new())))
            .collect();
        Folder::new("root", items)
    }

    mod compilation {
        use super::*;

        #[test]
        fn parses_fetch_paths() {
            assert_eq!(FetchPath::parse("self"), FetchPath::SelfData);
            assert_eq!(FetchPath::parse("Items"), FetchPath::Member("Items".to_string()));
        }

        #[test]
        fn compiles_template_markup() {
            register_data_types();
            let registry = test_registry();
            let template = ItemTemplate::compile(ITEM, &registry, Some("Folder"), "Items")
                .expect("compile");
            assert_eq!(template.data_type(), Some("Folder"));
            assert_eq!(template.fetch(), &FetchPath::Member("Items".to_string()));
        }

        #[test]
        fn rejects_unknown_fetch_member_on_a_registered_type() {
            register_data_types();
            let registry = test_registry();
            let err = ItemTemplate::compile(ITEM, &registry, Some("Folder"), "Zilch")
                .expect_err("unknown member");
            assert!(matches!(
                err,
                TemplateError::UnknownFetchMember { type_name, member }
                    if type_name == "Folder" && member == "Zilch"
            ));
        }

        #[test]
        fn template_markup_errors_surface_as_compile_errors() {
            let registry = test_registry();
            let err = ItemTemplate::compile("<Blimp/>", &registry, None, "Items")
                .expect_err("bad markup");
            assert!(matches!(err, TemplateError::Compile(_)));
        }
    }

    mod expansion {
        use super::*;

        #[test]
        fn assigns_fetched_data_to_the_list_descendant() {
            register_data_types();
            let registry = test_registry();
            let folder = folder_of(&["a", "b"]);
            let host = host_with(folder.clone());
            let template =
                Rc::new(ItemTemplate::compile(ITEM, &registry, None, "Items").expect("compile"));
            host.borrow_mut().set_templates(TemplateSet::build([Rc::clone(&template)]));

            let expand = template.bind_expansion(&host);
            expand().expect("expand");

            let list = find_by_name(&host, "List").expect("list");
            match get_property(&list, DATA_PROPERTY) {
                Some(Value::List(items)) => assert_eq!(items.len(), 2),
                other => panic!("expected list, got {other:?}"),
            }
        }

        #[test]
        fn propagates_the_template_catalogue_to_the_descendant() {
            register_data_types();
            let registry = test_registry();
            let host = host_with(folder_of(&["a"]));
            let template =
                Rc::new(ItemTemplate::compile(ITEM, &registry, None, "Items").expect("compile"));
            let set = TemplateSet::build([Rc::clone(&template)]);
            host.borrow_mut().set_templates(Rc::clone(&set));

            template.bind_expansion(&host)().expect("expand");

            let list = find_by_name(&host, "List").expect("list");
            let propagated = list.borrow().templates().cloned().expect("templates");
            assert!(Rc::ptr_eq(&propagated, &set));
        }

        #[test]
        fn expansion_is_idempotent() {
            register_data_types();
            let registry = test_registry();
            let folder = folder_of(&["a", "b"]);
            let host = host_with(folder.clone());
            let template =
                Rc::new(ItemTemplate::compile(ITEM, &registry, None, "Items").expect("compile"));

            let expand = template.bind_expansion(&host);
            expand().expect("first");
            expand().expect("second");
            assert_eq!(folder.fetch_count.get(), 1);
        }

        #[test]
        fn self_fetch_reuses_the_data_source_unchanged() {
            register_data_types();
            let registry = test_registry();
            let folder: DataRef = folder_of(&["a"]);
            let host = host_with(Rc::clone(&folder));
            let template =
                Rc::new(ItemTemplate::compile(ITEM, &registry, None, "self").expect("compile"));

            template.bind_expansion(&host)().expect("expand");

            let list = find_by_name(&host, "List").expect("list");
            match get_property(&list, DATA_PROPERTY) {
                Some(Value::Object(o)) => assert!(Rc::ptr_eq(&o, &folder)),
                other => panic!("expected the data source itself, got {other:?}"),
            }
        }

        #[test]
        fn missing_list_descendant_is_an_error() {
            register_data_types();
            let registry = test_registry();
            let program = compile(&parse("<Group/>").expect("parse"), &registry).expect("compile");
            let host = execute(&program, Some(folder_of(&["a"]) as DataRef));
            let template =
                Rc::new(ItemTemplate::compile(ITEM, &registry, None, "Items").expect("compile"));

            let err = template.bind_expansion(&host)().expect_err("no list");
            assert!(matches!(err, TemplateError::MissingListSlot));
        }
    }

    mod counting {
        use super::*;

        #[test]
        fn count_reflects_collection_emptiness() {
            register_data_types();
            let registry = test_registry();
            let template =
                Rc::new(ItemTemplate::compile(ITEM, &registry, None, "Items").expect("compile"));
            let count = template.count_proc();

            let full = host_with(folder_of(&["a"]));
            let empty = host_with(folder_of(&[]));
            assert!(count(&full));
            assert!(!count(&empty));
        }

        #[test]
        fn count_does_not_expand() {
            register_data_types();
            let registry = test_registry();
            let host = host_with(folder_of(&["a"]));
            let template =
                Rc::new(ItemTemplate::compile(ITEM, &registry, None, "Items").expect("compile"));

            assert!(template.count_proc()(&host));
            let list = find_by_name(&host, "List").expect("list");
            assert_eq!(get_property(&list, DATA_PROPERTY), Some(Value::Null));
        }

        #[test]
        fn count_uses_the_item_count_capability() {
            register_data_types();
            let registry = test_registry();
            let template =
                Rc::new(ItemTemplate::compile(ITEM, &registry, None, "self").expect("compile"));
            let count = template.count_proc();

            assert!(count(&host_with(Rc::new(Bag { size: 3 }))));
            assert!(!count(&host_with(Rc::new(Bag { size: 0 }))));
        }
    }

    mod catalogue {
        use super::*;

        #[test]
        fn selects_by_type_name_with_default_fallback() {
            register_data_types();
            let registry = test_registry();
            let typed = Rc::new(
                ItemTemplate::compile(ITEM, &registry, Some("Folder"), "Items").expect("compile"),
            );
            let fallback =
                Rc::new(ItemTemplate::compile(ITEM, &registry, None, "self").expect("compile"));
            let set = TemplateSet::build([Rc::clone(&typed), Rc::clone(&fallback)]);

            assert!(Rc::ptr_eq(set.select("Folder").expect("typed"), &typed));
            assert!(Rc::ptr_eq(set.select("Contact").expect("fallback"), &fallback));
            let folder: DataRef = folder_of(&[]);
            assert!(Rc::ptr_eq(set.select_for(&folder).expect("typed"), &typed));
        }

        #[test]
        fn instantiates_independent_item_graphs() {
            register_data_types();
            let registry = test_registry();
            let template =
                Rc::new(ItemTemplate::compile(ITEM, &registry, None, "Items").expect("compile"));

            let ada = Contact::new("Ada", 36);
            let row_a = template.instantiate(Some(ada.clone()));
            let row_b = template.instantiate(Some(Contact::new("Grace", 45)));
            assert!(!Rc::ptr_eq(&row_a, &row_b));

            resolve_bindings(&row_a, &BindingOptions::default()).expect("resolve");
            assert_eq!(get_property(&row_a, "Caption"), Some(Value::Str("Ada".to_string())));
        }
    }

    mod recursion {
        use super::*;

        #[test]
        fn nested_hosts_expand_with_the_shared_catalogue() {
            register_data_types();
            let registry = test_registry();
            let inner = folder_of(&["leaf"]);
            let outer = Folder::new("outer", vec![Value::Object(inner.clone())]);

            let template =
                Rc::new(ItemTemplate::compile(HOST, &registry, None, "Items").expect("compile"));
            let set = TemplateSet::build([Rc::clone(&template)]);

            // Outer host expands its children…
            let outer_host = host_with(outer);
            outer_host.borrow_mut().set_templates(Rc::clone(&set));
            template.bind_expansion(&outer_host)().expect("outer expand");

            // …and a nested host stamped for one child reuses the same
            // catalogue through the propagated reference.
            let nested = template.instantiate(Some(inner as DataRef));
            let list = find_by_name(&outer_host, "List").expect("list");
            nested.borrow_mut().set_templates(
                list.borrow().templates().cloned().expect("propagated catalogue"),
            );
            template.bind_expansion(&nested)().expect("nested expand");

            let nested_list = find_by_name(&nested, "List").expect("nested list");
            match get_property(&nested_list, DATA_PROPERTY) {
                Some(Value::List(items)) => assert_eq!(items.len(), 1),
                other => panic!("expected list, got {other:?}"),
            }
        }
    }

    #[test]
    fn unregistered_data_source_is_a_dynamic_fetch_error() {
        let registry = test_registry();
        struct Mystery;
        impl stencil_markup::reflect::DataObject for Mystery {
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
            fn type_name(&self) -> &'static str {
                "Mystery"
            }
        }
        let host = host_with(Rc::new(Mystery));
        let template =
            Rc::new(ItemTemplate::compile(ITEM, &registry, None, "Items").expect("compile"));
        let err = template.bind_expansion(&host)().expect_err("dynamic fetch");
        assert!(matches!(err, TemplateError::UnknownFetchMember { .. }));
    }
}
