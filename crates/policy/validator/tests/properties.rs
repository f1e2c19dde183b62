use std::sync::Arc;

use policy_types::{Assertion, AssertionKind, PolicyValidationContext};
use policy_validator::{
    MockFragmentLookup, MockLicenseOracle, MockPathBuilder, PolicyValidator, ValidatorRegistry,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Shape {
    Leaf(u8),
    All(Vec<Shape>),
    Or(Vec<Shape>),
}

fn leaf(index: u8) -> Arc<Assertion> {
    let kind = match index % 9 {
        0 => AssertionKind::HttpBasic,
        1 => AssertionKind::HttpDigest,
        2 => AssertionKind::SpecificUser {
            provider: "internal".into(),
            login: "alice".into(),
        },
        3 => AssertionKind::HttpRouting {
            url: Some("http://backend.example.com/service".into()),
            custom_urls: vec![],
            attach_saml_sender_vouches: false,
        },
        4 => AssertionKind::True,
        5 => AssertionKind::False,
        6 => AssertionKind::Ssl {
            require_client_cert: false,
        },
        7 => AssertionKind::SetVariable {
            name: "reply".into(),
            expression: "${undeclared}".into(),
        },
        _ => AssertionKind::EchoRouting,
    };
    Assertion::leaf(kind)
}

fn build(shape: &Shape) -> Arc<Assertion> {
    match shape {
        Shape::Leaf(index) => leaf(*index),
        Shape::All(children) => Assertion::all(children.iter().map(build)).unwrap(),
        Shape::Or(children) => Assertion::one_or_more(children.iter().map(build)).unwrap(),
    }
}

fn shape() -> impl Strategy<Value = Shape> {
    let leaf = any::<u8>().prop_map(Shape::Leaf);
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Shape::All),
            prop::collection::vec(inner, 1..4).prop_map(Shape::Or),
        ]
    })
}

proptest! {
    #[test]
    fn validation_is_idempotent(shape in shape()) {
        let root = Assertion::all(vec![build(&shape)]).unwrap();
        let validator = PolicyValidator::new(
            Arc::new(MockPathBuilder::new()),
            Arc::new(MockFragmentLookup::new()),
        )
        .with_registry(Arc::new(ValidatorRegistry::with_defaults()));
        let context = PolicyValidationContext::soap_service();
        let license = MockLicenseOracle::allow_all();

        let first = validator.validate(&root, &context, &license).unwrap();
        let second = validator.validate(&root, &context, &license).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn every_diagnostic_names_a_node_of_the_tree(shape in shape()) {
        let root = Assertion::all(vec![build(&shape)]).unwrap();
        let validator = PolicyValidator::new(
            Arc::new(MockPathBuilder::new()),
            Arc::new(MockFragmentLookup::new()),
        )
        .with_registry(Arc::new(ValidatorRegistry::with_defaults()));
        let result = validator
            .validate(
                &root,
                &PolicyValidationContext::soap_service(),
                &MockLicenseOracle::allow_all(),
            )
            .unwrap();

        let mut nodes = Vec::new();
        let mut stack = vec![root.clone()];
        while let Some(node) = stack.pop() {
            stack.extend(node.children().iter().cloned());
            nodes.push(node);
        }
        for (_, diagnostic) in result.iter() {
            prop_assert!(nodes.iter().any(|n| diagnostic.concerns(n)));
        }
    }
}
