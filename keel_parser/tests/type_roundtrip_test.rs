//! Property test: for every written type T, parse_type(format(T)) ≡ T

use keel_common::{CompilerContext, SourceBuffer, Span};
use keel_parser::{Flow, FuncTypeElem, FuncTypeTraits, Parser, TypeElem, TypeExpr};
use proptest::prelude::*;
use smallvec::SmallVec;

fn parse_type_str(text: &str) -> TypeExpr {
    let mut ctx = CompilerContext::new();
    let buffer = SourceBuffer::new("type.keel", text, 0);
    let tokens = keel_lexer::tokenize(&mut ctx, &buffer).expect("type did not lex");
    let mut parser = Parser::new(&mut ctx, tokens);
    parser.parse_type().expect("type did not parse")
}

fn base_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("int".to_string()),
        Just("long".to_string()),
        Just("ubyte".to_string()),
        Just("double".to_string()),
        Just("usize".to_string()),
        Just("Vec".to_string()),
        Just("Person".to_string()),
    ]
}

fn type_expr(depth: u32) -> BoxedStrategy<TypeExpr> {
    let leaf = base_name().prop_map(|name| TypeExpr::base(name, Span::none()));

    if depth == 0 {
        return leaf.boxed();
    }

    let func = (
        proptest::collection::vec(type_expr(depth - 1), 0..3),
        proptest::collection::vec(
            prop_oneof![Just(Flow::In), Just(Flow::Out), Just(Flow::InOut)],
            0..3,
        ),
        type_expr(depth - 1),
        any::<bool>(),
    )
        .prop_map(|(arg_types, mut arg_flows, return_type, variadic)| {
            arg_flows.resize(arg_types.len(), Flow::In);
            TypeExpr::new(
                SmallVec::from_vec(vec![TypeElem::Func(FuncTypeElem {
                    arg_types,
                    arg_flows,
                    return_type: Box::new(return_type),
                    traits: FuncTypeTraits { variadic, ..FuncTypeTraits::default() },
                })]),
                Span::none(),
            )
        });

    let terminal = prop_oneof![leaf, func];

    (
        proptest::collection::vec(
            prop_oneof![
                Just(TypeElem::Pointer),
                Just(TypeElem::Array),
                (0u64..1000).prop_map(TypeElem::FixedArray),
            ],
            0..4,
        ),
        terminal,
    )
        .prop_map(|(prefix, terminal)| {
            let mut elements: SmallVec<[TypeElem; 4]> = SmallVec::new();
            elements.extend(prefix);
            elements.extend(terminal.elements);
            TypeExpr::new(elements, Span::none())
        })
        .boxed()
}

proptest! {
    #[test]
    fn type_format_parse_round_trip(ty in type_expr(2)) {
        let formatted = ty.to_string();
        let reparsed = parse_type_str(&formatted);
        prop_assert!(
            ty.identical(&reparsed),
            "round trip failed: {} reparsed as {}",
            formatted,
            reparsed
        );
    }
}

#[test]
fn test_specific_round_trips() {
    for text in ["**ubyte", "*Person", "[]int", "8 ubyte", "func(int, long) double", "func() void"] {
        let ty = parse_type_str(text);
        let reparsed = parse_type_str(&ty.to_string());
        assert!(ty.identical(&reparsed), "round trip failed for {}", text);
    }
}
