//! Parser integration tests

use keel_common::{CompileError, CompilerContext, SourceBuffer};
use keel_parser::*;

fn parse_source(source: &str) -> Ast {
    let mut ctx = CompilerContext::new();
    parse_source_with(&mut ctx, source).expect("parse failed")
}

fn parse_source_with(ctx: &mut CompilerContext, source: &str) -> Result<Ast, CompileError> {
    let buffer = SourceBuffer::new("test.keel", source, 0);
    let tokens = keel_lexer::tokenize(ctx, &buffer)?;
    parse(ctx, tokens)
}

fn parse_err(source: &str) -> CompileError {
    let mut ctx = CompilerContext::new();
    parse_source_with(&mut ctx, source).expect_err("parse should fail")
}

#[test]
fn test_empty_main() {
    let ast = parse_source("func main { }\n");
    assert_eq!(ast.funcs.len(), 1);
    let main = &ast.funcs[0];
    assert_eq!(main.name, "main");
    assert!(main.traits.main);
    assert!(main.return_type.is_void());
    assert!(main.statements.is_empty());
}

#[test]
fn test_function_with_args_and_return() {
    let ast = parse_source("func add(a int, b long) long {\n    return a + b\n}\n");
    let add = &ast.funcs[0];
    assert_eq!(add.arg_names, vec!["a", "b"]);
    assert!(add.arg_types[0].is_base_of("int"));
    assert!(add.arg_types[1].is_base_of("long"));
    assert!(add.return_type.is_base_of("long"));

    match &add.statements[0].kind {
        StmtKind::Return(Some(expr)) => match &expr.kind {
            ExprKind::Binary { op: BinaryOp::Add, .. } => {}
            other => panic!("expected addition, got {:?}", other),
        },
        other => panic!("expected return, got {:?}", other),
    }
}

#[test]
fn test_argument_flows_and_pod() {
    let ast = parse_source("func f(in a int, out b *int, inout c long, d POD Vec) { }\n");
    let f = &ast.funcs[0];
    assert_eq!(f.arg_flows, vec![Flow::In, Flow::Out, Flow::InOut, Flow::In]);
    assert!(!f.arg_type_traits[0].pod);
    assert!(f.arg_type_traits[3].pod);
}

#[test]
fn test_foreign_function_and_library() {
    let ast = parse_source("foreign puts(*ubyte) int\nforeign printf(*ubyte, ...) int\nforeign 'libcustom.a'\n");
    assert_eq!(ast.funcs.len(), 2);
    assert!(ast.funcs[0].traits.foreign);
    assert!(!ast.funcs[0].traits.variadic);
    assert!(ast.funcs[1].traits.variadic);
    assert_eq!(ast.libraries.len(), 1);
    assert_eq!(ast.libraries[0].name, "libcustom.a");
}

#[test]
fn test_struct_declaration() {
    let ast = parse_source("struct Person (name *ubyte, age int)\npacked struct Header (tag ubyte, length usize)\n");
    assert_eq!(ast.structs.len(), 2);
    assert!(!ast.structs[0].packed);
    assert_eq!(ast.structs[0].field_names, vec!["name", "age"]);
    assert!(ast.structs[1].packed);
    assert_eq!(ast.structs[1].find_field("length"), Some(1));
}

#[test]
fn test_alias_global_constant_enum() {
    let ast = parse_source(
        "alias Cstr = *ubyte\ncounter int = 0\nexternal errno int\nconst LIMIT = 100\nenum Color (Red, Green, Blue)\n",
    );
    assert_eq!(ast.aliases[0].name, "Cstr");
    assert_eq!(ast.globals.len(), 2);
    assert!(ast.globals[0].initial.is_some());
    assert!(ast.globals[1].external);
    assert_eq!(ast.constants[0].name, "LIMIT");
    assert_eq!(ast.enums[0].kinds, vec!["Red", "Green", "Blue"]);
}

#[test]
fn test_alias_rejects_reserved_name() {
    assert!(matches!(
        parse_err("alias usize = ulong\n"),
        CompileError::Parse { .. }
    ));
}

#[test]
fn test_struct_rejects_reserved_name() {
    assert!(matches!(
        parse_err("struct int (x long)\n"),
        CompileError::Parse { .. }
    ));
}

#[test]
fn test_precedence_shape() {
    // a + b * c < d and e  parses as  ((a + (b * c)) < d) and e
    let ast = parse_source("func f bool {\n    return a + b * c < d and e\n}\n");
    let ret = &ast.funcs[0].statements[0];
    let StmtKind::Return(Some(expr)) = &ret.kind else { panic!() };

    let ExprKind::Binary { op: BinaryOp::And, a, .. } = &expr.kind else {
        panic!("expected 'and' at the top, got {:?}", expr.kind);
    };
    let ExprKind::Binary { op: BinaryOp::LessThan, a, .. } = &a.kind else {
        panic!("expected '<' below 'and'");
    };
    let ExprKind::Binary { op: BinaryOp::Add, b, .. } = &a.kind else {
        panic!("expected '+' below '<'");
    };
    assert!(matches!(
        &b.kind,
        ExprKind::Binary { op: BinaryOp::Multiply, .. }
    ));
}

#[test]
fn test_postfix_chains() {
    let ast = parse_source("func f {\n    items[0].owner.rename('x')\n}\n");
    let StmtKind::Call(expr) = &ast.funcs[0].statements[0].kind else { panic!() };
    let ExprKind::MethodCall { value, name, args } = &expr.kind else {
        panic!("expected method call, got {:?}", expr.kind);
    };
    assert_eq!(name, "rename");
    assert_eq!(args.len(), 1);
    let ExprKind::Member { value, field } = &value.kind else { panic!() };
    assert_eq!(field, "owner");
    assert!(matches!(&value.kind, ExprKind::ArrayIndex { .. }));
}

#[test]
fn test_statement_position_restriction() {
    assert!(matches!(
        parse_err("func f {\n    1 + 2\n}\n"),
        CompileError::Parse { .. }
    ));
}

#[test]
fn test_address_of_requires_lvalue() {
    assert!(matches!(
        parse_err("func f {\n    x *int = &5\n}\n"),
        CompileError::Parse { .. }
    ));
    parse_source("func f {\n    x *int = &y.field\n}\n");
}

#[test]
fn test_declarations_and_assignment_forms() {
    let ast = parse_source(
        "func f {\n    x int\n    y int = 5\n    z int = undef\n    x = 1\n    x += 2\n    *p = 3\n}\n",
    );
    let stmts = &ast.funcs[0].statements;
    assert!(matches!(
        &stmts[0].kind,
        StmtKind::Declare { value: None, undef: false, .. }
    ));
    assert!(matches!(
        &stmts[1].kind,
        StmtKind::Declare { value: Some(_), undef: false, .. }
    ));
    assert!(matches!(
        &stmts[2].kind,
        StmtKind::Declare { value: None, undef: true, .. }
    ));
    assert!(matches!(&stmts[3].kind, StmtKind::Assign { .. }));
    assert!(matches!(
        &stmts[4].kind,
        StmtKind::CompoundAssign { op: BinaryOp::Add, .. }
    ));
    assert!(matches!(&stmts[5].kind, StmtKind::Assign { .. }));
}

#[test]
fn test_control_flow_statements() {
    let ast = parse_source(
        "func f {\n    if a { }\n    unless b { } else { }\n    while c { break }\n    until outer: d {\n        continue outer\n    }\n}\n",
    );
    let stmts = &ast.funcs[0].statements;
    assert!(matches!(&stmts[0].kind, StmtKind::If { .. }));
    assert!(matches!(&stmts[1].kind, StmtKind::UnlessElse { .. }));
    let StmtKind::While { label: None, body, .. } = &stmts[2].kind else { panic!() };
    assert!(matches!(&body[0].kind, StmtKind::Break));
    let StmtKind::Until { label: Some(label), body, .. } = &stmts[3].kind else { panic!() };
    assert_eq!(label, "outer");
    assert!(matches!(&body[0].kind, StmtKind::ContinueTo(l) if l == "outer"));
}

#[test]
fn test_else_if_chain() {
    let ast = parse_source("func f {\n    if a { } else if b { } else { }\n}\n");
    let StmtKind::IfElse { else_body, .. } = &ast.funcs[0].statements[0].kind else { panic!() };
    assert!(matches!(&else_body[0].kind, StmtKind::IfElse { .. }));
}

#[test]
fn test_defer_and_delete() {
    let ast = parse_source("func f {\n    defer puts('bye')\n    p *int = new int\n    delete p\n}\n");
    let stmts = &ast.funcs[0].statements;
    let StmtKind::Defer(inner) = &stmts[0].kind else { panic!() };
    assert!(matches!(&inner.kind, StmtKind::Call(_)));
    assert!(matches!(&stmts[2].kind, StmtKind::Delete(_)));
}

#[test]
fn test_return_inside_defer_rejected() {
    assert!(matches!(
        parse_err("func f {\n    defer return\n}\n"),
        CompileError::Parse { .. }
    ));
    assert!(matches!(
        parse_err("func f {\n    defer if x { return }\n}\n"),
        CompileError::Parse { .. }
    ));
}

#[test]
fn test_unary_and_allocation_expressions() {
    let ast = parse_source(
        "func f {\n    p *ubyte = new ubyte * 16\n    q *Vec = new Vec\n    n usize = sizeof Vec\n    c ubyte = cast ubyte (n)\n    g funcptr = func &callback\n}\n",
    );
    let stmts = &ast.funcs[0].statements;
    let StmtKind::Declare { value: Some(expr), .. } = &stmts[0].kind else { panic!() };
    assert!(matches!(&expr.kind, ExprKind::New { amount: Some(_), .. }));
    let StmtKind::Declare { value: Some(expr), .. } = &stmts[1].kind else { panic!() };
    assert!(matches!(&expr.kind, ExprKind::New { amount: None, .. }));
    let StmtKind::Declare { value: Some(expr), .. } = &stmts[2].kind else { panic!() };
    assert!(matches!(&expr.kind, ExprKind::Sizeof(_)));
    let StmtKind::Declare { value: Some(expr), .. } = &stmts[3].kind else { panic!() };
    assert!(matches!(&expr.kind, ExprKind::Cast { .. }));
    let StmtKind::Declare { value: Some(expr), .. } = &stmts[4].kind else { panic!() };
    assert!(matches!(&expr.kind, ExprKind::FuncAddress { .. }));
}

#[test]
fn test_meta_conditionals() {
    let mut ctx = CompilerContext::new();
    ctx.meta.define("FEATURE", true);
    let ast = parse_source_with(
        &mut ctx,
        "#if FEATURE\nfunc enabled { }\n#else\nfunc disabled { }\n#end\n#if MISSING\nfunc skipped { }\n#end\n",
    )
    .unwrap();
    assert_eq!(ast.funcs.len(), 1);
    assert_eq!(ast.funcs[0].name, "enabled");
}

#[test]
fn test_meta_define_controls_later_conditionals() {
    let ast = parse_source("#define EXTRAS true\n#if EXTRAS\nfunc extra { }\n#end\n");
    assert_eq!(ast.funcs.len(), 1);
}

#[test]
fn test_pragma_no_type_info() {
    let mut ctx = CompilerContext::new();
    parse_source_with(&mut ctx, "pragma no_type_info\nfunc main { }\n").unwrap();
    assert!(ctx.flags.no_type_info);
}

#[test]
fn test_unknown_pragma_warns() {
    let mut ctx = CompilerContext::new();
    parse_source_with(&mut ctx, "pragma shiny_feature\n").unwrap();
    assert_eq!(ctx.diagnostics.warning_count(), 1);
}

#[test]
fn test_import_recorded() {
    let ast = parse_source("import 'vector.keel'\n");
    assert_eq!(ast.imports[0].path, "vector.keel");
}
