//! Lowering integration tests
//!
//! Source programs go through the full lex → parse → lower pipeline and
//! the produced IR is checked for shape and for the module invariants.

use keel_common::{CompileError, CompilerContext, SourceBuffer};
use keel_ir::{
    verify::verify_module, CastOp, Instruction, IrLiteral, IrModule, IrTypeKind, IrValueKind,
    MathOp,
};
use pretty_assertions::assert_eq;

fn lower_with(ctx: &mut CompilerContext, source: &str) -> Result<IrModule, CompileError> {
    let buffer = SourceBuffer::new("test.keel", source, 0);
    let tokens = keel_lexer::tokenize(ctx, &buffer)?;
    let ast = keel_parser::parse(ctx, tokens)?;
    keel_ir::lower(ctx, &ast)
}

fn lower_source(source: &str) -> IrModule {
    let mut ctx = CompilerContext::new();
    let module = lower_with(&mut ctx, source).expect("lowering failed");
    verify_module(&module).expect("module failed verification");
    module
}

fn func<'m>(module: &'m IrModule, name: &str) -> &'m keel_ir::IrFunction {
    module
        .funcs
        .iter()
        .find(|f| f.name == name)
        .unwrap_or_else(|| panic!("no function named '{}'", name))
}

/// All instructions of a function in block order.
fn instructions(function: &keel_ir::IrFunction) -> Vec<&Instruction> {
    function
        .basicblocks
        .iter()
        .flat_map(|block| block.instructions.iter())
        .collect()
}

/// The c-string payload of a call's first argument, when it has one.
fn call_cstr_payload(module: &IrModule, instruction: &Instruction) -> Option<String> {
    let Instruction::Call { args, .. } = instruction else { return None };
    match &module.pool.value(*args.first()?).kind {
        IrValueKind::CstrOfLen { bytes, length } => {
            Some(String::from_utf8_lossy(&bytes[..*length]).to_string())
        }
        _ => None,
    }
}

#[test]
fn test_empty_main_returns_s32_zero() {
    let module = lower_source("func main { }\n");

    let main = func(&module, "main");
    assert!(matches!(
        module.pool.type_kind(main.return_type),
        IrTypeKind::S32
    ));
    assert_eq!(main.basicblocks.len(), 1);
    assert_eq!(main.basicblocks[0].instructions.len(), 1);

    let Instruction::Return(Some(value)) = &main.basicblocks[0].instructions[0] else {
        panic!("expected a return of a value");
    };
    assert!(matches!(
        module.pool.value(*value).kind,
        IrValueKind::Literal(IrLiteral::S32(0))
    ));
}

#[test]
fn test_hello_world_call() {
    let module = lower_source("foreign puts(*ubyte) int\nfunc main {\n    puts('hi')\n}\n");

    assert_eq!(module.funcs.len(), 2);
    let main = func(&module, "main");
    let all = instructions(main);
    assert_eq!(all.len(), 2);

    let Instruction::Call { func_id, args, .. } = all[0] else {
        panic!("expected a call, got {:?}", all[0]);
    };
    assert_eq!(*func_id, 0);
    match &module.pool.value(args[0]).kind {
        IrValueKind::CstrOfLen { bytes, length } => {
            assert_eq!(*length, 2);
            assert_eq!(&bytes[..], b"hi\0");
        }
        other => panic!("expected a cstr-of-len argument, got {:?}", other),
    }

    assert!(matches!(all[1], Instruction::Return(Some(_))));
}

#[test]
fn test_integer_promotion_sign_extends() {
    let module = lower_source("func add(a int, b long) long {\n    return a + b\n}\n");

    let add = func(&module, "add");
    let all = instructions(add);

    let load_a = all
        .iter()
        .position(|i| {
            matches!(i, Instruction::Load { result_type, .. }
                if matches!(module.pool.type_kind(*result_type), IrTypeKind::S32))
        })
        .expect("no s32 load of 'a'");
    let sext = all
        .iter()
        .position(|i| {
            matches!(i, Instruction::Cast { op: CastOp::SignExtend, result_type, .. }
                if matches!(module.pool.type_kind(*result_type), IrTypeKind::S64))
        })
        .expect("no sext s32 -> s64");
    let addition = all
        .iter()
        .position(|i| {
            matches!(i, Instruction::Math { op: MathOp::Add, result_type, .. }
                if matches!(module.pool.type_kind(*result_type), IrTypeKind::S64))
        })
        .expect("no s64 add");
    let ret = all
        .iter()
        .position(|i| matches!(i, Instruction::Return(Some(_))))
        .expect("no return");

    assert!(load_a < sext && sext < addition && addition < ret);
}

#[test]
fn test_defer_ordering() {
    let module = lower_source(
        "foreign puts(*ubyte) int\nfunc f {\n    defer puts('a')\n    defer puts('b')\n    puts('c')\n}\n",
    );

    let f = func(&module, "f");
    let all = instructions(f);

    let calls: Vec<String> = all
        .iter()
        .filter_map(|i| call_cstr_payload(&module, i))
        .collect();
    assert_eq!(calls, vec!["c", "b", "a"]);
    assert!(matches!(all.last(), Some(Instruction::Return(None))));
}

#[test]
fn test_overload_resolution_by_argument_type() {
    let module = lower_source(
        "func g(x int) { }\nfunc g(x double) { }\nfunc main {\n    g(1)\n    g(1.0)\n}\n",
    );

    let main = func(&module, "main");
    let call_ids: Vec<usize> = instructions(main)
        .iter()
        .filter_map(|i| match i {
            Instruction::Call { func_id, .. } => Some(*func_id),
            _ => None,
        })
        .collect();

    assert_eq!(call_ids.len(), 2);
    assert_ne!(call_ids[0], call_ids[1]);
    // Declaration order: g(int) is function 0, g(double) is function 1.
    assert_eq!(call_ids, vec![0, 1]);

    // Both ids appear in the sorted mapping group for 'g'.
    let group = module.func_mappings.group("g");
    assert_eq!(group.len(), 2);
    assert_eq!(group[0].func_id, 0);
    assert_eq!(group[1].func_id, 1);
}

#[test]
fn test_method_call_through_pointer_single_deref() {
    let module = lower_source(
        "struct S (v int)\nfunc bump(this *S) {\n    this.v = this.v + 1\n}\nfunc main {\n    s S\n    p *S = &s\n    p.bump()\n}\n",
    );

    let main = func(&module, "main");
    let all = instructions(main);

    let (call_index, args) = all
        .iter()
        .enumerate()
        .find_map(|(index, i)| match i {
            Instruction::Call { args, .. } => Some((index, args.clone())),
            _ => None,
        })
        .expect("no method call in main");

    // The receiver argument is the result of a single implicit load of
    // 'p', typed *S.
    let receiver = args[0];
    let receiver_type = module.pool.value_type(receiver);
    let pointee = module.pool.pointee(receiver_type).expect("receiver must be a pointer");
    assert!(matches!(
        module.pool.type_kind(pointee),
        IrTypeKind::Structure { .. }
    ));

    let IrValueKind::Result { block, instruction } = module.pool.value(receiver).kind else {
        panic!("receiver should be an instruction result");
    };
    assert!(matches!(
        main.basicblocks[block].instructions[instruction],
        Instruction::Load { .. }
    ));
    assert!(instruction < call_index || block < main.basicblocks.len());
}

#[test]
fn test_loop_break_runs_defers_first() {
    let module = lower_source(
        "foreign puts(*ubyte) int\nfunc f {\n    while true {\n        defer puts('loop')\n        break\n    }\n    puts('after')\n}\n",
    );

    let f = func(&module, "f");

    // Find the block containing the break branch; the deferred call must
    // precede it in the same block.
    let body_block = f
        .basicblocks
        .iter()
        .find(|block| {
            block
                .instructions
                .iter()
                .any(|i| call_cstr_payload(&module, i) == Some("loop".to_string()))
        })
        .expect("no block with the deferred call");

    let call_index = body_block
        .instructions
        .iter()
        .position(|i| call_cstr_payload(&module, i).is_some())
        .unwrap();
    let branch_index = body_block
        .instructions
        .iter()
        .position(|i| matches!(i, Instruction::Branch { .. }))
        .expect("no branch after break");
    assert!(call_index < branch_index);
}

#[test]
fn test_labeled_continue_targets_outer_loop() {
    let module = lower_source(
        "func f {\n    i int = 0\n    while outer: i < 10 {\n        while i < 5 {\n            continue outer\n        }\n    }\n}\n",
    );
    // Verification already guarantees branch targets exist; reaching here
    // means the label search resolved through the stack.
    assert!(func(&module, "f").basicblocks.len() >= 5);
}

#[test]
fn test_unless_and_until_invert_branch_polarity() {
    let module = lower_source(
        "func f(c bool) {\n    unless c {\n        x int = 1\n    }\n    until c {\n        y int = 2\n    }\n}\n",
    );

    let f = func(&module, "f");
    let mut cond_branches = f.basicblocks.iter().flat_map(|b| &b.instructions).filter_map(
        |i| match i {
            Instruction::ConditionalBranch { true_block, false_block, .. } => {
                Some((*true_block, *false_block))
            }
            _ => None,
        },
    );

    // unless: the true edge skips the body (the body block is created
    // before the merge block, so it has the smaller id).
    let (true_block, false_block) = cond_branches.next().expect("no condbr for unless");
    assert!(true_block > false_block);
    let (true_block, false_block) = cond_branches.next().expect("no condbr for until");
    assert!(true_block > false_block);
}

#[test]
fn test_zero_init_and_undef() {
    let module = lower_source("func f {\n    a int\n    b int = undef\n    c int = 3\n}\n");
    let f = func(&module, "f");
    let all = instructions(f);

    let zero_inits: Vec<usize> = all
        .iter()
        .filter_map(|i| match i {
            Instruction::VarZeroInit { variable_id } => Some(*variable_id),
            _ => None,
        })
        .collect();
    // Only 'a' is zero-initialized; 'b' opted out and 'c' is stored into.
    assert_eq!(zero_inits, vec![0]);
    assert!(all.iter().any(|i| matches!(i, Instruction::Store { .. })));
    assert_eq!(f.variable_count, 3);
}

#[test]
fn test_new_and_delete() {
    let module = lower_source(
        "func f {\n    p *ubyte = new ubyte * 64\n    q *long = new long\n    delete p\n    delete q\n}\n",
    );
    let f = func(&module, "f");
    let all = instructions(f);

    let mallocs: Vec<bool> = all
        .iter()
        .filter_map(|i| match i {
            Instruction::Malloc { amount, .. } => Some(amount.is_some()),
            _ => None,
        })
        .collect();
    assert_eq!(mallocs, vec![true, false]);
    assert_eq!(
        all.iter().filter(|i| matches!(i, Instruction::Free { .. })).count(),
        2
    );
}

#[test]
fn test_not_lowers_to_is_zero() {
    let module = lower_source("func f(x int) bool {\n    return !x\n}\n");
    let f = func(&module, "f");
    assert!(instructions(f).iter().any(|i| matches!(
        i,
        Instruction::Cast { op: CastOp::IsZero, .. }
    )));
}

#[test]
fn test_management_methods_inserted() {
    let module = lower_source(
        "struct Res (handle int)\nfunc __defer__(this *Res) { }\nfunc __pass__(arg Res) Res {\n    return arg\n}\nfunc use(r Res) { }\nfunc main {\n    r Res\n    use(r)\n}\n",
    );

    let main = func(&module, "main");
    let call_ids: Vec<usize> = instructions(main)
        .iter()
        .filter_map(|i| match i {
            Instruction::Call { func_id, .. } => Some(*func_id),
            _ => None,
        })
        .collect();

    // __pass__ wraps the argument, then 'use' is called, and scope exit
    // inserts __defer__.
    assert_eq!(call_ids.len(), 3);
    assert_eq!(call_ids[0], 1); // __pass__
    assert_eq!(call_ids[1], 2); // use
    assert_eq!(call_ids[2], 0); // __defer__
}

#[test]
fn test_pod_argument_skips_pass_management() {
    let module = lower_source(
        "struct Res (handle int)\nfunc __pass__(arg Res) Res {\n    return arg\n}\nfunc use(r POD Res) { }\nfunc main {\n    r Res = undef\n    use(r)\n}\n",
    );

    let main = func(&module, "main");
    let call_count = instructions(main)
        .iter()
        .filter(|i| matches!(i, Instruction::Call { .. }))
        .count();
    assert_eq!(call_count, 1);
}

#[test]
fn test_assign_management_method() {
    let module = lower_source(
        "struct Res (handle int)\nfunc __assign__(this *Res, other Res) { }\nfunc main {\n    a Res = undef\n    b Res = undef\n    a = b\n}\n",
    );

    let main = func(&module, "main");
    // The assignment goes through __assign__ rather than a store.
    assert!(instructions(main).iter().any(|i| matches!(
        i,
        Instruction::Call { func_id: 0, .. }
    )));
    assert!(!instructions(main)
        .iter()
        .any(|i| matches!(i, Instruction::Store { .. })));
}

#[test]
fn test_operator_overload_fallback() {
    let module = lower_source(
        "struct Vec2 (x double, y double)\nfunc __add__(a Vec2, b Vec2) Vec2 {\n    return a\n}\nfunc main {\n    a Vec2 = undef\n    b Vec2 = undef\n    c Vec2 = a + b\n}\n",
    );

    let main = func(&module, "main");
    assert!(instructions(main)
        .iter()
        .any(|i| matches!(i, Instruction::Call { func_id: 0, .. })));
}

#[test]
fn test_addition_of_structs_without_overload_fails() {
    let mut ctx = CompilerContext::new();
    let result = lower_with(
        &mut ctx,
        "struct Vec2 (x double, y double)\nfunc main {\n    a Vec2 = undef\n    b Vec2 = undef\n    c Vec2 = a + b\n}\n",
    );
    assert!(matches!(result, Err(CompileError::Type { .. })));
}

#[test]
fn test_undeclared_variable_suggestion() {
    let mut ctx = CompilerContext::new();
    let result = lower_with(
        &mut ctx,
        "func f {\n    counter int = 0\n    countr = 1\n}\n",
    );
    match result {
        Err(CompileError::Resolve { message }) => {
            assert!(message.contains("did you mean 'counter'"), "{}", message);
        }
        other => panic!("expected resolve error, got {:?}", other),
    }
}

#[test]
fn test_alias_cycle_rejected() {
    let mut ctx = CompilerContext::new();
    let result = lower_with(
        &mut ctx,
        "alias A = B\nalias B = A\nfunc f {\n    x A = undef\n}\n",
    );
    assert!(matches!(result, Err(CompileError::Resolve { .. })));
}

#[test]
fn test_cast_requires_all_mode() {
    // usize -> pointer works only through an explicit cast.
    let module = lower_source(
        "func f(n usize) *ubyte {\n    return cast *ubyte (n)\n}\n",
    );
    assert!(instructions(func(&module, "f")).iter().any(|i| matches!(
        i,
        Instruction::Cast { op: CastOp::IntToPtr, .. }
    )));

    let mut ctx = CompilerContext::new();
    let result = lower_with(&mut ctx, "func g(n usize) *ubyte {\n    return n\n}\n");
    assert!(matches!(result, Err(CompileError::Type { .. })));
}

#[test]
fn test_func_address_matches_by_name_with_warning() {
    let mut ctx = CompilerContext::new();
    let module = lower_with(
        &mut ctx,
        "func callback { }\nfunc main {\n    f funcptr = func &callback\n}\n",
    )
    .unwrap();

    assert!(instructions(func(&module, "main")).iter().any(|i| matches!(
        i,
        Instruction::FuncAddress { func_id: Some(0), .. }
    )));
    assert_eq!(ctx.diagnostics.warning_count(), 1);
}

#[test]
fn test_no_type_info_nulls_special_globals() {
    let module = lower_source(
        "pragma no_type_info\nstruct AnyType (kind usize, name *ubyte, is_alias bool)\n__types__ **AnyType\n__types_length__ usize\nfunc main { }\n",
    );

    let main = func(&module, "main");
    let stores: Vec<&Instruction> = instructions(main)
        .iter()
        .copied()
        .filter(|i| matches!(i, Instruction::Store { .. }))
        .collect();
    assert_eq!(stores.len(), 2);
    assert!(module.anon_globals.is_empty());
}

const RTTI_PRELUDE: &str = "\
struct AnyType (kind usize, name *ubyte, is_alias bool)
struct AnyPtrType (kind usize, name *ubyte, is_alias bool, subtype *AnyType)
struct AnyStructType (kind usize, name *ubyte, is_alias bool, members **AnyType, length usize, offsets *usize, member_names **ubyte, is_packed bool)
struct AnyFuncPtrType (kind usize, name *ubyte, is_alias bool)
struct AnyFixedArrayType (kind usize, name *ubyte, is_alias bool, subtype *AnyType, length usize)
__types__ **AnyType
__types_length__ usize
__type_kinds__ **ubyte
__type_kinds_length__ usize
";

#[test]
fn test_rtti_table_emission() {
    let source = format!(
        "{}func main {{\n    x int\n    p *ubyte = null\n}}\n",
        RTTI_PRELUDE
    );
    let module = lower_source(&source);

    // Every type record became a constant anonymous global with an
    // initializer.
    assert!(!module.anon_globals.is_empty());
    assert!(module
        .anon_globals
        .iter()
        .all(|g| g.constant && g.initializer.is_some()));

    // The length store matches the record count.
    let main = func(&module, "main");
    let stored_length = instructions(main)
        .iter()
        .find_map(|i| match i {
            Instruction::Store { value, .. } => match &module.pool.value(*value).kind {
                IrValueKind::Literal(IrLiteral::U64(length)) => Some(*length as usize),
                _ => None,
            },
            _ => None,
        })
        .expect("no usize store for __types_length__");
    assert_eq!(stored_length, module.anon_globals.len());

    // The kind-name array mirrors the fixed kind enumeration.
    let kind_names = instructions(main)
        .iter()
        .find_map(|i| match i {
            Instruction::Store { value, .. } => match &module.pool.value(*value).kind {
                IrValueKind::ArrayLiteral(values) if values.len() == 16 => Some(values.clone()),
                _ => None,
            },
            _ => None,
        })
        .expect("no kind-name array store");
    let first = match &module.pool.value(kind_names[0]).kind {
        IrValueKind::CstrOfLen { bytes, length } => {
            String::from_utf8_lossy(&bytes[..*length]).to_string()
        }
        other => panic!("expected cstr kind name, got {:?}", other),
    };
    assert_eq!(first, "void");
}

#[test]
fn test_global_initializers_run_at_main_entry() {
    let module =
        lower_source("counter int = 41\nfunc main {\n    counter = counter + 1\n}\n");

    let main = func(&module, "main");
    let all = instructions(main);

    // The first store targets the global through a gvarptr.
    let store_index = all
        .iter()
        .position(|i| matches!(i, Instruction::Store { .. }))
        .expect("no initializer store");
    assert!(all[..store_index]
        .iter()
        .any(|i| matches!(i, Instruction::GlobalVarptr { global_id: 0, .. })));
}

#[test]
fn test_compound_assign_and_comparison_opcodes() {
    let module = lower_source(
        "func f(u uint, s int) {\n    u /= 2\n    s /= 2\n    b1 bool = u < 1\n    b2 bool = s < 1\n}\n",
    );
    let f = func(&module, "f");
    let ops: Vec<MathOp> = instructions(f)
        .iter()
        .filter_map(|i| match i {
            Instruction::Math { op, .. } => Some(*op),
            _ => None,
        })
        .collect();

    assert!(ops.contains(&MathOp::UDivide));
    assert!(ops.contains(&MathOp::SDivide));
    assert!(ops.contains(&MathOp::ULesser));
    assert!(ops.contains(&MathOp::SLesser));
}
