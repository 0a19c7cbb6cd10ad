//! End-to-end pipeline tests
//!
//! Literal source programs through the whole pipeline, with the expected
//! observable IR asserted on the produced module.

use keel_common::{CompileError, CompilerContext};
use keel_compiler::{compile_all, compile_source, CompilationStage, TranslationUnit};
use keel_ir::{verify::verify_module, Instruction, IrLiteral, IrModule, IrTypeKind, IrValueKind};
use pretty_assertions::assert_eq;

/// Route the pipeline's stage tracing through env_logger; run tests with
/// RUST_LOG=debug to see it.
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn compile(source: &str) -> IrModule {
    init_logging();
    let mut ctx = CompilerContext::new();
    let unit = compile_source(&mut ctx, "test.keel", source).expect("compilation failed");
    let module = unit.ir.expect("no IR module");
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

fn instructions(function: &keel_ir::IrFunction) -> Vec<&Instruction> {
    function
        .basicblocks
        .iter()
        .flat_map(|block| block.instructions.iter())
        .collect()
}

#[test]
fn test_scenario_empty_main() {
    let module = compile("func main { }\n");
    let main = func(&module, "main");

    assert!(matches!(module.pool.type_kind(main.return_type), IrTypeKind::S32));
    assert_eq!(main.basicblocks.len(), 1);

    let Instruction::Return(Some(value)) = &main.basicblocks[0].instructions[0] else {
        panic!("expected 'ret s32 0'");
    };
    assert!(matches!(
        module.pool.value(*value).kind,
        IrValueKind::Literal(IrLiteral::S32(0))
    ));
}

#[test]
fn test_scenario_hello_world() {
    let module = compile("foreign puts(*ubyte) int\nfunc main {\n    puts('hi')\n}\n");
    let main = func(&module, "main");
    let all = instructions(main);

    let Instruction::Call { func_id, args, .. } = all[0] else {
        panic!("expected a call first");
    };
    assert_eq!(module.funcs[*func_id].name, "puts");
    assert!(matches!(
        &module.pool.value(args[0]).kind,
        IrValueKind::CstrOfLen { length: 2, .. }
    ));
    assert!(matches!(all[1], Instruction::Return(Some(_))));
}

#[test]
fn test_scenario_integer_promotion() {
    let module = compile("func add(a int, b long) long {\n    return a + b\n}\n");
    let add = func(&module, "add");
    let all = instructions(add);

    let sext = all.iter().position(|i| {
        matches!(i, Instruction::Cast { op: keel_ir::CastOp::SignExtend, result_type, .. }
            if matches!(module.pool.type_kind(*result_type), IrTypeKind::S64))
    });
    let addition = all.iter().position(|i| {
        matches!(i, Instruction::Math { op: keel_ir::MathOp::Add, result_type, .. }
            if matches!(module.pool.type_kind(*result_type), IrTypeKind::S64))
    });
    assert!(sext.unwrap() < addition.unwrap());
}

#[test]
fn test_scenario_defer_ordering() {
    let module = compile(
        "foreign puts(*ubyte) int\nfunc f {\n    defer puts('a')\n    defer puts('b')\n    puts('c')\n}\n",
    );
    let f = func(&module, "f");

    let payloads: Vec<u8> = instructions(f)
        .iter()
        .filter_map(|i| match i {
            Instruction::Call { args, .. } => match &module.pool.value(args[0]).kind {
                IrValueKind::CstrOfLen { bytes, .. } => Some(bytes[0]),
                _ => None,
            },
            _ => None,
        })
        .collect();
    assert_eq!(payloads, vec![b'c', b'b', b'a']);
}

#[test]
fn test_scenario_overload_by_argument_type() {
    let module = compile(
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

    let group = module.func_mappings.group("g");
    assert_eq!(group.iter().map(|m| m.func_id).collect::<Vec<_>>(), vec![0, 1]);
}

#[test]
fn test_scenario_method_through_pointer_auto_deref() {
    let module = compile(
        "struct S (v int)\nfunc bump(this *S) { }\nfunc main {\n    s S\n    p *S = &s\n    p.bump()\n}\n",
    );
    let main = func(&module, "main");

    let Some(Instruction::Call { args, func_id, .. }) = instructions(main)
        .into_iter()
        .find(|i| matches!(i, Instruction::Call { .. }))
    else {
        panic!("no method call");
    };
    assert_eq!(module.funcs[*func_id].name, "bump");

    // Exactly one implicit load feeds the receiver; its value is *S.
    let IrValueKind::Result { block, instruction } = module.pool.value(args[0]).kind else {
        panic!("receiver should be an instruction result");
    };
    assert!(matches!(
        main.basicblocks[block].instructions[instruction],
        Instruction::Load { .. }
    ));
    let pointee = module
        .pool
        .pointee(module.pool.value_type(args[0]))
        .expect("receiver is a pointer");
    assert!(matches!(
        module.pool.type_kind(pointee),
        IrTypeKind::Structure { .. }
    ));
}

#[test]
fn test_batch_continues_past_failed_unit() {
    init_logging();
    let mut ctx = CompilerContext::new();
    let mut units = vec![
        TranslationUnit::from_source(0, "bad.keel", "func { }\n"),
        TranslationUnit::from_source(1, "good.keel", "func main { }\n"),
    ];

    let results = compile_all(&mut ctx, &mut units);
    assert!(results[0].is_err());
    assert!(results[1].is_ok());
    assert_eq!(units[0].stage, CompilationStage::TokenList);
    assert_eq!(units[1].stage, CompilationStage::IrModule);
}

#[test]
fn test_stage_tracking_on_lex_failure() {
    init_logging();
    let mut ctx = CompilerContext::new();
    let mut unit = TranslationUnit::from_source(0, "bad.keel", "\"unterminated\n");
    let result = unit.compile(&mut ctx);

    assert!(matches!(result, Err(CompileError::Lex { .. })));
    assert_eq!(unit.stage, CompilationStage::None);
    assert!(unit.tokens.is_none());
    assert!(unit.ast.is_none());
    assert!(unit.ir.is_none());
    assert!(ctx.diagnostics.has_errors());
}

#[test]
fn test_package_round_trip_compiles_identically() {
    init_logging();
    let source = "foreign puts(*ubyte) int\nfunc main {\n    puts('hi')\n}\n";
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unit.pkg");

    let mut ctx = CompilerContext::new();
    let mut from_source = TranslationUnit::from_source(0, "test.keel", source);
    from_source.write_package(&mut ctx, &path).unwrap();
    from_source.compile(&mut ctx).unwrap();

    let mut from_package = TranslationUnit::from_package(1, &path).unwrap();
    from_package.compile(&mut ctx).unwrap();

    let source_module = from_source.ir_module().unwrap();
    let package_module = from_package.ir_module().unwrap();
    assert_eq!(source_module.funcs.len(), package_module.funcs.len());
    assert_eq!(
        instructions(func(source_module, "main")).len(),
        instructions(func(package_module, "main")).len()
    );
}

#[test]
fn test_meta_definitions_seeded_from_host() {
    // At least one platform flag from the host seed must be queryable.
    let ctx = CompilerContext::new();
    assert!(ctx.meta.is_defined("__unix__"));
    assert!(ctx.meta.is_defined("__windows__"));
    assert!(ctx.meta.is_defined("__macos__"));
    assert!(ctx.meta.is_defined("__linux__"));
}

#[test]
fn test_every_block_ends_in_one_terminator() {
    let module = compile(
        "func collatz(n int) int {\n    steps int = 0\n    while n != 1 {\n        if n % 2 == 0 {\n            n /= 2\n        } else {\n            n = 3 * n + 1\n        }\n        steps += 1\n    }\n    return steps\n}\n",
    );

    for block in &func(&module, "collatz").basicblocks {
        assert!(!block.instructions.is_empty());
        let last = block.instructions.len() - 1;
        for (index, instruction) in block.instructions.iter().enumerate() {
            assert_eq!(instruction.is_terminator(), index == last);
        }
    }
}

#[test]
fn test_return_unwinds_defers_before_ret() {
    let module = compile(
        "foreign puts(*ubyte) int\nfunc f(flag bool) {\n    defer puts('x')\n    if flag {\n        return\n    }\n    puts('y')\n}\n",
    );
    let f = func(&module, "f");

    // Both the early return and the fall-through exit replay the defer:
    // the call to puts('x') appears twice, each time right before a ret.
    let mut deferred_before_ret = 0;
    for block in &f.basicblocks {
        let instrs = &block.instructions;
        for pair in instrs.windows(2) {
            if let (Instruction::Call { args, .. }, Instruction::Return(_)) = (&pair[0], &pair[1])
            {
                if let IrValueKind::CstrOfLen { bytes, .. } = &module.pool.value(args[0]).kind {
                    if bytes[0] == b'x' {
                        deferred_before_ret += 1;
                    }
                }
            }
        }
    }
    assert_eq!(deferred_before_ret, 2);
}
