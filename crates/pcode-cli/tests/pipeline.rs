use std::{fs, path::PathBuf};

use pcode_cli::{
    execute, load_program, run_program, Command, CompileTask, DisasmTask, Input, Output, ProgramKind,
};
use pcode_core::{ArithOp, Chunk, Instruction, Operand, Temp, Value};
use pretty_assertions::assert_eq;

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos").join(name)
}

fn bind(name: &str, value: Value) -> (String, Value) {
    (name.to_owned(), value)
}

#[test]
fn json_ast_runs_directly() {
    let program = load_program(&fs::read(demo("straight_line.json")).unwrap()).unwrap();
    assert_eq!(program.kind, ProgramKind::Ast);

    let report = run_program(program.code, &[], None).unwrap();
    assert_eq!(report.result, Some(Value::Int(7)));
    assert!(report.unbound.is_empty());
}

#[test]
fn compiled_chunk_matches_generated_code() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("nested/sum.pcbc");

    let task = CompileTask {
        input: Input::Path(demo("sum_to_n.json")),
        output: Output::Path(out.clone()),
        auto_mkdir: true,
        overwrite: false,
        time: false,
    };
    assert_eq!(execute(Command::Compile(task.clone())).unwrap(), 0);

    let bytes = fs::read(&out).unwrap();
    assert!(Chunk::sniff(&bytes));
    let from_chunk = load_program(&bytes).unwrap();
    let from_ast = load_program(&fs::read(demo("sum_to_n.json")).unwrap()).unwrap();
    assert_eq!(from_chunk.kind, ProgramKind::Chunk);
    assert_eq!(from_chunk.code, from_ast.code);

    let report = run_program(from_chunk.code, &[bind("n", Value::Int(4))], None).unwrap();
    assert_eq!(report.result, Some(Value::Int(10)));

    // existing output is kept unless --overwrite
    assert!(execute(Command::Compile(task.clone())).is_err());
    assert_eq!(execute(Command::Compile(CompileTask { overwrite: true, ..task })).unwrap(), 0);
}

#[test]
fn disasm_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("listing.txt");
    let task = DisasmTask { input: Input::Path(demo("straight_line.json")), output: Output::Path(out.clone()), full: false };
    execute(Command::Disasm(task)).unwrap();
    assert_eq!(fs::read_to_string(out).unwrap(), "0: ASN x 5\n1: AOP + x 2 t0\n2: ASN y t0\n3: RET y\n");
}

#[test]
fn array_input_and_function_body() {
    let program = load_program(&fs::read(demo("max_of_array.json")).unwrap()).unwrap();
    let bindings = [bind("a", Value::Array(vec![3, 9, 2])), bind("len", Value::Int(3))];
    let report = run_program(program.code, &bindings, None).unwrap();
    assert_eq!(report.result, Some(Value::Int(9)));
    assert_eq!(report.variables["best"], Value::Int(9));
}

#[test]
fn unknown_bindings_are_ignored_and_missing_ones_reported() {
    let program = load_program(&fs::read(demo("sum_to_n.json")).unwrap()).unwrap();
    let report = run_program(program.code, &[bind("zzz", Value::Int(1))], None).unwrap();
    assert_eq!(report.unbound, vec!["n".to_owned()]);
    assert!(!report.variables.contains_key("zzz"));
    // n reads as 0: the loop body never runs
    assert_eq!(report.result, Some(Value::Int(0)));
}

#[test]
fn step_limit_is_reported() {
    let program = load_program(&fs::read(demo("sum_to_n.json")).unwrap()).unwrap();
    let err = run_program(program.code, &[bind("n", Value::Int(1_000))], Some(50)).unwrap_err();
    assert!(format!("{err:#}").contains("step limit of 50 exceeded"), "{err:#}");
}

#[test]
fn corrupted_chunk_is_rejected() {
    let code = load_program(&fs::read(demo("straight_line.json")).unwrap()).unwrap().code;
    let mut bytes = Chunk::new(code).to_bytes();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xFF;
    assert!(load_program(&bytes).is_err());
}

#[test]
fn invalid_json_is_rejected() {
    let err = load_program(br#"{"stmts": [{"assign": 3}]}"#).unwrap_err();
    assert!(format!("{err:#}").contains("AST JSON invalide"));
}

#[test]
fn chunk_with_out_of_range_temporary_is_rejected() {
    let code = vec![
        Instruction::Aop { op: ArithOp::Add, lhs: Operand::Int(1), rhs: Some(Operand::Int(2)), dest: Temp(u32::MAX) },
        Instruction::Ret(Some(Operand::Temp(Temp(u32::MAX)))),
    ];
    let bytes = Chunk::new(code).to_bytes();
    let err = load_program(&bytes).unwrap_err();
    assert!(format!("{err:#}").contains("out of range"), "{err:#}");
}
