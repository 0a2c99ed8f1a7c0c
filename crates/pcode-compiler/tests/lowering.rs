//! Golden listings of the control-flow lowerings.

use pcode_ast::{Block, Expr, Stmt};
use pcode_compiler::{generate, CompileError};
use pcode_core::{disasm::disassemble, helpers::validate_code, Instruction};

fn listing(program: &Block) -> String {
    let code = generate(program).expect("generation");
    validate_code(&code).expect("jumps land inside the program");
    disassemble(&code)
}

fn lt(name: &str, bound: i64) -> Expr {
    Expr::binary(Expr::ident(name), "<", Expr::int(bound))
}

fn incr(name: &str) -> Stmt {
    Stmt::assign(Expr::ident(name), Expr::binary(Expr::ident(name), "+", Expr::int(1)))
}

#[test]
fn if_else_skips_then_and_exit_jump() {
    let program = Block::new(vec![Stmt::if_else(
        Expr::binary(Expr::ident("x"), ">", Expr::int(0)),
        Block::new(vec![Stmt::assign(Expr::ident("y"), Expr::int(1))]),
        Some(Block::new(vec![Stmt::assign(Expr::ident("y"), Expr::int(2))])),
    )]);
    insta::assert_snapshot!(listing(&program), @r"
    0: COM > x 0 t0
    1: SKP 2
    2: ASN y 1
    3: JMP 5
    4: ASN y 2
    ");
}

#[test]
fn if_without_else_skips_then_only() {
    let program = Block::new(vec![
        Stmt::if_else(
            Expr::binary(Expr::ident("x"), "=", Expr::int(0)),
            Block::new(vec![Stmt::assign(Expr::ident("y"), Expr::int(1)), incr("y")]),
            None,
        ),
        Stmt::ret(Some(Expr::ident("y"))),
    ]);
    insta::assert_snapshot!(listing(&program), @r"
    0: COM = x 0 t0
    1: SKP 3
    2: ASN y 1
    3: AOP + y 1 t1
    4: ASN y t1
    5: RET y
    ");
}

#[test]
fn while_skip_covers_body_and_back_edge() {
    let program = Block::new(vec![Stmt::while_loop(lt("i", 3), Block::new(vec![incr("i")]))]);
    insta::assert_snapshot!(listing(&program), @r"
    0: COM < i 3 t0
    1: SKP 3
    2: AOP + i 1 t1
    3: ASN i t1
    4: JMP 0
    ");
}

#[test]
fn for_loop_increments_and_jumps_back_to_bound_check() {
    let program = Block::new(vec![
        Stmt::assign(Expr::ident("s"), Expr::int(0)),
        Stmt::for_loop(
            "i",
            Expr::int(1),
            Expr::ident("n"),
            Block::new(vec![Stmt::assign(
                Expr::ident("s"),
                Expr::binary(Expr::ident("s"), "+", Expr::ident("i")),
            )]),
        ),
        Stmt::ret(Some(Expr::ident("s"))),
    ]);
    insta::assert_snapshot!(listing(&program), @r"
    0: ASN s 0
    1: ASN i 1
    2: COM <= i n t0
    3: SKP 5
    4: AOP + s i t1
    5: ASN s t1
    6: AOP + i 1 t2
    7: ASN i t2
    8: JMP 2
    9: RET s
    ");
}

#[test]
fn nested_if_inside_while() {
    let program = Block::new(vec![Stmt::while_loop(
        lt("i", 3),
        Block::new(vec![
            Stmt::if_else(
                Expr::binary(Expr::ident("i"), "=", Expr::int(1)),
                Block::new(vec![Stmt::assign(Expr::ident("x"), Expr::int(1))]),
                None,
            ),
            incr("i"),
        ]),
    )]);
    insta::assert_snapshot!(listing(&program), @r"
    0: COM < i 3 t0
    1: SKP 6
    2: COM = i 1 t1
    3: SKP 1
    4: ASN x 1
    5: AOP + i 1 t2
    6: ASN i t2
    7: JMP 0
    ");
}

#[test]
fn array_read_and_write() {
    let program = Block::new(vec![
        Stmt::assign(Expr::index(Expr::ident("a"), Expr::int(0)), Expr::int(10)),
        Stmt::ret(Some(Expr::index(Expr::ident("a"), Expr::int(0)))),
    ]);
    insta::assert_snapshot!(listing(&program), @r"
    0: ASN a[0] 10
    1: IDX a 0 t0
    2: RET t0
    ");
}

#[test]
fn function_body_gets_trailing_return() {
    let program = Block::new(vec![Stmt::Function {
        body: Block::new(vec![
            Stmt::Block(Block::new(vec![Stmt::assign(Expr::ident("x"), Expr::unary("not", Expr::ident("b")))])),
            Stmt::ret(Some(Expr::ident("x"))),
        ]),
    }]);
    insta::assert_snapshot!(listing(&program), @r"
    0: AOP not b t0
    1: ASN x t0
    2: RET x
    3: RET
    ");
}

#[test]
fn empty_program_is_empty() {
    assert_eq!(generate(&Block::default()), Ok(Vec::<Instruction>::new()));
}

#[test]
fn error_inside_a_loop_body_aborts() {
    let program = Block::new(vec![Stmt::while_loop(
        lt("i", 3),
        Block::new(vec![Stmt::Expr(Expr::binary(Expr::ident("i"), "^", Expr::int(2)))]),
    )]);
    assert_eq!(generate(&program), Err(CompileError::UnknownOperator("^".into())));
}
