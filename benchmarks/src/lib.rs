//! Synthetic pcode workloads shared by the benches.

use pcode_ast::{Block, Expr, Stmt};

/// `s <- 0 ; for i <- 1 to n do s <- s + i * i end ; return s`
pub fn sum_of_squares() -> Block {
    let square = Expr::binary(Expr::ident("i"), "*", Expr::ident("i"));
    Block::new(vec![
        Stmt::assign(Expr::ident("s"), Expr::int(0)),
        Stmt::for_loop(
            "i",
            Expr::int(1),
            Expr::ident("n"),
            Block::new(vec![Stmt::assign(Expr::ident("s"), Expr::binary(Expr::ident("s"), "+", square))]),
        ),
        Stmt::ret(Some(Expr::ident("s"))),
    ])
}

/// `blocks` copies of an if/else + while fragment, for generation throughput.
pub fn branchy(blocks: usize) -> Block {
    let fragment = |k: i64| {
        Stmt::Block(Block::new(vec![
            Stmt::if_else(
                Expr::binary(Expr::ident("x"), "<", Expr::int(k)),
                Block::new(vec![Stmt::assign(Expr::ident("x"), Expr::binary(Expr::ident("x"), "+", Expr::int(k)))]),
                Some(Block::new(vec![Stmt::assign(
                    Expr::index(Expr::ident("a"), Expr::int(k % 8)),
                    Expr::binary(Expr::ident("x"), "/", Expr::int(2)),
                )])),
            ),
            Stmt::while_loop(
                Expr::binary(Expr::ident("x"), ">", Expr::int(100)),
                Block::new(vec![Stmt::assign(Expr::ident("x"), Expr::binary(Expr::ident("x"), "-", Expr::int(7)))]),
            ),
        ]))
    };
    (0..blocks).map(|k| fragment(i64::try_from(k).unwrap_or(i64::MAX))).collect()
}
