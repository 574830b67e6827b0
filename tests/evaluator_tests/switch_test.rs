//! A switch guarantees a return only through its default block. Returns in
//! case blocks are ignored by the static pass, even when every case returns.

use hyperlang::{AssignmentMember, Block, CaseBlock, ErrorCode, Expression, Statement, Token};
use hyperlang::symbols::{Callable, Value};
use pretty_assertions::assert_eq;

use super::{arg, compile};

fn returns(value: i64) -> Block {
    Block::new(vec![Statement::ret(Expression::integer(value))])
}

#[test]
fn test_default_only_return_passes_check() {
    // func(n: Int): Int { switch n { case 1: x := 1; default: return 0 } }
    let function = compile(
        vec![arg("n", "Int")],
        Some("Int"),
        vec![Statement::switch(
            Expression::ident("n"),
            vec![
                CaseBlock::case(
                    Expression::integer(1),
                    Block::new(vec![Statement::declare("x", Expression::integer(1))]),
                ),
                CaseBlock::default(returns(0)),
            ],
        )],
    )
    .unwrap();

    assert_eq!(
        function.call(vec![Value::Integer(2)]).unwrap(),
        Some(Value::Integer(0))
    );
    let err = function.call(vec![Value::Integer(1)]).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::InvalidReturnType));
}

#[test]
fn test_returning_cases_without_default_fail_check() {
    let err = compile(
        vec![arg("n", "Int")],
        Some("Int"),
        vec![Statement::switch(
            Expression::ident("n"),
            vec![
                CaseBlock::case(Expression::integer(1), returns(1)),
                CaseBlock::case(Expression::integer(2), returns(2)),
            ],
        )],
    )
    .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::MissingReturn));
}

#[test]
fn test_matching_cases_run_until_one_returns() {
    // func(n: Int): Int {
    //   total := 0
    //   switch n { case 1: total += 1; case 2: total += 10; case 1: total += 100; return total; case 1: return 0 }
    //   return -1
    // }
    let add = |amount: i64| {
        Statement::assign(
            vec![AssignmentMember::ident("total")],
            Token::AddAssign,
            Expression::integer(amount),
        )
    };
    let function = compile(
        vec![arg("n", "Int")],
        Some("Int"),
        vec![
            Statement::declare("total", Expression::integer(0)),
            Statement::switch(
                Expression::ident("n"),
                vec![
                    CaseBlock::case(Expression::integer(1), Block::new(vec![add(1)])),
                    CaseBlock::case(Expression::integer(2), Block::new(vec![add(10)])),
                    CaseBlock::case(
                        Expression::integer(1),
                        Block::new(vec![add(100), Statement::ret(Expression::ident("total"))]),
                    ),
                    CaseBlock::case(Expression::integer(1), returns(0)),
                ],
            ),
            Statement::ret(Expression::integer(-1)),
        ],
    )
    .unwrap();
    assert_eq!(
        function.call(vec![Value::Integer(1)]).unwrap(),
        Some(Value::Integer(101))
    );
}

#[test]
fn test_default_skipped_after_a_match() {
    // func(n: Int): Int { total := 0; switch n { case 1: total = 1; default: total = 2 }; return total }
    let function = compile(
        vec![arg("n", "Int")],
        Some("Int"),
        vec![
            Statement::declare("total", Expression::integer(0)),
            Statement::switch(
                Expression::ident("n"),
                vec![
                    CaseBlock::case(
                        Expression::integer(1),
                        Block::new(vec![Statement::set("total", Expression::integer(1))]),
                    ),
                    CaseBlock::default(Block::new(vec![Statement::set(
                        "total",
                        Expression::integer(2),
                    )])),
                ],
            ),
            Statement::ret(Expression::ident("total")),
        ],
    )
    .unwrap();
    assert_eq!(
        function.call(vec![Value::Integer(1)]).unwrap(),
        Some(Value::Integer(1))
    );
    assert_eq!(
        function.call(vec![Value::Integer(3)]).unwrap(),
        Some(Value::Integer(2))
    );
}

#[test]
fn test_duplicate_default() {
    let err = compile(
        vec![arg("n", "Int")],
        Some("Int"),
        vec![Statement::switch(
            Expression::ident("n"),
            vec![CaseBlock::default(returns(1)), CaseBlock::default(returns(2))],
        )],
    )
    .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::DuplicateDefaultSwitchStatements));
}

#[test]
fn test_case_must_compare_with_target() {
    let err = compile(
        vec![arg("n", "Int")],
        None,
        vec![Statement::switch(
            Expression::ident("n"),
            vec![CaseBlock::case(Expression::string("one"), Block::new(vec![]))],
        )],
    )
    .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::UndefinedOperator));
}
