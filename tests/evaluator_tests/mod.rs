mod construction_test;
mod dispatch_test;
mod marshal_test;
mod program_test;
mod property_test;
mod scope_test;
mod switch_test;

use hyperlang::{
    config::EvaluatorConfig, symbols::Function, ArgumentItem, ArgumentNode, FunctionBlock,
    Statement, SymbolResult, SymbolTable, TypeExpression,
};

pub fn table() -> SymbolTable {
    SymbolTable::with_builtins(&EvaluatorConfig::default())
}

pub fn arg(key: &str, class: &str) -> ArgumentNode {
    ArgumentNode::Item(ArgumentItem::new(key, TypeExpression::named(class)))
}

/// Checks a function block against the default root table.
pub fn compile(
    arguments: Vec<ArgumentNode>,
    returns: Option<&str>,
    body: Vec<Statement>,
) -> SymbolResult<Function> {
    let block = FunctionBlock::new(arguments, returns.map(TypeExpression::named), body);
    table().resolve_function_block(&block)
}
