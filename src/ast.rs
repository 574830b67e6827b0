//! # Syntax Tree
//!
//! The node shapes consumed by both evaluation passes. Trees are produced by an
//! external parser; every node carries its source [`Position`] and can check its
//! own shape through [`Node::validate`]. All nodes are serde-serializable so a
//! tree can be handed over as JSON.
//!
//! ```text
//! func area(r: Float): Float {
//!     if r < 0 {
//!         throw errors.BadRequest("negative radius")
//!     }
//!     return r * r * 3.14
//! }
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::error::{SymbolError, SymbolResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Operator tokens understood by the evaluator.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
pub enum Token {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "**")]
    Pwr,
    #[strum(serialize = "/")]
    Quo,
    #[strum(serialize = "%")]
    Rem,

    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,
    #[strum(serialize = "==")]
    Equals,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "!=")]
    NotEquals,
    #[strum(serialize = "<=")]
    LessEqual,
    #[strum(serialize = ">=")]
    GreaterEqual,

    #[strum(serialize = "=")]
    Assign,
    #[strum(serialize = "+=")]
    AddAssign,
    #[strum(serialize = "-=")]
    SubAssign,
    #[strum(serialize = "*=")]
    MulAssign,
    #[strum(serialize = "**=")]
    PwrAssign,
    #[strum(serialize = "/=")]
    QuoAssign,
    #[strum(serialize = "%=")]
    RemAssign,
}

impl Token {
    pub fn is_operator(&self) -> bool {
        matches!(
            self,
            Token::Add | Token::Sub | Token::Mul | Token::Pwr | Token::Quo | Token::Rem
        )
    }

    pub fn is_comparator(&self) -> bool {
        matches!(
            self,
            Token::And
                | Token::Or
                | Token::Equals
                | Token::Less
                | Token::Greater
                | Token::NotEquals
                | Token::LessEqual
                | Token::GreaterEqual
        )
    }

    pub fn is_assignment(&self) -> bool {
        self.effect_operator().is_some() || *self == Token::Assign
    }

    /// The arithmetic operator applied by a compound assignment (`+=` gives `+`).
    pub fn effect_operator(&self) -> Option<Token> {
        match self {
            Token::AddAssign => Some(Token::Add),
            Token::SubAssign => Some(Token::Sub),
            Token::MulAssign => Some(Token::Mul),
            Token::PwrAssign => Some(Token::Pwr),
            Token::QuoAssign => Some(Token::Quo),
            Token::RemAssign => Some(Token::Rem),
            _ => None,
        }
    }
}

/// Common surface of every syntax node.
pub trait Node {
    fn pos(&self) -> Position;
    fn validate(&self) -> SymbolResult<()>;
}

fn validate_all<'a, N: Node + 'a>(nodes: impl IntoIterator<Item = &'a N>) -> SymbolResult<()> {
    nodes.into_iter().try_for_each(Node::validate)
}

// Selector :: IDENT (PERIOD IDENT)*
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selector {
    pub pos: Position,
    pub members: Vec<String>,
}

impl Selector {
    pub fn new<S: Into<String>>(members: impl IntoIterator<Item = S>) -> Self {
        Self {
            pos: Position::default(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    pub fn path(&self) -> String {
        self.members.join(".")
    }
}

impl Node for Selector {
    fn pos(&self) -> Position {
        self.pos
    }
    fn validate(&self) -> SymbolResult<()> {
        if self.members.is_empty() {
            return Err(SymbolError::syntax(self.pos, "selector has no members"));
        }
        Ok(())
    }
}

// TypeExpression :: (LSQUARE RSQUARE)? PARTIAL? Selector QUESTION?
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeExpression {
    pub pos: Position,
    pub selector: Selector,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default)]
    pub is_optional: bool,
    #[serde(default)]
    pub is_partial: bool,
}

impl TypeExpression {
    pub fn named(name: &str) -> Self {
        Self {
            pos: Position::default(),
            selector: Selector::new([name]),
            is_array: false,
            is_optional: false,
            is_partial: false,
        }
    }

    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    pub fn partial(mut self) -> Self {
        self.is_partial = true;
        self
    }
}

impl Node for TypeExpression {
    fn pos(&self) -> Position {
        self.pos
    }
    fn validate(&self) -> SymbolResult<()> {
        self.selector.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Nil,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    pub pos: Position,
    pub value: LiteralValue,
}

impl Node for Literal {
    fn pos(&self) -> Position {
        self.pos
    }
    fn validate(&self) -> SymbolResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemplatePart {
    Text(String),
    Expression(Expression),
}

// TemplateLiteral :: BACKTICK (STRING | LCURLY Expression RCURLY)* BACKTICK
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateLiteral {
    pub pos: Position,
    pub parts: Vec<TemplatePart>,
}

impl Node for TemplateLiteral {
    fn pos(&self) -> Position {
        self.pos
    }
    fn validate(&self) -> SymbolResult<()> {
        self.parts.iter().try_for_each(|part| match part {
            TemplatePart::Text(_) => Ok(()),
            TemplatePart::Expression(expr) => expr.validate(),
        })
    }
}

// ArrayExpression :: LSQUARE RSQUARE TypeExpression LCURLY (Expression COMMA)* RCURLY
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayExpression {
    pub pos: Position,
    pub init: TypeExpression,
    pub elements: Vec<Expression>,
}

impl Node for ArrayExpression {
    fn pos(&self) -> Position {
        self.pos
    }
    fn validate(&self) -> SymbolResult<()> {
        self.init.validate()?;
        validate_all(&self.elements)
    }
}

// InstanceExpression :: Selector LCURLY PropertyList RCURLY
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceExpression {
    pub pos: Position,
    pub selector: Selector,
    pub properties: PropertyList,
}

impl Node for InstanceExpression {
    fn pos(&self) -> Position {
        self.pos
    }
    fn validate(&self) -> SymbolResult<()> {
        self.selector.validate()?;
        validate_all(&self.properties)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpression {
    pub pos: Position,
    pub operator: Token,
    pub init: Box<Expression>,
}

impl Node for UnaryExpression {
    fn pos(&self) -> Position {
        self.pos
    }
    fn validate(&self) -> SymbolResult<()> {
        if !matches!(self.operator, Token::Add | Token::Sub | Token::Not) {
            return Err(SymbolError::syntax(
                self.pos,
                format!("{} is not a unary operator", self.operator),
            ));
        }
        self.init.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpression {
    pub pos: Position,
    pub operator: Token,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

impl Node for BinaryExpression {
    fn pos(&self) -> Position {
        self.pos
    }
    fn validate(&self) -> SymbolResult<()> {
        if !self.operator.is_operator() && !self.operator.is_comparator() {
            return Err(SymbolError::syntax(
                self.pos,
                format!("{} is not a binary operator", self.operator),
            ));
        }
        self.left.validate()?;
        self.right.validate()
    }
}

// Property :: IDENT COLON Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub pos: Position,
    pub key: String,
    pub init: Expression,
}

// SpreadElement :: ELLIPSIS Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadElement {
    pub pos: Position,
    pub init: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyItem {
    Property(Property),
    Spread(SpreadElement),
}

impl PropertyItem {
    pub fn property(key: &str, init: Expression) -> Self {
        PropertyItem::Property(Property {
            pos: Position::default(),
            key: key.to_string(),
            init,
        })
    }

    pub fn spread(init: Expression) -> Self {
        PropertyItem::Spread(SpreadElement {
            pos: Position::default(),
            init,
        })
    }
}

impl Node for PropertyItem {
    fn pos(&self) -> Position {
        match self {
            PropertyItem::Property(prop) => prop.pos,
            PropertyItem::Spread(spread) => spread.pos,
        }
    }
    fn validate(&self) -> SymbolResult<()> {
        match self {
            PropertyItem::Property(prop) => prop.init.validate(),
            PropertyItem::Spread(spread) => spread.init.validate(),
        }
    }
}

pub type PropertyList = Vec<PropertyItem>;

// ObjectPattern :: LCURLY PropertyList RCURLY
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectPattern {
    pub pos: Position,
    pub properties: PropertyList,
}

impl Node for ObjectPattern {
    fn pos(&self) -> Position {
        self.pos
    }
    fn validate(&self) -> SymbolResult<()> {
        validate_all(&self.properties)
    }
}

// CallExpression :: LPAREN (Expression COMMA)* RPAREN
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpression {
    pub pos: Position,
    pub arguments: Vec<Expression>,
}

impl Node for CallExpression {
    fn pos(&self) -> Position {
        self.pos
    }
    fn validate(&self) -> SymbolResult<()> {
        validate_all(&self.arguments)
    }
}

// IndexExpression :: LSQUARE Expression? (COLON Expression?)? RSQUARE
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexExpression {
    pub pos: Position,
    pub left: Option<Box<Expression>>,
    pub right: Option<Box<Expression>>,
    #[serde(default)]
    pub is_range: bool,
}

impl IndexExpression {
    pub fn at(index: Expression) -> Self {
        Self {
            pos: Position::default(),
            left: Some(Box::new(index)),
            right: None,
            is_range: false,
        }
    }

    pub fn range(left: Option<Expression>, right: Option<Expression>) -> Self {
        Self {
            pos: Position::default(),
            left: left.map(Box::new),
            right: right.map(Box::new),
            is_range: true,
        }
    }
}

impl Node for IndexExpression {
    fn pos(&self) -> Position {
        self.pos
    }
    fn validate(&self) -> SymbolResult<()> {
        if !self.is_range && (self.left.is_none() || self.right.is_some()) {
            return Err(SymbolError::syntax(
                self.pos,
                "index expression needs exactly one index",
            ));
        }
        if let Some(left) = &self.left {
            left.validate()?;
        }
        if let Some(right) = &self.right {
            right.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MemberInit {
    Identifier(String),
    Call(CallExpression),
    Index(IndexExpression),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueMember {
    pub pos: Position,
    pub init: MemberInit,
}

impl ValueMember {
    pub fn ident(name: &str) -> Self {
        Self {
            pos: Position::default(),
            init: MemberInit::Identifier(name.to_string()),
        }
    }

    pub fn call(arguments: Vec<Expression>) -> Self {
        Self {
            pos: Position::default(),
            init: MemberInit::Call(CallExpression {
                pos: Position::default(),
                arguments,
            }),
        }
    }

    pub fn index(index: IndexExpression) -> Self {
        Self {
            pos: index.pos,
            init: MemberInit::Index(index),
        }
    }
}

// ValueExpression :: IDENT (PERIOD IDENT | CallExpression | IndexExpression)*
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueExpression {
    pub pos: Position,
    pub members: Vec<ValueMember>,
}

impl Node for ValueExpression {
    fn pos(&self) -> Position {
        self.pos
    }
    fn validate(&self) -> SymbolResult<()> {
        match self.members.first() {
            Some(ValueMember {
                init: MemberInit::Identifier(_),
                ..
            }) => {}
            _ => {
                return Err(SymbolError::syntax(
                    self.pos,
                    "value expression must start with an identifier",
                ))
            }
        }
        self.members.iter().try_for_each(|member| match &member.init {
            MemberInit::Identifier(_) => Ok(()),
            MemberInit::Call(call) => call.validate(),
            MemberInit::Index(index) => index.validate(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Literal(Literal),
    Template(TemplateLiteral),
    Array(ArrayExpression),
    Instance(InstanceExpression),
    Unary(UnaryExpression),
    Binary(BinaryExpression),
    Object(ObjectPattern),
    Value(ValueExpression),
}

impl Expression {
    fn literal(value: LiteralValue) -> Self {
        Expression::Literal(Literal {
            pos: Position::default(),
            value,
        })
    }

    pub fn string(value: &str) -> Self {
        Self::literal(LiteralValue::String(value.to_string()))
    }

    pub fn integer(value: i64) -> Self {
        Self::literal(LiteralValue::Integer(value))
    }

    pub fn float(value: f64) -> Self {
        Self::literal(LiteralValue::Float(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::literal(LiteralValue::Boolean(value))
    }

    pub fn nil() -> Self {
        Self::literal(LiteralValue::Nil)
    }

    /// A value expression reading a dotted path, e.g. `"user.name"`.
    pub fn ident(path: &str) -> Self {
        Self::chain(path.split('.').map(ValueMember::ident).collect())
    }

    pub fn chain(members: Vec<ValueMember>) -> Self {
        Expression::Value(ValueExpression {
            pos: Position::default(),
            members,
        })
    }

    /// Calls the callable found at a dotted path.
    pub fn call(path: &str, arguments: Vec<Expression>) -> Self {
        let mut members: Vec<ValueMember> = path.split('.').map(ValueMember::ident).collect();
        members.push(ValueMember::call(arguments));
        Self::chain(members)
    }

    pub fn unary(operator: Token, init: Expression) -> Self {
        Expression::Unary(UnaryExpression {
            pos: Position::default(),
            operator,
            init: Box::new(init),
        })
    }

    pub fn binary(operator: Token, left: Expression, right: Expression) -> Self {
        Expression::Binary(BinaryExpression {
            pos: Position::default(),
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn object(properties: PropertyList) -> Self {
        Expression::Object(ObjectPattern {
            pos: Position::default(),
            properties,
        })
    }

    pub fn instance(selector: &str, properties: PropertyList) -> Self {
        Expression::Instance(InstanceExpression {
            pos: Position::default(),
            selector: Selector::new(selector.split('.')),
            properties,
        })
    }

    pub fn array(init: TypeExpression, elements: Vec<Expression>) -> Self {
        Expression::Array(ArrayExpression {
            pos: Position::default(),
            init,
            elements,
        })
    }

    pub fn template(parts: Vec<TemplatePart>) -> Self {
        Expression::Template(TemplateLiteral {
            pos: Position::default(),
            parts,
        })
    }
}

impl Node for Expression {
    fn pos(&self) -> Position {
        match self {
            Expression::Literal(node) => node.pos,
            Expression::Template(node) => node.pos,
            Expression::Array(node) => node.pos,
            Expression::Instance(node) => node.pos,
            Expression::Unary(node) => node.pos,
            Expression::Binary(node) => node.pos,
            Expression::Object(node) => node.pos,
            Expression::Value(node) => node.pos,
        }
    }

    fn validate(&self) -> SymbolResult<()> {
        match self {
            Expression::Literal(node) => node.validate(),
            Expression::Template(node) => node.validate(),
            Expression::Array(node) => node.validate(),
            Expression::Instance(node) => node.validate(),
            Expression::Unary(node) => node.validate(),
            Expression::Binary(node) => node.validate(),
            Expression::Object(node) => node.validate(),
            Expression::Value(node) => node.validate(),
        }
    }
}

// TryStatement :: TRY Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryStatement {
    pub pos: Position,
    pub init: Expression,
}

/// Right-hand side of a declaration or assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Initializer {
    Expression(Expression),
    Try(TryStatement),
}

impl Initializer {
    fn validate(&self) -> SymbolResult<()> {
        match self {
            Initializer::Expression(expr) => expr.validate(),
            Initializer::Try(node) => node.init.validate(),
        }
    }

    fn is_try(&self) -> bool {
        matches!(self, Initializer::Try(_))
    }
}

// DeclarationStatement :: IDENT (COMMA IDENT)? DEFINE (Expression | TryStatement)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclarationStatement {
    pub pos: Position,
    pub target: String,
    #[serde(default)]
    pub secondary_target: Option<String>,
    pub init: Initializer,
}

impl Node for DeclarationStatement {
    fn pos(&self) -> Position {
        self.pos
    }
    fn validate(&self) -> SymbolResult<()> {
        if self.secondary_target.is_some() && !self.init.is_try() {
            return Err(SymbolError::syntax(
                self.pos,
                "secondary target in declaration without try statement",
            ));
        }
        self.init.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AssignmentMemberInit {
    Identifier(String),
    Index(IndexExpression),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentMember {
    pub pos: Position,
    pub init: AssignmentMemberInit,
}

impl AssignmentMember {
    pub fn ident(name: &str) -> Self {
        Self {
            pos: Position::default(),
            init: AssignmentMemberInit::Identifier(name.to_string()),
        }
    }

    pub fn index(index: IndexExpression) -> Self {
        Self {
            pos: index.pos,
            init: AssignmentMemberInit::Index(index),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentTarget {
    pub pos: Position,
    pub members: Vec<AssignmentMember>,
}

// AssignmentStatement :: AssignmentTarget (COMMA IDENT)? ASSIGN_OP (Expression | TryStatement)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentStatement {
    pub pos: Position,
    pub target: AssignmentTarget,
    pub operator: Token,
    #[serde(default)]
    pub secondary_target: Option<String>,
    pub init: Initializer,
}

impl Node for AssignmentStatement {
    fn pos(&self) -> Position {
        self.pos
    }
    fn validate(&self) -> SymbolResult<()> {
        match self.target.members.first() {
            Some(AssignmentMember {
                init: AssignmentMemberInit::Identifier(_),
                ..
            }) => {}
            _ => {
                return Err(SymbolError::syntax(
                    self.pos,
                    "invalid assignment statement target",
                ))
            }
        }
        if !self.operator.is_assignment() {
            return Err(SymbolError::syntax(
                self.pos,
                format!("{} is not an assignment operator", self.operator),
            ));
        }
        if self.secondary_target.is_some() && !self.init.is_try() {
            return Err(SymbolError::syntax(
                self.pos,
                "secondary target in assignment without try statement",
            ));
        }
        for member in &self.target.members {
            if let AssignmentMemberInit::Index(index) = &member.init {
                index.validate()?;
            }
        }
        self.init.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Alternate {
    If(Box<IfStatement>),
    Block(Block),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStatement {
    pub pos: Position,
    pub condition: Expression,
    pub body: Block,
    #[serde(default)]
    pub alternate: Option<Alternate>,
}

impl Node for IfStatement {
    fn pos(&self) -> Position {
        self.pos
    }
    fn validate(&self) -> SymbolResult<()> {
        self.condition.validate()?;
        self.body.validate()?;
        match &self.alternate {
            Some(Alternate::If(alt)) => alt.validate(),
            Some(Alternate::Block(alt)) => alt.validate(),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileStatement {
    pub pos: Position,
    pub condition: Expression,
    pub body: Block,
}

impl Node for WhileStatement {
    fn pos(&self) -> Position {
        self.pos
    }
    fn validate(&self) -> SymbolResult<()> {
        self.condition.validate()?;
        self.body.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ForUpdate {
    Expression(Expression),
    Assignment(AssignmentStatement),
}

// ForCondition :: DeclarationStatement? SEMICOLON Expression SEMICOLON (Expression | AssignmentStatement)?
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForCondition {
    pub pos: Position,
    #[serde(default)]
    pub init: Option<DeclarationStatement>,
    pub condition: Expression,
    #[serde(default)]
    pub update: Option<ForUpdate>,
}

// RangeCondition :: IDENT COMMA IDENT IN Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeCondition {
    pub pos: Position,
    pub index: String,
    pub value: String,
    pub target: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LoopCondition {
    For(ForCondition),
    Range(RangeCondition),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStatement {
    pub pos: Position,
    pub condition: LoopCondition,
    pub body: Block,
}

impl Node for ForStatement {
    fn pos(&self) -> Position {
        self.pos
    }
    fn validate(&self) -> SymbolResult<()> {
        match &self.condition {
            LoopCondition::For(cond) => {
                if let Some(init) = &cond.init {
                    init.validate()?;
                }
                cond.condition.validate()?;
                match &cond.update {
                    Some(ForUpdate::Expression(expr)) => expr.validate()?,
                    Some(ForUpdate::Assignment(stmt)) => stmt.validate()?,
                    None => {}
                }
            }
            LoopCondition::Range(cond) => {
                if cond.index == cond.value {
                    return Err(SymbolError::syntax(
                        cond.pos,
                        "range index and value must have different names",
                    ));
                }
                cond.target.validate()?;
            }
        }
        self.body.validate()
    }
}

// CaseBlock :: (CASE Expression | DEFAULT) COLON Statement*
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseBlock {
    pub pos: Position,
    #[serde(default)]
    pub condition: Option<Expression>,
    #[serde(default)]
    pub is_default: bool,
    pub body: Block,
}

impl CaseBlock {
    pub fn case(condition: Expression, body: Block) -> Self {
        Self {
            pos: Position::default(),
            condition: Some(condition),
            is_default: false,
            body,
        }
    }

    pub fn default(body: Block) -> Self {
        Self {
            pos: Position::default(),
            condition: None,
            is_default: true,
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchBlock {
    pub pos: Position,
    pub target: Expression,
    pub cases: Vec<CaseBlock>,
}

impl Node for SwitchBlock {
    fn pos(&self) -> Position {
        self.pos
    }
    fn validate(&self) -> SymbolResult<()> {
        self.target.validate()?;
        for case in &self.cases {
            match (&case.condition, case.is_default) {
                (Some(condition), false) => condition.validate()?,
                (None, true) => {}
                _ => {
                    return Err(SymbolError::syntax(
                        case.pos,
                        "case block needs either a condition or default",
                    ))
                }
            }
            case.body.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardStatement {
    pub pos: Position,
    pub init: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStatement {
    pub pos: Position,
    pub init: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrowStatement {
    pub pos: Position,
    pub init: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Expression(Expression),
    Declaration(DeclarationStatement),
    Assignment(AssignmentStatement),
    If(IfStatement),
    While(WhileStatement),
    For(ForStatement),
    Switch(SwitchBlock),
    Guard(GuardStatement),
    Return(ReturnStatement),
    Throw(ThrowStatement),
    Try(TryStatement),
    Continue(Position),
    Break(Position),
}

impl Statement {
    pub fn declare(target: &str, init: Expression) -> Self {
        Statement::Declaration(DeclarationStatement {
            pos: Position::default(),
            target: target.to_string(),
            secondary_target: None,
            init: Initializer::Expression(init),
        })
    }

    /// `target, err := try init`
    pub fn declare_try(target: &str, secondary: &str, init: Expression) -> Self {
        Statement::Declaration(DeclarationStatement {
            pos: Position::default(),
            target: target.to_string(),
            secondary_target: Some(secondary.to_string()),
            init: Initializer::Try(TryStatement {
                pos: Position::default(),
                init,
            }),
        })
    }

    pub fn assign(members: Vec<AssignmentMember>, operator: Token, init: Expression) -> Self {
        Statement::Assignment(AssignmentStatement {
            pos: Position::default(),
            target: AssignmentTarget {
                pos: Position::default(),
                members,
            },
            operator,
            secondary_target: None,
            init: Initializer::Expression(init),
        })
    }

    /// Plain `path = init` over a dotted path.
    pub fn set(path: &str, init: Expression) -> Self {
        Self::assign(
            path.split('.').map(AssignmentMember::ident).collect(),
            Token::Assign,
            init,
        )
    }

    pub fn if_else(condition: Expression, body: Block, alternate: Option<Alternate>) -> Self {
        Statement::If(IfStatement {
            pos: Position::default(),
            condition,
            body,
            alternate,
        })
    }

    pub fn while_loop(condition: Expression, body: Block) -> Self {
        Statement::While(WhileStatement {
            pos: Position::default(),
            condition,
            body,
        })
    }

    pub fn for_range(index: &str, value: &str, target: Expression, body: Block) -> Self {
        Statement::For(ForStatement {
            pos: Position::default(),
            condition: LoopCondition::Range(RangeCondition {
                pos: Position::default(),
                index: index.to_string(),
                value: value.to_string(),
                target,
            }),
            body,
        })
    }

    pub fn for_loop(
        init: Option<Statement>,
        condition: Expression,
        update: Option<Statement>,
        body: Block,
    ) -> Self {
        let init = match init {
            Some(Statement::Declaration(decl)) => Some(decl),
            _ => None,
        };
        let update = match update {
            Some(Statement::Assignment(assign)) => Some(ForUpdate::Assignment(assign)),
            Some(Statement::Expression(expr)) => Some(ForUpdate::Expression(expr)),
            _ => None,
        };
        Statement::For(ForStatement {
            pos: Position::default(),
            condition: LoopCondition::For(ForCondition {
                pos: Position::default(),
                init,
                condition,
                update,
            }),
            body,
        })
    }

    pub fn switch(target: Expression, cases: Vec<CaseBlock>) -> Self {
        Statement::Switch(SwitchBlock {
            pos: Position::default(),
            target,
            cases,
        })
    }

    pub fn ret(init: Expression) -> Self {
        Statement::Return(ReturnStatement {
            pos: Position::default(),
            init,
        })
    }

    pub fn throw(init: Expression) -> Self {
        Statement::Throw(ThrowStatement {
            pos: Position::default(),
            init,
        })
    }
}

impl Node for Statement {
    fn pos(&self) -> Position {
        match self {
            Statement::Expression(node) => node.pos(),
            Statement::Declaration(node) => node.pos,
            Statement::Assignment(node) => node.pos,
            Statement::If(node) => node.pos,
            Statement::While(node) => node.pos,
            Statement::For(node) => node.pos,
            Statement::Switch(node) => node.pos,
            Statement::Guard(node) => node.pos,
            Statement::Return(node) => node.pos,
            Statement::Throw(node) => node.pos,
            Statement::Try(node) => node.pos,
            Statement::Continue(pos) | Statement::Break(pos) => *pos,
        }
    }

    fn validate(&self) -> SymbolResult<()> {
        match self {
            Statement::Expression(node) => node.validate(),
            Statement::Declaration(node) => node.validate(),
            Statement::Assignment(node) => node.validate(),
            Statement::If(node) => node.validate(),
            Statement::While(node) => node.validate(),
            Statement::For(node) => node.validate(),
            Statement::Switch(node) => node.validate(),
            Statement::Guard(node) => node.init.validate(),
            Statement::Return(node) => node.init.validate(),
            Statement::Throw(node) => node.init.validate(),
            Statement::Try(node) => node.init.validate(),
            Statement::Continue(_) | Statement::Break(_) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Block {
    pub pos: Position,
    pub statements: Vec<Statement>,
}

impl Block {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self {
            pos: Position::default(),
            statements,
        }
    }
}

impl Node for Block {
    fn pos(&self) -> Position {
        self.pos
    }
    fn validate(&self) -> SymbolResult<()> {
        validate_all(&self.statements)
    }
}

// ArgumentItem :: IDENT COLON TypeExpression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentItem {
    pub pos: Position,
    pub key: String,
    pub init: TypeExpression,
}

impl ArgumentItem {
    pub fn new(key: &str, init: TypeExpression) -> Self {
        Self {
            pos: Position::default(),
            key: key.to_string(),
            init,
        }
    }
}

// ArgumentObject :: LCURLY (ArgumentItem COMMA)* RCURLY
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentObject {
    pub pos: Position,
    pub items: Vec<ArgumentItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArgumentNode {
    Item(ArgumentItem),
    Object(ArgumentObject),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArgumentList {
    pub pos: Position,
    pub items: Vec<ArgumentNode>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionParameters {
    pub pos: Position,
    pub arguments: ArgumentList,
    #[serde(default)]
    pub return_type: Option<TypeExpression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionBlock {
    pub pos: Position,
    pub parameters: FunctionParameters,
    pub body: Block,
}

impl FunctionBlock {
    pub fn new(
        arguments: Vec<ArgumentNode>,
        return_type: Option<TypeExpression>,
        body: Vec<Statement>,
    ) -> Self {
        Self {
            pos: Position::default(),
            parameters: FunctionParameters {
                pos: Position::default(),
                arguments: ArgumentList {
                    pos: Position::default(),
                    items: arguments,
                },
                return_type,
            },
            body: Block::new(body),
        }
    }
}

impl Node for FunctionBlock {
    fn pos(&self) -> Position {
        self.pos
    }
    fn validate(&self) -> SymbolResult<()> {
        let mut seen = std::collections::HashSet::new();
        for item in &self.parameters.arguments.items {
            let keys: Vec<&ArgumentItem> = match item {
                ArgumentNode::Item(item) => vec![item],
                ArgumentNode::Object(object) => object.items.iter().collect(),
            };
            for key in keys {
                key.init.validate()?;
                if !seen.insert(key.key.as_str()) {
                    return Err(SymbolError::syntax(
                        key.pos,
                        format!("duplicate argument {}", key.key),
                    ));
                }
            }
        }
        if let Some(return_type) = &self.parameters.return_type {
            return_type.validate()?;
        }
        self.body.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_token_strings() {
        assert_eq!(Token::Pwr.to_string(), "**");
        assert_eq!(Token::from_str("<=").unwrap(), Token::LessEqual);
        assert_eq!(Token::AddAssign.effect_operator(), Some(Token::Add));
        assert!(Token::Assign.is_assignment());
        assert!(!Token::Not.is_comparator());
    }

    #[test]
    fn test_value_expression_must_start_with_identifier() {
        let expr = Expression::chain(vec![ValueMember::call(vec![])]);
        let err = expr.validate().unwrap_err();
        assert_eq!(err.code(), Some(crate::error::ErrorCode::InvalidSyntaxTree));
    }

    #[test]
    fn test_case_block_shape() {
        let switch = Statement::Switch(SwitchBlock {
            pos: Position::new(4, 2),
            target: Expression::integer(1),
            cases: vec![CaseBlock {
                pos: Position::new(5, 4),
                condition: None,
                is_default: false,
                body: Block::default(),
            }],
        });
        assert!(switch.validate().is_err());
    }

    #[test]
    fn test_secondary_target_requires_try() {
        let decl = Statement::Declaration(DeclarationStatement {
            pos: Position::default(),
            target: "a".to_string(),
            secondary_target: Some("err".to_string()),
            init: Initializer::Expression(Expression::integer(1)),
        });
        assert!(decl.validate().is_err());
        assert!(Statement::declare_try("a", "err", Expression::integer(1))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_tree_round_trips_through_json() {
        let block = Block::new(vec![Statement::ret(Expression::binary(
            Token::Add,
            Expression::integer(1),
            Expression::ident("x"),
        ))]);
        let json = serde_json::to_string(&block).unwrap();
        let back: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(block, back);
    }
}
