//! Logical expressions for query plans.
//!
//! Expressions are a closed tree of columns, constants, parameters and
//! scalar function calls. Comparison between expressions is a deep
//! [`Expr::equal`] under an evaluation context; scalar functions memoize a
//! canonical hash that has to be refreshed with [`ScalarFunction::rehash`]
//! whenever their arguments are rewritten in place.

use std::fmt;
use std::hash::{Hash, Hasher};

use siphasher::sip::SipHasher13;

use super::schema::Column;
use crate::types::{Collation, DataType, EvalContext, EvalType, FieldType, Literal};

const HASH_KEY0: u64 = 0x6e65_7875_735f_706c;
const HASH_KEY1: u64 = 0x616e_6e65_725f_6578;

fn new_hasher() -> SipHasher13 {
    SipHasher13::new_with_keys(HASH_KEY0, HASH_KEY1)
}

/// A logical expression.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Column reference.
    Column(Column),
    /// Typed constant.
    Constant(Constant),
    /// Scalar function call.
    ScalarFunction(ScalarFunction),
    /// Placeholder for prepared statements.
    Parameter(Parameter),
}

/// A typed constant.
#[derive(Debug, Clone)]
pub struct Constant {
    /// Value.
    pub value: Literal,
    /// Exact type.
    pub field_type: FieldType,
}

/// A prepared-statement parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    /// Zero-based parameter position.
    pub index: usize,
    /// Declared type.
    pub field_type: FieldType,
}

/// Scalar function identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScalarFunc {
    /// `=`
    Eq,
    /// `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// Logical AND.
    And,
    /// Logical OR.
    Or,
    /// Logical NOT.
    Not,
    /// `x IN (a, b, ...)`; the first argument is the subject.
    In,
    /// `x LIKE pattern`
    Like,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Modulo,
    /// String concatenation.
    Concat,
    /// `x IS NULL`
    IsNull,
    /// Any other function, by lowercase name.
    Named(String),
}

impl ScalarFunc {
    /// Resolves a function by name, case-insensitively.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "eq" => ScalarFunc::Eq,
            "ne" => ScalarFunc::NotEq,
            "lt" => ScalarFunc::Lt,
            "le" => ScalarFunc::LtEq,
            "gt" => ScalarFunc::Gt,
            "ge" => ScalarFunc::GtEq,
            "and" => ScalarFunc::And,
            "or" => ScalarFunc::Or,
            "not" => ScalarFunc::Not,
            "in" => ScalarFunc::In,
            "like" => ScalarFunc::Like,
            "plus" => ScalarFunc::Plus,
            "minus" => ScalarFunc::Minus,
            "mul" => ScalarFunc::Multiply,
            "div" => ScalarFunc::Divide,
            "mod" => ScalarFunc::Modulo,
            "concat" => ScalarFunc::Concat,
            "isnull" => ScalarFunc::IsNull,
            other => ScalarFunc::Named(other.to_string()),
        }
    }

    /// Returns the canonical lowercase name.
    pub fn name(&self) -> &str {
        match self {
            ScalarFunc::Eq => "eq",
            ScalarFunc::NotEq => "ne",
            ScalarFunc::Lt => "lt",
            ScalarFunc::LtEq => "le",
            ScalarFunc::Gt => "gt",
            ScalarFunc::GtEq => "ge",
            ScalarFunc::And => "and",
            ScalarFunc::Or => "or",
            ScalarFunc::Not => "not",
            ScalarFunc::In => "in",
            ScalarFunc::Like => "like",
            ScalarFunc::Plus => "plus",
            ScalarFunc::Minus => "minus",
            ScalarFunc::Multiply => "mul",
            ScalarFunc::Divide => "div",
            ScalarFunc::Modulo => "mod",
            ScalarFunc::Concat => "concat",
            ScalarFunc::IsNull => "isnull",
            ScalarFunc::Named(name) => name,
        }
    }

    /// Returns true for `=`, `<`, `<=`, `>` and `>=`.
    pub fn is_ordering_comparison(&self) -> bool {
        matches!(
            self,
            ScalarFunc::Eq | ScalarFunc::Lt | ScalarFunc::LtEq | ScalarFunc::Gt | ScalarFunc::GtEq
        )
    }

    /// Returns true for AND, OR and NOT.
    pub fn is_logical(&self) -> bool {
        matches!(self, ScalarFunc::And | ScalarFunc::Or | ScalarFunc::Not)
    }

    fn infix_symbol(&self) -> Option<&'static str> {
        match self {
            ScalarFunc::Eq => Some("="),
            ScalarFunc::NotEq => Some("<>"),
            ScalarFunc::Lt => Some("<"),
            ScalarFunc::LtEq => Some("<="),
            ScalarFunc::Gt => Some(">"),
            ScalarFunc::GtEq => Some(">="),
            ScalarFunc::And => Some("AND"),
            ScalarFunc::Or => Some("OR"),
            ScalarFunc::Like => Some("LIKE"),
            ScalarFunc::Plus => Some("+"),
            ScalarFunc::Minus => Some("-"),
            ScalarFunc::Multiply => Some("*"),
            ScalarFunc::Divide => Some("/"),
            ScalarFunc::Modulo => Some("%"),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A scalar function call with a memoized canonical hash.
#[derive(Debug, Clone)]
pub struct ScalarFunction {
    /// Function.
    pub func: ScalarFunc,
    /// Arguments.
    pub args: Vec<Expr>,
    /// Return type.
    pub ret_type: FieldType,
    hash_code: u64,
}

impl ScalarFunction {
    /// Creates a function call and computes its hash.
    pub fn new(func: ScalarFunc, args: Vec<Expr>, ret_type: FieldType) -> Self {
        let mut function = Self {
            func,
            args,
            ret_type,
            hash_code: 0,
        };
        function.rehash();
        function
    }

    /// Returns the memoized hash. Stale if the arguments were rewritten
    /// without calling [`rehash`](Self::rehash).
    pub fn hash_code(&self) -> u64 {
        self.hash_code
    }

    /// Recomputes the memoized hash from the current arguments.
    pub fn rehash(&mut self) {
        self.hash_code = Self::compute_hash(&self.func, &self.args, &self.ret_type);
    }

    fn compute_hash(func: &ScalarFunc, args: &[Expr], ret_type: &FieldType) -> u64 {
        let mut hasher = new_hasher();
        2u8.hash(&mut hasher);
        func.name().hash(&mut hasher);
        ret_type.hash(&mut hasher);
        args.len().hash(&mut hasher);
        for arg in args {
            arg.hash_code().hash(&mut hasher);
        }
        hasher.finish()
    }

    fn equal(&self, ctx: &EvalContext, other: &ScalarFunction) -> bool {
        self.func == other.func
            && self.ret_type == other.ret_type
            && self.args.len() == other.args.len()
            && self
                .args
                .iter()
                .zip(&other.args)
                .all(|(a, b)| a.equal(ctx, b))
    }
}

impl Constant {
    /// Values compare binary: `'x'` and `'X'` differ as function arguments
    /// even where a collation equates them. String constants must also
    /// share an effective collation.
    fn equal(&self, ctx: &EvalContext, other: &Constant) -> bool {
        let eval_type = self.field_type.eval_type();
        if eval_type != other.field_type.eval_type() {
            return false;
        }
        if eval_type == EvalType::String
            && ctx.effective_collation(&self.field_type)
                != ctx.effective_collation(&other.field_type)
        {
            return false;
        }
        self.value.equal(&other.value, Collation::Binary)
    }
}

impl Expr {
    // ==== Constructors ====

    /// Creates a column reference.
    pub fn col(column: &Column) -> Self {
        Expr::Column(column.clone())
    }

    /// Creates a typed constant.
    pub fn constant(value: Literal, field_type: FieldType) -> Self {
        Expr::Constant(Constant { value, field_type })
    }

    /// Creates an integer literal.
    pub fn lit_i64(value: i64) -> Self {
        Self::literal(Literal::Integer(value))
    }

    /// Creates a float literal.
    pub fn lit_f64(value: f64) -> Self {
        Self::literal(Literal::Float(value))
    }

    /// Creates a string literal.
    pub fn lit_str(value: impl Into<String>) -> Self {
        Self::literal(Literal::String(value.into()))
    }

    /// Creates a boolean literal.
    pub fn lit_bool(value: bool) -> Self {
        Self::literal(Literal::Boolean(value))
    }

    /// Creates a NULL literal.
    pub fn lit_null() -> Self {
        Self::literal(Literal::Null)
    }

    fn literal(value: Literal) -> Self {
        let field_type = value.default_type();
        Expr::Constant(Constant { value, field_type })
    }

    /// Creates a parameter placeholder.
    pub fn param(index: usize, field_type: FieldType) -> Self {
        Expr::Parameter(Parameter { index, field_type })
    }

    /// Creates a scalar function call.
    pub fn call(func: ScalarFunc, args: Vec<Expr>, ret_type: FieldType) -> Self {
        Expr::ScalarFunction(ScalarFunction::new(func, args, ret_type))
    }

    /// Creates a scalar function call by name.
    pub fn func(name: &str, args: Vec<Expr>, ret_type: FieldType) -> Self {
        Self::call(ScalarFunc::from_name(name), args, ret_type)
    }

    fn predicate(func: ScalarFunc, args: Vec<Expr>) -> Self {
        Self::call(func, args, FieldType::boolean())
    }

    /// Creates an equality comparison.
    pub fn eq(self, other: Expr) -> Self {
        Self::predicate(ScalarFunc::Eq, vec![self, other])
    }

    /// Creates an inequality comparison.
    pub fn not_eq(self, other: Expr) -> Self {
        Self::predicate(ScalarFunc::NotEq, vec![self, other])
    }

    /// Creates a less-than comparison.
    pub fn lt(self, other: Expr) -> Self {
        Self::predicate(ScalarFunc::Lt, vec![self, other])
    }

    /// Creates a less-than-or-equal comparison.
    pub fn lt_eq(self, other: Expr) -> Self {
        Self::predicate(ScalarFunc::LtEq, vec![self, other])
    }

    /// Creates a greater-than comparison.
    pub fn gt(self, other: Expr) -> Self {
        Self::predicate(ScalarFunc::Gt, vec![self, other])
    }

    /// Creates a greater-than-or-equal comparison.
    pub fn gt_eq(self, other: Expr) -> Self {
        Self::predicate(ScalarFunc::GtEq, vec![self, other])
    }

    /// Creates an AND.
    pub fn and(self, other: Expr) -> Self {
        Self::predicate(ScalarFunc::And, vec![self, other])
    }

    /// Creates an OR.
    pub fn or(self, other: Expr) -> Self {
        Self::predicate(ScalarFunc::Or, vec![self, other])
    }

    /// Creates a NOT.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::predicate(ScalarFunc::Not, vec![self])
    }

    /// Creates an IS NULL check.
    pub fn is_null(self) -> Self {
        Self::predicate(ScalarFunc::IsNull, vec![self])
    }

    /// Creates an IN list.
    pub fn in_list(self, list: Vec<Expr>) -> Self {
        let mut args = Vec::with_capacity(list.len() + 1);
        args.push(self);
        args.extend(list);
        Self::predicate(ScalarFunc::In, args)
    }

    /// Creates a LIKE.
    pub fn like(self, pattern: Expr) -> Self {
        Self::predicate(ScalarFunc::Like, vec![self, pattern])
    }

    /// Creates an addition.
    pub fn plus(self, other: Expr) -> Self {
        self.arithmetic(ScalarFunc::Plus, other)
    }

    /// Creates a subtraction.
    pub fn minus(self, other: Expr) -> Self {
        self.arithmetic(ScalarFunc::Minus, other)
    }

    /// Creates a multiplication.
    pub fn multiply(self, other: Expr) -> Self {
        self.arithmetic(ScalarFunc::Multiply, other)
    }

    /// Creates a division.
    pub fn divide(self, other: Expr) -> Self {
        self.arithmetic(ScalarFunc::Divide, other)
    }

    fn arithmetic(self, func: ScalarFunc, other: Expr) -> Self {
        let ret_type = arithmetic_type(&func, self.field_type(), other.field_type());
        Self::call(func, vec![self, other], ret_type)
    }

    // ==== Inspection ====

    /// Returns the exact type.
    pub fn field_type(&self) -> &FieldType {
        match self {
            Expr::Column(c) => &c.field_type,
            Expr::Constant(c) => &c.field_type,
            Expr::ScalarFunction(f) => &f.ret_type,
            Expr::Parameter(p) => &p.field_type,
        }
    }

    /// Returns the evaluation category.
    pub fn eval_type(&self) -> EvalType {
        self.field_type().eval_type()
    }

    /// Returns the scalar function if this is one.
    pub fn as_scalar_function(&self) -> Option<&ScalarFunction> {
        match self {
            Expr::ScalarFunction(f) => Some(f),
            _ => None,
        }
    }

    /// Returns the column if this is a bare column reference.
    pub fn as_column(&self) -> Option<&Column> {
        match self {
            Expr::Column(c) => Some(c),
            _ => None,
        }
    }

    /// Returns all column references in this expression.
    pub fn columns(&self) -> Vec<&Column> {
        let mut columns = Vec::new();
        self.collect_columns(&mut columns);
        columns
    }

    fn collect_columns<'a>(&'a self, columns: &mut Vec<&'a Column>) {
        match self {
            Expr::Column(c) => columns.push(c),
            Expr::ScalarFunction(f) => {
                for arg in &f.args {
                    arg.collect_columns(columns);
                }
            }
            Expr::Constant(_) | Expr::Parameter(_) => {}
        }
    }

    /// Returns the canonical hash.
    ///
    /// Expressions that are [`Expr::equal`] hash identically; scalar
    /// functions return their memoized value.
    pub fn hash_code(&self) -> u64 {
        if let Expr::ScalarFunction(f) = self {
            return f.hash_code;
        }
        let mut hasher = new_hasher();
        match self {
            Expr::Column(c) => {
                0u8.hash(&mut hasher);
                c.unique_id.hash(&mut hasher);
            }
            Expr::Constant(c) => {
                1u8.hash(&mut hasher);
                c.value.hash(&mut hasher);
                c.field_type.eval_type().hash(&mut hasher);
            }
            Expr::Parameter(p) => {
                3u8.hash(&mut hasher);
                p.index.hash(&mut hasher);
            }
            Expr::ScalarFunction(_) => {}
        }
        hasher.finish()
    }

    /// Deep equality under an evaluation context.
    ///
    /// Columns compare by plan-unique id, constants by binary value within
    /// the same evaluation category, functions by name, return type and
    /// arguments.
    /// The memoized hash takes no part.
    pub fn equal(&self, ctx: &EvalContext, other: &Expr) -> bool {
        match (self, other) {
            (Expr::Column(a), Expr::Column(b)) => a.unique_id == b.unique_id,
            (Expr::Constant(a), Expr::Constant(b)) => a.equal(ctx, b),
            (Expr::ScalarFunction(a), Expr::ScalarFunction(b)) => a.equal(ctx, b),
            (Expr::Parameter(a), Expr::Parameter(b)) => a.index == b.index,
            _ => false,
        }
    }

    // ==== Rewriting ====

    /// Rebinds every column reference through `resolve`, refreshing the
    /// hashes of the functions on the way up.
    ///
    /// Returns false if some column could not be resolved; those
    /// references are left untouched.
    pub fn bind_columns<F>(&mut self, resolve: &F) -> bool
    where
        F: Fn(&Column) -> Option<Column>,
    {
        match self {
            Expr::Column(c) => match resolve(c) {
                Some(bound) => {
                    *c = bound;
                    true
                }
                None => false,
            },
            Expr::ScalarFunction(f) => {
                let mut resolved = true;
                for arg in f.args.iter_mut() {
                    resolved &= arg.bind_columns(resolve);
                }
                f.rehash();
                resolved
            }
            Expr::Constant(_) | Expr::Parameter(_) => true,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::ScalarFunction(func) if func.func.infix_symbol().is_some() => {
                write!(f, "({})", self)
            }
            _ => write!(f, "{}", self),
        }
    }
}

/// Structural equality under binary collation.
impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.equal(&EvalContext::new(false), other)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(c) => write!(f, "{}", c),
            Expr::Constant(c) => write!(f, "{}", c.value),
            Expr::Parameter(p) => write!(f, "?{}", p.index),
            Expr::ScalarFunction(func) => match (&func.func, func.args.as_slice()) {
                (op, [left, right]) if op.infix_symbol().is_some() => {
                    left.fmt_operand(f)?;
                    write!(f, " {} ", op.infix_symbol().unwrap_or(op.name()))?;
                    right.fmt_operand(f)
                }
                (ScalarFunc::Not, [arg]) => {
                    write!(f, "NOT ")?;
                    arg.fmt_operand(f)
                }
                (ScalarFunc::IsNull, [arg]) => {
                    arg.fmt_operand(f)?;
                    write!(f, " IS NULL")
                }
                (ScalarFunc::In, [subject, list @ ..]) => {
                    subject.fmt_operand(f)?;
                    let items: Vec<_> = list.iter().map(|e| e.to_string()).collect();
                    write!(f, " IN ({})", items.join(", "))
                }
                (op, args) => {
                    let args: Vec<_> = args.iter().map(|e| e.to_string()).collect();
                    write!(f, "{}({})", op.name(), args.join(", "))
                }
            },
        }
    }
}

fn arithmetic_type(func: &ScalarFunc, left: &FieldType, right: &FieldType) -> FieldType {
    let decimal = FieldType::new(DataType::Decimal {
        precision: None,
        scale: None,
    });
    match (left.eval_type(), right.eval_type()) {
        (EvalType::Real, _) | (_, EvalType::Real) => FieldType::double(),
        (EvalType::Decimal, _) | (_, EvalType::Decimal) => decimal,
        (EvalType::Int, EvalType::Int) if *func == ScalarFunc::Divide => decimal,
        (EvalType::Int, EvalType::Int) => FieldType::bigint(),
        _ => FieldType::double(),
    }
}

// ==== Aggregates and sort keys ====

/// Aggregate function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunc {
    /// Row count.
    Count,
    /// Sum.
    Sum,
    /// Average.
    Avg,
    /// Minimum.
    Min,
    /// Maximum.
    Max,
    /// Value of the first row in the group.
    FirstRow,
}

impl fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunc::Count => write!(f, "COUNT"),
            AggregateFunc::Sum => write!(f, "SUM"),
            AggregateFunc::Avg => write!(f, "AVG"),
            AggregateFunc::Min => write!(f, "MIN"),
            AggregateFunc::Max => write!(f, "MAX"),
            AggregateFunc::FirstRow => write!(f, "FIRSTROW"),
        }
    }
}

/// An aggregate function call.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    /// Function.
    pub func: AggregateFunc,
    /// Arguments.
    pub args: Vec<Expr>,
    /// DISTINCT modifier.
    pub distinct: bool,
    /// Result type.
    pub ret_type: FieldType,
}

impl AggregateExpr {
    /// Creates an aggregate call, inferring the result type.
    pub fn new(func: AggregateFunc, args: Vec<Expr>) -> Self {
        let arg_type = args.first().map(|a| a.field_type().clone());
        let ret_type = match (func, arg_type) {
            (AggregateFunc::Count, _) => FieldType::bigint(),
            (AggregateFunc::Sum | AggregateFunc::Avg, Some(t)) if t.eval_type() == EvalType::Real => {
                FieldType::double()
            }
            (AggregateFunc::Sum | AggregateFunc::Avg, _) => FieldType::new(DataType::Decimal {
                precision: None,
                scale: None,
            }),
            (_, Some(t)) => t,
            (_, None) => FieldType::new(DataType::Null),
        };
        Self {
            func,
            args,
            distinct: false,
            ret_type,
        }
    }

    /// Sets DISTINCT.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

impl fmt::Display for AggregateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<_> = self.args.iter().map(|e| e.to_string()).collect();
        if self.args.is_empty() && self.func == AggregateFunc::Count {
            return write!(f, "COUNT(*)");
        }
        write!(
            f,
            "{}({}{})",
            self.func,
            if self.distinct { "DISTINCT " } else { "" },
            args.join(", ")
        )
    }
}

/// Sort expression.
#[derive(Debug, Clone, PartialEq)]
pub struct SortExpr {
    /// Expression to sort by.
    pub expr: Expr,
    /// Sort direction.
    pub asc: bool,
    /// NULL handling.
    pub nulls_first: bool,
}

impl SortExpr {
    /// Creates a new ascending sort.
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            asc: true,
            nulls_first: false,
        }
    }

    /// Creates a new descending sort.
    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            asc: false,
            nulls_first: true,
        }
    }
}

impl fmt::Display for SortExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if self.asc {
            write!(f, " ASC")?;
        } else {
            write!(f, " DESC")?;
        }
        if self.nulls_first {
            write!(f, " NULLS FIRST")
        } else {
            write!(f, " NULLS LAST")
        }
    }
}
