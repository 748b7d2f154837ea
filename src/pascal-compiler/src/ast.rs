//! Abstract syntax tree
//!
//! Built once by the parser and read-only afterwards. Every node owns its
//! children; there are no back-pointers.

use crate::symbols::{ScalarType, SymbolKind};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sign {
    #[default]
    Plus,
    Minus,
}

impl Sign {
    pub fn compose(self, other: Sign) -> Sign {
        if self == other { Sign::Plus } else { Sign::Minus }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl BinaryOp {
    pub fn is_relational(self) -> bool {
        !matches!(
            self,
            BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "<>",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub ty: Option<ScalarType>,
}

impl Variable {
    pub fn new(name: impl Into<String>, ty: Option<ScalarType>) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    pub fn is_real(&self) -> bool {
        self.ty == Some(ScalarType::Real)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Value { text: String, ty: ScalarType },
    Variable(Variable),
    Operation {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub sign: Sign,
    pub negated: bool,
    pub kind: ExpressionKind,
}

impl Expression {
    pub fn value(text: impl Into<String>, ty: ScalarType) -> Self {
        ExpressionKind::Value {
            text: text.into(),
            ty,
        }
        .into()
    }

    /// Stand-in for forms whose value is never computed (array elements, calls).
    pub fn zero(ty: ScalarType) -> Self {
        match ty {
            ScalarType::Integer => Self::value("0", ty),
            ScalarType::Real => Self::value("0.0", ty),
        }
    }

    pub fn variable(variable: Variable) -> Self {
        ExpressionKind::Variable(variable).into()
    }

    pub fn operation(op: BinaryOp, left: Expression, right: Expression) -> Self {
        ExpressionKind::Operation {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
        .into()
    }

    /// A literal or variable is real when its type is; an operation when either side is.
    pub fn is_real(&self) -> bool {
        match &self.kind {
            ExpressionKind::Value { ty, .. } => *ty == ScalarType::Real,
            ExpressionKind::Variable(variable) => variable.is_real(),
            ExpressionKind::Operation { left, right, .. } => left.is_real() || right.is_real(),
        }
    }

    /// First relational operation in this subtree whose operands disagree on realness.
    pub fn mismatched_comparison(&self) -> Option<&Expression> {
        let ExpressionKind::Operation { op, left, right } = &self.kind else {
            return None;
        };
        if op.is_relational() && left.is_real() != right.is_real() {
            return Some(self);
        }
        left.mismatched_comparison()
            .or_else(|| right.mismatched_comparison())
    }
}

impl From<ExpressionKind> for Expression {
    fn from(kind: ExpressionKind) -> Self {
        Self {
            sign: Sign::Plus,
            negated: false,
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assignment {
        target: Variable,
        value: Expression,
    },
    Compound(Vec<Statement>),
    If {
        condition: Expression,
        then_branch: Box<Statement>,
        else_branch: Box<Statement>,
    },
    While {
        condition: Expression,
        body: Box<Statement>,
    },
    Read {
        target: Variable,
    },
    Write {
        value: Expression,
    },
}

impl Statement {
    pub fn empty() -> Self {
        Statement::Compound(vec![])
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Declarations {
    pub variables: Vec<Variable>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubprogramKind {
    Function,
    Procedure,
}

impl From<SubprogramKind> for SymbolKind {
    fn from(kind: SubprogramKind) -> Self {
        match kind {
            SubprogramKind::Function => SymbolKind::Function,
            SubprogramKind::Procedure => SymbolKind::Procedure,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subprogram {
    pub name: String,
    pub kind: SubprogramKind,
    pub parameters: Vec<Variable>,
    pub return_type: Option<ScalarType>,
    pub declarations: Declarations,
    pub subprograms: Vec<Subprogram>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub name: String,
    pub declarations: Declarations,
    pub subprograms: Vec<Subprogram>,
    pub main_body: Vec<Statement>,
}

/// Writes one tree node per line, prefixed by `|-- ` and one `--- ` per extra level.
struct TreePrinter<'a, 'b> {
    f: &'a mut fmt::Formatter<'b>,
}

impl TreePrinter<'_, '_> {
    fn line(&mut self, depth: usize, text: impl fmt::Display) -> fmt::Result {
        if depth > 0 {
            write!(self.f, "|-- {}", "--- ".repeat(depth - 1))?;
        }
        writeln!(self.f, "{text}")
    }

    fn program(&mut self, program: &Program) -> fmt::Result {
        self.line(0, format_args!("Program: {}", program.name))?;
        self.declarations(1, &program.declarations)?;
        self.subprograms(1, &program.subprograms)?;
        self.compound(1, &program.main_body)
    }

    fn declarations(&mut self, depth: usize, declarations: &Declarations) -> fmt::Result {
        self.line(depth, "Declarations")?;
        for variable in &declarations.variables {
            self.variable(depth + 1, variable)?;
        }
        Ok(())
    }

    fn subprograms(&mut self, depth: usize, subprograms: &[Subprogram]) -> fmt::Result {
        self.line(depth, "SubProgramDeclarations")?;
        for subprogram in subprograms {
            let kind = match subprogram.kind {
                SubprogramKind::Function => "Function",
                SubprogramKind::Procedure => "Procedure",
            };
            match subprogram.return_type {
                Some(ty) => self.line(
                    depth + 1,
                    format_args!("{kind}: {} returns {ty}", subprogram.name),
                )?,
                None => self.line(depth + 1, format_args!("{kind}: {}", subprogram.name))?,
            }
            self.line(depth + 2, "Parameters")?;
            for parameter in &subprogram.parameters {
                self.variable(depth + 3, parameter)?;
            }
            self.declarations(depth + 2, &subprogram.declarations)?;
            self.subprograms(depth + 2, &subprogram.subprograms)?;
            self.compound(depth + 2, &subprogram.body)?;
        }
        Ok(())
    }

    fn compound(&mut self, depth: usize, statements: &[Statement]) -> fmt::Result {
        self.line(depth, "Compound Statement")?;
        for statement in statements {
            self.statement(depth + 1, statement)?;
        }
        Ok(())
    }

    fn statement(&mut self, depth: usize, statement: &Statement) -> fmt::Result {
        match statement {
            Statement::Assignment { target, value } => {
                self.line(depth, "Assignment")?;
                self.variable(depth + 1, target)?;
                self.expression(depth + 1, value)
            }
            Statement::Compound(statements) => self.compound(depth, statements),
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.line(depth, "If")?;
                self.expression(depth + 1, condition)?;
                self.statement(depth + 1, then_branch)?;
                self.statement(depth + 1, else_branch)
            }
            Statement::While { condition, body } => {
                self.line(depth, "While")?;
                self.expression(depth + 1, condition)?;
                self.statement(depth + 1, body)
            }
            Statement::Read { target } => {
                self.line(depth, "Read")?;
                self.variable(depth + 1, target)
            }
            Statement::Write { value } => {
                self.line(depth, "Write")?;
                self.expression(depth + 1, value)
            }
        }
    }

    fn variable(&mut self, depth: usize, variable: &Variable) -> fmt::Result {
        match variable.ty {
            Some(ty) => self.line(depth, format_args!("Name: {} ({ty})", variable.name)),
            None => self.line(depth, format_args!("Name: {}", variable.name)),
        }
    }

    fn expression(&mut self, depth: usize, expression: &Expression) -> fmt::Result {
        let mut prefix = String::new();
        if expression.negated {
            prefix.push_str("not ");
        }
        if expression.sign == Sign::Minus {
            prefix.push('-');
        }

        match &expression.kind {
            ExpressionKind::Value { text, ty } => {
                self.line(depth, format_args!("Value: {prefix}{text} ({ty})"))
            }
            ExpressionKind::Variable(variable) => match variable.ty {
                Some(ty) => self.line(depth, format_args!("Name: {prefix}{} ({ty})", variable.name)),
                None => self.line(depth, format_args!("Name: {prefix}{}", variable.name)),
            },
            ExpressionKind::Operation { op, left, right } => {
                self.line(depth, format_args!("Operation: {prefix}{}", op.symbol()))?;
                self.expression(depth + 1, left)?;
                self.expression(depth + 1, right)
            }
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        TreePrinter { f }.program(self)
    }
}
