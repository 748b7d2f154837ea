//! MIPS assembly generation
//!
//! One depth-first walk over the syntax tree. Integer expressions are
//! evaluated in `$t` registers and real ones in `$f` registers: a binary
//! operation puts its left operand in register `r`, its right operand in
//! `r + 1` and combines into `r`.

use crate::ast::{BinaryOp, Expression, ExpressionKind, Program, Sign, Statement, Variable};
use crate::symbols::{ScalarType, SymbolTable};

/// Generates the complete assembly text for a parsed program.
pub fn generate(program: &Program, symbols: &SymbolTable) -> String {
    Generator::new(symbols).generate(program)
}

fn t(register: usize) -> String {
    format!("$t{register}")
}

fn f(register: usize) -> String {
    format!("$f{register}")
}

/// Branches to the other label sense.
fn flip(branch: &'static str) -> &'static str {
    match branch {
        "beq" => "bne",
        "bne" => "beq",
        "bc1f" => "bc1t",
        _ => "bc1f",
    }
}

fn signed(text: &str, sign: Sign) -> String {
    match sign {
        Sign::Plus => text.to_string(),
        Sign::Minus => format!("-{text}"),
    }
}

/// Real immediate for a literal, giving integer literals a fraction.
fn real_literal(text: &str, ty: ScalarType) -> String {
    match ty {
        ScalarType::Integer => format!("{text}.0"),
        ScalarType::Real => text.to_string(),
    }
}

/// Sign that can be folded into a literal's immediate instead of being
/// applied with instructions afterwards.
fn literal_sign(expression: &Expression) -> Sign {
    match expression.kind {
        ExpressionKind::Value { .. } if !expression.negated => expression.sign,
        _ => Sign::Plus,
    }
}

pub struct Generator<'a> {
    symbols: &'a SymbolTable,
    asm: String,
    if_count: usize,
    while_count: usize,
    branch_count: usize,
}

impl<'a> Generator<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Self {
            symbols,
            asm: String::new(),
            if_count: 0,
            while_count: 0,
            branch_count: 0,
        }
    }

    pub fn generate(mut self, program: &Program) -> String {
        self.asm.push_str(".data\n");
        for variable in &program.declarations.variables {
            match variable.ty {
                Some(ScalarType::Real) => self
                    .asm
                    .push_str(&format!("{}: .float 0.0\n", variable.name)),
                _ => self.asm.push_str(&format!("{}: .word 0\n", variable.name)),
            }
        }
        self.asm.push_str("newline: .asciiz \"\\n\"\n");

        self.asm.push_str("\n.text\n");
        self.label("main");
        self.emit("addi $sp, $sp, -4");
        self.emit("sw $ra, 0($sp)");

        for statement in &program.main_body {
            self.statement(statement);
        }

        self.emit("lw $ra, 0($sp)");
        self.emit("addi $sp, $sp, 4");
        self.emit("jr $ra");

        self.asm
    }

    fn emit(&mut self, instruction: &str) {
        self.asm.push_str(&format!(" {instruction}\n"));
    }

    fn label(&mut self, name: &str) {
        self.asm.push_str(&format!("{name}:\n"));
    }

    /// Declared type wins over whatever the parser attached to the node.
    fn is_real_target(&self, target: &Variable) -> bool {
        match self.symbols.type_of(&target.name) {
            Some(ty) => ty == ScalarType::Real,
            None => target.is_real(),
        }
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Assignment { target, value } => {
                if value.is_real() {
                    self.real_expression(value, 0);
                    self.emit(&format!("swc1 $f0, {}", target.name));
                } else {
                    self.integer_expression(value, 0);
                    if self.is_real_target(target) {
                        self.emit("mtc1 $t0, $f0");
                        self.emit("cvt.s.w $f0, $f0");
                        self.emit(&format!("swc1 $f0, {}", target.name));
                    } else {
                        self.emit(&format!("sw $t0, {}", target.name));
                    }
                }
            }
            Statement::Compound(statements) => {
                for statement in statements {
                    self.statement(statement);
                }
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let n = self.if_count;
                self.if_count += 1;
                let false_label = format!("if{n}false");
                let end_label = format!("if{n}end");

                self.condition(condition, &false_label);
                self.statement(then_branch);
                self.emit(&format!("j {end_label}"));
                self.label(&false_label);
                self.statement(else_branch);
                self.label(&end_label);
            }
            Statement::While { condition, body } => {
                let n = self.while_count;
                self.while_count += 1;
                let begin_label = format!("while{n}begin");
                let end_label = format!("while{n}end");

                self.label(&begin_label);
                self.condition(condition, &end_label);
                self.statement(body);
                self.emit(&format!("j {begin_label}"));
                self.label(&end_label);
            }
            Statement::Read { target } => {
                if self.is_real_target(target) {
                    self.emit("li $v0, 6");
                    self.emit("syscall");
                    self.emit(&format!("swc1 $f0, {}", target.name));
                } else {
                    self.emit("li $v0, 5");
                    self.emit("syscall");
                    self.emit(&format!("sw $v0, {}", target.name));
                }
            }
            Statement::Write { value } => {
                if value.is_real() {
                    self.load_real_argument(value);
                    self.emit("li $v0, 2");
                } else {
                    self.load_integer_argument(value);
                    self.emit("li $v0, 1");
                }
                self.emit("syscall");
                self.emit("li $v0, 4");
                self.emit("la $a0, newline");
                self.emit("syscall");
            }
        }
    }

    /// Puts an integer `write` argument in `$a0`.
    fn load_integer_argument(&mut self, value: &Expression) {
        match &value.kind {
            ExpressionKind::Value { text, .. } if !value.negated => {
                self.emit(&format!("li $a0, {}", signed(text, value.sign)));
            }
            ExpressionKind::Variable(variable) if !value.negated => {
                self.emit(&format!("lw $a0, {}", variable.name));
                if value.sign == Sign::Minus {
                    self.emit("not $a0, $a0");
                    self.emit("addi $a0, $a0, 1");
                }
            }
            _ => {
                self.integer_expression(value, 0);
                self.emit("move $a0, $t0");
            }
        }
    }

    /// Puts a real `write` argument in `$f12`.
    fn load_real_argument(&mut self, value: &Expression) {
        match &value.kind {
            ExpressionKind::Value { text, ty } if !value.negated => {
                let literal = real_literal(text, *ty);
                self.emit(&format!("li.s $f12, {}", signed(&literal, value.sign)));
            }
            ExpressionKind::Variable(variable) if !value.negated && variable.is_real() => {
                self.emit(&format!("lwc1 $f12, {}", variable.name));
                if value.sign == Sign::Minus {
                    self.emit("neg.s $f12, $f12");
                }
            }
            _ => {
                self.real_expression(value, 0);
                self.emit("mov.s $f12, $f0");
            }
        }
    }

    /// Branches to `false_label` when `condition` does not hold.
    ///
    /// The condition's own sign is ignored; its negation flips the branch.
    fn condition(&mut self, condition: &Expression, false_label: &str) {
        if !condition.is_real() {
            self.integer_kind(&condition.kind, 0, Sign::Plus);
            let branch = if condition.negated { flip("beq") } else { "beq" };
            self.emit(&format!("{branch} $t0, $zero, {false_label}"));
            return;
        }

        let on_false = match &condition.kind {
            ExpressionKind::Operation { op, left, right } if op.is_relational() => {
                self.real_expression(left, 0);
                self.real_expression(right, 1);
                self.compare_real(*op, 0, 1)
            }
            _ => {
                self.real_kind(&condition.kind, 0, Sign::Plus);
                self.emit("mtc1 $zero, $f1");
                self.emit("c.eq.s $f0, $f1");
                "bc1t"
            }
        };
        let branch = if condition.negated {
            flip(on_false)
        } else {
            on_false
        };
        self.emit(&format!("{branch} {false_label}"));
    }

    fn integer_expression(&mut self, expression: &Expression, r: usize) {
        let baked = literal_sign(expression);
        self.integer_kind(&expression.kind, r, baked);

        if expression.negated {
            self.emit(&format!("seq {0}, {0}, $zero", t(r)));
        }
        if expression.sign == Sign::Minus && baked == Sign::Plus {
            self.emit(&format!("not {0}, {0}", t(r)));
            self.emit(&format!("addi {0}, {0}, 1", t(r)));
        }
    }

    fn integer_kind(&mut self, kind: &ExpressionKind, r: usize, literal_sign: Sign) {
        match kind {
            ExpressionKind::Value { text, .. } => {
                self.emit(&format!("li {}, {}", t(r), signed(text, literal_sign)));
            }
            ExpressionKind::Variable(variable) => {
                self.emit(&format!("lw {}, {}", t(r), variable.name));
            }
            ExpressionKind::Operation { op, left, right } => {
                self.integer_expression(left, r);
                self.integer_expression(right, r + 1);
                let (dst, rhs) = (t(r), t(r + 1));
                match op {
                    BinaryOp::Add => self.emit(&format!("add {dst}, {dst}, {rhs}")),
                    BinaryOp::Subtract => self.emit(&format!("sub {dst}, {dst}, {rhs}")),
                    BinaryOp::Multiply => {
                        self.emit(&format!("mult {dst}, {rhs}"));
                        self.emit(&format!("mflo {dst}"));
                    }
                    BinaryOp::Divide => {
                        self.emit(&format!("div {dst}, {rhs}"));
                        self.emit(&format!("mflo {dst}"));
                    }
                    BinaryOp::Less => self.emit(&format!("slt {dst}, {dst}, {rhs}")),
                    BinaryOp::LessEqual => self.emit(&format!("sle {dst}, {dst}, {rhs}")),
                    BinaryOp::Greater => self.emit(&format!("sgt {dst}, {dst}, {rhs}")),
                    BinaryOp::GreaterEqual => self.emit(&format!("sge {dst}, {dst}, {rhs}")),
                    BinaryOp::Equal => self.emit(&format!("seq {dst}, {dst}, {rhs}")),
                    BinaryOp::NotEqual => self.emit(&format!("sne {dst}, {dst}, {rhs}")),
                }
            }
        }
    }

    fn real_expression(&mut self, expression: &Expression, r: usize) {
        let baked = literal_sign(expression);
        self.real_kind(&expression.kind, r, baked);

        if expression.negated {
            // not x is 1.0 exactly when x is 0.0
            self.emit(&format!("mtc1 $zero, {}", f(r + 1)));
            self.real_flag(BinaryOp::Equal, r, r + 1, r);
        }
        if expression.sign == Sign::Minus && baked == Sign::Plus {
            self.emit(&format!("neg.s {0}, {0}", f(r)));
        }
    }

    fn real_kind(&mut self, kind: &ExpressionKind, r: usize, literal_sign: Sign) {
        match kind {
            ExpressionKind::Value { text, ty } => {
                let literal = real_literal(text, *ty);
                self.emit(&format!("li.s {}, {}", f(r), signed(&literal, literal_sign)));
            }
            ExpressionKind::Variable(variable) if variable.is_real() => {
                self.emit(&format!("lwc1 {}, {}", f(r), variable.name));
            }
            ExpressionKind::Variable(variable) => {
                self.emit(&format!("lw {}, {}", t(r), variable.name));
                self.emit(&format!("mtc1 {}, {}", t(r), f(r)));
                self.emit(&format!("cvt.s.w {0}, {0}", f(r)));
            }
            ExpressionKind::Operation { op, left, right } => {
                self.real_expression(left, r);
                self.real_expression(right, r + 1);
                let (dst, rhs) = (f(r), f(r + 1));
                match op {
                    BinaryOp::Add => self.emit(&format!("add.s {dst}, {dst}, {rhs}")),
                    BinaryOp::Subtract => self.emit(&format!("sub.s {dst}, {dst}, {rhs}")),
                    BinaryOp::Multiply => self.emit(&format!("mul.s {dst}, {dst}, {rhs}")),
                    BinaryOp::Divide => self.emit(&format!("div.s {dst}, {dst}, {rhs}")),
                    _ => self.real_flag(*op, r, r + 1, r),
                }
            }
        }
    }

    /// Sets the coprocessor flag for `lhs op rhs` and returns the branch
    /// taken when the comparison is false.
    fn compare_real(&mut self, op: BinaryOp, lhs: usize, rhs: usize) -> &'static str {
        let (lhs, rhs) = (f(lhs), f(rhs));
        match op {
            BinaryOp::Less => self.emit(&format!("c.lt.s {lhs}, {rhs}")),
            BinaryOp::LessEqual => self.emit(&format!("c.le.s {lhs}, {rhs}")),
            BinaryOp::Greater => self.emit(&format!("c.lt.s {rhs}, {lhs}")),
            BinaryOp::GreaterEqual => self.emit(&format!("c.le.s {rhs}, {lhs}")),
            _ => self.emit(&format!("c.eq.s {lhs}, {rhs}")),
        }
        match op {
            BinaryOp::NotEqual => "bc1t",
            _ => "bc1f",
        }
    }

    /// Materializes a real comparison as 1.0 or 0.0 in `dst`.
    fn real_flag(&mut self, op: BinaryOp, lhs: usize, rhs: usize, dst: usize) {
        let n = self.branch_count;
        self.branch_count += 1;
        let false_label = format!("branch{n}false");
        let end_label = format!("branch{n}end");

        let on_false = self.compare_real(op, lhs, rhs);
        self.emit(&format!("{on_false} {false_label}"));
        self.emit(&format!("li.s {}, 1.0", f(dst)));
        self.emit(&format!("j {end_label}"));
        self.label(&false_label);
        self.emit(&format!("mtc1 $zero, {}", f(dst)));
        self.label(&end_label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn compile(code: &str) -> String {
        let parse = parse(code).unwrap();
        generate(&parse.program, &parse.symbols)
    }

    /// Instruction lines with their leading space removed.
    fn lines(asm: &str) -> Vec<&str> {
        asm.lines().map(str::trim).collect()
    }

    fn assert_sequence(asm: &str, expected: &[&str]) {
        let lines = lines(asm);
        let found = lines
            .windows(expected.len())
            .any(|window| window == expected);
        assert!(found, "sequence {expected:#?} not found in:\n{asm}");
    }

    #[test]
    fn test_integer_program_output() {
        let asm = compile("program t; var x: integer; begin x := 2 + 3; write(x) end.");
        let expected = r#".data
x: .word 0
newline: .asciiz "\n"

.text
main:
 addi $sp, $sp, -4
 sw $ra, 0($sp)
 li $t0, 2
 li $t1, 3
 add $t0, $t0, $t1
 sw $t0, x
 lw $a0, x
 li $v0, 1
 syscall
 li $v0, 4
 la $a0, newline
 syscall
 lw $ra, 0($sp)
 addi $sp, $sp, 4
 jr $ra
"#;
        assert_eq!(asm, expected);
    }

    #[test]
    fn test_data_section_follows_declaration_order() {
        let asm = compile("program t; var b: real; var a: integer; begin end.");
        assert!(asm.starts_with(".data\nb: .float 0.0\na: .word 0\nnewline: .asciiz"));
    }

    #[test]
    fn test_integer_operators() {
        let asm = compile("program t; var x, y: integer; begin x := x * y / 2 end.");
        assert_sequence(
            &asm,
            &[
                "lw $t0, x",
                "lw $t1, y",
                "mult $t0, $t1",
                "mflo $t0",
                "li $t1, 2",
                "div $t0, $t1",
                "mflo $t0",
                "sw $t0, x",
            ],
        );
    }

    #[test]
    fn test_unary_minus() {
        let asm = compile("program t; var x, y: integer; begin x := -5; y := -x end.");
        assert_sequence(&asm, &["li $t0, -5", "sw $t0, x"]);
        assert_sequence(
            &asm,
            &["lw $t0, x", "not $t0, $t0", "addi $t0, $t0, 1", "sw $t0, y"],
        );

        let asm = compile("program t; var r: real; begin r := -r end.");
        assert_sequence(&asm, &["lwc1 $f0, r", "neg.s $f0, $f0", "swc1 $f0, r"]);
    }

    #[test]
    fn test_integer_widened_in_real_context() {
        let asm = compile("program t; var x: integer; var r: real; begin r := r + x end.");
        assert_sequence(
            &asm,
            &[
                "lwc1 $f0, r",
                "lw $t1, x",
                "mtc1 $t1, $f1",
                "cvt.s.w $f1, $f1",
                "add.s $f0, $f0, $f1",
                "swc1 $f0, r",
            ],
        );
    }

    #[test]
    fn test_integer_value_converted_on_real_store() {
        let asm = compile("program t; var x: integer; var r: real; begin r := x + 1 end.");
        assert_sequence(
            &asm,
            &[
                "lw $t0, x",
                "li $t1, 1",
                "add $t0, $t0, $t1",
                "mtc1 $t0, $f0",
                "cvt.s.w $f0, $f0",
                "swc1 $f0, r",
            ],
        );

        let asm = compile("program t; var r: real; begin r := 7 / 2 end.");
        assert_sequence(
            &asm,
            &[
                "li $t0, 7",
                "li $t1, 2",
                "div $t0, $t1",
                "mflo $t0",
                "mtc1 $t0, $f0",
                "cvt.s.w $f0, $f0",
                "swc1 $f0, r",
            ],
        );
        assert!(!asm.contains("div.s"));
    }

    #[test]
    fn test_nested_if_labels_are_distinct() {
        let code = r#"
            program t;
            var a, b, x: integer;
            begin
                if a < b then
                    if a = b then x := 1 else x := 2
                else
                    x := 3
            end.
        "#;
        let asm = compile(code);
        assert_sequence(
            &asm,
            &["lw $t0, a", "lw $t1, b", "slt $t0, $t0, $t1", "beq $t0, $zero, if0false"],
        );
        assert_sequence(&asm, &["seq $t0, $t0, $t1", "beq $t0, $zero, if1false"]);
        for label in ["if0false:", "if0end:", "if1false:", "if1end:"] {
            assert_eq!(lines(&asm).iter().filter(|line| **line == label).count(), 1);
        }

        // the outer false label follows the inner statement entirely
        let inner_end = asm.find("if1end:").unwrap();
        let outer_false = asm.find("if0false:").unwrap();
        assert!(inner_end < outer_false);
    }

    #[test]
    fn test_while_loop_shape() {
        let code = "program t; var x: integer; begin while x < 10 do x := x + 1 end.";
        let asm = compile(code);
        assert_sequence(
            &asm,
            &[
                "while0begin:",
                "lw $t0, x",
                "li $t1, 10",
                "slt $t0, $t0, $t1",
                "beq $t0, $zero, while0end",
                "lw $t0, x",
                "li $t1, 1",
                "add $t0, $t0, $t1",
                "sw $t0, x",
                "j while0begin",
                "while0end:",
            ],
        );
    }

    #[test]
    fn test_counters_are_independent() {
        let code = r#"
            program t;
            var x: integer;
            begin
                while x < 3 do
                    if x = 1 then x := 2 else x := 3;
                if x > 0 then x := 0 else x := 1
            end.
        "#;
        let asm = compile(code);
        assert!(asm.contains("while0begin:"));
        assert!(asm.contains("if0false:"));
        assert!(asm.contains("if1false:"));
        assert!(!asm.contains("while1"));
    }

    #[test]
    fn test_negated_condition_flips_branch() {
        let asm = compile("program t; var x: integer; begin while not x do x := 1 end.");
        assert_sequence(&asm, &["lw $t0, x", "bne $t0, $zero, while0end"]);
    }

    #[test]
    fn test_real_conditions() {
        let asm = compile("program t; var r: real; begin while r < 2.5 do r := r + 1 end.");
        assert_sequence(
            &asm,
            &[
                "lwc1 $f0, r",
                "li.s $f1, 2.5",
                "c.lt.s $f0, $f1",
                "bc1f while0end",
            ],
        );

        let asm = compile("program t; var r: real; begin if r >= 1.0 then r := 0 else r := 1 end.");
        assert_sequence(&asm, &["c.le.s $f1, $f0", "bc1f if0false"]);

        let asm = compile("program t; var r: real; begin if r <> 1.0 then r := 0 else r := 1 end.");
        assert_sequence(&asm, &["c.eq.s $f0, $f1", "bc1t if0false"]);

        let asm = compile("program t; var r: real; begin if r then r := 0 else r := 1 end.");
        assert_sequence(
            &asm,
            &["lwc1 $f0, r", "mtc1 $zero, $f1", "c.eq.s $f0, $f1", "bc1t if0false"],
        );
    }

    #[test]
    fn test_real_comparison_as_value() {
        let asm = compile("program t; var r: real; begin r := r < 2.0 end.");
        assert_sequence(
            &asm,
            &[
                "lwc1 $f0, r",
                "li.s $f1, 2.0",
                "c.lt.s $f0, $f1",
                "bc1f branch0false",
                "li.s $f0, 1.0",
                "j branch0end",
                "branch0false:",
                "mtc1 $zero, $f0",
                "branch0end:",
                "swc1 $f0, r",
            ],
        );
    }

    #[test]
    fn test_read_and_write_by_type() {
        let code = r#"
            program t;
            var x: integer;
            var r: real;
            begin
                read(x);
                read(r);
                write(r);
                write(1.5);
                write(x + 1)
            end.
        "#;
        let asm = compile(code);
        assert_sequence(&asm, &["li $v0, 5", "syscall", "sw $v0, x"]);
        assert_sequence(&asm, &["li $v0, 6", "syscall", "swc1 $f0, r"]);
        assert_sequence(&asm, &["lwc1 $f12, r", "li $v0, 2", "syscall"]);
        assert_sequence(&asm, &["li.s $f12, 1.5", "li $v0, 2"]);
        assert_sequence(
            &asm,
            &[
                "add $t0, $t0, $t1",
                "move $a0, $t0",
                "li $v0, 1",
                "syscall",
                "li $v0, 4",
                "la $a0, newline",
                "syscall",
            ],
        );
    }

    #[test]
    fn test_subprograms_are_not_lowered() {
        let code = r#"
            program t;
            var x: integer;
            procedure p(a: integer);
                begin write(a) end;
            begin
                x := 1;
                p(x)
            end.
        "#;
        let asm = compile(code);
        assert!(!asm.contains("lw $a0, a"));
        assert!(!asm.contains("p:"));
    }
}
