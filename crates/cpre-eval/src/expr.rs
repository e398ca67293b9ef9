//! Constant-expression evaluation for `#if`/`#elif` conditions.
//!
//! Terms evaluate to one of three runtime kinds: signed 32-bit integer,
//! unsigned 8-bit char, or double float. Arithmetic promotes to the widest
//! kind present (float > int > char); bitwise and shift operators require
//! integer kinds and truncate float operands with a diagnostic. An
//! identifier bound in the environment is expanded, re-parsed as an
//! expression, and evaluated; an unbound identifier is zero (char kind).
//! `defined X` / `defined(X)` query the environment without expanding `X`.

use crate::expand::ExpandEnv;
use crate::{Binding, Evaluator};
use cpre_ast::{BinOp, CallElem, Expr, IdentElem, LitElem, LitKind, UnaryOp};
use cpre_span::{BytePos, Span};

/// Re-evaluation depth bound for identifiers and calls in expression
/// position, which re-enter the evaluator through a re-parse.
const MAX_EXPR_DEPTH: usize = 64;

/// A runtime value in a constant expression.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Value {
    /// Signed 32-bit integer.
    Int(i32),
    /// Unsigned 8-bit char.
    Char(u8),
    /// Double-precision float.
    Float(f64),
}

impl Value {
    /// Numeric-context truth: non-zero is true.
    pub fn truthy(self) -> bool {
        match self {
            Value::Int(v) => v != 0,
            Value::Char(v) => v != 0,
            Value::Float(v) => v != 0.0,
        }
    }

    fn as_i32(self) -> i32 {
        match self {
            Value::Int(v) => v,
            Value::Char(v) => i32::from(v),
            Value::Float(v) => v as i32,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Value::Int(v) => f64::from(v),
            Value::Char(v) => f64::from(v),
            Value::Float(v) => v,
        }
    }

    fn is_float(self) -> bool {
        matches!(self, Value::Float(_))
    }

    fn is_char(self) -> bool {
        matches!(self, Value::Char(_))
    }
}

fn bool_value(b: bool) -> Value {
    Value::Int(i32::from(b))
}

fn at(pos: BytePos) -> Span {
    Span::new(pos, pos + 1)
}

impl Evaluator<'_> {
    /// Evaluate a constant expression.
    pub(crate) fn eval_expr(&mut self, expr: &Expr) -> Value {
        match expr {
            Expr::Bad(..) => Value::Char(0),
            Expr::Lit(lit) => self.eval_lit(lit),
            Expr::Ident(ident) => self.eval_ident_expr(ident),
            Expr::Call(call) => self.eval_call_expr(call),
            Expr::Paren(inner) => self.eval_expr(inner),
            Expr::Unary { pos, op, x } => self.eval_unary(*op, x, *pos),
            Expr::Binary { x, pos, op, y } => self.eval_binary(x, *op, y, *pos),
        }
    }

    // ========================================================================
    // Terms
    // ========================================================================

    fn eval_lit(&mut self, lit: &LitElem) -> Value {
        match lit.kind {
            LitKind::Int => match parse_int_lexeme(&lit.text) {
                Some(v) => Value::Int(v),
                None => {
                    self.error(lit.span(), format!("invalid integer literal `{}`", lit.text));
                    Value::Int(0)
                }
            },
            LitKind::Float => match parse_float_lexeme(&lit.text) {
                Some(v) => Value::Float(v),
                None => {
                    self.error(lit.span(), format!("invalid float literal `{}`", lit.text));
                    Value::Float(0.0)
                }
            },
            LitKind::Char => match decode_char(&lit.text) {
                Some(v) => Value::Char(v),
                None => {
                    self.error(
                        lit.span(),
                        format!("invalid character literal `{}`", lit.text),
                    );
                    Value::Char(0)
                }
            },
            // A string literal has no numeric value; it evaluates to zero.
            LitKind::Str => Value::Char(0),
        }
    }

    /// An identifier term: `__LINE__` is the anchor's line number; a bound
    /// name expands, re-parses, and evaluates; an unbound name is zero.
    fn eval_ident_expr(&mut self, ident: &IdentElem) -> Value {
        if ident.name == "__LINE__" {
            return Value::Int(self.line_number(ident.pos) as i32);
        }
        if !self.macros.contains_key(&ident.name) {
            return Value::Char(0);
        }
        if self.expr_depth >= MAX_EXPR_DEPTH {
            self.error(ident.span(), "expression expansion too deep");
            return Value::Char(0);
        }

        let mut env = ExpandEnv::global(Some(ident.pos));
        let expansion = self.expand_ident(ident, &mut env);
        let (expr, diags) = cpre_parser::parse_expression(&expansion, ident.pos);
        if !diags.is_empty() {
            self.error(
                ident.span(),
                format!("bad expression from expansion of `{}`", ident.name),
            );
        }
        // A self-suppressed expansion comes back as the bare name; treat it
        // like any other non-numeric identifier instead of recursing.
        if matches!(&expr, Expr::Ident(i) if i.name == ident.name) {
            return Value::Char(0);
        }
        self.expr_depth += 1;
        let value = self.eval_expr(&expr);
        self.expr_depth -= 1;
        value
    }

    /// A call term: a defined function-like macro expands, re-parses, and
    /// evaluates; any other call form is zero.
    fn eval_call_expr(&mut self, call: &CallElem) -> Value {
        if !matches!(self.macros.get(&call.name.name), Some(Binding::Function(_))) {
            return Value::Char(0);
        }
        if self.expr_depth >= MAX_EXPR_DEPTH {
            self.error(call.name.span(), "expression expansion too deep");
            return Value::Char(0);
        }

        let mut env = ExpandEnv::global(Some(call.name.pos));
        let expansion = self.expand_call(call, &mut env);
        let (expr, diags) = cpre_parser::parse_expression(&expansion, call.name.pos);
        if !diags.is_empty() {
            self.error(
                call.name.span(),
                format!("bad expression from expansion of `{}`", call.name.name),
            );
        }
        self.expr_depth += 1;
        let value = self.eval_expr(&expr);
        self.expr_depth -= 1;
        value
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn eval_unary(&mut self, op: UnaryOp, x: &Expr, pos: BytePos) -> Value {
        match op {
            UnaryOp::Defined => {
                let Some(name) = defined_operand(x) else {
                    self.error(at(pos), "'defined' is not followed by an identifier");
                    return Value::Char(0);
                };
                Value::Char(u8::from(self.macros.contains_key(name)))
            }
            UnaryOp::Not => {
                let v = self.eval_expr(x);
                bool_value(!v.truthy())
            }
            UnaryOp::Neg => match self.eval_expr(x) {
                Value::Int(v) => Value::Int(v.wrapping_neg()),
                Value::Char(v) => Value::Char(v.wrapping_neg()),
                Value::Float(v) => Value::Float(-v),
            },
            UnaryOp::BitNot => match self.eval_expr(x) {
                Value::Int(v) => Value::Int(!v),
                Value::Char(v) => Value::Char(!v),
                Value::Float(v) => {
                    self.error(at(pos), "float operand in integer operator");
                    Value::Int(!(v as i32))
                }
            },
        }
    }

    fn eval_binary(&mut self, x: &Expr, op: BinOp, y: &Expr, pos: BytePos) -> Value {
        let xv = self.eval_expr(x);
        let yv = self.eval_expr(y);
        match op {
            BinOp::Add
            | BinOp::Sub
            | BinOp::Mul
            | BinOp::Div
            | BinOp::Eq
            | BinOp::Ne
            | BinOp::Lt
            | BinOp::Le
            | BinOp::Gt
            | BinOp::Ge
            | BinOp::LogAnd
            | BinOp::LogOr => self.eval_promoted(xv, op, yv, pos),
            BinOp::Shl | BinOp::Shr | BinOp::Rem | BinOp::And | BinOp::Or | BinOp::Xor => {
                self.eval_integer_only(xv, op, yv, x.pos(), y.pos())
            }
        }
    }

    /// Arithmetic, comparisons and logic under widest-kind promotion.
    fn eval_promoted(&mut self, xv: Value, op: BinOp, yv: Value, pos: BytePos) -> Value {
        if xv.is_float() || yv.is_float() {
            let (x, y) = (xv.as_f64(), yv.as_f64());
            return match op {
                BinOp::Add => Value::Float(x + y),
                BinOp::Sub => Value::Float(x - y),
                BinOp::Mul => Value::Float(x * y),
                BinOp::Div => Value::Float(x / y),
                BinOp::Eq => bool_value(x == y),
                BinOp::Ne => bool_value(x != y),
                BinOp::Lt => bool_value(x < y),
                BinOp::Le => bool_value(x <= y),
                BinOp::Gt => bool_value(x > y),
                BinOp::Ge => bool_value(x >= y),
                BinOp::LogAnd => bool_value(xv.truthy() && yv.truthy()),
                BinOp::LogOr => bool_value(xv.truthy() || yv.truthy()),
                _ => unreachable!(),
            };
        }

        if xv.is_char() && yv.is_char() {
            let (x, y) = (xv.as_i32() as u8, yv.as_i32() as u8);
            return match op {
                BinOp::Add => Value::Char(x.wrapping_add(y)),
                BinOp::Sub => Value::Char(x.wrapping_sub(y)),
                BinOp::Mul => Value::Char(x.wrapping_mul(y)),
                BinOp::Div => {
                    if y == 0 {
                        self.error(at(pos), "division by zero in #if expression");
                        Value::Char(0)
                    } else {
                        Value::Char(x / y)
                    }
                }
                BinOp::Eq => bool_value(x == y),
                BinOp::Ne => bool_value(x != y),
                BinOp::Lt => bool_value(x < y),
                BinOp::Le => bool_value(x <= y),
                BinOp::Gt => bool_value(x > y),
                BinOp::Ge => bool_value(x >= y),
                BinOp::LogAnd => bool_value(xv.truthy() && yv.truthy()),
                BinOp::LogOr => bool_value(xv.truthy() || yv.truthy()),
                _ => unreachable!(),
            };
        }

        let (x, y) = (xv.as_i32(), yv.as_i32());
        match op {
            BinOp::Add => Value::Int(x.wrapping_add(y)),
            BinOp::Sub => Value::Int(x.wrapping_sub(y)),
            BinOp::Mul => Value::Int(x.wrapping_mul(y)),
            BinOp::Div => {
                if y == 0 {
                    self.error(at(pos), "division by zero in #if expression");
                    Value::Int(0)
                } else {
                    Value::Int(x.wrapping_div(y))
                }
            }
            BinOp::Eq => bool_value(x == y),
            BinOp::Ne => bool_value(x != y),
            BinOp::Lt => bool_value(x < y),
            BinOp::Le => bool_value(x <= y),
            BinOp::Gt => bool_value(x > y),
            BinOp::Ge => bool_value(x >= y),
            BinOp::LogAnd => bool_value(xv.truthy() && yv.truthy()),
            BinOp::LogOr => bool_value(xv.truthy() || yv.truthy()),
            _ => unreachable!(),
        }
    }

    /// Bitwise, shift and modulo operators: integer kinds only. A float
    /// operand is diagnosed and truncated to int.
    fn eval_integer_only(
        &mut self,
        xv: Value,
        op: BinOp,
        yv: Value,
        x_pos: BytePos,
        y_pos: BytePos,
    ) -> Value {
        if xv.is_float() {
            self.error(at(x_pos), "float operand in integer operator");
        }
        if yv.is_float() {
            self.error(at(y_pos), "float operand in integer operator");
        }

        if xv.is_char() && yv.is_char() {
            let (x, y) = (xv.as_i32() as u8, yv.as_i32() as u8);
            return match op {
                BinOp::Shl => Value::Char(x.wrapping_shl(u32::from(y))),
                BinOp::Shr => Value::Char(x.wrapping_shr(u32::from(y))),
                BinOp::Rem => {
                    if y == 0 {
                        self.error(at(y_pos), "modulo by zero in #if expression");
                        Value::Char(0)
                    } else {
                        Value::Char(x % y)
                    }
                }
                BinOp::And => Value::Char(x & y),
                BinOp::Or => Value::Char(x | y),
                BinOp::Xor => Value::Char(x ^ y),
                _ => unreachable!(),
            };
        }

        let (x, y) = (xv.as_i32(), yv.as_i32());
        match op {
            BinOp::Shl => Value::Int(x.wrapping_shl(y as u32)),
            BinOp::Shr => Value::Int(x.wrapping_shr(y as u32)),
            BinOp::Rem => {
                if y == 0 {
                    self.error(at(y_pos), "modulo by zero in #if expression");
                    Value::Int(0)
                } else {
                    Value::Int(x.wrapping_rem(y))
                }
            }
            BinOp::And => Value::Int(x & y),
            BinOp::Or => Value::Int(x | y),
            BinOp::Xor => Value::Int(x ^ y),
            _ => unreachable!(),
        }
    }
}

/// Unwrap the identifier operand of `defined`, through parentheses.
fn defined_operand(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Ident(ident) => Some(&ident.name),
        Expr::Paren(inner) => defined_operand(inner),
        _ => None,
    }
}

// ============================================================================
// Literal decoding
// ============================================================================

/// Parse an integer lexeme per its base prefix, ignoring `u`/`l` suffixes.
fn parse_int_lexeme(text: &str) -> Option<i32> {
    let t = text.trim_end_matches(|c| matches!(c, 'u' | 'U' | 'l' | 'L'));
    let (digits, radix) = if let Some(h) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        (h, 16)
    } else if let Some(b) = t.strip_prefix("0b").or_else(|| t.strip_prefix("0B")) {
        (b, 2)
    } else if t.len() > 1 && t.starts_with('0') {
        (&t[1..], 8)
    } else {
        (t, 10)
    };
    if digits.is_empty() {
        return None;
    }
    i32::from_str_radix(digits, radix).ok()
}

/// Parse a floating lexeme, ignoring `f`/`l` suffixes. Hexadecimal floats
/// (`0x…p±n`) are folded by hand; everything else goes through the
/// standard parser.
fn parse_float_lexeme(text: &str) -> Option<f64> {
    let t = text.trim_end_matches(|c| matches!(c, 'f' | 'F' | 'l' | 'L'));
    if t.starts_with("0x") || t.starts_with("0X") {
        parse_hex_float(t)
    } else {
        t.parse().ok()
    }
}

fn parse_hex_float(t: &str) -> Option<f64> {
    let rest = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X"))?;
    let (mant, exp) = rest.split_once(['p', 'P'])?;
    let exp: i32 = exp.parse().ok()?;
    let (int_part, frac_part) = match mant.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mant, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    let mut value = 0.0f64;
    for c in int_part.chars() {
        value = value * 16.0 + f64::from(c.to_digit(16)?);
    }
    let mut scale = 1.0 / 16.0;
    for c in frac_part.chars() {
        value += f64::from(c.to_digit(16)?) * scale;
        scale /= 16.0;
    }
    Some(value * 2.0f64.powi(exp))
}

/// Decode a character literal lexeme (quotes included) to its byte value.
///
/// A single character yields its byte; `\x…` folds the remaining
/// characters as hex digits; the named C escapes map to their control
/// codes; any other escape folds the remaining characters as octal
/// digits. Characters that are not digits of the base fold as the value
/// 16, faithfully reproducing the reference behavior.
fn decode_char(text: &str) -> Option<u8> {
    let bytes = text.as_bytes();
    if bytes.len() <= 2 {
        return None;
    }
    if bytes[0] != b'\'' && bytes[bytes.len() - 1] != b'\'' {
        return None;
    }
    let inner = &bytes[1..bytes.len() - 1];
    if inner.len() == 1 {
        return Some(inner[0]);
    }
    if inner[0] != b'\\' {
        return None;
    }
    match inner.get(1)? {
        b'x' => Some(fold_digits(&inner[2..], 16)),
        b'a' => Some(7),
        b'b' => Some(8),
        b'f' => Some(12),
        b'n' => Some(10),
        b'r' => Some(13),
        b't' => Some(9),
        b'v' => Some(11),
        b'\\' => Some(92),
        b'\'' => Some(39),
        b'"' => Some(34),
        _ => Some(fold_digits(&inner[1..], 8)),
    }
}

fn fold_digits(bytes: &[u8], base: u32) -> u8 {
    let mut value: u32 = 0;
    for &b in bytes {
        value = value.wrapping_mul(base).wrapping_add(digit_val(b));
    }
    value as u8
}

fn digit_val(b: u8) -> u32 {
    match b {
        b'0'..=b'9' => u32::from(b - b'0'),
        b'a'..=b'f' => u32::from(b - b'a') + 10,
        b'A'..=b'F' => u32::from(b - b'A') + 10,
        _ => 16,
    }
}

#[cfg(test)]
mod literal_tests {
    use super::*;

    #[test]
    fn int_lexemes() {
        assert_eq!(parse_int_lexeme("0x123ABCDE"), Some(0x123A_BCDE));
        assert_eq!(parse_int_lexeme("0b1010"), Some(10));
        assert_eq!(parse_int_lexeme("0123"), Some(0o123));
        assert_eq!(parse_int_lexeme("2020uL"), Some(2020));
        assert_eq!(parse_int_lexeme("0"), Some(0));
        assert_eq!(parse_int_lexeme("0x"), None);
    }

    #[test]
    fn float_lexemes() {
        assert_eq!(parse_float_lexeme("1.5e+1"), Some(15.0));
        assert_eq!(parse_float_lexeme("0x10p0"), Some(16.0));
        assert_eq!(parse_float_lexeme("0x1.8p1"), Some(3.0));
        assert_eq!(parse_float_lexeme("0xbbp-4"), Some(f64::from(0xbb) / 16.0));
        assert_eq!(parse_float_lexeme("2.5f"), Some(2.5));
        assert_eq!(parse_float_lexeme("0123p13"), None);
    }

    #[test]
    fn char_lexemes() {
        assert_eq!(decode_char("'a'"), Some(b'a'));
        assert_eq!(decode_char("'\\n'"), Some(10));
        assert_eq!(decode_char("'\\''"), Some(39));
        assert_eq!(decode_char("'\\100'"), Some(0o100));
        assert_eq!(decode_char("'\\xff'"), Some(0xff));
        assert_eq!(decode_char("''"), None);
    }
}
