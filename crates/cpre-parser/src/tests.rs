use crate::{parse, parse_body, parse_expression};
use cpre_ast::{
    BinOp, CommandKind, Cond, Elem, ElseArm, Expr, IfKind, IncludeKind, LitKind, Stmt, UnaryOp,
};
use cpre_lexer::TokenKind;
use cpre_span::BytePos;

fn parse_ok(src: &str) -> Vec<Stmt> {
    let (block, diags) = parse(src);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    block.stmts
}

#[test]
fn includes() {
    let stmts = parse_ok("#include <stdio.h>\n#include \"log.h\"");
    assert_eq!(stmts.len(), 2);
    match &stmts[0] {
        Stmt::Include(inc) => {
            assert_eq!(inc.path, "<stdio.h>");
            assert_eq!(inc.kind, IncludeKind::System);
        }
        other => panic!("expected include, got {other:?}"),
    }
    match &stmts[1] {
        Stmt::Include(inc) => {
            assert_eq!(inc.path, "\"log.h\"");
            assert_eq!(inc.kind, IncludeKind::Local);
        }
        other => panic!("expected include, got {other:?}"),
    }
}

#[test]
fn error_directives_capture_line_verbatim() {
    let stmts = parse_ok("# error compile error\n#error error 1234 is \\\ndefined");
    match &stmts[0] {
        Stmt::Command(cmd) => {
            assert_eq!(cmd.kind, CommandKind::Error);
            assert_eq!(cmd.text, "# error compile error");
        }
        other => panic!("expected command, got {other:?}"),
    }
    // the splice is deleted from the captured text
    match &stmts[1] {
        Stmt::Command(cmd) => assert_eq!(cmd.text, "#error error 1234 is defined"),
        other => panic!("expected command, got {other:?}"),
    }
}

#[test]
fn warning_and_pragma() {
    let stmts = parse_ok("#warning take care\n#pragma once");
    assert!(matches!(&stmts[0], Stmt::Command(c) if c.kind == CommandKind::Warning));
    assert!(matches!(&stmts[1], Stmt::Command(c) if c.kind == CommandKind::Pragma));
}

#[test]
fn undef() {
    let stmts = parse_ok("#undef A");
    match &stmts[0] {
        Stmt::Undef(un) => assert_eq!(un.name.name, "A"),
        other => panic!("expected undef, got {other:?}"),
    }
}

#[test]
fn line_directives() {
    let stmts = parse_ok("#line 99\n#line 98 \"test.c\"\n# 99\n# 1 \"<built-in>\"");
    let expected: [(&str, Option<&str>); 4] = [
        ("99", None),
        ("98", Some("\"test.c\"")),
        ("99", None),
        ("1", Some("\"<built-in>\"")),
    ];
    assert_eq!(stmts.len(), 4);
    for (stmt, (line, path)) in stmts.iter().zip(expected) {
        match stmt {
            Stmt::Line(l) => {
                assert_eq!(l.line, line);
                assert_eq!(l.path.as_deref(), path);
            }
            other => panic!("expected line directive, got {other:?}"),
        }
    }
}

#[test]
fn unknown_directive_is_invalid_passthrough() {
    let (block, _) = parse("# a b c d e\n");
    match &block.stmts[0] {
        Stmt::Invalid(inv) => assert_eq!(inv.text, "# a b c d e"),
        other => panic!("expected invalid, got {other:?}"),
    }
}

#[test]
fn object_define_body_elements() {
    let stmts = parse_ok("#define A 123'#bb");
    match &stmts[0] {
        Stmt::ObjectDef(def) => {
            assert_eq!(def.name.name, "A");
            assert_eq!(def.body.len(), 4);
            assert!(matches!(&def.body[0], Elem::Lit(l) if l.kind == LitKind::Int && l.text == "123"));
            assert!(matches!(&def.body[1], Elem::Text(t) if t.text == "'"));
            // in an object-like body `#` stays plain text
            assert!(matches!(&def.body[2], Elem::Text(t) if t.kind == TokenKind::Hash));
            assert!(matches!(&def.body[3], Elem::Ident(i) if i.name == "bb"));
        }
        other => panic!("expected object define, got {other:?}"),
    }
}

#[test]
fn flag_define_has_empty_body() {
    let stmts = parse_ok("#define A \n#define B");
    for stmt in &stmts {
        match stmt {
            Stmt::ObjectDef(def) => assert!(def.body.is_empty()),
            other => panic!("expected object define, got {other:?}"),
        }
    }
}

#[test]
fn object_define_with_space_before_paren() {
    let stmts = parse_ok("#define A (x)");
    assert!(matches!(&stmts[0], Stmt::ObjectDef(_)));
}

#[test]
fn function_define_with_stringize() {
    let stmts = parse_ok("#define B(x, y) x#y");
    match &stmts[0] {
        Stmt::FnDef(def) => {
            assert_eq!(def.name.name, "B");
            let names: Vec<_> = def.params.iter().map(|p| p.name.as_str()).collect();
            assert_eq!(names, ["x", "y"]);
            assert_eq!(def.body.len(), 2);
            assert!(matches!(&def.body[0], Elem::Ident(i) if i.name == "x"));
            assert!(matches!(&def.body[1], Elem::Stringize(s) if s.name.name == "y"));
        }
        other => panic!("expected function define, got {other:?}"),
    }
}

#[test]
fn function_define_with_paste() {
    for src in ["#define A(x,y) x##y", "#define A(  x, y  ) x   ##  y"] {
        let stmts = parse_ok(src);
        match &stmts[0] {
            Stmt::FnDef(def) => {
                assert_eq!(def.body.len(), 1, "body of {src:?}");
                match &def.body[0] {
                    Elem::Paste(p) => {
                        assert!(matches!(&*p.x, Elem::Ident(i) if i.name == "x"));
                        assert!(matches!(&*p.y, Elem::Ident(i) if i.name == "y"));
                    }
                    other => panic!("expected paste, got {other:?}"),
                }
            }
            other => panic!("expected function define, got {other:?}"),
        }
    }
}

#[test]
fn malformed_param_list_is_bad_statement() {
    let (block, diags) = parse("#define C(x");
    match &block.stmts[0] {
        Stmt::Bad(bad) => assert_eq!(bad.text, "#define C(x"),
        other => panic!("expected bad statement, got {other:?}"),
    }
    assert!(!diags.is_empty());
}

#[test]
fn nested_call_arguments() {
    let stmts = parse_ok("#define B(x,y) C(D(x) 123,E()F(g)))x##y");
    let Stmt::FnDef(def) = &stmts[0] else {
        panic!("expected function define");
    };
    assert_eq!(def.body.len(), 3);

    let Elem::Call(c) = &def.body[0] else {
        panic!("expected call, got {:?}", def.body[0]);
    };
    assert_eq!(c.name.name, "C");
    assert_eq!(c.args.len(), 2);
    match &c.args[0] {
        Elem::Seq(parts) => {
            assert!(matches!(&parts[0], Elem::Call(d) if d.name.name == "D" && d.args.len() == 1));
            assert!(matches!(&parts[1], Elem::Text(t) if t.text == " "));
            assert!(matches!(&parts[2], Elem::Lit(l) if l.text == "123"));
        }
        other => panic!("expected sequence argument, got {other:?}"),
    }
    match &c.args[1] {
        Elem::Seq(parts) => {
            assert!(matches!(&parts[0], Elem::Call(e) if e.name.name == "E" && e.args.is_empty()));
            assert!(matches!(&parts[1], Elem::Call(f) if f.name.name == "F"));
        }
        other => panic!("expected sequence argument, got {other:?}"),
    }

    // the unbalanced `)` falls back to plain text
    assert!(matches!(&def.body[1], Elem::Text(t) if t.text == ")"));
    assert!(matches!(&def.body[2], Elem::Paste(_)));
}

#[test]
fn call_form_keeps_name_paren_gap() {
    let stmts = parse_ok("F  (a)");
    let Stmt::Text(text) = &stmts[0] else {
        panic!("expected text block");
    };
    let Elem::Call(call) = &text.elems[0] else {
        panic!("expected call, got {:?}", text.elems[0]);
    };
    assert_eq!(call.gap(), 2);
}

#[test]
fn unclosed_call_falls_back_to_identifier() {
    let stmts = parse_ok("F (x");
    let Stmt::Text(text) = &stmts[0] else {
        panic!("expected text block");
    };
    assert!(matches!(&text.elems[0], Elem::Ident(i) if i.name == "F"));
    assert!(matches!(&text.elems[1], Elem::Text(t) if t.text == " "));
    assert!(matches!(&text.elems[2], Elem::Text(t) if t.kind == TokenKind::LParen));
    assert!(matches!(&text.elems[3], Elem::Ident(i) if i.name == "x"));
}

#[test]
fn free_text_call_may_span_lines() {
    let stmts = parse_ok("F(1,\n2)");
    let Stmt::Text(text) = &stmts[0] else {
        panic!("expected text block");
    };
    let Elem::Call(call) = &text.elems[0] else {
        panic!("expected call, got {:?}", text.elems[0]);
    };
    assert_eq!(call.args.len(), 2);
}

#[test]
fn conditional_chain_shape() {
    let stmts = parse_ok("#if A\n1\n#elif B\n2\n#else\n3\n#endif\n");
    let Stmt::If(ifs) = &stmts[0] else {
        panic!("expected conditional");
    };
    assert_eq!(ifs.kind, IfKind::If);
    assert!(matches!(&ifs.cond, Cond::Expr(Expr::Ident(i)) if i.name == "A"));
    assert_eq!(ifs.then.stmts.len(), 1);
    assert!(!ifs.endif_span.is_dummy());

    let Some(ElseArm::Elif(elif)) = &ifs.els else {
        panic!("expected elif arm");
    };
    assert_eq!(elif.kind, IfKind::Elif);
    assert!(matches!(&elif.cond, Cond::Expr(Expr::Ident(i)) if i.name == "B"));
    let Some(ElseArm::Else { body, .. }) = &elif.els else {
        panic!("expected else arm");
    };
    assert_eq!(body.stmts.len(), 1);
    assert_eq!(ifs.endif_span, elif.endif_span);
}

#[test]
fn ifdef_and_ifndef() {
    let stmts = parse_ok("#ifdef A\n#endif\n#ifndef B\n#endif\n");
    match (&stmts[0], &stmts[1]) {
        (Stmt::If(a), Stmt::If(b)) => {
            assert_eq!(a.kind, IfKind::Ifdef);
            assert!(matches!(&a.cond, Cond::Name(n) if n.name == "A"));
            assert!(a.then.stmts.is_empty());
            assert_eq!(b.kind, IfKind::Ifndef);
            assert!(matches!(&b.cond, Cond::Name(n) if n.name == "B"));
        }
        other => panic!("expected two conditionals, got {other:?}"),
    }
}

#[test]
fn nested_conditionals() {
    let stmts = parse_ok("#if A\n#if B\nx\n#endif\n#endif\n");
    let Stmt::If(outer) = &stmts[0] else {
        panic!("expected conditional");
    };
    assert_eq!(outer.then.stmts.len(), 1);
    assert!(matches!(&outer.then.stmts[0], Stmt::If(_)));
}

#[test]
fn missing_endif_is_diagnosed() {
    let (_, diags) = parse("#if 1\nx\n");
    assert!(diags.iter().any(|d| d.message.contains("unterminated")));
}

#[test]
fn dangling_endif_is_diagnosed() {
    let (block, diags) = parse("#endif\n");
    assert!(diags.iter().any(|d| d.message.contains("without matching")));
    assert!(matches!(&block.stmts[0], Stmt::Invalid(_)));
}

#[test]
fn statement_walk_visits_branches() {
    let (block, _) = parse("#if A\n#define X 1\n#else\n#define Y 2\n#endif\n");
    let mut defines = 0;
    block.walk(&mut |stmt| {
        if matches!(stmt, Stmt::ObjectDef(_)) {
            defines += 1;
        }
    });
    assert_eq!(defines, 2);
}

// ============================================================================
// Expression parsing
// ============================================================================

fn expr_of(src: &str) -> Expr {
    let (expr, diags) = parse_expression(src, BytePos::ZERO);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    expr
}

fn binary_parts(expr: &Expr) -> (&Expr, BinOp, &Expr) {
    match expr {
        Expr::Binary { x, op, y, .. } => (x, *op, y),
        other => panic!("expected binary, got {other:?}"),
    }
}

#[test]
fn multiplicative_chain_is_left_associative() {
    // a*a/a%a+b parses as (((a*a)/a)%a)+b
    let expr = expr_of("a*a/a%a+b");
    let (x, op, y) = binary_parts(&expr);
    assert_eq!(op, BinOp::Add);
    assert!(matches!(y, Expr::Ident(i) if i.name == "b"));
    let (x, op, _) = binary_parts(x);
    assert_eq!(op, BinOp::Rem);
    let (x, op, _) = binary_parts(x);
    assert_eq!(op, BinOp::Div);
    let (x, op, _) = binary_parts(x);
    assert_eq!(op, BinOp::Mul);
    assert!(matches!(x, Expr::Ident(i) if i.name == "a"));
}

#[test]
fn observed_precedence_quirks() {
    // `&` and `||` share a level: a & b || c groups left to right.
    let expr = expr_of("a & b || c");
    let (x, op, _) = binary_parts(&expr);
    assert_eq!(op, BinOp::LogOr);
    let (_, inner, _) = binary_parts(x);
    assert_eq!(inner, BinOp::And);

    // `&&` binds tighter than `||`.
    let expr = expr_of("a && b || c");
    let (x, op, _) = binary_parts(&expr);
    assert_eq!(op, BinOp::LogOr);
    let (_, inner, _) = binary_parts(x);
    assert_eq!(inner, BinOp::LogAnd);

    // `|` is the loosest level of all.
    let expr = expr_of("a | b == c");
    let (_, op, y) = binary_parts(&expr);
    assert_eq!(op, BinOp::Or);
    let (_, inner, _) = binary_parts(y);
    assert_eq!(inner, BinOp::Eq);
}

#[test]
fn unary_chains() {
    let expr = expr_of("!defined A");
    let Expr::Unary { op: UnaryOp::Not, x, .. } = expr else {
        panic!("expected unary not");
    };
    let Expr::Unary {
        op: UnaryOp::Defined,
        x,
        ..
    } = *x
    else {
        panic!("expected defined");
    };
    assert!(matches!(*x, Expr::Ident(ref i) if i.name == "A"));

    assert!(matches!(
        expr_of("-~1"),
        Expr::Unary {
            op: UnaryOp::Neg,
            ..
        }
    ));
}

#[test]
fn defined_forms() {
    let expr = expr_of("defined(X)");
    let Expr::Unary {
        op: UnaryOp::Defined,
        x,
        ..
    } = expr
    else {
        panic!("expected defined");
    };
    assert!(matches!(*x, Expr::Paren(ref p) if matches!(&**p, Expr::Ident(i) if i.name == "X")));
}

#[test]
fn directive_keywords_are_plain_identifiers_in_expressions() {
    // `define` is a keyword to the lexer but an ordinary name here.
    let expr = expr_of("!define");
    let Expr::Unary { op: UnaryOp::Not, x, .. } = expr else {
        panic!("expected unary not");
    };
    assert!(matches!(*x, Expr::Ident(ref i) if i.name == "define"));
}

#[test]
fn call_terms() {
    let expr = expr_of("MIN_VERSION(4,20,0)");
    let Expr::Call(call) = expr else {
        panic!("expected call term");
    };
    assert_eq!(call.name.name, "MIN_VERSION");
    assert_eq!(call.args.len(), 3);
}

#[test]
fn empty_and_trailing_expressions_diagnose() {
    let (_, diags) = parse_expression("", BytePos::ZERO);
    assert!(diags.iter().any(|d| d.message.contains("empty expression")));

    let (_, diags) = parse_expression("1 2", BytePos::ZERO);
    assert!(!diags.is_empty());
}

#[test]
fn expression_positions_rebase_on_anchor() {
    let (expr, _) = parse_expression("x", BytePos::new(40));
    assert!(matches!(expr, Expr::Ident(i) if i.pos == BytePos::new(40)));
}

// ============================================================================
// Body reparse entry point
// ============================================================================

#[test]
fn parse_body_recognises_paste() {
    let (elem, diags) = parse_body("foo##bar", BytePos::ZERO);
    assert!(diags.is_empty());
    match elem {
        Elem::Paste(p) => {
            assert!(matches!(*p.x, Elem::Ident(ref i) if i.name == "foo"));
            assert!(matches!(*p.y, Elem::Ident(ref i) if i.name == "bar"));
        }
        other => panic!("expected paste, got {other:?}"),
    }
}

#[test]
fn parse_body_rebases_anchor() {
    let (elem, _) = parse_body("x", BytePos::new(10));
    assert!(matches!(elem, Elem::Ident(i) if i.pos == BytePos::new(10)));
}
