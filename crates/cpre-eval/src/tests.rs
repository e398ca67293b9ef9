use crate::{evaluate, Evaluator};
use cpre_diagnostics::{Diagnostic, Severity};
use cpre_span::SourceFile;

fn run(src: &str) -> (String, Vec<Diagnostic>) {
    let file = SourceFile::new("test.c".to_string(), src.to_string());
    let (tree, mut diags) = cpre_parser::parse(&file.src);
    let (out, eval_diags) = evaluate(&tree, &file);
    diags.extend(eval_diags);
    (out, diags)
}

fn run_ok(src: &str) -> String {
    let (out, diags) = run(src);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    out
}

// ============================================================================
// Object-like expansion
// ============================================================================

#[test]
fn object_macro_expands() {
    assert_eq!(run_ok("#define A 1\nA+A"), "\n1+1");
}

#[test]
fn chained_object_macros() {
    assert_eq!(run_ok("#define A B\n#define B 2\nA"), "\n\n2");
}

#[test]
fn self_reference_is_suppressed() {
    assert_eq!(run_ok("#define A A+1\nA"), "\nA+1");
}

#[test]
fn cyclic_definitions_terminate() {
    assert_eq!(run_ok("#define A B\n#define B A\nA"), "\n\nA");
}

#[test]
fn empty_body_expands_to_nothing() {
    assert_eq!(run_ok("#define EMPTY\nx EMPTY y"), "\nx  y");
}

#[test]
fn undef_unbinds() {
    assert_eq!(run_ok("#define A 1\n#undef A\nA"), "\n\nA");
}

#[test]
fn redefinition_warns_and_rebinds() {
    let (out, diags) = run("#define A 1\n#define A 2\nA");
    assert_eq!(out, "\n\n2");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].severity, Severity::Warning);
    assert!(diags[0].message.contains("A redefined"));
}

#[test]
fn reserved_names_cannot_be_defined() {
    let (out, diags) = run("#define __LINE__ 99\n__LINE__");
    assert_eq!(out, "\n2");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].severity, Severity::Warning);
}

// ============================================================================
// Built-ins
// ============================================================================

#[test]
fn file_builtin_is_quoted_name() {
    assert_eq!(run_ok("__FILE__"), "\"test.c\"");
}

#[test]
fn line_builtin_tracks_use_site() {
    assert_eq!(run_ok("__LINE__\n__LINE__"), "1\n2");
}

#[test]
fn line_builtin_resolves_at_expansion_site() {
    // `__LINE__` inside a body reports the line the expansion started on.
    assert_eq!(run_ok("#define L __LINE__\nL\nL"), "\n2\n3");
}

// ============================================================================
// Function-like expansion
// ============================================================================

#[test]
fn parameter_substitution() {
    assert_eq!(run_ok("#define F(x) x+x\nF(3)"), "\n3+3");
}

#[test]
fn nested_call_parameter_propagation() {
    assert_eq!(run_ok("#define F(x) x+x\n#define G(y) F(y)\nG(3)"), "\n\n3+3");
}

#[test]
fn parameters_propagate_into_nested_call_arguments() {
    assert_eq!(
        run_ok("#define H(z) [z]\n#define G(y) H(F(y))\n#define F(x) x+x\nG(2)"),
        "\n\n\n[2+2]"
    );
}

#[test]
fn function_macro_without_call_stays_a_name() {
    assert_eq!(run_ok("#define F(x) x\nF"), "\nF");
}

#[test]
fn undefined_call_passes_through_with_expanded_args() {
    assert_eq!(run_ok("#define A 1\nF(A, b)"), "\nF(1, b)");
}

#[test]
fn call_passthrough_keeps_gap() {
    assert_eq!(run_ok("main  (x)"), "main  (x)");
}

#[test]
fn arity_mismatch_diagnoses_and_passes_through() {
    let (out, diags) = run("#define F(x,y) x\nF(1)");
    assert_eq!(out, "\nF(1)");
    assert!(diags
        .iter()
        .any(|d| d.message.contains("expected 2 params got 1")));
}

#[test]
fn recursive_call_passes_through() {
    assert_eq!(run_ok("#define F(x) F(x)\nF(1)"), "\nF(1)");
}

#[test]
fn arguments_are_trimmed_before_binding() {
    assert_eq!(run_ok("#define ID(x) x\nID(  a b  )"), "\na b");
}

// ============================================================================
// Stringize and paste
// ============================================================================

#[test]
fn stringize_argument_text() {
    assert_eq!(run_ok("#define S(x) #x\nS(a b)"), "\n\"a b\"");
}

#[test]
fn stringize_does_not_expand() {
    assert_eq!(run_ok("#define A 1\n#define S(x) #x\nS(A)"), "\n\n\"A\"");
}

#[test]
fn stringize_quotes_specials() {
    assert_eq!(
        run_ok("#define S(x) #x\nS(say \"hi\")"),
        "\n\"say \\\"hi\\\"\""
    );
}

#[test]
fn stringize_of_call_round_trips() {
    assert_eq!(run_ok("#define S(x) #x\nS(F(1,2))"), "\n\"F(1,2)\"");
}

#[test]
fn stringize_non_parameter_diagnoses() {
    let (out, diags) = run("#define S(x) #y\nS(1)");
    assert_eq!(out, "\n");
    assert!(diags
        .iter()
        .any(|d| d.message.contains("not followed by a macro parameter")));
}

#[test]
fn paste_atomic_arguments() {
    assert_eq!(run_ok("#define P(x,y) x##y\nP(foo,123)"), "\nfoo123");
}

#[test]
fn paste_result_is_not_reexpanded_when_atomic() {
    assert_eq!(run_ok("#define AB 7\n#define P(x,y) x##y\nP(A,B)"), "\n\nAB");
}

#[test]
fn paste_sequence_operand_reparses() {
    assert_eq!(run_ok("#define P(x,y) x##y\nP(a b,c)"), "\na bc");
}

#[test]
fn eval_api_exposes_environment_queries() {
    let file = SourceFile::new("q.c".to_string(), "#define A 1\n#line 42 \"f.c\"\n".to_string());
    let (tree, _) = cpre_parser::parse(&file.src);
    let mut evaluator = Evaluator::new(&file);
    let out = evaluator.run(&tree);
    assert_eq!(out, "\n\n");
    assert!(evaluator.is_defined("A"));
    assert!(evaluator.is_defined("__FILE__"));
    assert!(!evaluator.is_defined("B"));
    assert_eq!(evaluator.line_directive(), Some(("42", Some("\"f.c\""))));
}

#[test]
fn expansion_depth_is_bounded() {
    let file = SourceFile::new(
        "deep.c".to_string(),
        "#define A B\n#define B C\n#define C D\n#define D 1\nA".to_string(),
    );
    let (tree, _) = cpre_parser::parse(&file.src);
    let mut evaluator = Evaluator::new(&file).with_max_depth(2);
    let out = evaluator.run(&tree);
    let diags = evaluator.take_diagnostics();
    assert!(diags.iter().any(|d| d.message.contains("too deep")));
    // the expansion is truncated, not absent
    assert_eq!(out, "\n\n\n\nC");
}

// ============================================================================
// Conditionals
// ============================================================================

#[test]
fn if_defined_chain() {
    assert_eq!(
        run_ok("#define X 1\n#if defined(X)\nyes\n#else\nno\n#endif"),
        "\n\nyes\n\n\n"
    );
}

#[test]
fn else_branch_taken() {
    assert_eq!(run_ok("#if 0\nyes\n#else\nno\n#endif\n"), "\n\n\nno\n\n");
}

#[test]
fn elif_chain_takes_first_true() {
    assert_eq!(
        run_ok("#if 0\na\n#elif 0\nb\n#elif 1\nc\n#else\nd\n#endif\n"),
        "\n\n\n\n\nc\n\n\n\n"
    );
}

#[test]
fn ifdef_and_ifndef() {
    assert_eq!(run_ok("#define A 1\n#ifdef A\nx\n#endif\n"), "\n\nx\n\n");
    assert_eq!(run_ok("#ifndef A\nx\n#endif\n"), "\nx\n\n");
}

#[test]
fn nested_conditionals() {
    assert_eq!(
        run_ok("#define A 1\n#define B 1\n#ifdef A\n#ifdef B\nboth\n#endif\n#endif\n"),
        "\n\n\n\nboth\n\n\n"
    );
}

#[test]
fn inactive_branch_still_counts_lines() {
    assert_eq!(
        run_ok("#if 0\n#define A 1\n#endif\nA"),
        "\n\n\nA",
        "defines in a skipped branch must not bind"
    );
}

#[test]
fn defines_inside_taken_branch_apply() {
    assert_eq!(run_ok("#if 1\n#define A 2\n#endif\nA"), "\n\n\n2");
}

// ============================================================================
// Constant expressions
// ============================================================================

#[test]
fn arithmetic_conditions() {
    assert_eq!(run_ok("#if 2 + 3 == 5\nyes\n#endif\n"), "\nyes\n\n");
    assert_eq!(run_ok("#if 910 >= 900\nyes\n#endif\n"), "\nyes\n\n");
    assert_eq!(run_ok("#if 1 << 4 == 16\nyes\n#endif\n"), "\nyes\n\n");
}

#[test]
fn negative_values_are_true() {
    // truth is non-zero, not positive
    assert_eq!(run_ok("#if -1\nyes\n#endif\n"), "\nyes\n\n");
}

#[test]
fn macro_values_in_conditions() {
    assert_eq!(
        run_ok("#define V 910\n#if V >= 900 && V < 1000\nyes\n#endif\n"),
        "\n\nyes\n\n"
    );
}

#[test]
fn function_macros_in_conditions() {
    assert_eq!(
        run_ok("#define GE(a,b) ((a) >= (b))\n#if GE(4,3)\nyes\n#endif\n"),
        "\n\nyes\n\n"
    );
}

#[test]
fn char_literals_in_conditions() {
    assert_eq!(run_ok("#if 'a' == 97\nyes\n#endif\n"), "\nyes\n\n");
    assert_eq!(run_ok("#if '\\n' == 10\nyes\n#endif\n"), "\nyes\n\n");
    assert_eq!(run_ok("#if '\\x41' == 'A'\nyes\n#endif\n"), "\nyes\n\n");
}

#[test]
fn unbound_identifier_is_zero() {
    assert_eq!(run_ok("#if UNDEFINED\nyes\n#else\nno\n#endif\n"), "\n\n\nno\n\n");
}

#[test]
fn defined_without_expansion() {
    // `defined F` is 1 even though F is function-like and never called.
    assert_eq!(
        run_ok("#define F(x) x\n#if defined F && defined(F)\nyes\n#endif\n"),
        "\n\nyes\n\n"
    );
}

#[test]
fn division_by_zero_diagnoses() {
    let (out, diags) = run("#if 1/0\nyes\n#endif\n");
    assert_eq!(out, "\n\n\n");
    assert!(diags
        .iter()
        .any(|d| d.message.contains("division by zero")));
}

#[test]
fn float_in_integer_operator_diagnoses() {
    let (_, diags) = run("#if 1.5 % 2\nx\n#endif\n");
    assert!(diags
        .iter()
        .any(|d| d.message.contains("float operand")));
}

#[test]
fn self_referential_macro_in_condition_is_zero() {
    let (out, _) = run("#define A A\n#if A\nyes\n#else\nno\n#endif\n");
    assert_eq!(out, "\n\n\n\nno\n\n");
}

#[test]
fn line_builtin_in_condition() {
    assert_eq!(run_ok("#if __LINE__ == 1\nyes\n#endif\n"), "\nyes\n\n");
}

// ============================================================================
// Directive side effects
// ============================================================================

#[test]
fn error_directive_reports_and_continues() {
    let (out, diags) = run("#error something went wrong\nafter");
    assert_eq!(out, "\nafter");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].severity, Severity::Error);
    assert!(diags[0].message.contains("something went wrong"));
}

#[test]
fn warning_directive_is_a_warning() {
    let (_, diags) = run("#warning mind the gap\n");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].severity, Severity::Warning);
}

#[test]
fn pragma_and_unknown_directives_are_placeholders() {
    assert_eq!(run_ok("#pragma once\nx"), "\nx");
    let (out, _) = run("# something unknown\nx");
    assert_eq!(out, "\nx");
}

#[test]
fn include_is_a_placeholder() {
    assert_eq!(run_ok("#include <stdio.h>\nx"), "\nx");
}

// ============================================================================
// Text passthrough
// ============================================================================

#[test]
fn block_comments_keep_their_newlines() {
    assert_eq!(run_ok("/* one\ntwo */x"), "\nx");
}

#[test]
fn line_comments_pass_through() {
    assert_eq!(run_ok("a // note\nb"), "a // note\nb");
}

#[test]
fn splices_in_free_text_pass_through() {
    assert_eq!(run_ok("a \\\nb"), "a \\\nb");
}

#[test]
fn splices_in_macro_bodies_vanish() {
    assert_eq!(run_ok("#define A 1 \\\n + 2\nA"), "\n\n1  + 2");
}
