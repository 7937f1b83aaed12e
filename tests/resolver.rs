#[cfg(test)]
mod resolver_tests {
    use rox::error::Diagnostics;
    use rox::expr::Expr;
    use rox::interpreter::Interpreter;
    use rox::parser::Parser;
    use rox::resolver::Resolver;
    use rox::scanner::Scanner;
    use rox::stmt::Stmt;
    use rox::token::Token;

    fn resolve_into(source: &str) -> (Vec<Stmt>, Interpreter<Vec<u8>>, bool) {
        let mut diagnostics = Diagnostics::new();

        let tokens: Vec<Token> = Scanner::new(source.as_bytes())
            .filter_map(Result::ok)
            .collect();

        let mut parser = Parser::new(tokens, 0, &mut diagnostics);
        let statements = parser.parse();

        assert!(
            !diagnostics.had_error(),
            "unexpected parse error in {:?}",
            source
        );

        let mut interpreter = Interpreter::new(Vec::new());

        let mut resolver = Resolver::new(&mut interpreter, &mut diagnostics);
        resolver.resolve(&statements);

        let had_error = diagnostics.had_error();

        (statements, interpreter, had_error)
    }

    fn resolve_source(source: &str) -> bool {
        resolve_into(source).2
    }

    #[test]
    fn reading_local_in_its_own_initializer_is_an_error() {
        assert!(resolve_source("var a = \"outer\"; { var a = a; }"));
    }

    #[test]
    fn global_self_reference_is_not_checked() {
        // Globals are not tracked by the scope stack; this fails at runtime
        // instead.
        assert!(!resolve_source("var a = a;"));
    }

    #[test]
    fn duplicate_declaration_in_same_scope_is_an_error() {
        assert!(resolve_source("{ var a = 1; var a = 2; }"));
    }

    #[test]
    fn duplicate_globals_are_allowed() {
        assert!(!resolve_source("var a = 1; var a = 2;"));
    }

    #[test]
    fn shadowing_in_nested_scope_is_allowed() {
        assert!(!resolve_source("{ var a = 1; { var a = 2; print a; } }"));
    }

    #[test]
    fn duplicate_parameter_names_are_an_error() {
        assert!(resolve_source("fun f(a, a) { return a; }"));
    }

    #[test]
    fn return_outside_function_is_an_error() {
        assert!(resolve_source("return 42;"));
    }

    #[test]
    fn return_with_value_in_initializer_is_an_error() {
        assert!(resolve_source("class A { init() { return 1; } }"));
    }

    #[test]
    fn bare_return_in_initializer_is_allowed() {
        assert!(!resolve_source("class A { init() { return; } }"));
    }

    #[test]
    fn return_with_value_in_plain_method_is_allowed() {
        assert!(!resolve_source("class A { m() { return 1; } }"));
    }

    #[test]
    fn break_outside_loop_is_an_error() {
        assert!(resolve_source("break;"));
    }

    #[test]
    fn continue_outside_loop_is_an_error() {
        assert!(resolve_source("continue;"));
    }

    #[test]
    fn break_inside_while_is_allowed() {
        assert!(!resolve_source("while (true) { break; }"));
    }

    #[test]
    fn continue_inside_for_is_allowed() {
        assert!(!resolve_source(
            "for (var i = 0; i < 3; i = i + 1) { continue; }"
        ));
    }

    #[test]
    fn break_cannot_cross_a_function_boundary() {
        assert!(resolve_source("while (true) { fun f() { break; } }"));
    }

    #[test]
    fn this_outside_class_is_an_error() {
        assert!(resolve_source("print this;"));
    }

    #[test]
    fn this_in_function_outside_class_is_an_error() {
        assert!(resolve_source("fun f() { return this; }"));
    }

    #[test]
    fn this_inside_method_is_allowed() {
        assert!(!resolve_source("class A { m() { return this; } }"));
    }

    #[test]
    fn super_outside_class_is_an_error() {
        assert!(resolve_source("print super.m;"));
    }

    #[test]
    fn super_without_superclass_is_an_error() {
        assert!(resolve_source("class A { m() { super.m(); } }"));
    }

    #[test]
    fn super_in_subclass_is_allowed() {
        assert!(!resolve_source(
            "class A { m() {} } class B < A { m() { super.m(); } }"
        ));
    }

    #[test]
    fn class_cannot_inherit_from_itself() {
        assert!(resolve_source("class A < A {}"));
    }

    #[test]
    fn multiple_errors_surface_in_one_pass() {
        let mut diagnostics = Diagnostics::new();

        let tokens: Vec<Token> = Scanner::new(b"break; return 1; print this;")
            .filter_map(Result::ok)
            .collect();

        let mut parser = Parser::new(tokens, 0, &mut diagnostics);
        let statements = parser.parse();
        assert!(!diagnostics.had_error());

        let mut interpreter = Interpreter::new(Vec::new());
        let mut resolver = Resolver::new(&mut interpreter, &mut diagnostics);

        // The walk keeps going after each error; this must not panic and
        // must flag the run.
        resolver.resolve(&statements);
        assert!(diagnostics.had_error());
    }

    #[test]
    fn local_use_is_recorded_at_scope_distance() {
        let (statements, interpreter, had_error) =
            resolve_into("{ var x = 1; print x; { print x; } }");

        assert!(!had_error);

        let Stmt::Block(outer) = &statements[0] else {
            panic!("expected outer block");
        };

        // `print x;` in the defining scope: depth 0.
        let Stmt::Print(Expr::Variable { id, .. }) = &outer[1] else {
            panic!("expected print of variable");
        };
        assert_eq!(interpreter.local_depth(*id), Some(0));

        // `print x;` one block deeper: depth 1.
        let Stmt::Block(inner) = &outer[2] else {
            panic!("expected inner block");
        };
        let Stmt::Print(Expr::Variable { id, .. }) = &inner[0] else {
            panic!("expected print of variable");
        };
        assert_eq!(interpreter.local_depth(*id), Some(1));
    }

    #[test]
    fn global_use_is_left_unrecorded() {
        let (statements, interpreter, had_error) = resolve_into("var x = 1; print x;");

        assert!(!had_error);

        let Stmt::Print(Expr::Variable { id, .. }) = &statements[1] else {
            panic!("expected print of variable");
        };

        assert_eq!(interpreter.local_depth(*id), None);
    }

    #[test]
    fn closure_use_counts_function_scope() {
        let (statements, interpreter, had_error) =
            resolve_into("{ var x = 1; fun f() { print x; } }");

        assert!(!had_error);

        let Stmt::Block(outer) = &statements[0] else {
            panic!("expected block");
        };

        let Stmt::Expression(Expr::Function(declaration)) = &outer[1] else {
            panic!("expected function declaration");
        };

        // From inside the function body, `x` is one scope away: the function
        // scope, then the block that defines it.
        let Stmt::Print(Expr::Variable { id, .. }) = &declaration.body[0] else {
            panic!("expected print of captured variable");
        };

        assert_eq!(interpreter.local_depth(*id), Some(1));
    }
}
