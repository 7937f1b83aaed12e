#[cfg(test)]
mod parser_tests {
    use rox::error::Diagnostics;
    use rox::expr::Expr;
    use rox::parser::Parser;
    use rox::scanner::Scanner;
    use rox::stmt::Stmt;
    use rox::token::{Token, TokenType};

    fn parse_source(source: &str) -> (Vec<Stmt>, bool) {
        let mut diagnostics = Diagnostics::new();

        let tokens: Vec<Token> = Scanner::new(source.as_bytes())
            .filter_map(Result::ok)
            .collect();

        let mut parser = Parser::new(tokens, 0, &mut diagnostics);
        let statements = parser.parse();

        (statements, diagnostics.had_error())
    }

    fn parse_clean(source: &str) -> Vec<Stmt> {
        let (statements, had_error) = parse_source(source);
        assert!(!had_error, "unexpected parse error in {:?}", source);
        statements
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let statements = parse_clean("1 + 2 * 3;");

        let Stmt::Expression(Expr::Binary {
            operator, right, ..
        }) = &statements[0]
        else {
            panic!("expected binary expression statement");
        };

        assert_eq!(operator.token_type, TokenType::PLUS);

        let Expr::Binary { operator, .. } = right.as_ref() else {
            panic!("expected nested binary on the right");
        };

        assert_eq!(operator.token_type, TokenType::STAR);
    }

    #[test]
    fn unary_chains_and_grouping() {
        let statements = parse_clean("-(-1);");

        let Stmt::Expression(Expr::Unary { operator, right }) = &statements[0] else {
            panic!("expected unary expression");
        };

        assert_eq!(operator.token_type, TokenType::MINUS);
        assert!(matches!(right.as_ref(), Expr::Grouping(_)));
    }

    #[test]
    fn assignment_is_right_associative() {
        let statements = parse_clean("a = b = 1;");

        let Stmt::Expression(Expr::Assign { name, value, .. }) = &statements[0] else {
            panic!("expected assignment");
        };

        assert_eq!(name.lexeme, "a");
        assert!(matches!(value.as_ref(), Expr::Assign { .. }));
    }

    #[test]
    fn invalid_assignment_target_is_nonfatal() {
        let (statements, had_error) = parse_source("1 = 2; print 3;");

        assert!(had_error);

        // Parsing continued past the bad target.
        assert_eq!(statements.len(), 2);
        assert!(matches!(statements[1], Stmt::Print(_)));
    }

    #[test]
    fn property_assignment_becomes_set() {
        let statements = parse_clean("a.b = 1;");

        let Stmt::Expression(Expr::Set { name, .. }) = &statements[0] else {
            panic!("expected set expression");
        };

        assert_eq!(name.lexeme, "b");
    }

    #[test]
    fn while_parses_to_loop_without_increment() {
        let statements = parse_clean("while (true) print 1;");

        let Stmt::Loop { increment, .. } = &statements[0] else {
            panic!("expected loop statement");
        };

        assert!(increment.is_none());
    }

    #[test]
    fn for_desugars_to_block_with_loop() {
        let statements = parse_clean("for (var i = 0; i < 5; i = i + 1) print i;");

        let Stmt::Block(inner) = &statements[0] else {
            panic!("expected block around desugared for");
        };

        assert_eq!(inner.len(), 2);
        assert!(matches!(inner[0], Stmt::Var { .. }));

        let Stmt::Loop {
            condition,
            increment,
            ..
        } = &inner[1]
        else {
            panic!("expected loop inside block");
        };

        assert!(matches!(condition, Expr::Binary { .. }));
        assert!(matches!(increment, Some(Expr::Assign { .. })));
    }

    #[test]
    fn for_without_clauses_is_bare_infinite_loop() {
        let statements = parse_clean("for (;;) break;");

        // No initializer means no wrapping block, and the missing condition
        // becomes a literal `true`.
        let Stmt::Loop {
            condition,
            increment,
            ..
        } = &statements[0]
        else {
            panic!("expected bare loop");
        };

        let Expr::Literal(token) = condition else {
            panic!("expected literal condition");
        };

        assert_eq!(token.token_type, TokenType::TRUE);
        assert!(increment.is_none());
    }

    #[test]
    fn function_declaration_needs_no_trailing_semicolon() {
        let statements = parse_clean("fun add(a, b) { return a + b; } print 1;");

        assert_eq!(statements.len(), 2);

        let Stmt::Expression(Expr::Function(declaration)) = &statements[0] else {
            panic!("expected function expression statement");
        };

        assert_eq!(declaration.name.as_ref().unwrap().lexeme, "add");
        assert_eq!(declaration.params.len(), 2);
    }

    #[test]
    fn anonymous_function_in_expression_position() {
        let statements = parse_clean("var f = fun (x) { return x; };");

        let Stmt::Var {
            initializer: Some(Expr::Function(declaration)),
            ..
        } = &statements[0]
        else {
            panic!("expected var initialized with a function expression");
        };

        assert!(declaration.name.is_none());
        assert_eq!(declaration.params.len(), 1);
    }

    #[test]
    fn class_with_superclass_and_methods() {
        let statements = parse_clean("class B < A { init(x) {} greet() {} }");

        let Stmt::Class {
            name,
            superclass,
            methods,
        } = &statements[0]
        else {
            panic!("expected class declaration");
        };

        assert_eq!(name.lexeme, "B");
        assert!(matches!(superclass, Some(Expr::Variable { .. })));
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].name.as_ref().unwrap().lexeme, "init");
    }

    #[test]
    fn super_and_this_parse_inside_method() {
        let statements = parse_clean("class B < A { m() { super.m(); return this; } }");

        let Stmt::Class { methods, .. } = &statements[0] else {
            panic!("expected class declaration");
        };

        let body = &methods[0].body;
        assert_eq!(body.len(), 2);

        let Stmt::Expression(Expr::Call { callee, .. }) = &body[0] else {
            panic!("expected super call");
        };

        assert!(matches!(callee.as_ref(), Expr::Super { .. }));
    }

    #[test]
    fn panic_mode_recovers_at_statement_boundary() {
        let (statements, had_error) = parse_source("var = 1; print 42;");

        assert!(had_error);

        // The bad declaration is discarded, the next statement survives.
        assert_eq!(statements.len(), 1);
        assert!(matches!(statements[0], Stmt::Print(_)));
    }

    #[test]
    fn panic_mode_stops_at_keyword_without_semicolon() {
        let (statements, had_error) = parse_source("(1 2\nprint 3;");

        assert!(had_error);
        assert_eq!(statements.len(), 1);
        assert!(matches!(statements[0], Stmt::Print(_)));
    }

    #[test]
    fn argument_count_cap_reports_but_keeps_parsing() {
        let args: Vec<String> = (0..=255).map(|i| i.to_string()).collect();
        let source = format!("f({});", args.join(", "));

        let (statements, had_error) = parse_source(&source);

        assert!(had_error);

        // All 256 arguments are still present in the tree.
        let Stmt::Expression(Expr::Call { arguments, .. }) = &statements[0] else {
            panic!("expected call expression");
        };

        assert_eq!(arguments.len(), 256);
    }

    #[test]
    fn variable_nodes_get_distinct_ids() {
        let statements = parse_clean("a; a;");

        let ids: Vec<usize> = statements
            .iter()
            .map(|stmt| match stmt {
                Stmt::Expression(Expr::Variable { id, .. }) => *id,
                other => panic!("expected variable statement, got {:?}", other),
            })
            .collect();

        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn node_ids_resume_from_first_id() {
        let mut diagnostics = Diagnostics::new();

        let tokens: Vec<Token> = Scanner::new(b"a;").filter_map(Result::ok).collect();

        let mut parser = Parser::new(tokens, 7, &mut diagnostics);
        let statements = parser.parse();

        assert!(parser.next_id() > 7);

        let Stmt::Expression(Expr::Variable { id, .. }) = &statements[0] else {
            panic!("expected variable statement");
        };

        assert_eq!(*id, 7);
    }

    #[test]
    fn break_and_continue_statements() {
        let statements = parse_clean("while (true) { break; continue; }");

        let Stmt::Loop { body, .. } = &statements[0] else {
            panic!("expected loop");
        };

        let Stmt::Block(inner) = body.as_ref() else {
            panic!("expected block body");
        };

        assert!(matches!(inner[0], Stmt::Break { .. }));
        assert!(matches!(inner[1], Stmt::Continue { .. }));
    }

    #[test]
    fn logical_operators_nest_by_precedence() {
        let statements = parse_clean("a or b and c;");

        let Stmt::Expression(Expr::Logical {
            operator, right, ..
        }) = &statements[0]
        else {
            panic!("expected logical expression");
        };

        assert_eq!(operator.token_type, TokenType::OR);

        let Expr::Logical { operator, .. } = right.as_ref() else {
            panic!("expected nested logical on the right");
        };

        assert_eq!(operator.token_type, TokenType::AND);
    }

    #[test]
    fn call_chains_with_property_access() {
        let statements = parse_clean("obj.field.method(1)(2);");

        // Outermost node is the second call.
        let Stmt::Expression(Expr::Call { callee, arguments, .. }) = &statements[0] else {
            panic!("expected call expression");
        };

        assert_eq!(arguments.len(), 1);
        assert!(matches!(callee.as_ref(), Expr::Call { .. }));
    }
}
