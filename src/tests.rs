//! # Tests Module
//!
//! Unit and end-to-end tests for the whole Quill pipeline: lexer, parser,
//! scope table, analyzer, compiler, VM, diagnostics and the REPL session.

#[cfg(test)]
mod tests {
    use crate::analyzer::{self, Analysis};
    use crate::ast::*;
    use crate::compiler::Compiler;
    use crate::driver::{self, Compilation, Config};
    use crate::error::{format_error, Category, Error, ErrorKind, Pos, Span};
    use crate::lexer::Lexer;
    use crate::opcode::{Instruction, Module, Opcode};
    use crate::parser::{Parser, MAX_BLOCK_DEPTH};
    use crate::scope::{ScopeKind, ScopeTable};
    use crate::session::Session;
    use crate::token::{Token, TokenKind};
    use crate::types::Type;
    use crate::vm::Vm;

    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn source(text: &str) -> Rc<SourceFile> {
        SourceFile::new("test.ql", text)
    }

    fn parse(text: &str) -> Program {
        let source = source(text);
        let tokens = Lexer::new(&source.text).tokenize().unwrap();
        Parser::new(tokens, source).parse().unwrap()
    }

    fn nested(depth: usize) -> String {
        format!("{}var x = 1;{}", "{".repeat(depth), "}".repeat(depth))
    }

    fn analyze(text: &str) -> (Program, Analysis) {
        let mut program = parse(text);
        let analysis = analyzer::analyze(&mut program).unwrap();
        (program, analysis)
    }

    /// Runs the full pipeline with `PRINT` output discarded.
    fn run(text: &str) -> Result<(Compilation, Vm), Error> {
        let compilation = driver::compile(source(text))?;
        let vm = driver::execute(&compilation, Box::new(io::sink()))?;
        Ok((compilation, vm))
    }

    /// Every variable `text` declares, with its final value.
    fn bindings(text: &str) -> Vec<(String, i64)> {
        Session::new().submit(text).unwrap()
    }

    fn expect_error(text: &str, kind: ErrorKind) -> Error {
        match run(text) {
            Ok(_) => panic!("Expected {:?} error but program succeeded", kind),
            Err(e) => {
                assert_eq!(e.kind, kind, "Expected {:?} error, got: {}", kind, e);
                e
            }
        }
    }

    fn tokenize(text: &str) -> Vec<TokenKind> {
        Lexer::new(text)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .filter(|k| !matches!(k, TokenKind::Eof))
            .collect()
    }

    fn ident(name: &str) -> Token {
        Token::new(
            TokenKind::Ident(name.to_string()),
            Span::new(Pos::START, Pos::START),
        )
    }

    fn int(text: &str) -> Token {
        Token::new(
            TokenKind::Int(text.to_string()),
            Span::new(Pos::START, Pos::START),
        )
    }

    fn layout(analysis: &Analysis) -> Vec<(String, u32)> {
        analysis
            .table
            .symbols(analysis.memory_scope)
            .map(|s| (s.token().lexeme().to_string(), s.offset()))
            .collect()
    }

    fn pairs(items: &[(&str, i64)]) -> Vec<(String, i64)> {
        items.iter().map(|(n, v)| (n.to_string(), *v)).collect()
    }

    /// `Write` sink that can still be read after the VM takes ownership.
    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn module(instructions: Vec<Instruction>) -> Module {
        Module {
            spans: vec![None; instructions.len()],
            instructions,
            register_count: 0,
        }
    }

    // =========================================================================
    // LEXER TESTS
    // =========================================================================

    #[test]
    fn lexer_all_token_kinds() {
        let kinds = tokenize("var x = 1; { x - 2 + y; }");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Var,
                TokenKind::Ident("x".into()),
                TokenKind::Eq,
                TokenKind::Int("1".into()),
                TokenKind::Semicolon,
                TokenKind::LBrace,
                TokenKind::Ident("x".into()),
                TokenKind::Minus,
                TokenKind::Int("2".into()),
                TokenKind::Plus,
                TokenKind::Ident("y".into()),
                TokenKind::Semicolon,
                TokenKind::RBrace,
            ]
        );
    }

    #[test]
    fn lexer_keeps_literal_text() {
        assert_eq!(tokenize("007"), vec![TokenKind::Int("007".into())]);
    }

    #[test]
    fn lexer_keyword_prefix_is_identifier() {
        assert_eq!(
            tokenize("variable var_ var"),
            vec![
                TokenKind::Ident("variable".into()),
                TokenKind::Ident("var_".into()),
                TokenKind::Var,
            ]
        );
    }

    #[test]
    fn lexer_skips_line_comments() {
        let kinds = tokenize("// leading\nvar x; // trailing");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Var,
                TokenKind::Ident("x".into()),
                TokenKind::Semicolon
            ]
        );
    }

    #[test]
    fn lexer_tracks_lines_and_columns() {
        let tokens = Lexer::new("var x;\n  y;").tokenize().unwrap();
        let y = &tokens[3];
        assert_eq!(y.kind, TokenKind::Ident("y".into()));
        assert_eq!((y.span.start.line, y.span.start.col), (2, 3));
        assert_eq!(y.span.start.index, 9);
        assert_eq!(tokens.last().map(|t| &t.kind), Some(&TokenKind::Eof));
    }

    #[test]
    fn lexer_unexpected_character() {
        let err = Lexer::new("var x = 1 @").tokenize().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Lexer);
        assert_eq!(err.message, "unexpected character: '@'");
        assert_eq!(err.span.map(|s| s.start.col), Some(11));
    }

    #[test]
    fn lexer_rejects_out_of_range_literal() {
        let err = Lexer::new("99999999999999999999;").tokenize().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Lexer);
        assert!(err.message.contains("out of range"));
    }

    #[test]
    fn token_display() {
        assert_eq!(ident("x").to_string(), "IDENTIFIER | x");
        assert_eq!(int("12").to_string(), "INT_LITERAL | 12");
    }

    // =========================================================================
    // PARSER TESTS
    // =========================================================================

    #[test]
    fn parser_var_without_initializer() {
        let program = parse("var x;");
        match &program.stmts[0].kind {
            StmtKind::Var {
                name, initializer, ..
            } => {
                assert_eq!(name.lexeme(), "x");
                assert!(initializer.is_none());
            }
            other => panic!("expected var statement, got {:?}", other),
        }
    }

    #[test]
    fn parser_binary_is_left_associative() {
        let program = parse("1 - 2 - 3;");
        let expr = match &program.stmts[0].kind {
            StmtKind::Expr(expr) => expr,
            other => panic!("expected expression statement, got {:?}", other),
        };
        match &expr.kind {
            ExprKind::Binary { left, right, .. } => {
                assert!(matches!(left.kind, ExprKind::Binary { .. }));
                assert!(matches!(&right.kind, ExprKind::Literal(t) if t.lexeme() == "3"));
            }
            other => panic!("expected binary expression, got {:?}", other),
        }
    }

    #[test]
    fn parser_nested_blocks() {
        let program = parse("{ { var a; } }");
        match &program.stmts[0].kind {
            StmtKind::Block(outer) => {
                assert!(matches!(&outer[0].kind, StmtKind::Block(inner) if inner.len() == 1));
            }
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn parser_statement_spans() {
        let program = parse("var x = 1;\n{ x; }");
        assert_eq!(program.stmts[0].span.slice(&program.source.text), "var x = 1;");
        assert_eq!(program.stmts[1].span.slice(&program.source.text), "{ x; }");
        assert_eq!(program.span.slice(&program.source.text), "var x = 1;\n{ x; }");
    }

    #[test]
    fn parser_errors() {
        let cases = [
            ("var = 1;", "expected identifier after 'var'"),
            ("var x = 1", "expected ';' after var statement"),
            ("{ var x;", "expected '}' but reached end of file"),
            ("1 + ;", "expected expression"),
            ("", "empty program"),
            ("// only a comment", "empty program"),
        ];
        for (text, message) in cases {
            let err = expect_error(text, ErrorKind::Parser);
            assert_eq!(err.message, message, "for source {:?}", text);
        }
    }

    #[test]
    fn parser_accepts_nesting_up_to_limit() {
        let text = nested(MAX_BLOCK_DEPTH);
        assert_eq!(bindings(&text), pairs(&[("x", 1)]));
    }

    #[test]
    fn parser_rejects_nesting_past_limit() {
        let text = nested(MAX_BLOCK_DEPTH + 1);
        let err = expect_error(&text, ErrorKind::Parser);
        assert_eq!(err.message, "blocks nested too deeply");
        let span = err.span.unwrap();
        assert_eq!(span.start.index, MAX_BLOCK_DEPTH);

        let err = expect_error(&nested(5000), ErrorKind::Parser);
        assert_eq!(err.message, "blocks nested too deeply");
    }

    #[test]
    fn parser_missing_semicolon_points_at_expression() {
        let err = expect_error("1 + 2", ErrorKind::Parser);
        assert_eq!(err.message, "expected ';' after expression");
        let span = err.span.unwrap();
        assert_eq!((span.start.index, span.end.index), (0, 5));
    }

    // =========================================================================
    // SCOPE TABLE TESTS
    // =========================================================================

    #[test]
    fn scope_offsets_are_running_sizes() {
        let mut table = ScopeTable::new();
        let memory = table.create_scope(ScopeKind::Memory, None);
        let a = table.declare_var(memory, &ident("a"), Type::Int);
        let one = table.declare_literal(memory, &int("1"), Type::Int);
        let b = table.declare_var(memory, &ident("b"), Type::Int);

        assert_eq!(table.symbol(a).offset(), 0);
        assert_eq!(table.symbol(one).offset(), 4);
        assert_eq!(table.symbol(b).offset(), 8);
        assert_eq!(table.size(memory), 12);
        assert!(table.symbol(one).is_literal());
    }

    #[test]
    fn scope_find_var_ignores_parents() {
        let mut table = ScopeTable::new();
        let memory = table.create_scope(ScopeKind::Memory, None);
        let outer = table.create_scope(ScopeKind::Name, Some(memory));
        let inner = table.create_scope(ScopeKind::Name, Some(outer));
        let x = table.declare_var(outer, &ident("x"), Type::Int);

        assert_eq!(table.find_var(outer, &ident("x")), Some(x));
        assert_eq!(table.find_var(inner, &ident("x")), None);
        assert_eq!(table.parent(inner), Some(outer));
        assert_eq!(table.parent(memory), None);
        assert_eq!(table.kind(outer), ScopeKind::Name);
    }

    #[test]
    fn scope_find_literal_matches_text_exactly() {
        let mut table = ScopeTable::new();
        let memory = table.create_scope(ScopeKind::Memory, None);
        let seven = table.declare_literal(memory, &int("7"), Type::Int);

        assert_eq!(table.find_literal(memory, &int("7"), Type::Int), Some(seven));
        assert_eq!(table.find_literal(memory, &int("07"), Type::Int), None);
    }

    #[test]
    fn scope_declare_literal_does_not_pool_by_itself() {
        let mut table = ScopeTable::new();
        let memory = table.create_scope(ScopeKind::Memory, None);
        let first = table.declare_literal(memory, &int("7"), Type::Int);
        let second = table.declare_literal(memory, &int("7"), Type::Int);

        assert_ne!(first, second);
        assert_eq!(table.symbol(second).offset(), 4);
        assert_eq!(table.size(memory), 8);
        assert_eq!(table.find_literal(memory, &int("7"), Type::Int), Some(first));
    }

    #[test]
    fn scope_relocate_moves_offset_only() {
        let mut table = ScopeTable::new();
        let memory = table.create_scope(ScopeKind::Memory, None);
        let names = table.create_scope(ScopeKind::Name, Some(memory));
        let x = table.declare_var(names, &ident("x"), Type::Int);
        table.relocate(x, 12);

        assert_eq!(table.symbol(x).offset(), 12);
        assert_eq!(table.size(names), 4);
    }

    #[test]
    fn scope_describe_lists_symbols_in_order() {
        let (_, analysis) = analyze("var x = 1;");
        let text = analysis.table.describe(analysis.memory_scope);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Memory scope 0 (8 bytes)");
        assert!(lines[1].trim_start().starts_with("literal"));
        assert!(lines[1].contains("int(4 bytes)"));
        assert!(lines[2].trim_start().starts_with("var"));
    }

    // =========================================================================
    // ANALYZER TESTS
    // =========================================================================

    #[test]
    fn analyzer_lays_out_scenario_one() {
        let (_, analysis) = analyze("var x = 1; var y = x + 2;");
        assert_eq!(
            layout(&analysis),
            vec![
                ("1".to_string(), 0),
                ("x".to_string(), 4),
                ("2".to_string(), 8),
                ("y".to_string(), 12),
            ]
        );
        assert_eq!(analysis.table.size(analysis.memory_scope), 16);
    }

    #[test]
    fn analyzer_pools_equal_literals() {
        let (_, analysis) = analyze("var a = 7; var b = 7 + 7;");
        assert_eq!(
            layout(&analysis),
            vec![
                ("7".to_string(), 0),
                ("a".to_string(), 4),
                ("b".to_string(), 8),
            ]
        );
    }

    #[test]
    fn analyzer_does_not_pool_different_spellings() {
        let (_, analysis) = analyze("var a = 7 + 07;");
        assert_eq!(analysis.table.size(analysis.memory_scope), 12);
        assert_eq!(bindings("var a = 7 + 07;"), pairs(&[("a", 14)]));
    }

    #[test]
    fn analyzer_stamps_nodes() {
        let (program, analysis) = analyze("var x = 1; { x; }");
        assert_eq!(program.info.memory_scope, Some(analysis.memory_scope));
        assert_eq!(program.info.name_scope, Some(analysis.name_scope));

        let var = &program.stmts[0];
        assert_eq!(var.info.ty, Some(Type::Int));
        assert_eq!(var.info.offset, Some(4));

        let block = &program.stmts[1];
        let block_scope = block.info.name_scope.unwrap();
        assert_ne!(block_scope, analysis.name_scope);
        assert_eq!(analysis.table.parent(block_scope), Some(analysis.name_scope));
        assert_eq!(
            analysis.table.parent(analysis.name_scope),
            Some(analysis.memory_scope)
        );

        match &block.kind {
            StmtKind::Block(inner) => match &inner[0].kind {
                StmtKind::Expr(expr) => {
                    assert_eq!(expr.info.offset, Some(4));
                    assert_eq!(expr.info.ty, Some(Type::Int));
                    assert_eq!(expr.info.name_scope, Some(block_scope));
                    assert_eq!(expr.info.memory_scope, Some(analysis.memory_scope));
                }
                other => panic!("expected expression statement, got {:?}", other),
            },
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn analyzer_block_var_gets_distinct_slot() {
        let (_, analysis) = analyze("{ var x = 5; } var x = 6;");
        assert_eq!(
            layout(&analysis),
            vec![
                ("5".to_string(), 0),
                ("x".to_string(), 4),
                ("6".to_string(), 8),
                ("x".to_string(), 12),
            ]
        );
    }

    #[test]
    fn analyzer_duplicate_declaration() {
        let err = expect_error("var x = 1; var x = 2;", ErrorKind::DuplicateDeclaration);
        let span = err.span.unwrap();
        assert_eq!((span.start.line, span.start.col), (1, 16));
        assert_eq!(span.slice("var x = 1; var x = 2;"), "x");
        assert_eq!(err.message, "variable 'x' already declared in this scope");
    }

    #[test]
    fn analyzer_duplicate_inside_block() {
        expect_error("{ var a; var a; }", ErrorKind::DuplicateDeclaration);
    }

    #[test]
    fn analyzer_unresolved_name() {
        let err = expect_error("y + 1;", ErrorKind::UnresolvedName);
        let span = err.span.unwrap();
        assert_eq!((span.start.index, span.end.index), (0, 1));
        assert_eq!(err.message, "variable 'y' not defined");
    }

    #[test]
    fn analyzer_block_names_do_not_leak() {
        expect_error("{ var a = 1; } a;", ErrorKind::UnresolvedName);
    }

    #[test]
    fn analyzer_initializer_cannot_see_its_own_name() {
        expect_error("var x = x;", ErrorKind::UnresolvedName);
    }

    #[test]
    fn analyzer_rejects_non_literal_token_in_literal() {
        let mut program = parse("x;");
        if let StmtKind::Expr(expr) = &mut program.stmts[0].kind {
            let token = match &expr.kind {
                ExprKind::Ident(t) => t.clone(),
                other => panic!("expected identifier, got {:?}", other),
            };
            expr.kind = ExprKind::Literal(token);
        }
        let err = analyzer::analyze(&mut program).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownLiteralKind);
        assert!(err.kind.is_internal());
    }

    #[test]
    fn analyses_are_independent() {
        let (_, first) = analyze("var a = 1;");
        let (_, second) = analyze("var b = 2;");
        assert_eq!(layout(&first), layout(&analyze("var a = 1;").1));
        assert_eq!(second.table.size(second.memory_scope), 8);
    }

    // =========================================================================
    // COMPILER TESTS
    // =========================================================================

    #[test]
    fn compiler_scenario_one_listing() {
        let compilation = driver::compile(source("var x = 1; var y = x + 2;")).unwrap();
        assert_eq!(
            compilation.module.listing(),
            "GLOBAL_ALLOC 16\n\
             GLOBAL_LOAD_CONST 0 4 1\n\
             GLOBAL_LOAD_CONST 4 4 0\n\
             GLOBAL_LOAD_CONST 8 4 2\n\
             GLOBAL_LOAD_CONST 12 4 0\n\
             LOAD_GLOBAL 1 0 4\n\
             GLOBAL_LOAD 4 4 1\n\
             LOAD_GLOBAL 2 4 4\n\
             LOAD_GLOBAL 3 8 4\n\
             ADD 4 2 3\n\
             GLOBAL_LOAD 12 4 4\n"
        );
        assert_eq!(compilation.module.register_count, 4);
        assert_eq!(
            compilation.module.spans.len(),
            compilation.module.instructions.len()
        );
        assert_eq!(compilation.module.spans[0], None);
    }

    #[test]
    fn compiler_var_without_initializer_emits_nothing() {
        let compilation = driver::compile(source("var x;")).unwrap();
        assert_eq!(
            compilation.module.instructions,
            vec![
                Instruction::GlobalAlloc { size: 4 },
                Instruction::GlobalLoadConst {
                    offset: 0,
                    size: 4,
                    value: 0
                },
            ]
        );
    }

    #[test]
    fn compiler_subtraction_and_expression_statements() {
        let compilation = driver::compile(source("var a = 5; a - 1;")).unwrap();
        let tail = &compilation.module.instructions[4..];
        assert_eq!(
            tail,
            &[
                Instruction::LoadGlobal {
                    dst: 1,
                    offset: 0,
                    size: 4
                },
                Instruction::GlobalLoad {
                    offset: 4,
                    size: 4,
                    src: 1
                },
                Instruction::LoadGlobal {
                    dst: 2,
                    offset: 4,
                    size: 4
                },
                Instruction::LoadGlobal {
                    dst: 3,
                    offset: 8,
                    size: 4
                },
                Instruction::Sub { dst: 4, a: 2, b: 3 },
            ]
        );
    }

    #[test]
    fn compiler_rejects_unknown_operator() {
        let mut program = parse("1 + 2;");
        if let StmtKind::Expr(Expr {
            kind: ExprKind::Binary { op, .. },
            ..
        }) = &mut program.stmts[0].kind
        {
            op.kind = TokenKind::Eq;
        }
        let analysis = analyzer::analyze(&mut program).unwrap();
        let err = Compiler::new(&analysis).compile(&program).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnexpectedNodeKind);
    }

    #[test]
    fn compiler_requires_analyzed_tree() {
        let unanalyzed = parse("var x = 1;");
        let mut analyzed = unanalyzed.clone();
        let analysis = analyzer::analyze(&mut analyzed).unwrap();
        let err = Compiler::new(&analysis).compile(&unanalyzed).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingType);
        assert_eq!(err.kind.category(), Category::Internal);
    }

    #[test]
    fn compilations_are_deterministic() {
        let text = "var a = 1; { var b = a + 2; } var c = a - 3;";
        let first = driver::compile(source(text)).unwrap();
        let second = driver::compile(source(text)).unwrap();
        assert_eq!(first.module, second.module);
    }

    // =========================================================================
    // OPCODE TESTS
    // =========================================================================

    #[test]
    fn instruction_display_respects_arity() {
        assert_eq!(Instruction::Nop.to_string(), "NOP");
        assert_eq!(Instruction::Print { src: 3 }.to_string(), "PRINT 3");
        assert_eq!(
            Instruction::GlobalAlloc { size: 16 }.to_string(),
            "GLOBAL_ALLOC 16"
        );
        assert_eq!(
            Instruction::Sub { dst: 3, a: 1, b: 2 }.to_string(),
            "SUB 3 1 2"
        );
    }

    #[test]
    fn instruction_flat_form() {
        let load = Instruction::LoadGlobal {
            dst: 7,
            offset: 8,
            size: 4,
        };
        assert_eq!(load.opcode(), Opcode::LoadGlobal);
        assert_eq!(load.operands(), [7, 8, 4]);
        assert_eq!(Instruction::from_parts(Opcode::LoadGlobal, [7, 8, 4]), load);
        assert_eq!(
            Instruction::from_parts(Opcode::Print, [5, 0, 0]),
            Instruction::Print { src: 5 }
        );
        assert_eq!(Instruction::GlobalAlloc { size: 9 }.operands(), [9, 0, 0]);
    }

    // =========================================================================
    // VM TESTS
    // =========================================================================

    #[test]
    fn vm_stores_big_endian() {
        let mut vm = Vm::with_output(Box::new(io::sink()));
        vm.execute(&module(vec![
            Instruction::GlobalAlloc { size: 6 },
            Instruction::GlobalLoadConst {
                offset: 1,
                size: 4,
                value: 0x0102_0304,
            },
        ]))
        .unwrap();
        let bytes: Vec<i64> = (0..6).map(|i| vm.read_global(i, 1).unwrap()).collect();
        assert_eq!(bytes, vec![0, 1, 2, 3, 4, 0]);
    }

    #[test]
    fn vm_store_truncates_and_load_zero_extends() {
        let mut vm = Vm::with_output(Box::new(io::sink()));
        vm.execute(&module(vec![
            Instruction::GlobalAlloc { size: 13 },
            Instruction::GlobalLoadConst {
                offset: 0,
                size: 1,
                value: 0x1234,
            },
            Instruction::GlobalLoadConst {
                offset: 1,
                size: 4,
                value: -1,
            },
            Instruction::GlobalLoadConst {
                offset: 5,
                size: 8,
                value: -2,
            },
        ]))
        .unwrap();
        assert_eq!(vm.read_global(0, 1).unwrap(), 0x34);
        assert_eq!(vm.read_global(1, 4).unwrap(), 0xFFFF_FFFF);
        assert_eq!(vm.read_global(5, 8).unwrap(), -2);
    }

    #[test]
    fn vm_store_load_every_width() {
        let values = [0, 1, -1, i64::MIN, i64::MAX, 0x0102_0304_0506_0708];
        for width in 1..=8i64 {
            for value in values {
                let mut vm = Vm::with_output(Box::new(io::sink()));
                vm.execute(&module(vec![
                    Instruction::GlobalAlloc { size: width + 2 },
                    Instruction::GlobalLoadConst {
                        offset: 1,
                        size: width,
                        value,
                    },
                ]))
                .unwrap();

                let expected = if width == 8 {
                    value
                } else {
                    value & ((1i64 << (width * 8)) - 1)
                };
                assert_eq!(
                    vm.read_global(1, width).unwrap(),
                    expected,
                    "width {} value {:#x}",
                    width,
                    value
                );
                // Neighbouring bytes are untouched.
                assert_eq!(vm.read_global(0, 1).unwrap(), 0);
                assert_eq!(vm.read_global(width + 1, 1).unwrap(), 0);
            }
        }
    }

    #[test]
    fn vm_realloc_discards_memory() {
        let mut vm = Vm::with_output(Box::new(io::sink()));
        vm.execute(&module(vec![
            Instruction::GlobalAlloc { size: 4 },
            Instruction::GlobalLoadConst {
                offset: 0,
                size: 4,
                value: 9,
            },
            Instruction::GlobalAlloc { size: 2 },
        ]))
        .unwrap();
        assert_eq!(vm.read_global(0, 2).unwrap(), 0);
        let err = vm.read_global(0, 4).unwrap_err();
        assert_eq!(err.message, "access [0, 4) outside global memory of 2 bytes");
    }

    #[test]
    fn vm_registers_grow_on_demand() {
        let mut vm = Vm::with_output(Box::new(io::sink()));
        vm.execute(&module(vec![Instruction::Add {
            dst: 100,
            a: 1,
            b: 2,
        }]))
        .unwrap();
        assert_eq!(vm.register_count(), 101);
        assert_eq!(vm.register(100).unwrap(), 0);
    }

    #[test]
    fn vm_arithmetic_wraps() {
        let mut vm = Vm::with_output(Box::new(io::sink()));
        vm.execute(&module(vec![
            Instruction::GlobalAlloc { size: 8 },
            Instruction::GlobalLoadConst {
                offset: 0,
                size: 8,
                value: i64::MAX,
            },
            Instruction::LoadGlobal {
                dst: 1,
                offset: 0,
                size: 8,
            },
            Instruction::Add { dst: 2, a: 1, b: 1 },
        ]))
        .unwrap();
        assert_eq!(vm.register(2).unwrap(), -2);
    }

    #[test]
    fn vm_print_writes_one_line() {
        let buf = SharedBuf::default();
        let mut vm = Vm::with_output(Box::new(buf.clone()));
        vm.execute(&module(vec![
            Instruction::GlobalAlloc { size: 4 },
            Instruction::GlobalLoadConst {
                offset: 0,
                size: 4,
                value: 42,
            },
            Instruction::LoadGlobal {
                dst: 1,
                offset: 0,
                size: 4,
            },
            Instruction::Print { src: 1 },
        ]))
        .unwrap();
        assert_eq!(String::from_utf8(buf.0.borrow().clone()).unwrap(), "42\n");
    }

    #[test]
    fn vm_runtime_errors() {
        let cases = [
            (
                vec![Instruction::LoadGlobal {
                    dst: 1,
                    offset: 0,
                    size: 4,
                }],
                "global memory accessed before allocation",
            ),
            (
                vec![
                    Instruction::GlobalAlloc { size: 4 },
                    Instruction::LoadGlobal {
                        dst: 1,
                        offset: 2,
                        size: 4,
                    },
                ],
                "access [2, 6) outside global memory of 4 bytes",
            ),
            (
                vec![
                    Instruction::GlobalAlloc { size: 16 },
                    Instruction::GlobalLoadConst {
                        offset: 0,
                        size: 9,
                        value: 1,
                    },
                ],
                "access width 9 outside 1..=8",
            ),
            (vec![Instruction::Print { src: -1 }], "invalid register r-1"),
            (
                vec![Instruction::GlobalAlloc { size: -1 }],
                "cannot allocate -1 bytes",
            ),
        ];
        for (instructions, message) in cases {
            let mut vm = Vm::with_output(Box::new(io::sink()));
            let err = vm.execute(&module(instructions)).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Runtime);
            assert_eq!(err.message, message);
        }
    }

    #[test]
    fn vm_state_decodes_seeded_slots() {
        let (compilation, vm) = match run("var x = 1; var y = x + 2;") {
            Ok(done) => done,
            Err(e) => panic!("{}", e),
        };
        assert_eq!(
            vm.state(&compilation.module).unwrap(),
            vec![(0, 4, 1), (4, 4, 1), (8, 4, 2), (12, 4, 3)]
        );
        assert_eq!(
            driver::format_state(&vm, &compilation.module).unwrap(),
            "========== GLOBAL STATE ==========\n0 4: 1\n4 4: 1\n8 4: 2\n12 4: 3\n"
        );
    }

    // =========================================================================
    // END-TO-END TESTS
    // =========================================================================

    #[test]
    fn e2e_scenario_one() {
        let (_, vm) = match run("var x = 1; var y = x + 2;") {
            Ok(done) => done,
            Err(e) => panic!("{}", e),
        };
        assert_eq!(vm.read_global(12, 4).unwrap(), 3);
    }

    #[test]
    fn e2e_scenario_two_block_shadowing() {
        let (_, vm) = match run("{ var x = 5; } var x = 6;") {
            Ok(done) => done,
            Err(e) => panic!("{}", e),
        };
        assert_eq!(vm.read_global(4, 4).unwrap(), 5);
        assert_eq!(vm.read_global(12, 4).unwrap(), 6);
    }

    #[test]
    fn e2e_inner_scope_sees_innermost_binding() {
        assert_eq!(
            bindings("var x = 1; { var x = 2; var y = x; } var z = x;"),
            pairs(&[("x", 1), ("x", 2), ("y", 2), ("z", 1)])
        );
    }

    #[test]
    fn e2e_chained_arithmetic() {
        assert_eq!(
            bindings("var a = 10 - 3 - 2; var b = a + a - 1;"),
            pairs(&[("a", 5), ("b", 9)])
        );
    }

    #[test]
    fn e2e_uninitialized_var_is_zero() {
        assert_eq!(bindings("var x; var y = x + 1;"), pairs(&[("x", 0), ("y", 1)]));
    }

    #[test]
    fn e2e_negative_results_zero_extend() {
        assert_eq!(bindings("var x = 0 - 1;"), pairs(&[("x", 0xFFFF_FFFF)]));
    }

    #[test]
    fn e2e_large_literal_truncates_to_slot() {
        assert_eq!(bindings("var x = 4294967297;"), pairs(&[("x", 1)]));
    }

    // =========================================================================
    // DIAGNOSTIC TESTS
    // =========================================================================

    #[test]
    fn error_display() {
        let err = expect_error("var x = 1; var x = 2;", ErrorKind::DuplicateDeclaration);
        assert_eq!(
            err.to_string(),
            "DuplicateDeclaration [line 1:16]: variable 'x' already declared in this scope"
        );
        assert_eq!(
            Error::runtime("boom", None).to_string(),
            "RuntimeError: boom"
        );
    }

    #[test]
    fn error_categories() {
        assert_eq!(ErrorKind::Lexer.category(), Category::Syntax);
        assert_eq!(ErrorKind::Parser.category(), Category::Syntax);
        assert_eq!(ErrorKind::UnresolvedName.category(), Category::Semantic);
        assert_eq!(ErrorKind::DuplicateDeclaration.category(), Category::Semantic);
        assert_eq!(ErrorKind::Runtime.category(), Category::Runtime);
        assert!(ErrorKind::UnexpectedNodeKind.is_internal());
        assert!(!ErrorKind::UnresolvedName.is_internal());
    }

    #[test]
    fn format_error_marks_span() {
        let text = "var x = 1; var x = 2;";
        let err = expect_error(text, ErrorKind::DuplicateDeclaration);
        let expected = format!(
            "test.ql:1:16: DuplicateDeclaration: variable 'x' already declared in this scope\n\
             {pad}|{pad}{marker}\n\
             1       >{pad}{text}\n\
             {pad}|",
            pad = " ".repeat(8),
            marker = format!("{}v{}", " ".repeat(15), " ".repeat(5)),
            text = text,
        );
        assert_eq!(format_error(&err, text, "test.ql"), expected);
    }

    #[test]
    fn format_error_expands_tabs() {
        let text = "\tfoo;";
        let err = expect_error(text, ErrorKind::UnresolvedName);
        let rendered = format_error(&err, text, "test.ql");
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "test.ql:1:2: UnresolvedName: variable 'foo' not defined");
        assert_eq!(lines[1], format!("{}|{}vvv ", " ".repeat(8), " ".repeat(16)));
        assert_eq!(lines[2], format!("1       >{}foo;", " ".repeat(16)));
    }

    #[test]
    fn format_error_without_span_and_internal_heading() {
        let err = Error::runtime("boom", None);
        assert_eq!(format_error(&err, "", "a.ql"), "a.ql: RuntimeError: boom");

        let internal = Error {
            kind: ErrorKind::MissingType,
            message: "no type".to_string(),
            span: None,
        };
        assert_eq!(
            format_error(&internal, "", "a.ql"),
            "a.ql: internal error (MissingType): no type"
        );
    }

    // =========================================================================
    // DRIVER & TREE PRINTER TESTS
    // =========================================================================

    #[test]
    fn print_tree_layout() {
        let program = parse("var x = 1; { x + 2; }");
        assert_eq!(
            print_tree(&program),
            "+-- PROGRAM\n\
             \x20   +-- VAR_STMT(IDENTIFIER | x)\n\
             \x20   |   +-- LITERAL(INT_LITERAL | 1)\n\
             \x20   +-- BLOCK_STMT\n\
             \x20       +-- EXPR_STMT\n\
             \x20           +-- BINARY(PLUS | +)\n\
             \x20               +-- IDENTIFIER(IDENTIFIER | x)\n\
             \x20               +-- LITERAL(INT_LITERAL | 2)\n"
        );
    }

    #[test]
    fn driver_dumps_follow_config() {
        let compilation = driver::compile(source("var x = 1;")).unwrap();
        assert_eq!(compilation.dumps(&Config::default()), "");

        let config = Config {
            dump_tokens: true,
            dump_ir: true,
            ..Config::default()
        };
        let dump = compilation.dumps(&config);
        assert!(dump.starts_with("========== TOKENS ==========\n1:1\tVAR_KEYWORD | var\n"));
        assert!(dump.contains("========== IR ==========\nGLOBAL_ALLOC 8\n"));
        assert!(!dump.contains("AST"));
    }

    // =========================================================================
    // SESSION TESTS
    // =========================================================================

    #[test]
    fn session_accumulates_entries() {
        let mut session = Session::new();
        assert_eq!(session.submit("var x = 1;").unwrap(), pairs(&[("x", 1)]));
        assert_eq!(session.submit("var y = x + 1;").unwrap(), pairs(&[("y", 2)]));
        assert_eq!(session.source(), "var x = 1;\nvar y = x + 1;");
    }

    #[test]
    fn session_discards_failed_entry() {
        let mut session = Session::new();
        session.submit("var x = 1;").unwrap();

        let rejected = session.submit("var x = 2;").unwrap_err();
        assert_eq!(rejected.error.kind, ErrorKind::DuplicateDeclaration);
        assert_eq!(rejected.error.span.map(|s| s.start.line), Some(2));
        assert_eq!(rejected.source, "var x = 1;\nvar x = 2;");
        assert_eq!(session.source(), "var x = 1;");

        let rejected = session.submit("var z = 1 +").unwrap_err();
        assert_eq!(rejected.error.kind, ErrorKind::Parser);
        assert_eq!(session.submit("var z = x;").unwrap(), pairs(&[("z", 1)]));
    }

    #[test]
    fn session_reports_block_declarations() {
        let mut session = Session::new();
        assert_eq!(session.submit("{ var a = 3; }").unwrap(), pairs(&[("a", 3)]));
        assert!(session.submit("a;").is_err());
    }

    #[test]
    fn session_listing_and_state() {
        let mut session = Session::new();
        assert!(session.listing().is_none());
        assert!(session.state().is_none());

        session.submit("var x = 4;").unwrap();
        assert!(session
            .listing()
            .unwrap()
            .starts_with("GLOBAL_ALLOC 8\n"));
        let state = session.state().unwrap().unwrap();
        assert_eq!(state, "========== GLOBAL STATE ==========\n0 4: 4\n4 4: 4\n");
    }
}
