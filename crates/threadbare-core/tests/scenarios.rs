use std::collections::HashSet;

use threadbare_core::error::CoreError;
use threadbare_core::ir::{Expression, PluralCase, PluralKind, Step};
use threadbare_core::pipeline::{compile, CodegenConfig, CompiledProgram};
use threadbare_core::syntax::{
    BinaryOp, Clause, Expr, Guard, Header, LineStatement, NodeDecl, SetOperator, ShortcutOption,
    SourceFile, Statement, TextPart,
};

fn compile_nodes(nodes: Vec<NodeDecl>) -> Result<CompiledProgram, CoreError> {
    let file = SourceFile {
        filename: "story.yarn".to_string(),
        nodes,
    };
    compile(&[file], CodegenConfig::default())
}

fn steps(program: &CompiledProgram, name: &str) -> Vec<Step> {
    program.nodes[name].steps.clone()
}

#[test]
fn interpolated_line() {
    let line = LineStatement::new(vec![
        TextPart::text("Hello "),
        TextPart::expr(Expr::var("$name")),
        TextPart::text("!"),
    ]);
    let program = compile_nodes(vec![NodeDecl::new(
        "Start",
        vec![
            Statement::declare("$name", Expr::str("Mae")),
            Statement::Line(line),
        ],
    )])
    .unwrap();
    let steps = steps(&program, "Start");
    let [Step::Line(line)] = steps.as_slice() else {
        panic!("expected a single line, got {steps:?}");
    };
    assert_eq!(
        line.content,
        vec![
            Expression::text("Hello "),
            Expression::calculated("runner.variables.name"),
            Expression::text("!"),
        ]
    );
    assert_eq!(program.context.variables["name"], "\"Mae\"");
}

#[test]
fn compound_subtraction() {
    let program = compile_nodes(vec![NodeDecl::new(
        "Start",
        vec![Statement::set("$gold", SetOperator::Sub, Expr::num(2.0))],
    )])
    .unwrap();
    assert_eq!(
        steps(&program, "Start"),
        vec![Step::Set {
            variable: "gold".into(),
            operation: "-=".into(),
            expression: "2".into(),
        }]
    );
}

#[test]
fn two_unconditioned_options() {
    let option = |text: &str| {
        ShortcutOption::new(
            LineStatement::new(vec![TextPart::text(text)]),
            vec![Statement::line(text)],
        )
    };
    let program = compile_nodes(vec![NodeDecl::new(
        "Start",
        vec![Statement::Options {
            options: vec![option("A"), option("B")],
        }],
    )])
    .unwrap();
    let steps = steps(&program, "Start");

    let indices: Vec<usize> = steps
        .iter()
        .filter_map(|s| match s {
            Step::Option(o) => Some(o.index),
            _ => None,
        })
        .collect();
    assert_eq!(indices, vec![0, 1]);
    assert_eq!(steps.iter().filter(|s| **s == Step::StartOptions).count(), 1);
    assert_eq!(steps.iter().filter(|s| **s == Step::SendOptions).count(), 1);

    let gotos: Vec<&str> = steps
        .iter()
        .filter_map(|s| match s {
            Step::GoTo { target } => Some(target.name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(gotos.len(), 2);
    assert!(gotos.iter().all(|g| *g == gotos[0]));
    assert!(matches!(steps.last(), Some(Step::Label(l)) if l.name == gotos[0]));
}

#[test]
fn node_group_with_three_members() {
    let mood_is = |mood: &str| {
        Guard::Expr(Expr::binary(BinaryOp::Eq, Expr::var("$mood"), Expr::str(mood)))
    };
    let member = |offset: usize, guard: Guard| {
        NodeDecl::new("Greet", vec![Statement::line("...")])
            .at(offset)
            .with_header(Header::When(guard))
    };
    let program = compile_nodes(vec![
        NodeDecl::new("Start", vec![Statement::jump("Greet")]),
        member(100, mood_is("happy")),
        member(200, mood_is("sad")),
        member(300, Guard::Always),
    ])
    .unwrap();

    let wrapper = steps(&program, "Greet");
    let complexities: Vec<usize> = wrapper
        .iter()
        .filter_map(|s| match s {
            Step::Option(o) => Some(o.complexity),
            _ => None,
        })
        .collect();
    assert_eq!(complexities, vec![1, 1, 0]);

    let fallback = wrapper
        .iter()
        .find_map(|s| match s {
            Step::SendLineGroup { fallback } => Some(fallback.clone()),
            _ => None,
        })
        .expect("wrapper sends a line group");
    // Only the closing label targets the fallback; every member jumps away.
    assert_eq!(wrapper.last(), Some(&Step::Label(fallback)));
    let jumps: Vec<&str> = wrapper
        .iter()
        .filter_map(|s| match s {
            Step::Jump { target, safe: true } => Some(target.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(
        jumps,
        vec!["_Greet_story_100", "_Greet_story_200", "_Greet_story_300"]
    );
}

#[test]
fn plural_rewrite() {
    let line = LineStatement::new(vec![
        TextPart::text("[plural value="),
        TextPart::expr(Expr::var("$n")),
        TextPart::text(r#" one="% apple" other="% apples" /]"#),
    ]);
    let program = compile_nodes(vec![NodeDecl::new("Start", vec![Statement::Line(line)])]).unwrap();
    let steps = steps(&program, "Start");
    let Step::Line(line) = &steps[0] else {
        panic!("expected line");
    };
    let Expression::Plural(plural) = &line.content[0] else {
        panic!("expected plural, got {:?}", line.content);
    };
    assert_eq!(plural.kind, PluralKind::Cardinal);
    assert_eq!(plural.value, "runner.variables.n");
    let cases: Vec<PluralCase> = plural.cases.iter().map(|(c, _)| *c).collect();
    assert_eq!(cases, vec![PluralCase::One, PluralCase::Other]);
}

#[test]
fn cyclic_smart_variables_fail_before_steps() {
    let program = compile_nodes(vec![NodeDecl::new(
        "Start",
        vec![
            Statement::declare("$a", Expr::binary(BinaryOp::Add, Expr::var("$b"), Expr::num(1.0))),
            Statement::declare("$b", Expr::binary(BinaryOp::Add, Expr::var("$a"), Expr::num(1.0))),
            Statement::line("unreachable"),
        ],
    )]);
    assert!(matches!(
        program,
        Err(CoreError::CyclicSmartVariables { .. })
    ));
}

#[test]
fn labels_unique_and_increasing() {
    let body = vec![
        Statement::line("one"),
        Statement::If {
            clauses: vec![
                Clause {
                    condition: Some(Expr::var("$x")),
                    body: vec![Statement::line("two"), Statement::command("wait 1")],
                },
                Clause {
                    condition: None,
                    body: vec![Statement::detour("Other")],
                },
            ],
        },
        Statement::Options {
            options: vec![ShortcutOption::new(
                LineStatement::new(vec![TextPart::text("go")]),
                vec![Statement::line("three")],
            )],
        },
    ];
    let program = compile_nodes(vec![
        NodeDecl::new("Start", body),
        NodeDecl::new("Other", vec![]),
    ])
    .unwrap();
    let node = &program.nodes["Start"];

    let ids: Vec<u32> = node.labels().iter().map(|l| l.id).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(ids.first(), Some(&1));

    // Every allocated label opens exactly one case.
    let cases: Vec<u32> = node
        .steps
        .iter()
        .filter_map(|s| s.case_label().map(|l| l.id))
        .collect();
    let unique: HashSet<u32> = cases.iter().copied().collect();
    assert_eq!(unique.len(), cases.len());
    assert_eq!(unique, ids.iter().copied().collect());
}

#[test]
fn markup_is_balanced() {
    let line = LineStatement::new(vec![TextPart::text("Mae: [a]x[b]y[/] [c/]z")]);
    let program = compile_nodes(vec![NodeDecl::new("Start", vec![Statement::Line(line)])]).unwrap();
    let steps = steps(&program, "Start");
    let Step::Line(line) = &steps[0] else {
        panic!("expected line");
    };
    let (mut starts, mut ends) = (0, 0);
    for expr in &line.content {
        if let Expression::Markup(m) = expr {
            if m.is_start {
                starts += 1;
            } else {
                ends += 1;
            }
        }
    }
    // `[c/]` is self-closing and has no end marker.
    assert_eq!(starts, ends + 1);
    assert!(program.context.markup_names.contains("character"));
}
