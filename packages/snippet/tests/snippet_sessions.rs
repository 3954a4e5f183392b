use bundlestore_snippet::{
    parse_template, Environment, NoCommands, Node, RunError, SnippetEngine, StringBuffer, TextBuffer,
};

fn upcase(command: &str, input: &str, env: &Environment) -> Result<String, RunError> {
    match command {
        "upcase" => Ok(format!("{}\n", input.to_uppercase())),
        "tag" => Ok(format!("{}-{}", input, env.get("TM_TABSTOP_2").unwrap_or("?"))),
        _ => Err(RunError::Failed {
            command: command.to_owned(),
            status: 1,
        }),
    }
}

#[test]
fn mirrors_and_transforms_follow_typing() {
    let mut engine: SnippetEngine = SnippetEngine::default();
    let mut buf = StringBuffer::new("");
    engine
        .start_snippet(&mut buf, r"${1:one} ${2:two} $1 ${2/^(.)/\u$1/}", &Environment::new())
        .unwrap();
    assert_eq!(buf.as_str(), "one two one Two");
    assert_eq!(buf.selected_text(), Some("one"));

    engine.insert(&mut buf, "abc");
    assert_eq!(buf.as_str(), "abc two abc Two");

    engine.next_tab(&mut buf);
    assert_eq!(buf.selected_text(), Some("two"));
    engine.insert(&mut buf, "xyz");
    assert_eq!(buf.as_str(), "abc xyz abc Xyz");

    engine.prev_tab(&mut buf);
    let two = engine.tab_stop_range(2).unwrap();
    buf.remove_all_selections();
    buf.set_pos(3);
    engine.insert(&mut buf, "def");
    assert_eq!(buf.as_str(), "abcdef xyz abcdef Xyz");
    assert_eq!(engine.tab_stop_range(1), Some(0..6));
    assert_eq!(engine.tab_stop_range(2), Some(two.start + 3..two.end + 3));
    assert!(engine.validate(&buf));
}

#[test]
fn pipes_run_when_leaving_a_stop() {
    let mut engine = SnippetEngine::new(upcase);
    let mut buf = StringBuffer::new("");
    engine
        .start_snippet(&mut buf, "${1:name|tag} ${2:x|upcase}", &Environment::new())
        .unwrap();
    assert_eq!(buf.as_str(), "name x");

    engine.next_tab(&mut buf);
    assert_eq!(buf.as_str(), "name-x x");
    assert_eq!(engine.current_tab(), Some(2));
    assert_eq!(buf.selected_text(), Some("x"));

    engine.insert(&mut buf, "done");
    engine.next_tab(&mut buf);
    assert_eq!(buf.as_str(), "name-x DONE");
    assert!(!engine.is_active());
    assert_eq!(buf.pos(), buf.as_str().len());
}

#[test]
fn final_stop_can_pipe_too() {
    let mut engine = SnippetEngine::new(upcase);
    let mut buf = StringBuffer::new("");
    engine
        .start_snippet(&mut buf, "a${1:b}${0:c|upcase}", &Environment::new())
        .unwrap();
    engine.next_tab(&mut buf);
    assert_eq!(buf.as_str(), "abC");
    assert!(!engine.is_active());
}

#[test]
fn failing_pipe_keeps_the_text() {
    let mut engine: SnippetEngine = SnippetEngine::default();
    let mut buf = StringBuffer::new("");
    engine
        .start_snippet(&mut buf, "${1:keep|missing} $0", &Environment::new())
        .unwrap();
    engine.next_tab(&mut buf);
    assert_eq!(buf.as_str(), "keep ");
    assert_eq!(buf.pos(), 5);
    assert!(!engine.is_active());
}

#[test]
fn expansion_follows_the_line_indent() {
    let mut engine: SnippetEngine = SnippetEngine::default();
    let mut buf = StringBuffer::new("    ");
    engine
        .start_snippet(&mut buf, "if $1 {\n\t$0\n}", &Environment::new())
        .unwrap();
    assert_eq!(buf.as_str(), "    if  {\n    \t\n    }");
    assert_eq!(engine.tab_stop_range(1), Some(7..7));
    assert_eq!(engine.end_position(), Some(15));

    engine.insert(&mut buf, "x");
    engine.next_tab(&mut buf);
    assert_eq!(buf.as_str(), "    if x {\n    \t\n    }");
    assert_eq!(buf.pos(), 16);
}

#[test]
fn newline_inside_a_stop_keeps_the_indent() {
    let mut engine: SnippetEngine = SnippetEngine::default();
    let mut buf = StringBuffer::new("  ").with_indent_unit("  ");
    engine
        .start_snippet(&mut buf, "${1:body}$0;", &Environment::new())
        .unwrap();
    engine.insert(&mut buf, "a");
    engine.insert(&mut buf, "\n");
    assert_eq!(buf.as_str(), "  a\n  ;");
    assert_eq!(engine.tab_stop_range(1), Some(2..6));
    assert_eq!(engine.end_position(), Some(6));
    assert!(engine.validate(&buf));
}

#[test]
fn variables_come_from_the_environment() {
    let mut env = Environment::new();
    env.set("TM_FULLNAME", "Ada Lovelace");
    let mut engine: SnippetEngine = SnippetEngine::default();
    let mut buf = StringBuffer::new("");
    engine
        .start_snippet(&mut buf, "by ${TM_FULLNAME:you} on ${TM_DATE:${1:today}}", &env)
        .unwrap();
    assert_eq!(buf.as_str(), "by Ada Lovelace on today");
    assert_eq!(buf.selected_text(), Some("today"));
}

#[test]
fn moving_away_ends_the_session() {
    let mut engine: SnippetEngine = SnippetEngine::default();
    let mut buf = StringBuffer::new("x = ");
    engine
        .start_snippet(&mut buf, "${1:a} + ${2:b}$0;", &Environment::new())
        .unwrap();
    assert!(engine.validate(&buf));

    buf.remove_all_selections();
    buf.set_pos(0);
    assert!(!engine.validate(&buf));
    assert!(!engine.is_active());

    // Editing with no session is a plain edit.
    engine.insert(&mut buf, "let ");
    assert_eq!(buf.as_str(), "let x = a + b;");
}

#[test]
fn goto_end_leaves_the_text_alone() {
    let mut engine: SnippetEngine = SnippetEngine::default();
    let mut buf = StringBuffer::new("");
    engine
        .start_snippet(&mut buf, "fn ${1:name}($2)$0 {}", &Environment::new())
        .unwrap();
    engine.goto_end_and_clear(&mut buf);
    assert_eq!(buf.as_str(), "fn name() {}");
    assert_eq!(buf.pos(), 9);
    assert!(!engine.is_active());
}

#[test]
fn a_new_snippet_replaces_the_running_one() {
    let mut engine: SnippetEngine = SnippetEngine::default();
    let mut buf = StringBuffer::new("");
    engine.start_snippet(&mut buf, "${1:a}", &Environment::new()).unwrap();
    buf.remove_all_selections();
    buf.set_pos(1);
    engine.start_snippet(&mut buf, "[${1:b}]", &Environment::new()).unwrap();
    assert_eq!(buf.as_str(), "a[b]");
    assert_eq!(engine.tab_stop_range(1), Some(2..3));
}

#[test]
fn without_a_runner_shell_parts_are_empty() {
    let mut engine = SnippetEngine::new(NoCommands);
    let mut buf = StringBuffer::new("");
    engine
        .start_snippet(&mut buf, "date: `date`.", &Environment::new())
        .unwrap();
    assert_eq!(buf.as_str(), "date: .");
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn parsing_never_panics(template in "\\PC*") {
            let _ = parse_template(&template);
        }

        #[test]
        fn plain_text_expands_to_itself(text in "[a-zA-Z0-9 .,;:\n]*") {
            let nodes = parse_template(&text);
            if text.is_empty() {
                prop_assert!(nodes.is_empty());
            } else {
                prop_assert_eq!(nodes, vec![Node::Text(text.clone())]);
            }

            let mut engine: SnippetEngine = SnippetEngine::default();
            let mut buf = StringBuffer::new("");
            engine.start_snippet(&mut buf, &text, &Environment::new()).unwrap();
            prop_assert_eq!(buf.as_str(), text.as_str());
            prop_assert_eq!(buf.pos(), text.len());
            prop_assert!(!engine.is_active());
        }
    }
}
