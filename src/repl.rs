use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use quill::error::format_error;
use quill::session::{Session, REPL_PATH};

pub fn start() {
    let mut editor = match DefaultEditor::new() {
        Ok(ed) => ed,
        Err(e) => {
            eprintln!("failed to initialize REPL: {}", e);
            std::process::exit(1);
        }
    };

    let mut session = Session::new();

    loop {
        let input = match read_input(&mut editor) {
            Some(line) => line,
            None => break,
        };

        match input.trim() {
            "" => continue,
            ".ir" => {
                match session.listing() {
                    Some(listing) => print!("{}", listing),
                    None => println!("(nothing compiled yet)"),
                }
                continue;
            }
            ".state" => {
                match session.state() {
                    Some(Ok(state)) => print!("{}", state),
                    Some(Err(e)) => eprintln!("{}", format_error(&e, session.source(), REPL_PATH)),
                    None => println!("(nothing run yet)"),
                }
                continue;
            }
            _ => {}
        }

        match session.submit(&input) {
            Ok(bindings) => {
                for (name, value) in bindings {
                    println!("{} = {}", name, value);
                }
            }
            Err(rejected) => {
                eprintln!("{}", format_error(&rejected.error, &rejected.source, REPL_PATH));
            }
        }
    }
}

fn read_input(editor: &mut DefaultEditor) -> Option<String> {
    let first_line = match editor.readline(">> ") {
        Ok(line) => line,
        Err(ReadlineError::Eof | ReadlineError::Interrupted) => return None,
        Err(e) => {
            eprintln!("readline error: {}", e);
            return None;
        }
    };

    if first_line.trim() == ".exit" {
        return None;
    }

    let mut buffer = first_line;

    while needs_continuation(&buffer) {
        match editor.readline(".. ") {
            Ok(line) => {
                buffer.push('\n');
                buffer.push_str(&line);
            }
            Err(ReadlineError::Eof | ReadlineError::Interrupted) => break,
            Err(e) => {
                eprintln!("readline error: {}", e);
                break;
            }
        }
    }

    let _ = editor.add_history_entry(&buffer);
    Some(buffer)
}

/// An entry continues while it has unclosed braces. Braces inside `//`
/// comments do not count.
fn needs_continuation(input: &str) -> bool {
    let mut depth: i32 = 0;
    for line in input.lines() {
        let code = line.split("//").next().unwrap_or("");
        for byte in code.bytes() {
            match byte {
                b'{' => depth += 1,
                b'}' => depth -= 1,
                _ => {}
            }
        }
    }
    depth > 0
}
