use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use vibetodo::app::{EditState, SaveOutcome, TodoApp};
use vibetodo::core::todo::Todo;
use vibetodo::error::TodoError;

const HELP: &str = "\
commands:
  ls                    show the list
  add <text>            add a todo
  edit <n|id> [text]    replace a todo's text (prompts when text is omitted)
  rm <n|id>             delete a todo (asks first)
  help                  this text
  quit                  leave";

const PROMPT: &str = "> ";

pub fn render(todos: &[Todo]) {
    if todos.is_empty() {
        println!("(no todos)");
        return;
    }
    for (i, todo) in todos.iter().enumerate() {
        println!(
            "{:>3}. {}  [{} {}]",
            i + 1,
            todo.text,
            todo.id,
            todo.created_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
        );
    }
}

/// Line-oriented stdin that can be awaited alongside other events.
pub struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Console {
    pub fn stdin() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// The next line without its terminator, or `None` at end of input.
    pub async fn read_line(&mut self) -> Option<String> {
        match self.lines.next_line().await {
            Ok(Some(line)) => Some(line.trim_end_matches('\r').to_string()),
            Ok(None) => None,
            Err(e) => {
                log::warn!("Failed to read stdin: {}", e);
                None
            }
        }
    }

    pub async fn ask(&mut self, label: &str) -> Option<String> {
        show_prompt(label);
        self.read_line().await
    }

    pub async fn confirm_delete(&mut self, todo: &Todo) -> bool {
        self.ask(&format!("Delete \"{}\"? [y/N] ", todo.text))
            .await
            .is_some_and(|answer| is_yes(&answer))
    }
}

fn show_prompt(label: &str) {
    print!("{}", label);
    let _ = io::stdout().flush();
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim(), "y" | "Y" | "yes" | "Yes")
}

/// Accept a 1-based row number from the last render, or a raw id.
fn resolve_ref(items: &[Todo], token: &str) -> String {
    token
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| items.get(i))
        .map(|t| t.id.clone())
        .unwrap_or_else(|| token.to_string())
}

fn show_error(app: &TodoApp, err: &TodoError) {
    eprintln!("error: {}", err);
    if let Some(hint) = err.hint(&app.backend().describe()) {
        eprintln!("\n{}", hint);
    }
}

async fn edit(app: &mut TodoApp, console: &mut Console, rest: &str) -> Result<(), TodoError> {
    let (target, text) = rest.split_once(' ').unwrap_or((rest, ""));
    let id = resolve_ref(app.items(), target);
    app.start_edit(&id)?;

    let text = if text.trim().is_empty() {
        let current = match app.edit_state() {
            EditState::Editing { draft, .. } => draft.clone(),
            EditState::Idle => String::new(),
        };
        console
            .ask(&format!("new text (was \"{}\"): ", current))
            .await
            .unwrap_or_default()
    } else {
        text.to_string()
    };
    app.set_draft(text);

    match app.save_edit().await {
        Ok(SaveOutcome::Cancelled) => {
            println!("Edit cancelled");
            Ok(())
        }
        Ok(SaveOutcome::Saved) => Ok(()),
        Err(e) => {
            app.cancel_edit();
            Err(e)
        }
    }
}

async fn delete(app: &mut TodoApp, console: &mut Console, rest: &str) -> Result<(), TodoError> {
    let id = resolve_ref(app.items(), rest);
    // An unknown id falls through to the controller, which reports it.
    let confirmed = match app.get(&id).cloned() {
        Some(todo) => console.confirm_delete(&todo).await,
        None => false,
    };
    if !app.delete(&id, |_| confirmed).await? {
        println!("Cancelled");
    }
    Ok(())
}

/// Interactive loop. For live backends, pushed snapshots redraw the list
/// while the prompt is waiting.
pub async fn run(app: &mut TodoApp) {
    println!("Connected to {}. Type `help` for commands.", app.backend().describe());
    if let Err(e) = app.refresh().await {
        show_error(app, &e);
    }
    render(app.items());

    let mut console = Console::stdin();
    let mut live = app.is_live();
    show_prompt(PROMPT);

    loop {
        let line = tokio::select! {
            line = console.read_line() => line,
            updated = app.next_update(), if live => {
                if updated {
                    println!();
                    render(app.items());
                } else {
                    log::warn!("Subscription closed; the list will no longer update by itself");
                    live = false;
                }
                show_prompt(PROMPT);
                continue;
            }
        };
        let Some(line) = line else { break };

        let line = line.trim();
        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        let result = match cmd {
            "" => Ok(()),
            "quit" | "exit" | "q" => break,
            "help" | "?" => {
                println!("{}", HELP);
                show_prompt(PROMPT);
                continue;
            }
            "ls" | "list" => app.refresh().await,
            "add" => {
                let mut input = rest.to_string();
                app.submit(&mut input).await
            }
            "edit" => edit(app, &mut console, rest).await,
            "rm" | "delete" => delete(app, &mut console, rest).await,
            other => {
                println!("unknown command `{}`, try `help`", other);
                show_prompt(PROMPT);
                continue;
            }
        };

        if let Err(e) = result {
            show_error(app, &e);
        }
        if !cmd.is_empty() {
            render(app.items());
        }
        show_prompt(PROMPT);
    }
}
