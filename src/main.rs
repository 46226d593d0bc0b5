use clap::{Parser, Subcommand};

mod shell;

use vibetodo::app::TodoApp;
use vibetodo::backend;
use vibetodo::config::{API_URL_ENV, BackendKind, TodoConfig};
use vibetodo::error::TodoError;

#[derive(Parser, Debug)]
#[command(name = "vibetodo", version, about = "Todo list client for REST and realtime backends")]
struct Cli {
    /// Backend to use for this run instead of the saved one
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,

    /// REST API URL, overriding the saved preference
    #[arg(long, env = API_URL_ENV)]
    api_url: Option<String>,

    /// Log debug output to the journal
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show all todos, newest first
    List,
    /// Add a todo
    Add { text: Vec<String> },
    /// Replace the text of a todo
    Edit { id: String, text: Vec<String> },
    /// Delete a todo
    Delete {
        id: String,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Look for a local development server and print what was found
    Probe,
    /// Save which backend to use from now on
    Use {
        #[arg(value_enum)]
        backend: BackendKind,
        /// URL for the local backend
        url: Option<String>,
    },
    /// Interactive session
    Shell,
}

fn init_logging(debug: bool) {
    // Journal logging (`journalctl --user -t vibetodo -f`).
    // Wrapper filters: vibetodo at info/debug (per config), everything else at warn.
    struct FilteredJournal {
        inner: systemd_journal_logger::JournalLog,
    }

    impl log::Log for FilteredJournal {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            if metadata.target().starts_with("vibetodo") {
                let max = if vibetodo::debug_logging() { log::LevelFilter::Debug } else { log::LevelFilter::Info };
                metadata.level() <= max
            } else {
                metadata.level() <= log::LevelFilter::Warn
            }
        }
        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                self.inner.log(record);
            }
        }
        fn flush(&self) {
            self.inner.flush();
        }
    }

    vibetodo::set_debug_logging(debug);

    let journal = match systemd_journal_logger::JournalLog::new() {
        Ok(j) => j.with_syslog_identifier("vibetodo".to_string()),
        Err(e) => {
            eprintln!("warning: journal logging unavailable: {}", e);
            return;
        }
    };
    if log::set_boxed_logger(Box::new(FilteredJournal { inner: journal })).is_ok() {
        // Global max must be Debug so debug logs can pass through when toggled
        log::set_max_level(log::LevelFilter::Debug);
    }
}

fn joined(words: &[String]) -> String {
    words.join(" ")
}

fn report(err: &TodoError, api_url: &str) {
    eprintln!("error: {}", err);
    if let Some(hint) = err.hint(api_url) {
        eprintln!("\n{}", hint);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = TodoConfig::load();
    init_logging(config.debug_logging || cli.verbose);
    if config.normalize() {
        if let Err(e) = config.save() {
            log::warn!("Could not save config: {}", e);
        }
    }

    let command = cli.command.unwrap_or(Command::List);

    // Commands that do not need a backend.
    match &command {
        Command::Use { backend, url } => {
            config.set_backend(*backend, url.clone());
            config.save()?;
            println!("Now using the {} backend", backend.as_str());
            if let Some(url) = &config.api_url {
                println!("  {}", url);
            }
            return Ok(());
        }
        Command::Probe => {
            match backend::discover(&config).await {
                Ok(endpoint) => println!("Found API at {}", endpoint.url()),
                Err(e) => {
                    report(&e, &format!("{} ports {:?}", config.probe.host, config.probe.ports));
                    std::process::exit(1);
                }
            }
            return Ok(());
        }
        _ => {}
    }

    if let Some(kind) = cli.backend {
        config.backend = kind;
        config.normalize();
    }
    let api_url = cli.api_url.as_deref();
    let described = config.rest_url(api_url);

    let backend = match backend::connect(&config, api_url).await {
        Ok(b) => b,
        Err(e) => {
            report(&e, &described);
            std::process::exit(1);
        }
    };
    let mut app = TodoApp::new(backend);
    let target = app.backend().describe();

    if let Command::Shell = command {
        shell::run(&mut app).await;
        return Ok(());
    }

    if let Err(e) = app.refresh().await {
        report(&e, &target);
        std::process::exit(1);
    }

    let result = match command {
        Command::List => Ok(()),
        Command::Add { text } => {
            let mut input = joined(&text);
            app.submit(&mut input).await
        }
        Command::Edit { id, text } => match app.start_edit(&id) {
            Ok(()) => {
                app.set_draft(joined(&text));
                app.save_edit().await.map(|outcome| {
                    if outcome == vibetodo::app::SaveOutcome::Cancelled {
                        println!("Empty text, nothing changed");
                    }
                })
            }
            Err(e) => Err(e),
        },
        Command::Delete { id, yes } => {
            let confirmed = match app.get(&id).cloned() {
                Some(todo) if !yes => shell::Console::stdin().confirm_delete(&todo).await,
                _ => true,
            };
            app.delete(&id, |_| confirmed).await.map(|deleted| {
                if !deleted {
                    println!("Cancelled");
                }
            })
        }
        Command::Probe | Command::Use { .. } | Command::Shell => Ok(()),
    };

    if let Err(e) = result {
        report(&e, &target);
        std::process::exit(1);
    }

    shell::render(app.items());
    Ok(())
}
