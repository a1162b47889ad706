use std::borrow::Cow::{self, Borrowed, Owned};

use anyhow::Result;
use carelink_application::HybridChatService;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};

use super::utils::{ServiceOptions, build_message, build_service, print_response};

const COMMANDS: [&str; 4] = ["/reset", "/probe", "/thread", "/quit"];

/// Completion and hints for the slash commands.
#[derive(Clone)]
struct ChatHelper {
    commands: Vec<String>,
}

impl ChatHelper {
    fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Helper for ChatHelper {}

impl Completer for ChatHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if !line.starts_with('/') {
            return Ok((0, vec![]));
        }

        let candidates = self
            .commands
            .iter()
            .filter(|cmd| cmd.starts_with(line))
            .map(|cmd| Pair {
                display: cmd.clone(),
                replacement: cmd.clone(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Highlighter for ChatHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for ChatHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if !line.starts_with('/') || line.contains(' ') {
            return None;
        }
        self.commands
            .iter()
            .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
            .map(|cmd| cmd[line.len()..].to_string())
    }
}

impl Validator for ChatHelper {}

/// What the REPL does with one input line.
#[derive(Debug, PartialEq, Eq)]
enum ChatInput<'a> {
    Quit,
    Reset,
    Probe,
    Thread,
    Unknown(&'a str),
    Message(&'a str),
    Empty,
}

fn parse_input(line: &str) -> ChatInput<'_> {
    let trimmed = line.trim();
    match trimmed {
        "" => ChatInput::Empty,
        "/quit" | "quit" | "exit" => ChatInput::Quit,
        "/reset" => ChatInput::Reset,
        "/probe" => ChatInput::Probe,
        "/thread" => ChatInput::Thread,
        cmd if cmd.starts_with('/') => ChatInput::Unknown(cmd),
        text => ChatInput::Message(text),
    }
}

pub async fn run(
    options: &ServiceOptions,
    caller: Option<String>,
    location: Option<String>,
) -> Result<()> {
    let service = build_service(options).await?;

    let mut rl = Editor::new()?;
    rl.set_helper(Some(ChatHelper::new()));

    println!("{}", "=== CareLink Chat ===".bright_magenta().bold());
    let mode = if service.remote_enabled() {
        "remote assistant with local fallback"
    } else {
        "local responses only"
    };
    println!("{}", format!("Mode: {}", mode).bright_black());
    println!(
        "{}",
        "Commands: /reset (new conversation), /probe, /thread, /quit".bright_black()
    );
    println!();

    loop {
        match rl.readline(">> ") {
            Ok(line) => {
                let input = parse_input(&line);
                if !matches!(input, ChatInput::Empty) {
                    let _ = rl.add_history_entry(line.as_str());
                }

                match input {
                    ChatInput::Empty => continue,
                    ChatInput::Quit => {
                        println!("{}", "Goodbye!".bright_green());
                        break;
                    }
                    ChatInput::Reset => {
                        service.reset_conversation();
                        println!("{}", "Started a new conversation.".bright_green());
                    }
                    ChatInput::Probe => report_probe(&service).await,
                    ChatInput::Thread => match service.current_thread() {
                        Some(thread) => println!("{}", format!("Thread: {}", thread).bright_black()),
                        None => println!("{}", "No remote thread yet.".bright_black()),
                    },
                    ChatInput::Unknown(cmd) => {
                        println!("{}", format!("Unknown command: {}", cmd).yellow());
                    }
                    ChatInput::Message(text) => {
                        let message = build_message(text, caller.as_deref(), location.as_deref());
                        let response = service.send_message(message).await;
                        print_response(&response);
                        println!();
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type '/quit' to exit.".yellow());
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    Ok(())
}

async fn report_probe(service: &HybridChatService) {
    if !service.remote_enabled() {
        println!("{}", "No credential configured.".yellow());
    } else if service.is_remote_available().await {
        println!("{}", "Remote assistant is available.".bright_green());
    } else {
        println!("{}", "Remote assistant is unavailable.".red());
    }
}
