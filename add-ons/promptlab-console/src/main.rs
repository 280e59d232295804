//! PromptLab console: a line-oriented stand-in for the chat UI.
//!
//! Mounts one `LabContext` and maps stdin commands onto its state holders. Pass
//! `--ephemeral` to keep preferences in memory instead of the Sled store.

mod commands;

use std::sync::Arc;

use commands::{parse, Command, HELP};
use promptlab_core::{
    InMemoryPreferenceStore, LabConfig, LabContext, ParameterKey, PickerOutcome, Role, ThemeState,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[promptlab-console] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = LabConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "config unreadable; using defaults");
        LabConfig::default()
    });

    let ephemeral = std::env::args().any(|a| a == "--ephemeral");
    let ctx = if ephemeral {
        LabContext::mount(&config, Arc::new(InMemoryPreferenceStore::new()))
    } else {
        match LabContext::open(&config) {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!(error = %e, "preference store unavailable; running in memory");
                LabContext::mount(&config, Arc::new(InMemoryPreferenceStore::new()))
            }
        }
    };

    if let Some(e) = ctx.templates.load_error() {
        println!("! {}", e);
    }
    if let Some(e) = ctx.theme.error() {
        println!("! {}", e);
    }
    println!("PromptLab console: type `help` for commands.");
    print_history(&ctx);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => match parse(&line) {
                        Ok(Some(Command::Quit)) => break,
                        Ok(Some(cmd)) => run(&ctx, cmd),
                        Ok(None) => {}
                        Err(msg) => println!("! {}", msg),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("CTRL-C received; shutting down console");
                break;
            }
        }
    }
}

fn run(ctx: &LabContext, cmd: Command) {
    match cmd {
        Command::Help => println!("{}", HELP),
        Command::Params => {
            let params = ctx.parameters.get_parameters();
            for key in ParameterKey::ALL {
                println!("{:<12} {}", key.as_str(), params.get(key));
            }
        }
        Command::Set { key, value } => match ctx.parameters.set_parameter(key, value) {
            Ok(params) => println!("{}", params.summary()),
            Err(e) => println!("! {}", e),
        },
        Command::CopyParams => match ctx.parameters.copy_parameters(&ctx.clipboard) {
            Ok(()) => println!("copied:\n{}", ctx.clipboard.contents().unwrap_or_default()),
            Err(e) => println!("! {}", e),
        },
        Command::DownloadParams => match ctx.parameters.download_parameters(&ctx.downloads) {
            Ok(path) => println!("saved {}", path.display()),
            Err(e) => println!("! {}", e),
        },
        Command::Models => {
            let current = ctx.models.current();
            for (i, m) in ctx.models.options().iter().enumerate() {
                let mark = if m.id == current.id { '*' } else { ' ' };
                println!("{} {} {:<12} {}", mark, i, m.id, m.label);
            }
        }
        Command::Model(id) => match ctx.models.select(&id) {
            Ok(m) => println!("model: {}", m.label),
            Err(e) => println!("! {}", e),
        },
        Command::Key(key) => {
            let outcome = ctx.with_picker(|picker, models| picker.handle_key(key, models));
            print_picker(ctx, outcome);
        }
        Command::ClickOutside => {
            let outcome = ctx.with_picker(|picker, _| picker.click_outside());
            print_picker(ctx, outcome);
        }
        Command::ClickTrigger => {
            let outcome = ctx.with_picker(|picker, _| picker.click_trigger());
            print_picker(ctx, outcome);
        }
        Command::ClickOption(index) => {
            let outcome = ctx.with_picker(|picker, models| picker.click_option(index, models));
            print_picker(ctx, outcome);
        }
        Command::Theme => match ctx.theme.toggle() {
            Some(theme) => println!("theme: {}", theme),
            None => println!("theme unchanged ({:?})", ctx.theme.state()),
        },
        Command::Templates => {
            let list = ctx.templates.list();
            if list.is_empty() {
                println!("No saved prompts yet.");
            }
            for t in list {
                println!("{}  {}", t.id, t.title);
            }
        }
        Command::Save { title, content } => match ctx.templates.add(&title, &content) {
            Ok(t) => println!("saved template {}", t.id),
            Err(e) => println!("! {}", e),
        },
        Command::Load(id) => match ctx.templates.load(&id) {
            Some(t) => println!("loaded '{}' into the input buffer", t.title),
            None => println!("no template {}", id),
        },
        Command::Input => println!("input: {}", ctx.chat.input()),
        Command::Send(text) => {
            let sent = match text {
                Some(text) => ctx.chat.send(&text),
                None => ctx.chat.send_input(),
            };
            match sent {
                Ok(Some(m)) => println!("you [{}]: {}\nassistant is typing…", m.id, m.content),
                Ok(None) => println!("nothing to send"),
                Err(e) => println!("! {}", e),
            }
        }
        Command::History => print_history(ctx),
        Command::Copy(id) => match ctx.chat.copy_message(&id, &ctx.clipboard) {
            Ok(()) => println!("copied message {}", id),
            Err(e) => println!("! {}", e),
        },
        Command::Download(id) => match ctx.chat.download_message(&id, &ctx.downloads) {
            Ok(path) => println!("saved {}", path.display()),
            Err(e) => println!("! {}", e),
        },
        Command::Status => {
            println!("model:  {}", ctx.models.current().label);
            println!("params: {}", ctx.chat.parameters().summary());
            println!("chat:   {:?} ({} pending)", ctx.chat.state(), ctx.chat.pending_responses());
            match ctx.theme.state() {
                ThemeState::Error(e) => println!("theme:  error: {}", e),
                other => println!("theme:  {:?}", other),
            }
            if let Some(p) = ctx.templates.active_prompt() {
                println!("active prompt: {}", p);
            }
            for (region, err) in [
                ("parameters", ctx.parameters.last_error()),
                ("models", ctx.models.last_error()),
                ("templates", ctx.templates.last_error()),
                ("chat", ctx.chat.last_error()),
            ] {
                if let Some(err) = err {
                    println!("{} error: {}", region, err);
                }
            }
        }
        Command::Quit => {}
    }
}

fn print_picker(ctx: &LabContext, outcome: PickerOutcome) {
    match outcome {
        PickerOutcome::Opened | PickerOutcome::Moved(_) => {
            let highlighted = ctx.with_picker(|picker, _| picker.highlighted());
            for (i, m) in ctx.models.options().iter().enumerate() {
                let mark = if i == highlighted { '>' } else { ' ' };
                println!("{} {}", mark, m.label);
            }
        }
        PickerOutcome::Committed(m) => println!("model: {}", m.label),
        PickerOutcome::Closed => println!("picker closed"),
        PickerOutcome::Ignored => {}
    }
}

fn print_history(ctx: &LabContext) {
    for m in ctx.chat.messages() {
        match m.role {
            Role::User => println!("you [{}]: {}", m.id, m.content),
            Role::Assistant => {
                println!("assistant [{}]: {}", m.id, m.content);
                if let Some(p) = m.params {
                    println!("    {}", p.summary());
                }
            }
        }
    }
    if ctx.chat.is_typing() {
        println!("assistant is typing…");
    }
}
