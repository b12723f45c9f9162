use std::io::{self, BufRead};

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "image-text-translator",
    version,
    about = "Translate the text inside an image and paint it back over the original"
)]
struct Cli {
    /// Image to translate
    input: Option<String>,

    /// Output image path (default: <input>.translated.<ext>)
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Source language code (default from settings)
    #[arg(short = 'L', long = "source-lang")]
    source_lang: Option<String>,

    /// Target language code (default from settings)
    #[arg(short = 'l', long = "lang")]
    lang: Option<String>,

    /// Font file used to draw the translation
    #[arg(long = "font")]
    font: Option<String>,

    /// Translator: openai[:model], claude[:model] or libre[:url]
    #[arg(short = 't', long = "translator")]
    translator: Option<String>,

    /// API key (overrides environment variables)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Also write the OCR box overlay and the detected paragraphs
    #[arg(long = "debug-ocr")]
    debug_ocr: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,

    /// Show installed tesseract languages and exit
    #[arg(long = "show-ocr-languages")]
    show_ocr_languages: bool,

    /// Interactive mode
    #[arg(short = 'i', long = "interactive")]
    interactive: bool,
}

impl Cli {
    fn config(&self) -> image_text_translator::Config {
        image_text_translator::Config {
            input: self.input.clone(),
            output: self.output.clone(),
            source_lang: self.source_lang.clone(),
            lang: self.lang.clone(),
            font: self.font.clone(),
            translator: self.translator.clone(),
            key: self.key.clone(),
            settings_path: self.read_settings.clone(),
            debug_ocr: self.debug_ocr,
            show_ocr_languages: self.show_ocr_languages,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    image_text_translator::logging::init(cli.verbose)?;
    if cli.interactive {
        return run_interactive(&cli).await;
    }

    let output = image_text_translator::run(cli.config()).await?;
    println!("{}", output);
    Ok(())
}

struct InteractiveState {
    config: image_text_translator::Config,
    last_report: Option<String>,
}

impl InteractiveState {
    fn new(cli: &Cli) -> Self {
        let mut config = cli.config();
        config.show_ocr_languages = false;
        Self {
            config,
            last_report: None,
        }
    }

    fn flush(&mut self) {
        self.last_report = None;
    }
}

async fn run_interactive(cli: &Cli) -> Result<()> {
    use std::io::Write;

    let mut state = InteractiveState::new(cli);
    println!("Interactive mode. Use /quit or /exit to finish.");
    println!("Type /help to see available commands.");

    let mut line = String::new();
    let stdin = io::stdin();
    let mut stdin_lock = stdin.lock();
    loop {
        line.clear();
        print!("> ");
        io::stdout().flush()?;
        if stdin_lock.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if !input.starts_with('/') {
            eprintln!("commands start with '/', type /help");
            continue;
        }
        if handle_interactive_command(input, &mut state).await? {
            break;
        }
    }
    Ok(())
}

/// Splits `/name rest of line` into the command name and its trimmed argument.
fn split_command(input: &str) -> (&str, &str) {
    let trimmed = input.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (trimmed, ""),
    }
}

async fn handle_interactive_command(input: &str, state: &mut InteractiveState) -> Result<bool> {
    let (command, value) = split_command(input);
    match command {
        "/quit" | "/exit" => return Ok(true),
        "/help" => print_interactive_help(),
        "/flush" => {
            state.flush();
            println!("previous result cleared");
        }
        "/run" => run_current(value, state).await,
        "/path" => update_setting(state, "path", value, "(none)", |config| &mut config.input),
        "/source-lang" => update_setting(state, "source-lang", value, "(settings)", |config| {
            &mut config.source_lang
        }),
        "/lang" => update_setting(state, "lang", value, "(settings)", |config| &mut config.lang),
        "/translator" => update_setting(state, "translator", value, "(auto)", |config| {
            &mut config.translator
        }),
        "/output" if value == "clear" => {
            state.config.output = None;
            state.flush();
            println!("output cleared");
        }
        "/output" => update_setting(state, "output", value, "(next to input)", |config| {
            &mut config.output
        }),
        _ => eprintln!("unknown command: {}", command),
    }
    Ok(false)
}

async fn run_current(value: &str, state: &mut InteractiveState) {
    if !value.is_empty() {
        if state.config.input.as_deref() != Some(value) {
            state.flush();
        }
        state.config.input = Some(value.to_string());
    }
    if state.config.input.is_none() {
        println!("no image path set, use /run <path> or /path <path>");
        return;
    }
    if let Some(report) = &state.last_report {
        println!("{}", report);
        return;
    }
    // a failed run keeps the session alive and forgets the image
    match image_text_translator::run(state.config.clone()).await {
        Ok(report) => {
            println!("{}", report);
            state.last_report = Some(report);
        }
        Err(err) => {
            eprintln!("error: {:#}", err);
            state.flush();
            state.config.input = None;
        }
    }
}

/// Shows the current value when `value` is empty, otherwise stores it and
/// forgets the cached result.
fn update_setting(
    state: &mut InteractiveState,
    name: &str,
    value: &str,
    unset: &str,
    field: impl Fn(&mut image_text_translator::Config) -> &mut Option<String>,
) {
    if value.is_empty() {
        let current = field(&mut state.config).as_deref().unwrap_or(unset).to_string();
        println!("{}: {}", name, current);
        return;
    }
    *field(&mut state.config) = Some(value.to_string());
    state.flush();
    println!("{} set to {}", name, value);
}

fn print_interactive_help() {
    println!("Commands:");
    println!("  /quit, /exit                 Exit interactive mode");
    println!("  /run [path]                  Translate [path] or the current image");
    println!("  /path <path>                 Set image path (or show current)");
    println!("  /source-lang <code>          Set source language");
    println!("  /lang <code>                 Set target language");
    println!("  /translator <name[:arg]>     Set translator (openai, claude, libre)");
    println!("  /output <path|clear>         Set output path");
    println!("  /flush                       Forget the previous result");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_name_must_match_whole_token() {
        assert_eq!(split_command("/run shots/menu.png"), ("/run", "shots/menu.png"));
        assert_eq!(split_command("  /lang   ja "), ("/lang", "ja"));
        assert_eq!(split_command("/runner"), ("/runner", ""));
        assert_eq!(split_command("/language fr"), ("/language", "fr"));
    }

    #[tokio::test]
    async fn prefixed_names_are_not_commands() {
        let cli = Cli::parse_from(["image-text-translator"]);
        let mut state = InteractiveState::new(&cli);
        assert!(!handle_interactive_command("/language fr", &mut state).await.unwrap());
        assert_eq!(state.config.lang, None);
        assert!(!handle_interactive_command("/runner", &mut state).await.unwrap());
        assert_eq!(state.config.input, None);

        handle_interactive_command("/lang fr", &mut state).await.unwrap();
        assert_eq!(state.config.lang.as_deref(), Some("fr"));
        assert!(handle_interactive_command("/exit", &mut state).await.unwrap());
    }

    #[test]
    fn changing_a_setting_forgets_the_last_report() {
        let cli = Cli::parse_from(["image-text-translator"]);
        let mut state = InteractiveState::new(&cli);
        state.last_report = Some("translated 1 blocks".to_string());
        update_setting(&mut state, "output", "out.png", "(next to input)", |config| {
            &mut config.output
        });
        assert_eq!(state.config.output.as_deref(), Some("out.png"));
        assert!(state.last_report.is_none());
    }
}
