//! Interactive REPL for few-shot classification sessions.
//!
//! Launch with `fewshot-vision repl` to enter interactive mode.
//! Type `/help` for available commands, Tab for completion.

use std::io::Write;
use std::path::{Path, PathBuf};

use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Config, Editor, Event, EventContext, EventHandler, Helper,
    KeyEvent, RepeatCount,
};

use fewshot_vision::{
    builtin_templates, find_template, is_supported_format, list_files, load_image, CategorySpec,
    ExemplarMatcher, FeatureExtractor, ImageId, Session, TrainingState,
};

use crate::args::{display_name, escape_word, split_words};
use crate::render::{category_label, category_listing, prediction_line, progress_bar};

/// Available REPL commands.
const COMMANDS: &[(&str, &str)] = &[
    ("/template", "Start over from a built-in template"),
    ("/templates", "List built-in templates"),
    ("/define", "Define a category: /define <id> [emblem] [name...]"),
    ("/add", "Add example images: /add <id> <file|dir>... (quote paths with spaces)"),
    ("/remove", "Remove an example: /remove <id> <image-id>"),
    ("/drop", "Remove a category and its examples"),
    ("/list", "List categories and their examples"),
    ("/status", "Show training state and readiness"),
    ("/train", "Train the classifier"),
    ("/classify", "Classify an image: /classify <file>"),
    ("/yes", "Confirm the last prediction"),
    ("/correct", "Correct the last prediction: /correct <id>"),
    ("/reset", "Drop all categories and exemplars"),
    ("/config", "Show the session configuration"),
    ("/clear", "Clear the screen"),
    ("/help", "Show available commands"),
    ("/exit", "Quit the REPL"),
];

/// Commands whose arguments are image paths.
const PATH_COMMANDS: &[&str] = &["/add", "/classify"];

/// REPL helper for tab completion.
#[derive(Default)]
struct FewShotHelper;

impl Completer for FewShotHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let input = &line[..pos];

        if !input.contains(' ') {
            let matches: Vec<Pair> = COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(input))
                .map(|(cmd, desc)| Pair {
                    display: format!("{cmd:<16} {desc}"),
                    replacement: format!("{cmd} "),
                })
                .collect();
            return Ok((0, matches));
        }

        let cmd = input.split(' ').next().unwrap_or("");
        if !PATH_COMMANDS.contains(&cmd) {
            return Ok((pos, Vec::new()));
        }

        // Complete the last word as an image path. Escaped spaces stay inside it.
        let mut word_start = 0;
        let mut escaped = false;
        for (i, c) in input.char_indices() {
            match c {
                '\\' if !escaped => escaped = true,
                ' ' if !escaped => word_start = i + 1,
                _ => escaped = false,
            }
        }
        let word = split_words(&input[word_start..])
            .ok()
            .and_then(|words| words.into_iter().next())
            .unwrap_or_default();
        let (dir, prefix) = match word.rfind('/') {
            Some(i) => (&word[..=i], &word[i + 1..]),
            None => ("", word.as_str()),
        };
        let search_dir = if dir.is_empty() { Path::new(".") } else { Path::new(dir) };

        let mut names = Vec::new();
        if let Ok(entries) = std::fs::read_dir(search_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
                    continue;
                };
                if !name.starts_with(prefix) {
                    continue;
                }
                if path.is_dir() {
                    names.push(format!("{name}/"));
                } else if is_supported_format(&path) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();

        let matches = names
            .into_iter()
            .map(|name| Pair {
                display: name.clone(),
                replacement: escape_word(&format!("{dir}{name}")),
            })
            .collect();
        Ok((word_start, matches))
    }
}

impl Hinter for FewShotHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || line.is_empty() {
            return None;
        }
        if line.starts_with('/') && !line.contains(' ') {
            for (cmd, _) in COMMANDS {
                if cmd.starts_with(line) && *cmd != line {
                    return Some(cmd[line.len()..].to_string());
                }
            }
        }
        None
    }
}

impl Highlighter for FewShotHelper {}
impl Validator for FewShotHelper {}
impl Helper for FewShotHelper {}

struct TabCompleteOrAcceptHint;

impl ConditionalEventHandler for TabCompleteOrAcceptHint {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        if ctx.has_hint() {
            Some(Cmd::CompleteHint)
        } else {
            Some(Cmd::Complete)
        }
    }
}

/// What the loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// REPL state: one session for the lifetime of the prompt.
pub struct Repl<E, M> {
    session: Session<E, M>,
}

impl<E, M> Repl<E, M>
where
    E: FeatureExtractor,
    M: ExemplarMatcher,
{
    pub fn new(session: Session<E, M>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session<E, M> {
        &self.session
    }

    /// Execute one input line.
    pub fn execute(&mut self, line: &str) -> Flow {
        let line = line.trim();
        if line.is_empty() {
            return Flow::Continue;
        }

        let input = line.strip_prefix('/').unwrap_or(line);
        if input.is_empty() {
            cmd_help();
            return Flow::Continue;
        }

        let mut parts = input.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("");
        let args = parts.next().unwrap_or("").trim();

        match cmd {
            "exit" | "quit" => {
                eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                return Flow::Exit;
            }
            "help" | "h" | "?" => cmd_help(),
            "clear" | "cls" => eprint!("\x1b[2J\x1b[H"),
            "templates" => cmd_templates(),
            "template" => self.cmd_template(args),
            "define" => self.cmd_define(args),
            "add" => self.cmd_add(args),
            "remove" | "rm" => self.cmd_remove(args),
            "drop" => self.cmd_drop(args),
            "list" | "ls" => self.cmd_list(),
            "status" => self.cmd_status(),
            "train" => self.cmd_train(),
            "classify" | "test" => self.cmd_classify(args),
            "yes" | "y" | "affirm" => self.cmd_affirm(),
            "correct" | "no" => self.cmd_correct(args),
            "reset" => {
                self.session.reset();
                eprintln!("  Session reset.");
            }
            "config" => self.cmd_config(),
            _ => {
                eprintln!("  Unknown command '/{cmd}'. Type /help for commands.");
            }
        }
        Flow::Continue
    }

    fn cmd_template(&mut self, args: &str) {
        if args.is_empty() {
            eprintln!("  Usage: /template <name>   (see /templates)");
            return;
        }
        let Some(template) = find_template(args) else {
            eprintln!("  No template named '{args}'. Type /templates to list them.");
            return;
        };
        match self.session.reset_with_template(template) {
            Ok(()) => {
                eprintln!("  Started from template {}:", template.name);
                for c in self.session.registry().categories() {
                    eprintln!("    {}  [{}]", category_label(c), c.id);
                }
            }
            Err(e) => eprintln!("  Failed: {e}"),
        }
    }

    fn cmd_define(&mut self, args: &str) {
        let mut words = args.split_whitespace();
        let Some(id) = words.next() else {
            eprintln!("  Usage: /define <id> [emblem] [name...]");
            return;
        };
        let emblem = words.next().unwrap_or("");
        let rest: Vec<&str> = words.collect();
        let name = if rest.is_empty() {
            display_name(id)
        } else {
            rest.join(" ")
        };

        match self
            .session
            .define_categories(vec![CategorySpec::new(id, name, emblem)])
        {
            Ok(()) => eprintln!("  Defined category {id}."),
            Err(e) => eprintln!("  {e}"),
        }
    }

    fn cmd_add(&mut self, args: &str) {
        let words = match split_words(args) {
            Ok(words) => words,
            Err(e) => {
                eprintln!("  {e}");
                return;
            }
        };
        let mut words = words.into_iter();
        let Some(category) = words.next() else {
            eprintln!("  Usage: /add <id> <file|dir>...");
            return;
        };
        let id = category.as_str();
        let paths: Vec<PathBuf> = words.map(PathBuf::from).collect();
        if paths.is_empty() {
            eprintln!("  Usage: /add <id> <file|dir>...");
            return;
        }

        let mut files = Vec::new();
        for path in paths {
            if path.is_dir() {
                match list_files(&path) {
                    Ok(found) => files.extend(found),
                    Err(e) => eprintln!("  Cannot read {}: {e}", path.display()),
                }
            } else {
                files.push(path);
            }
        }

        match self.session.add_examples_from_files(id, &files) {
            Ok(report) => {
                for skipped in &report.skipped {
                    eprintln!("  \x1b[33mskipped\x1b[0m {} ({})", skipped.path, skipped.reason);
                }
                let count = self
                    .session
                    .registry()
                    .get(id)
                    .map(|c| c.example_count())
                    .unwrap_or(0);
                eprintln!("  Added {} image(s) to {id} ({count} total).", report.added.len());
                if self.session.is_trained() {
                    eprintln!(
                        "  Note: the classifier is already trained; \
                         new examples are used after /reset and /train."
                    );
                }
            }
            Err(e) => eprintln!("  {e}"),
        }
    }

    fn cmd_remove(&mut self, args: &str) {
        let words: Vec<&str> = args.split_whitespace().collect();
        let [id, image] = words.as_slice() else {
            eprintln!("  Usage: /remove <id> <image-id>");
            return;
        };
        let Ok(raw) = image.trim_start_matches('#').parse::<u64>() else {
            eprintln!("  '{image}' is not an image id (see /list).");
            return;
        };

        match self.session.remove_example(id, ImageId(raw)) {
            Ok(removed) => eprintln!("  Removed {} from {id}.", removed.id),
            Err(e) => eprintln!("  {e}"),
        }
    }

    fn cmd_drop(&mut self, args: &str) {
        if args.is_empty() {
            eprintln!("  Usage: /drop <id>");
            return;
        }
        match self.session.remove_category(args) {
            Ok(removed) => eprintln!(
                "  Removed category {} and {} example(s).",
                removed.id,
                removed.example_count()
            ),
            Err(e) => eprintln!("  {e}"),
        }
    }

    fn cmd_list(&self) {
        let registry = self.session.registry();
        eprintln!();
        if registry.is_empty() {
            eprintln!("  No categories yet. Try /template cat-dog or /define <id>.");
        }
        for category in registry.categories() {
            eprintln!("  {}", category_listing(category));
        }
        eprintln!();
    }

    fn cmd_status(&self) {
        let readiness = self.session.readiness();
        eprintln!();
        eprintln!("  State:      {}", self.session.state());
        eprintln!("  Categories: {}", self.session.registry().len());
        eprintln!("  Examples:   {}", self.session.registry().total_examples());
        eprintln!("  Exemplars:  {}", self.session.matcher().exemplar_count());
        if self.session.state() == TrainingState::Untrained {
            eprintln!("  Readiness:  {readiness}");
        }
        if let Some(p) = self.session.pending_prediction() {
            eprintln!(
                "  Pending:    {}",
                prediction_line(p, self.session.registry())
            );
        }
        eprintln!();
    }

    fn cmd_train(&mut self) {
        let result = self.session.train(|p| {
            eprint!("\r  {}", progress_bar(p));
            let _ = std::io::stderr().flush();
        });
        match result {
            Ok(summary) => {
                eprintln!();
                eprintln!(
                    "  \x1b[32mTrained\x1b[0m on {} examples in {:.1?}. Try /classify <file>.",
                    summary.exemplars_added, summary.elapsed
                );
            }
            Err(e) => {
                eprintln!();
                eprintln!("  {e}");
            }
        }
    }

    fn cmd_classify(&mut self, args: &str) {
        if args.is_empty() {
            eprintln!("  Usage: /classify <file>");
            return;
        }
        // A lone quoted or escaped word is unwrapped; otherwise the whole line is the path.
        let path = match split_words(args) {
            Ok(words) if words.len() == 1 => PathBuf::from(&words[0]),
            _ => PathBuf::from(args),
        };
        let path = path.as_path();
        let image = match load_image(path) {
            Ok(image) => image,
            Err(e) => {
                eprintln!("  Cannot load {}: {e}", path.display());
                return;
            }
        };

        match self.session.classify(image) {
            Ok(prediction) => {
                eprintln!();
                eprintln!("  {}", prediction_line(&prediction, self.session.registry()));
                eprintln!();
                eprintln!("  Correct? /yes or /correct <id>");
            }
            Err(e) => eprintln!("  {e}"),
        }
    }

    fn cmd_affirm(&self) {
        match self.session.affirm() {
            Some(_) => eprintln!("  Great! The classifier got it right."),
            None => eprintln!("  Nothing to confirm. Classify an image first."),
        }
    }

    fn cmd_correct(&mut self, args: &str) {
        if args.is_empty() {
            eprintln!("  Usage: /correct <id>");
            return;
        }
        match self.session.correct(args) {
            Ok(correction) => eprintln!(
                "  Learned from feedback: added {} exemplars and example {} to {}.",
                correction.exemplars_added, correction.image_id, correction.category_id
            ),
            Err(e) => eprintln!("  {e}"),
        }
    }

    fn cmd_config(&self) {
        match serde_json::to_string_pretty(self.session.config()) {
            Ok(json) => {
                for line in json.lines() {
                    eprintln!("  {line}");
                }
            }
            Err(e) => eprintln!("  {e}"),
        }
    }
}

/// Run the interactive REPL.
pub fn run<E, M>(session: Session<E, M>) -> anyhow::Result<()>
where
    E: FeatureExtractor,
    M: ExemplarMatcher,
{
    eprintln!();
    eprintln!(
        "  \x1b[32m\u{25c9}\x1b[0m \x1b[1mfewshot-vision v{}\x1b[0m \x1b[90m\u{2014} Teach a classifier with a few pictures\x1b[0m",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!();
    eprintln!(
        "    Press \x1b[36m/\x1b[0m to browse commands, \x1b[90mTab\x1b[0m to complete, \x1b[90m/exit\x1b[0m to quit."
    );
    eprintln!();

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .completion_prompt_limit(20)
        .build();

    let mut rl: Editor<FewShotHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(config)?;
    rl.set_helper(Some(FewShotHelper));
    rl.bind_sequence(
        KeyEvent::from('\t'),
        EventHandler::Conditional(Box::new(TabCompleteOrAcceptHint)),
    );

    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    let hist_path = PathBuf::from(&home).join(".fewshot_vision_history");
    if hist_path.exists() {
        let _ = rl.load_history(&hist_path);
    }

    let mut repl = Repl::new(session);
    let prompt = " \x1b[36mfewshot>\x1b[0m ";

    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                if repl.execute(&line) == Flow::Exit {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("  \x1b[90m(Ctrl+C)\x1b[0m Type \x1b[1m/exit\x1b[0m to quit.");
            }
            Err(ReadlineError::Eof) => {
                eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        }
    }

    let _ = rl.save_history(&hist_path);

    Ok(())
}

fn cmd_help() {
    eprintln!();
    eprintln!("  Commands:");
    eprintln!();
    for (cmd, desc) in COMMANDS {
        eprintln!("    {cmd:<18} {desc}");
    }
    eprintln!();
    eprintln!("  Tip: Tab completes commands, and image paths after /add and /classify.");
    eprintln!();
}

fn cmd_templates() {
    eprintln!();
    for t in builtin_templates() {
        let emblems: Vec<&str> = t.categories.iter().map(|(_, _, e)| *e).collect();
        eprintln!("    {:<22} {}  {}", t.name, emblems.join(" "), t.description);
    }
    eprintln!();
}
