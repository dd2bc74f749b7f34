mod highlighter;
mod prompt;
mod repl;

use std::io::{self, IsTerminal, Read, Write};

use tokio::signal;

use crate::catalog::{ranking::ModelRanker, Catalog};
use crate::chat::{Message, Transcript};
use crate::cli::router_client;
use crate::color::{self, MaybePaint};
use crate::config::{Config, Keybindings};
use crate::router::RouterClient;
use crate::session::{ChatSession, Outcome};
use crate::utils::errors::{with_sources, DEFAULT_EXIT_CODE};
use crate::{die, error, version, warn, ChatArgs};

use prompt::model_prompt;
use repl::{Command, Input, Repl};

fn flush() {
    // Nothing sensible can be done about a closed stdout mid-reply
    let _ = io::stdout().flush();
}

fn notice(text: &str) {
    eprintln!("{}", color::NOTICE_TEXT.maybe_paint(text));
}

/// Picks the model to chat with. Without a catalog, only a fully qualified
/// model can be used, unchecked.
async fn initial_model(
    client: &RouterClient,
    ranker: &ModelRanker,
    requested: Option<&str>,
    default: Option<&str>,
) -> (Option<Catalog>, String) {
    match Catalog::fetch(client, ranker).await {
        Ok(catalog) => match catalog.resolve(requested, default) {
            Ok(model) => (Some(catalog), model),
            Err(err) => die!("failed to resolve model: {}", err),
        },
        Err(err) => match requested.or(default).map(str::trim) {
            Some(spec) if spec.contains('/') => {
                warn!("{}, using \"{}\" unchecked", with_sources(&err), spec);

                (None, spec.to_string())
            }
            _ => die!("{}", with_sources(&err)),
        },
    }
}

struct Chat<'c> {
    client: &'c RouterClient,
    ranker: ModelRanker,
    catalog: Option<Catalog>,
    model: String,
    transcript: Transcript,
    interactive: bool,
    incremental: bool,
}

impl Chat<'_> {
    /// Streams a reply to the conversation. Returns whether a reply, possibly
    /// interrupted, was received.
    async fn reply(&mut self) -> bool {
        let session = ChatSession::new(self.client);
        let handle = session.handle();

        let interrupt = tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                handle.stop();
            }
        });

        if self.interactive {
            print!("{} ", model_prompt(&self.model));
            flush();
        }

        let incremental = self.incremental;

        let result = session
            .start(&self.model, &mut self.transcript, |update| {
                if incremental {
                    print!("{}", update.token);
                    flush();
                }
            })
            .await;

        interrupt.abort();

        let (content, interrupted) = match result {
            Ok(Outcome::Completed(content)) => (content, false),
            Ok(Outcome::Cancelled(content)) => (content, true),
            Err(err) => {
                if self.interactive {
                    println!();
                }

                error!("completion for {} failed: {}", self.model, with_sources(&err));

                return false;
            }
        };

        if !incremental {
            print!("{}", content);
        }

        println!();

        if interrupted {
            notice("[interrupted]");
        }

        if self.interactive {
            println!();
        }

        true
    }

    async fn refresh_catalog(&mut self) -> Option<&Catalog> {
        if self.catalog.is_none() {
            match Catalog::fetch(self.client, &self.ranker).await {
                Ok(catalog) => self.catalog = Some(catalog),
                Err(err) => error!("{}", with_sources(&err)),
            }
        }

        self.catalog.as_ref()
    }

    fn print_models(&self) {
        let Some(catalog) = &self.catalog else {
            return;
        };

        for id in catalog.ids() {
            let marker = if *id == self.model { "*" } else { " " };

            println!("{} {}", marker, id);
        }
    }

    fn switch_model(&mut self, spec: &str) -> bool {
        let resolved = match &self.catalog {
            Some(catalog) => catalog.resolve(Some(spec), None).map_err(|e| e.to_string()),
            None if spec.contains('/') => Ok(spec.to_string()),
            None => Err(format!(
                "cannot resolve \"{}\" without the model catalog, use provider/model",
                spec
            )),
        };

        match resolved {
            Ok(model) => {
                notice(&format!("now chatting with {}", model));

                self.model = model;

                true
            }
            Err(err) => {
                error!("{}", err);

                false
            }
        }
    }

    /// Carries out a REPL command. Returns the model if it changed.
    async fn command(&mut self, command: Command) -> Option<String> {
        match command {
            Command::Clear => {
                self.transcript.clear();

                notice("conversation cleared");
            }
            Command::Models => {
                if self.refresh_catalog().await.is_some() {
                    self.print_models();
                }
            }
            Command::Model(None) => println!("{}", self.model),
            Command::Model(Some(spec)) => {
                self.refresh_catalog().await;

                if self.switch_model(&spec) {
                    return Some(self.model.clone());
                }
            }
        }

        None
    }

    async fn run(mut self, initial_prompt: Option<String>, keybindings: Keybindings) {
        if self.interactive {
            println!("{} version {}", version::NAME, version::VERSION);
        }

        if let Some(prompt) = initial_prompt.filter(|p| !p.trim().is_empty()) {
            self.transcript.push(Message::user(prompt));

            let replied = self.reply().await;

            if !self.interactive {
                if !replied {
                    std::process::exit(DEFAULT_EXIT_CODE);
                }

                return;
            }
        }

        if !self.interactive {
            return;
        }

        let completions: Vec<String> = self
            .catalog
            .as_ref()
            .map(|c| c.ids().to_vec())
            .unwrap_or_default();

        let mut repl = Repl::new(keybindings, &self.model, &completions);

        loop {
            match repl.read() {
                Input::Exit => break,
                Input::Prompt(prompt) => {
                    self.transcript.push(Message::user(prompt));

                    self.reply().await;
                }
                Input::Command(command) => {
                    if let Some(model) = self.command(command).await {
                        repl.set_model(&model);
                    }
                }
                Input::Unknown(command) => warn!("unknown command \"{}\"", command),
            }
        }
    }
}

pub(crate) async fn chat_cmd(config: &Config, args: &ChatArgs) {
    let in_terminal = io::stdin().is_terminal();
    let out_terminal = io::stdout().is_terminal();

    // If standard input is a terminal and interactive mode has not been specified,
    // gather input from standard input with the assumption that we are not running interactively.
    let interactive = if args.prompt.is_some() {
        args.interactive
    } else {
        in_terminal && out_terminal
    };

    if args.prompt.is_some() && !in_terminal {
        die!("it appears that an initial prompt is being provided both through standard input and the prompt argument");
    }

    // Obtain the initial prompt, either from standard input or from a positional argument.
    let initial_prompt = if let Some(prompt) = &args.prompt {
        Some(prompt.clone())
    } else if !in_terminal {
        let mut buf = String::new();

        if let Err(err) = io::stdin().read_to_string(&mut buf) {
            die!("failed to read the initial prompt from standard input: {}", err);
        }

        Some(buf)
    } else {
        None
    };

    if !interactive && initial_prompt.as_deref().map_or(true, |p| p.trim().is_empty()) {
        die!("no prompt was given");
    }

    let client = router_client(config);
    let ranker = ModelRanker::new(&config.catalog.families);

    let (catalog, model) = initial_model(
        &client,
        &ranker,
        args.model.as_deref(),
        config.router.default_model.as_deref(),
    )
    .await;

    tracing::debug!(%model, "chat model resolved");

    let chat = Chat {
        client: &client,
        ranker,
        catalog,
        model,
        transcript: Transcript::new(),
        interactive,
        // If the output is a terminal (e.g., user-facing), incrementally print it.
        incremental: out_terminal,
    };

    chat.run(initial_prompt, config.chat.keybindings).await;
}
