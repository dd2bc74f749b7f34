use std::str::FromStr;

use nu_ansi_term::{Color, Style};
use reedline::{
    default_emacs_keybindings, default_vi_insert_keybindings, default_vi_normal_keybindings,
    ColumnarMenu, DefaultCompleter, EditCommand, EditMode, Emacs, KeyCode, KeyModifiers,
    MenuBuilder, Reedline, ReedlineEvent, ReedlineMenu, Signal, Vi,
};
use strum::IntoEnumIterator;

use crate::config;
use crate::error;

use super::highlighter::Highlighter;
use super::prompt::{completion_marker, Prompt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::EnumIter, strum_macros::EnumString, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
enum CommandName {
    Exit,
    Clear,
    Models,
    Model,
}

/// A command the chat loop carries out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    /// Forget the conversation
    Clear,
    /// List the models the router serves
    Models,
    /// Show the current model, or switch to another one
    Model(Option<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Input {
    Prompt(String),
    Command(Command),
    Unknown(String),
    Exit,
}

/// Whether `word` names a command, including its leading slash.
pub(crate) fn is_command(word: &str) -> bool {
    word.strip_prefix('/')
        .map_or(false, |name| CommandName::from_str(name).is_ok())
}

/// Interprets a line entered by the user. Blank lines are ignored.
pub(crate) fn parse_input(line: &str) -> Option<Input> {
    let trimmed = line.trim();

    if trimmed.is_empty() {
        return None;
    }

    let Some(command) = trimmed.strip_prefix('/') else {
        return Some(Input::Prompt(line.to_string()));
    };

    let (name, argument) = match command.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, Some(argument.trim()).filter(|a| !a.is_empty())),
        None => (command, None),
    };

    let input = match CommandName::from_str(name) {
        Ok(CommandName::Exit) => Input::Exit,
        Ok(CommandName::Clear) => Input::Command(Command::Clear),
        Ok(CommandName::Models) => Input::Command(Command::Models),
        Ok(CommandName::Model) => Input::Command(Command::Model(argument.map(str::to_string))),
        Err(_) => Input::Unknown(trimmed.to_string()),
    };

    Some(input)
}

fn edit_mode(keybindings: config::Keybindings) -> Box<dyn EditMode> {
    let complete = ReedlineEvent::UntilFound(vec![
        ReedlineEvent::Menu("completion_menu".to_string()),
        ReedlineEvent::MenuNext,
    ]);

    match keybindings {
        config::Keybindings::Vi => {
            let mut insert_bindings = default_vi_insert_keybindings();

            insert_bindings.add_binding(KeyModifiers::NONE, KeyCode::Tab, complete);

            Box::new(Vi::new(insert_bindings, default_vi_normal_keybindings()))
        }
        config::Keybindings::Emacs => {
            let mut keybindings = default_emacs_keybindings();

            keybindings.add_binding(KeyModifiers::NONE, KeyCode::Tab, complete);

            keybindings.add_binding(
                KeyModifiers::CONTROL,
                KeyCode::Char('j'),
                ReedlineEvent::Edit(vec![EditCommand::InsertNewline]),
            );

            Box::new(Emacs::new(keybindings))
        }
    }
}

pub(crate) struct Repl {
    line_editor: Reedline,
    prompt: Prompt,
}

impl Repl {
    /// Builds the line editor. `models` seeds completion for `/model`.
    pub(crate) fn new(keybindings: config::Keybindings, model: &str, models: &[String]) -> Repl {
        let mut completer = Box::new(DefaultCompleter::with_inclusions(&['/', '-', '.', ':', '_']));

        completer.insert(CommandName::iter().map(|c| format!("/{}", c)).collect());
        completer.insert(models.to_vec());

        // Use the interactive menu to select options from the completer
        let completion_menu = Box::new(
            ColumnarMenu::default()
                .with_name("completion_menu")
                .with_marker(&completion_marker().to_string())
                .with_text_style(Style::new().fg(Color::Default))
                .with_selected_text_style(Style::new().fg(Color::Blue).on(Color::DarkGray))
                .with_selected_match_text_style(
                    Style::new().fg(Color::Blue).bold().on(Color::DarkGray),
                ),
        );

        let line_editor = Reedline::create()
            .with_completer(completer)
            .with_menu(ReedlineMenu::EngineCompleter(completion_menu))
            .with_edit_mode(edit_mode(keybindings))
            .with_highlighter(Box::new(Highlighter));

        Repl {
            line_editor,
            prompt: Prompt::new(model),
        }
    }

    pub(crate) fn set_model(&mut self, model: &str) {
        self.prompt.set_model(model);
    }

    /// Reads lines until one needs acting on. Ctrl-C discards the line being
    /// edited; Ctrl-D exits.
    pub(crate) fn read(&mut self) -> Input {
        loop {
            match self.line_editor.read_line(&self.prompt) {
                Ok(Signal::Success(line)) => {
                    if let Some(input) = parse_input(&line) {
                        return input;
                    }
                }
                Ok(Signal::CtrlC) => continue,
                Ok(_) => return Input::Exit,
                Err(err) => {
                    error!("failed to read input: {}", err);

                    return Input::Exit;
                }
            }
        }
    }
}
