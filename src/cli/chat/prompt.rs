use nu_ansi_term::AnsiGenericString;
use reedline::{PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus, PromptViMode};
use std::borrow::Cow;

use crate::color::{self, MaybePaint};

const USER_INDICATOR: &str = "[#] ";
const USER_VI_NORMAL_INDICATOR: &str = "[=] ";
const COMPLETION_MARKER: &str = "[/] ";
const MULTILINE_INDICATOR: &str = "::: ";

pub(crate) fn model_prompt(model: &str) -> String {
    color::MODEL_PROMPT
        .maybe_paint(format!("[{}]", model))
        .to_string()
}

pub(crate) fn completion_marker() -> AnsiGenericString<'static, str> {
    color::USER_PROMPT.maybe_paint(COMPLETION_MARKER)
}

fn indicator(text: &'static str) -> String {
    color::USER_PROMPT.maybe_paint(text).to_string()
}

/// The line editor prompt. The model replies will come from is shown on the
/// right.
pub(crate) struct Prompt {
    user: String,
    vi_normal: String,
    multiline: String,
    model: String,
}

impl Prompt {
    pub(crate) fn new(model: &str) -> Prompt {
        Prompt {
            user: indicator(USER_INDICATOR),
            vi_normal: indicator(USER_VI_NORMAL_INDICATOR),
            multiline: indicator(MULTILINE_INDICATOR),
            model: color::NOTICE_TEXT.maybe_paint(model).to_string(),
        }
    }

    pub(crate) fn set_model(&mut self, model: &str) {
        self.model = color::NOTICE_TEXT.maybe_paint(model).to_string();
    }
}

impl reedline::Prompt for Prompt {
    fn render_prompt_left(&self) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_right(&self) -> Cow<str> {
        Cow::Borrowed(&self.model)
    }

    fn render_prompt_indicator(&self, prompt_mode: PromptEditMode) -> Cow<str> {
        match prompt_mode {
            PromptEditMode::Vi(PromptViMode::Normal) => Cow::Borrowed(&self.vi_normal),
            _ => Cow::Borrowed(&self.user),
        }
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<str> {
        Cow::Borrowed(&self.multiline)
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };

        Cow::Owned(format!("({}reverse-search: {}) ", prefix, history_search.term))
    }
}
