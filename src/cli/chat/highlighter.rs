use reedline::StyledText;

use crate::cli::ColorMode;
use crate::color;

use super::repl::is_command;

/// Shows recognized commands in the prompt color, everything else as user
/// text.
#[derive(Default)]
pub(crate) struct Highlighter;

impl reedline::Highlighter for Highlighter {
    fn highlight(&self, line: &str, _cursor: usize) -> StyledText {
        let mut styled = StyledText::new();

        if matches!(color::color_mode(), ColorMode::Off) {
            styled.push((Default::default(), line.to_string()));
            return styled;
        }

        let word_end = line.find(char::is_whitespace).unwrap_or(line.len());
        let (word, rest) = line.split_at(word_end);

        if is_command(word) {
            styled.push((*color::USER_PROMPT, word.to_string()));
            styled.push((*color::USER_TEXT, rest.to_string()));
        } else {
            styled.push((*color::USER_TEXT, line.to_string()));
        }

        styled
    }
}
