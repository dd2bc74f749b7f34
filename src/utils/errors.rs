use std::error::Error;
use std::fmt;

use crate::color::{self, MaybePaint};

pub const DEFAULT_EXIT_CODE: i32 = 1;

pub(crate) fn fmt_error<S: AsRef<str>>(f: &mut fmt::Formatter<'_>, text: S) -> fmt::Result {
    write!(
        f,
        "{} {}",
        color::ERROR_INDICATOR.maybe_paint("error:"),
        color::ERROR_TEXT.maybe_paint(text.as_ref())
    )
}

pub(crate) fn fmt_warn<S: AsRef<str>>(f: &mut fmt::Formatter<'_>, text: S) -> fmt::Result {
    write!(
        f,
        "{} {}",
        color::WARNING_INDICATOR.maybe_paint("warning:"),
        color::WARNING_TEXT.maybe_paint(text.as_ref())
    )
}

struct Diagnostic<'a> {
    error: bool,
    text: &'a str,
}

impl fmt::Display for Diagnostic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error {
            true => fmt_error(f, self.text),
            false => fmt_warn(f, self.text),
        }
    }
}

pub(crate) fn error_internal(text: &str) {
    eprintln!("{}", Diagnostic { error: true, text });
}

pub(crate) fn warn_internal(text: &str) {
    eprintln!("{}", Diagnostic { error: false, text });
}

/// Renders an error followed by its chain of sources, one per line.
pub(crate) fn with_sources(err: &dyn Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();

    while let Some(err) = source {
        let text = err.to_string();

        // thiserror wrappers frequently repeat their source verbatim
        if !msg.ends_with(&text) {
            msg.push_str(&format!("\n  caused by: {}", text));
        }

        source = err.source();
    }

    msg
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::warn_internal(&formatted);
    })
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::error_internal(&formatted);
    })
}

#[macro_export]
macro_rules! die {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::error_internal(&formatted);
        ::std::process::exit($crate::utils::errors::DEFAULT_EXIT_CODE);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{self, ErrorKind};

    #[test]
    fn test_with_sources() {
        let err = router::Error::from_source(
            ErrorKind::Authentication,
            "invalid api key".into(),
        );

        assert_eq!(
            with_sources(&err),
            "authentication failed or not provided\n  caused by: invalid api key"
        );

        let err = crate::session::Error::from(err);

        // The session error repeats the router error, which is not listed twice
        assert_eq!(
            with_sources(&err),
            "authentication failed or not provided\n  caused by: invalid api key"
        );
    }
}
