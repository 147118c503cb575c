use std::{borrow::Cow, fmt, panic::Location};

/// Operator-facing error text tagged with the source location that raised it.
///
/// Build one with [`DiagnosticMessage::new`] from a `#[track_caller]`
/// constructor, or with [`diag!`] for inline formatting.
#[derive(Clone, Debug)]
pub struct DiagnosticMessage {
    message: Cow<'static, str>,
    location: &'static Location<'static>,
}

impl DiagnosticMessage {
    #[track_caller]
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
            location: Location::caller(),
        }
    }

    /// The message without the location suffix.
    pub fn message(&self) -> &str {
        self.message.as_ref()
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }
}

impl fmt::Display for DiagnosticMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            return f.write_str(&self.message);
        }
        write!(
            f,
            "{} (at {}:{})",
            self.message,
            self.location.file(),
            self.location.line()
        )
    }
}

impl From<String> for DiagnosticMessage {
    #[track_caller]
    fn from(message: String) -> Self {
        DiagnosticMessage::new(message)
    }
}

impl From<&'static str> for DiagnosticMessage {
    #[track_caller]
    fn from(message: &'static str) -> Self {
        DiagnosticMessage::new(message)
    }
}

/// `format!`-style shorthand for [`DiagnosticMessage`].
#[macro_export]
macro_rules! diag {
    ($msg:literal $(,)?) => {
        $crate::error::diagnostics::DiagnosticMessage::new($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::diagnostics::DiagnosticMessage::new(format!($fmt, $($arg)*))
    };
}
