/// Terminal-facing error with an optional hint
///
/// Composition failures surface through this type so the operator sees a
/// short message plus a dimmed suggestion, not a backtrace.
#[derive(Debug)]
pub struct Error {
    message: String,
    hint: Option<String>,
}

impl Error {
    pub fn new(message: &str, hint: Option<&str>) -> Self {
        Error {
            message: message.to_string(),
            hint: hint.map(|h| h.to_string()),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(hint) = &self.hint {
            write!(f, "\n\n{}", console::style(hint).dim())?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}

/// Convert any eyre report into the terminal format and terminate
impl From<eyre::ErrReport> for Error {
    fn from(error: eyre::ErrReport) -> Self {
        let error = error
            .downcast::<Error>()
            .unwrap_or_else(|err| Error::new(&err.to_string(), None));

        eprintln!("\n{} {error}", console::style("Error:").red().bold());

        // The Error is a terminating error, used only at the binary edge
        std::process::exit(1)
    }
}
