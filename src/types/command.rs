use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// How an argument value is quoted in the shell-equivalent rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quote {
    None,
    Single,
    Double,
}

/// A single argv element plus the metadata needed to render it for humans.
///
/// The process always receives `--flag=value` (or `value`) verbatim; quoting
/// only affects [`CommandLine::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    flag: Option<&'static str>,
    value: String,
    quote: Quote,
    secret: bool,
}

impl Arg {
    /// Bare word, e.g. `--add-drop-table` or a database name.
    pub fn word(value: impl Into<String>) -> Self {
        Self {
            flag: None,
            value: value.into(),
            quote: Quote::None,
            secret: false,
        }
    }

    /// Bare word rendered in single quotes, e.g. a sed script.
    pub fn quoted(value: impl Into<String>) -> Self {
        Self {
            quote: Quote::Single,
            ..Self::word(value)
        }
    }

    /// `--flag=value` with an unquoted value.
    pub fn flag(flag: &'static str, value: impl Into<String>) -> Self {
        Self {
            flag: Some(flag),
            ..Self::word(value)
        }
    }

    pub fn with_quote(mut self, quote: Quote) -> Self {
        self.quote = quote;
        self
    }

    /// `--flag='value'`, hidden in redacted renderings.
    pub fn secret(flag: &'static str, value: impl Into<String>) -> Self {
        Self {
            flag: Some(flag),
            value: value.into(),
            quote: Quote::Single,
            secret: true,
        }
    }

    pub fn is_secret(&self) -> bool {
        self.secret
    }

    /// Exact string handed to the OS.
    pub fn to_os_arg(&self) -> String {
        match self.flag {
            Some(flag) => format!("{flag}={}", self.value),
            None => self.value.clone(),
        }
    }

    fn render_into(&self, out: &mut String, redact: bool) {
        if let Some(flag) = self.flag {
            out.push_str(flag);
            out.push('=');
        }
        let value = if redact && self.secret {
            "***"
        } else {
            self.value.as_str()
        };
        match self.quote {
            Quote::None => out.push_str(value),
            Quote::Single => {
                let _ = write!(out, "'{value}'");
            }
            Quote::Double => {
                let _ = write!(out, "\"{value}\"");
            }
        }
    }
}

/// An external program invocation with optional file redirections and an
/// optional downstream command receiving its stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<Arg>,
    pub stdin: Option<PathBuf>,
    pub stdout: Option<PathBuf>,
    pub pipe_to: Option<Box<CommandLine>>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            stdout: None,
            pipe_to: None,
        }
    }

    pub fn arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn stdin_from(mut self, path: impl AsRef<Path>) -> Self {
        self.stdin = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn stdout_to(mut self, path: impl AsRef<Path>) -> Self {
        self.stdout = Some(path.as_ref().to_path_buf());
        self
    }

    /// Pipe this command's stdout into `next`. File redirection of the
    /// pipeline's final output belongs on `next`.
    pub fn pipe(mut self, next: CommandLine) -> Self {
        self.pipe_to = Some(Box::new(next));
        self
    }

    /// Arguments exactly as the process receives them (no shell quoting).
    pub fn argv(&self) -> Vec<String> {
        self.args.iter().map(Arg::to_os_arg).collect()
    }

    /// Commands of the pipeline starting at `self`, in data-flow order.
    pub fn stages(&self) -> Vec<&CommandLine> {
        let mut out = vec![self];
        let mut cur = self;
        while let Some(next) = cur.pipe_to.as_deref() {
            out.push(next);
            cur = next;
        }
        out
    }

    /// Shell-equivalent text, secrets included.
    pub fn render(&self) -> String {
        self.render_with(false)
    }

    /// Shell-equivalent text with secrets replaced by `***`.
    pub fn redacted(&self) -> String {
        self.render_with(true)
    }

    fn render_with(&self, redact: bool) -> String {
        let mut out = String::new();
        for (i, stage) in self.stages().into_iter().enumerate() {
            if i > 0 {
                out.push_str(" | ");
            }
            out.push_str(&stage.program);
            for arg in &stage.args {
                out.push(' ');
                arg.render_into(&mut out, redact);
            }
            if let Some(stdin) = &stage.stdin {
                let _ = write!(out, " < {}", stdin.display());
            }
            if let Some(stdout) = &stage.stdout {
                let _ = write!(out, " > {}", stdout.display());
            }
        }
        out
    }
}
