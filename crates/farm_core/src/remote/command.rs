//! Typed construction of transfer and remote-execution commands.
//!
//! Local programs are spawned directly with an argument vector, never
//! through a shell. The only strings a shell ever sees are the remote
//! command handed to ssh and the `--rsync-path` value, and every field in
//! those is quoted by [`shell_quote`].

use std::fmt;

/// Quote a single word for a POSIX shell.
///
/// Words made only of safe characters pass through unchanged; anything else
/// is wrapped in single quotes with embedded quotes escaped.
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:,@%+".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Join words into one shell command line, quoting each.
pub fn shell_join<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(|w| shell_quote(w.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// A program plus its argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// Options for one directional bulk copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Archive mode (`-a`).
    pub archive: bool,
    /// Follow symlinks on the sending side.
    pub copy_links: bool,
    /// Compress data in transit.
    pub compress: bool,
    /// Delete source files once transferred.
    pub remove_source: bool,
    pub exclude: Vec<String>,
    /// Create this directory on the receiving host before copying.
    pub create_remote_dir: Option<String>,
    /// Transfer goes through the remote shell.
    pub remote: bool,
}

/// A bulk copy from one or more sources to a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCommand {
    pub sources: Vec<String>,
    pub dest: String,
    pub options: SyncOptions,
}

impl SyncCommand {
    pub fn new(source: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            sources: vec![source.into()],
            dest: dest.into(),
            options: SyncOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the rsync invocation.
    pub fn to_spec(&self, rsync_program: &str, ssh_program: &str) -> CommandSpec {
        let opts = &self.options;
        let mut spec = CommandSpec::new(rsync_program).arg("-q");

        if opts.archive {
            spec = spec.arg("-a");
        }
        if opts.compress {
            spec = spec.arg("-z");
        }
        if opts.copy_links {
            spec = spec.arg("--copy-links");
        }
        if opts.remote {
            spec = spec
                .arg("-e")
                .arg(format!("{} -T -o Compression=no -x", ssh_program));
        }
        if let Some(dir) = &opts.create_remote_dir {
            spec = spec.arg(format!(
                "--rsync-path=mkdir -p {} && {}",
                shell_quote(dir),
                rsync_program
            ));
        }
        if opts.remove_source {
            spec = spec.arg("--remove-source-files");
        }
        for pattern in &opts.exclude {
            spec = spec.arg(format!("--exclude={}", pattern));
        }

        spec.args(self.sources.iter().cloned()).arg(self.dest.clone())
    }
}

/// A command line run on the remote host over ssh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteExec {
    words: Vec<String>,
}

impl RemoteExec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            words: vec![program.into()],
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.words.push(arg.into());
        self
    }

    /// Flag followed by its value.
    pub fn opt(self, flag: &str, value: impl Into<String>) -> Self {
        self.arg(flag).arg(value)
    }

    /// The quoted command line the remote shell will run.
    pub fn command_line(&self) -> String {
        shell_join(&self.words)
    }

    /// Build the ssh invocation.
    pub fn to_spec(&self, ssh_program: &str, host_login: &str) -> CommandSpec {
        CommandSpec::new(ssh_program)
            .args(["-T", "-x"])
            .arg(host_login)
            .arg(self.command_line())
    }
}
