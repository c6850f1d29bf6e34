//! Line-oriented interactive session over one index file at a time.
//!
//! The shell is generic over its input and output streams; the binary
//! wires it to stdin/stdout, tests drive it with in-memory buffers.

use std::fmt::Display;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cli::import_export::{extract_csv, load_csv};
use crate::cli::CliError;
use crate::store::StoreOptions;
use crate::tree::BTree;

const HELP: &str = "\
commands:
  create <path>         create a new index file and open it
  open <path>           open an existing index file
  insert <key> <value>  insert one pair
  search <key>          look up a key
  load <csv>            bulk insert key,value rows from a CSV file
  print                 list every pair in ascending key order
  extract <csv>         write every pair to a CSV file
  stats                 show file, tree and cache statistics
  verify                check the structural invariants
  close                 close the current index
  help                  show this summary
  quit | exit           close and leave the shell";

enum Flow {
    Continue,
    Quit,
}

/// Interactive session holding at most one open index.
pub struct Shell<R, W> {
    input: R,
    output: W,
    options: StoreOptions,
    session: Option<BTree>,
}

impl<R: BufRead, W: Write> Shell<R, W> {
    /// Session with no index open yet.
    pub fn new(input: R, output: W, options: StoreOptions) -> Self {
        Self {
            input,
            output,
            options,
            session: None,
        }
    }

    /// Session starting with an already opened index.
    pub fn with_index(input: R, output: W, options: StoreOptions, tree: BTree) -> Self {
        Self {
            input,
            output,
            options,
            session: Some(tree),
        }
    }

    /// Read and dispatch commands until `quit`, `exit`, or end of input.
    pub fn run(mut self) -> Result<(), CliError> {
        loop {
            write!(self.output, "tanoak> ")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                break;
            }
            let line = line.trim().to_string();
            match self.dispatch(&line) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(err) => writeln!(self.output, "error: {err}")?,
            }
        }

        if let Some(tree) = self.session.take() {
            tree.close()?;
        }
        Ok(())
    }

    fn dispatch(&mut self, line: &str) -> Result<Flow, CliError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, args)) = tokens.split_first() else {
            return Ok(Flow::Continue);
        };

        match command {
            "create" => {
                let path = parse_path(args, "create <path>")?;
                self.create(&path)?;
            }
            "open" => {
                let path = parse_path(args, "open <path>")?;
                self.close_session()?;
                self.session = Some(BTree::open_with(&path, self.options.clone())?);
                writeln!(self.output, "opened {}", path.display())?;
            }
            "insert" => {
                let (key, value) = parse_pair_args(args, "insert <key> <value>")?;
                self.session()?.insert(key, value)?;
                writeln!(self.output, "inserted {key}")?;
            }
            "search" => {
                let key = parse_key(args, "search <key>")?;
                match self.session()?.search(key)? {
                    Some(value) => writeln!(self.output, "{key} -> {value}")?,
                    None => writeln!(self.output, "key {key} not found")?,
                }
            }
            "load" => {
                let path = parse_path(args, "load <csv>")?;
                let tree = self.session()?;
                let summary = load_csv(tree, &path)?;
                writeln!(
                    self.output,
                    "loaded {} pairs ({} duplicates, {} malformed rows skipped)",
                    summary.inserted, summary.duplicates, summary.malformed
                )?;
            }
            "print" => {
                let pairs = self.session()?.collect()?;
                for (key, value) in &pairs {
                    writeln!(self.output, "{key} -> {value}")?;
                }
                writeln!(self.output, "{} pairs", pairs.len())?;
            }
            "extract" => {
                let path = parse_path(args, "extract <csv>")?;
                if path.exists() && !self.confirm_overwrite(&path)? {
                    writeln!(self.output, "extract aborted")?;
                    return Ok(Flow::Continue);
                }
                let tree = self.session()?;
                let summary = extract_csv(tree, &path, true)?;
                writeln!(
                    self.output,
                    "extracted {} pairs to {}",
                    summary.exported,
                    path.display()
                )?;
            }
            "stats" => {
                let stats = self.session()?.stats()?;
                let path = self.session()?.path().to_path_buf();
                let file_len = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                writeln!(self.output, "path        {}", path.display())?;
                writeln!(self.output, "file size   {file_len} bytes")?;
                writeln!(self.output, "blocks      {}", stats.block_count)?;
                writeln!(self.output, "root block  {}", stats.root_block)?;
                writeln!(self.output, "height      {}", stats.height)?;
                writeln!(self.output, "entries     {}", stats.entries)?;
                writeln!(self.output, "cache       {}", stats.cache)?;
            }
            "verify" => {
                let findings = self.session()?.verify()?;
                if findings.is_empty() {
                    writeln!(self.output, "verify: PASS")?;
                } else {
                    for finding in &findings {
                        writeln!(self.output, "verify: {finding}")?;
                    }
                }
            }
            "close" => {
                self.session()?;
                self.close_session()?;
                writeln!(self.output, "closed")?;
            }
            "help" => writeln!(self.output, "{HELP}")?,
            "quit" | "exit" => return Ok(Flow::Quit),
            other => {
                writeln!(self.output, "unknown command '{other}' (try 'help')")?;
            }
        }
        Ok(Flow::Continue)
    }

    fn create(&mut self, path: &Path) -> Result<(), CliError> {
        if path.exists() {
            if !self.confirm_overwrite(path)? {
                writeln!(self.output, "create aborted")?;
                return Ok(());
            }
            self.close_session()?;
            fs::remove_file(path)?;
        } else {
            self.close_session()?;
        }
        self.session = Some(BTree::create_with(path, self.options.clone())?);
        writeln!(self.output, "created {}", path.display())?;
        debug!(path = %path.display(), "shell.create");
        Ok(())
    }

    fn confirm_overwrite(&mut self, path: &Path) -> Result<bool, CliError> {
        write!(self.output, "Overwrite {}? [y/N] ", path.display())?;
        self.output.flush()?;
        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        let answer = answer.trim().to_ascii_lowercase();
        Ok(answer == "y" || answer == "yes")
    }

    fn session(&mut self) -> Result<&mut BTree, CliError> {
        self.session
            .as_mut()
            .ok_or_else(|| CliError::Message("no index open (use 'create' or 'open' first)".into()))
    }

    fn close_session(&mut self) -> Result<(), CliError> {
        if let Some(tree) = self.session.take() {
            tree.close()?;
        }
        Ok(())
    }
}

fn parse_path(args: &[&str], usage: &str) -> Result<PathBuf, CliError> {
    match args {
        [path] => Ok(PathBuf::from(path)),
        _ => Err(usage_error(usage)),
    }
}

fn parse_key(args: &[&str], usage: &str) -> Result<u64, CliError> {
    match args {
        [key] => parse_u64(key),
        _ => Err(usage_error(usage)),
    }
}

fn parse_pair_args(args: &[&str], usage: &str) -> Result<(u64, u64), CliError> {
    match args {
        [key, value] => Ok((parse_u64(key)?, parse_u64(value)?)),
        _ => Err(usage_error(usage)),
    }
}

fn parse_u64(text: &str) -> Result<u64, CliError> {
    text.parse()
        .map_err(|_| CliError::Message(format!("'{text}' is not an unsigned integer")))
}

fn usage_error(usage: impl Display) -> CliError {
    CliError::Message(format!("usage: {usage}"))
}
