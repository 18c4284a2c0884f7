//! Command dispatch for an interactive front end
//!
//! Input words resolve in a fixed order: a module command in scope, then an
//! attribute in scope, then a built-in verb or its alias. Rendering and the
//! read loop belong to the front end.

use std::fmt;
use std::sync::Arc;

use vsp_core::{VspError, VspResult};

use crate::hierarchy::{Attribute, Command, Module};
use crate::session::Session;

/// Built-in shell verbs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Connect,
    Disconnect,
    Quit,
    Kill,
    Info,
    Step,
    Run,
    List,
    Cd,
    Exec,
    Read,
    Help,
}

/// Short forms accepted in place of a verb name
pub const ALIASES: &[(&str, Verb)] = &[
    ("t", Verb::Connect),
    ("d", Verb::Disconnect),
    ("i", Verb::Info),
    ("s", Verb::Step),
    ("c", Verb::Run),
    ("k", Verb::Kill),
    ("q", Verb::Quit),
    ("l", Verb::List),
    ("ls", Verb::List),
    ("x", Verb::Exec),
    ("r", Verb::Read),
    ("h", Verb::Help),
];

impl Verb {
    /// Every verb, in help order
    pub const ALL: [Verb; 12] = [
        Verb::Connect,
        Verb::Disconnect,
        Verb::Quit,
        Verb::Kill,
        Verb::Info,
        Verb::Step,
        Verb::Run,
        Verb::List,
        Verb::Cd,
        Verb::Exec,
        Verb::Read,
        Verb::Help,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Verb::Connect => "connect",
            Verb::Disconnect => "disconnect",
            Verb::Quit => "quit",
            Verb::Kill => "kill",
            Verb::Info => "info",
            Verb::Step => "step",
            Verb::Run => "run",
            Verb::List => "list",
            Verb::Cd => "cd",
            Verb::Exec => "exec",
            Verb::Read => "read",
            Verb::Help => "help",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Verb::Connect => {
                "connect to a local simulation on <port> or to a remote one on <host>:<port>"
            }
            Verb::Disconnect => "disconnect from the current session without terminating it",
            Verb::Quit => "disconnect from session and quit program",
            Verb::Kill => "terminate current session",
            Verb::Info => "print information about the current session",
            Verb::Step => "advances simulation to the next discrete timestamp",
            Verb::Run => "continues simulation until stopped or interrupted",
            Verb::List => "displays the module hierarchy onwards from current module",
            Verb::Cd => "moves current module to <module>",
            Verb::Exec => "executes the given <command> [args...]",
            Verb::Read => "reads the given <attribute>",
            Verb::Help => "prints this message",
        }
    }

    /// Whether the verb is meaningless without an attached session
    pub fn needs_session(self) -> bool {
        !matches!(self, Verb::Connect | Verb::Quit | Verb::Help)
    }

    pub fn aliases(self) -> impl Iterator<Item = &'static str> {
        ALIASES
            .iter()
            .filter(move |(_, verb)| *verb == self)
            .map(|(alias, _)| *alias)
    }

    /// Look up a verb by name or alias
    pub fn resolve(word: &str) -> Option<Verb> {
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == word)
            .map(|(_, verb)| *verb)
            .or_else(|| Verb::ALL.into_iter().find(|v| v.name() == word))
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a line of input resolved to
#[derive(Debug)]
pub enum Invocation {
    /// Run a module command
    Exec {
        command: Arc<Command>,
        args: Vec<String>,
    },
    /// Read attributes
    Read { attributes: Vec<Arc<Attribute>> },
    /// Any other built-in verb, left to the front end
    Builtin { verb: Verb, args: Vec<String> },
}

/// Current working module of a shell
#[derive(Debug, Default)]
pub struct Scope {
    current: Option<Arc<Module>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` at the session root
    pub fn current(&self) -> Option<&Arc<Module>> {
        self.current.as_ref()
    }

    /// Dotted path of the working module, empty at the root
    pub fn path(&self) -> &str {
        self.current.as_ref().map_or("", |m| m.hierarchy_name())
    }

    pub fn find_module(&self, session: &Session, path: &str) -> Option<Arc<Module>> {
        self.current
            .as_ref()
            .and_then(|m| m.find_module(path))
            .or_else(|| session.find_module(path))
    }

    pub fn find_attribute(&self, session: &Session, path: &str) -> Option<Arc<Attribute>> {
        self.current
            .as_ref()
            .and_then(|m| m.find_attribute(path))
            .or_else(|| session.find_attribute(path))
    }

    pub fn find_command(&self, session: &Session, path: &str) -> Option<Arc<Command>> {
        self.current
            .as_ref()
            .and_then(|m| m.find_command(path))
            .or_else(|| session.find_command(path))
    }

    /// Make `path` the working module
    pub fn enter(&mut self, session: &Session, path: &str) -> VspResult<()> {
        let module = self
            .find_module(session, path)
            .ok_or_else(|| VspError::NotFound {
                kind: "module",
                path: path.to_string(),
            })?;
        self.current = Some(module);
        Ok(())
    }

    /// Back to the session root
    pub fn leave(&mut self) {
        self.current = None;
    }

    /// One level up; top-level modules lead back to the root
    pub fn up(&mut self) {
        self.current = self.current.as_ref().and_then(|m| m.parent());
    }

    /// `cd` semantics: no argument leaves, `..` goes up, anything else enters
    pub fn change(&mut self, session: &Session, arg: Option<&str>) -> VspResult<()> {
        match arg {
            None => {
                self.leave();
                Ok(())
            }
            Some("..") => {
                self.up();
                Ok(())
            }
            Some(path) => self.enter(session, path),
        }
    }

    /// Resolve one line of input.
    ///
    /// Module commands and attributes in scope shadow built-in verbs; a verb
    /// that needs a session fails with `NotConnected` when there is none.
    pub fn dispatch(&self, session: Option<&Session>, words: &[&str]) -> VspResult<Invocation> {
        let (&first, rest) = words
            .split_first()
            .ok_or_else(|| VspError::UnknownVerb(String::new()))?;
        let rest: Vec<String> = rest.iter().map(|w| w.to_string()).collect();

        if let Some(session) = session {
            if let Some(command) = self.find_command(session, first) {
                return Ok(Invocation::Exec {
                    command,
                    args: rest,
                });
            }
            if self.find_attribute(session, first).is_some() {
                let mut names = Vec::with_capacity(words.len());
                names.push(first.to_string());
                names.extend(rest);
                return Ok(Invocation::Read {
                    attributes: self.resolve_attributes(session, &names)?,
                });
            }
        }

        let verb = Verb::resolve(first).ok_or_else(|| VspError::UnknownVerb(first.to_string()))?;
        let session = match session {
            Some(session) => session,
            None if verb.needs_session() => return Err(VspError::NotConnected),
            None => return Ok(Invocation::Builtin { verb, args: rest }),
        };

        match verb {
            Verb::Exec => {
                let (name, args) = rest.split_first().ok_or(VspError::MissingArguments {
                    command: verb.name().to_string(),
                    required: 1,
                    given: 0,
                })?;
                let command = self
                    .find_command(session, name)
                    .ok_or_else(|| VspError::NotFound {
                        kind: "command",
                        path: name.clone(),
                    })?;
                Ok(Invocation::Exec {
                    command,
                    args: args.to_vec(),
                })
            }
            Verb::Read if rest.is_empty() => Ok(Invocation::Read {
                attributes: self
                    .current
                    .as_ref()
                    .map(|m| m.attributes().to_vec())
                    .unwrap_or_default(),
            }),
            Verb::Read => Ok(Invocation::Read {
                attributes: self.resolve_attributes(session, &rest)?,
            }),
            verb => Ok(Invocation::Builtin { verb, args: rest }),
        }
    }

    fn resolve_attributes(&self, session: &Session, names: &[String]) -> VspResult<Vec<Arc<Attribute>>> {
        names
            .iter()
            .map(|name| {
                self.find_attribute(session, name)
                    .ok_or_else(|| VspError::NotFound {
                        kind: "attribute",
                        path: name.clone(),
                    })
            })
            .collect()
    }
}
