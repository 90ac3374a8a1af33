//! Session context modules register into
//!
//! The context stands in for the interactive shell's own scope: variables,
//! aliases and functions a module defines land here and remain visible to
//! whoever holds the context after the load returns.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A shell function contributed by a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleCommand {
    /// Function name
    pub name: String,
    /// Function body (without the enclosing braces)
    pub body: String,
    /// Module that defined it, if defined during a module load
    pub module: Option<String>,
}

/// Shell-visible state accumulated over a session
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionContext {
    variables: BTreeMap<String, String>,
    exported: BTreeSet<String>,
    aliases: BTreeMap<String, String>,
    commands: BTreeMap<String, ModuleCommand>,
    /// Module bodies in the order they started executing
    executed: Vec<String>,
    #[serde(skip)]
    current_module: Option<String>,
    /// Environment the context was seeded with
    #[serde(skip)]
    inherited: BTreeMap<String, String>,
}

impl SessionContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context seeded with the current process environment
    ///
    /// Seeded variables are marked exported, as they are in a login shell.
    pub fn from_env() -> Self {
        let mut ctx = Self::new();
        for (key, value) in std::env::vars() {
            ctx.set_var(&key, &value);
            ctx.export_var(&key);
        }
        ctx.inherited = ctx.variables.clone();
        ctx
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn set_var(&mut self, name: &str, value: &str) {
        self.variables.insert(name.to_string(), value.to_string());
    }

    pub fn unset_var(&mut self, name: &str) {
        self.variables.remove(name);
        self.exported.remove(name);
    }

    /// Mark a variable as exported; it need not have a value yet
    pub fn export_var(&mut self, name: &str) {
        self.exported.insert(name.to_string());
    }

    pub fn is_exported(&self, name: &str) -> bool {
        self.exported.contains(name)
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn alias(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    pub fn set_alias(&mut self, name: &str, value: &str) {
        self.aliases.insert(name.to_string(), value.to_string());
    }

    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    /// Define (or redefine) a shell function
    pub fn define_command(&mut self, name: &str, body: &str) {
        let command = ModuleCommand {
            name: name.to_string(),
            body: body.to_string(),
            module: self.current_module.clone(),
        };
        self.commands.insert(name.to_string(), command);
    }

    pub fn command(&self, name: &str) -> Option<&ModuleCommand> {
        self.commands.get(name)
    }

    pub fn commands(&self) -> impl Iterator<Item = &ModuleCommand> {
        self.commands.values()
    }

    /// Module bodies executed so far, in execution order
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    /// Module whose body is currently executing
    pub fn current_module(&self) -> Option<&str> {
        self.current_module.as_deref()
    }

    pub(crate) fn enter_module(&mut self, name: &str) -> Option<String> {
        self.executed.push(name.to_string());
        self.current_module.replace(name.to_string())
    }

    pub(crate) fn leave_module(&mut self, previous: Option<String>) {
        self.current_module = previous;
    }

    /// Render the context as shell code suitable for `eval`
    ///
    /// Variables are emitted as plain or `export` assignments depending on
    /// their export flag. Inherited environment variables only appear when a
    /// module changed or removed them, and exported names without a value
    /// are skipped.
    pub fn render_shell(&self) -> String {
        let mut out = String::new();
        for name in self.inherited.keys() {
            if !self.variables.contains_key(name) {
                out.push_str(&format!("unset {}\n", name));
            }
        }
        for (name, value) in &self.variables {
            if self.inherited.get(name) == Some(value) {
                continue;
            }
            if self.exported.contains(name) {
                out.push_str(&format!("export {}={}\n", name, shell_quote(value)));
            } else {
                out.push_str(&format!("{}={}\n", name, shell_quote(value)));
            }
        }
        for (name, value) in &self.aliases {
            out.push_str(&format!("alias {}={}\n", name, shell_quote(value)));
        }
        for command in self.commands.values() {
            out.push_str(&format!("{}() {{\n{}\n}}\n", command.name, command.body));
        }
        out
    }
}

/// Quote a value with single quotes, escaping embedded single quotes
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
