//! Name lookup for session builtins and pipeline commands.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::Session;
use crate::commands::{self, Command};
use crate::error::Result;

/// Handler for a session builtin; receives the full argv (`argv[0]` is the name).
pub type Builtin = Arc<dyn Fn(&mut Session, &[String]) -> Result<()> + Send + Sync>;

/// Produces a fresh leaf command for every pipeline stage that uses it.
pub type CommandFactory = Arc<dyn Fn() -> Box<dyn Command> + Send + Sync>;

pub fn builtin<F>(f: F) -> Builtin
where
    F: Fn(&mut Session, &[String]) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub fn command<F>(f: F) -> CommandFactory
where
    F: Fn() -> Box<dyn Command> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Where a command name leads.
#[derive(Clone)]
pub enum Resolution {
    Builtin(Builtin),
    Pipeline(CommandFactory),
    External(String),
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Builtin(_) => f.write_str("Builtin"),
            Resolution::Pipeline(_) => f.write_str("Pipeline"),
            Resolution::External(name) => write!(f, "External({:?})", name),
        }
    }
}

/// Lookup context for [`Registry::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Head of a line without any `|`.
    Line,
    /// One stage of a pipeline. Builtins need the session, so a stage
    /// never resolves to one.
    Stage,
}

#[derive(Clone, Default)]
pub struct Registry {
    builtins: HashMap<String, Builtin>,
    commands: HashMap<String, CommandFactory>,
}

impl Registry {
    pub fn with_defaults() -> Self {
        let mut registry = Registry::default();
        for (name, handler) in super::builtin::defaults() {
            registry.builtins.insert(name.to_string(), handler);
        }
        for (name, factory) in commands::defaults() {
            registry.commands.insert(name.to_string(), factory);
        }
        registry
    }

    /// Install or (with `None`) remove a session builtin.
    pub fn set_builtin(&mut self, name: &str, handler: Option<Builtin>) {
        match handler {
            Some(h) => {
                self.builtins.insert(name.to_string(), h);
            }
            None => {
                self.builtins.remove(name);
            }
        }
    }

    /// Install or (with `None`) remove a pipeline command.
    pub fn set_command(&mut self, name: &str, factory: Option<CommandFactory>) {
        match factory {
            Some(f) => {
                self.commands.insert(name.to_string(), f);
            }
            None => {
                self.commands.remove(name);
            }
        }
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    /// Precedence: builtin, pipeline command, external process. In
    /// [`Scope::Stage`] builtins are skipped.
    pub fn resolve(&self, name: &str, scope: Scope) -> Resolution {
        let builtin = match scope {
            Scope::Line => self.builtins.get(name).cloned().map(Resolution::Builtin),
            Scope::Stage => None,
        };
        builtin
            .or_else(|| self.commands.get(name).cloned().map(Resolution::Pipeline))
            .unwrap_or_else(|| Resolution::External(name.to_string()))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builtins: Vec<_> = self.builtins.keys().collect();
        let mut commands: Vec<_> = self.commands.keys().collect();
        builtins.sort();
        commands.sort();
        f.debug_struct("Registry")
            .field("builtins", &builtins)
            .field("commands", &commands)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_scope_prefers_builtin() {
        let registry = Registry::with_defaults();
        assert!(matches!(registry.resolve("which", Scope::Line), Resolution::Builtin(_)));
        assert!(matches!(registry.resolve("base64", Scope::Line), Resolution::Pipeline(_)));
        assert!(matches!(
            registry.resolve("ls", Scope::Line),
            Resolution::External(ref n) if n == "ls"
        ));
    }

    #[test]
    fn test_stage_scope_prefers_command() {
        let registry = Registry::with_defaults();
        assert!(matches!(registry.resolve("which", Scope::Stage), Resolution::Pipeline(_)));
        assert!(matches!(
            registry.resolve("export", Scope::Stage),
            Resolution::External(ref n) if n == "export"
        ));
    }

    #[test]
    fn test_remove_and_replace() {
        let mut registry = Registry::with_defaults();
        registry.set_command("cat", None);
        assert!(matches!(registry.resolve("cat", Scope::Stage), Resolution::External(_)));

        registry.set_builtin("greet", Some(builtin(|_, _| Ok(()))));
        assert!(registry.is_builtin("greet"));
        registry.set_builtin("greet", None);
        assert!(!registry.is_builtin("greet"));
    }
}
