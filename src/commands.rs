//! `:` commands and their autocomplete.

use crate::config::PageKind;

/// What a command does when run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
  Open(PageKind),
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub action: CommandAction,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "dashboard",
    aliases: &["d", "home", "overview"],
    description: "KPIs, alerts and today's orders",
    action: CommandAction::Open(PageKind::Dashboard),
  },
  Command {
    name: "orders",
    aliases: &["o", "order"],
    description: "Browse and update orders",
    action: CommandAction::Open(PageKind::Orders),
  },
  Command {
    name: "users",
    aliases: &["u", "user", "customers"],
    description: "Manage user roles and access",
    action: CommandAction::Open(PageKind::Users),
  },
  Command {
    name: "foods",
    aliases: &["f", "food", "menu"],
    description: "Menu items and availability",
    action: CommandAction::Open(PageKind::Foods),
  },
  Command {
    name: "inventory",
    aliases: &["i", "inv", "stock"],
    description: "Stock levels",
    action: CommandAction::Open(PageKind::Inventory),
  },
  Command {
    name: "audit",
    aliases: &["a", "logs", "log"],
    description: "Admin audit trail",
    action: CommandAction::Open(PageKind::Audit),
  },
  Command {
    name: "ai",
    aliases: &["ml", "model", "recommendations"],
    description: "Model status, retraining and recommendation log",
    action: CommandAction::Open(PageKind::Ai),
  },
  Command {
    name: "analytics",
    aliases: &["an", "stats", "reports"],
    description: "Sales, demand and health trends by date range",
    action: CommandAction::Open(PageKind::Analytics),
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit hbadmin",
    action: CommandAction::Quit,
  },
];

/// Lower is a better match; `None` is no match
fn match_rank(cmd: &Command, input: &str) -> Option<u32> {
  if cmd.name == input {
    Some(0)
  } else if cmd.aliases.contains(&input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if cmd.aliases.iter().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else if cmd.aliases.iter().any(|a| a.contains(input)) {
    Some(5)
  } else {
    None
  }
}

/// Get autocomplete suggestions for a given input, best match first
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();
  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut ranked: Vec<(&'static Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| match_rank(cmd, &input).map(|rank| (cmd, rank)))
    .collect();
  ranked.sort_by_key(|(_, rank)| *rank);
  ranked.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Resolve a submitted command name to its action
pub fn resolve(name: &str) -> Option<CommandAction> {
  get_suggestions(name)
    .first()
    .filter(|cmd| match_rank(cmd, &name.trim().to_lowercase()).is_some_and(|r| r <= 1))
    .map(|cmd| cmd.action)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    assert_eq!(get_suggestions("").len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_and_alias_match() {
    assert_eq!(get_suggestions("orders")[0].name, "orders");
    assert_eq!(get_suggestions("stock")[0].name, "inventory");
    assert_eq!(get_suggestions("Q")[0].name, "quit");
  }

  #[test]
  fn test_prefix_match() {
    assert_eq!(get_suggestions("inv")[0].name, "inventory");
    assert_eq!(get_suggestions("dash")[0].name, "dashboard");
  }

  #[test]
  fn test_fuzzy_match() {
    assert_eq!(get_suggestions("ventor")[0].name, "inventory");
    assert!(get_suggestions("zzz").is_empty());
  }

  #[test]
  fn test_resolve() {
    assert_eq!(
      resolve("orders"),
      Some(CommandAction::Open(PageKind::Orders))
    );
    assert_eq!(resolve("menu"), Some(CommandAction::Open(PageKind::Foods)));
    assert_eq!(resolve("exit"), Some(CommandAction::Quit));
    assert_eq!(resolve("ml"), Some(CommandAction::Open(PageKind::Ai)));
    assert_eq!(
      resolve("stats"),
      Some(CommandAction::Open(PageKind::Analytics))
    );
    // "a" stays the audit alias even though two names start with it
    assert_eq!(resolve("a"), Some(CommandAction::Open(PageKind::Audit)));
    // partial input only resolves through the suggestion list
    assert_eq!(resolve("ord"), None);
    assert_eq!(resolve("nope"), None);
  }
}
