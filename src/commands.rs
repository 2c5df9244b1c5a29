/// `:` commands and autocomplete logic
use fuelsync::resources;

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands. Every resource name opens that resource's list.
pub const COMMANDS: &[Command] = &[
  Command {
    name: resources::TANKS,
    aliases: &["t", "tank"],
    description: "Storage tanks and levels",
  },
  Command {
    name: resources::FUEL_SUPPLIES,
    aliases: &["supplies", "deliveries"],
    description: "Fuel deliveries",
  },
  Command {
    name: resources::FUEL_SALES,
    aliases: &["sales", "s"],
    description: "Fuel sales",
  },
  Command {
    name: resources::TRANSACTIONS,
    aliases: &["tx", "ledger"],
    description: "Income and expense ledger",
  },
  Command {
    name: resources::FUEL_PRICES,
    aliases: &["prices", "p"],
    description: "Price per liter by fuel type",
  },
  Command {
    name: resources::FILLING_SYSTEMS,
    aliases: &["pumps", "dispensers"],
    description: "Dispensers and their tanks",
  },
  Command {
    name: resources::SHIFTS,
    aliases: &["shift"],
    description: "Employee shifts",
  },
  Command {
    name: resources::EMPLOYEES,
    aliases: &["staff", "e"],
    description: "Station staff",
  },
  Command {
    name: resources::PROVIDERS,
    aliases: &["vendors"],
    description: "Fuel providers",
  },
  Command {
    name: resources::EXPENSES,
    aliases: &["costs"],
    description: "Operating expenses",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit fuelsync",
  },
];

/// Match quality of `cmd` for `input`, lower is better.
fn rank(cmd: &Command, input: &str) -> Option<u32> {
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

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();
  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&'static Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| rank(cmd, &input).map(|r| (cmd, r)))
    .collect();
  matches.sort_by_key(|(_, r)| *r);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}
