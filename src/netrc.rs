use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Login/password pair from a netrc entry. Either field may be empty if the
/// entry only set the other one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

/// Parsed view of the user's per-host credential file (`man 5 netrc`).
///
/// Machine names are matched case-insensitively; a `default` entry answers
/// lookups for machines without their own entry. A missing or unreadable
/// file is treated as empty, not as an error.
#[derive(Debug, Clone, Default)]
pub struct Netrc {
    machines: HashMap<String, Credentials>,
    default: Option<Credentials>,
}

enum Target {
    None,
    Machine(String),
    Default,
}

impl Netrc {
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(raw) => Self::parse(&raw),
            Err(_) => Self::default(),
        }
    }

    pub fn parse(input: &str) -> Self {
        let tokens = tokenize(input);
        let mut netrc = Self::default();
        let mut target = Target::None;

        let mut iter = tokens.into_iter();
        while let Some(token) = iter.next() {
            match token.as_str() {
                "machine" => {
                    if let Some(name) = iter.next() {
                        target = Target::Machine(name.to_lowercase());
                    }
                }
                "default" => {
                    target = Target::Default;
                }
                // some credential files write `username` for `login`
                "login" | "user" | "username" => {
                    if let Some(value) = iter.next() {
                        netrc.entry_mut(&target).login = value;
                    }
                }
                "password" => {
                    if let Some(value) = iter.next() {
                        netrc.entry_mut(&target).password = value;
                    }
                }
                "account" => {
                    let _ = iter.next();
                }
                _ => {}
            }
        }

        netrc
    }

    pub fn lookup(&self, machine: &str) -> Option<&Credentials> {
        self.machines
            .get(&machine.to_lowercase())
            .or(self.default.as_ref())
    }

    fn entry_mut(&mut self, target: &Target) -> &mut Credentials {
        match target {
            Target::Machine(name) => self.machines.entry(name.clone()).or_default(),
            Target::Default | Target::None => {
                self.default.get_or_insert_with(Credentials::default)
            }
        }
    }
}

/// Split into whitespace tokens, dropping macro definitions (`macdef` bodies
/// run to the next blank line) and `#` comments.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut lines = input.lines();

    while let Some(line) = lines.next() {
        let mut in_macdef = false;
        for word in line.split_whitespace() {
            if word.starts_with('#') {
                break;
            }
            if word == "macdef" {
                in_macdef = true;
                break;
            }
            tokens.push(word.to_string());
        }

        if in_macdef {
            for body in lines.by_ref() {
                if body.trim().is_empty() {
                    break;
                }
            }
        }
    }

    tokens
}
