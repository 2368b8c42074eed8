//! Rule file parsing.
//!
//! ```text
//! # comment
//! 0x80005  > delete
//! 0x80012/0x100010 > archive, replace:ANON
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{DeidError, Result};
use crate::tag::FieldAddress;

/// Field action; the derived order is the execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    Archive,
    Replace,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Archive => "archive",
            Action::Replace => "replace",
            Action::Delete => "delete",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    /// Address as first written in the rule file; used verbatim in archive
    /// rows and as the [`ReplaceMap`] key.
    pub key: String,
    pub address: FieldAddress,
    /// Sorted, without duplicates.
    pub actions: Vec<Action>,
}

/// Rules in first-seen order of their addresses.
///
/// Spellings of the same address (`0x100010`, `0x00100010`) share one rule.
#[derive(Clone, Debug, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
    /// Canonical address string to rule position.
    index: HashMap<String, usize>,
}

impl RuleTable {
    /// Look up a rule by any spelling of its address.
    pub fn get(&self, key: &str) -> Option<&Rule> {
        let address: FieldAddress = key.parse().ok()?;
        self.index
            .get(&address.to_string())
            .map(|&i| &self.rules[i])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn entry(&mut self, key: &str, address: FieldAddress) -> (&mut Rule, bool) {
        let canonical = address.to_string();
        match self.index.get(&canonical) {
            Some(&i) => (&mut self.rules[i], true),
            None => {
                self.index.insert(canonical, self.rules.len());
                self.rules.push(Rule {
                    key: key.to_string(),
                    address,
                    actions: Vec::new(),
                });
                let last = self.rules.len() - 1;
                (&mut self.rules[last], false)
            }
        }
    }
}

/// Replacement literal per [`Rule::key`].
pub type ReplaceMap = BTreeMap<String, String>;

pub fn parse_rules(text: &str) -> Result<(RuleTable, ReplaceMap)> {
    let mut table = RuleTable::default();
    let mut replacements = ReplaceMap::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, actions)) = line.split_once('>') else {
            continue;
        };
        let key = key.trim();
        let address: FieldAddress = key.parse()?;

        let (rule, seen) = table.entry(key, address);
        if seen {
            warn!(key, line = line_no, "actions for address specified more than once");
            if rule.key != key {
                warn!(key, first = %rule.key, line = line_no, "address spelled differently, merged");
            }
        }

        for token in actions.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (name, value) = match token.split_once(':') {
                Some((name, value)) => (name.trim(), Some(value.trim())),
                None => (token, None),
            };
            let action = match (name, value) {
                ("archive", None) => Action::Archive,
                ("delete", None) => Action::Delete,
                ("replace", Some(value)) => {
                    replacements.insert(rule.key.clone(), value.to_string());
                    Action::Replace
                }
                ("replace", None) => {
                    warn!(key, line = line_no, "no replacement specified, skipping replacement");
                    continue;
                }
                _ => {
                    return Err(DeidError::InvalidAction {
                        action: token.to_string(),
                        line: line_no,
                    });
                }
            };
            rule.actions.push(action);
        }
        rule.actions.sort();
        rule.actions.dedup();
    }

    debug!(rules = table.len(), "parsed rule table");
    Ok((table, replacements))
}

pub fn parse_rules_file(path: &Path) -> Result<(RuleTable, ReplaceMap)> {
    let text = fs::read_to_string(path)?;
    parse_rules(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actions(table: &RuleTable, key: &str) -> Vec<Action> {
        table.get(key).unwrap().actions.clone()
    }

    #[test]
    fn comments_blank_lines_and_lines_without_separator_are_ignored() {
        let text = "\n# 0x80005 > delete\n0x100010 delete\n   \n0x100020 > delete\n";
        let (table, _) = parse_rules(text).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(actions(&table, "0x100020"), vec![Action::Delete]);
    }

    #[test]
    fn actions_are_normalized_to_execution_order() {
        let (table, map) = parse_rules("0xAAAA > replace:X, archive, delete").unwrap();
        assert_eq!(
            actions(&table, "0xAAAA"),
            vec![Action::Archive, Action::Replace, Action::Delete]
        );
        assert_eq!(map["0xAAAA"], "X");
    }

    #[test]
    fn replacement_value_keeps_later_colons() {
        let (_, map) = parse_rules("0x80030 > replace: 12:30:00").unwrap();
        assert_eq!(map["0x80030"], "12:30:00");
    }

    #[test]
    fn replace_without_value_is_dropped() {
        let (table, map) = parse_rules("0x100010 > replace, archive").unwrap();
        assert_eq!(actions(&table, "0x100010"), vec![Action::Archive]);
        assert!(map.is_empty());
    }

    #[test]
    fn unknown_action_reports_line() {
        let err = parse_rules("0x10 > delete\n\n0x20 > scramble").unwrap_err();
        match err {
            DeidError::InvalidAction { action, line } => {
                assert_eq!(action, "scramble");
                assert_eq!(line, 3);
            }
            other => panic!("unexpected {other}"),
        }
        assert!(parse_rules("0x10 > archive:x").is_err());
    }

    #[test]
    fn duplicate_keys_accumulate_and_last_value_wins() {
        let text = "0x100010 > replace:A\n0x100020 > delete\n0x100010 > archive, replace:B";
        let (table, map) = parse_rules(text).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            actions(&table, "0x100010"),
            vec![Action::Archive, Action::Replace]
        );
        assert_eq!(map["0x100010"], "B");
        let keys: Vec<_> = table.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["0x100010", "0x100020"]);
    }

    #[test]
    fn malformed_address_is_a_config_error() {
        assert!(matches!(
            parse_rules("0xNOPE > delete"),
            Err(DeidError::MalformedTag(_))
        ));
    }

    #[test]
    fn zero_padded_spellings_share_one_rule() {
        let (table, map) = parse_rules("0x100010 > archive\n0x00100010 > replace:Anon").unwrap();
        assert_eq!(table.len(), 1);
        let rule = table.get("0x00100010").unwrap();
        assert_eq!(rule.key, "0x100010");
        assert_eq!(rule.actions, vec![Action::Archive, Action::Replace]);
        assert_eq!(map.get("0x100010").map(String::as_str), Some("Anon"));
        assert_eq!(map.len(), 1);
    }
}
