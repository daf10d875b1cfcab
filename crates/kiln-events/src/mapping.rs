//! Native-to-semantic mapping rules.

use crate::event::NativeEvent;
use crate::node::TargetKind;

/// Keys whose `keydown` also commits a press by default.
pub const DEFAULT_PRESS_KEYS: &[&str] = &["Enter", " ", "Spacebar"];

/// Extra condition a native event must meet for a rule to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleCondition {
    /// Every event of the native type.
    Always,
    /// Keyboard events whose key is one of the table's press keys.
    PressKey,
}

/// One `native -> semantic@target` rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRule {
    native: String,
    semantic: String,
    target: TargetKind,
    condition: RuleCondition,
}

impl MappingRule {
    /// Rule firing for every `native` event.
    #[must_use]
    pub fn new(native: impl Into<String>, semantic: impl Into<String>, target: TargetKind) -> Self {
        Self {
            native: native.into(),
            semantic: semantic.into(),
            target,
            condition: RuleCondition::Always,
        }
    }

    /// Restrict the rule with `condition`.
    #[must_use]
    pub fn when(mut self, condition: RuleCondition) -> Self {
        self.condition = condition;
        self
    }

    /// Native trigger type.
    #[must_use]
    pub fn native(&self) -> &str {
        &self.native
    }

    /// Semantic type produced.
    #[must_use]
    pub fn semantic(&self) -> &str {
        &self.semantic
    }

    /// Target the semantic event is delivered on, and the node the native
    /// listener is bound to.
    #[must_use]
    pub fn target(&self) -> TargetKind {
        self.target
    }

    /// Extra condition.
    #[must_use]
    pub fn condition(&self) -> RuleCondition {
        self.condition
    }
}

/// The fixed mapping table a router is built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingTable {
    rules: Vec<MappingRule>,
    press_keys: Vec<String>,
}

impl MappingTable {
    /// The built-in rules with the default press keys.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            rules: vec![
                MappingRule::new("click", "press.commit", TargetKind::Root),
                MappingRule::new("pointerdown", "pointer.down", TargetKind::Root),
                MappingRule::new("pointerup", "pointer.up", TargetKind::Root),
                MappingRule::new("keydown", "key.down", TargetKind::Global),
                MappingRule::new("keydown", "press.commit", TargetKind::Root)
                    .when(RuleCondition::PressKey),
                MappingRule::new("keyup", "key.up", TargetKind::Global),
                MappingRule::new("contextmenu", "context.menu", TargetKind::Root),
            ],
            press_keys: DEFAULT_PRESS_KEYS.iter().map(|k| (*k).to_owned()).collect(),
        }
    }

    /// A table without rules.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            press_keys: DEFAULT_PRESS_KEYS.iter().map(|k| (*k).to_owned()).collect(),
        }
    }

    /// Replace the press keys.
    #[must_use]
    pub fn with_press_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.press_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Append a rule.
    #[must_use]
    pub fn with_rule(mut self, rule: MappingRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// All rules, in table order.
    #[must_use]
    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    /// Keys that commit a press.
    #[must_use]
    pub fn press_keys(&self) -> &[String] {
        &self.press_keys
    }

    /// Whether `rule` fires for `event`.
    #[must_use]
    pub fn applies(&self, rule: &MappingRule, event: &NativeEvent) -> bool {
        if rule.native != event.event_type() {
            return false;
        }
        match rule.condition {
            RuleCondition::Always => true,
            RuleCondition::PressKey => event
                .key()
                .is_some_and(|key| self.press_keys.iter().any(|k| k == key)),
        }
    }

    /// Rules that fire on `target` for native `event`, in table order.
    pub fn rules_for<'a>(
        &'a self,
        target: TargetKind,
        event: &'a NativeEvent,
    ) -> impl Iterator<Item = &'a MappingRule> + 'a {
        self.rules
            .iter()
            .filter(move |rule| rule.target == target && self.applies(rule, event))
    }

    /// Native types a `semantic` listener on `target` needs bound, deduplicated
    /// in table order.
    #[must_use]
    pub fn natives_for(&self, semantic: &str, target: TargetKind) -> Vec<String> {
        let mut natives: Vec<String> = Vec::new();
        for rule in &self.rules {
            if rule.semantic == semantic
                && rule.target == target
                && !natives.iter().any(|n| *n == rule.native)
            {
                natives.push(rule.native.clone());
            }
        }
        natives
    }
}

impl Default for MappingTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_commit_needs_click_and_keydown_on_root() {
        let table = MappingTable::builtin();
        assert_eq!(
            table.natives_for("press.commit", TargetKind::Root),
            vec!["click", "keydown"]
        );
        assert!(table.natives_for("press.commit", TargetKind::Global).is_empty());
        assert_eq!(
            table.natives_for("key.down", TargetKind::Global),
            vec!["keydown"]
        );
    }

    #[test]
    fn test_press_key_condition() {
        let table = MappingTable::builtin();
        let enter = NativeEvent::keyboard("keydown", "Enter", "Enter");
        let space = NativeEvent::keyboard("keydown", " ", "Space");
        let letter = NativeEvent::keyboard("keydown", "a", "KeyA");

        let root = |event: &NativeEvent| {
            table
                .rules_for(TargetKind::Root, event)
                .map(|r| r.semantic().to_owned())
                .collect::<Vec<_>>()
        };
        assert_eq!(root(&enter), vec!["press.commit"]);
        assert_eq!(root(&space), vec!["press.commit"]);
        assert!(root(&letter).is_empty());

        let global: Vec<_> = table.rules_for(TargetKind::Global, &letter).collect();
        assert_eq!(global.len(), 1);
        assert_eq!(global[0].semantic(), "key.down");
    }

    #[test]
    fn test_custom_press_keys_and_rules() {
        let table = MappingTable::builtin()
            .with_press_keys(["Enter"])
            .with_rule(MappingRule::new("dblclick", "press.double", TargetKind::Root));
        let space = NativeEvent::keyboard("keydown", " ", "Space");
        assert_eq!(table.rules_for(TargetKind::Root, &space).count(), 0);

        let dbl = NativeEvent::mouse("dblclick");
        let fired: Vec<_> = table.rules_for(TargetKind::Root, &dbl).collect();
        assert_eq!(fired[0].semantic(), "press.double");
    }
}
