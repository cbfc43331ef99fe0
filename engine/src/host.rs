//! In-memory block host
//!
//! Records everything plugins contribute. Used by the CLI, where there is
//! no editor to extend, and by tests.

use sdk::host::{BlockDefinition, BlockHost, CodeGenerator, SharedHost, ToolboxCategory};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct DefinedBlock {
    pub definition: BlockDefinition,
    pub generator: Option<CodeGenerator>,
}

#[derive(Debug, Default)]
pub struct InMemoryHost {
    blocks: BTreeMap<String, DefinedBlock>,
    categories: Vec<ToolboxCategory>,
    messages: HashMap<String, HashMap<String, String>>,
    styles: BTreeMap<String, Vec<String>>,
    relayouts: usize,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh host plus the type-erased handle the runtime expects
    pub fn shared() -> (Rc<RefCell<Self>>, SharedHost) {
        let host = Rc::new(RefCell::new(Self::new()));
        let shared: SharedHost = Rc::clone(&host) as SharedHost;
        (host, shared)
    }

    pub fn block(&self, block_type: &str) -> Option<&DefinedBlock> {
        self.blocks.get(block_type)
    }

    pub fn block_types(&self) -> Vec<&str> {
        self.blocks.keys().map(String::as_str).collect()
    }

    pub fn categories(&self) -> &[ToolboxCategory] {
        &self.categories
    }

    pub fn message(&self, locale: &str, key: &str) -> Option<&str> {
        self.messages.get(locale)?.get(key).map(String::as_str)
    }

    pub fn styles_for(&self, plugin_id: &str) -> Vec<String> {
        self.styles.get(plugin_id).cloned().unwrap_or_default()
    }

    pub fn has_style(&self, plugin_id: &str) -> bool {
        self.styles.contains_key(plugin_id)
    }

    pub fn relayout_count(&self) -> usize {
        self.relayouts
    }
}

impl BlockHost for InMemoryHost {
    fn define_block(
        &mut self,
        block_type: &str,
        definition: BlockDefinition,
        generator: Option<CodeGenerator>,
    ) {
        self.blocks.insert(
            block_type.to_string(),
            DefinedBlock {
                definition,
                generator,
            },
        );
    }

    fn has_block(&self, block_type: &str) -> bool {
        self.blocks.contains_key(block_type)
    }

    fn append_category(&mut self, category: ToolboxCategory) {
        self.categories.push(category);
    }

    fn merge_messages(&mut self, locale: &str, messages: HashMap<String, String>) {
        self.messages
            .entry(locale.to_string())
            .or_default()
            .extend(messages);
    }

    fn inject_style(&mut self, plugin_id: &str, css: &str) {
        self.styles
            .entry(plugin_id.to_string())
            .or_default()
            .push(css.to_string());
    }

    fn remove_style(&mut self, plugin_id: &str) {
        self.styles.remove(plugin_id);
    }

    fn relayout(&mut self) {
        self.relayouts += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_merge_per_locale() {
        let mut host = InMemoryHost::new();
        host.merge_messages("en", HashMap::from([("A".to_string(), "one".to_string())]));
        host.merge_messages(
            "en",
            HashMap::from([
                ("A".to_string(), "uno".to_string()),
                ("B".to_string(), "two".to_string()),
            ]),
        );

        assert_eq!(host.message("en", "A"), Some("uno"));
        assert_eq!(host.message("en", "B"), Some("two"));
        assert_eq!(host.message("ja", "A"), None);
    }

    #[test]
    fn test_remove_style_drops_every_sheet() {
        let mut host = InMemoryHost::new();
        host.inject_style("p", "a{}");
        host.inject_style("p", "b{}");
        host.remove_style("p");
        assert!(!host.has_style("p"));
    }
}
