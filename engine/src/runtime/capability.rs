//! Capability object handed to each running plugin
//!
//! Every call is scoped to the plugin that owns the object: stylesheets are
//! keyed by its id and `info()` describes it. [`PluginApi::host`] is the
//! one deliberate escape hatch and gives out the full editor surface.

use sdk::host::{BlockDefinition, CodeGenerator, SharedHost, ToolboxCategory};
use sdk::manifest::PluginInfo;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct PluginApi {
    info: PluginInfo,
    host: SharedHost,
}

impl PluginApi {
    pub fn new(info: PluginInfo, host: SharedHost) -> Self {
        Self { info, host }
    }

    pub fn info(&self) -> &PluginInfo {
        &self.info
    }

    pub fn plugin_id(&self) -> &str {
        &self.info.id
    }

    /// Inject a stylesheet owned by this plugin
    pub fn add_style(&self, css: &str) {
        self.host.borrow_mut().inject_style(&self.info.id, css);
        debug!(plugin = %self.info.id, "Stylesheet injected");
    }

    /// Define a block type, optionally with its Python generator
    pub fn register_block(
        &self,
        block_type: &str,
        definition: BlockDefinition,
        generator: Option<CodeGenerator>,
    ) {
        self.host
            .borrow_mut()
            .define_block(block_type, definition, generator);
        debug!(plugin = %self.info.id, "Block registered: {}", block_type);
    }

    /// Append a toolbox category and re-layout the workspace
    ///
    /// Block types that are not defined yet are still listed; the editor
    /// shows them once a plugin defines them.
    pub fn add_category(&self, name: &str, colour: &str, blocks: Vec<String>) {
        let mut host = self.host.borrow_mut();

        for block_type in blocks.iter().filter(|b| !host.has_block(b)) {
            warn!(
                plugin = %self.info.id,
                "Category '{}' lists undefined block type '{}'", name, block_type
            );
        }

        host.append_category(ToolboxCategory {
            name: name.to_string(),
            colour: colour.to_string(),
            blocks,
        });
        host.relayout();
    }

    /// Merge strings into a locale's message table
    pub fn add_translation(&self, locale: &str, messages: HashMap<String, String>) {
        self.host.borrow_mut().merge_messages(locale, messages);
    }

    /// Full host access
    pub fn host(&self) -> SharedHost {
        Rc::clone(&self.host)
    }
}

impl std::fmt::Debug for PluginApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginApi")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryHost;
    use std::cell::RefCell;

    fn api_for(id: &str) -> (Rc<RefCell<InMemoryHost>>, PluginApi) {
        let host = Rc::new(RefCell::new(InMemoryHost::new()));
        let shared: SharedHost = Rc::clone(&host) as SharedHost;
        let info = PluginInfo {
            id: id.to_string(),
            name: "Demo".to_string(),
            version: "1.0".to_string(),
            author: "me".to_string(),
        };
        (host, PluginApi::new(info, shared))
    }

    #[test]
    fn test_styles_are_keyed_by_plugin() {
        let (host, api) = api_for("dark-theme");
        api.add_style("body { background: black; }");

        assert_eq!(
            host.borrow().styles_for("dark-theme"),
            vec!["body { background: black; }".to_string()]
        );
    }

    #[test]
    fn test_add_category_relayouts() {
        let (host, api) = api_for("demo");
        api.register_block("demo_say", BlockDefinition::default(), None);
        api.add_category("Demo", "#5b80a5", vec!["demo_say".into(), "missing".into()]);

        let host = host.borrow();
        assert_eq!(host.categories().len(), 1);
        assert_eq!(host.categories()[0].blocks, vec!["demo_say", "missing"]);
        assert_eq!(host.relayout_count(), 1);
    }
}
