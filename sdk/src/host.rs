//! Host extension surface
//!
//! The block editor is an external collaborator. The plugin manager only
//! talks to it through [`BlockHost`]: block types and their Python code
//! generators, toolbox categories, locale message tables, stylesheets, and a
//! re-layout request after structural changes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared, single-owner handle to the host editor
///
/// The plugin manager runs on one cooperative thread, so the host is
/// reference counted rather than locked.
pub type SharedHost = Rc<RefCell<dyn BlockHost>>;

/// Block type definition contributed by a plugin
///
/// `colour`, `tooltip`, and `help_url` are applied by the editor when a
/// block is initialised; every other key is passed through untouched as the
/// editor's JSON block definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockDefinition {
    #[serde(default)]
    pub colour: Option<Value>,
    #[serde(default)]
    pub tooltip: Option<String>,
    #[serde(default, alias = "helpUrl")]
    pub help_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Python code generator template for a block type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeGenerator(pub String);

/// Toolbox category node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolboxCategory {
    pub name: String,
    pub colour: String,
    /// Block types listed in the category, in display order
    pub blocks: Vec<String>,
}

/// Extension points the editor exposes to plugins
pub trait BlockHost {
    /// Define (or redefine) a block type with an optional code generator
    fn define_block(
        &mut self,
        block_type: &str,
        definition: BlockDefinition,
        generator: Option<CodeGenerator>,
    );

    /// Whether a block type is currently defined
    fn has_block(&self, block_type: &str) -> bool;

    /// Append a category to the end of the toolbox
    fn append_category(&mut self, category: ToolboxCategory);

    /// Merge strings into the message table for `locale`
    fn merge_messages(&mut self, locale: &str, messages: HashMap<String, String>);

    /// Add the stylesheet owned by `plugin_id`
    fn inject_style(&mut self, plugin_id: &str, css: &str);

    /// Remove the stylesheet owned by `plugin_id`, if any
    fn remove_style(&mut self, plugin_id: &str);

    /// Ask the workspace to re-measure itself
    fn relayout(&mut self);
}
