//! Rhai script modules
//!
//! Each plugin gets its own engine and scope. Only three names are bound:
//! `api` (the capability object), `host` (full editor access), and
//! `workspace`. Plugins register a cleanup hook with
//! `api.on_cleanup(|| ...)`; it runs when the plugin is unloaded.
//!
//! ```text
//! api.register_block("demo_say", #{ colour: 230, message0: "say %1" }, "print('hi')\n");
//! api.add_category("Demo", "#5b80a5", ["demo_say"]);
//! api.add_translation("en", #{ DEMO_SAY: "Say" });
//! api.on_cleanup(|| host.remove_style("demo"));
//! ```

use rhai::{Array, Dynamic, Engine, EvalAltResult, FnPtr, Map, NativeCallContext, Scope, AST, INT};
use sdk::errors::PluginError;
use sdk::host::{BlockDefinition, CodeGenerator, SharedHost, ToolboxCategory};
use sdk::manifest::{PluginInfo, PluginRecord};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, info};

use super::{ModuleResolver, PluginApi, PluginModule};

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;
type CleanupSlot = Rc<RefCell<Option<FnPtr>>>;

/// Compiles entries as Rhai scripts
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptResolver;

impl ScriptResolver {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleResolver for ScriptResolver {
    fn resolve(
        &self,
        record: &PluginRecord,
        entry_path: &str,
        source: &str,
    ) -> Result<Box<dyn PluginModule>, PluginError> {
        let engine = build_engine(&record.id);
        let ast = engine
            .compile(source)
            .map_err(|e| PluginError::Execution(format!("{}: {}", entry_path, e)))?;

        debug!("Compiled {} for '{}'", entry_path, record.id);

        Ok(Box::new(ScriptModule {
            engine,
            ast,
            entry_path: entry_path.to_string(),
            cleanup: Rc::new(RefCell::new(None)),
        }))
    }
}

struct ScriptModule {
    engine: Engine,
    ast: AST,
    entry_path: String,
    cleanup: CleanupSlot,
}

impl ScriptModule {
    fn execution_error(&self, e: impl std::fmt::Display) -> PluginError {
        PluginError::Execution(format!("{}: {}", self.entry_path, e))
    }
}

impl PluginModule for ScriptModule {
    fn activate(&mut self, api: &PluginApi) -> Result<(), PluginError> {
        let mut scope = Scope::new();
        scope.push(
            "api",
            ScriptApi {
                api: api.clone(),
                cleanup: Rc::clone(&self.cleanup),
            },
        );
        push_host_bindings(&mut scope, api.host());

        self.engine
            .run_ast_with_scope(&mut scope, &self.ast)
            .map_err(|e| self.execution_error(e))
    }

    fn deactivate(&mut self, _api: &PluginApi) -> Result<(), PluginError> {
        let Some(hook) = self.cleanup.borrow_mut().take() else {
            return Ok(());
        };

        hook.call::<Dynamic>(&self.engine, &self.ast, ())
            .map(|_| ())
            .map_err(|e| self.execution_error(e))
    }
}

fn push_host_bindings(scope: &mut Scope, host: SharedHost) {
    scope.push(
        "host",
        ScriptHost {
            host: Rc::clone(&host),
        },
    );
    scope.push("workspace", ScriptWorkspace { host });
}

/// `api` as seen by scripts
#[derive(Clone)]
struct ScriptApi {
    api: PluginApi,
    cleanup: CleanupSlot,
}

/// `host` as seen by scripts
#[derive(Clone)]
struct ScriptHost {
    host: SharedHost,
}

/// `workspace` as seen by scripts
#[derive(Clone)]
struct ScriptWorkspace {
    host: SharedHost,
}

fn build_engine(plugin_id: &str) -> Engine {
    let mut engine = Engine::new();

    let id = plugin_id.to_string();
    engine.on_print(move |text| info!(plugin = %id, "{}", text));
    let id = plugin_id.to_string();
    engine.on_debug(move |text, _source, _pos| debug!(plugin = %id, "{}", text));

    register_api(&mut engine);
    register_host(&mut engine);

    engine
}

fn register_api(engine: &mut Engine) {
    engine
        .register_type_with_name::<ScriptApi>("PluginApi")
        .register_fn("add_style", |api: &mut ScriptApi, css: &str| {
            api.api.add_style(css)
        })
        .register_fn(
            "register_block",
            |api: &mut ScriptApi, block_type: &str, definition: Map| -> ScriptResult<()> {
                api.api
                    .register_block(block_type, to_definition(definition)?, None);
                Ok(())
            },
        )
        .register_fn(
            "register_block",
            |api: &mut ScriptApi,
             block_type: &str,
             definition: Map,
             generator: &str|
             -> ScriptResult<()> {
                api.api.register_block(
                    block_type,
                    to_definition(definition)?,
                    Some(CodeGenerator(generator.to_string())),
                );
                Ok(())
            },
        )
        .register_fn(
            "add_category",
            |api: &mut ScriptApi, name: &str, colour: &str, blocks: Array| -> ScriptResult<()> {
                api.api.add_category(name, colour, to_block_types(blocks)?);
                Ok(())
            },
        )
        .register_fn(
            "add_category",
            |api: &mut ScriptApi, name: &str, hue: INT, blocks: Array| -> ScriptResult<()> {
                api.api
                    .add_category(name, &hue.to_string(), to_block_types(blocks)?);
                Ok(())
            },
        )
        .register_fn(
            "add_translation",
            |api: &mut ScriptApi, locale: &str, messages: Map| {
                api.api.add_translation(locale, to_messages(messages))
            },
        )
        .register_fn("info", |api: &mut ScriptApi| info_map(api.api.info()))
        .register_fn("on_cleanup", |api: &mut ScriptApi, hook: FnPtr| {
            *api.cleanup.borrow_mut() = Some(hook);
        })
        .register_fn("host", |api: &mut ScriptApi| ScriptHost {
            host: api.api.host(),
        })
        .register_fn(
            "execute",
            |ctx: NativeCallContext, api: &mut ScriptApi, code: &str| -> ScriptResult<Dynamic> {
                let mut scope = Scope::new();
                push_host_bindings(&mut scope, api.api.host());
                ctx.engine().eval_with_scope::<Dynamic>(&mut scope, code)
            },
        );
}

fn register_host(engine: &mut Engine) {
    engine
        .register_type_with_name::<ScriptHost>("Host")
        .register_fn(
            "define_block",
            |h: &mut ScriptHost, block_type: &str, definition: Map| -> ScriptResult<()> {
                let definition = to_definition(definition)?;
                h.host.borrow_mut().define_block(block_type, definition, None);
                Ok(())
            },
        )
        .register_fn(
            "define_block",
            |h: &mut ScriptHost,
             block_type: &str,
             definition: Map,
             generator: &str|
             -> ScriptResult<()> {
                let definition = to_definition(definition)?;
                h.host.borrow_mut().define_block(
                    block_type,
                    definition,
                    Some(CodeGenerator(generator.to_string())),
                );
                Ok(())
            },
        )
        .register_fn("has_block", |h: &mut ScriptHost, block_type: &str| {
            h.host.borrow().has_block(block_type)
        })
        .register_fn(
            "append_category",
            |h: &mut ScriptHost, name: &str, colour: &str, blocks: Array| -> ScriptResult<()> {
                let category = ToolboxCategory {
                    name: name.to_string(),
                    colour: colour.to_string(),
                    blocks: to_block_types(blocks)?,
                };
                h.host.borrow_mut().append_category(category);
                Ok(())
            },
        )
        .register_fn(
            "merge_messages",
            |h: &mut ScriptHost, locale: &str, messages: Map| {
                h.host
                    .borrow_mut()
                    .merge_messages(locale, to_messages(messages))
            },
        )
        .register_fn("inject_style", |h: &mut ScriptHost, id: &str, css: &str| {
            h.host.borrow_mut().inject_style(id, css)
        })
        .register_fn("remove_style", |h: &mut ScriptHost, id: &str| {
            h.host.borrow_mut().remove_style(id)
        })
        .register_fn("relayout", |h: &mut ScriptHost| h.host.borrow_mut().relayout());

    engine
        .register_type_with_name::<ScriptWorkspace>("Workspace")
        .register_fn("relayout", |w: &mut ScriptWorkspace| {
            w.host.borrow_mut().relayout()
        })
        .register_fn("has_block", |w: &mut ScriptWorkspace, block_type: &str| {
            w.host.borrow().has_block(block_type)
        });
}

fn to_definition(definition: Map) -> ScriptResult<BlockDefinition> {
    rhai::serde::from_dynamic(&Dynamic::from_map(definition))
}

fn to_block_types(blocks: Array) -> ScriptResult<Vec<String>> {
    blocks
        .into_iter()
        .map(|block| {
            block.into_string().map_err(|type_name| {
                Box::<EvalAltResult>::from(format!(
                    "block type must be a string, got {}",
                    type_name
                ))
            })
        })
        .collect()
}

fn to_messages(messages: Map) -> HashMap<String, String> {
    messages
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn info_map(info: &PluginInfo) -> Map {
    let mut map = Map::new();
    map.insert("id".into(), info.id.clone().into());
    map.insert("name".into(), info.name.clone().into());
    map.insert("version".into(), info.version.clone().into());
    map.insert("author".into(), info.author.clone().into());
    map
}
