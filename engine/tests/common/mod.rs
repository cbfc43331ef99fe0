//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use edbp_engine::db::{DurableSlot, MemorySlot};
use sdk::errors::PluginError;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Build a zip from `(path, contents)` pairs
pub fn zip_of(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for (name, contents) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(contents).unwrap();
    }

    writer.finish().unwrap().into_inner()
}

pub fn manifest(id: &str) -> String {
    format!(
        r#"{{"id": "{id}", "name": "{id} blocks", "version": "1.0.0", "author": "tester", "main": "main.js"}}"#
    )
}

/// Plugin archive with a manifest and an entry script at the root
pub fn plugin_zip(id: &str, script: &str) -> Vec<u8> {
    let manifest = manifest(id);
    zip_of(&[
        ("plugin.json", manifest.as_bytes()),
        ("main.js", script.as_bytes()),
    ])
}

/// Script that registers one block and one stylesheet
pub fn block_script(block_type: &str) -> String {
    format!(
        r#"
        api.register_block("{block_type}", #{{ message0: "{block_type}" }});
        api.add_style(".{block_type} {{ color: blue; }}");
        "#
    )
}

/// Memory slot whose writes can be switched to fail
#[derive(Debug, Default)]
pub struct FlakySlot {
    inner: MemorySlot,
    fail_writes: AtomicBool,
}

impl FlakySlot {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), PluginError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(PluginError::Storage("disk full".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DurableSlot for FlakySlot {
    async fn read(&self, key: &str) -> Result<Option<String>, PluginError> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), PluginError> {
        self.check()?;
        self.inner.write(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), PluginError> {
        self.check()?;
        self.inner.remove(key).await
    }
}
