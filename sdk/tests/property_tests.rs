use proptest::prelude::*;
use sdk::errors::{PluginError, PluginErrorExt, ValidationFailure};
use sdk::manifest::{FileContent, PluginRecord};
use std::collections::BTreeMap;

// Every error carries a non-empty, static hint that never echoes its payload
proptest! {
    #[test]
    fn test_error_user_hint_completeness(payload in "[a-z]{8,24}") {
        let errs = vec![
            PluginError::Validation(ValidationFailure::InvalidId(payload.clone())),
            PluginError::InvalidArchive(payload.clone()),
            PluginError::EntryNotFound(payload.clone()),
            PluginError::AlreadyLoaded(payload.clone()),
            PluginError::NotInstalled(payload.clone()),
            PluginError::Execution(payload.clone()),
            PluginError::Network(payload.clone()),
            PluginError::Storage(payload.clone()),
            PluginError::Config(payload.clone()),
        ];

        for err in errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            prop_assert!(!hint.contains(&payload));
        }
    }
}

// A record survives the durable JSON shape with its flags intact
proptest! {
    #[test]
    fn test_record_flags_survive_storage_shape(
        id in "[a-z0-9_-]{1,20}",
        enabled in any::<bool>(),
        official in any::<bool>(),
        approved in any::<bool>(),
        binary_asset in any::<bool>(),
    ) {
        let mut files = BTreeMap::new();
        files.insert("main.js".to_string(), FileContent::Text("api.info();".to_string()));
        if binary_asset {
            files.insert("icon.png".to_string(), FileContent::binary());
        }

        let record = PluginRecord {
            id: id.clone(),
            name: "Sample".to_string(),
            version: "1.0.0".to_string(),
            author: "tester".to_string(),
            description: None,
            main: "main.js".to_string(),
            official,
            approved,
            enabled,
            files,
        };

        let json = serde_json::to_string(&vec![record.clone()]).expect("serialize");
        let parsed: Vec<PluginRecord> = serde_json::from_str(&json).expect("deserialize");

        prop_assert_eq!(parsed.len(), 1);
        prop_assert_eq!(&parsed[0], &record);
    }
}
