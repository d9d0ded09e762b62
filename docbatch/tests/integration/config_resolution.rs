//! Resolving configuration from files, environment, and flags.

use docbatch::config::{
    Config, ConfigResolver, ConfigSource, Merge, PageFormat, PartialConfig, PartialOptions,
    PartialOutput, SortMethod, write_default_config,
};
use docbatch::error::DocBatchError;
use std::collections::HashMap;

use crate::common::Workspace;

fn resolver(ws: &Workspace, env: &[(&str, &str)]) -> ConfigResolver {
    let env: HashMap<String, String> = env
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ConfigResolver::new()
        .project_dir(ws.root())
        .user_config(None)
        .env_lookup(move |key| env.get(key).cloned())
}

#[tokio::test]
async fn test_init_then_load_yields_defaults() {
    let ws = Workspace::new();
    let written = write_default_config(ws.root(), false).await.unwrap();
    assert!(written.ends_with("docbatch.config.json"));

    let config = resolver(&ws, &[]).load(ws.roots()).await.unwrap();

    let mut expected = Config::default();
    expected.input.path = ws.input();
    expected.output.path = ws.output();
    assert_eq!(config, expected);
    assert!(ws.output().is_dir(), "output root is created during validation");
}

#[tokio::test]
async fn test_init_refuses_to_clobber_without_force() {
    let ws = Workspace::new();
    write_default_config(ws.root(), false).await.unwrap();

    let err = write_default_config(ws.root(), false).await.unwrap_err();
    assert!(err.is_config_error());
    assert!(write_default_config(ws.root(), true).await.is_ok());
}

#[tokio::test]
async fn test_every_layer_in_priority_order() {
    let ws = Workspace::new();
    std::fs::write(
        ws.root().join("docbatch.config.yaml"),
        "options:\n  concurrent: 2\n  timeout: 1000\n  sort:\n    enabled: true\n    method: date\n",
    )
    .unwrap();

    let resolver = resolver(
        &ws,
        &[
            ("DOCBATCH_TIMEOUT", "2500"),
            ("DOCBATCH_CONCURRENT", "undefined"),
            ("DOCBATCH_FORMAT", "letter"),
        ],
    );
    let flags = ws.roots().merge(PartialConfig {
        options: Some(PartialOptions {
            concurrent: Some(6),
            ..Default::default()
        }),
        ..Default::default()
    });

    let sources: Vec<ConfigSource> = resolver
        .layers(flags.clone())
        .await
        .unwrap()
        .into_iter()
        .map(|(source, _)| source)
        .collect();
    assert_eq!(
        sources,
        vec![
            ConfigSource::Defaults,
            ConfigSource::ProjectFile(ws.root().join("docbatch.config.yaml")),
            ConfigSource::Environment,
            ConfigSource::CommandLine,
        ]
    );

    let config = resolver.load(flags).await.unwrap();
    assert_eq!(config.options.concurrent, 6);
    assert_eq!(config.options.timeout, 2500);
    assert_eq!(config.options.format, PageFormat::Letter);
    assert!(config.options.sort.enabled);
    assert_eq!(config.options.sort.method, SortMethod::Date);
}

#[tokio::test]
async fn test_unknown_key_aborts_resolution() {
    let ws = Workspace::new();
    std::fs::write(
        ws.root().join("docbatch.config.json"),
        r#"{"options": {"concurency": 4}}"#,
    )
    .unwrap();

    let err = resolver(&ws, &[]).load(ws.roots()).await.unwrap_err();
    assert!(matches!(err, DocBatchError::ConfigParse { .. }));
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn test_out_of_range_flag_is_config_error() {
    let ws = Workspace::new();
    let flags = ws.roots().merge(PartialConfig {
        options: Some(PartialOptions {
            concurrent: Some(11),
            ..Default::default()
        }),
        ..Default::default()
    });

    let err = resolver(&ws, &[]).load(flags).await.unwrap_err();
    assert!(err.is_config_error());
    assert!(err.to_string().contains("concurrent"));
}

#[tokio::test]
async fn test_invalid_env_format_is_config_error() {
    let ws = Workspace::new();
    let err = resolver(&ws, &[("DOCBATCH_FORMAT", "B5")])
        .load(ws.roots())
        .await
        .unwrap_err();
    assert!(err.is_config_error());
}

#[tokio::test]
async fn test_rejected_output_path_is_not_created() {
    let ws = Workspace::new();
    std::fs::create_dir_all(ws.input()).unwrap();
    let rejected = ws.root().join("bad dir").join("out");
    let flags = ws.roots().merge(PartialConfig {
        output: Some(PartialOutput {
            path: Some(rejected.clone()),
            ..Default::default()
        }),
        ..Default::default()
    });

    let err = resolver(&ws, &[]).load(flags).await.unwrap_err();
    assert!(err.is_config_error());
    assert!(err.to_string().contains("output.path"));
    assert!(!ws.root().join("bad dir").exists());
}
