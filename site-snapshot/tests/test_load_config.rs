use serial_test::serial;
use site_snapshot::load_config::load_config;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

/// A full config plus env credentials produces a ready-to-use endpoint.
#[test]
#[serial]
fn test_load_config_injects_env_credentials() {
    let file = config_file(
        r#"
site:
  url: https://drupal-static-elasticsearch.ddev.site:4443
  export_dir: ./tmp/export
  cache_clear_command: drush cr
elasticsearch:
  url: https://drupal-static-elasticsearch.ddev.site:9201/
  source_index: db_default
  timeout_secs: 10
  wait_for_clone: true
"#,
    );
    env::set_var("ELASTICSEARCH_USERNAME", "elastic");
    env::set_var("ELASTICSEARCH_PASSWORD", "top-secret");

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.site.export_dir, PathBuf::from("./tmp/export"));
    assert_eq!(config.site.cache_clear_command.as_deref(), Some("drush cr"));
    let es = config.elasticsearch.as_ref().expect("elasticsearch section");
    assert_eq!(es.index_prefix, "elasticsearch_index_");
    assert_eq!(es.timeout(), Duration::from_secs(10));
    assert!(es.wait_for_clone);

    let endpoint = es.endpoint();
    assert_eq!(endpoint.base_url, "https://drupal-static-elasticsearch.ddev.site:9201");
    assert_eq!(endpoint.basic_auth(), Some(("elastic", Some("top-secret"))));
    assert!(!format!("{config:?}").contains("top-secret"));

    env::remove_var("ELASTICSEARCH_USERNAME");
    env::remove_var("ELASTICSEARCH_PASSWORD");
}

/// Unset fields fall back to the stock Drupal export layout.
#[test]
#[serial]
fn test_load_config_applies_defaults() {
    env::remove_var("ELASTICSEARCH_USERNAME");
    env::remove_var("ELASTICSEARCH_PASSWORD");
    let file = config_file(
        r#"
site:
  url: https://example.org
elasticsearch:
  url: http://localhost:9200
"#,
    );

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.site.export_dir, PathBuf::from(".wget-export"));
    assert_eq!(config.site.mirror_program, "wget");
    let es = config.elasticsearch.as_ref().unwrap();
    assert_eq!(es.source_index, "db_default");
    assert_eq!(es.timeout(), Duration::from_secs(30));
    assert!(!es.wait_for_clone);
    assert!(es.endpoint().basic_auth().is_none());

    let pipeline = config.site.to_pipeline_config();
    assert_eq!(pipeline.mirror.program, "wget");
    assert!(pipeline.cache_clear_command.is_none());
}

#[test]
#[serial]
fn test_load_config_without_search_section() {
    let file = config_file("site:\n  url: https://example.org\n");
    let config = load_config(file.path()).expect("Config should load");
    assert!(config.elasticsearch.is_none());
}

#[test]
#[serial]
fn test_load_config_errors_for_invalid_file() {
    let file = config_file("not-yaml: [:::");
    let err = load_config(file.path()).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[test]
#[serial]
fn test_load_config_rejects_bad_urls() {
    let file = config_file("site:\n  url: not a url\n");
    let msg = format!("{:#}", load_config(file.path()).unwrap_err());
    assert!(msg.contains("site.url"), "{msg}");

    let file = config_file(
        "site:\n  url: https://example.org\nelasticsearch:\n  url: file:///tmp/es\n",
    );
    let msg = load_config(file.path()).unwrap_err().to_string();
    assert!(msg.contains("elasticsearch.url"), "{msg}");
}

#[test]
#[serial]
fn test_load_config_rejects_zero_timeout() {
    let file = config_file(
        "site:\n  url: https://example.org\nelasticsearch:\n  url: http://localhost:9200\n  timeout_secs: 0\n",
    );
    let msg = load_config(file.path()).unwrap_err().to_string();
    assert!(msg.contains("timeout_secs"), "{msg}");
}
