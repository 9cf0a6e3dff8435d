use std::path::PathBuf;

use kubernetriks_cache::config::{CacheConfig, ConfigError};
use kubernetriks_cache::core::cache::handler::{CacheHandler, OptionalStore};
use kubernetriks_cache::core::scheduler::score_profile::ScoreProfile;
use kubernetriks_cache::printer::OutputFormat;

#[test]
fn test_full_config() {
    let config = CacheConfig::from_yaml(
        r#"
    scheduler_name: godel
    scheduler_type: batch
    sub_cluster: gpu
    disabled_stores: [pod_group]
    plugins:
      - name: LoadAware
        weight: 3
        args:
          resources:
            - name: cpu
              weight: 2
              resource_type: best-effort
            - name: memory
              weight: 1
              resource_type: guaranteed
    output:
      format: PrettyTable
      output_file: scores.txt
    "#,
    )
    .unwrap();

    let handler = CacheHandler::from_config(&config);
    assert_eq!("batch", handler.scheduler_type());
    assert_eq!("gpu", handler.sub_cluster());
    assert!(!handler.switch_type().enabled(OptionalStore::PodGroup));
    assert!(handler.switch_type().enabled(OptionalStore::Pdb));

    let output = config.output.as_ref().unwrap();
    assert_eq!(OutputFormat::PrettyTable, output.format);
    assert_eq!(Some(PathBuf::from("scores.txt")), output.output_file);

    let profile = ScoreProfile::from_config(&config.plugins).unwrap();
    assert_eq!(vec!["LoadAware"], profile.plugin_names());
}

#[test]
fn test_bad_plugins_are_rejected() {
    let config = CacheConfig::from_yaml("plugins: [{name: NodeAffinity}]").unwrap();
    assert!(matches!(
        ScoreProfile::from_config(&config.plugins),
        Err(ConfigError::UnknownPlugin(_))
    ));

    let config = CacheConfig::from_yaml(
        r#"
    plugins:
      - name: LoadAware
        args:
          resources:
            - { name: cpu, weight: -1, resource_type: best-effort }
    "#,
    )
    .unwrap();
    assert!(matches!(
        ScoreProfile::from_config(&config.plugins),
        Err(ConfigError::InvalidPluginArgs { .. })
    ));
}

#[test]
fn test_missing_config_file() {
    assert!(matches!(
        CacheConfig::from_file(&PathBuf::from("/nonexistent/config.yaml")),
        Err(ConfigError::Io { .. })
    ));
}
