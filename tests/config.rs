// ABOUTME: Integration tests for configuration parsing and resolution.
// ABOUTME: Tests YAML parsing, env var interpolation, discovery and flag precedence.

use acr_sweep::config::*;
use acr_sweep::error::Error;
use std::path::PathBuf;
use std::time::Duration;

mod parsing {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let config = Config::from_yaml("registry: myregistry\n").unwrap();
        assert_eq!(config.registry, Some(EnvValue::from("myregistry")));
        assert_eq!(config.threshold_days, DEFAULT_THRESHOLD_DAYS);
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
registry: myregistry
login_server: MyRegistry.AzureCR.io
subscription:
  env: TEST_SUB
  default: 00000000-0000-0000-0000-000000000000
resource_group: rg-registry
threshold_days: 90
audit_dir: /var/log/acr-sweep
az_command: /usr/local/bin/az
command_timeout: 2m
deletion_timeout: 45s
concurrency: 8
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.threshold_days, 90);
        assert_eq!(config.audit_dir, PathBuf::from("/var/log/acr-sweep"));
        assert_eq!(config.az_command, "/usr/local/bin/az");
        assert_eq!(config.command_timeout, Duration::from_secs(120));
        assert_eq!(config.deletion_timeout, Duration::from_secs(45));
        assert_eq!(config.concurrency, 8);
        assert!(matches!(
            config.subscription,
            Some(EnvValue::FromEnv { ref var, .. }) if var == "TEST_SUB"
        ));
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(Config::from_yaml("registry: myregistry\nthreshold: 30\n").is_err());
    }

    #[test]
    fn rejects_blank_az_command() {
        assert!(Config::from_yaml("az_command: '  '\n").is_err());
    }
}

mod resolution {
    use super::*;

    fn full() -> Config {
        Config::from_yaml(
            "registry: myregistry\nsubscription: sub-1\nresource_group: rg-1\n",
        )
        .unwrap()
    }

    #[test]
    fn file_values_resolve() {
        let run = full().resolve(&Overrides::default()).unwrap();
        assert_eq!(run.registry.as_str(), "myregistry");
        assert_eq!(run.login_server, "myregistry.azurecr.io");
        assert_eq!(run.subscription, "sub-1");
        assert_eq!(run.resource_group, "rg-1");
        assert_eq!(run.threshold_days, 30);
    }

    #[test]
    fn flags_win_over_file() {
        let overrides = Overrides {
            registry: Some("otherregistry".into()),
            subscription: Some("sub-2".into()),
            resource_group: None,
            threshold_days: Some(7),
        };
        let run = full().resolve(&overrides).unwrap();
        assert_eq!(run.registry.as_str(), "otherregistry");
        assert_eq!(run.login_server, "otherregistry.azurecr.io");
        assert_eq!(run.subscription, "sub-2");
        assert_eq!(run.resource_group, "rg-1");
        assert_eq!(run.threshold_days, 7);
    }

    #[test]
    fn blank_flag_falls_back_to_file() {
        let overrides = Overrides {
            registry: Some("  ".into()),
            ..Default::default()
        };
        let run = full().resolve(&overrides).unwrap();
        assert_eq!(run.registry.as_str(), "myregistry");
    }

    #[test]
    fn missing_registry_is_reported() {
        let err = Config::default()
            .resolve(&Overrides::default())
            .unwrap_err();
        assert!(matches!(err, Error::MissingSetting { name: "registry", .. }));
    }

    #[test]
    fn missing_resource_group_names_flag() {
        let config = Config::from_yaml("registry: myregistry\nsubscription: s\n").unwrap();
        let err = config.resolve(&Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("--resource-group"));
    }

    #[test]
    fn invalid_registry_name_is_rejected() {
        let overrides = Overrides {
            registry: Some("my-registry".into()),
            ..Default::default()
        };
        let err = full().resolve(&overrides).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn login_server_override_is_lowercased() {
        let mut config = full();
        config.login_server = Some(EnvValue::from("MyRegistry-Geo.AzureCR.io"));
        let run = config.resolve(&Overrides::default()).unwrap();
        assert_eq!(run.login_server, "myregistry-geo.azurecr.io");
    }

    #[test]
    fn engine_settings_follow_run_config() {
        let run = full().resolve(&Overrides::default()).unwrap();
        let settings = run.engine_settings();
        assert_eq!(settings.login_server, "myregistry.azurecr.io");
        assert_eq!(settings.threshold_days, 30);
        assert_eq!(settings.concurrency, 4);
    }
}

mod env_interpolation {
    use super::*;

    #[test]
    fn env_reference_resolves() {
        temp_env::with_var("ACR_SWEEP_TEST_REGISTRY", Some("envregistry"), || {
            let yaml = "registry:\n  env: ACR_SWEEP_TEST_REGISTRY\nsubscription: s\nresource_group: r\n";
            let run = Config::from_yaml(yaml)
                .unwrap()
                .resolve(&Overrides::default())
                .unwrap();
            assert_eq!(run.registry.as_str(), "envregistry");
        });
    }

    #[test]
    fn env_default_applies_when_unset() {
        temp_env::with_var_unset("ACR_SWEEP_TEST_SUB", || {
            let value = EnvValue::FromEnv {
                var: "ACR_SWEEP_TEST_SUB".into(),
                default: Some("fallback".into()),
            };
            assert_eq!(value.resolve().unwrap(), "fallback");
        });
    }

    #[test]
    fn missing_env_var_is_an_error() {
        temp_env::with_var_unset("ACR_SWEEP_TEST_MISSING", || {
            let value = EnvValue::FromEnv {
                var: "ACR_SWEEP_TEST_MISSING".into(),
                default: None,
            };
            assert!(matches!(value.resolve(), Err(Error::MissingEnvVar(v)) if v == "ACR_SWEEP_TEST_MISSING"));
        });
    }

    #[test]
    fn blank_env_value_counts_as_unset() {
        temp_env::with_var("ACR_SWEEP_TEST_BLANK", Some("   "), || {
            let value = EnvValue::FromEnv {
                var: "ACR_SWEEP_TEST_BLANK".into(),
                default: None,
            };
            assert_eq!(resolve_optional(Some(&value)).unwrap(), None);
        });
    }
}

mod discovery {
    use super::*;
    use std::fs;

    #[test]
    fn discovers_primary_filename() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "threshold_days: 12\n").unwrap();
        assert_eq!(Config::discover(dir.path()).unwrap().threshold_days, 12);
    }

    #[test]
    fn discovers_nested_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".acr-sweep")).unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME_DIR), "threshold_days: 14\n").unwrap();
        assert_eq!(Config::discover(dir.path()).unwrap().threshold_days, 14);
    }

    #[test]
    fn discover_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::discover(dir.path()),
            Err(Error::ConfigNotFound(_))
        ));
    }

    #[test]
    fn locate_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::locate(None, dir.path()).unwrap();
        assert!(config.registry.is_none());
        assert_eq!(config.concurrency, 4);
    }

    #[test]
    fn locate_requires_explicit_file_to_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yml");
        assert!(Config::locate(Some(&missing), dir.path()).is_err());
    }
}

mod init {
    use super::*;

    #[test]
    fn init_template_resolves_with_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = init_config(dir.path(), None, false).unwrap();

        temp_env::with_vars(
            [
                ("AZURE_ACR_NAME", Some("myregistry")),
                ("AZURE_SUBSCRIPTION_ID", Some("sub")),
                ("AZURE_ACR_RESOURCE_GROUP", Some("rg")),
            ],
            || {
                let run = Config::load(&path)
                    .unwrap()
                    .resolve(&Overrides::default())
                    .unwrap();
                assert_eq!(run.registry.as_str(), "myregistry");
                assert_eq!(run.audit_dir, PathBuf::from("audits"));
            },
        );
    }

    #[test]
    fn init_rejects_invalid_registry() {
        let dir = tempfile::tempdir().unwrap();
        assert!(init_config(dir.path(), Some("bad_name"), false).is_err());
        assert!(!dir.path().join(CONFIG_FILENAME).exists());
    }

    #[test]
    fn init_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), Some("myregistry"), false).unwrap();
        assert!(matches!(
            init_config(dir.path(), Some("myregistry"), false),
            Err(Error::AlreadyExists(_))
        ));
        assert!(init_config(dir.path(), Some("myregistry"), true).is_ok());
    }
}
