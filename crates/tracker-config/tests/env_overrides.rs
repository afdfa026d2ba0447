use figment::Jail;
use tracker_config::TrackerConfig;

#[test]
fn secrets_come_from_prefixed_env() {
    Jail::expect_with(|jail| {
        jail.set_env("TRACKER_DATABASE__PASSWORD", "db-pass");
        jail.set_env("TRACKER_SCHEDULING__API_KEY", "pike-key");
        jail.set_env("TRACKER_CRM__USER", "import@example.org");
        jail.set_env("TRACKER_CRM__KEY", "crm-key");
        jail.set_env("TRACKER_CODE_HOST__KEY", "ghp_token");

        let config = TrackerConfig::load().map_err(|e| e.to_string())?;
        assert_eq!(config.database.password, "db-pass");
        assert_eq!(config.scheduling.api_key, "pike-key");
        assert_eq!(config.crm.user, "import@example.org");
        assert_eq!(config.crm.key, "crm-key");
        assert_eq!(config.code_host.key, "ghp_token");
        Ok(())
    });
}

#[test]
fn env_beats_project_toml() {
    Jail::expect_with(|jail| {
        jail.create_dir(".tracker")?;
        jail.create_file(
            ".tracker/config.toml",
            r#"
[import]
schedule_future_days = 60
log_retention_days = 14
"#,
        )?;
        jail.set_env("TRACKER_IMPORT__LOG_RETENTION_DAYS", "30");

        let config = TrackerConfig::load().map_err(|e| e.to_string())?;
        assert_eq!(config.import.schedule_future_days, 60);
        assert_eq!(config.import.log_retention_days, 30);
        assert_eq!(config.import.attendance_past_days, 7);
        Ok(())
    });
}

#[test]
fn import_check_passes_with_all_credentials() {
    Jail::expect_with(|jail| {
        jail.set_env("TRACKER_SCHEDULING__API_KEY", "pike-key");
        jail.set_env("TRACKER_CODE_HOST__KEY", "ghp_token");

        let config = TrackerConfig::load().map_err(|e| e.to_string())?;
        assert!(config.require_import().is_ok());
        assert!(config.require_crm_export().is_err());
        Ok(())
    });
}
