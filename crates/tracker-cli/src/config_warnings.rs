use tracker_config::TrackerConfig;

/// Emit warnings for likely mistyped env var keys that silently fell back to defaults.
pub fn warn_unconfigured(config: &TrackerConfig) {
    for warning in collect_unconfigured_warnings(config, std::env::vars()) {
        tracing::warn!("{warning}");
    }
}

fn collect_unconfigured_warnings<I>(config: &TrackerConfig, env: I) -> Vec<String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let env_keys = env.into_iter().map(|(key, _)| key).collect::<Vec<_>>();

    let sections: [(&str, bool, &str, &[&str]); 3] = [
        (
            "Scheduling",
            config.scheduling.is_configured(),
            "TRACKER_SCHEDULING",
            &["API_KEY", "BASE_URL"],
        ),
        (
            "Code host",
            config.code_host.is_configured(),
            "TRACKER_CODE_HOST",
            &["KEY", "BASE_URL"],
        ),
        (
            "CRM",
            config.crm.is_configured(),
            "TRACKER_CRM",
            &["USER", "KEY", "CLIENT_ID", "CLIENT_SECRET"],
        ),
    ];

    let mut warnings = Vec::new();
    for (name, configured, prefix, fields) in sections {
        if configured {
            continue;
        }
        if let Some(field) = fields
            .iter()
            .find(|field| env_keys.contains(&format!("{prefix}_{field}")))
        {
            warnings.push(format!(
                "{name} config appears default while {prefix}_{field} is set. Use double underscores (example: {prefix}__{field})."
            ));
        }
    }
    warnings
}
