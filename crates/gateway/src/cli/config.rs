use pw_domain::config::{Config, ConfigSeverity};
use pw_providers::read_credential;

/// Parse and validate the config, printing any issues and which
/// credentials are present. Returns `false` when errors were found.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    for (label, endpoint) in [("direct", &config.llm.direct), ("relay", &config.llm.relay)] {
        let state = if read_credential(&endpoint.api_key_env).is_some() {
            "set"
        } else {
            "not set"
        };
        println!("{label}: ${} {state}", endpoint.api_key_env);
    }

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }

    println!("\n{error_count} error(s), {warning_count} warning(s) in {config_path}");

    error_count == 0
}

/// Render the resolved config (with all defaults filled in) as TOML.
pub fn render(config: &Config) -> anyhow::Result<String> {
    toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("serializing config: {e}"))
}

pub fn show(config: &Config) -> anyhow::Result<()> {
    print!("{}", render(config)?);
    Ok(())
}
