use catchup_core::config::normalize_base_url;

use crate::cli::ConfigCommands;
use crate::commands::common::client_config_for;
use crate::config_profiles::{normalize_text_option, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            api_base_url,
            no_activate,
        } => {
            let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = apply_config_init(
                &mut config,
                profile.as_deref().or(global_profile),
                api_base_url,
                no_activate,
            )?;
            let path = config.save().map_err(CliError::Config)?;
            println!(
                "Profile '{}' initialized at {}",
                profile_name,
                path.display()
            );
            println!(
                "Run `catchup auth login --profile {profile_name} --email <email>` to sign in."
            );
            Ok(())
        }
        ConfigCommands::Show { profile } => {
            let config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            let resolved = client_config_for(&config, &profile_name)?;
            let active = config.active_profile.as_deref() == Some(profile_name.as_str());
            let marker = if active { " (active)" } else { "" };
            println!("profile: {profile_name}{marker}");
            println!("api_base_url: {}", resolved.api_base_url);
            println!("request_timeout: {}ms", resolved.request_timeout.as_millis());
            let refresh = if resolved.token_refresh.enabled {
                "enabled"
            } else {
                "disabled"
            };
            println!(
                "token_refresh: {} (threshold {}s, grace {}s)",
                refresh,
                resolved.token_refresh.expiry_threshold_secs,
                resolved.token_refresh.grace_period_secs
            );
            Ok(())
        }
    }
}

/// Merge `config init` flags into `config`, returning the profile name touched.
pub fn apply_config_init(
    config: &mut CliProfilesConfig,
    profile_name: Option<&str>,
    api_base_url: Option<String>,
    no_activate: bool,
) -> Result<String, CliError> {
    let profile_name = config.resolve_profile_name(profile_name);
    let api_base_url = normalize_text_option(api_base_url)
        .map(|url| normalize_base_url(&url, "api_base_url"))
        .transpose()?;

    let profile = config.profile_mut_or_default(&profile_name);
    if let Some(url) = api_base_url {
        profile.api_base_url = Some(url);
    }

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }
    Ok(profile_name)
}
