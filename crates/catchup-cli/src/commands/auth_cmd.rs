use catchup_core::auth::RefreshError;

use crate::cli::AuthCommands;
use crate::commands::common::{format_expiry, open_client};
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        AuthCommands::Login {
            profile,
            email,
            password,
        } => {
            let (profile_name, client) = open_client(profile.as_deref().or(global_profile))?;
            client.auth().login(&email, &password).await?;
            println!(
                "Signed in profile '{}' as {} (expires_at={})",
                profile_name,
                email.trim(),
                format_expiry(client.tokens().access_token_expiry())
            );
            if !client.tokens().is_persistent() {
                println!("Keychain unavailable: the session will not outlive this process.");
            }
            Ok(())
        }
        AuthCommands::Status { profile } => {
            let (profile_name, client) = open_client(profile.as_deref().or(global_profile))?;
            match client.auth().restore_session().await {
                Ok(true) => println!(
                    "Profile '{}' is signed in (expires_at={})",
                    profile_name,
                    format_expiry(client.tokens().access_token_expiry())
                ),
                Ok(false) => println!("Profile '{profile_name}' is not signed in."),
                Err(RefreshError::GracePeriodExceeded { expired_for, .. }) => println!(
                    "Profile '{profile_name}' session expired {expired_for}s ago. Sign in again."
                ),
                Err(error) => return Err(error.into()),
            }
            Ok(())
        }
        AuthCommands::Logout { profile } => {
            let (profile_name, client) = open_client(profile.as_deref().or(global_profile))?;
            client.auth().logout();
            println!("Signed out profile '{profile_name}'");
            Ok(())
        }
    }
}
