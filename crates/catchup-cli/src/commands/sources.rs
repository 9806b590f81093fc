use catchup_core::models::{CreateSourceInput, UpdateSourceInput};
use catchup_core::SourceId;

use crate::cli::SourceCommands;
use crate::commands::common::{
    format_source_line, format_source_lines, open_client, require_session,
};
use crate::error::CliError;

pub async fn run_sources(
    command: SourceCommands,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    let (profile_name, client) = open_client(global_profile)?;
    require_session(&profile_name, &client).await?;
    let sources = client.sources();

    match command {
        SourceCommands::List { json } => {
            let listed = sources.list().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&listed)?);
            } else if listed.is_empty() {
                println!(
                    "No sources configured. Add one with `catchup sources add <name> <feed-url>`."
                );
            } else {
                for line in format_source_lines(&listed) {
                    println!("{line}");
                }
            }
        }
        SourceCommands::Show { id, json } => {
            let source = sources.get(SourceId(id)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&source)?);
            } else {
                println!("{}", format_source_line(&source));
            }
        }
        SourceCommands::Add { name, feed_url } => {
            let created = sources
                .create(&CreateSourceInput::new(name, feed_url))
                .await?;
            println!("Added source {} ({})", created.id, created.name);
        }
        SourceCommands::Update {
            id,
            name,
            feed_url,
            resume,
            pause,
        } => {
            let input = update_input(name, feed_url, resume, pause)?;
            let updated = sources.update(SourceId(id), &input).await?;
            println!("Updated source {}", format_source_line(&updated));
        }
        SourceCommands::Delete { id } => {
            sources.delete(SourceId(id)).await?;
            println!("Deleted source {id}");
        }
    }

    Ok(())
}

pub fn update_input(
    name: Option<String>,
    feed_url: Option<String>,
    resume: bool,
    pause: bool,
) -> Result<UpdateSourceInput, CliError> {
    let active = match (resume, pause) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    };
    let input = UpdateSourceInput {
        name,
        feed_url,
        active,
    };
    if input.is_empty() {
        return Err(CliError::EmptyUpdate);
    }
    Ok(input)
}
