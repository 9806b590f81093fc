use catchup_core::{Article, ArticleId, SourceId};
use chrono::Utc;

use crate::cli::ArticleCommands;
use crate::commands::common::{
    article_to_list_item, format_article_detail, format_article_lines, open_client,
    require_session, ArticleListItem,
};
use crate::error::CliError;

pub async fn run_articles(
    command: ArticleCommands,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    let (profile_name, client) = open_client(global_profile)?;
    require_session(&profile_name, &client).await?;
    let articles = client.articles();

    match command {
        ArticleCommands::List {
            limit,
            source,
            json,
        } => {
            let listed = articles.list().await?;
            let selected = select_articles(&listed, source.map(SourceId), limit);
            let now = Utc::now();
            if json {
                let items = selected
                    .iter()
                    .map(|article| article_to_list_item(article, now))
                    .collect::<Vec<ArticleListItem>>();
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if selected.is_empty() {
                println!("No articles yet.");
            } else {
                for line in format_article_lines(&selected, now) {
                    println!("{line}");
                }
            }
        }
        ArticleCommands::Show { id, json } => {
            let article = articles.get(ArticleId(id)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&article)?);
            } else {
                println!("{}", format_article_detail(&article));
            }
        }
    }

    Ok(())
}

/// Newest first, optionally narrowed to one source, capped at `limit`.
pub fn select_articles(
    articles: &[Article],
    source: Option<SourceId>,
    limit: usize,
) -> Vec<Article> {
    let mut selected = articles
        .iter()
        .filter(|article| source.is_none_or(|id| article.source_id == id))
        .cloned()
        .collect::<Vec<_>>();
    selected.sort_by(|left, right| right.display_date().cmp(&left.display_date()));
    selected.truncate(limit);
    selected
}
