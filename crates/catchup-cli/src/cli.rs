use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "catchup")]
#[command(about = "Read AI-summarized tech news and manage feed sources")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// CLI profile name for API endpoint and stored session
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the stored session
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Browse summarized articles
    #[command(alias = "a")]
    Articles {
        #[command(subcommand)]
        command: ArticleCommands,
    },
    /// Manage crawled feed sources
    #[command(alias = "s")]
    Sources {
        #[command(subcommand)]
        command: SourceCommands,
    },
    /// Manage CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Catchup Feed API base URL
        #[arg(long, value_name = "URL")]
        api_base_url: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved profile
    Show {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Login with email/password and store tokens in the keychain
    Login {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Account password
        #[arg(long, value_name = "PASSWORD", env = "CATCHUP_PASSWORD")]
        password: String,
    },
    /// Show auth status for profile, refreshing an expired token when possible
    Status {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
    /// Logout profile and clear stored tokens
    Logout {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ArticleCommands {
    /// List recent articles
    List {
        /// Number of articles to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Only show articles from this source
        #[arg(long, value_name = "ID")]
        source: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one article with its summary
    Show {
        /// Article ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum SourceCommands {
    /// List feed sources
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one source
    Show {
        /// Source ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Register a new feed source
    #[command(alias = "new")]
    Add {
        /// Display name
        name: String,
        /// RSS/Atom feed URL
        feed_url: String,
    },
    /// Update a source
    Update {
        /// Source ID
        id: i64,
        /// New display name
        #[arg(long)]
        name: Option<String>,
        /// New feed URL
        #[arg(long, value_name = "URL")]
        feed_url: Option<String>,
        /// Resume crawling
        #[arg(long, conflicts_with = "pause")]
        resume: bool,
        /// Stop crawling without deleting
        #[arg(long)]
        pause: bool,
    },
    /// Delete a source
    #[command(alias = "rm")]
    Delete {
        /// Source ID
        id: i64,
    },
}
