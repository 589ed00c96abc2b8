use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use ttrss_core::api::{
    ApiClient, ApiError, FeedUpdate, HeadlineSource, SubscribeOutcome, TtrssRemote,
};
use ttrss_core::config::Config;
use ttrss_core::util::{clean_title, fit_to_width};

const TITLE_WIDTH: usize = 72;

/// Get the default config file path (~/.config/ttrss/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("ttrss")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(name = "ttrss", about = "Command-line client for Tiny Tiny RSS")]
struct Args {
    /// Config file (default: ~/.config/ttrss/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Include read items in listings
    #[arg(long, short = 'a', global = true)]
    all: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List categories with unread counts
    Categories,
    /// List feeds in a category
    Feeds { category_id: i64 },
    /// List headlines of a feed (or a category with --category)
    Headlines {
        /// Feed id; defaults to all articles
        #[arg(default_value_t = HeadlineSource::ALL_ARTICLES, allow_negative_numbers = true)]
        id: i64,
        /// Treat the id as a category
        #[arg(long)]
        category: bool,
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Print an article's raw content
    Article {
        id: i64,
        /// Do not mark the article read after printing
        #[arg(long)]
        keep_unread: bool,
    },
    /// Mark an article read
    Read { id: i64 },
    /// Mark an article unread
    Unread { id: i64 },
    /// Star an article
    Star { id: i64 },
    /// Remove the star from an article
    Unstar { id: i64 },
    /// Mark every article in a feed (or category with --category) read
    Catchup {
        #[arg(allow_negative_numbers = true)]
        id: i64,
        #[arg(long)]
        category: bool,
    },
    /// Subscribe to a feed URL
    Subscribe {
        url: String,
        #[arg(long, default_value_t = 0)]
        category_id: i64,
    },
    /// Unsubscribe from a feed
    Unsubscribe { feed_id: i64 },
    /// Show a feed's title, URL and category
    FeedInfo { feed_id: i64 },
    /// Rename a feed or move it to another category
    EditFeed {
        feed_id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        category_id: Option<i64>,
    },
}

fn source(id: i64, category: bool) -> HeadlineSource {
    if category {
        HeadlineSource::Category(id)
    } else {
        HeadlineSource::Feed(id)
    }
}

fn print_row(id: i64, marker: &str, title: &str, count: Option<i64>) {
    let title = clean_title(title);
    let title = fit_to_width(&title, TITLE_WIDTH);
    match count {
        Some(n) if n > 0 => println!("{id:>8} {marker} {title} ({n})"),
        _ => println!("{id:>8} {marker} {title}"),
    }
}

async fn run(client: &ApiClient, args: &Args) -> Result<(), ApiError> {
    let include_read = args.all;
    match &args.command {
        Cmd::Categories => {
            let mut categories = client.list_categories(include_read).await?.to_vec();
            categories.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
            for c in &categories {
                print_row(c.id, " ", &c.title, Some(c.unread));
            }
        }
        Cmd::Feeds { category_id } => {
            for f in client.list_feeds(*category_id, include_read).await?.iter() {
                print_row(f.id, " ", &f.title, Some(f.unread));
            }
        }
        Cmd::Headlines {
            id,
            category,
            limit,
            offset,
        } => {
            let headlines = client
                .list_articles(source(*id, *category), include_read, *limit, *offset)
                .await?;
            for h in headlines.iter() {
                let marker = match (h.unread, h.marked) {
                    (_, true) => "*",
                    (true, false) => "N",
                    (false, false) => " ",
                };
                print_row(h.id, marker, &h.title, None);
            }
        }
        Cmd::Article { id, keep_unread } => {
            let article = client.get_article(*id).await?;
            println!("# {}", clean_title(&article.title));
            if !article.link.is_empty() {
                println!("{}", article.link);
            }
            println!();
            println!("{}", article.content);
            if !keep_unread && article.unread {
                client.set_read(*id, true).await?;
            }
        }
        Cmd::Read { id } => client.set_read(*id, true).await?,
        Cmd::Unread { id } => client.set_read(*id, false).await?,
        Cmd::Star { id } => client.set_starred(*id, true).await?,
        Cmd::Unstar { id } => client.set_starred(*id, false).await?,
        Cmd::Catchup { id, category } => client.mark_all_read(source(*id, *category)).await?,
        Cmd::Subscribe { url, category_id } => {
            match client.subscribe(url, *category_id).await? {
                SubscribeOutcome::Subscribed => println!("Subscribed to {url}"),
                SubscribeOutcome::AlreadySubscribed => println!("Already subscribed to {url}"),
                SubscribeOutcome::Rejected { code, message } => println!(
                    "Subscription rejected (code {code}){}",
                    message.map(|m| format!(": {m}")).unwrap_or_default()
                ),
            }
        }
        Cmd::Unsubscribe { feed_id } => client.unsubscribe(*feed_id).await?,
        Cmd::FeedInfo { feed_id } => {
            let feed = client.get_feed_properties(*feed_id).await?;
            println!("# {}", clean_title(&feed.title));
            if let Some(url) = &feed.feed_url {
                println!("url: {url}");
            }
            if let Some(category) = feed.cat_id {
                println!("category: {category}");
            }
            println!("unread: {}", feed.unread);
        }
        Cmd::EditFeed {
            feed_id,
            title,
            category_id,
        } => {
            let update = FeedUpdate {
                title: title.clone(),
                category_id: *category_id,
            };
            if update.is_empty() {
                eprintln!("Nothing to change: pass --title and/or --category-id");
            }
            client.update_feed_properties(*feed_id, &update).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so listings stay pipeable
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?
        .with_env_overrides();
    tracing::debug!(config = ?config, "Effective configuration");

    let credentials = config.credentials().context(
        "Invalid TT-RSS settings (set [ttrss] in the config file or TTRSS_* variables)",
    )?;
    let remote = TtrssRemote::with_timeout(
        credentials.api_url.clone(),
        Duration::from_secs(config.general.request_timeout_secs),
    )?;
    let client = ApiClient::new(remote, credentials, config.general.cache_size)?;

    if let Err(e) = client.login().await {
        if e.is_auth_failure() {
            eprintln!("Error: Could not log in to Tiny Tiny RSS. Check your credentials.");
            std::process::exit(1);
        }
        return Err(e).context("Failed to reach the TT-RSS server");
    }

    match run(&client, &args).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_auth_failure() => {
            eprintln!("Error: Session could not be re-established ({e}). Log in again.");
            std::process::exit(1);
        }
        Err(e) if e.is_retryable() => {
            eprintln!("Error: {e}. The server may be unreachable; try again.");
            std::process::exit(2);
        }
        Err(e) => Err(e.into()),
    }
}
