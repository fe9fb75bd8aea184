//! Scriptable subcommands
//!
//! Each `run_*` function backs one `gcn` subcommand. They drive the same
//! controllers as the chat screen and print plain, colored output.

use crate::api::{ChatMessageTurn, HttpBackend, LinkMetadata, ProductColor, ProductDraft};
use crate::auth::{AuthController, SignupForm};
use crate::chat::ChatSessionController;
use crate::config::{Config, MetadataConfig};
use crate::metadata::{MetadataCache, ResolverChain};
use crate::products::{info_preview, ProductCatalog};
use crate::session::{sample_queries, SessionContext};
use crate::status::StatusPoller;
use crate::tui::{run_chat_screen, ChatApp};
use crate::upload::{UploadController, UploadObserver, UploadOutcome};
use anyhow::{Context, Result};
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};

/// Everything a subcommand needs: config, backend client and session
pub struct CliContext {
    pub config: Config,
    pub backend: Arc<HttpBackend>,
    pub session: SessionContext,
}

impl CliContext {
    pub fn new(config: Config) -> Result<Self> {
        let backend = HttpBackend::new(&config.backend)
            .context("Invalid backend configuration")?
            .with_upload_chunk_size(config.upload.chunk_size);
        let session = SessionContext::for_data_dir(&Config::data_dir()?)
            .with_max_recent(config.session.max_recent_queries);
        Ok(Self {
            config,
            backend: Arc::new(backend),
            session,
        })
    }
}

fn seed() -> u64 {
    chrono::Utc::now().timestamp_millis().unsigned_abs()
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Run the interactive chat screen
pub async fn run_chat(ctx: CliContext, initial_message: Option<String>) -> Result<()> {
    let mut app = ChatApp::new(ctx.backend, &ctx.config, ctx.session, seed())?;
    if let Some(message) = initial_message {
        app.set_input(message);
    }
    run_chat_screen(app).await
}

/// Ask one question and print the answer
pub async fn run_ask(
    ctx: &mut CliContext,
    query: &str,
    chat_id: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut chat = ChatSessionController::new(ctx.backend.clone());

    if let Some(chat_id) = chat_id {
        chat.refresh_chats().await?;
        let target = chat
            .chats()
            .iter()
            .find(|c| c.chat_id == chat_id)
            .cloned()
            .with_context(|| format!("No chat with id {}", chat_id))?;
        chat.select_chat(target).await?;
    }

    let turn = chat.submit_query(query).await?;
    ctx.session.record_query(query);

    if json {
        println!("{}", serde_json::to_string_pretty(&turn)?);
        return Ok(());
    }

    let previews = LinkPreviews::from_config(&ctx.config.metadata);
    print_turn(&ctx.config, &previews, &turn).await;
    if let Some(id) = chat.active_chat_id() {
        println!(
            "{} {} ({})",
            "Chat:".dimmed(),
            chat.chat_name(),
            id.dimmed()
        );
    }
    Ok(())
}

async fn print_turn(config: &Config, previews: &LinkPreviews, turn: &ChatMessageTurn) {
    println!("{}\n", turn.answer);

    if !turn.pdf_references.is_empty() {
        println!("{}", "Sources".bold().cyan());
        for pdf in &turn.pdf_references {
            let pages: Vec<String> = pdf.sorted_pages().iter().map(u32::to_string).collect();
            println!("  • {} (p. {})", pdf.display_name(), pages.join(", "));
            for link in pdf.citation_links(&config.backend.base_url) {
                println!("    {}", link.dimmed());
            }
        }
        println!();
    }

    if !turn.online_links.is_empty() {
        println!("{}", "Links".bold().cyan());
        let resolved = previews.lookup(&turn.online_links).await;
        for (url, preview) in turn.online_links.iter().zip(resolved) {
            match preview {
                Some(meta) => {
                    println!("  • {}", meta.title.bold());
                    println!("    {}", info_preview(&meta.description));
                }
                None => println!("  •"),
            }
            println!("    {}", url.dimmed());
        }
        println!();
    }

    let videos = turn.video_embed_urls();
    if !videos.is_empty() {
        println!("{}", "Videos".bold().cyan());
        for video in videos {
            println!("  • {}", video);
        }
        println!();
    }

    if !turn.related_queries.is_empty() {
        println!("{}", "Related questions".bold().green());
        for related in &turn.related_queries {
            println!("  › {}", related);
        }
        println!();
    }
}

/// Link previews for the turns printed by one command
///
/// One cache serves every turn, so a link repeated across a transcript is
/// fetched once. Within a turn, link `i` waits `i * stagger`.
struct LinkPreviews {
    cache: MetadataCache,
    chain: Option<ResolverChain>,
    stagger: Duration,
}

impl LinkPreviews {
    fn from_config(config: &MetadataConfig) -> Self {
        let chain = if config.enabled {
            match ResolverChain::from_config(config) {
                Ok(chain) => Some(chain),
                Err(e) => {
                    tracing::warn!("Link previews unavailable: {:#}", e);
                    None
                }
            }
        } else {
            None
        };
        Self::new(chain, config.stagger())
    }

    fn new(chain: Option<ResolverChain>, stagger: Duration) -> Self {
        Self {
            cache: MetadataCache::new(),
            chain,
            stagger,
        }
    }

    async fn lookup(&self, links: &[String]) -> Vec<Option<LinkMetadata>> {
        let Some(chain) = &self.chain else {
            return vec![None; links.len()];
        };
        self.cache
            .resolve_staggered(links, chain, self.stagger)
            .await
            .into_iter()
            .map(Some)
            .collect()
    }
}

/// Print sample questions
pub fn run_suggest() {
    println!("{}", "Try asking:".bold());
    for query in sample_queries(seed(), 3) {
        println!("  › {}", query);
    }
}

#[derive(Tabled)]
struct ChatRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Products")]
    products: String,
}

pub async fn run_chats_list(ctx: &CliContext, search: Option<&str>) -> Result<()> {
    let mut chat = ChatSessionController::new(ctx.backend.clone());
    chat.refresh_chats().await?;

    let rows: Vec<ChatRow> = chat
        .filter_chats(search.unwrap_or(""))
        .into_iter()
        .map(|c| ChatRow {
            id: c.chat_id.clone(),
            name: c.display_name().to_string(),
            products: c
                .product_colors
                .iter()
                .map(|tag| tag.color.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();

    if rows.is_empty() {
        println!("{}", "No chats found.".yellow());
        return Ok(());
    }
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
    Ok(())
}

pub async fn run_chat_history(ctx: &CliContext, chat_id: &str) -> Result<()> {
    let mut chat = ChatSessionController::new(ctx.backend.clone());
    chat.refresh_chats().await?;
    let target = chat
        .chats()
        .iter()
        .find(|c| c.chat_id == chat_id)
        .cloned()
        .with_context(|| format!("No chat with id {}", chat_id))?;
    chat.select_chat(target).await?;

    println!("{}\n", chat.chat_name().bold());
    if chat.messages().is_empty() {
        println!("{}", "No messages.".yellow());
    }
    let previews = LinkPreviews::from_config(&ctx.config.metadata);
    for turn in chat.messages() {
        println!("{} {}", "You:".bold().cyan(), turn.query);
        print_turn(&ctx.config, &previews, turn).await;
    }
    Ok(())
}

pub async fn run_chat_delete(ctx: &CliContext, chat_id: &str) -> Result<()> {
    let mut chat = ChatSessionController::new(ctx.backend.clone());
    chat.refresh_chats().await?;
    chat.delete_chat(chat_id).await?;
    println!("{} Deleted chat {}", "✓".green(), chat_id);
    Ok(())
}

#[derive(Tabled)]
struct ProductRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Color")]
    color: String,
    #[tabled(rename = "Info")]
    info: String,
}

pub async fn run_products_list(ctx: &CliContext) -> Result<()> {
    let mut catalog = ProductCatalog::new(ctx.backend.clone());
    let products = catalog.refresh().await?;
    if products.is_empty() {
        println!("{}", "No products yet.".yellow());
        return Ok(());
    }
    let rows: Vec<ProductRow> = products
        .iter()
        .map(|p| ProductRow {
            id: p.id_string(),
            title: p.title.clone(),
            color: p.color.to_string(),
            info: info_preview(&p.info),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
    Ok(())
}

pub async fn run_product_add(
    ctx: &CliContext,
    title: &str,
    info: &str,
    color: ProductColor,
) -> Result<()> {
    let mut catalog = ProductCatalog::new(ctx.backend.clone());
    catalog
        .create(ProductDraft {
            title: title.to_string(),
            info: info.to_string(),
            color,
        })
        .await?;
    println!("{} Added product {}", "✓".green(), title.bold());
    Ok(())
}

pub async fn run_product_edit(
    ctx: &CliContext,
    id: &str,
    title: Option<String>,
    info: Option<String>,
    color: Option<ProductColor>,
) -> Result<()> {
    let mut catalog = ProductCatalog::new(ctx.backend.clone());
    catalog.refresh().await?;
    let current = catalog
        .find(id)
        .cloned()
        .with_context(|| format!("No product with id {}", id))?;

    let draft = ProductDraft {
        title: title.unwrap_or(current.title),
        info: info.unwrap_or(current.info),
        color: color.unwrap_or(current.color),
    };
    catalog.update(id, draft).await?;
    println!("{} Updated product {}", "✓".green(), id);
    Ok(())
}

pub async fn run_product_delete(ctx: &CliContext, id: &str) -> Result<()> {
    let mut catalog = ProductCatalog::new(ctx.backend.clone());
    catalog.delete(id).await?;
    println!("{} Deleted product {}", "✓".green(), id);
    Ok(())
}

#[derive(Tabled)]
struct DocumentRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Chunks")]
    chunks: String,
}

pub async fn run_docs_list(ctx: &CliContext, search: Option<&str>) -> Result<()> {
    let mut uploads = UploadController::new(ctx.backend.clone());
    uploads.refresh_documents().await?;

    let rows: Vec<DocumentRow> = uploads
        .filtered_documents(search.unwrap_or(""))
        .into_iter()
        .map(|d| DocumentRow {
            name: d.name.clone(),
            size: d.size_label(),
            chunks: d.chunks_label(),
        })
        .collect();
    if rows.is_empty() {
        println!("{}", "No documents found.".yellow());
        return Ok(());
    }
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
    Ok(())
}

pub async fn run_docs_upload(ctx: &CliContext, paths: Vec<PathBuf>) -> Result<()> {
    let mut uploads = UploadController::new(ctx.backend.clone());
    uploads.add_files(paths);
    for notice in uploads.notices() {
        eprintln!("{} {}", "!".yellow(), notice);
    }
    uploads.clear_notices();

    if uploads.queue().is_empty() {
        anyhow::bail!("Nothing to upload");
    }
    for item in uploads.queue() {
        println!("  {} ({})", item.name, item.size_label().dimmed());
    }

    let observer: UploadObserver = Arc::new(|name: &str, percent: u8| {
        print!("\r  {} {:>3}%", name, percent);
        let _ = io::stdout().flush();
        if percent == 100 {
            println!();
        }
    });
    let reports = uploads.upload_all(Some(observer)).await?;

    let failed = reports.iter().filter(|r| !r.is_success()).count();
    for report in &reports {
        if let UploadOutcome::Failed(reason) = &report.outcome {
            eprintln!("\n{} Failed to upload {}: {}", "✗".red(), report.name, reason);
        }
    }
    println!(
        "{} {} uploaded, {} failed; {} document(s) on the server",
        "✓".green(),
        reports.len() - failed,
        failed,
        uploads.documents().len()
    );
    if failed > 0 {
        anyhow::bail!("{} upload(s) failed", failed);
    }
    Ok(())
}

pub async fn run_docs_delete(ctx: &CliContext, name: &str, yes: bool) -> Result<()> {
    let mut uploads = UploadController::new(ctx.backend.clone());
    uploads.mark_for_delete(name);

    if !yes {
        let answer = prompt(&format!("Delete {}? [y/N] ", name.bold()))?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            uploads.cancel_delete();
            println!("Cancelled.");
            return Ok(());
        }
    }

    uploads.confirm_delete().await?;
    println!("{} Deleted {}", "✓".green(), name);
    Ok(())
}

pub async fn run_login(
    ctx: &mut CliContext,
    username: &str,
    password: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => prompt("Password: ")?,
    };
    let auth = AuthController::new(ctx.backend.clone());
    let identity = auth.login(&mut ctx.session, username, &password).await?;
    println!("{} Signed in as {}", "✓".green(), identity.username.bold());
    Ok(())
}

pub async fn run_signup(ctx: &CliContext, mut form: SignupForm) -> Result<()> {
    let auth = AuthController::new(ctx.backend.clone());

    if form.organization.trim().is_empty() {
        let orgs = auth.organizations().await;
        if !orgs.is_empty() {
            println!("Organizations:");
            for (i, org) in orgs.iter().enumerate() {
                println!("  {}. {}", i + 1, org);
            }
        }
        let choice = prompt("Organization (number or new name): ")?;
        form.organization = match choice.trim().parse::<usize>() {
            Ok(n) if n >= 1 && n <= orgs.len() => orgs[n - 1].clone(),
            _ => choice.trim().to_string(),
        };
    }
    if form.password.is_empty() {
        form.password = prompt("Password: ")?;
    }

    auth.signup(&form).await?;
    println!(
        "{} Account created for {}. Sign in with `gcn login {}`.",
        "✓".green(),
        form.username.bold(),
        form.username
    );
    Ok(())
}

pub fn run_logout(ctx: &mut CliContext) {
    let auth = AuthController::new(ctx.backend.clone());
    auth.logout(&mut ctx.session);
    println!("Signed out.");
}

pub fn run_whoami(ctx: &CliContext) {
    match ctx.session.identity() {
        Some(identity) => {
            println!("{} {}", "User:".bold(), identity.username);
            println!("{} {}", "ID:".bold(), identity.user_id);
            if let Some(email) = &identity.email {
                println!("{} {}", "Email:".bold(), email);
            }
            if let Some(org) = &identity.organization {
                println!("{} {}", "Organization:".bold(), org);
            }
        }
        None => println!("{}", "Not signed in.".yellow()),
    }
}

/// Print backend progress logs, optionally following new entries
pub async fn run_logs(ctx: &CliContext, follow: bool) -> Result<()> {
    use crate::api::LogApi;

    if !follow {
        let entries = ctx.backend.logs(0).await?;
        for entry in entries {
            println!("{:>6}  {}", entry.id.to_string().dimmed(), entry.message);
        }
        return Ok(());
    }

    let mut poller = StatusPoller::spawn(ctx.backend.clone(), &ctx.config.status);
    let mut banner = poller.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = banner.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = banner.borrow_and_update().clone();
                if current.visible {
                    let now = chrono::Local::now().format("%H:%M:%S");
                    println!("{} {}", now.to_string().dimmed(), current.message);
                }
            }
        }
    }
    poller.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MetadataResolver, ResolveError};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Records when each URL was requested
    #[derive(Default)]
    struct RecordingResolver {
        hits: Mutex<Vec<(String, Instant)>>,
    }

    #[async_trait]
    impl MetadataResolver for RecordingResolver {
        fn name(&self) -> &str {
            "recording"
        }

        async fn resolve(&self, url: &str) -> Result<LinkMetadata, ResolveError> {
            self.hits
                .lock()
                .unwrap()
                .push((url.to_string(), Instant::now()));
            Ok(LinkMetadata {
                title: format!("Title of {}", url),
                description: "desc".to_string(),
                image: None,
            })
        }
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|u| u.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_turn_links_are_fetched_one_stagger_apart() {
        let resolver = Arc::new(RecordingResolver::default());
        let chain = ResolverChain::new(vec![resolver.clone()]);
        let previews = LinkPreviews::new(Some(chain), Duration::from_secs(1));
        let start = Instant::now();

        let resolved = previews
            .lookup(&urls(&["https://a.example", "https://b.example", "https://c.example"]))
            .await;
        assert_eq!(resolved.len(), 3);
        assert_eq!(
            resolved[2].as_ref().map(|m| m.title.as_str()),
            Some("Title of https://c.example")
        );

        let hits = resolver.hits.lock().unwrap().clone();
        assert_eq!(hits.len(), 3);
        for (i, (_, at)) in hits.iter().enumerate() {
            let offset = at.duration_since(start);
            assert!(offset >= Duration::from_secs(i as u64), "link {} at {:?}", i, offset);
            assert!(offset < Duration::from_secs(i as u64) + Duration::from_millis(10));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_links_repeated_across_turns_are_fetched_once() {
        let resolver = Arc::new(RecordingResolver::default());
        let chain = ResolverChain::new(vec![resolver.clone()]);
        let previews = LinkPreviews::new(Some(chain), Duration::from_secs(1));

        previews
            .lookup(&urls(&["https://fda.example", "https://ema.example"]))
            .await;
        let second = previews
            .lookup(&urls(&["https://ema.example", "https://iso.example"]))
            .await;

        assert_eq!(
            second[0].as_ref().map(|m| m.title.as_str()),
            Some("Title of https://ema.example")
        );
        let fetched: Vec<String> = resolver
            .hits
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect();
        assert_eq!(
            fetched,
            vec!["https://fda.example", "https://ema.example", "https://iso.example"]
        );
    }

    #[tokio::test]
    async fn test_disabled_previews_resolve_nothing() {
        let config = MetadataConfig {
            enabled: false,
            ..Default::default()
        };
        let previews = LinkPreviews::from_config(&config);
        assert_eq!(previews.lookup(&urls(&["https://a.example"])).await, vec![None]);
    }
}
