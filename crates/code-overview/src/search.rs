//! `ovw search`: filtered semantic retrieval over a project's overviews.
//!
//! The query is embedded by the store's embedder and ranked by cosine
//! similarity. Metadata constraints narrow the candidate set before
//! ranking; see [`build_filter`] for how flags combine.

use anyhow::Result;

use code_overview_core::filter::{build_filter, FilterOptions};
use code_overview_core::overview::{ContentType, META_FILE_PATH, META_NAME, META_TYPE};
use code_overview_core::search::{format_search_results, search_overviews};
use code_overview_core::store::StoredDocument;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::store::open_store;

/// Flags accepted by `ovw search`.
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub query: String,
    pub project: String,
    pub content_type: Option<ContentType>,
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub references: Vec<String>,
    pub limit: Option<usize>,
    /// Print only the joined document contents.
    pub raw: bool,
}

impl SearchArgs {
    fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            content_type: self.content_type,
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            references: self.references.clone(),
            project_name: Some(self.project.clone()),
        }
    }
}

/// Run a search against the configured store.
pub async fn search(config: &Config, args: &SearchArgs) -> Result<Vec<StoredDocument>> {
    let embedder = create_embedder(&config.embedding)?;
    let store = open_store(config, embedder).await?;

    let limit = args.limit.unwrap_or(config.retrieval.default_limit);
    let filter = build_filter(&args.filter_options());
    let results =
        search_overviews(store.as_ref(), &args.project, &args.query, limit, filter.as_ref())
            .await?;
    Ok(results)
}

/// CLI entry point for `ovw search`.
pub async fn run_search(config: &Config, args: &SearchArgs) -> Result<()> {
    let results = search(config, args).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    if args.raw {
        println!("{}", format_search_results(&results));
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        let field = |key: &str| result.metadata.get(key).map(String::as_str).unwrap_or("-");
        println!(
            "{}. [{:.2}] {} {} ({})",
            i + 1,
            result.score,
            field(META_TYPE),
            field(META_NAME),
            field(META_FILE_PATH)
        );
        for line in result.content.lines().take(3) {
            println!("    {}", line);
        }
        println!("    id: {}", result.id);
        println!();
    }

    Ok(())
}
