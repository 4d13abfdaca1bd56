use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use mdt::cache::DeckCache;
use mdt::cards;
use mdt::fetch::{Fetcher, RateLimit};
use mdt::hierarchy::{self, TagNode, TagTree};
use mdt::scrape;

#[derive(Parser)]
#[command(name = "mdt", about = "Tag Moxfield decks with Scryfall Tagger data")]
struct Cli {
    /// Outbound requests per second against the card services
    #[arg(long, default_value_t = 10)]
    rate_limit: u32,
    /// Directory for processed-deck cache files
    #[arg(long, default_value = "cache")]
    cache_dir: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download the oracle-id to tag-list map
    Tags {
        #[arg(long, default_value = "resources/card_tags.json")]
        out: PathBuf,
    },
    /// Download Tagger tree pages for every known tag (skips saved ones)
    Scrape {
        #[arg(long, default_value = "resources/card_tags.json")]
        tags: PathBuf,
        #[arg(long, default_value = "tag_trees")]
        out: PathBuf,
    },
    /// Merge scraped pages into the cleaned tag hierarchy
    Tree {
        #[arg(long, default_value = "tag_trees")]
        pages: PathBuf,
        #[arg(long, default_value = "resources/tag_tree.json")]
        out: PathBuf,
    },
    /// Print a deck's tag hierarchy, filtered to tags the deck uses
    Show {
        /// Deck id or full deck URL
        deck: String,
        #[arg(long, default_value = "resources/card_tags.json")]
        tags: PathBuf,
        #[arg(long, default_value = "resources/tag_tree.json")]
        tree: PathBuf,
    },
    /// Render the annotated deck string for a tag selection
    Render {
        /// Deck id or full deck URL
        deck: String,
        /// Checked tags, comma separated
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,
        #[arg(long, default_value = "resources/card_tags.json")]
        tags: PathBuf,
        #[arg(long, default_value = "resources/tag_tree.json")]
        tree: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    let cli = Cli::parse();
    let fetcher = Fetcher::new(RateLimit::per_second(cli.rate_limit))?;

    match cli.command {
        Command::Tags { out } => {
            let map = fetcher.card_tags()?;
            info!(oracle_ids = map.len(), "downloaded tag map");
            write_json(&out, &map)?;
        }
        Command::Scrape { tags, out } => {
            let card_tags = load_card_tags(&tags)?;
            let all_tags: BTreeSet<&String> = card_tags.values().flatten().collect();
            fs::create_dir_all(&out)?;
            for tag in all_tags {
                let page_path = out.join(format!("{tag}.html"));
                if page_path.exists() {
                    continue;
                }
                match fetcher.tag_page(tag) {
                    // pages with only a line or two carry no tree worth keeping
                    Ok(html) if scrape::extract_rows(&html).len() > 2 => {
                        fs::write(&page_path, html)?;
                    }
                    Ok(_) => {}
                    Err(err) => warn!(%tag, "tag page fetch failed: {err}"),
                }
            }
        }
        Command::Tree { pages, out } => {
            let fragments = scrape::fragments_from_dir(&pages)
                .with_context(|| format!("reading pages from {}", pages.display()))?;
            let tree = hierarchy::build_hierarchy(&fragments);
            info!(roots = tree.len(), fragments = fragments.len(), "built hierarchy");
            write_json(&out, &tree)?;
        }
        Command::Show { deck, tags, tree } => {
            let deck = load_deck(&cli.cache_dir, &fetcher, &tags, &deck)?;
            let tree = load_tree(&tree)?;
            let deck_tree = hierarchy::filter_hierarchy(&tree, &cards::unique_tags(&deck));
            print_tree(&deck_tree, 0);
        }
        Command::Render { deck, select, tags, tree } => {
            let mut deck = load_deck(&cli.cache_dir, &fetcher, &tags, &deck)?;
            let tree = load_tree(&tree)?;
            let checked: BTreeSet<String> = select.into_iter().collect();
            cards::apply_selection(&mut deck, &checked, &tree);
            println!("{}", cards::build_deck_string(&deck));
        }
    }

    Ok(())
}

fn load_deck(
    cache_dir: &Path,
    fetcher: &Fetcher,
    tags_path: &Path,
    deck_ref: &str,
) -> Result<cards::DeckMap> {
    let cache = DeckCache::new(cache_dir)?;
    let card_tags = load_card_tags(tags_path)?;
    Ok(mdt::load_deck(fetcher, &cache, &card_tags, deck_ref)?)
}

fn load_card_tags(path: &Path) -> Result<BTreeMap<String, BTreeSet<String>>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading tag map {} (run `mdt tags` first)", path.display()))?;
    Ok(serde_json::from_str(&contents)?)
}

fn load_tree(path: &Path) -> Result<TagTree> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading hierarchy {} (run `mdt tree` first)", path.display()))?;
    Ok(serde_json::from_str(&contents)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_vec_pretty(value)?)?;
    Ok(())
}

fn print_tree(tree: &TagTree, indent: usize) {
    for (name, node) in tree {
        println!("{}{name}", "  ".repeat(indent));
        if let TagNode::Branch(children) = node {
            print_tree(children, indent + 1);
        }
    }
}
