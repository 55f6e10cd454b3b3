//! Command-line interface over the mnemo knowledge-memory engine.
//!
//! Thin transport: every subcommand maps onto exactly one
//! `mnemo_core::service::MemoryService` call and prints its result as
//! JSON, matching the `{success, ...}` / `{success: false, error}`
//! envelope the engine's error taxonomy is designed to produce.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use mnemo_core::model::{LineageDirection, MemoryType, RelationType, StoreMemoryInput};
use mnemo_core::{Config, Mnemo};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mnemo", version, about = "Local knowledge-memory store")]
struct Cli {
    /// Override the default data directory.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a new memory.
    Store {
        content: String,
        #[arg(long, default_value = "default")]
        context: String,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long, default_value = "insight")]
        r#type: String,
        #[arg(long)]
        painful: Option<bool>,
        #[arg(long)]
        time_cost_hours: Option<f64>,
        #[arg(long, default_value_t = true)]
        auto_analyze: bool,
    },
    /// Recall memories by semantic similarity.
    Recall {
        query: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
        #[arg(long)]
        context: Option<String>,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long)]
        r#type: Option<String>,
        #[arg(long, default_value_t = true)]
        touch: bool,
    },
    /// List memories, most recent first.
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        context: Option<String>,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long)]
        r#type: Option<String>,
    },
    /// Fetch a single memory by id.
    Get { id: String },
    /// Update a memory's content, tags, or type.
    Update {
        id: String,
        #[arg(long)]
        content: Option<String>,
        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
        #[arg(long)]
        r#type: Option<String>,
    },
    /// Delete a memory.
    Delete { id: String },
    /// Create a typed link between two memories.
    Link {
        source: String,
        target: String,
        #[arg(long, default_value = "related")]
        relation: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Remove a link between two memories.
    Unlink { source: String, target: String },
    /// Explore a memory's linked, tag-sibling, and context-sibling neighbors.
    Explore {
        id: String,
        #[arg(long, default_value_t = true)]
        tag_siblings: bool,
        #[arg(long, default_value_t = true)]
        context_siblings: bool,
        #[arg(long, default_value_t = 5)]
        max_per_category: usize,
    },
    /// Print aggregate statistics.
    Stats,
    /// Run the knowledge-base health analyzer.
    Analyze,
    /// Cluster frequent (or tag-filtered) memories into patterns.
    Consolidate {
        #[arg(long)]
        tag: Option<String>,
        #[arg(long, default_value_t = 3)]
        min_cluster_size: usize,
        #[arg(long, default_value_t = 0.75)]
        similarity_threshold: f64,
    },
    /// Trace ancestry/descendancy through typed relations.
    Lineage {
        id: String,
        #[arg(long, default_value = "backward")]
        direction: String,
        #[arg(long, default_value_t = 10)]
        max_depth: u32,
    },
    /// Run one foreground consolidation pass (what the detached worker also runs).
    Dream,
    /// Spawn a detached dream worker and return immediately.
    Sleep,
    /// Health check: always succeeds if the store is reachable.
    Ping,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    match cli.command {
        Command::Dream => return run_dream(&config),
        Command::Sleep => return run_sleep(&config),
        _ => {}
    }

    let mnemo = Mnemo::open(config)?;
    let service = mnemo.service();

    let output = match cli.command {
        Command::Store {
            content,
            context,
            tags,
            r#type,
            painful,
            time_cost_hours,
            auto_analyze,
        } => {
            let memory_type = parse_memory_type(&r#type)?;
            let result = service.store_memory(StoreMemoryInput {
                content,
                context_name: context,
                tags,
                memory_type,
                is_painful: painful,
                time_cost_hours,
                auto_analyze,
            })?;
            serde_json::to_value(result)?
        }
        Command::Recall {
            query,
            limit,
            context,
            tags,
            r#type,
            touch,
        } => {
            let type_filter = r#type.as_deref().map(parse_memory_type).transpose()?;
            let tag_filter = non_empty(tags);
            let (memories, total_found) = service.recall_memories(
                &query,
                limit,
                context.as_deref(),
                tag_filter.as_deref(),
                type_filter,
                touch,
            )?;
            serde_json::json!({ "memories": memories, "totalFound": total_found })
        }
        Command::List {
            limit,
            offset,
            context,
            tags,
            r#type,
        } => {
            let type_filter = r#type.as_deref().map(parse_memory_type).transpose()?;
            let tag_filter = non_empty(tags);
            let (memories, total_count, has_more) =
                service.list_memories(limit, offset, context.as_deref(), tag_filter.as_deref(), type_filter)?;
            serde_json::json!({ "memories": memories, "totalCount": total_count, "hasMore": has_more })
        }
        Command::Get { id } => match service.get_memory(&id)? {
            Some(memory) => serde_json::to_value(memory)?,
            None => serde_json::json!({ "memory": null }),
        },
        Command::Update { id, content, tags, r#type } => {
            let memory_type = r#type.as_deref().map(parse_memory_type).transpose()?;
            let (success, changes, summary) =
                service.update_memory(&id, content.as_deref(), tags.as_deref(), memory_type)?;
            serde_json::json!({ "success": success, "changes": changes, "summary": summary })
        }
        Command::Delete { id } => {
            let success = service.delete_memory(&id)?;
            serde_json::json!({ "success": success })
        }
        Command::Link { source, target, relation, reason } => {
            let relation_type = parse_relation_type(&relation)?;
            service.link_memories(&source, &target, relation_type, reason.as_deref())?;
            serde_json::json!({ "success": true })
        }
        Command::Unlink { source, target } => {
            let success = service.unlink_memories(&source, &target)?;
            serde_json::json!({ "success": success })
        }
        Command::Explore { id, tag_siblings, context_siblings, max_per_category } => {
            let result = service.explore_related(&id, tag_siblings, context_siblings, max_per_category)?;
            serde_json::to_value(result)?
        }
        Command::Stats => serde_json::to_value(service.get_stats()?)?,
        Command::Analyze => serde_json::to_value(service.analyze_knowledge()?)?,
        Command::Consolidate { tag, min_cluster_size, similarity_threshold } => {
            serde_json::to_value(service.consolidate_patterns(tag.as_deref(), min_cluster_size, similarity_threshold)?)?
        }
        Command::Lineage { id, direction, max_depth } => {
            let direction = parse_direction(&direction)?;
            let nodes = service.trace_lineage(&id, direction, None, max_depth)?;
            serde_json::to_value(nodes)?
        }
        Command::Ping => serde_json::json!({ "ok": true }),
        Command::Dream | Command::Sleep => unreachable!("handled before opening the store"),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_dream(config: &Config) -> Result<()> {
    let mnemo = Mnemo::open(config.clone())?;
    let worker = mnemo_core::dream::DreamWorker::new(config);
    let report = worker.run(mnemo.service())?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_sleep(config: &Config) -> Result<()> {
    let lock_path = config.dream_lock_path();
    let status = if mnemo_core::dream::is_dreamer_running(&lock_path) {
        "already_running"
    } else {
        let exe = std::env::current_exe().context("resolving current executable path")?;
        let log_path = config.data_dir.join("logs").join("dream.log");
        match mnemo_core::dream::spawn_detached(&exe, &config.data_dir, Some(&log_path)) {
            Ok(true) => "spawned",
            _ => "failed",
        }
    };
    println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "status": status }))?);
    Ok(())
}

fn parse_memory_type(s: &str) -> Result<MemoryType> {
    MemoryType::parse_name(s).ok_or_else(|| anyhow!("unknown memory type '{s}'"))
}

fn parse_relation_type(s: &str) -> Result<RelationType> {
    RelationType::parse_name(s).ok_or_else(|| anyhow!("unknown relation type '{s}'"))
}

fn parse_direction(s: &str) -> Result<LineageDirection> {
    match s {
        "backward" => Ok(LineageDirection::Backward),
        "forward" => Ok(LineageDirection::Forward),
        other => Err(anyhow!("unknown lineage direction '{other}' (expected backward|forward)")),
    }
}

fn non_empty(tags: Vec<String>) -> Option<Vec<String>> {
    if tags.is_empty() {
        None
    } else {
        Some(tags)
    }
}
