//! PlantUML graph of followed channels and the accounts they mention

use std::fs;
use std::path::PathBuf;

use clap::Args;
use grammers_tl_types as tl;
use tracing::info;

use crate::chat::list_channels;
use crate::commands::TelegramArgs;
use crate::config::Config;
use crate::error::Result;
use crate::graph::{build_graph, fetch_about, output_file_name, render_plantuml, ChannelInfo};
use crate::session::{get_client, SessionLock};

#[derive(Debug, Clone, Default, Args)]
pub struct GraphArgs {
    #[command(flatten)]
    pub telegram: TelegramArgs,

    /// Directory for the `.plantuml` file
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,
}

/// Name of the root node: first name, else username, else the numeric id.
pub fn root_name(user: &tl::enums::User) -> String {
    match user {
        tl::enums::User::User(u) => u
            .first_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| u.username.clone())
            .unwrap_or_else(|| u.id.to_string()),
        tl::enums::User::Empty(u) => u.id.to_string(),
    }
}

pub async fn run(args: &GraphArgs, config: &Config) -> Result<()> {
    let telegram = args.telegram.apply(&config.telegram);
    let _lock = SessionLock::for_session(&telegram)?;
    let client = get_client(&telegram).await?;

    let me = client.get_me().await?;
    let root = root_name(&me.raw);

    let mut channels = Vec::new();
    for (_, channel) in list_channels(&client, usize::MAX).await? {
        if config.graph.channels_ignore.contains(&channel.id) {
            continue;
        }
        let about = fetch_about(&client, &channel).await?;
        channels.push(ChannelInfo {
            id: channel.id,
            title: channel.title,
            about,
        });
    }

    let graph = build_graph(&root, &channels, &config.graph);
    let document = render_plantuml(&graph, &config.graph.title);

    let path = args.output_dir.join(output_file_name(&root));
    fs::write(&path, document)?;
    info!(
        nodes = graph.nodes().len(),
        edges = graph.edges().len(),
        "Graph written to {}",
        path.display()
    );
    println!("{}", path.display());
    Ok(())
}
