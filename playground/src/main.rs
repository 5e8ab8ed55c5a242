//! DingleBob playground client.
//!
//! Keeps a project tree in `.playground/tree.json`, edits it through
//! subcommands, and runs it on a remote execution server with the program
//! output streamed to stdout.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::pin::pin;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use playground::controller::SessionController;
use playground::core::flat::flatten;
use playground::core::path::path_of;
use playground::core::samples::{DEFAULT_SAMPLE, SAMPLE_NAMES, sample};
use playground::core::sanitize::strip_ansi;
use playground::core::session::{CANCELLED_MARKER, SessionEvent};
use playground::exit_codes;
use playground::io::config::{CONFIG_PATH, ClientConfig, TransportMode, load_config, write_config};
use playground::io::disk::{export_dir, import_dir};
use playground::io::snapshot::SnapshotStore;
use playground::io::transport::{Connector, HttpConnector, WebSocketConnector};
use playground::logging;
use playground::tree::{Node, NodeId, ProjectTree};
use playground::workspace::Workspace;

#[derive(Parser)]
#[command(
    name = "playground",
    version,
    about = "Edit a DingleBob project locally and run it on a remote execution server"
)]
struct Cli {
    /// Project directory holding `.playground/`.
    #[arg(long, global = true, default_value = ".")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a project from a bundled sample and write the default config.
    Init {
        /// Sample to start from (see `playground samples`).
        #[arg(long, default_value = DEFAULT_SAMPLE)]
        sample: String,
        /// Overwrite an existing project and config.
        #[arg(short, long)]
        force: bool,
    },
    /// List the bundled samples.
    Samples,
    /// Print the project tree with node ids.
    Tree,
    /// Add a file, or a folder with `--folder`.
    ///
    /// Without `--parent` the node goes into the selected folder, or the root.
    Add {
        name: String,
        #[arg(long)]
        folder: bool,
        /// Id of the folder to add into.
        #[arg(long)]
        parent: Option<String>,
        /// Initial file content.
        #[arg(long, default_value = "", conflicts_with = "folder")]
        content: String,
    },
    /// Delete a node and everything below it.
    Rm { id: String },
    /// Rename a node.
    Rename { id: String, name: String },
    /// Replace a file's content with `--file` or stdin. Defaults to the active file.
    Edit {
        id: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Toggle selection of a node. Selecting a file makes it active.
    Select { id: String },
    /// Print the project as a JSON `path -> content` map.
    Flatten,
    /// Replace the project with the contents of a directory.
    Import { path: PathBuf },
    /// Write the project files into a directory.
    Export { path: PathBuf },
    /// Run the project on the execution server and stream its output.
    Run {
        /// Use the non-streaming HTTP endpoint.
        #[arg(long)]
        http: bool,
    },
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let dir = cli.dir;
    match cli.command {
        Command::Init { sample, force } => cmd_init(&dir, &sample, force)?,
        Command::Samples => {
            for name in SAMPLE_NAMES {
                println!("{name}");
            }
        }
        Command::Tree => print!("{}", render_tree(&open_workspace(&dir)?.1)),
        Command::Add {
            name,
            folder,
            parent,
            content,
        } => cmd_add(&mut open_workspace(&dir)?.1, &name, folder, parent.as_deref(), &content)?,
        Command::Rm { id } => {
            let id = NodeId::new(id);
            if !open_workspace(&dir)?.1.delete(&id) {
                bail!("no node with id '{id}'");
            }
        }
        Command::Rename { id, name } => cmd_rename(&mut open_workspace(&dir)?.1, id, &name)?,
        Command::Edit { id, file } => cmd_edit(&mut open_workspace(&dir)?.1, id, file.as_deref())?,
        Command::Select { id } => {
            let id = NodeId::new(id);
            if !open_workspace(&dir)?.1.select(&id) {
                bail!("no node with id '{id}'");
            }
        }
        Command::Flatten => {
            let flat = flatten(open_workspace(&dir)?.1.tree());
            println!(
                "{}",
                serde_json::to_string_pretty(&flat).context("serialize flattened tree")?
            );
        }
        Command::Import { path } => {
            let tree = import_dir(&path)?;
            println!("imported {} root nodes from {}", tree.len(), path.display());
            open_workspace(&dir)?.1.replace_tree(tree);
        }
        Command::Export { path } => {
            let written = export_dir(open_workspace(&dir)?.1.tree(), &path)?;
            println!("wrote {written} files to {}", path.display());
        }
        Command::Run { http } => {
            let (cfg, mut workspace) = open_workspace(&dir)?;
            return cmd_run(&mut workspace, &cfg, http);
        }
    }
    Ok(exit_codes::OK)
}

/// Config and workspace of the project in `dir`.
fn open_workspace(dir: &Path) -> Result<(ClientConfig, Workspace)> {
    let cfg = load_config(&dir.join(CONFIG_PATH))?;
    let store = SnapshotStore::new(dir.join(&cfg.snapshot_path));
    let workspace = Workspace::open(store, cfg.main_file.clone());
    Ok((cfg, workspace))
}

fn cmd_init(dir: &Path, sample_name: &str, force: bool) -> Result<()> {
    let config_path = &dir.join(CONFIG_PATH);
    let Some(tree) = sample(sample_name) else {
        bail!(
            "unknown sample '{sample_name}' (available: {})",
            SAMPLE_NAMES.join(", ")
        );
    };

    if force || !config_path.exists() {
        write_config(config_path, &ClientConfig::default())?;
    }
    let cfg = load_config(config_path)?;
    let store = SnapshotStore::new(dir.join(&cfg.snapshot_path));
    if !force && store.path().exists() {
        println!("kept existing project at {}", store.path().display());
        return Ok(());
    }
    Workspace::with_tree(store, cfg.main_file, tree);
    println!("initialized '{sample_name}' project in {}", dir.display());
    Ok(())
}

fn cmd_add(
    workspace: &mut Workspace,
    name: &str,
    folder: bool,
    parent: Option<&str>,
    content: &str,
) -> Result<()> {
    let parent = parent.map(NodeId::new);
    let created = match (&parent, folder) {
        (Some(parent), true) => workspace.create_folder_in(Some(parent), name),
        (Some(parent), false) => workspace.create_file_in(Some(parent), name, content),
        (None, true) => workspace.create_folder(name),
        (None, false) => workspace.create_file(name, content),
    };
    let Some(id) = created else {
        match parent {
            Some(parent) => bail!("cannot add '{name}': '{parent}' is not a folder"),
            None => bail!("cannot add a node with a blank name"),
        }
    };
    let path = path_of(workspace.tree(), &id).unwrap_or_else(|| name.to_string());
    println!("{id}\t{path}");
    Ok(())
}

fn cmd_rename(workspace: &mut Workspace, id: String, name: &str) -> Result<()> {
    let id = NodeId::new(id);
    if !workspace.tree().contains(&id) {
        bail!("no node with id '{id}'");
    }
    if !workspace.rename(&id, name) {
        debug!(%id, "rename skipped");
    }
    Ok(())
}

fn cmd_edit(workspace: &mut Workspace, id: Option<String>, file: Option<&Path>) -> Result<()> {
    let id = match id {
        Some(id) => NodeId::new(id),
        None => workspace
            .active_file()
            .cloned()
            .context("no active file; pass a node id")?,
    };
    let content = match file {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read content from stdin")?;
            buf
        }
    };
    if !workspace.update_content(&id, &content) {
        bail!("no file with id '{id}'");
    }
    Ok(())
}

/// Indented listing with ids. Folders end in `/`; `*` marks the active file
/// and `>` the selected node.
fn render_tree(workspace: &Workspace) -> String {
    let mut out = String::new();
    render_nodes(workspace, workspace.tree().roots(), 0, &mut out);
    out
}

fn render_nodes(
    workspace: &Workspace,
    nodes: &[std::sync::Arc<Node>],
    depth: usize,
    out: &mut String,
) {
    for node in nodes {
        let active = if workspace.active_file() == Some(node.id()) { '*' } else { ' ' };
        let selected = if workspace.selected() == Some(node.id()) { '>' } else { ' ' };
        let suffix = if node.is_folder() { "/" } else { "" };
        let _ = writeln!(
            out,
            "{selected}{active} {indent}{name}{suffix}  [{id}]",
            indent = "  ".repeat(depth),
            name = node.name(),
            id = node.id(),
        );
        render_nodes(workspace, node.children(), depth + 1, out);
    }
}

fn cmd_run(workspace: &mut Workspace, cfg: &ClientConfig, http: bool) -> Result<i32> {
    let server = cfg.server_url()?;
    let mode = if http { TransportMode::Http } else { cfg.transport };
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    let tree = workspace.tree().clone();
    let outcome = match mode {
        TransportMode::WebSocket => {
            let connector = WebSocketConnector::new(&server)?;
            runtime.block_on(execute(connector, tree, cfg.strip_ansi))?
        }
        TransportMode::Http => {
            let connector = HttpConnector::new(&server, Some(cfg.http_timeout()))?;
            runtime.block_on(execute(connector, tree, cfg.strip_ansi))?
        }
    };

    match outcome {
        SessionEvent::Completed(tree) => {
            workspace.apply_result(tree);
            Ok(exit_codes::OK)
        }
        SessionEvent::Failed(message) => {
            println!("\nError: {message}");
            Ok(exit_codes::FAILED)
        }
        SessionEvent::Cancelled { .. } => {
            println!("{CANCELLED_MARKER}");
            Ok(exit_codes::CANCELLED)
        }
        SessionEvent::Output(_) => bail!("session ended on an output chunk"),
    }
}

/// Run one session, printing output chunks as they arrive. Ctrl-C stops the
/// session. Returns the terminal event.
async fn execute<C: Connector>(
    connector: C,
    tree: ProjectTree,
    sanitize: bool,
) -> Result<SessionEvent> {
    let mut controller = SessionController::new(connector);
    let (tx, mut rx) = mpsc::unbounded_channel::<SessionEvent>();
    controller.start(tree, tx);

    let mut stdout = std::io::stdout();
    let mut ctrl_c = pin!(tokio::signal::ctrl_c());
    let mut interrupted = false;
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(SessionEvent::Output(chunk)) => {
                    let text = if sanitize { strip_ansi(&chunk) } else { Cow::Borrowed(chunk.as_str()) };
                    stdout.write_all(text.as_bytes()).context("write output")?;
                    stdout.flush().context("flush output")?;
                }
                Some(terminal) => {
                    controller.wait().await;
                    return Ok(terminal);
                }
                None => bail!("session ended without an outcome"),
            },
            signal = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                match signal {
                    Ok(()) => {
                        controller.stop().await;
                    }
                    Err(err) => warn!(error = %err, "cannot listen for Ctrl-C"),
                }
            }
        }
    }
}
