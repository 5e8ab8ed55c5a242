//! Bundled starter projects.

use crate::tree::{Node, ProjectTree};

/// Name of the sample used when nothing has been saved yet.
pub const DEFAULT_SAMPLE: &str = "default";

/// Every sample name accepted by [`sample`], in display order.
pub const SAMPLE_NAMES: [&str; 4] = [DEFAULT_SAMPLE, "algorithms", "file_io", "lambda_bank"];

const HELLO: &str = "print \"Hello from DingleBob!\";\n";

macro_rules! sample_file {
    ($dir:literal, $name:literal) => {
        Node::file(
            $name,
            include_str!(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/samples/",
                $dir,
                "/",
                $name
            )),
        )
    };
}

/// Build the named sample with freshly allocated ids.
pub fn sample(name: &str) -> Option<ProjectTree> {
    let nodes = match name {
        DEFAULT_SAMPLE => vec![Node::file("main.dingle", HELLO)],
        "algorithms" => vec![
            sample_file!("algorithms", "main.dingle"),
            sample_file!("algorithms", "sort.dingle"),
            sample_file!("algorithms", "search.dingle"),
        ],
        "file_io" => vec![
            sample_file!("file_io", "main.dingle"),
            sample_file!("file_io", "structs.dingle"),
        ],
        "lambda_bank" => vec![
            sample_file!("lambda_bank", "main.dingle"),
            sample_file!("lambda_bank", "account.dingle"),
        ],
        _ => return None,
    };
    Some(ProjectTree::from_nodes(nodes))
}

/// The project a fresh workspace starts with.
pub fn default_project() -> ProjectTree {
    ProjectTree::from_nodes(vec![Node::file("main.dingle", HELLO)])
}
