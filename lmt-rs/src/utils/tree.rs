//! Tree rendering for animation block structure

use console::Style;

use super::format::format_bytes;

/// A node in a rendered tree
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub name: String,
    pub node_type: NodeType,
    pub size: Option<u64>,
    pub children: Vec<TreeNode>,
    /// Shown in insertion order
    pub metadata: Vec<(String, String)>,
}

/// Kinds of nodes in a block tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Root,
    Header,
    Channel,
    Bounds,
    Events,
    Event,
    Parameter,
    Data,
}

/// Options for tree rendering
#[derive(Debug, Clone, Default)]
pub struct TreeOptions {
    pub max_depth: Option<usize>,
    pub no_color: bool,
    pub show_metadata: bool,
    pub compact: bool,
}

impl TreeNode {
    pub fn new(name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            name: name.into(),
            node_type,
            size: None,
            children: Vec::new(),
            metadata: Vec::new(),
        }
    }

    pub fn add_child(mut self, child: TreeNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.push((key.to_string(), value.to_string()));
        self
    }
}

impl NodeType {
    pub fn icon(self) -> &'static str {
        match self {
            NodeType::Root => "📁",
            NodeType::Header => "📋",
            NodeType::Channel => "🦴",
            NodeType::Bounds => "📐",
            NodeType::Events => "📦",
            NodeType::Event => "🔔",
            NodeType::Parameter => "🏷️",
            NodeType::Data => "💾",
        }
    }

    pub fn style(self, no_color: bool) -> Style {
        if no_color {
            return Style::new();
        }
        match self {
            NodeType::Root => Style::new().bold().cyan(),
            NodeType::Header => Style::new().bold().yellow(),
            NodeType::Channel => Style::new().green(),
            NodeType::Bounds => Style::new().dim(),
            NodeType::Events => Style::new().blue(),
            NodeType::Event => Style::new().magenta(),
            NodeType::Parameter => Style::new().yellow(),
            NodeType::Data => Style::new().white(),
        }
    }
}

/// Render a tree structure to string
pub fn render_tree(root: &TreeNode, options: &TreeOptions) -> String {
    let mut output = String::new();
    render_node(root, &mut output, "", true, 0, options);
    output
}

fn render_node(
    node: &TreeNode,
    output: &mut String,
    prefix: &str,
    is_last: bool,
    depth: usize,
    options: &TreeOptions,
) {
    if options.max_depth.is_some_and(|max| depth > max) {
        return;
    }

    let connector = match (depth, is_last) {
        (0, _) => "",
        (_, true) => "└── ",
        (_, false) => "├── ",
    };
    let style = node.node_type.style(options.no_color);
    output.push_str(&format!(
        "{prefix}{connector}{} {}",
        node.node_type.icon(),
        style.apply_to(&node.name)
    ));

    if let Some(size) = node.size {
        output.push_str(&format!(" ({})", format_bytes(size)));
    }

    let show_metadata = options.show_metadata && !node.metadata.is_empty();
    if show_metadata && options.compact {
        let parts: Vec<String> = node
            .metadata
            .iter()
            .map(|(key, value)| format!("{key}:{value}"))
            .collect();
        output.push_str(&format!(" [{}]", parts.join(", ")));
    }
    output.push('\n');

    let child_prefix = match (depth, is_last) {
        (0, _) => String::new(),
        (_, true) => format!("{prefix}    "),
        (_, false) => format!("{prefix}│   "),
    };

    if show_metadata && !options.compact {
        let key_style = if options.no_color {
            Style::new()
        } else {
            Style::new().dim()
        };
        for (key, value) in &node.metadata {
            output.push_str(&format!(
                "{child_prefix}    {}: {value}\n",
                key_style.apply_to(key)
            ));
        }
    }

    for (i, child) in node.children.iter().enumerate() {
        render_node(
            child,
            output,
            &child_prefix,
            i == node.children.len() - 1,
            depth + 1,
            options,
        );
    }
}
