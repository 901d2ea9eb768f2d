//! Typed nginx configuration tree.
//!
//! nginx configuration is represented as a tree of directives rather than
//! strings. Each node is either a directive (name, arguments, optional
//! block of child nodes) or a comment line. Rendering is deterministic so
//! regenerating from unchanged input yields byte-identical output, which
//! lets the supervisor skip pointless reloads by comparing file contents.

use std::fmt;

/// Indentation applied per nesting level when rendering.
const INDENT: &str = "    ";

/// One node in the configuration tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveNode {
    Directive(Directive),
    Comment(String),
}

/// A single nginx directive, simple or block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub args: Vec<String>,
    /// `Some` makes this a block directive, even when the block is empty.
    pub block: Option<Vec<DirectiveNode>>,
}

impl Directive {
    /// A simple directive, rendered as `name args...;`.
    pub fn simple(name: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            block: None,
        }
    }

    /// A block directive, rendered as `name args... { children }`.
    pub fn block(name: &str, args: &[&str], children: Vec<DirectiveNode>) -> Self {
        Self {
            name: name.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            block: Some(children),
        }
    }
}

impl From<Directive> for DirectiveNode {
    fn from(directive: Directive) -> Self {
        DirectiveNode::Directive(directive)
    }
}

impl DirectiveNode {
    pub fn comment(text: impl Into<String>) -> Self {
        DirectiveNode::Comment(text.into())
    }
}

/// A complete nginx configuration: the ordered main context.
///
/// nginx has no named root directive, so the root of the tree is the
/// ordered sequence of top-level nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NginxConf(pub Vec<DirectiveNode>);

impl NginxConf {
    /// Serialize the whole configuration file.
    pub fn render(&self) -> String {
        render_config(&self.0)
    }
}

impl fmt::Display for NginxConf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Render a sequence of nodes at the top nesting level.
pub fn render_config(nodes: &[DirectiveNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        render_node(node, 0, &mut out);
    }
    out
}

fn render_node(node: &DirectiveNode, depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    match node {
        DirectiveNode::Comment(text) => {
            out.push_str("# ");
            out.push_str(text);
            out.push('\n');
        }
        DirectiveNode::Directive(d) => {
            out.push_str(&d.name);
            for arg in &d.args {
                out.push(' ');
                push_arg(arg, out);
            }
            match &d.block {
                None => out.push_str(";\n"),
                Some(children) => {
                    out.push_str(" {\n");
                    for child in children {
                        render_node(child, depth + 1, out);
                    }
                    for _ in 0..depth {
                        out.push_str(INDENT);
                    }
                    out.push_str("}\n");
                }
            }
        }
    }
}

/// Quote an argument only when nginx would otherwise misparse it.
fn push_arg(arg: &str, out: &mut String) {
    let needs_quotes = arg.is_empty()
        || arg
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ';' | '{' | '}' | '#' | '"'));
    if needs_quotes {
        out.push('"');
        for c in arg.chars() {
            if c == '"' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('"');
    } else {
        out.push_str(arg);
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        render_node(&DirectiveNode::Directive(self.clone()), 0, &mut out);
        f.write_str(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_directive_renders_with_semicolon() {
        let tree = vec![Directive::simple("worker_processes", &["auto"]).into()];
        assert_eq!(render_config(&tree), "worker_processes auto;\n");
    }

    #[test]
    fn test_argless_directive() {
        let tree = vec![Directive::simple("internal", &[]).into()];
        assert_eq!(render_config(&tree), "internal;\n");
    }

    #[test]
    fn test_block_directive_indents_children() {
        let tree = vec![Directive::block(
            "events",
            &[],
            vec![Directive::simple("worker_connections", &["1024"]).into()],
        )
        .into()];
        assert_eq!(
            render_config(&tree),
            "events {\n    worker_connections 1024;\n}\n"
        );
    }

    #[test]
    fn test_nested_blocks() {
        let tree = vec![Directive::block(
            "http",
            &[],
            vec![Directive::block(
                "server",
                &[],
                vec![Directive::simple("listen", &["80"]).into()],
            )
            .into()],
        )
        .into()];
        assert_eq!(
            render_config(&tree),
            "http {\n    server {\n        listen 80;\n    }\n}\n"
        );
    }

    #[test]
    fn test_comment_node() {
        let tree = vec![
            DirectiveNode::comment("http://example.com/tiles/"),
            Directive::simple("listen", &["80"]).into(),
        ];
        assert_eq!(
            render_config(&tree),
            "# http://example.com/tiles/\nlisten 80;\n"
        );
    }

    #[test]
    fn test_empty_block_renders_braces() {
        let tree = vec![Directive::block("events", &[], vec![]).into()];
        assert_eq!(render_config(&tree), "events {\n}\n");
    }

    #[test]
    fn test_args_with_spaces_are_quoted() {
        let tree = vec![Directive::simple("log_format", &["main", "$remote_addr [$time_local]"]).into()];
        assert_eq!(
            render_config(&tree),
            "log_format main \"$remote_addr [$time_local]\";\n"
        );
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let tree = vec![
            Directive::simple("user", &["nginx"]).into(),
            Directive::block(
                "http",
                &[],
                vec![Directive::simple("access_log", &["/dev/stdout"]).into()],
            )
            .into(),
        ];
        assert_eq!(render_config(&tree), render_config(&tree));
    }

    #[test]
    fn test_conf_display_matches_render() {
        let conf = NginxConf(vec![
            Directive::simple("user", &["nginx"]).into(),
            Directive::simple("worker_processes", &["auto"]).into(),
        ]);
        assert_eq!(conf.to_string(), conf.render());
        assert_eq!(conf.render(), "user nginx;\nworker_processes auto;\n");
    }
}
