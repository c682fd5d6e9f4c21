use clap::Parser;

use just_make::{DepGraph, Makefile, MakefileOptions};

#[derive(Parser)]
#[command(name = "just-make")]
#[command(about = "GNU-make-compatible Makefile front end and dependency graph builder")]
#[command(version)]
struct Cli {
    /// Path to the root Makefile.
    #[arg(short = 'f', long = "file", default_value = "Makefile")]
    file: String,

    /// Print the resolved dep graph as JSON instead of a human-readable tree.
    #[arg(long = "print-graph")]
    print_graph: bool,

    /// Target names and `NAME=VALUE` command-line variable overrides, in
    /// any order.
    #[arg()]
    args: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    let mut command_line_vars = Vec::new();
    let mut targets = Vec::new();
    for arg in &cli.args {
        match arg.split_once('=') {
            Some((name, value)) => command_line_vars.push((name.to_string(), value.to_string())),
            None => targets.push(arg.clone()),
        }
    }

    let options = MakefileOptions { command_line_vars, ..Default::default() };

    let mut makefile = match Makefile::load(&cli.file, options) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("just-make: {e}");
            std::process::exit(2);
        }
    };

    let requested: Vec<_> = targets.iter().map(|t| makefile.target(t)).collect();

    match makefile.build_graph(&requested) {
        Ok(graph) => {
            for w in &makefile.warnings {
                eprintln!("{w}");
            }
            if cli.print_graph {
                println!("{}", serde_json::to_string_pretty(&graph_to_json(&graph, &makefile)).unwrap());
            } else {
                print_graph_tree(&graph, &makefile);
            }
        }
        Err(e) => {
            for w in &makefile.warnings {
                eprintln!("{w}");
            }
            eprintln!("just-make: {e}");
            std::process::exit(2);
        }
    }
}

fn graph_to_json(graph: &DepGraph, makefile: &Makefile) -> serde_json::Value {
    let nodes: Vec<serde_json::Value> = graph
        .iter()
        .map(|(id, node)| {
            serde_json::json!({
                "id": id.0,
                "output": makefile.symtab.name_str(node.output),
                "inputs": node.actual_inputs.iter().map(|&s| makefile.symtab.name_str(s)).collect::<Vec<_>>(),
                "order_only_inputs": node.actual_order_only_inputs.iter().map(|&s| makefile.symtab.name_str(s)).collect::<Vec<_>>(),
                "deps": node.deps.iter().map(|d| d.0).collect::<Vec<_>>(),
                "order_onlys": node.order_onlys.iter().map(|d| d.0).collect::<Vec<_>>(),
                "commands": node.commands.iter().map(|v| v.to_string()).collect::<Vec<_>>(),
                "is_phony": node.is_phony,
                "is_double_colon": node.is_double_colon,
                "is_default_target": node.is_default_target,
            })
        })
        .collect();
    serde_json::json!({
        "roots": graph.roots.iter().map(|r| r.0).collect::<Vec<_>>(),
        "default_target": graph.default_target.map(|s| makefile.symtab.name_str(s)),
        "nodes": nodes,
    })
}

fn print_graph_tree(graph: &DepGraph, makefile: &Makefile) {
    for &root in &graph.roots {
        print_node(graph, makefile, root, 0);
    }
}

fn print_node(graph: &DepGraph, makefile: &Makefile, id: just_make::NodeId, depth: usize) {
    let node = graph.node(id);
    let indent = "  ".repeat(depth);
    let marker = if node.is_phony { " (phony)" } else { "" };
    println!("{indent}{}{marker}", makefile.symtab.name_str(node.output));
    for &dep in &node.deps {
        print_node(graph, makefile, dep, depth + 1);
    }
    for &dep in &node.order_onlys {
        print_node(graph, makefile, dep, depth + 1);
    }
}
