use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use bowerer_rs::fetch::DirectoryRegistry;
use bowerer_rs::relationship_resolver::ResolverStatus;
use bowerer_rs::tree::{DependencyNode, DependencyTree, NodeIndex};
use bowerer_rs::{BowererRsOptions, Endpoint, Project};

#[tokio::main]
async fn main() {
	let mut opts;

	/* Parse console input */
	let parsed_options = {
		let args: Vec<String> = std::env::args().collect();

		opts = getopts::Options::new();
		opts.optflag( "h", "help",         "Show help");
		opts.optflag( "v", "verbose",      "Increased vebosity");
		opts.optflag( "",  "production",   "Ignore devDependencies");
		opts.optflag( "",  "force",        "Resolve everything again, even if installed");
		opts.optflag( "",  "force-latest", "Settle conflicts by picking the highest version");
		opts.optopt(  "",  "cwd",          "Project directory", "DIR");
		opts.optopt(  "",  "registry",     "Package registry directory", "DIR");
		opts.parsing_style(getopts::ParsingStyle::FloatingFrees);

		let parsed_options = match opts.parse(&args[1..]) {
			Ok(m)  => { m }
			Err(e) => { println!("Unable to parse options: {}", e); return }
		};

		if parsed_options.opt_present("h") {
			eprintln!("{}", opts.usage("Usage: bowerer-rs-terminal [options] (list | resolve [endpoint...])"));
			return;
		}

		parsed_options
	};

	if parsed_options.opt_present("v") {
		env_logger::Builder::from_default_env()
			.filter_level(log::LevelFilter::Debug)
			.init();
	} else {
		env_logger::init();
	}

	let mut options = BowererRsOptions::default();
	if let Some(cwd) = parsed_options.opt_str("cwd") {
		options.set_cwd(PathBuf::from(cwd));
	}
	options.set_production(parsed_options.opt_present("production"));
	options.set_force(parsed_options.opt_present("force"));
	options.set_force_latest(parsed_options.opt_present("force-latest"));

	let registry = parsed_options.opt_str("registry")
		.map(PathBuf::from)
		.unwrap_or_else(|| options.cache_dir().join("packages"));

	let Some(command) = parsed_options.free.first() else {
		log::error!("No command given, try --help.");
		return;
	};

	let result = match command.as_str() {
		"list" => list(options),
		"resolve" => resolve(options, registry, &parsed_options.free[1..]).await,
		other => Err(Error::UnknownCommand(other.to_string())),
	};

	if let Err(e) = result {
		log::error!("{}", e);
		std::process::exit(1);
	}
}

fn list(options: BowererRsOptions) -> Result<(), Error> {
	let mut project = Project::new(options);
	let analysis = project.analyse()?;

	let tree = &analysis.tree;
	println!("{}", describe(tree.root_node()));
	let mut path = HashSet::new();
	print_children(tree, tree.root, 1, &mut path);
	Ok(())
}

fn print_children(tree: &DependencyTree, index: NodeIndex, depth: usize, path: &mut HashSet<NodeIndex>) {
	path.insert(index);
	for (_, child) in tree.dependencies(index) {
		let indent = "    ".repeat(depth);
		if path.contains(&child) {
			println!("{}{} (cycle)", indent, describe(&tree[child]));
			continue;
		}
		println!("{}{}", indent, describe(&tree[child]));
		print_children(tree, child, depth + 1, path);
	}
	path.remove(&index);
}

fn describe(node: &DependencyNode) -> String {
	let mut line = node.describe();
	let flags = [
		(node.missing, "missing"),
		(node.incompatible, "incompatible"),
		(node.different, "different"),
		(node.extraneous, "extraneous"),
		(node.linked, "linked"),
	];
	for (set, flag) in flags {
		if set {
			line.push_str(" [");
			line.push_str(flag);
			line.push(']');
		}
	}
	line
}

async fn resolve(options: BowererRsOptions, registry: PathBuf, endpoints: &[String]) -> Result<(), Error> {
	let endpoints = endpoints.iter()
		.map(|e| e.parse::<Endpoint>())
		.collect::<Result<Vec<_>, _>>()
		.map_err(bowerer_rs::Error::from)?;

	log::info!("Resolving against {}", registry.display());
	let components_dir = options.components_dir();
	let force = options.force();
	let mut project = Project::new(options);
	let finalized = project.install(endpoints, Arc::new(DirectoryRegistry::new(registry))).await?;

	println!("Elected packages:");
	for (name, node) in finalized.plan().iter() {
		println!("\t{} {}", name, node.release().unwrap_or("?"));
	}

	println!("Install order:");
	let install_set = finalized.install_set(&components_dir, force);
	for name in finalized.install_order() {
		let marker = if install_set.contains(&name) { "+" } else { " " };
		println!("\t{} {}", marker, name);
	}

	for failure in finalized.failures() {
		println!("Failed: {}", failure);
	}

	match finalized.status() {
		ResolverStatus::Converged => {
			println!("Resolver complete.");
			Ok(())
		},
		ResolverStatus::ConflictReported(conflicts) => {
			for conflict in conflicts {
				println!("{}", conflict);
			}
			Err(Error::Conflicts(conflicts.len()))
		},
	}
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("bowerer-rs error: {0}")]
	BowererRsError(#[from] bowerer_rs::Error),
	#[error("Unknown command {0}")]
	UnknownCommand(String),
	#[error("{0} unresolved conflicts")]
	Conflicts(usize),
}
