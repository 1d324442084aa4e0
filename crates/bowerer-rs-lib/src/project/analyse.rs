//! Reconciling a manifest's declared dependencies with what is installed.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use petgraph::prelude::*;

use crate::endpoint;
use crate::installed::InstalledMap;
use crate::metadata::{DependencySection, Manifest};
use crate::tree::{DependencyNode, DependencyTree};

/// The classified tree of a project.
#[derive(Debug, Clone)]
pub struct ProjectAnalysis {
	/// The manifest as read, without synthesized entries.
	pub manifest: Manifest,
	pub tree: DependencyTree,
	/// Installed packages by name, plus declared ones found missing.
	pub flat: BTreeMap<String, NodeIndex>,
}

/// Builds the dependency tree of a project and classifies every node.
///
/// # Parameters
/// - `manifest` - The project manifest.
/// - `cwd` - Project root, recorded as the root's source.
/// - `installed`, `linked` - Records from the components directory, linked ones win on name collisions.
/// - `production` - Skip `devDependencies`.
///
/// # Errors
/// [`Error::Endpoint`](crate::Error::Endpoint) when a declaration can't be parsed.
pub fn analyse(manifest: &Manifest, cwd: &Path, installed: InstalledMap, linked: InstalledMap, production: bool) -> crate::Result<ProjectAnalysis> {
	let mut records = installed;
	records.extend(linked);

	let mut json = manifest.clone();
	let mut extraneous = Vec::<String>::new();
	for (name, record) in &records {
		let meta = &record.pkg_meta;
		let saved = json.dependencies.get(name).or(json.dev_dependencies.get(name)).is_some_and(|d| !d.is_empty());
		if saved || !meta.direct {
			continue;
		}

		/* Explicitly installed before, keep it around */
		let declaration = if record.linked {
			meta.version.clone().unwrap_or_else(|| "*".to_string())
		} else {
			let source = meta.original_source.as_deref().or(meta.source.as_deref()).unwrap_or_default();
			format!("{}#{}", source, meta.target.as_deref().unwrap_or("*"))
		};
		log::debug!("Restoring direct dependency {}: {}", name, declaration);
		json.dependencies.insert(name.clone(), declaration);
		extraneous.push(name.clone());
	}

	let mut tree = DependencyTree::new(DependencyNode {
		name: json.name.clone(),
		source: cwd.to_string_lossy().into_owned(),
		target: json.version.clone().unwrap_or_else(|| "*".to_string()),
		pkg_meta: Some(json),
		canonical_dir: Some(cwd.to_path_buf()),
		..Default::default()
	});
	let root = tree.root;

	let mut flat = BTreeMap::<String, NodeIndex>::new();
	for (name, record) in records {
		let index = tree.add_node(record.into());
		flat.insert(name, index);
	}
	for name in &extraneous {
		if let Some(index) = flat.get(name) {
			tree[*index].extraneous = true;
		}
	}

	restore_refs(&mut tree, root, &mut flat, DependencySection::Dependencies, &mut HashSet::new())?;
	if !production {
		restore_refs(&mut tree, root, &mut flat, DependencySection::Dev, &mut HashSet::new())?;
	}

	let installed_names: Vec<_> = flat.iter().map(|(n, i)| (n.clone(), *i)).collect();
	for (name, index) in installed_names {
		if !tree[index].dependants.is_empty() || index == root {
			continue;
		}
		/* An incompatible declaration already took the name at the root */
		if tree.dependency(root, &name).is_some() {
			continue;
		}

		log::debug!("{} is extraneous", name);
		tree[index].extraneous = true;
		restore_refs(&mut tree, index, &mut flat, DependencySection::Dependencies, &mut HashSet::new())?;
		tree.set_dependency(root, &name, index);
	}

	flat.remove(&manifest.name);

	Ok(ProjectAnalysis { manifest: manifest.clone(), tree, flat })
}

/// Resolves the declarations of `node` against the installed records, recursively.
///
/// `processed` holds `owner:dependency` pairs already handled, which is what stops cycles.
fn restore_refs(
	tree: &mut DependencyTree,
	node: NodeIndex,
	flat: &mut BTreeMap<String, NodeIndex>,
	section: DependencySection,
	processed: &mut HashSet<String>,
) -> crate::Result<()> {
	if tree[node].missing {
		return Ok(());
	}

	let owner = tree[node].name.clone();
	let declarations: Vec<(String, String)> = match &tree[node].pkg_meta {
		Some(meta) => meta.section(section)
			.iter()
			.filter(|(name, _)| !processed.contains(&format!("{owner}:{name}")))
			.map(|(k, v)| (k.clone(), v.clone()))
			.collect(),
		None => return Ok(()),
	};

	for (name, declaration) in declarations {
		let decomposed = endpoint::decompose_from_json(&name, &declaration)?;
		let local = flat.get(&name).copied();

		let (restored, compatible) = match local {
			None => {
				let index = tree.add_node(DependencyNode { missing: true, ..DependencyNode::from_endpoint(&decomposed) });
				flat.insert(name.clone(), index);
				(index, false)
			},
			Some(local) => {
				let installed = &tree[local];
				let compatible = installed.linked || (
					!installed.missing
					&& installed.pkg_meta.as_ref().and_then(|m| m.target.as_deref()) == Some(decomposed.target.as_str())
				);

				if compatible {
					tree[local].overlay(&decomposed);
					(local, true)
				} else {
					let mut node = DependencyNode::from_endpoint(&decomposed);
					if installed.missing {
						node.missing = true;
					} else {
						node.pkg_meta = installed.pkg_meta.clone();
						node.canonical_dir = installed.canonical_dir.clone();
						node.incompatible = true;
					}
					(tree.add_node(node), false)
				}
			},
		};

		/* Only direct root dependencies are checked for a changed source */
		if tree[node].root && compatible {
			let original = tree[restored].pkg_meta.as_ref().and_then(|m| m.original_source.clone());
			if original.is_some_and(|o| o != decomposed.source) {
				tree[restored].different = true;
			}
		}

		tree.set_dependency(node, &name, restored);
		processed.insert(format!("{owner}:{name}"));
		tree.add_dependant(restored, node);

		restore_refs(tree, restored, flat, DependencySection::Dependencies, processed)?;

		/* Still walk the shadowed install so its own dependencies are accounted for */
		if let Some(local) = local.filter(|l| *l != restored) {
			restore_refs(tree, local, flat, DependencySection::Dependencies, processed)?;
		}
	}

	Ok(())
}
