//! Endpoint notation.
//!
//! An endpoint is the textual reference a user or a manifest uses to point at a package:
//! `[<name>=]<source>[#<target>]`.
//!
//! - `name` is optional and restricted to word characters, `-` and `.` (not as the last character).
//! - `source` is a registry name, a URL, a path or a shorthand such as `owner/package`.
//! - `target` is a semver range, a commit, a branch or tag. An absent target is the wildcard `*`.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Serialize, Deserialize};

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
	/// The text does not follow the endpoint grammar at all.
	#[error("invalid endpoint: {0}")]
	Invalid(String),
	/// A manifest dependency entry had an empty key.
	#[error("the key must be specified")]
	MissingKey,
	/// Only named endpoints can be written into a manifest.
	#[error("decomposed endpoint must have a name")]
	MissingName,
}

/// A structured package reference.
///
/// An empty `name` means the endpoint is anonymous, the package name is then only known once fetched.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
	pub name: String,
	pub source: String,
	pub target: String,
}

fn endpoint_regex() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| {
		Regex::new(r"^(?:([\w\-]|(?:[\w\.\-]+[\w\-])?)=)?([^|#]+)(?:#(.*))?$").expect("endpoint regex should compile")
	})
}

/// `*`, `latest` and the empty string all mean "any version".
pub fn is_wildcard(target: &str) -> bool {
	target.is_empty() || target == "*" || target == "latest"
}

/// Checks if `value` reads like a source locator (URL, path, ssh address) rather than a version.
pub fn looks_like_source(value: &str) -> bool {
	value.contains(['/', '\\', '@'])
}

impl Endpoint {
	pub fn new(name: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
		Endpoint { name: name.into(), source: source.into(), target: target.into() }
	}

	pub fn has_name(&self) -> bool {
		!self.name.trim().is_empty()
	}

	pub fn is_wildcard(&self) -> bool {
		is_wildcard(self.target.trim())
	}
}

impl std::fmt::Display for Endpoint {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&compose(self))
	}
}

impl std::str::FromStr for Endpoint {
	type Err = EndpointError;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		decompose(s)
	}
}

/// Parses endpoint text into an [`Endpoint`].
///
/// Wildcard targets are normalized to `*`.
///
/// # Errors
/// [`EndpointError::Invalid`] when `text` does not match the grammar, including when it is empty.
pub fn decompose(text: &str) -> Result<Endpoint, EndpointError> {
	let captures = endpoint_regex()
		.captures(text)
		.ok_or_else(|| EndpointError::Invalid(text.to_string()))?;

	let group = |i: usize| captures.get(i).map_or("", |m| m.as_str()).trim();

	let source = group(2);
	if source.is_empty() {
		return Err(EndpointError::Invalid(text.to_string()));
	}
	let target = group(3);

	Ok(Endpoint {
		name: group(1).to_string(),
		source: source.to_string(),
		target: if is_wildcard(target) { "*".to_string() } else { target.to_string() },
	})
}

/// Renders an endpoint back into its textual form.
///
/// Fields are trimmed, the `name=` prefix is only written for named endpoints and wildcard targets are elided.
pub fn compose(endpoint: &Endpoint) -> String {
	let mut composed = String::new();

	let name = endpoint.name.trim();
	if !name.is_empty() {
		composed.push_str(name);
		composed.push('=');
	}

	composed.push_str(endpoint.source.trim());

	let target = endpoint.target.trim();
	if !is_wildcard(target) {
		composed.push('#');
		composed.push_str(target);
	}

	composed
}

/// Interprets a manifest `"key": "value"` dependency entry.
///
/// - `value` containing `#`: the left half is the source (`key` when empty), the right half the target.
/// - `value` shaped like a source locator: the whole value is the source, the target is `*`.
/// - otherwise `key` is the source and `value` the target.
///
/// # Errors
/// [`EndpointError::MissingKey`] when `key` is blank.
pub fn decompose_from_json(key: &str, value: &str) -> Result<Endpoint, EndpointError> {
	let key = key.trim();
	let value = value.trim();

	if key.is_empty() {
		return Err(EndpointError::MissingKey);
	}

	let mut text = format!("{key}=");
	if let Some((source, target)) = value.split_once('#') {
		let source = source.trim();
		text.push_str(if source.is_empty() { key } else { source });
		text.push('#');
		/* Only the first `#` separates, anything after a second one is dropped */
		text.push_str(target.split('#').next().unwrap_or_default().trim());
	} else if looks_like_source(value) {
		text.push_str(value);
		text.push_str("#*");
	} else {
		text.push_str(key);
		text.push('#');
		text.push_str(value);
	}

	decompose(&text)
}

/// Renders a named endpoint as a manifest `(key, value)` dependency entry.
///
/// The source is omitted when it equals the name. A wildcard target is omitted when the source is a locator,
/// and is otherwise written as `#*` after an explicit source.
///
/// # Errors
/// [`EndpointError::MissingName`] when the endpoint is anonymous.
pub fn compose_to_json(endpoint: &Endpoint) -> Result<(String, String), EndpointError> {
	let name = endpoint.name.trim();
	if name.is_empty() {
		return Err(EndpointError::MissingName);
	}

	let source = endpoint.source.trim();
	let target = endpoint.target.trim();
	let wildcard = is_wildcard(target);

	let mut value = String::new();
	if source != name {
		value.push_str(source);
	}

	if value.is_empty() {
		if wildcard {
			value.push('*');
		} else {
			if target.contains('/') {
				value.push('#');
			}
			value.push_str(target);
		}
	} else if !wildcard || !looks_like_source(source) {
		value.push('#');
		value.push_str(if wildcard { "*" } else { target });
	}

	Ok((name.to_string(), value))
}
