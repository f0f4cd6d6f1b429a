//! Visitation events over file properties.
//!
//! Instead of calling back into a visitor, a file property is described as a
//! finite sequence of [`VisitEvent`]s. Properties are visited by name, roots in
//! declared order, and entries depth-first by name at each level.

use serde::Serialize;

use crate::util::hash::HashCode;

use super::snapshot::{EntrySnapshot, RootSnapshot};
use super::types::FilePropertyFingerprint;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum VisitEvent {
  PreProperty {
    name: String,
    hash: HashCode,
    strategy: String,
    attributes: Vec<String>,
  },
  PreRoot {
    path: String,
    name: String,
  },
  PreDirectory {
    path: String,
    name: String,
  },
  File {
    path: String,
    name: String,
    hash: HashCode,
  },
  PostDirectory,
  PostRoot,
  PostProperty,
}

/// Events for one property: `PreProperty`, each root, then `PostProperty`.
pub fn property_events(property: &FilePropertyFingerprint) -> Vec<VisitEvent> {
  let mut events = vec![VisitEvent::PreProperty {
    name: property.name.clone(),
    hash: property.hash,
    strategy: property.strategy().to_string(),
    attributes: property.attributes().into_iter().map(String::from).collect(),
  }];
  for root in &property.roots {
    root_events(root, &mut events);
  }
  events.push(VisitEvent::PostProperty);
  events
}

fn root_events(root: &RootSnapshot, events: &mut Vec<VisitEvent>) {
  events.push(VisitEvent::PreRoot {
    path: root.path().display().to_string(),
    name: root.name().to_string(),
  });
  entry_events(&root.entry, events);
  events.push(VisitEvent::PostRoot);
}

fn entry_events(entry: &EntrySnapshot, events: &mut Vec<VisitEvent>) {
  match entry {
    EntrySnapshot::File { path, name, hash } => events.push(VisitEvent::File {
      path: path.display().to_string(),
      name: name.clone(),
      hash: *hash,
    }),
    EntrySnapshot::Directory { path, name, children } => {
      events.push(VisitEvent::PreDirectory {
        path: path.display().to_string(),
        name: name.clone(),
      });
      for child in children {
        entry_events(child, events);
      }
      events.push(VisitEvent::PostDirectory);
    }
  }
}

impl std::fmt::Display for VisitEvent {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      VisitEvent::PreProperty {
        name,
        hash,
        strategy,
        ..
      } => write!(f, "pre-property {} {} ({})", name, hash, strategy),
      VisitEvent::PreRoot { path, .. } => write!(f, "pre-root {}", path),
      VisitEvent::PreDirectory { path, .. } => write!(f, "pre-directory {}", path),
      VisitEvent::File { path, hash, .. } => write!(f, "file {} {}", path, hash),
      VisitEvent::PostDirectory => write!(f, "post-directory"),
      VisitEvent::PostRoot => write!(f, "post-root"),
      VisitEvent::PostProperty => write!(f, "post-property"),
    }
  }
}
