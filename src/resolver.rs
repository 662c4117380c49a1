//! Finds the converter chain between two MIME types.
//!
//! Nodes of the search are concrete MIME types; an edge leaves a node for
//! every converter whose `from_type` accepts that node's type, so edges are
//! evaluated against the type actually being carried rather than precomputed.
//! The search is breadth first, so the first level holding a complete chain
//! holds the shortest ones. Within a level, candidates are generated in the
//! order of their converters' positions in the snapshot, which makes the first
//! complete chain found the one whose first differing converter was registered
//! earliest.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::converter::{describe, Converter};
use crate::error::{BrokerError, Result};
use crate::mime::{accepts, match_kind, satisfies, MatchKind, MimeType};

/// One resolved hop: a converter and the concrete types around it.
#[derive(Clone)]
pub struct ChainStep {
    /// Position of the converter in the snapshot it was resolved against
    pub index: usize,
    pub converter: Arc<dyn Converter>,
    pub from: MimeType,
    pub to: MimeType,
}

/// Ordered converters leading from a source type to a destination type.
/// Empty means the source already satisfies the destination.
#[derive(Clone, Default)]
pub struct ConversionChain {
    steps: Vec<ChainStep>,
}

impl ConversionChain {
    pub fn passthrough() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[ChainStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Snapshot positions of the converters, in execution order
    pub fn indices(&self) -> Vec<usize> {
        self.steps.iter().map(|s| s.index).collect()
    }
}

impl fmt::Debug for ConversionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.steps.iter().map(|s| describe(s.converter.as_ref())))
            .finish()
    }
}

struct Node {
    mime_type: MimeType,
    parent: Option<usize>,
    converter: usize,
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    max_depth: usize,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new(4)
    }
}

impl PathResolver {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn resolve(
        &self,
        converters: &[Arc<dyn Converter>],
        source: &MimeType,
        destination: &MimeType,
    ) -> Result<ConversionChain> {
        if satisfies(source, destination) {
            debug!("{} already satisfies {}, no conversion needed", source, destination);
            return Ok(ConversionChain::passthrough());
        }

        let mut nodes = vec![Node {
            mime_type: source.clone(),
            parent: None,
            converter: usize::MAX,
        }];
        let mut visited = HashSet::from([source.clone()]);
        let mut frontier = vec![0usize];

        for depth in 1..=self.max_depth {
            let mut next = Vec::new();
            let mut found: Option<usize> = None;
            let mut alternatives = 0usize;

            for &parent in &frontier {
                let current = nodes[parent].mime_type.clone();
                let matches = accepting(converters, &current);
                if has_mixed_rules(&matches) {
                    warn!(
                        "{} is accepted through different rules: {}",
                        current,
                        describe_matches(converters, &matches)
                    );
                }

                for (index, _) in matches {
                    let converter = &converters[index];
                    let produced = narrow(converter.to_type(), destination);
                    let complete = satisfies(&produced, destination);
                    if !complete && !visited.insert(produced.clone()) {
                        continue;
                    }

                    nodes.push(Node {
                        mime_type: produced,
                        parent: Some(parent),
                        converter: index,
                    });
                    let node = nodes.len() - 1;

                    if !complete {
                        next.push(node);
                    } else if found.is_none() {
                        found = Some(node);
                    } else {
                        alternatives += 1;
                    }
                }
            }

            if let Some(node) = found {
                let chain = build_chain(&nodes, node, converters);
                if alternatives > 0 {
                    warn!(
                        "Ambiguous conversion {} -> {}: {} other chain(s) of length {}, using {:?}",
                        source, destination, alternatives, depth, chain
                    );
                }
                debug!("Resolved {} -> {} via {:?}", source, destination, chain);
                return Ok(chain);
            }

            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        Err(BrokerError::NoConversionPath {
            from: source.clone(),
            to: destination.clone(),
        })
    }
}

/// Converters whose `from_type` takes `current`, in snapshot order, with the
/// rule that let each one in.
fn accepting(converters: &[Arc<dyn Converter>], current: &MimeType) -> Vec<(usize, MatchKind)> {
    converters
        .iter()
        .enumerate()
        .filter_map(|(index, converter)| {
            match_kind(converter.from_type(), current).map(|kind| (index, kind))
        })
        .collect()
}

fn has_mixed_rules(matches: &[(usize, MatchKind)]) -> bool {
    matches.windows(2).any(|pair| pair[0].1 != pair[1].1)
}

fn describe_matches(converters: &[Arc<dyn Converter>], matches: &[(usize, MatchKind)]) -> String {
    matches
        .iter()
        .map(|(index, kind)| format!("{} ({:?})", converters[*index].name(), kind))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A wildcard output that fits the request is taken to produce the request.
fn narrow(to_type: &MimeType, destination: &MimeType) -> MimeType {
    if to_type.is_wildcard() && !destination.is_wildcard() && accepts(to_type, destination) {
        destination.clone()
    } else {
        to_type.clone()
    }
}

fn build_chain(nodes: &[Node], leaf: usize, converters: &[Arc<dyn Converter>]) -> ConversionChain {
    let mut steps = Vec::new();
    let mut cursor = leaf;
    while let Some(parent) = nodes[cursor].parent {
        let index = nodes[cursor].converter;
        steps.push(ChainStep {
            index,
            converter: converters[index].clone(),
            from: nodes[parent].mime_type.clone(),
            to: nodes[cursor].mime_type.clone(),
        });
        cursor = parent;
    }
    steps.reverse();
    ConversionChain { steps }
}
