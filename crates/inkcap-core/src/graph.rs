use crate::links::{extract_tags, extract_wikilinks};
use crate::vault::{Entity, Vault};
use rand::Rng;
use std::collections::{BTreeMap, HashMap};

pub const SPAWN_WIDTH: f32 = 800.0;
pub const SPAWN_HEIGHT: f32 = 600.0;

#[derive(Clone, Debug, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

// One node per file, one edge per distinct extracted link name that resolves
// to a file. Unresolved names contribute nothing. New nodes spawn at a random
// point so the layout has somewhere to start; the layout engine preserves
// positions for nodes it has already seen.
pub fn build_graph(entities: &[Entity]) -> LinkGraph {
    let files: Vec<&Entity> = entities.iter().filter(|entity| entity.is_file()).collect();
    let mut rng = rand::thread_rng();
    let nodes = files
        .iter()
        .map(|file| GraphNode {
            id: file.id.clone(),
            name: file.name.clone(),
            x: rng.gen_range(0.0..SPAWN_WIDTH),
            y: rng.gen_range(0.0..SPAWN_HEIGHT),
            vx: 0.0,
            vy: 0.0,
        })
        .collect();

    let mut by_name: HashMap<String, &str> = HashMap::new();
    for file in &files {
        by_name
            .entry(file.name.to_lowercase())
            .or_insert(file.id.as_str());
    }

    let mut edges = Vec::new();
    for file in &files {
        let content = file.content.as_deref().unwrap_or("");
        for name in extract_wikilinks(content) {
            if let Some(target) = by_name.get(&name.to_lowercase()) {
                edges.push(GraphEdge {
                    source: file.id.clone(),
                    target: (*target).to_string(),
                });
            }
        }
    }

    LinkGraph { nodes, edges }
}

// Inverse of the resolved link relation: target id -> ids of files whose
// content links to it, in first-seen order, each source listed once.
pub fn build_backlinks(entities: &[Entity]) -> HashMap<String, Vec<String>> {
    let graph = build_graph(entities);
    let mut backlinks: HashMap<String, Vec<String>> = HashMap::new();
    for edge in &graph.edges {
        let sources = backlinks.entry(edge.target.clone()).or_default();
        if !sources.contains(&edge.source) {
            sources.push(edge.source.clone());
        }
    }
    backlinks
}

pub fn tags_map(entities: &[Entity]) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for entity in entities {
        if !entity.is_file() {
            continue;
        }
        let Some(content) = entity.content.as_deref() else {
            continue;
        };
        for tag in extract_tags(content) {
            map.entry(tag).or_default().push(entity.id.clone());
        }
    }
    map
}

// Memoized view of everything derived from the entity list, keyed by the
// vault's version counter. Reads between mutations cost a version compare.
pub struct Derived {
    version: u64,
    graph: LinkGraph,
    backlinks: HashMap<String, Vec<String>>,
    tags: BTreeMap<String, Vec<String>>,
}

impl Derived {
    pub fn new() -> Self {
        Self {
            version: 0,
            graph: LinkGraph::default(),
            backlinks: HashMap::new(),
            tags: BTreeMap::new(),
        }
    }

    pub fn refresh(&mut self, vault: &Vault) {
        if self.version == vault.version() {
            return;
        }
        self.graph = build_graph(vault.entities());
        self.backlinks = build_backlinks(vault.entities());
        self.tags = tags_map(vault.entities());
        self.version = vault.version();
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn graph(&self) -> &LinkGraph {
        &self.graph
    }

    pub fn backlinks_of(&self, id: &str) -> &[String] {
        self.backlinks
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn tags(&self) -> &BTreeMap<String, Vec<String>> {
        &self.tags
    }
}

impl Default for Derived {
    fn default() -> Self {
        Self::new()
    }
}
