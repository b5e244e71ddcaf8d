use crate::assistant::{Assistant, AssistantError, NoteAnalysis};
use crate::graph;
use crate::links;
use crate::navigation::History;
use crate::storage::VaultPersistence;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub const DEFAULT_FILE_NAME: &str = "Untitled note";
pub const DEFAULT_FOLDER_NAME: &str = "New folder";
pub const FILE_TEMPLATE: &str = "## Thoughts\n\n";
pub const RELATED_HEADER: &str = "### Related";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    File,
    Folder,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub updated_at: i64,
    #[serde(default, rename = "isStarred")]
    pub starred: bool,
}

impl Entity {
    pub fn is_file(&self) -> bool {
        self.kind == EntityKind::File
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntityKind::Folder
    }
}

pub struct Vault {
    entities: Vec<Entity>,
    version: u64,
    active_id: Option<String>,
    expanded: HashSet<String>,
    history: History,
    pending_analysis: HashSet<String>,
    persistence: Option<Box<dyn VaultPersistence>>,
}

impl Vault {
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            version: 1,
            active_id: None,
            expanded: HashSet::new(),
            history: History::new(),
            pending_analysis: HashSet::new(),
            persistence: None,
        }
    }

    pub fn with_persistence(persistence: Box<dyn VaultPersistence>) -> Self {
        let entities = match persistence.load() {
            Ok(entities) => entities,
            Err(err) => {
                tracing::warn!("vault load failed, starting empty: {err:?}");
                Vec::new()
            }
        };
        Self {
            entities,
            persistence: Some(persistence),
            ..Self::new()
        }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active_entity(&self) -> Option<&Entity> {
        self.active_id.as_deref().and_then(|id| self.get(id))
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    // Direct children of a folder (or the root), folders first, then by name.
    pub fn children(&self, parent_id: Option<&str>) -> Vec<&Entity> {
        let mut children: Vec<&Entity> = self
            .entities
            .iter()
            .filter(|entity| entity.parent_id.as_deref() == parent_id)
            .collect();
        children.sort_by(|a, b| {
            b.is_folder()
                .cmp(&a.is_folder())
                .then_with(|| a.name.cmp(&b.name))
        });
        children
    }

    pub fn create(
        &mut self,
        kind: EntityKind,
        parent_id: Option<&str>,
        name: Option<&str>,
        content: Option<String>,
    ) -> Entity {
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| match kind {
                EntityKind::File => DEFAULT_FILE_NAME.to_string(),
                EntityKind::Folder => DEFAULT_FOLDER_NAME.to_string(),
            });
        let content = match kind {
            EntityKind::File => content.or_else(|| Some(FILE_TEMPLATE.to_string())),
            EntityKind::Folder => None,
        };
        let entity = Entity {
            id: Uuid::new_v4().to_string(),
            name,
            kind,
            parent_id: parent_id.map(str::to_string),
            content,
            updated_at: now_millis(),
            starred: false,
        };
        self.entities.push(entity.clone());
        if kind == EntityKind::File {
            self.active_id = Some(entity.id.clone());
        }
        if let Some(parent) = parent_id {
            self.expanded.insert(parent.to_string());
        }
        self.touch();
        entity
    }

    pub fn move_entity(&mut self, id: &str, new_parent_id: Option<&str>) {
        if self.get(id).is_none() {
            tracing::warn!("move rejected: unknown entity {id}");
            return;
        }
        if let Some(parent) = new_parent_id {
            if parent == id {
                tracing::warn!("move rejected: {id} cannot be its own parent");
                return;
            }
            if self.get(parent).is_none() {
                tracing::warn!("move rejected: unknown destination {parent}");
                return;
            }
            if self.descendant_ids(id).contains(parent) {
                tracing::warn!("move rejected: {parent} is inside the subtree of {id}");
                return;
            }
        }
        let now = now_millis();
        if let Some(entity) = self.entities.iter_mut().find(|entity| entity.id == id) {
            entity.parent_id = new_parent_id.map(str::to_string);
            entity.updated_at = now;
        }
        if let Some(parent) = new_parent_id {
            self.expanded.insert(parent.to_string());
        }
        self.touch();
    }

    pub fn rename(&mut self, id: &str, new_name: &str) {
        let now = now_millis();
        if let Some(entity) = self.entities.iter_mut().find(|entity| entity.id == id) {
            entity.name = new_name.to_string();
            entity.updated_at = now;
            self.touch();
        }
    }

    pub fn update_content(&mut self, id: &str, text: &str) {
        let now = now_millis();
        if let Some(entity) = self
            .entities
            .iter_mut()
            .find(|entity| entity.id == id && entity.is_file())
        {
            entity.content = Some(text.to_string());
            entity.updated_at = now;
            self.touch();
        }
    }

    pub fn update_active_content(&mut self, text: &str) {
        if let Some(id) = self.active_id.clone() {
            self.update_content(&id, text);
        }
    }

    pub fn update_active_name(&mut self, name: &str) {
        if let Some(id) = self.active_id.clone() {
            self.rename(&id, name);
        }
    }

    pub fn delete(&mut self, id: &str) {
        if self.get(id).is_none() {
            return;
        }
        let mut removed = self.descendant_ids(id);
        removed.insert(id.to_string());

        self.entities.retain(|entity| !removed.contains(&entity.id));
        if let Some(active) = self.active_id.as_deref() {
            if removed.contains(active) {
                self.active_id = None;
            }
        }
        self.history.retain(|entry| !removed.contains(entry));
        self.expanded.retain(|entry| !removed.contains(entry));
        self.pending_analysis.retain(|entry| !removed.contains(entry));
        self.touch();
    }

    pub fn toggle_star(&mut self, id: &str) {
        if let Some(entity) = self.entities.iter_mut().find(|entity| entity.id == id) {
            entity.starred = !entity.starred;
            self.touch();
        }
    }

    pub fn toggle_folder(&mut self, id: &str) {
        if !self.expanded.remove(id) {
            self.expanded.insert(id.to_string());
        }
    }

    pub fn navigate_to(&mut self, id: &str) {
        if self.active_id.as_deref() == Some(id) || self.get(id).is_none() {
            return;
        }
        self.active_id = Some(id.to_string());
        self.history.visit(id);
    }

    pub fn go_back(&mut self) {
        if let Some(id) = self.history.back() {
            self.active_id = Some(id.to_string());
        }
    }

    pub fn go_forward(&mut self) {
        if let Some(id) = self.history.forward() {
            self.active_id = Some(id.to_string());
        }
    }

    pub fn can_go_back(&self) -> bool {
        self.history.can_go_back()
    }

    pub fn can_go_forward(&self) -> bool {
        self.history.can_go_forward()
    }

    pub fn open_note_by_name(&mut self, name: &str) {
        let target = self
            .entities
            .iter()
            .find(|entity| entity.is_file() && entity.name.to_lowercase() == name.to_lowercase())
            .map(|entity| entity.id.clone());
        if let Some(id) = target {
            self.navigate_to(&id);
        }
    }

    pub fn daily_note(&mut self, today: NaiveDate) -> Entity {
        let name = daily_note_name(today);
        let existing = self
            .entities
            .iter()
            .find(|entity| entity.is_file() && entity.name == name)
            .cloned();
        match existing {
            Some(entity) => {
                self.navigate_to(&entity.id);
                entity
            }
            None => self.create(EntityKind::File, None, Some(&name), None),
        }
    }

    // Normalizes every inline tag to lowercase kebab case, in place.
    pub fn garden_tags(&mut self) {
        let mut changed = false;
        for entity in &mut self.entities {
            if !entity.is_file() {
                continue;
            }
            if let Some(content) = entity.content.as_ref() {
                let normalized = links::normalize_tags(content);
                if &normalized != content {
                    entity.content = Some(normalized);
                    changed = true;
                }
            }
        }
        if changed {
            self.touch();
        }
    }

    // Replaces the whole entity list, e.g. after a confirmed import. The
    // caller validates first; this is unconditional.
    pub fn replace_entities(&mut self, entities: Vec<Entity>) {
        self.entities = entities;
        let ids: HashSet<&str> = self.entities.iter().map(|entity| entity.id.as_str()).collect();
        if let Some(active) = self.active_id.as_deref() {
            if !ids.contains(active) {
                self.active_id = None;
            }
        }
        self.history.retain(|entry| ids.contains(entry));
        self.expanded.retain(|entry| ids.contains(entry.as_str()));
        self.pending_analysis.clear();
        self.touch();
    }

    pub fn load_test_world(&mut self) {
        let welcome = Entity {
            id: Uuid::new_v4().to_string(),
            name: "Welcome".to_string(),
            kind: EntityKind::File,
            parent_id: None,
            content: Some(
                "# Welcome\n\nThis is your knowledge base.\n\n## Thoughts\nTry a smart note, or drag this file into the archive.\n\n#welcome #guide"
                    .to_string(),
            ),
            updated_at: now_millis(),
            starred: true,
        };
        let folder = Entity {
            id: Uuid::new_v4().to_string(),
            name: "Archive".to_string(),
            kind: EntityKind::Folder,
            parent_id: None,
            content: None,
            updated_at: now_millis(),
            starred: false,
        };
        let idea = Entity {
            id: Uuid::new_v4().to_string(),
            name: "First idea".to_string(),
            kind: EntityKind::File,
            parent_id: Some(folder.id.clone()),
            content: Some("## Thoughts\nEverything big starts small.\n\n[[Welcome]]".to_string()),
            updated_at: now_millis(),
            starred: false,
        };
        self.active_id = Some(welcome.id.clone());
        self.expanded = HashSet::from([folder.id.clone()]);
        self.history = History::new();
        self.entities = vec![welcome, folder, idea];
        self.pending_analysis.clear();
        self.touch();
    }

    pub fn analysis_pending(&self, id: &str) -> bool {
        self.pending_analysis.contains(id)
    }

    // Marks a note as having an analysis in flight. Returns false when the
    // note is missing, has no content, or is already pending, in which case
    // the caller must not invoke the assistant.
    pub fn begin_analysis(&mut self, id: &str) -> bool {
        let eligible = self
            .get(id)
            .map(|entity| entity.is_file() && entity.content.is_some())
            .unwrap_or(false);
        if !eligible || self.pending_analysis.contains(id) {
            return false;
        }
        self.pending_analysis.insert(id.to_string());
        true
    }

    pub fn fail_analysis(&mut self, id: &str) {
        self.pending_analysis.remove(id);
    }

    // Applies an assistant result as one atomic merge. A stale result for a
    // note deleted while the request was in flight is discarded.
    pub fn apply_analysis(&mut self, id: &str, analysis: &NoteAnalysis) -> bool {
        self.pending_analysis.remove(id);
        let Some(entity) = self.entities.iter_mut().find(|entity| entity.id == id) else {
            tracing::debug!("dropping stale analysis for deleted note {id}");
            return false;
        };
        let Some(mut content) = entity.content.clone() else {
            return false;
        };

        let tag_line = analysis
            .tags
            .iter()
            .map(|tag| format!("#{}", kebab_case(tag)))
            .collect::<Vec<_>>()
            .join(" ");
        if !tag_line.is_empty() && !content.contains(&tag_line) {
            content = format!("{tag_line}\n\n{content}");
        }

        if !analysis.links.is_empty() && !content.contains(RELATED_HEADER) {
            let links = analysis
                .links
                .iter()
                .map(|link| format!("[[{link}]]"))
                .collect::<Vec<_>>()
                .join(", ");
            content.push_str(&format!("\n\n---\n{RELATED_HEADER}\n{links}"));
        }

        let title = analysis.title.trim();
        if !title.is_empty() && title != "Untitled" {
            entity.name = title.to_string();
        }
        entity.content = Some(content);
        entity.updated_at = now_millis();
        self.touch();
        true
    }

    // Synchronous smart-save convenience over the begin/apply/fail cycle.
    pub fn smart_save(
        &mut self,
        id: &str,
        assistant: &dyn Assistant,
    ) -> Result<bool, AssistantError> {
        if !self.begin_analysis(id) {
            return Ok(false);
        }
        let content = self
            .get(id)
            .and_then(|entity| entity.content.clone())
            .unwrap_or_default();
        let note_names: Vec<String> = self
            .entities
            .iter()
            .filter(|entity| entity.is_file() && entity.id != id)
            .map(|entity| entity.name.clone())
            .collect();
        let known_tags: Vec<String> = graph::tags_map(&self.entities).into_keys().collect();

        match assistant.analyze(&content, &note_names, &known_tags) {
            Ok(analysis) => Ok(self.apply_analysis(id, &analysis)),
            Err(err) => {
                tracing::warn!("smart save failed for {id}: {err:?}");
                self.fail_analysis(id);
                Err(err)
            }
        }
    }

    // Ids of everything below `id`, walked iteratively over an id -> children
    // index so deep trees cannot overflow the stack.
    fn descendant_ids(&self, id: &str) -> HashSet<String> {
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for entity in &self.entities {
            if let Some(parent) = entity.parent_id.as_deref() {
                children.entry(parent).or_default().push(&entity.id);
            }
        }
        let mut found = HashSet::new();
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            for child in children.get(next).into_iter().flatten().copied() {
                if found.insert(child.to_string()) {
                    pending.push(child);
                }
            }
        }
        found
    }

    fn touch(&mut self) {
        self.version += 1;
        if let Some(persistence) = self.persistence.as_ref() {
            if let Err(err) = persistence.save(&self.entities) {
                tracing::warn!("vault save failed: {err:?}");
            }
        }
    }
}

impl Default for Vault {
    fn default() -> Self {
        Self::new()
    }
}

pub fn daily_note_name(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

fn kebab_case(input: &str) -> String {
    input
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0)
}
