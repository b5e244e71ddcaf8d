use crate::vault::Entity;
use chrono::NaiveDate;
use directories::ProjectDirs;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Serde(serde_json::Error),
    ProjectDir,
    DuplicateId(String),
    FolderContent(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err)
    }
}

// The injected load/save pair the vault talks to. Implementations own their
// failure mode; the vault logs and moves on.
pub trait VaultPersistence {
    fn load(&self) -> Result<Vec<Entity>, StorageError>;
    fn save(&self, entities: &[Entity]) -> Result<(), StorageError>;
}

pub struct JsonVaultStore {
    vault_path: PathBuf,
}

impl JsonVaultStore {
    pub fn new(vault_path: PathBuf) -> Self {
        Self { vault_path }
    }

    pub fn default_store() -> Result<Self, StorageError> {
        let project_dirs =
            ProjectDirs::from("app", "inkcap", "Inkcap").ok_or(StorageError::ProjectDir)?;
        Ok(Self::new(project_dirs.config_dir().join("vault.json")))
    }

    pub fn path(&self) -> &PathBuf {
        &self.vault_path
    }
}

impl VaultPersistence for JsonVaultStore {
    fn load(&self) -> Result<Vec<Entity>, StorageError> {
        if !self.vault_path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.vault_path)?;
        import_vault(&raw)
    }

    fn save(&self, entities: &[Entity]) -> Result<(), StorageError> {
        if let Some(parent) = self.vault_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(entities)?;
        fs::write(&self.vault_path, data)?;
        Ok(())
    }
}

pub fn export_vault(entities: &[Entity]) -> Result<String, StorageError> {
    Ok(serde_json::to_string_pretty(entities)?)
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("inkcap-vault-{}.json", date.format("%Y-%m-%d"))
}

// Parses and validates an interchange payload. Nothing the caller holds is
// touched until this returns Ok: duplicate ids and content-bearing folders
// are rejected outright, while dangling or cycle-closing parent references
// are normalized by detaching the entity to the root.
pub fn import_vault(raw: &str) -> Result<Vec<Entity>, StorageError> {
    let mut entities: Vec<Entity> = serde_json::from_str(raw)?;

    let mut ids = HashSet::new();
    for entity in &entities {
        if !ids.insert(entity.id.clone()) {
            return Err(StorageError::DuplicateId(entity.id.clone()));
        }
        if entity.is_folder() && entity.content.is_some() {
            return Err(StorageError::FolderContent(entity.id.clone()));
        }
    }

    let parent_of: HashMap<&str, Option<&str>> = entities
        .iter()
        .map(|entity| (entity.id.as_str(), entity.parent_id.as_deref()))
        .collect();

    let mut detach: HashSet<String> = HashSet::new();
    for entity in &entities {
        match entity.parent_id.as_deref() {
            None => continue,
            Some(parent) if !ids.contains(parent) => {
                tracing::warn!("import: detaching {} from missing parent {parent}", entity.id);
                detach.insert(entity.id.clone());
                continue;
            }
            Some(_) => {}
        }
        // Walk the ancestor chain; coming back to the start means this
        // entity sits on a cycle. The step bound keeps chains that merely
        // lead into someone else's cycle from spinning forever.
        let mut cursor = parent_of[entity.id.as_str()];
        let mut steps = 0;
        while let Some(parent) = cursor {
            if parent == entity.id {
                tracing::warn!("import: breaking parent cycle at {}", entity.id);
                detach.insert(entity.id.clone());
                break;
            }
            steps += 1;
            if steps > entities.len() {
                break;
            }
            cursor = parent_of.get(parent).copied().flatten();
        }
    }

    if !detach.is_empty() {
        for entity in &mut entities {
            if detach.contains(&entity.id) {
                entity.parent_id = None;
            }
        }
    }

    Ok(entities)
}

#[cfg(test)]
mod tests {
    use super::{export_file_name, export_vault, import_vault, JsonVaultStore, StorageError, VaultPersistence};
    use crate::vault::{Entity, EntityKind};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn entity(id: &str, name: &str, kind: EntityKind, parent: Option<&str>) -> Entity {
        Entity {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            parent_id: parent.map(str::to_string),
            content: match kind {
                EntityKind::File => Some(format!("body of {name}")),
                EntityKind::Folder => None,
            },
            updated_at: 1_700_000_000_000,
            starred: false,
        }
    }

    #[test]
    fn save_and_load_roundtrip_is_lossless() {
        let dir = tempdir().expect("tempdir");
        let store = JsonVaultStore::new(dir.path().join("vault.json"));

        let mut starred = entity("a", "Note", EntityKind::File, None);
        starred.starred = true;
        let entities = vec![
            starred,
            entity("b", "Box", EntityKind::Folder, None),
            entity("c", "Nested", EntityKind::File, Some("b")),
        ];
        store.save(&entities).expect("save vault");

        let loaded = store.load().expect("load vault");
        assert_eq!(loaded, entities);
    }

    #[test]
    fn load_defaults_to_empty_when_missing_file() {
        let dir = tempdir().expect("tempdir");
        let store = JsonVaultStore::new(dir.path().join("vault.json"));
        let loaded = store.load().expect("load vault");
        assert!(loaded.is_empty());
    }

    #[test]
    fn export_uses_original_field_names() {
        let exported = export_vault(&[entity("a", "Note", EntityKind::File, Some("p"))])
            .expect("export");
        assert!(exported.contains("\"parentId\""));
        assert!(exported.contains("\"updatedAt\""));
        assert!(exported.contains("\"isStarred\""));
        assert!(exported.contains("\"type\": \"file\""));
    }

    #[test]
    fn import_accepts_original_payload_shape() {
        let raw = r#"[
            {"id":"1","name":"Note","type":"file","parentId":null,"content":"hi [[Other]]","updatedAt":1700000000000,"isStarred":true},
            {"id":"2","name":"Box","type":"folder","parentId":null,"updatedAt":1700000000000}
        ]"#;
        let entities = import_vault(raw).expect("import");
        assert_eq!(entities.len(), 2);
        assert!(entities[0].starred);
        assert!(entities[1].is_folder());
        assert!(entities[1].content.is_none());
    }

    #[test]
    fn import_rejects_malformed_json() {
        assert!(matches!(
            import_vault("not json at all"),
            Err(StorageError::Serde(_))
        ));
    }

    #[test]
    fn import_rejects_duplicate_ids() {
        let raw = r#"[
            {"id":"1","name":"A","type":"file","parentId":null,"updatedAt":0},
            {"id":"1","name":"B","type":"file","parentId":null,"updatedAt":0}
        ]"#;
        assert!(matches!(
            import_vault(raw),
            Err(StorageError::DuplicateId(id)) if id == "1"
        ));
    }

    #[test]
    fn import_rejects_folder_with_content() {
        let raw = r#"[
            {"id":"1","name":"Box","type":"folder","parentId":null,"content":"nope","updatedAt":0}
        ]"#;
        assert!(matches!(
            import_vault(raw),
            Err(StorageError::FolderContent(id)) if id == "1"
        ));
    }

    #[test]
    fn import_normalizes_parent_cycle_to_roots() {
        let raw = r#"[
            {"id":"a","name":"A","type":"folder","parentId":"b","updatedAt":0},
            {"id":"b","name":"B","type":"folder","parentId":"a","updatedAt":0},
            {"id":"c","name":"C","type":"file","parentId":"a","updatedAt":0}
        ]"#;
        let entities = import_vault(raw).expect("import normalizes");
        let a = entities.iter().find(|entity| entity.id == "a").unwrap();
        let b = entities.iter().find(|entity| entity.id == "b").unwrap();
        let c = entities.iter().find(|entity| entity.id == "c").unwrap();
        assert_eq!(a.parent_id, None);
        assert_eq!(b.parent_id, None);
        // An entity below the cycle keeps its (now valid) parent.
        assert_eq!(c.parent_id.as_deref(), Some("a"));
    }

    #[test]
    fn import_detaches_dangling_parent() {
        let raw = r#"[
            {"id":"a","name":"A","type":"file","parentId":"ghost","updatedAt":0}
        ]"#;
        let entities = import_vault(raw).expect("import");
        assert_eq!(entities[0].parent_id, None);
    }

    #[test]
    fn export_file_name_stamps_the_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).expect("date");
        assert_eq!(export_file_name(date), "inkcap-vault-2024-03-09.json");
    }
}
