//! Directory-backed persona repository.
//!
//! Presets are always available; custom personas live as one TOML file
//! each under the personas directory, with the file stem as the id.

use async_trait::async_trait;
use scena_core::persona::{
    preset, EngagementLevel, Persona, PersonaRepository, PersonaType, QuestionFrequency,
    ResponseLength,
};
use scena_core::{Result, ScenaError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paths::{write_atomic, ScenaPaths};

/// On-disk persona shape. `persona_type` is intentionally absent; anything
/// loaded from the directory is a custom persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersonaFile {
    name: String,
    background: String,
    personality: String,
    goal: String,
    #[serde(default)]
    knowledge_level: String,
    #[serde(default)]
    learning_style: String,
    #[serde(default)]
    interaction_style: String,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    weaknesses: Vec<String>,
    #[serde(default)]
    typical_behaviors: Vec<String>,
    #[serde(default)]
    response_length: ResponseLength,
    #[serde(default)]
    engagement_level: EngagementLevel,
    #[serde(default)]
    question_frequency: QuestionFrequency,
}

impl PersonaFile {
    fn into_persona(self) -> Persona {
        Persona {
            name: self.name,
            persona_type: PersonaType::Custom,
            background: self.background,
            personality: self.personality,
            goal: self.goal,
            knowledge_level: self.knowledge_level,
            learning_style: self.learning_style,
            interaction_style: self.interaction_style,
            strengths: self.strengths,
            weaknesses: self.weaknesses,
            typical_behaviors: self.typical_behaviors,
            response_length: self.response_length,
            engagement_level: self.engagement_level,
            question_frequency: self.question_frequency,
        }
    }

    fn from_persona(persona: &Persona) -> Self {
        Self {
            name: persona.name.clone(),
            background: persona.background.clone(),
            personality: persona.personality.clone(),
            goal: persona.goal.clone(),
            knowledge_level: persona.knowledge_level.clone(),
            learning_style: persona.learning_style.clone(),
            interaction_style: persona.interaction_style.clone(),
            strengths: persona.strengths.clone(),
            weaknesses: persona.weaknesses.clone(),
            typical_behaviors: persona.typical_behaviors.clone(),
            response_length: persona.response_length,
            engagement_level: persona.engagement_level,
            question_frequency: persona.question_frequency,
        }
    }
}

/// Persona store combining the built-in presets with a TOML directory.
/// Presets shadow same-named files, so `excellent` always means the
/// built-in one.
pub struct DirPersonaRepository {
    dir: PathBuf,
}

impl DirPersonaRepository {
    /// Uses the default personas directory under the scena config dir.
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: ScenaPaths::personas_dir()?,
        })
    }

    /// Uses a custom directory, for tests and explicit overrides.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Persists a custom persona as `{id}.toml`.
    pub async fn save(&self, id: &str, persona: &Persona) -> Result<()> {
        if preset::preset_ids().contains(&id) {
            return Err(ScenaError::config(format!(
                "persona id '{id}' is reserved for a preset"
            )));
        }
        let file = PersonaFile::from_persona(persona);
        let content = toml::to_string_pretty(&file)?;
        write_atomic(&self.file_path(id), &content).await
    }

    fn file_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.toml"))
    }

    async fn load_file(&self, path: &Path) -> Result<Persona> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| ScenaError::io(format!("read {}: {err}", path.display())))?;
        let file: PersonaFile = toml::from_str(&content)?;
        Ok(file.into_persona())
    }
}

#[async_trait]
impl PersonaRepository for DirPersonaRepository {
    async fn get(&self, persona_id: &str) -> Result<Persona> {
        if let Some(persona) = preset::preset(persona_id) {
            return Ok(persona);
        }
        let path = self.file_path(persona_id);
        if !path.exists() {
            return Err(ScenaError::not_found("persona", persona_id));
        }
        self.load_file(&path).await
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = preset::preset_ids().iter().map(|s| s.to_string()).collect();
        match tokio::fs::read_dir(&self.dir).await {
            Ok(mut entries) => {
                while let Some(entry) = entries
                    .next_entry()
                    .await
                    .map_err(|err| ScenaError::io(format!("read dir entry: {err}")))?
                {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                        continue;
                    }
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        if !ids.iter().any(|id| id == stem) {
                            ids.push(stem.to_string());
                        }
                    }
                }
            }
            // A missing directory just means no custom personas yet.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(ScenaError::io(format!(
                    "read {}: {err}",
                    self.dir.display()
                )))
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn custom_persona() -> Persona {
        let mut persona = preset::preset(preset::AVERAGE).unwrap();
        persona.name = "Night-shift trainee".to_string();
        persona.persona_type = PersonaType::Custom;
        persona
    }

    #[tokio::test]
    async fn presets_resolve_without_directory() {
        let dir = TempDir::new().unwrap();
        let repo = DirPersonaRepository::with_dir(dir.path().join("missing"));
        let persona = repo.get(preset::EXCELLENT).await.unwrap();
        assert_eq!(persona.persona_type, PersonaType::Preset);
        let ids = repo.list().await.unwrap();
        assert_eq!(ids, vec!["average", "excellent", "struggling"]);
    }

    #[tokio::test]
    async fn save_then_get_round_trips_as_custom() {
        let dir = TempDir::new().unwrap();
        let repo = DirPersonaRepository::with_dir(dir.path());
        repo.save("trainee", &custom_persona()).await.unwrap();

        let loaded = repo.get("trainee").await.unwrap();
        assert_eq!(loaded.name, "Night-shift trainee");
        assert_eq!(loaded.persona_type, PersonaType::Custom);

        let ids = repo.list().await.unwrap();
        assert!(ids.contains(&"trainee".to_string()));
    }

    #[tokio::test]
    async fn preset_ids_are_reserved() {
        let dir = TempDir::new().unwrap();
        let repo = DirPersonaRepository::with_dir(dir.path());
        let err = repo.save("excellent", &custom_persona()).await.unwrap_err();
        assert!(matches!(err, ScenaError::Config(_)));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let dir = TempDir::new().unwrap();
        let repo = DirPersonaRepository::with_dir(dir.path());
        let err = repo.get("nobody").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
