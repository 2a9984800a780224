//! Persona catalog and the agent's current persona state, mutable at
//! runtime via the "change persona" voice command.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Persona {
    pub id: String,
    pub display_name: String,
    pub system_prompt: String,
}

pub trait PersonaCatalog: Send {
    fn get(&self, id: &str) -> Option<Persona>;
    fn default_persona(&self) -> Persona;
    /// List ids in catalog-defined order, for voice-command matching.
    fn ids(&self) -> Vec<String>;
}

/// In-memory catalog loaded from configuration at startup.
pub struct StaticPersonaCatalog {
    personas: HashMap<String, Persona>,
    default_id: String,
    order: Vec<String>,
}

impl StaticPersonaCatalog {
    pub fn new(personas: Vec<Persona>, default_id: String) -> Self {
        let order = personas.iter().map(|p| p.id.clone()).collect();
        let map = personas.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self {
            personas: map,
            default_id,
            order,
        }
    }
}

impl PersonaCatalog for StaticPersonaCatalog {
    fn get(&self, id: &str) -> Option<Persona> {
        self.personas.get(id).cloned()
    }

    fn default_persona(&self) -> Persona {
        self.personas
            .get(&self.default_id)
            .cloned()
            .unwrap_or_else(|| Persona {
                id: "default".to_string(),
                display_name: "Memo".to_string(),
                system_prompt: "You are a helpful radio assistant named Memo.".to_string(),
            })
    }

    fn ids(&self) -> Vec<String> {
        self.order.clone()
    }
}

/// The id reserved for translation mode: the system prompt is constructed
/// dynamically from the requested target language rather than read as-is
/// from the catalog.
pub const TRANSLATOR_PERSONA_ID: &str = "translator";

pub fn translator_system_prompt(target_language: &str) -> String {
    format!(
        "You are a translation assistant. Translate everything the user says \
         into {target_language}. Respond with only the translation, no \
         commentary, and end every reply with \"over.\""
    )
}

/// Runtime-mutable persona selection, separate from the static catalog so
/// a "change persona" command can swap it without touching configuration.
pub struct PersonaState {
    pub current_persona_id: String,
    pub current_display_name: String,
    pub current_system_prompt: String,
}

impl PersonaState {
    pub fn from_persona(persona: Persona) -> Self {
        Self {
            current_persona_id: persona.id,
            current_display_name: persona.display_name,
            current_system_prompt: persona.system_prompt,
        }
    }

    pub fn switch_to(&mut self, persona: Persona) {
        self.current_persona_id = persona.id;
        self.current_display_name = persona.display_name;
        self.current_system_prompt = persona.system_prompt;
    }

    pub fn switch_to_translator(&mut self, target_language: &str) {
        self.current_persona_id = TRANSLATOR_PERSONA_ID.to_string();
        self.current_display_name = format!("Translator ({target_language})");
        self.current_system_prompt = translator_system_prompt(target_language);
    }
}
