const CHARACTER_PROMPT: &str = include_str!("../../../assets/prompts/character.txt");

/// The scripted character the model plays. Both fields are fixed data and are
/// not exposed through configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Persona {
    pub name: String,
    pub system_prompt: String,
}

impl Default for Persona {
    fn default() -> Persona {
        return Persona {
            name: "박보검".to_string(),
            system_prompt: CHARACTER_PROMPT.trim().to_string(),
        };
    }
}
