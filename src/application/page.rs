#[cfg(test)]
#[path = "page_test.rs"]
mod tests;

use anyhow::Result;
use minijinja::context;
use minijinja::Environment;
use serde::Serialize;

use crate::domain::models::Message;
use crate::domain::models::Persona;
use crate::domain::models::Role;
use crate::domain::services::formatting;
use crate::domain::services::FALLBACK_AVATAR;

const INDEX_TEMPLATE: &str = include_str!("../../assets/templates/index.html");

#[derive(Serialize)]
struct BubbleView<'a> {
    role: Role,
    content: &'a str,
    html: String,
}

impl<'a> BubbleView<'a> {
    fn new(message: &'a Message) -> BubbleView<'a> {
        let html = match message.role {
            Role::Assistant => formatting::style(&message.content),
            Role::User => "".to_string(),
        };

        return BubbleView {
            role: message.role,
            content: &message.content,
            html,
        };
    }
}

/// Everything shown on one render of the chat page.
pub struct PageData<'a> {
    pub messages: &'a [Message],
    pub sessions: &'a [String],
    pub current_file: Option<&'a str>,
    pub error: Option<&'a str>,
}

pub struct Page {
    env: Environment<'static>,
    persona: Persona,
    profile_image: String,
}

impl Page {
    pub fn new(persona: Persona, profile_image: String) -> Result<Page> {
        let mut env = Environment::new();
        env.add_template("index.html", INDEX_TEMPLATE)?;

        return Ok(Page {
            env,
            persona,
            profile_image,
        });
    }

    pub fn render(&self, data: PageData) -> Result<String> {
        let bubbles = data
            .messages
            .iter()
            .map(BubbleView::new)
            .collect::<Vec<BubbleView>>();

        let title = data.current_file.unwrap_or(&self.persona.name);

        let tmpl = self.env.get_template("index.html")?;
        let html = tmpl.render(context! {
            persona => &self.persona.name,
            title => title,
            profile_image => &self.profile_image,
            fallback_avatar => FALLBACK_AVATAR,
            sessions => data.sessions,
            current_file => data.current_file,
            messages => &bubbles,
            error => data.error,
        })?;

        return Ok(html);
    }
}
