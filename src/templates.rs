// src/templates.rs
use axum::response::Html;
use tera::{Context, Tera};

/// Page templates, compiled once at startup and shared through `AppState`.
pub struct Templates {
    tera: Tera,
}

impl Templates {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("base.html", include_str!("../templates/base.html")),
            ("index.html", include_str!("../templates/index.html")),
            ("detail.html", include_str!("../templates/detail.html")),
            ("results.html", include_str!("../templates/results.html")),
        ])?;

        Ok(Self { tera })
    }

    pub fn render(&self, name: &str, context: &Context) -> Result<Html<String>, tera::Error> {
        self.tera.render(name, context).map(Html)
    }
}
